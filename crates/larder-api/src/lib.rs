pub mod auth;
pub mod catalog;
pub mod error;
pub mod memberships;
pub mod middleware;
pub mod pagination;
pub mod policy;
pub mod recipes;
pub mod shopping;
pub mod state;
pub mod subscriptions;
pub mod users;

use axum::{
    Router,
    routing::{get, post},
};

use state::AppState;

/// All API routes. Transport layers (CORS, tracing) are added by the server.
pub fn router(state: AppState) -> Router {
    let accounts = Router::new()
        .route("/auth/token/login", post(auth::login))
        .route("/users", get(users::list_users).post(auth::register))
        .route("/users/me", get(users::me))
        .route("/users/set_password", post(auth::set_password))
        .route("/users/subscriptions", get(subscriptions::list_subscriptions))
        .route("/users/{id}", get(users::get_user))
        .route(
            "/users/{id}/subscribe",
            post(subscriptions::subscribe).delete(subscriptions::unsubscribe),
        );

    let catalog = Router::new()
        .route("/tags", get(catalog::list_tags).post(catalog::create_tag))
        .route("/tags/{id}", get(catalog::get_tag))
        .route(
            "/ingredients",
            get(catalog::list_ingredients).post(catalog::create_ingredient),
        )
        .route("/ingredients/{id}", get(catalog::get_ingredient));

    let recipes = Router::new()
        .route("/recipes", get(recipes::list_recipes).post(recipes::create_recipe))
        .route(
            "/recipes/download_shopping_cart",
            get(shopping::download_shopping_cart),
        )
        .route(
            "/recipes/{id}",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(
            "/recipes/{id}/favorite",
            post(memberships::add_favourite).delete(memberships::remove_favourite),
        )
        .route(
            "/recipes/{id}/shopping_cart",
            post(memberships::add_to_cart).delete(memberships::remove_from_cart),
        );

    Router::new()
        .route("/health", get(health))
        .merge(accounts)
        .merge(catalog)
        .merge(recipes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
