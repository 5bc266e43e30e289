//! Favourites and shopping cart: idempotent (user, recipe) sets.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use larder_db::models::RecipeList;
use larder_db::{Database, DbError};
use larder_types::api::RecipeSummary;
use larder_types::models::RecipeId;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::policy::Actor;
use crate::recipes::recipe_summary;
use crate::state::{AppState, run_blocking};

fn already_listed(list: RecipeList) -> ApiError {
    match list {
        RecipeList::Favourites => ApiError::AlreadyExists("recipe is already in favourites"),
        RecipeList::ShoppingCart => ApiError::AlreadyExists("recipe is already in the shopping cart"),
    }
}

fn not_listed(list: RecipeList) -> ApiError {
    match list {
        RecipeList::Favourites => ApiError::NotFound("favourite"),
        RecipeList::ShoppingCart => ApiError::NotFound("shopping cart entry"),
    }
}

/// Adds the recipe to one of the actor's lists. The insert itself decides
/// whether the pair already exists.
pub fn add(db: &Database, actor: &Actor, list: RecipeList, recipe_id: RecipeId) -> Result<RecipeSummary, ApiError> {
    let recipe = db.get_recipe(recipe_id)?.ok_or(ApiError::NotFound("recipe"))?;

    db.add_to_list(list, actor.id, recipe_id).map_err(|e| match e {
        DbError::Conflict => already_listed(list),
        // Deleted between the lookup and the insert.
        DbError::MissingReference(_) => ApiError::NotFound("recipe"),
        other => other.into(),
    })?;

    debug!("User {} added recipe {} to {:?}", actor.id, recipe_id, list);
    Ok(recipe_summary(recipe))
}

pub fn remove(db: &Database, actor: &Actor, list: RecipeList, recipe_id: RecipeId) -> Result<(), ApiError> {
    if db.get_recipe(recipe_id)?.is_none() {
        return Err(ApiError::NotFound("recipe"));
    }
    if !db.remove_from_list(list, actor.id, recipe_id)? {
        return Err(not_listed(list));
    }

    debug!("User {} removed recipe {} from {:?}", actor.id, recipe_id, list);
    Ok(())
}

async fn add_handler(
    state: AppState,
    actor: Actor,
    list: RecipeList,
    id: RecipeId,
) -> Result<impl IntoResponse, ApiError> {
    let summary = run_blocking(&state, move |db| add(db, &actor, list, id)).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn remove_handler(
    state: AppState,
    actor: Actor,
    list: RecipeList,
    id: RecipeId,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |db| remove(db, &actor, list, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /recipes/{id}/favorite
pub async fn add_favourite(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<RecipeId>,
) -> Result<impl IntoResponse, ApiError> {
    add_handler(state, actor, RecipeList::Favourites, id).await
}

/// DELETE /recipes/{id}/favorite
pub async fn remove_favourite(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<RecipeId>,
) -> Result<impl IntoResponse, ApiError> {
    remove_handler(state, actor, RecipeList::Favourites, id).await
}

/// POST /recipes/{id}/shopping_cart
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<RecipeId>,
) -> Result<impl IntoResponse, ApiError> {
    add_handler(state, actor, RecipeList::ShoppingCart, id).await
}

/// DELETE /recipes/{id}/shopping_cart
pub async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<RecipeId>,
) -> Result<impl IntoResponse, ApiError> {
    remove_handler(state, actor, RecipeList::ShoppingCart, id).await
}
