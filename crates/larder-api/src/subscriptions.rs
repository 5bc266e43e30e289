use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use larder_db::models::UserRow;
use larder_db::{Database, DbError};
use larder_types::api::{AuthorWithRecipes, Page};
use larder_types::models::UserId;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::pagination::page_window;
use crate::policy::Actor;
use crate::recipes::recipe_summary;
use crate::state::{AppState, run_blocking};
use crate::users::user_view;

pub const DEFAULT_RECIPES_LIMIT: i64 = 3;

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub recipes_limit: Option<u32>,
}

impl SubscriptionQuery {
    fn recipes_limit(&self) -> i64 {
        self.recipes_limit
            .map(i64::from)
            .unwrap_or(DEFAULT_RECIPES_LIMIT)
    }
}

/// An author as seen by `viewer`, with a preview of their newest recipes.
pub fn author_view(
    db: &Database,
    viewer: UserId,
    author: UserRow,
    recipes_limit: i64,
) -> Result<AuthorWithRecipes, ApiError> {
    let author_id = author.id;
    let recipes = db
        .recipes_by_author(author_id, recipes_limit)?
        .into_iter()
        .map(recipe_summary)
        .collect();
    Ok(AuthorWithRecipes {
        user: user_view(db, Some(viewer), author)?,
        recipes,
        recipes_count: db.count_recipes_by_author(author_id)?,
    })
}

pub fn subscribe_to(
    db: &Database,
    actor: &Actor,
    author_id: UserId,
    recipes_limit: i64,
) -> Result<AuthorWithRecipes, ApiError> {
    if author_id == actor.id {
        return Err(ApiError::SelfReference("you cannot subscribe to yourself"));
    }
    let author = db.get_user_by_id(author_id)?.ok_or(ApiError::NotFound("user"))?;

    db.add_follower(actor.id, author_id).map_err(|e| match e {
        DbError::Conflict => ApiError::AlreadyExists("you are already subscribed to this author"),
        DbError::MissingReference(_) => ApiError::NotFound("user"),
        other => other.into(),
    })?;

    info!("User {} ({}) subscribed to {}", actor.username, actor.id, author_id);
    author_view(db, actor.id, author, recipes_limit)
}

pub fn unsubscribe_from(db: &Database, actor: &Actor, author_id: UserId) -> Result<(), ApiError> {
    if author_id == actor.id {
        return Err(ApiError::SelfReference("you cannot unsubscribe from yourself"));
    }
    if db.get_user_by_id(author_id)?.is_none() {
        return Err(ApiError::NotFound("user"));
    }
    if !db.remove_follower(actor.id, author_id)? {
        return Err(ApiError::NotFound("subscription"));
    }

    info!("User {} ({}) unsubscribed from {}", actor.username, actor.id, author_id);
    Ok(())
}

pub fn subscriptions_of(
    db: &Database,
    actor: &Actor,
    query: &SubscriptionQuery,
) -> Result<Page<AuthorWithRecipes>, ApiError> {
    let (limit, offset) = page_window(query.page, query.limit);
    let recipes_limit = query.recipes_limit();

    let count = db.count_followed_authors(actor.id)?;
    let results = db
        .list_followed_authors(actor.id, limit, offset)?
        .into_iter()
        .map(|author| author_view(db, actor.id, author, recipes_limit))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page { count, results })
}

// -- Handlers --

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    pub recipes_limit: Option<u32>,
}

/// POST /users/{id}/subscribe
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<UserId>,
    Query(query): Query<SubscribeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let recipes_limit = query
        .recipes_limit
        .map(i64::from)
        .unwrap_or(DEFAULT_RECIPES_LIMIT);
    let author = run_blocking(&state, move |db| subscribe_to(db, &actor, id, recipes_limit)).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

/// DELETE /users/{id}/subscribe
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |db| unsubscribe_from(db, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<SubscriptionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = run_blocking(&state, move |db| subscriptions_of(db, &actor, &query)).await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn self_subscription_is_rejected_first() {
        let db = testutil::db();
        let ada = testutil::user(&db, "ada");
        assert!(matches!(
            subscribe_to(&db, &ada, ada.id, 3),
            Err(ApiError::SelfReference(_))
        ));
        assert!(matches!(
            unsubscribe_from(&db, &ada, ada.id),
            Err(ApiError::SelfReference(_))
        ));
        assert_eq!(db.count_followed_authors(ada.id).unwrap(), 0);
    }

    #[test]
    fn following_twice_keeps_one_row() {
        let db = testutil::db();
        let ada = testutil::user(&db, "ada");
        let bob = testutil::user(&db, "bob");

        let author = subscribe_to(&db, &ada, bob.id, 3).unwrap();
        assert!(author.user.is_subscribed);
        assert_eq!(author.recipes_count, 0);

        assert!(matches!(
            subscribe_to(&db, &ada, bob.id, 3),
            Err(ApiError::AlreadyExists(_))
        ));
        assert_eq!(db.count_followed_authors(ada.id).unwrap(), 1);
    }

    #[test]
    fn unknown_author_and_missing_subscription_are_not_found() {
        let db = testutil::db();
        let ada = testutil::user(&db, "ada");
        let bob = testutil::user(&db, "bob");

        assert!(matches!(
            subscribe_to(&db, &ada, 404, 3),
            Err(ApiError::NotFound("user"))
        ));
        assert!(matches!(
            unsubscribe_from(&db, &ada, bob.id),
            Err(ApiError::NotFound("subscription"))
        ));
    }

    #[test]
    fn subscriptions_list_previews_recipes() {
        let db = testutil::db();
        let ada = testutil::user(&db, "ada");
        let bob = testutil::user(&db, "bob");
        let tag = testutil::tag(&db, "soup");
        let leek = testutil::ingredient(&db, "leek", "pcs");
        for name in ["Leek soup", "Leek pie", "Leek salad", "Leek stew"] {
            db.create_recipe(&larder_db::models::NewRecipe {
                author_id: bob.id,
                name: name.into(),
                image: String::new(),
                text: "Chop.".into(),
                cooking_time: 15,
                tag_ids: vec![tag],
                ingredients: vec![larder_db::models::IngredientAmount {
                    ingredient_id: leek,
                    amount: 2.0,
                }],
            })
            .unwrap();
        }
        subscribe_to(&db, &ada, bob.id, 3).unwrap();

        let page = subscriptions_of(
            &db,
            &ada,
            &SubscriptionQuery {
                recipes_limit: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].recipes.len(), 2);
        assert_eq!(page.results[0].recipes_count, 4);
        assert_eq!(page.results[0].recipes[0].name, "Leek stew");
    }
}
