use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use larder_db::Database;
use larder_db::models::UserRow;
use larder_types::api::{Page, UserResponse};
use larder_types::models::UserId;

use crate::error::ApiError;
use crate::middleware::{AuthUser, MaybeUser};
use crate::pagination::PageQuery;
use crate::state::{AppState, run_blocking};

/// Public view of a user, with `is_subscribed` relative to `viewer`.
pub fn user_view(db: &Database, viewer: Option<UserId>, row: UserRow) -> Result<UserResponse, ApiError> {
    let is_subscribed = match viewer {
        Some(viewer) if viewer != row.id => db.is_following(viewer, row.id)?,
        _ => false,
    };

    Ok(UserResponse {
        email: row.email,
        id: row.id,
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        is_subscribed,
    })
}

pub fn load_user(db: &Database, viewer: Option<UserId>, id: UserId) -> Result<UserResponse, ApiError> {
    let row = db.get_user_by_id(id)?.ok_or(ApiError::NotFound("user"))?;
    user_view(db, viewer, row)
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = viewer.id();
    let (limit, offset) = query.window();

    let page = run_blocking(&state, move |db| {
        let count = db.count_users()?;
        let results = db
            .list_users(limit, offset)?
            .into_iter()
            .map(|row| user_view(db, viewer, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page { count, results })
    })
    .await?;

    Ok(Json(page))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = viewer.id();
    let user = run_blocking(&state, move |db| load_user(db, viewer, id)).await?;
    Ok(Json(user))
}

/// GET /users/me
pub async fn me(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_blocking(&state, move |db| load_user(db, Some(actor.id), actor.id)).await?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn is_subscribed_follows_the_viewer() {
        let db = testutil::db();
        let alice = testutil::user(&db, "alice");
        let bob = testutil::user(&db, "bob");
        db.add_follower(alice.id, bob.id).unwrap();

        assert!(load_user(&db, Some(alice.id), bob.id).unwrap().is_subscribed);
        assert!(!load_user(&db, Some(bob.id), alice.id).unwrap().is_subscribed);
        assert!(!load_user(&db, None, bob.id).unwrap().is_subscribed);
        assert!(matches!(
            load_user(&db, None, 999),
            Err(ApiError::NotFound("user"))
        ));
    }
}
