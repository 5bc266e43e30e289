//! Tags and ingredients: read-only reference data, created by admins.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use larder_db::models::{IngredientRow, TagRow};
use larder_db::{Database, DbError};
use larder_types::api::{
    CreateIngredientRequest, CreateTagRequest, IngredientResponse, TagResponse,
};
use larder_types::models::{IngredientId, TagId};

use crate::error::ApiError;
use crate::middleware::{ApiJson, AuthUser};
use crate::policy::{Actor, require_admin};
use crate::state::{AppState, run_blocking};

const MAX_NAME_LEN: usize = 200;

pub fn tag_view(row: TagRow) -> TagResponse {
    TagResponse {
        id: row.id,
        name: row.name,
        color: row.color,
        slug: row.slug,
    }
}

pub fn ingredient_view(row: IngredientRow) -> IngredientResponse {
    IngredientResponse {
        id: row.id,
        name: row.name,
        measurement_unit: row.unit,
    }
}

fn require_name(field: &'static str, value: &str) -> Result<(), ApiError> {
    let len = value.trim().chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(ApiError::validation(
            field,
            format!("must be between 1 and {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(())
}

/// Accepts `RRGGBB` with or without a leading `#`; returns `#RRGGBB` uppercased.
pub fn normalize_color(color: &str) -> Result<String, ApiError> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ApiError::validation("color", "enter a hex colour like #E26C2D"));
    }
    Ok(format!("#{}", hex.to_ascii_uppercase()))
}

fn validate_slug(slug: &str) -> Result<(), ApiError> {
    if slug.is_empty()
        || slug.len() > MAX_NAME_LEN
        || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::validation(
            "slug",
            "slug may contain only latin letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

pub fn add_tag(db: &Database, actor: &Actor, req: &CreateTagRequest) -> Result<TagResponse, ApiError> {
    require_admin(actor)?;
    require_name("name", &req.name)?;
    let color = normalize_color(&req.color)?;
    let slug = req.slug.trim();
    validate_slug(slug)?;

    let name = req.name.trim();
    let id = db.create_tag(name, &color, slug).map_err(|e| match e {
        DbError::Conflict => ApiError::AlreadyExists("a tag with that slug already exists"),
        other => other.into(),
    })?;

    info!("Admin {} created tag {} ({})", actor.username, slug, id);
    Ok(TagResponse {
        id,
        name: name.to_string(),
        color,
        slug: slug.to_string(),
    })
}

pub fn add_ingredient(
    db: &Database,
    actor: &Actor,
    req: &CreateIngredientRequest,
) -> Result<IngredientResponse, ApiError> {
    require_admin(actor)?;
    require_name("name", &req.name)?;
    require_name("measurement_unit", &req.measurement_unit)?;

    let name = req.name.trim();
    let unit = req.measurement_unit.trim();
    let id = db.create_ingredient(name, unit)?;

    info!("Admin {} created ingredient {} ({})", actor.username, name, id);
    Ok(IngredientResponse {
        id,
        name: name.to_string(),
        measurement_unit: unit.to_string(),
    })
}

// -- Handlers --

/// GET /tags
pub async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tags = run_blocking(&state, |db| {
        Ok(db
            .list_tags()?
            .into_iter()
            .map(tag_view)
            .collect::<Vec<_>>())
    })
    .await?;
    Ok(Json(tags))
}

/// GET /tags/{id}
pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<TagId>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = run_blocking(&state, move |db| {
        db.get_tag(id)?
            .map(tag_view)
            .ok_or(ApiError::NotFound("tag"))
    })
    .await?;
    Ok(Json(tag))
}

/// POST /tags
pub async fn create_tag(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<CreateTagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = run_blocking(&state, move |db| add_tag(db, &actor, &req)).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

#[derive(Debug, Deserialize)]
pub struct IngredientQuery {
    pub name: Option<String>,
}

/// GET /ingredients?name=
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ingredients = run_blocking(&state, move |db| {
        Ok(db
            .search_ingredients(query.name.as_deref())?
            .into_iter()
            .map(ingredient_view)
            .collect::<Vec<_>>())
    })
    .await?;
    Ok(Json(ingredients))
}

/// GET /ingredients/{id}
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<IngredientId>,
) -> Result<impl IntoResponse, ApiError> {
    let ingredient = run_blocking(&state, move |db| {
        db.get_ingredient(id)?
            .map(ingredient_view)
            .ok_or(ApiError::NotFound("ingredient"))
    })
    .await?;
    Ok(Json(ingredient))
}

/// POST /ingredients
pub async fn create_ingredient(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<CreateIngredientRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ingredient = run_blocking(&state, move |db| add_ingredient(db, &actor, &req)).await?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}
