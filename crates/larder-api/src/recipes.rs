use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, State},
    http::{Method, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::Query;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info};

use larder_db::Database;
use larder_db::models::{IngredientAmount, NewRecipe, RecipeChanges, RecipeFilter, RecipeList, RecipeRow};
use larder_types::api::{
    CreateRecipeRequest, Page, RecipeIngredientInput, RecipeIngredientResponse, RecipeResponse,
    RecipeSummary, UpdateRecipeRequest,
};
use larder_types::models::{RecipeId, TagId, UserId};

use crate::catalog::tag_view;
use crate::error::ApiError;
use crate::middleware::{ApiJson, AuthUser, MaybeUser};
use crate::pagination::page_window;
use crate::policy::{Actor, authorize};
use crate::state::{AppState, run_blocking};
use crate::users::load_user;

const MAX_NAME_LEN: usize = 200;
/// Largest amount of one ingredient in one recipe.
pub const MAX_AMOUNT: f64 = 1_000_000.0;

// -- Validation --

/// At least one tag; repeated ids collapse to one link.
pub fn validate_tags(tags: &[TagId]) -> Result<Vec<TagId>, ApiError> {
    if tags.is_empty() {
        return Err(ApiError::validation("tags", "at least one tag is required"));
    }
    let mut seen = HashSet::new();
    Ok(tags.iter().copied().filter(|id| seen.insert(*id)).collect())
}

pub fn validate_ingredients(parts: &[RecipeIngredientInput]) -> Result<Vec<IngredientAmount>, ApiError> {
    if parts.is_empty() {
        return Err(ApiError::validation(
            "ingredients",
            "at least one ingredient is required",
        ));
    }

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        if !seen.insert(part.id) {
            return Err(ApiError::validation(
                "ingredients",
                format!("ingredient {} is listed more than once", part.id),
            ));
        }
        if !part.amount.is_finite() || part.amount <= 0.0 {
            return Err(ApiError::validation(
                "ingredients",
                format!("amount of ingredient {} must be greater than 0", part.id),
            ));
        }
        if part.amount > MAX_AMOUNT {
            return Err(ApiError::validation(
                "ingredients",
                format!("amount of ingredient {} must be at most {}", part.id, MAX_AMOUNT),
            ));
        }
        out.push(IngredientAmount {
            ingredient_id: part.id,
            amount: part.amount,
        });
    }
    Ok(out)
}

fn validate_cooking_time(minutes: i64) -> Result<i64, ApiError> {
    if minutes < 1 {
        return Err(ApiError::validation(
            "cooking_time",
            "cooking time must be at least 1 minute",
        ));
    }
    Ok(minutes)
}

fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(ApiError::validation(
            "name",
            format!("name must be between 1 and {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(name.to_string())
}

fn validate_text(text: &str) -> Result<String, ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::validation("text", "text cannot be empty"));
    }
    Ok(text.to_string())
}

// -- Views --

fn parse_pub_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            error!("Corrupt pub_date {:?}: {}", raw, e);
            ApiError::Internal
        })
}

pub fn recipe_summary(row: RecipeRow) -> RecipeSummary {
    RecipeSummary {
        id: row.id,
        name: row.name,
        image: row.image,
        cooking_time: row.cooking_time,
    }
}

/// Full representation of a recipe as seen by `viewer`.
pub fn recipe_view(db: &Database, viewer: Option<UserId>, row: RecipeRow) -> Result<RecipeResponse, ApiError> {
    let tags = db.tags_for_recipe(row.id)?.into_iter().map(tag_view).collect();
    let author = load_user(db, viewer, row.author_id)?;
    let ingredients = db
        .recipe_ingredients(row.id)?
        .into_iter()
        .map(|i| RecipeIngredientResponse {
            id: i.ingredient_id,
            name: i.name,
            measurement_unit: i.unit,
            amount: i.amount,
        })
        .collect();

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            db.is_in_list(RecipeList::Favourites, viewer, row.id)?,
            db.is_in_list(RecipeList::ShoppingCart, viewer, row.id)?,
        ),
        None => (false, false),
    };

    Ok(RecipeResponse {
        id: row.id,
        tags,
        author,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        favorites_count: db.count_favourites(row.id)?,
        pub_date: parse_pub_date(&row.pub_date)?,
        name: row.name,
        image: row.image,
        text: row.text,
        cooking_time: row.cooking_time,
    })
}

fn load_recipe(db: &Database, id: RecipeId) -> Result<RecipeRow, ApiError> {
    db.get_recipe(id)?.ok_or(ApiError::NotFound("recipe"))
}

// -- Authoring --

pub fn create_recipe_for(db: &Database, actor: &Actor, req: &CreateRecipeRequest) -> Result<RecipeResponse, ApiError> {
    authorize(Some(actor), None, &Method::POST)?;

    let new = NewRecipe {
        author_id: actor.id,
        name: validate_name(&req.name)?,
        image: req.image.clone().unwrap_or_default(),
        text: validate_text(&req.text)?,
        cooking_time: validate_cooking_time(req.cooking_time)?,
        tag_ids: validate_tags(&req.tags)?,
        ingredients: validate_ingredients(&req.ingredients)?,
    };

    let id = db.create_recipe(&new)?;
    info!("User {} ({}) created recipe {}", actor.username, actor.id, id);
    recipe_view(db, Some(actor.id), load_recipe(db, id)?)
}

pub fn update_recipe_for(
    db: &Database,
    actor: &Actor,
    id: RecipeId,
    req: &UpdateRecipeRequest,
) -> Result<RecipeResponse, ApiError> {
    let current = load_recipe(db, id)?;
    authorize(Some(actor), Some(current.author_id), &Method::PATCH)?;

    // Only admins may hand a recipe to someone else.
    if let Some(author) = req.author {
        if author != current.author_id && !actor.is_admin() {
            return Err(ApiError::PermissionDenied);
        }
    }

    let changes = RecipeChanges {
        author_id: req.author.filter(|a| *a != current.author_id),
        name: req.name.as_deref().map(validate_name).transpose()?,
        image: req.image.clone(),
        text: req.text.as_deref().map(validate_text).transpose()?,
        cooking_time: req.cooking_time.map(validate_cooking_time).transpose()?,
        tag_ids: req.tags.as_deref().map(validate_tags).transpose()?,
        ingredients: req.ingredients.as_deref().map(validate_ingredients).transpose()?,
    };

    if !db.update_recipe(id, &changes)? {
        return Err(ApiError::NotFound("recipe"));
    }
    info!("User {} ({}) updated recipe {}", actor.username, actor.id, id);
    recipe_view(db, Some(actor.id), load_recipe(db, id)?)
}

pub fn delete_recipe_for(db: &Database, actor: &Actor, id: RecipeId) -> Result<(), ApiError> {
    let current = load_recipe(db, id)?;
    authorize(Some(actor), Some(current.author_id), &Method::DELETE)?;

    if !db.delete_recipe(id)? {
        return Err(ApiError::NotFound("recipe"));
    }
    info!("User {} ({}) deleted recipe {}", actor.username, actor.id, id);
    Ok(())
}

// -- Listing --

#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub author: Option<UserId>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_favorited: Option<u8>,
    pub is_in_shopping_cart: Option<u8>,
}

fn membership_flag(field: &'static str, raw: Option<u8>) -> Result<Option<bool>, ApiError> {
    match raw {
        None => Ok(None),
        Some(0) => Ok(Some(false)),
        Some(1) => Ok(Some(true)),
        Some(_) => Err(ApiError::validation(field, "use 1 or 0")),
    }
}

impl RecipeQuery {
    pub fn to_filter(&self, viewer: Option<UserId>) -> Result<RecipeFilter, ApiError> {
        let (limit, offset) = page_window(self.page, self.limit);
        Ok(RecipeFilter {
            author_id: self.author,
            tag_slugs: self.tags.clone(),
            viewer_id: viewer,
            favorited: membership_flag("is_favorited", self.is_favorited)?,
            in_shopping_cart: membership_flag("is_in_shopping_cart", self.is_in_shopping_cart)?,
            limit,
            offset,
        })
    }
}

pub fn list_recipes_for(
    db: &Database,
    viewer: Option<UserId>,
    query: &RecipeQuery,
) -> Result<Page<RecipeResponse>, ApiError> {
    let (rows, count) = db.list_recipes(&query.to_filter(viewer)?)?;
    let results = rows
        .into_iter()
        .map(|row| recipe_view(db, viewer, row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page { count, results })
}

// -- Handlers --

/// GET /recipes
pub async fn list_recipes(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<RecipeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = viewer.id();
    let page = run_blocking(&state, move |db| list_recipes_for(db, viewer, &query)).await?;
    Ok(Json(page))
}

/// GET /recipes/{id}
pub async fn get_recipe(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<RecipeId>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = viewer.id();
    let recipe = run_blocking(&state, move |db| recipe_view(db, viewer, load_recipe(db, id)?)).await?;
    Ok(Json(recipe))
}

/// POST /recipes
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<CreateRecipeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let recipe = run_blocking(&state, move |db| create_recipe_for(db, &actor, &req)).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// PATCH /recipes/{id}
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<RecipeId>,
    ApiJson(req): ApiJson<UpdateRecipeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let recipe = run_blocking(&state, move |db| update_recipe_for(db, &actor, id, &req)).await?;
    Ok(Json(recipe))
}

/// DELETE /recipes/{id}
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<RecipeId>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |db| delete_recipe_for(db, &actor, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
