use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{IngredientId, RecipeId, TagId, UserId};

// -- JWT Claims --

/// Bearer token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

// -- Pagination --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub results: Vec<T>,
}

// -- Auth --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub auth_token: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SetPasswordRequest {
    pub new_password: String,
    pub current_password: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub email: String,
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

/// A followed author together with a preview of their recipes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorWithRecipes {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: i64,
}

// -- Tags & ingredients --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagResponse {
    pub id: TagId,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTagRequest {
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientResponse {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreateIngredientRequest {
    pub name: String,
    pub measurement_unit: String,
}

// -- Recipes --

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeIngredientInput {
    pub id: IngredientId,
    pub amount: f64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRecipeRequest {
    pub tags: Vec<TagId>,
    pub ingredients: Vec<RecipeIngredientInput>,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i64,
}

/// Partial update. Supplied `tags` / `ingredients` replace the previous sets.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRecipeRequest {
    #[serde(default)]
    pub tags: Option<Vec<TagId>>,
    #[serde(default)]
    pub ingredients: Option<Vec<RecipeIngredientInput>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub cooking_time: Option<i64>,
    /// Admin-only author reassignment.
    #[serde(default)]
    pub author: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredientResponse {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub id: RecipeId,
    pub tags: Vec<TagResponse>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub favorites_count: i64,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: RecipeId,
    pub name: String,
    pub image: String,
    pub cooking_time: i64,
}

// -- Shopping list --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: f64,
}
