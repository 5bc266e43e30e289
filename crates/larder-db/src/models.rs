//! Database row types. These map directly to SQLite rows and stay
//! independent of the larder-types API models.

use larder_types::models::{IngredientId, RecipeId, Role, TagId, UserId};

pub struct UserRow {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Role,
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
}

pub struct TagRow {
    pub id: TagId,
    pub name: String,
    pub color: String,
    pub slug: String,
}

pub struct IngredientRow {
    pub id: IngredientId,
    pub name: String,
    pub unit: String,
}

pub struct RecipeRow {
    pub id: RecipeId,
    pub author_id: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
    pub pub_date: String,
}

/// One ingredient requirement of a recipe, joined with the ingredient itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeIngredientRow {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub unit: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngredientAmount {
    pub ingredient_id: IngredientId,
    pub amount: f64,
}

pub struct NewRecipe {
    pub author_id: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
    pub tag_ids: Vec<TagId>,
    pub ingredients: Vec<IngredientAmount>,
}

/// Field-wise changes to a recipe. `None` leaves the column untouched; a
/// supplied tag or ingredient set replaces the stored one entirely.
#[derive(Default)]
pub struct RecipeChanges {
    pub author_id: Option<UserId>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
    pub tag_ids: Option<Vec<TagId>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
}

#[derive(Default)]
pub struct RecipeFilter {
    pub author_id: Option<UserId>,
    /// Recipes carrying any of these tag slugs.
    pub tag_slugs: Vec<String>,
    /// User the membership filters below are evaluated against.
    pub viewer_id: Option<UserId>,
    pub favorited: Option<bool>,
    pub in_shopping_cart: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

/// Per-user recipe sets backed by a (user, recipe) unique table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favourites,
    ShoppingCart,
}

impl RecipeList {
    pub(crate) fn table(self) -> &'static str {
        match self {
            RecipeList::Favourites => "favourites",
            RecipeList::ShoppingCart => "shopping_cart",
        }
    }
}
