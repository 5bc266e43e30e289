use larder_types::models::{RecipeId, UserId};

use crate::models::RecipeIngredientRow;
use crate::{Database, DbResult};

/// Read access needed to turn a shopping cart into a shopping list.
pub trait CartRepository {
    /// Recipes currently in the user's cart.
    fn cart_recipes_for(&self, user_id: UserId) -> DbResult<Vec<RecipeId>>;

    /// Ingredient requirements of one recipe.
    fn ingredients_for(&self, recipe_id: RecipeId) -> DbResult<Vec<RecipeIngredientRow>>;
}

impl CartRepository for Database {
    fn cart_recipes_for(&self, user_id: UserId) -> DbResult<Vec<RecipeId>> {
        self.cart_recipe_ids(user_id)
    }

    fn ingredients_for(&self, recipe_id: RecipeId) -> DbResult<Vec<RecipeIngredientRow>> {
        self.recipe_ingredients(recipe_id)
    }
}
