//! Shopping list aggregation: every ingredient needed by the recipes in a
//! user's cart, one line per ingredient with the amounts summed.

use std::collections::HashMap;
use std::fmt::Write as _;

use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, warn};

use larder_db::CartRepository;
use larder_types::api::ShoppingListItem;
use larder_types::models::{IngredientId, UserId};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::{AppState, run_blocking};

pub const FILENAME: &str = "shopping_list.txt";

/// Totals are kept to this many decimal places.
const AMOUNT_DECIMALS: i32 = 3;

fn round_amount(amount: f64) -> f64 {
    let scale = 10f64.powi(AMOUNT_DECIMALS);
    (amount * scale).round() / scale
}

/// `350`, `0.3`, `1.125`: fixed precision with trailing zeros dropped.
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.*}", AMOUNT_DECIMALS as usize, amount);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Merges the ingredient requirements of all recipes in `user_id`'s cart.
///
/// Rows are grouped by ingredient id and sorted by name, then unit, then id,
/// so the same cart always renders the same list. An empty cart yields an
/// empty list. A total that no longer fits in an `f64` is an error rather
/// than an infinite amount.
pub fn build_shopping_list<R>(repo: &R, user_id: UserId) -> Result<Vec<ShoppingListItem>, ApiError>
where
    R: CartRepository + ?Sized,
{
    let mut totals: HashMap<IngredientId, (String, String, f64)> = HashMap::new();

    for recipe_id in repo.cart_recipes_for(user_id)? {
        for row in repo.ingredients_for(recipe_id)? {
            totals
                .entry(row.ingredient_id)
                .and_modify(|(_, _, amount)| *amount += row.amount)
                .or_insert((row.name, row.unit, row.amount));
        }
    }

    let mut rows: Vec<_> = totals.into_iter().collect();
    rows.sort_by(|(a_id, (a_name, a_unit, _)), (b_id, (b_name, b_unit, _))| {
        a_name
            .cmp(b_name)
            .then_with(|| a_unit.cmp(b_unit))
            .then_with(|| a_id.cmp(b_id))
    });

    rows.into_iter()
        .map(|(id, (name, measurement_unit, amount))| {
            if !amount.is_finite() {
                warn!("Shopping list total for ingredient {} overflowed", id);
                return Err(ApiError::validation(
                    "shopping_cart",
                    format!("total amount of {} is too large", name),
                ));
            }
            Ok(ShoppingListItem {
                name,
                measurement_unit,
                amount: round_amount(amount),
            })
        })
        .collect()
}

/// One `name amount unit` line per item.
pub fn render_text(items: &[ShoppingListItem]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(
            out,
            "{} {} {}",
            item.name,
            format_amount(item.amount),
            item.measurement_unit
        );
    }
    out
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListFormat {
    #[default]
    Txt,
    Json,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub format: ListFormat,
}

/// GET /recipes/download_shopping_cart
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let user_id = actor.id;
    let items = run_blocking(&state, move |db| build_shopping_list(db, user_id)).await?;
    debug!("Shopping list for user {}: {} items", user_id, items.len());

    let response = match query.format {
        ListFormat::Json => Json(items).into_response(),
        ListFormat::Txt => (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", FILENAME),
                ),
            ],
            render_text(&items),
        )
            .into_response(),
    };
    Ok(response)
}
