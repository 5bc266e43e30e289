use larder_types::models::{RecipeId, TagId, UserId};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row};

use super::{now_timestamp, placeholders};
use crate::models::{
    IngredientAmount, NewRecipe, RecipeChanges, RecipeFilter, RecipeIngredientRow, RecipeRow,
};
use crate::{Database, DbError, DbResult};

const RECIPE_COLUMNS: &str = "r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, r.pub_date";

impl Database {
    // -- Recipes --

    /// Persists a recipe with its tag links and ingredient amounts as one unit.
    pub fn create_recipe(&self, new: &NewRecipe) -> DbResult<RecipeId> {
        self.with_tx(|tx| {
            ensure_exist(tx, "users", &[new.author_id], "author")?;
            ensure_exist(tx, "tags", &new.tag_ids, "tags")?;
            ensure_exist(tx, "ingredients", &ingredient_ids(&new.ingredients), "ingredients")?;

            tx.execute(
                "INSERT INTO recipes (author_id, name, image, text, cooking_time, pub_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    new.author_id,
                    new.name,
                    new.image,
                    new.text,
                    new.cooking_time,
                    now_timestamp(),
                ],
            )?;
            let recipe_id = tx.last_insert_rowid();

            insert_tags(tx, recipe_id, &new.tag_ids)?;
            insert_ingredients(tx, recipe_id, &new.ingredients)?;
            Ok(recipe_id)
        })
    }

    /// Applies `changes`; returns false when the recipe does not exist.
    pub fn update_recipe(&self, id: RecipeId, changes: &RecipeChanges) -> DbResult<bool> {
        self.with_tx(|tx| {
            let Some(mut row) = query_recipe(tx, id)? else {
                return Ok(false);
            };

            if let Some(author_id) = changes.author_id {
                ensure_exist(tx, "users", &[author_id], "author")?;
                row.author_id = author_id;
            }
            if let Some(name) = &changes.name {
                row.name = name.clone();
            }
            if let Some(image) = &changes.image {
                row.image = image.clone();
            }
            if let Some(text) = &changes.text {
                row.text = text.clone();
            }
            if let Some(cooking_time) = changes.cooking_time {
                row.cooking_time = cooking_time;
            }

            tx.execute(
                "UPDATE recipes SET author_id = ?1, name = ?2, image = ?3, text = ?4, cooking_time = ?5
                 WHERE id = ?6",
                rusqlite::params![
                    row.author_id,
                    row.name,
                    row.image,
                    row.text,
                    row.cooking_time,
                    id,
                ],
            )?;

            if let Some(tag_ids) = &changes.tag_ids {
                ensure_exist(tx, "tags", tag_ids, "tags")?;
                tx.execute("DELETE FROM recipe_tags WHERE recipe_id = ?1", [id])?;
                insert_tags(tx, id, tag_ids)?;
            }

            // Full replace, never a merge.
            if let Some(parts) = &changes.ingredients {
                ensure_exist(tx, "ingredients", &ingredient_ids(parts), "ingredients")?;
                tx.execute("DELETE FROM recipe_ingredients WHERE recipe_id = ?1", [id])?;
                insert_ingredients(tx, id, parts)?;
            }

            Ok(true)
        })
    }

    /// Join rows, favourites and cart entries go with it through FK cascades.
    pub fn delete_recipe(&self, id: RecipeId) -> DbResult<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM recipes WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    pub fn get_recipe(&self, id: RecipeId) -> DbResult<Option<RecipeRow>> {
        self.with_conn(|conn| query_recipe(conn, id))
    }

    /// One page of recipes, newest first, plus the total number of matches.
    pub fn list_recipes(&self, filter: &RecipeFilter) -> DbResult<(Vec<RecipeRow>, i64)> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(author_id) = filter.author_id {
            clauses.push("r.author_id = ?".to_string());
            args.push(Value::Integer(author_id));
        }

        if !filter.tag_slugs.is_empty() {
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id
                         WHERE rt.recipe_id = r.id AND t.slug IN ({}))",
                placeholders(filter.tag_slugs.len())
            ));
            args.extend(filter.tag_slugs.iter().cloned().map(Value::Text));
        }

        // Membership filters only make sense relative to a known viewer.
        if let Some(viewer_id) = filter.viewer_id {
            for (flag, table) in [
                (filter.favorited, "favourites"),
                (filter.in_shopping_cart, "shopping_cart"),
            ] {
                if let Some(flag) = flag {
                    clauses.push(format!(
                        "{}EXISTS (SELECT 1 FROM {} m WHERE m.recipe_id = r.id AND m.user_id = ?)",
                        if flag { "" } else { "NOT " },
                        table
                    ));
                    args.push(Value::Integer(viewer_id));
                }
            }
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM recipes r {}", where_sql),
                rusqlite::params_from_iter(args.iter()),
                |row| row.get(0),
            )?;

            let mut page_args = args.clone();
            page_args.push(Value::Integer(filter.limit));
            page_args.push(Value::Integer(filter.offset));

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM recipes r {} ORDER BY r.pub_date DESC, r.id DESC LIMIT ? OFFSET ?",
                RECIPE_COLUMNS, where_sql
            ))?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(page_args.iter()), map_recipe)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok((rows, total))
        })
    }

    pub fn recipe_ingredients(&self, recipe_id: RecipeId) -> DbResult<Vec<RecipeIngredientRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT i.id, i.name, i.unit, ri.amount
                 FROM recipe_ingredients ri
                 INNER JOIN ingredients i ON i.id = ri.ingredient_id
                 WHERE ri.recipe_id = ?1
                 ORDER BY ri.id",
            )?;
            let rows = stmt
                .query_map([recipe_id], |row| {
                    Ok(RecipeIngredientRow {
                        ingredient_id: row.get(0)?,
                        name: row.get(1)?,
                        unit: row.get(2)?,
                        amount: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Newest recipes of one author, at most `limit` of them.
    pub fn recipes_by_author(&self, author_id: UserId, limit: i64) -> DbResult<Vec<RecipeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM recipes r WHERE r.author_id = ?1
                 ORDER BY r.pub_date DESC, r.id DESC LIMIT ?2",
                RECIPE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![author_id, limit], map_recipe)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_recipes_by_author(&self, author_id: UserId) -> DbResult<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM recipes WHERE author_id = ?1",
                [author_id],
                |row| row.get(0),
            )?)
        })
    }
}

fn query_recipe(conn: &Connection, id: RecipeId) -> DbResult<Option<RecipeRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM recipes r WHERE r.id = ?1", RECIPE_COLUMNS),
            [id],
            map_recipe,
        )
        .optional()?;
    Ok(row)
}

fn map_recipe(row: &Row<'_>) -> rusqlite::Result<RecipeRow> {
    Ok(RecipeRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        name: row.get(2)?,
        image: row.get(3)?,
        text: row.get(4)?,
        cooking_time: row.get(5)?,
        pub_date: row.get(6)?,
    })
}

fn ingredient_ids(parts: &[IngredientAmount]) -> Vec<i64> {
    parts.iter().map(|p| p.ingredient_id).collect()
}

/// Fails with `MissingReference(field)` unless every id is present in `table`.
fn ensure_exist(conn: &Connection, table: &str, ids: &[i64], field: &'static str) -> DbResult<()> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    if unique.is_empty() {
        return Ok(());
    }

    let found: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE id IN ({})",
            table,
            placeholders(unique.len())
        ),
        rusqlite::params_from_iter(unique.iter()),
        |row| row.get(0),
    )?;

    if found as usize != unique.len() {
        return Err(DbError::MissingReference(field));
    }
    Ok(())
}

fn insert_tags(conn: &Connection, recipe_id: RecipeId, tag_ids: &[TagId]) -> DbResult<()> {
    let mut unique = tag_ids.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let mut stmt = conn.prepare_cached("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)")?;
    for tag_id in unique {
        stmt.execute([recipe_id, tag_id])?;
    }
    Ok(())
}

fn insert_ingredients(
    conn: &Connection,
    recipe_id: RecipeId,
    parts: &[IngredientAmount],
) -> DbResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?1, ?2, ?3)",
    )?;
    for part in parts {
        stmt.execute(rusqlite::params![recipe_id, part.ingredient_id, part.amount])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecipeList;
    use crate::queries::fixtures;

    fn amounts(db: &Database, recipe_id: RecipeId) -> Vec<(String, f64)> {
        db.recipe_ingredients(recipe_id)
            .unwrap()
            .into_iter()
            .map(|r| (r.name, r.amount))
            .collect()
    }

    #[test]
    fn create_persists_tags_and_ingredients() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "chef");
        let flour = db.create_ingredient("flour", "g").unwrap();
        let eggs = db.create_ingredient("eggs", "pcs").unwrap();

        let id = fixtures::recipe(&db, author, "pancakes", &[(flour, 200.0), (eggs, 2.0)]);

        let row = db.get_recipe(id).unwrap().unwrap();
        assert_eq!(row.author_id, author);
        assert_eq!(row.cooking_time, 10);
        assert_eq!(db.tags_for_recipe(id).unwrap().len(), 1);
        assert_eq!(
            amounts(&db, id),
            vec![("flour".to_string(), 200.0), ("eggs".to_string(), 2.0)]
        );
    }

    #[test]
    fn unknown_ingredient_rolls_back_everything() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "chef");
        let tag = db.create_tag("Dinner", "#8775D2", "dinner").unwrap();

        let result = db.create_recipe(&NewRecipe {
            author_id: author,
            name: "ghost soup".into(),
            image: String::new(),
            text: "?".into(),
            cooking_time: 5,
            tag_ids: vec![tag],
            ingredients: vec![IngredientAmount {
                ingredient_id: 999,
                amount: 1.0,
            }],
        });

        assert!(matches!(result, Err(DbError::MissingReference("ingredients"))));
        assert_eq!(db.count_recipes_by_author(author).unwrap(), 0);
    }

    #[test]
    fn duplicate_ingredient_pair_is_rejected_by_the_store() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "chef");
        let salt = db.create_ingredient("salt", "g").unwrap();
        let tag = db.create_tag("Dinner", "#8775D2", "dinner").unwrap();

        let result = db.create_recipe(&NewRecipe {
            author_id: author,
            name: "salty".into(),
            image: String::new(),
            text: "!".into(),
            cooking_time: 1,
            tag_ids: vec![tag],
            ingredients: vec![
                IngredientAmount { ingredient_id: salt, amount: 1.0 },
                IngredientAmount { ingredient_id: salt, amount: 2.0 },
            ],
        });

        assert!(matches!(result, Err(DbError::Conflict)));
        assert_eq!(db.count_recipes_by_author(author).unwrap(), 0);
    }

    #[test]
    fn update_replaces_the_ingredient_set() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "chef");
        let flour = db.create_ingredient("flour", "g").unwrap();
        let eggs = db.create_ingredient("eggs", "pcs").unwrap();
        let milk = db.create_ingredient("milk", "ml").unwrap();
        let id = fixtures::recipe(&db, author, "pancakes", &[(flour, 200.0), (eggs, 2.0)]);

        let changes = RecipeChanges {
            name: Some("crepes".into()),
            ingredients: Some(vec![
                IngredientAmount { ingredient_id: milk, amount: 250.0 },
                IngredientAmount { ingredient_id: flour, amount: 120.0 },
            ]),
            ..Default::default()
        };
        assert!(db.update_recipe(id, &changes).unwrap());

        assert_eq!(db.get_recipe(id).unwrap().unwrap().name, "crepes");
        assert_eq!(
            amounts(&db, id),
            vec![("milk".to_string(), 250.0), ("flour".to_string(), 120.0)]
        );
        assert!(!db.update_recipe(4242, &changes).unwrap());
    }

    #[test]
    fn deleting_an_author_cascades_to_recipes_and_memberships() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "chef");
        let fan = fixtures::user(&db, "fan");
        let flour = db.create_ingredient("flour", "g").unwrap();
        let id = fixtures::recipe(&db, author, "bread", &[(flour, 500.0)]);
        db.add_to_list(RecipeList::ShoppingCart, fan, id).unwrap();

        db.with_conn(|conn| {
            conn.execute("DELETE FROM users WHERE id = ?1", [author])?;
            Ok(())
        })
        .unwrap();

        assert!(db.get_recipe(id).unwrap().is_none());
        assert!(db.recipe_ingredients(id).unwrap().is_empty());
        assert!(!db.is_in_list(RecipeList::ShoppingCart, fan, id).unwrap());
    }

    #[test]
    fn list_filters_and_orders_newest_first() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let flour = db.create_ingredient("flour", "g").unwrap();

        let first = fixtures::recipe(&db, alice, "first", &[(flour, 1.0)]);
        let second = fixtures::recipe(&db, bob, "second", &[(flour, 1.0)]);
        let third = fixtures::recipe(&db, alice, "third", &[(flour, 1.0)]);
        db.add_to_list(RecipeList::Favourites, bob, first).unwrap();

        let ids = |filter: RecipeFilter| {
            let (rows, total) = db.list_recipes(&filter).unwrap();
            (rows.into_iter().map(|r| r.id).collect::<Vec<_>>(), total)
        };

        let all = RecipeFilter { limit: 10, ..Default::default() };
        assert_eq!(ids(all), (vec![third, second, first], 3));

        let paged = RecipeFilter { limit: 2, offset: 2, ..Default::default() };
        assert_eq!(ids(paged), (vec![first], 3));

        let by_alice = RecipeFilter { author_id: Some(alice), limit: 10, ..Default::default() };
        assert_eq!(ids(by_alice), (vec![third, first], 2));

        let tagged = RecipeFilter {
            tag_slugs: vec!["breakfast-second".into(), "breakfast-third".into()],
            limit: 10,
            ..Default::default()
        };
        assert_eq!(ids(tagged), (vec![third, second], 2));

        let favourites = RecipeFilter {
            viewer_id: Some(bob),
            favorited: Some(true),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(ids(favourites), (vec![first], 1));

        let not_favourites = RecipeFilter {
            viewer_id: Some(bob),
            favorited: Some(false),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(ids(not_favourites), (vec![third, second], 2));

        let anonymous = RecipeFilter { favorited: Some(true), limit: 10, ..Default::default() };
        assert_eq!(ids(anonymous).1, 3);
    }
}
