use larder_types::models::{IngredientId, RecipeId, TagId};
use rusqlite::{OptionalExtension, Row};

use crate::models::{IngredientRow, TagRow};
use crate::{Database, DbResult};

impl Database {
    // -- Tags --

    /// A taken slug surfaces as `DbError::Conflict`.
    pub fn create_tag(&self, name: &str, color: &str, slug: &str) -> DbResult<TagId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tags (name, color, slug) VALUES (?1, ?2, ?3)",
                (name, color, slug),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_tags(&self) -> DbResult<Vec<TagRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, color, slug FROM tags ORDER BY id")?;
            let rows = stmt
                .query_map([], map_tag)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_tag(&self, id: TagId) -> DbResult<Option<TagRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, color, slug FROM tags WHERE id = ?1",
                    [id],
                    map_tag,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn tags_for_recipe(&self, recipe_id: RecipeId) -> DbResult<Vec<TagRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.name, t.color, t.slug
                 FROM recipe_tags rt
                 INNER JOIN tags t ON t.id = rt.tag_id
                 WHERE rt.recipe_id = ?1
                 ORDER BY t.id",
            )?;
            let rows = stmt
                .query_map([recipe_id], map_tag)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Ingredients --

    pub fn create_ingredient(&self, name: &str, unit: &str) -> DbResult<IngredientId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO ingredients (name, unit) VALUES (?1, ?2)",
                (name, unit),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_ingredient(&self, id: IngredientId) -> DbResult<Option<IngredientRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, unit FROM ingredients WHERE id = ?1",
                    [id],
                    map_ingredient,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Ingredients whose name contains `needle`, case-insensitively, by name.
    pub fn search_ingredients(&self, needle: Option<&str>) -> DbResult<Vec<IngredientRow>> {
        let needle = needle.map(str::trim).filter(|n| !n.is_empty());

        let rows = self.with_conn(|conn| {
            let rows = match needle {
                // LIKE folds ASCII case only, so it can narrow ASCII needles.
                Some(n) if n.is_ascii() => conn
                    .prepare(
                        "SELECT id, name, unit FROM ingredients
                         WHERE name LIKE '%' || ?1 || '%' ESCAPE '\\'
                         ORDER BY name, id",
                    )?
                    .query_map([escape_like(n)], map_ingredient)?
                    .collect::<Result<Vec<_>, _>>()?,
                _ => conn
                    .prepare("SELECT id, name, unit FROM ingredients ORDER BY name, id")?
                    .query_map([], map_ingredient)?
                    .collect::<Result<Vec<_>, _>>()?,
            };
            Ok(rows)
        })?;

        let needle = match needle {
            Some(n) => n.to_lowercase(),
            None => return Ok(rows),
        };
        Ok(rows
            .into_iter()
            .filter(|row| row.name.to_lowercase().contains(&needle))
            .collect())
    }
}

/// Makes `%`, `_` and `\` match literally in a LIKE pattern escaped with `\`.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn map_tag(row: &Row<'_>) -> rusqlite::Result<TagRow> {
    Ok(TagRow {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        slug: row.get(3)?,
    })
}

fn map_ingredient(row: &Row<'_>) -> rusqlite::Result<IngredientRow> {
    Ok(IngredientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        unit: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::DbError;
    use crate::queries::fixtures;

    #[test]
    fn tag_slug_is_unique() {
        let db = fixtures::db();
        db.create_tag("Lunch", "#49B64E", "lunch").unwrap();
        assert!(matches!(
            db.create_tag("Lunch again", "#000000", "lunch"),
            Err(DbError::Conflict)
        ));
        assert_eq!(db.list_tags().unwrap().len(), 1);
    }

    #[test]
    fn ingredient_search_is_case_insensitive_substring() {
        let db = fixtures::db();
        db.create_ingredient("Wheat flour", "g").unwrap();
        db.create_ingredient("Мука ржаная", "g").unwrap();
        db.create_ingredient("Eggs", "pcs").unwrap();

        let names = |needle: Option<&str>| {
            db.search_ingredients(needle)
                .unwrap()
                .into_iter()
                .map(|r| r.name)
                .collect::<Vec<_>>()
        };

        assert_eq!(names(Some("FLOUR")), vec!["Wheat flour"]);
        assert_eq!(names(Some("мука")), vec!["Мука ржаная"]);
        assert_eq!(names(None).len(), 3);
        assert_eq!(names(Some("  ")).len(), 3);
        assert!(names(Some("sugar")).is_empty());
    }

    #[test]
    fn like_wildcards_in_the_needle_are_literal() {
        let db = fixtures::db();
        db.create_ingredient("Cream 50%", "ml").unwrap();
        db.create_ingredient("sea_salt", "g").unwrap();
        db.create_ingredient("Eggs", "pcs").unwrap();

        let names = |needle: &str| {
            db.search_ingredients(Some(needle))
                .unwrap()
                .into_iter()
                .map(|r| r.name)
                .collect::<Vec<_>>()
        };

        assert_eq!(names("%"), vec!["Cream 50%"]);
        assert_eq!(names("50%"), vec!["Cream 50%"]);
        assert_eq!(names("_"), vec!["sea_salt"]);
        assert_eq!(names("A_S"), vec!["sea_salt"]);
        assert!(names("e%s").is_empty());
        assert!(names("\\").is_empty());
    }
}
