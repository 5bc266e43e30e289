use larder_types::models::{RecipeId, UserId};

use super::users::{map_user, user_columns_prefixed};
use crate::models::{RecipeList, UserRow};
use crate::{Database, DbResult};

impl Database {
    // -- Favourites & shopping cart --

    /// Inserts the (user, recipe) pair. The unique constraint is the
    /// duplicate check: a second insert fails with `DbError::Conflict`.
    pub fn add_to_list(&self, list: RecipeList, user_id: UserId, recipe_id: RecipeId) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO {} (user_id, recipe_id) VALUES (?1, ?2)", list.table()),
                [user_id, recipe_id],
            )?;
            Ok(())
        })
    }

    /// Returns false when the pair was not present.
    pub fn remove_from_list(
        &self,
        list: RecipeList,
        user_id: UserId,
        recipe_id: RecipeId,
    ) -> DbResult<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                &format!("DELETE FROM {} WHERE user_id = ?1 AND recipe_id = ?2", list.table()),
                [user_id, recipe_id],
            )?;
            Ok(deleted > 0)
        })
    }

    pub fn is_in_list(&self, list: RecipeList, user_id: UserId, recipe_id: RecipeId) -> DbResult<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                &format!(
                    "SELECT EXISTS (SELECT 1 FROM {} WHERE user_id = ?1 AND recipe_id = ?2)",
                    list.table()
                ),
                [user_id, recipe_id],
                |row| row.get(0),
            )?)
        })
    }

    pub fn count_favourites(&self, recipe_id: RecipeId) -> DbResult<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM favourites WHERE recipe_id = ?1",
                [recipe_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Recipe ids in a user's shopping cart, in the order they were added.
    pub fn cart_recipe_ids(&self, user_id: UserId) -> DbResult<Vec<RecipeId>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT recipe_id FROM shopping_cart WHERE user_id = ?1 ORDER BY id")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    // -- Followers --

    /// Same contract as `add_to_list`. Self-follows are also refused by a
    /// CHECK constraint, but callers are expected to reject them first.
    pub fn add_follower(&self, user_id: UserId, author_id: UserId) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO followers (user_id, author_id) VALUES (?1, ?2)",
                [user_id, author_id],
            )?;
            Ok(())
        })
    }

    pub fn remove_follower(&self, user_id: UserId, author_id: UserId) -> DbResult<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM followers WHERE user_id = ?1 AND author_id = ?2",
                [user_id, author_id],
            )?;
            Ok(deleted > 0)
        })
    }

    pub fn is_following(&self, user_id: UserId, author_id: UserId) -> DbResult<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM followers WHERE user_id = ?1 AND author_id = ?2)",
                [user_id, author_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Authors followed by `user_id`, oldest subscription first.
    pub fn list_followed_authors(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}
                 FROM followers f
                 INNER JOIN users u ON u.id = f.author_id
                 WHERE f.user_id = ?1
                 ORDER BY f.id
                 LIMIT ?2 OFFSET ?3",
                user_columns_prefixed("u")
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit, offset], map_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_followed_authors(&self, user_id: UserId) -> DbResult<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM followers WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;
    use crate::queries::fixtures;

    #[test]
    fn second_add_is_a_conflict_and_keeps_one_row() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "chef");
        let fan = fixtures::user(&db, "fan");
        let flour = db.create_ingredient("flour", "g").unwrap();
        let recipe = fixtures::recipe(&db, author, "bread", &[(flour, 500.0)]);

        db.add_to_list(RecipeList::Favourites, fan, recipe).unwrap();
        assert!(matches!(
            db.add_to_list(RecipeList::Favourites, fan, recipe),
            Err(DbError::Conflict)
        ));
        assert_eq!(db.count_favourites(recipe).unwrap(), 1);

        // The two lists are independent.
        assert!(!db.is_in_list(RecipeList::ShoppingCart, fan, recipe).unwrap());
    }

    #[test]
    fn adding_a_missing_recipe_is_a_missing_reference() {
        let db = fixtures::db();
        let fan = fixtures::user(&db, "fan");
        assert!(matches!(
            db.add_to_list(RecipeList::ShoppingCart, fan, 77),
            Err(DbError::MissingReference(_))
        ));
    }

    #[test]
    fn remove_reports_whether_anything_was_deleted() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "chef");
        let fan = fixtures::user(&db, "fan");
        let flour = db.create_ingredient("flour", "g").unwrap();
        let recipe = fixtures::recipe(&db, author, "bread", &[(flour, 500.0)]);

        assert!(!db.remove_from_list(RecipeList::ShoppingCart, fan, recipe).unwrap());
        db.add_to_list(RecipeList::ShoppingCart, fan, recipe).unwrap();
        assert_eq!(db.cart_recipe_ids(fan).unwrap(), vec![recipe]);
        assert!(db.remove_from_list(RecipeList::ShoppingCart, fan, recipe).unwrap());
        assert!(db.cart_recipe_ids(fan).unwrap().is_empty());
    }

    #[test]
    fn followers_are_unique_and_never_self_referential() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");

        db.add_follower(alice, bob).unwrap();
        assert!(matches!(db.add_follower(alice, bob), Err(DbError::Conflict)));
        assert!(matches!(db.add_follower(alice, alice), Err(DbError::Sqlite(_))));

        assert!(db.is_following(alice, bob).unwrap());
        assert!(!db.is_following(bob, alice).unwrap());
        assert_eq!(db.count_followed_authors(alice).unwrap(), 1);

        let authors = db.list_followed_authors(alice, 10, 0).unwrap();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].username, "bob");
    }
}
