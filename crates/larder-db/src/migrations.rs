use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                email       TEXT NOT NULL UNIQUE,
                username    TEXT NOT NULL UNIQUE,
                first_name  TEXT NOT NULL DEFAULT '',
                last_name   TEXT NOT NULL DEFAULT '',
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                created_at  TEXT NOT NULL
            );

            CREATE TABLE tags (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL,
                color   TEXT NOT NULL,
                slug    TEXT NOT NULL UNIQUE
            );

            CREATE TABLE ingredients (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                name    TEXT NOT NULL,
                unit    TEXT NOT NULL
            );

            CREATE INDEX idx_ingredients_name ON ingredients(name);

            CREATE TABLE recipes (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                image           TEXT NOT NULL DEFAULT '',
                text            TEXT NOT NULL,
                cooking_time    INTEGER NOT NULL CHECK (cooking_time >= 1),
                pub_date        TEXT NOT NULL
            );

            CREATE INDEX idx_recipes_pub_date ON recipes(pub_date);
            CREATE INDEX idx_recipes_author ON recipes(author_id);

            CREATE TABLE recipe_tags (
                recipe_id   INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                tag_id      INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (recipe_id, tag_id)
            );

            CREATE TABLE recipe_ingredients (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                recipe_id       INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                ingredient_id   INTEGER NOT NULL REFERENCES ingredients(id) ON DELETE CASCADE,
                amount          REAL NOT NULL CHECK (amount >= 0),
                UNIQUE (recipe_id, ingredient_id)
            );

            CREATE TABLE favourites (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                recipe_id   INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (user_id, recipe_id)
            );

            CREATE TABLE shopping_cart (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                recipe_id   INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (user_id, recipe_id)
            );

            CREATE TABLE followers (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                author_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (user_id, author_id),
                CHECK (user_id <> author_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_twice_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
