use larder_types::models::{Role, UserId};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::warn;

use super::now_timestamp;
use crate::models::{NewUser, UserRow};
use crate::{Database, DbResult};

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, password, role";

impl Database {
    // -- Users --

    /// Inserts a user. A taken email or username surfaces as `DbError::Conflict`.
    pub fn create_user(&self, new: &NewUser<'_>) -> DbResult<UserId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, username, first_name, last_name, password, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    new.email,
                    new.username,
                    new.first_name,
                    new.last_name,
                    new.password_hash,
                    new.role.as_str(),
                    now_timestamp(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, id: UserId) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id))
    }

    pub fn get_user_by_email(&self, email: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", &email))
    }

    pub fn list_users(&self, limit: i64, offset: i64) -> DbResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY id LIMIT ?1 OFFSET ?2",
                USER_COLUMNS
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![limit, offset], map_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_users(&self) -> DbResult<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
        })
    }

    pub fn update_password(&self, id: UserId, password_hash: &str) -> DbResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2",
                rusqlite::params![password_hash, id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Returns false when no user has that email.
    pub fn set_role_by_email(&self, email: &str, role: Role) -> DbResult<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET role = ?1 WHERE email = ?2",
                rusqlite::params![role.as_str(), email],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_user(
    conn: &Connection,
    predicate: &str,
    value: &dyn rusqlite::ToSql,
) -> DbResult<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE {}",
        USER_COLUMNS, predicate
    ))?;
    let row = stmt.query_row([value], map_user).optional()?;
    Ok(row)
}

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let id: UserId = row.get(0)?;
    let role: String = row.get(6)?;
    Ok(UserRow {
        id,
        email: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        password: row.get(5)?,
        role: role.parse().unwrap_or_else(|e| {
            warn!("Corrupt role on user {}: {}", id, e);
            Role::User
        }),
    })
}

pub(crate) fn user_columns_prefixed(alias: &str) -> String {
    USER_COLUMNS
        .split(", ")
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;
    use crate::queries::fixtures;

    #[test]
    fn duplicate_email_or_username_is_a_conflict() {
        let db = fixtures::db();
        fixtures::user(&db, "alice");

        let same_email = NewUser {
            email: "alice@example.com",
            username: "alice2",
            first_name: "",
            last_name: "",
            password_hash: "x",
            role: Role::User,
        };
        assert!(matches!(db.create_user(&same_email), Err(DbError::Conflict)));

        let same_username = NewUser {
            email: "other@example.com",
            username: "alice",
            ..same_email
        };
        assert!(matches!(db.create_user(&same_username), Err(DbError::Conflict)));
        assert_eq!(db.count_users().unwrap(), 1);
    }

    #[test]
    fn role_and_password_updates() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "bob");

        assert!(db.set_role_by_email("bob@example.com", Role::Admin).unwrap());
        assert!(!db.set_role_by_email("nobody@example.com", Role::Admin).unwrap());
        assert!(db.update_password(id, "new-hash").unwrap());

        let row = db.get_user_by_email("bob@example.com").unwrap().unwrap();
        assert_eq!(row.role, Role::Admin);
        assert_eq!(row.password, "new-hash");
    }
}
