use rusqlite::ffi;
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// A unique or primary-key constraint rejected the write.
    #[error("unique constraint violated")]
    Conflict,

    /// A foreign key, or an id checked inside a transaction, points nowhere.
    #[error("reference to a missing {0}")]
    MissingReference(&'static str),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return DbError::Conflict;
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return DbError::MissingReference("row"),
                _ => {}
            }
        }
        DbError::Sqlite(err)
    }
}
