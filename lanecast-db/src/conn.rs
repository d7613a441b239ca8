use diesel::connection::SimpleConnection;
use diesel::{Connection, ConnectionError, SqliteConnection};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConnectError {
    #[error("couldn't open database at configured path")]
    FailedToConnect(#[source] ConnectionError),

    #[error("couldn't apply connection pragmas")]
    FailedToConfigure(#[source] diesel::result::Error),
}

// WAL lets resolver reads proceed while a build transaction holds the write
// lock; the busy timeout covers transient lock contention between the worker
// and the resolver process.
fn apply_pragmas(conn: &mut SqliteConnection) -> diesel::QueryResult<()> {
    conn.batch_execute(
        "pragma journal_mode = wal; \
         pragma busy_timeout = 5000; \
         pragma foreign_keys = on; \
         pragma synchronous = normal;",
    )
}

pub fn establish(db_path: &str) -> Result<SqliteConnection, ConnectError> {
    let mut conn =
        SqliteConnection::establish(db_path).map_err(ConnectError::FailedToConnect)?;
    apply_pragmas(&mut conn).map_err(ConnectError::FailedToConfigure)?;
    Ok(conn)
}
