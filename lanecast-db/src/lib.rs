mod schema;

pub mod config;
pub mod conn;
pub mod db;
pub mod event;
pub mod migrations;
pub mod models;

pub(crate) use schema::*;

pub use conn::{ConnectError, establish};
pub use event::{Event, EventType};
pub use migrations::{MigrationError, run_migrations};

pub use diesel::{Connection, SqliteConnection};
