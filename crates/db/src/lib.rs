pub mod connection;
pub mod locks;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_with_config, connect_with_settings, ping, DbPool};
pub use locks::{SessionGuard, SessionLocks};
pub use repositories::{InMemorySessionStore, RepositoryError, SessionStore, SqlSessionStore};
