/// Connection Management Module
///
/// This module resolves a connection URL into a live SQLite connection,
/// verifies it with a round-trip, and reports liveness on demand.

use crate::core::{QueryDbError, Result};
use rusqlite::{Connection, OpenFlags};
use std::fmt;
use tracing::{debug, info, warn};

/// Statement used to prove the connection can actually read the database.
///
/// `SELECT 1` alone would succeed against a file that is not a database,
/// because SQLite only touches the file on first page read.
const VERIFY_SQL: &str = "SELECT count(*) FROM sqlite_master";

/// Database drivers known to the URL layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Driver {
    Sqlite,
    Postgres,
    Mysql,
    /// Any other driver name, kept verbatim
    Other(String),
}

impl Driver {
    /// Parses a driver name such as `sqlite`, `postgresql+psycopg2` or `mysql`.
    ///
    /// Anything after a `+` names a client library and is ignored.
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        let base = trimmed.split('+').next().unwrap_or(trimmed).to_ascii_lowercase();
        match base.as_str() {
            "sqlite" | "sqlite3" => Driver::Sqlite,
            "postgres" | "postgresql" | "psql" => Driver::Postgres,
            "mysql" | "mariadb" => Driver::Mysql,
            _ => Driver::Other(trimmed.to_string()),
        }
    }

    /// Canonical lowercase name used in URLs.
    pub fn name(&self) -> &str {
        match self {
            Driver::Sqlite => "sqlite",
            Driver::Postgres => "postgresql",
            Driver::Mysql => "mysql",
            Driver::Other(name) => name,
        }
    }

    /// File-based engines have no notion of a password.
    pub fn requires_password(&self) -> bool {
        !matches!(self, Driver::Sqlite)
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            Driver::Postgres => Some(5432),
            Driver::Mysql => Some(3306),
            _ => None,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fully resolved connection parameters.
///
/// `Display` and `Debug` never print the password.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionUrl {
    pub driver: Driver,
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
}

impl ConnectionUrl {
    /// A SQLite URL for the given file path (or `:memory:`).
    pub fn sqlite(path: impl Into<String>) -> Self {
        ConnectionUrl {
            driver: Driver::Sqlite,
            username: None,
            password: None,
            host: None,
            port: None,
            database: Some(path.into()),
        }
    }

    /// Short database name for display: the last path segment, cut at any `:`.
    pub fn display_name(&self) -> String {
        let database = self.database.as_deref().unwrap_or("");
        let last = database.rsplit('/').next().unwrap_or(database);
        match last.split(':').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => database.to_string(),
        }
    }
}

impl fmt::Display for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.driver)?;
        if let Some(user) = &self.username {
            f.write_str(user)?;
            if self.password.is_some() {
                f.write_str(":***")?;
            }
            f.write_str("@")?;
        }
        if let Some(host) = &self.host {
            f.write_str(host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "/{}", self.database.as_deref().unwrap_or(""))
    }
}

impl fmt::Debug for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionUrl").field(&self.to_string()).finish()
    }
}

/// Lifecycle of the session connection.
///
/// Liveness checks never move the state; they only report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Unopened,
    Opened,
    Verified,
    Failed,
}

/// Owns the one connection of a session.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connection: Option<Connection>,
    state: ConnectionState,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects to the database described by `url` and verifies it.
    ///
    /// # Errors
    ///
    /// `QueryDbError::Connectivity` if the driver is not available in this
    /// build, the database cannot be opened, or the verification round-trip
    /// fails.
    pub fn connect(&mut self, url: &ConnectionUrl) -> Result<()> {
        if url.driver != Driver::Sqlite {
            self.state = ConnectionState::Failed;
            return Err(QueryDbError::Connectivity(format!(
                "driver '{}' is not supported by this build; only sqlite connections are available",
                url.driver
            )));
        }

        let path = url.database.clone().unwrap_or_else(|| ":memory:".to_string());
        info!("Connecting to {}", url);
        self.establish(&url.to_string(), || {
            if path == ":memory:" {
                Connection::open_in_memory()
            } else {
                // No SQLITE_OPEN_CREATE: a mistyped path must not yield a fresh empty database.
                Connection::open_with_flags(
                    &path,
                    OpenFlags::SQLITE_OPEN_READ_WRITE
                        | OpenFlags::SQLITE_OPEN_URI
                        | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
            }
        })
    }

    /// Opens a private in-memory database and runs `seed` against it.
    pub fn connect_seeded(&mut self, label: &str, seed: &str) -> Result<()> {
        info!("Loading in-memory database {}", label);
        self.establish(label, || {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(seed)?;
            Ok(conn)
        })
    }

    fn establish<F>(&mut self, label: &str, open: F) -> Result<()>
    where
        F: FnOnce() -> rusqlite::Result<Connection>,
    {
        self.connection = None;

        let conn = match open() {
            Ok(conn) => conn,
            Err(e) => {
                self.state = ConnectionState::Failed;
                return Err(QueryDbError::Connectivity(format!(
                    "unable to open {}: {}",
                    label, e
                )));
            }
        };
        self.state = ConnectionState::Opened;

        if let Err(e) = verify(&conn) {
            self.state = ConnectionState::Failed;
            return Err(QueryDbError::Connectivity(format!(
                "connection to {} failed verification: {}",
                label, e
            )));
        }

        self.connection = Some(conn);
        self.state = ConnectionState::Verified;
        debug!("Connection to {} verified", label);
        Ok(())
    }

    /// Closes the connection. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            debug!("Connection closed");
        }
        self.state = ConnectionState::Unopened;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Re-runs the verification round-trip. Never fails; reports `false`
    /// instead.
    pub fn is_alive(&self) -> bool {
        match &self.connection {
            Some(conn) => match verify(conn) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Liveness check failed: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Borrows the live connection.
    ///
    /// # Errors
    ///
    /// `QueryDbError::Connectivity` when no connection is open.
    pub fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or_else(|| {
            QueryDbError::Connectivity("not connected to a database".to_string())
        })
    }
}

fn verify(conn: &Connection) -> rusqlite::Result<()> {
    conn.query_row(VERIFY_SQL, [], |row| row.get::<_, i64>(0))
        .map(|_| ())
}
