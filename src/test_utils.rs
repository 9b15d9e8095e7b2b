/// # Test Utilities Module
///
/// In-memory database fixtures shared by the unit tests.

use crate::core::{QueryDbError, Result};
use rusqlite::Connection;

/// Schema with one table per primary-key shape: single key, composite key,
/// and no key at all.
pub const SAMPLE_SCHEMA: &str = "
    CREATE TABLE accounts (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        balance REAL
    );

    CREATE TABLE memberships (
        account_id INTEGER NOT NULL,
        team TEXT NOT NULL,
        role TEXT,
        PRIMARY KEY (account_id, team)
    );

    CREATE TABLE events (
        happened_at TEXT,
        message TEXT
    );
";

pub const SAMPLE_DATA: &str = "
    INSERT INTO accounts (id, name, balance) VALUES
        (1, 'alice', 120.5),
        (2, 'bob', 0.0),
        (3, 'carol', 87.25),
        (4, 'dave', NULL);

    INSERT INTO memberships (account_id, team, role) VALUES
        (1, 'core', 'lead'),
        (1, 'docs', 'member'),
        (2, 'core', 'member'),
        (3, 'ops', 'lead');

    INSERT INTO events (happened_at, message) VALUES
        ('2024-01-01', 'created'),
        ('2024-01-02', 'renamed');
";

/// Isolated database test fixture
pub struct DatabaseFixture {
    pub connection: Connection,
}

impl DatabaseFixture {
    /// An empty in-memory database
    pub fn new() -> Result<Self> {
        let connection = Connection::open_in_memory().map_err(QueryDbError::Database)?;
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(DatabaseFixture { connection })
    }

    /// An in-memory database with the sample schema and rows loaded
    pub fn with_sample_data() -> Result<Self> {
        let fixture = Self::new()?;
        fixture.connection.execute_batch(SAMPLE_SCHEMA)?;
        fixture.connection.execute_batch(SAMPLE_DATA)?;
        Ok(fixture)
    }
}

/// The sample schema and data as one script, for seeding a session.
pub fn sample_script() -> String {
    format!("{}\n{}", SAMPLE_SCHEMA, SAMPLE_DATA)
}
