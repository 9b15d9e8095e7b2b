//! The session object: one verified connection, its schema snapshot, and the
//! query entry point.
use crate::accessor::Accessor;
use crate::config::{resolve, Config, EnvSource, ProcessEnv, Target};
use crate::core::db::{
    check_sql, Catalog, ConnectionManager, ConnectionState, ConnectionUrl, QueryExecutor,
    QueryOutput, RawResult, ReturnAs, Summary,
};
use crate::core::{QueryWarning, Result};
use crate::demo::SAMPLE_SQL;
use crate::password::{PasswordPrompt, TerminalPrompt};
use crate::results_grid::ResultsGrid;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use tracing::info;

/// Warnings held for [`QueryDb::take_warnings`] before the oldest are dropped.
pub const MAX_PENDING_WARNINGS: usize = 100;

/// A database session for interactive exploration.
///
/// Calls block until the database answers. The type is deliberately not
/// `Sync`: callers serialize their use of a session.
#[derive(Debug)]
pub struct QueryDb {
    manager: ConnectionManager,
    url: ConnectionUrl,
    catalog: Catalog,
    warnings: RefCell<VecDeque<QueryWarning>>,
}

impl QueryDb {
    /// Connects using the process environment and a terminal password prompt.
    pub fn connect(config: &Config) -> Result<Self> {
        Self::connect_with(config, &ProcessEnv, &TerminalPrompt)
    }

    /// Connects with an explicit environment and password source.
    ///
    /// # Errors
    ///
    /// `Config` errors from resolution, `Connectivity` if the database cannot
    /// be opened or verified. Nothing is retried.
    pub fn connect_with(
        config: &Config,
        env: &dyn EnvSource,
        prompt: &dyn PasswordPrompt,
    ) -> Result<Self> {
        let mut manager = ConnectionManager::new();
        let url = match resolve(config, env, prompt)? {
            Target::Demo(url) => {
                manager.connect_seeded(&url.to_string(), SAMPLE_SQL)?;
                url
            }
            Target::Database(url) => {
                manager.connect(&url)?;
                url
            }
        };
        Self::reflect(manager, url)
    }

    /// Session on the bundled sample database.
    pub fn demo() -> Result<Self> {
        Self::connect(&Config::demo())
    }

    /// Session on a SQLite file, ignoring the environment.
    pub fn open(path: impl Into<String>) -> Result<Self> {
        Self::connect(&Config::sqlite(path))
    }

    /// Session on a private in-memory database seeded with `script`.
    pub fn from_script(label: &str, script: &str) -> Result<Self> {
        let mut manager = ConnectionManager::new();
        manager.connect_seeded(label, script)?;
        Self::reflect(manager, ConnectionUrl::sqlite(label))
    }

    fn reflect(manager: ConnectionManager, url: ConnectionUrl) -> Result<Self> {
        let catalog = Catalog::from_connection(manager.connection()?)?;
        info!(
            "Connected to {} with {} tables",
            url.display_name(),
            catalog.len()
        );
        Ok(QueryDb {
            manager,
            url,
            catalog,
            warnings: RefCell::new(VecDeque::new()),
        })
    }

    /// Re-checks the connection with a round-trip. Never fails.
    pub fn is_alive(&self) -> bool {
        self.manager.is_alive()
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Closes the connection; later queries fail with a connectivity error.
    pub fn disconnect(&mut self) {
        info!("Disconnecting from {}", self.url.display_name());
        self.manager.disconnect();
    }

    pub fn url(&self) -> &ConnectionUrl {
        &self.url
    }

    /// Short database name used in descriptions.
    pub fn name(&self) -> String {
        self.url.display_name()
    }

    /// The schema snapshot taken at connection time.
    pub fn inspect(&self) -> &Catalog {
        &self.catalog
    }

    pub fn summary(&self) -> Summary {
        self.catalog.summary()
    }

    pub fn table(&self, name: &str) -> Option<Accessor<'_>> {
        self.catalog
            .get(name)
            .map(|table| Accessor::for_table(self, table))
    }

    pub fn try_table(&self, name: &str) -> Result<Accessor<'_>> {
        let table = self.catalog.try_get(name)?;
        Ok(Accessor::for_table(self, table))
    }

    pub fn column(&self, table: &str, column: &str) -> Option<Accessor<'_>> {
        self.table(table)?.column(column)
    }

    /// Runs raw SQL. `return_as` selects the result form, see [`ReturnAs`].
    ///
    /// # Errors
    ///
    /// `Usage` for an unrecognized `return_as` or empty SQL, raised before the
    /// connection is touched; `Connectivity` when disconnected; `Query` when
    /// the database rejects the statement.
    pub fn query(&self, sql: &str, return_as: &str) -> Result<QueryOutput<'_>> {
        let mode: ReturnAs = return_as.parse()?;
        self.query_as(sql, mode)
    }

    pub fn query_as(&self, sql: &str, mode: ReturnAs) -> Result<QueryOutput<'_>> {
        let sql = check_sql(sql)?;
        let conn = self.manager.connection()?;
        QueryExecutor::new(conn).run(sql, mode)
    }

    /// Shorthand for a tabular query.
    pub fn q(&self, sql: &str) -> Result<Option<ResultsGrid>> {
        self.query_as(sql, ReturnAs::Tabular)?.into_tabular()
    }

    /// Hands a raw result to `f` and releases it once `f` returns.
    pub fn with_raw<T, F>(&self, sql: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut RawResult<'_>) -> Result<T>,
    {
        let sql = check_sql(sql)?;
        let conn = self.manager.connection()?;
        let mut raw = QueryExecutor::new(conn).open_raw(sql)?;
        let outcome = f(&mut raw);
        raw.close();
        outcome
    }

    /// Drains the warnings raised since the last call, oldest first.
    ///
    /// Only the most recent [`MAX_PENDING_WARNINGS`] are kept between calls;
    /// every warning is also logged through `tracing` when raised.
    pub fn take_warnings(&self) -> Vec<QueryWarning> {
        self.warnings.take().into()
    }

    pub(crate) fn record_warning(&self, warning: QueryWarning) {
        let mut warnings = self.warnings.borrow_mut();
        if warnings.len() == MAX_PENDING_WARNINGS {
            warnings.pop_front();
        }
        warnings.push_back(warning);
    }
}

impl fmt::Display for QueryDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_alive() {
            "Working connection"
        } else {
            "Inactive connection"
        };
        write!(
            f,
            "{} to a remote {} DB: {}",
            status,
            self.url.driver.name().to_ascii_uppercase(),
            self.name()
        )
    }
}
