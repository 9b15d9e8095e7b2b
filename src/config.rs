//! Connection configuration and its resolution.
//!
//! A [`Config`] holds whatever the caller stated explicitly. [`resolve`]
//! fills the gaps with environment variables (when allowed) and then with
//! built-in defaults, in that order.
use crate::core::db::{ConnectionUrl, Driver};
use crate::core::{QueryDbError, Result};
use crate::password::PasswordPrompt;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_DRIVER: &str = "QUERY_DB_DRIVER";
pub const ENV_HOST: &str = "QUERY_DB_HOST";
pub const ENV_PORT: &str = "QUERY_DB_PORT";
pub const ENV_NAME: &str = "QUERY_DB_NAME";
pub const ENV_PASS: &str = "QUERY_DB_PASS";

/// Name under which the bundled sample database is reported.
pub const DEMO_DATABASE: &str = "sample_data/Chinook_Sample.sqlite";

/// Explicit connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub driver: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Fill unset fields from `QUERY_DB_*` environment variables
    pub use_env_vars: bool,
    /// Use the bundled sample database; implies no environment lookup
    pub demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            driver: None,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            use_env_vars: true,
            demo: false,
        }
    }
}

/// Layout of the TOML configuration file.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    connection: Config,
}

impl Config {
    /// A SQLite file (or `:memory:`) with environment lookup disabled.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Config {
            driver: Some("sqlite".to_string()),
            database: Some(path.into()),
            use_env_vars: false,
            ..Config::default()
        }
    }

    pub fn demo() -> Self {
        Config {
            demo: true,
            use_env_vars: false,
            ..Config::default()
        }
    }

    /// Field-wise fallback: values set on `self` win.
    ///
    /// Environment lookup stays enabled only if both sides allow it; demo
    /// mode is on if either side asks for it.
    pub fn or(self, fallback: Config) -> Config {
        Config {
            driver: self.driver.or(fallback.driver),
            host: self.host.or(fallback.host),
            port: self.port.or(fallback.port),
            database: self.database.or(fallback.database),
            username: self.username.or(fallback.username),
            password: self.password.or(fallback.password),
            use_env_vars: self.use_env_vars && fallback.use_env_vars,
            demo: self.demo || fallback.demo,
        }
    }

    /// Parses the `[connection]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Config> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| QueryDbError::Config(e.to_string()))?;
        Ok(file.connection)
    }

    /// Loads configuration from a TOML file at the given path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            QueryDbError::Config(format!("unable to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// `<config dir>/querydb/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("querydb").join("config.toml"))
    }
}

/// Read access to environment variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// What a configuration resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The bundled sample database
    Demo(ConnectionUrl),
    Database(ConnectionUrl),
}

impl Target {
    pub fn url(&self) -> &ConnectionUrl {
        match self {
            Target::Demo(url) | Target::Database(url) => url,
        }
    }
}

/// Resolves `config` into a connection target.
///
/// Each field is taken from the explicit value, else from its environment
/// variable (only when `use_env_vars` is set), else from a default. A
/// password is prompted for only when the driver needs one and nothing else
/// supplied it.
///
/// # Errors
///
/// `QueryDbError::Config` for an unparsable port or a missing database name;
/// whatever the prompt returns if prompting fails.
pub fn resolve(
    config: &Config,
    env: &dyn EnvSource,
    prompt: &dyn PasswordPrompt,
) -> Result<Target> {
    if config.demo {
        debug!("Demo mode: using the bundled sample database");
        return Ok(Target::Demo(ConnectionUrl::sqlite(DEMO_DATABASE)));
    }

    let lookup = |explicit: &Option<String>, key: &str| -> Option<String> {
        explicit
            .clone()
            .or_else(|| config.use_env_vars.then(|| env.var(key)).flatten())
    };

    let driver = lookup(&config.driver, ENV_DRIVER)
        .map(|name| Driver::parse(&name))
        .unwrap_or(Driver::Sqlite);

    let host = lookup(&config.host, ENV_HOST)
        .or_else(|| driver.requires_password().then(|| "localhost".to_string()));

    let port = match config.port {
        Some(port) => Some(port),
        None => match config.use_env_vars.then(|| env.var(ENV_PORT)).flatten() {
            Some(raw) => Some(parse_port(&raw)?),
            None => driver.default_port(),
        },
    };

    let database = lookup(&config.database, ENV_NAME).ok_or_else(|| {
        QueryDbError::Config(format!(
            "no database given; set `database`, export {}, or use demo mode",
            ENV_NAME
        ))
    })?;

    let password = if driver.requires_password() {
        match lookup(&config.password, ENV_PASS) {
            Some(password) => Some(password),
            None => Some(prompt.prompt_password(&driver)?),
        }
    } else {
        None
    };

    Ok(Target::Database(ConnectionUrl {
        driver,
        username: config.username.clone(),
        password,
        host,
        port,
        database: Some(database),
    }))
}

fn parse_port(raw: &str) -> Result<u16> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| QueryDbError::Config(format!("invalid port '{}'", raw)))
}
