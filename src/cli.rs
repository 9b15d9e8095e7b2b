//! Command-line arguments for the `querydb` binary.
use crate::config::Config;
use crate::core::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "querydb")]
#[command(about = "Quick interactive exploration of SQL databases")]
pub struct CliArgs {
    /// Database name or SQLite file
    #[arg(value_name = "DATABASE", conflicts_with = "database_flag")]
    pub database: Option<String>,

    /// Explore the bundled sample database
    #[arg(long)]
    pub demo: bool,

    /// Driver name (default: sqlite)
    #[arg(long)]
    pub driver: Option<String>,

    /// Server host
    #[arg(long)]
    pub host: Option<String>,

    /// Server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Database name or SQLite file (same as DATABASE)
    #[arg(long = "database", value_name = "NAME")]
    pub database_flag: Option<String>,

    /// User name
    #[arg(long)]
    pub user: Option<String>,

    /// Password (prompted for when a server driver needs one)
    #[arg(long)]
    pub password: Option<String>,

    /// Ignore QUERY_DB_* environment variables
    #[arg(long)]
    pub no_env: bool,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    /// Settings given as flags.
    pub fn to_config(&self) -> Config {
        Config {
            driver: self.driver.clone(),
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone().or_else(|| self.database_flag.clone()),
            username: self.user.clone(),
            password: self.password.clone(),
            use_env_vars: !self.no_env,
            demo: self.demo,
        }
    }

    /// Flags layered over the configuration file, if any.
    ///
    /// An explicit `--config` must exist; the default location is optional.
    pub fn effective_config(&self) -> Result<Config> {
        let file = match &self.config {
            Some(path) => Config::load(path)?,
            None => match Config::default_path().filter(|path| path.is_file()) {
                Some(path) => {
                    debug!("Reading configuration from {}", path.display());
                    Config::load(path)?
                }
                None => Config::default(),
            },
        };
        Ok(self.to_config().or(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use std::io::Write;

    fn parse(list: &[&str]) -> std::result::Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("querydb").chain(list.iter().copied()))
    }

    #[test]
    fn test_positional_database() {
        let config = parse(&["chinook.db"]).unwrap().to_config();
        assert_eq!(config.database.as_deref(), Some("chinook.db"));
        assert!(config.use_env_vars);
        assert!(!config.demo);
    }

    #[test]
    fn test_flags() {
        let config = parse(&[
            "--driver", "postgresql", "--host", "db", "--port", "6543", "--user", "me", "--no-env",
            "--database", "warehouse",
        ])
        .unwrap()
        .to_config();
        assert_eq!(config.driver.as_deref(), Some("postgresql"));
        assert_eq!(config.port, Some(6543));
        assert_eq!(config.username.as_deref(), Some("me"));
        assert_eq!(config.database.as_deref(), Some("warehouse"));
        assert!(!config.use_env_vars);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse(&["--port", "x"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
        assert!(parse(&["--host"]).is_err());
        assert_eq!(
            parse(&["--bogus"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
        assert!(parse(&["a.db", "b.db"]).is_err());
        assert!(parse(&["a.db", "--database", "b.db"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\ndatabase = \"file.db\"\nusername = \"reader\"").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = parse(&["--config", &path, "cli.db"]).unwrap();
        let config = args.effective_config().unwrap();
        assert_eq!(config.database.as_deref(), Some("cli.db"));
        assert_eq!(config.username.as_deref(), Some("reader"));
    }

    #[test]
    fn test_missing_config_file() {
        let args = parse(&["--config", "/nonexistent/querydb.toml"]).unwrap();
        assert!(args.effective_config().is_err());
    }
}
