//! Interactive password acquisition for drivers that need credentials.
use crate::core::db::Driver;
use crate::core::Result;
use tracing::debug;

/// Source of a password when neither the configuration nor the environment
/// supplies one.
pub trait PasswordPrompt {
    fn prompt_password(&self, driver: &Driver) -> Result<String>;
}

/// Reads the password from the controlling terminal without echo.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn prompt_password(&self, driver: &Driver) -> Result<String> {
        debug!("Prompting for the {} password", driver);
        let message = format!("Please enter the {} server password: ", driver);
        Ok(rpassword::prompt_password(message)?)
    }
}

impl<F> PasswordPrompt for F
where
    F: Fn(&Driver) -> Result<String>,
{
    fn prompt_password(&self, driver: &Driver) -> Result<String> {
        self(driver)
    }
}
