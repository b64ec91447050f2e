//! Application configuration
//!
//! Read from an optional `citiverse.toml`, then overridden by environment
//! variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use citiverse_net::{LogMailer, ServerConfig, SharedMailer, SmtpMailer, SmtpSettings};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// File name looked up in the working directory
pub const CONFIG_FILE: &str = "citiverse.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Could not determine data directory")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Port the mail/OTP service listens on
    pub port: u16,
    /// SQLite file; the platform data directory when unset
    pub database_path: Option<PathBuf>,
    /// Base URL the signup flow uses to reach the mail/OTP service
    pub otp_service_url: String,
    pub admin_emails: Vec<String>,
    pub otp_validity_secs: i64,
    pub otp_code_length: u32,
    pub resend_cooldown_secs: i64,
    pub sweep_interval_secs: u64,
    pub permissive_cors: bool,
    /// Outgoing mail relay; mail is only logged when unset
    pub smtp: Option<SmtpSettings>,
}

fn local_service_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: citiverse_net::DEFAULT_PORT,
            database_path: None,
            otp_service_url: local_service_url(citiverse_net::DEFAULT_PORT),
            admin_emails: Vec::new(),
            otp_validity_secs: 300,
            otp_code_length: 6,
            resend_cooldown_secs: 60,
            sweep_interval_secs: 30,
            permissive_cors: true,
            smtp: None,
        }
    }
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path` when it exists, then apply process environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            info!(path = %path.display(), "Loading config");
            Self::from_toml(&std::fs::read_to_string(path)?)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from `lookup` (an environment reader in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("CITIVERSE_PORT").or_else(|| lookup("PORT"));
        if let Some(value) = port {
            // A URL still pointing at the local service follows the port
            let follows_port = self.otp_service_url == local_service_url(self.port);
            self.port = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "port",
                value,
            })?;
            if follows_port {
                self.otp_service_url = local_service_url(self.port);
            }
        }

        if let Some(value) = lookup("CITIVERSE_DB") {
            self.database_path = Some(PathBuf::from(value));
        }

        if let Some(value) = lookup("CITIVERSE_OTP_URL") {
            self.otp_service_url = value;
        }

        if let Some(value) = lookup("CITIVERSE_ADMIN_EMAILS") {
            self.admin_emails = value
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(host) = lookup("CITIVERSE_SMTP_HOST") {
            self.smtp.get_or_insert_with(SmtpSettings::default).host = host;
        }
        if let Some(smtp) = self.smtp.as_mut() {
            if let Some(value) = lookup("CITIVERSE_SMTP_PORT") {
                smtp.port = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "smtp.port",
                    value,
                })?;
            }
            if let Some(user) = lookup("CITIVERSE_SMTP_USER") {
                smtp.username = Some(user);
            }
            if let Some(password) = lookup("CITIVERSE_SMTP_PASSWORD") {
                smtp.password = Some(password);
            }
            if let Some(from) = lookup("CITIVERSE_MAIL_FROM") {
                smtp.from = from;
            }
        }

        Ok(())
    }

    /// The SMTP mailer when a relay is configured, otherwise the log mailer
    pub fn mailer(&self) -> citiverse_net::Result<SharedMailer> {
        match &self.smtp {
            Some(settings) => Ok(Arc::new(SmtpMailer::new(settings)?)),
            None => {
                warn!("No SMTP relay configured; mail is written to the log only");
                Ok(Arc::new(LogMailer))
            }
        }
    }

    /// Database file, resolving the platform default
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let dirs = ProjectDirs::from("in", "mycitiverse", "citiverse")
            .ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_dir().join("citiverse.db"))
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            otp_validity_secs: self.otp_validity_secs,
            code_length: self.otp_code_length,
            sweep_interval_secs: self.sweep_interval_secs,
            permissive_cors: self.permissive_cors,
        }
    }
}
