use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const MESSAGES_EXPORT_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vTacS4r6yCtXu4G1h2QYuU8602AhimGFmXPp65hhPwKStjEpnenLe64KcIaFImI5869bwiscjC4Jii1/pub?gid=1033608769&single=true&output=csv";
const STATUSES_EXPORT_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vTacS4r6yCtXu4G1h2QYuU8602AhimGFmXPp65hhPwKStjEpnenLe64KcIaFImI5869bwiscjC4Jii1/pub?gid=966707183&single=true&output=csv";

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Warehouse connection
    pub database: DatabaseConfig,
    /// Log level, format and file
    pub logging: LoggingConfig,
    /// Export URLs and landing directory
    pub fetch: FetchConfig,
    /// dbt invocation
    pub transform: TransformConfig,
    /// Report source view and output
    pub report: ReportConfig,
}

/// Postgres settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string used when no environment override is set
    pub url: String,
    /// Schema holding the landed tables and the dbt view
    pub schema: String,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,
    /// Daily-rolling JSON log file, if any
    pub file_path: Option<String>,
    /// Console format: `json` or `text`
    pub format: String,
}

/// Spreadsheet exports and where they land
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Published CSV export of messages
    pub messages_url: String,
    /// Published CSV export of statuses
    pub statuses_url: String,
    /// Landed file prefix for messages
    pub messages_prefix: String,
    /// Landed file prefix for statuses
    pub statuses_prefix: String,
    /// Directory of landed TSV files
    pub raw_dir: String,
    /// Download timeout in seconds
    pub request_timeout_secs: u64,
}

/// dbt settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// dbt binary name or path
    pub dbt_executable: String,
    /// Project directory, relative to the working directory
    pub project_dir: String,
    /// Directory holding `profiles.yml`
    pub profiles_dir: String,
}

/// Report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// View the reports read
    pub view: String,
    /// Directory charts are written to
    pub output_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost:5432/whatsapp_communication".to_string(),
                schema: "public".to_string(),
                connect_timeout_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            fetch: FetchConfig {
                messages_url: MESSAGES_EXPORT_URL.to_string(),
                statuses_url: STATUSES_EXPORT_URL.to_string(),
                messages_prefix: "whatsapp_messages".to_string(),
                statuses_prefix: "whatsapp_statuses".to_string(),
                raw_dir: "data/raw".to_string(),
                request_timeout_secs: 120,
            },
            transform: TransformConfig {
                dbt_executable: "dbt".to_string(),
                project_dir: "dbt_noora".to_string(),
                profiles_dir: "dbt_noora".to_string(),
            },
            report: ReportConfig {
                view: "int_messages_with_status_history".to_string(),
                output_dir: "reports".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&Self::default())
            .map_err(|e| anyhow::anyhow!("Failed to build default configuration: {}", e))?;

        let config = Config::builder()
            // Start with default values
            .add_source(defaults)
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false))
            // WHATSAPP_ETL_FETCH__RAW_DIR=... overrides fetch.raw_dir
            .add_source(
                Environment::with_prefix("WHATSAPP_ETL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!("connect_timeout_secs must be greater than 0"));
        }
        crate::validation::InputValidator::validate_identifier(&self.database.schema)?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        crate::validation::InputValidator::validate_export_url(&self.fetch.messages_url)?;
        crate::validation::InputValidator::validate_export_url(&self.fetch.statuses_url)?;
        crate::validation::InputValidator::validate_file_prefix(&self.fetch.messages_prefix)?;
        crate::validation::InputValidator::validate_file_prefix(&self.fetch.statuses_prefix)?;
        if self.fetch.messages_prefix == self.fetch.statuses_prefix {
            return Err(anyhow::anyhow!("messages_prefix and statuses_prefix must differ"));
        }
        if self.fetch.raw_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("raw_dir cannot be empty"));
        }
        if self.fetch.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("request_timeout_secs must be greater than 0"));
        }

        if self.transform.dbt_executable.trim().is_empty() {
            return Err(anyhow::anyhow!("dbt_executable cannot be empty"));
        }

        crate::validation::InputValidator::validate_identifier(&self.report.view)?;

        Ok(())
    }

    /// Get database URL from environment or config
    pub fn get_database_url(&self) -> String {
        database_url_from(&self.database, |key| std::env::var(key).ok())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Landing directory as a path
    pub fn raw_dir(&self) -> PathBuf {
        PathBuf::from(&self.fetch.raw_dir)
    }

    /// Download timeout
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.request_timeout_secs)
    }

    /// Database connect timeout
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.database.connect_timeout_secs)
    }
}

/// Resolve the connection string.
///
/// `DATABASE_URL` wins. Otherwise, when `POSTGRES_USER` and `POSTGRES_DB` are
/// set (the `.env` used by the reporting commands), the URL is assembled from
/// `POSTGRES_USER`, `POSTGRES_PASSWORD`, `POSTGRES_HOST`, `POSTGRES_PORT` and
/// `POSTGRES_DB`. The configured URL is the fallback.
pub fn database_url_from<F>(database: &DatabaseConfig, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
        return url;
    }

    if let (Some(user), Some(db)) = (lookup("POSTGRES_USER"), lookup("POSTGRES_DB")) {
        let host = lookup("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string());
        let port = lookup("POSTGRES_PORT").unwrap_or_else(|| "5432".to_string());
        return match lookup("POSTGRES_PASSWORD") {
            Some(password) => format!("postgresql://{user}:{password}@{host}:{port}/{db}"),
            None => format!("postgresql://{user}@{host}:{port}/{db}"),
        };
    }

    database.url.clone()
}
