use anyhow::{anyhow, Result};
use chrono::NaiveDate;

/// Validation utilities for configuration values and names that end up in
/// file paths or SQL text
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a landed file name prefix (e.g. `whatsapp_messages`)
    pub fn validate_file_prefix(prefix: &str) -> Result<()> {
        if prefix.trim().is_empty() {
            return Err(anyhow!("File prefix cannot be empty"));
        }

        if prefix.len() > 100 {
            return Err(anyhow!("File prefix too long (max 100 characters)"));
        }

        // Prefix is matched literally inside a regex and joined onto a directory
        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(anyhow!("File prefix contains invalid characters: {prefix:?}"));
        }

        Ok(())
    }

    /// Validate an unquoted SQL identifier (schema, table, column or view name)
    pub fn validate_identifier(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(anyhow!("Identifier cannot be empty"));
        }

        if name.len() > 63 {
            return Err(anyhow!("Identifier too long (max 63 characters): {name}"));
        }

        let mut chars = name.chars();
        let first_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
        if !first_ok || !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(anyhow!("Invalid identifier: {name:?}"));
        }

        Ok(())
    }

    /// Validate a spreadsheet export URL
    pub fn validate_export_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow!("Export URL cannot be empty"));
        }

        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(anyhow!("Export URL must be http(s): {url}"));
        }

        if url.chars().any(char::is_whitespace) {
            return Err(anyhow!("Export URL contains whitespace"));
        }

        Ok(())
    }

    /// Validate database URL
    pub fn validate_database_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow!("Database URL cannot be empty"));
        }

        if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
            return Err(anyhow!("Only PostgreSQL databases are supported"));
        }

        if url.len() > 1000 {
            return Err(anyhow!("Database URL too long"));
        }

        Ok(())
    }

    /// Parse a `YYYYMMDD` date stamp taken from a landed file name
    pub fn parse_date_stamp(stamp: &str) -> Result<NaiveDate> {
        if stamp.len() != 8 || !stamp.chars().all(|c| c.is_ascii_digit()) {
            return Err(anyhow!("Date stamp must be 8 digits (YYYYMMDD): {stamp:?}"));
        }

        NaiveDate::parse_from_str(stamp, "%Y%m%d").map_err(|e| anyhow!("Invalid date stamp {stamp:?}: {e}"))
    }
}
