///
/// # Datasource Configuration
///
/// A `Config` describes one SQLite datasource: which database file to open,
/// how to open it, and how the placeholder parser and statement layer
/// behave on it.
///
/// Configs come from three places:
/// - code: `Config::new("app.db")` and the builder-style setters
/// - a TOML file or string: `Config::from_path` / `Config::from_toml_str`
/// - a datasource string: `Config::from_datasource("sqlite3:app.db{describe=false}")`
///
/// ## Example config.toml
///
/// ```toml
/// database = "/var/lib/app/app.db"
/// read_only = false
/// busy_timeout_ms = 500
/// quote_handling = "unwrap"
/// describe = true
/// ```
///
/// ## Datasource strings
///
/// `[sqlite3:]database[{key=value,...}]` with keys `read_only`, `create`,
/// `busy_timeout` (milliseconds), `quote_handling` (`unwrap` | `verbatim`)
/// and `describe`.
///

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How quote characters around a `%v` marker are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteHandling {
    /// `'%v'` and `"%v"` lose their quotes and become a bare `?N`.
    #[default]
    Unwrap,
    /// Quotes are left alone; `'%v'` becomes the string literal `'?N'`.
    Verbatim,
}

impl QuoteHandling {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "unwrap" => Some(QuoteHandling::Unwrap),
            "verbatim" => Some(QuoteHandling::Verbatim),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    pub database: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_true")]
    pub create: bool,
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
    #[serde(default)]
    pub quote_handling: QuoteHandling,
    #[serde(default = "default_true")]
    pub describe: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self::new("")
    }
}

impl Config {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            read_only: false,
            create: true,
            busy_timeout_ms: None,
            quote_handling: QuoteHandling::default(),
            describe: true,
        }
    }

    pub fn memory() -> Self {
        Self::new(":memory:")
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn quote_handling(mut self, quote_handling: QuoteHandling) -> Self {
        self.quote_handling = quote_handling;
        self
    }

    pub fn describe(mut self, describe: bool) -> Self {
        self.describe = describe;
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_datasource(text: &str) -> Result<Self, ConfigError> {
        let text = text.trim();
        let (body, options) = split_options(text)?;
        let database = strip_driver(body)?;

        let mut config = Config::new(database);
        for option in options.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| ConfigError::Malformed(format!("option '{}' has no value", option)))?;
            config.apply_option(key.trim(), value.trim())?;
        }
        Ok(config)
    }

    fn apply_option(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "read_only" => self.read_only = parse_bool(value).ok_or_else(invalid)?,
            "create" => self.create = parse_bool(value).ok_or_else(invalid)?,
            "describe" => self.describe = parse_bool(value).ok_or_else(invalid)?,
            "busy_timeout" => self.busy_timeout_ms = Some(value.parse().map_err(|_| invalid())?),
            "quote_handling" => self.quote_handling = QuoteHandling::parse(value).ok_or_else(invalid)?,
            _ => return Err(ConfigError::UnknownOption(key.to_string())),
        }
        Ok(())
    }
}

fn split_options(text: &str) -> Result<(&str, &str), ConfigError> {
    if !text.ends_with('}') {
        if text.contains('{') {
            return Err(ConfigError::Malformed("unterminated option block".to_string()));
        }
        return Ok((text, ""));
    }
    let open = text
        .rfind('{')
        .ok_or_else(|| ConfigError::Malformed("'}' without '{'".to_string()))?;
    Ok((&text[..open], &text[open + 1..text.len() - 1]))
}

fn strip_driver(body: &str) -> Result<&str, ConfigError> {
    // ":memory:" and "C:\..." carry a colon that is not a driver prefix.
    match body.split_once(':') {
        Some((prefix, rest))
            if prefix.len() > 1 && prefix.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            if prefix == "sqlite3" || prefix == "sqlite" {
                Ok(rest)
            } else if prefix == "file" {
                // SQLite URI filename; connections open with URI support.
                Ok(body)
            } else {
                Err(ConfigError::UnknownDriver(prefix.to_string()))
            }
        }
        _ => Ok(body),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
