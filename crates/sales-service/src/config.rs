//! # Sales Configuration
//!
//! Numbering prefixes, payment terms, offer validity, paging limits and
//! storage backend.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SALES_PAYMENT_TERMS_DAYS=14                                        │
//! │     SALES_STORAGE_BACKEND=sqlite                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     explicit path, or                                                  │
//! │     ~/.config/sales/sales.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.sales.erp/sales.toml (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     OFF/SO/DN/INV, 30 days, page 20 of max 100, in-memory store        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [numbering]
//! offer_prefix = "OFF"
//! order_prefix = "SO"
//! delivery_prefix = "DN"
//! invoice_prefix = "INV"
//!
//! [invoicing]
//! payment_terms_days = 30
//!
//! [offers]
//! validity_days = 30
//!
//! [query]
//! default_page_size = 20
//! max_page_size = 100
//!
//! [storage]
//! backend = "sqlite"   # memory | sqlite
//! database_path = "./sales.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use sales_core::{DocumentKind, DEFAULT_OFFER_VALIDITY_DAYS, DEFAULT_PAYMENT_TERMS_DAYS};
use sales_db::{PageLimits, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// Document number prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingConfig {
    #[serde(default = "default_offer_prefix")]
    pub offer_prefix: String,

    #[serde(default = "default_order_prefix")]
    pub order_prefix: String,

    #[serde(default = "default_delivery_prefix")]
    pub delivery_prefix: String,

    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,
}

fn default_offer_prefix() -> String {
    DocumentKind::Offer.default_prefix().to_string()
}

fn default_order_prefix() -> String {
    DocumentKind::Order.default_prefix().to_string()
}

fn default_delivery_prefix() -> String {
    DocumentKind::DeliveryNote.default_prefix().to_string()
}

fn default_invoice_prefix() -> String {
    DocumentKind::Invoice.default_prefix().to_string()
}

impl Default for NumberingConfig {
    fn default() -> Self {
        NumberingConfig {
            offer_prefix: default_offer_prefix(),
            order_prefix: default_order_prefix(),
            delivery_prefix: default_delivery_prefix(),
            invoice_prefix: default_invoice_prefix(),
        }
    }
}

impl NumberingConfig {
    /// Prefix for a document kind.
    pub fn prefix(&self, kind: DocumentKind) -> &str {
        match kind {
            DocumentKind::Offer => &self.offer_prefix,
            DocumentKind::Order => &self.order_prefix,
            DocumentKind::DeliveryNote => &self.delivery_prefix,
            DocumentKind::Invoice => &self.invoice_prefix,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicingConfig {
    /// Days from invoice date to due date.
    #[serde(default = "default_payment_terms")]
    pub payment_terms_days: u32,
}

fn default_payment_terms() -> u32 {
    DEFAULT_PAYMENT_TERMS_DAYS
}

impl Default for InvoicingConfig {
    fn default() -> Self {
        InvoicingConfig {
            payment_terms_days: default_payment_terms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferConfig {
    /// Days from offer date to `validUntil` when the caller gives none.
    #[serde(default = "default_validity")]
    pub validity_days: u32,
}

fn default_validity() -> u32 {
    DEFAULT_OFFER_VALIDITY_DAYS
}

impl Default for OfferConfig {
    fn default() -> Self {
        OfferConfig {
            validity_days: default_validity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> u32 {
    MAX_PAGE_SIZE
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Where documents are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local store, lost on exit.
    #[default]
    Memory,

    /// SQLite file via sqlx.
    Sqlite,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" | "mem" => Ok(StorageBackend::Memory),
            "sqlite" | "sql" => Ok(StorageBackend::Sqlite),
            other => Err(ConfigError::Invalid(format!(
                "Unknown storage backend: '{}'. Valid options: memory, sqlite",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite file. Defaults to `sales.db` in the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesConfig {
    #[serde(default)]
    pub numbering: NumberingConfig,

    #[serde(default)]
    pub invoicing: InvoicingConfig,

    #[serde(default)]
    pub offers: OfferConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl SalesConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, else the platform config dir)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sales config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sales config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document and validates it. No environment overrides.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        let config: SalesConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        for kind in [
            DocumentKind::Offer,
            DocumentKind::Order,
            DocumentKind::DeliveryNote,
            DocumentKind::Invoice,
        ] {
            let prefix = self.numbering.prefix(kind);
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::Invalid(format!(
                    "{} prefix must be non-empty and alphanumeric, got '{}'",
                    kind, prefix
                )));
            }
        }

        if self.offers.validity_days == 0 {
            return Err(ConfigError::Invalid(
                "offers.validity_days must be greater than 0".into(),
            ));
        }

        if self.query.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "query.default_page_size must be greater than 0".into(),
            ));
        }
        if self.query.max_page_size < self.query.default_page_size {
            return Err(ConfigError::Invalid(format!(
                "query.max_page_size ({}) must not be below default_page_size ({})",
                self.query.max_page_size, self.query.default_page_size
            )));
        }

        Ok(())
    }

    /// Applies `SALES_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key/value source.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let prefixes = [
            ("SALES_OFFER_PREFIX", &mut self.numbering.offer_prefix),
            ("SALES_ORDER_PREFIX", &mut self.numbering.order_prefix),
            ("SALES_DELIVERY_PREFIX", &mut self.numbering.delivery_prefix),
            ("SALES_INVOICE_PREFIX", &mut self.numbering.invoice_prefix),
        ];
        for (key, slot) in prefixes {
            if let Some(value) = lookup(key) {
                debug!(key, value = %value, "Overriding number prefix from environment");
                *slot = value;
            }
        }

        let numbers = [
            ("SALES_PAYMENT_TERMS_DAYS", &mut self.invoicing.payment_terms_days),
            ("SALES_OFFER_VALIDITY_DAYS", &mut self.offers.validity_days),
            ("SALES_DEFAULT_PAGE_SIZE", &mut self.query.default_page_size),
            ("SALES_MAX_PAGE_SIZE", &mut self.query.max_page_size),
        ];
        for (key, slot) in numbers {
            if let Some(value) = lookup(key) {
                match value.parse::<u32>() {
                    Ok(parsed) => {
                        debug!(key, value = parsed, "Overriding setting from environment");
                        *slot = parsed;
                    }
                    Err(_) => warn!(key, value = %value, "Ignoring non-numeric override"),
                }
            }
        }

        if let Some(backend) = lookup("SALES_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(parsed) => {
                    debug!(backend = %backend, "Overriding storage backend from environment");
                    self.storage.backend = parsed;
                }
                Err(_) => warn!(backend = %backend, "Unknown storage backend in environment"),
            }
        }

        if let Some(path) = lookup("SALES_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "sales", "erp")
            .map(|dirs| dirs.config_dir().join("sales.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Number prefix for a document kind.
    pub fn prefix(&self, kind: DocumentKind) -> &str {
        self.numbering.prefix(kind)
    }

    /// Page-size bounds for list queries.
    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.query.default_page_size,
            max_page_size: self.query.max_page_size,
        }
    }

    /// SQLite file to open: configured path, platform data dir, or `./sales.db`.
    pub fn database_path(&self) -> PathBuf {
        self.storage.database_path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("com", "sales", "erp")
                .map(|dirs| dirs.data_dir().join("sales.db"))
                .unwrap_or_else(|| PathBuf::from("sales.db"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SalesConfig::default();
        assert_eq!(config.prefix(DocumentKind::Order), "SO");
        assert_eq!(config.prefix(DocumentKind::DeliveryNote), "DN");
        assert_eq!(config.invoicing.payment_terms_days, 30);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SalesConfig::from_toml(
            r#"
            [invoicing]
            payment_terms_days = 14

            [storage]
            backend = "sqlite"
            "#,
        )
        .unwrap();

        assert_eq!(config.invoicing.payment_terms_days, 14);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.numbering.invoice_prefix, "INV");
        assert_eq!(config.query.max_page_size, 100);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SalesConfig::default();
        config.numbering.order_prefix = "S O".to_string();
        assert!(config.validate().is_err());

        let mut config = SalesConfig::default();
        config.query.default_page_size = 50;
        config.query.max_page_size = 10;
        assert!(config.validate().is_err());

        let mut config = SalesConfig::default();
        config.offers.validity_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("SALES_INVOICE_PREFIX", "RE"),
            ("SALES_PAYMENT_TERMS_DAYS", "10"),
            ("SALES_MAX_PAGE_SIZE", "not-a-number"),
            ("SALES_STORAGE_BACKEND", "SQLite"),
            ("SALES_DATABASE_PATH", "/tmp/sales.db"),
        ]
        .into_iter()
        .collect();

        let mut config = SalesConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.numbering.invoice_prefix, "RE");
        assert_eq!(config.invoicing.payment_terms_days, 10);
        assert_eq!(config.query.max_page_size, 100);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/sales.db"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("sales-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[offers]\nvalidity_days = 7\n").unwrap();

        let config = SalesConfig::load(Some(path.clone())).unwrap();
        assert_eq!(config.offers.validity_days, 7);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = SalesConfig::default().to_toml().unwrap();
        assert!(toml_str.contains("[numbering]"));
        assert!(toml_str.contains("[storage]"));
    }
}
