//! Typed configuration bundles loaded from environment keys
//!
//! Three immutable bundles are read once at startup: the local target
//! server, the upstream source server, and the Shopify integration
//! credentials. Required keys are enumerated explicitly and missing ones
//! fail fast, before any destructive action.
//!
//! Loaders read through an injectable key lookup so tests never have to
//! mutate the process environment.

use crate::error::SettingsError;
use secrecy::SecretString;
use std::path::PathBuf;

const DEFAULT_DB_PORT: u16 = 5432;

/// Connection and filesystem settings for the local (destination) server.
#[derive(Debug)]
pub struct LocalSettings {
    pub host: String,
    pub port: u16,
    pub db_user: String,
    pub db_password: SecretString,
    pub db_name: String,
    pub filestore_path: PathBuf,
    /// Public base URL written into `web.base.url` during sanitize, if set.
    pub base_url: Option<String>,
}

/// Settings for the upstream (source) server, reached over SSH.
#[derive(Debug)]
pub struct UpstreamSettings {
    pub host: String,
    pub user: String,
    pub db_name: String,
    pub db_user: String,
    pub filestore_path: PathBuf,
}

/// Shopify integration credentials for the non-production store.
#[derive(Debug)]
pub struct ShopifySettings {
    pub shop_url_key: String,
    pub api_token: SecretString,
    pub api_version: String,
    pub webhook_key: SecretString,
}

impl LocalSettings {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(env_lookup)
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            host: require(&lookup, "ODOO_DB_HOST")?,
            port: optional_port(&lookup, "ODOO_DB_PORT")?,
            db_user: require(&lookup, "ODOO_DB_USER")?,
            db_password: SecretString::from(require(&lookup, "ODOO_DB_PASSWORD")?),
            db_name: require(&lookup, "ODOO_DB_NAME")?,
            filestore_path: PathBuf::from(require(&lookup, "ODOO_FILESTORE_PATH")?),
            base_url: lookup("ODOO_BASE_URL"),
        })
    }

    /// Environment for shell commands that talk to the local cluster.
    pub(crate) fn pg_env(&self) -> Vec<(&'static str, String)> {
        use secrecy::ExposeSecret;
        vec![("PGPASSWORD", self.db_password.expose_secret().to_string())]
    }
}

impl UpstreamSettings {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(env_lookup)
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            host: require(&lookup, "ODOO_UPSTREAM_HOST")?,
            user: require(&lookup, "ODOO_UPSTREAM_USER")?,
            db_name: require(&lookup, "ODOO_UPSTREAM_DB_NAME")?,
            db_user: require(&lookup, "ODOO_UPSTREAM_DB_USER")?,
            filestore_path: PathBuf::from(require(&lookup, "ODOO_UPSTREAM_FILESTORE_PATH")?),
        })
    }
}

impl ShopifySettings {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(env_lookup)
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            shop_url_key: require(&lookup, "SHOPIFY_STORE_URL_KEY")?,
            api_token: SecretString::from(require(&lookup, "SHOPIFY_API_TOKEN")?),
            api_version: require(&lookup, "SHOPIFY_API_VERSION")?,
            webhook_key: SecretString::from(require(&lookup, "SHOPIFY_WEBHOOK_KEY")?),
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, SettingsError> {
    lookup(key)
        .filter(|value| !value.is_empty())
        .ok_or(SettingsError::MissingKey { key })
}

fn optional_port(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<u16, SettingsError> {
    match lookup(key) {
        None => Ok(DEFAULT_DB_PORT),
        Some(value) => value
            .parse::<u16>()
            .map_err(|e| SettingsError::InvalidValue {
                key,
                value,
                reason: e.to_string(),
            }),
    }
}

// =============================================================================
// TESTS
// =============================================================================
