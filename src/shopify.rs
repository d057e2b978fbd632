//! Shopify integration re-pointing
//!
//! Rewrites the cloned database's Shopify configuration to the safe,
//! non-production store and clears the Shopify-assigned identifiers from
//! product records so the development instance cannot collide with the
//! live store's objects. The shop key is re-validated against the
//! production guard immediately before writing.

use crate::db::SqlRunner;
use crate::error::{DatabaseUpdateError, SqlError};
use crate::safety;
use crate::settings::ShopifySettings;
use crate::sql::{SqlValue, Statement};
use secrecy::ExposeSecret;

const CONFIG_MODEL: &str = "ir.config_parameter";
const PRODUCT_MODEL: &str = "product.product";
const PRODUCT_TABLE: &str = "product_product";

/// Shopify-assigned product columns to clear. The live schema may lack
/// some of them depending on which addon versions have run; missing
/// columns are skipped.
const SHOPIFY_ID_FIELDS: [&str; 7] = [
    "shopify_created_at",
    "shopify_last_exported",
    "shopify_last_exported_at",
    "shopify_condition_id",
    "shopify_variant_id",
    "shopify_product_id",
    "shopify_ebay_category_id",
];

pub struct ConfigUpdater<'a> {
    shopify: &'a ShopifySettings,
}

impl<'a> ConfigUpdater<'a> {
    pub fn new(shopify: &'a ShopifySettings) -> Self {
        Self { shopify }
    }

    /// Write the non-production Shopify configuration keys.
    pub async fn update_shopify_config<R: SqlRunner>(
        &self,
        db: &mut R,
    ) -> Result<(), DatabaseUpdateError> {
        safety::validate_safe(&self.shopify.shop_url_key)?;

        // Audit trail: record what the clone pointed at before.
        let current = db
            .query(&Statement::select(
                CONFIG_MODEL,
                ["value"],
                Some(("key", "shopify.shop_url_key")),
            ))
            .await?;
        match current.first().and_then(|row| row.text("value")) {
            Some(previous) => {
                tracing::info!(previous, new = %self.shopify.shop_url_key, "Replacing shop_url_key")
            }
            None => tracing::info!(new = %self.shopify.shop_url_key, "Setting shop_url_key"),
        }

        tracing::info!("Updating Shopify configuration");
        for (key, value) in self.config_values() {
            let statement = Statement::upsert(CONFIG_MODEL, "key", key, "value", value);
            tracing::debug!(key, "writing Shopify configuration key");
            db.execute(&statement)
                .await
                .map_err(|source| shopify_update_error(key, source))?;
        }
        Ok(())
    }

    fn config_values(&self) -> [(&'static str, String); 4] {
        [
            (
                "shopify.shop_url_key",
                self.shopify.shop_url_key.clone(),
            ),
            (
                "shopify.api_token",
                self.shopify.api_token.expose_secret().to_string(),
            ),
            (
                "shopify.webhook_key",
                self.shopify.webhook_key.expose_secret().to_string(),
            ),
            ("shopify.test_store", "True".to_string()),
        ]
    }

    /// Null out Shopify-assigned identifiers on products, tolerating
    /// schema drift: only columns that actually exist are touched.
    pub async fn clear_shopify_ids<R: SqlRunner>(
        &self,
        db: &mut R,
    ) -> Result<(), DatabaseUpdateError> {
        let existing = db.existing_columns(PRODUCT_TABLE, "shopify").await?;

        for field in SHOPIFY_ID_FIELDS {
            if !existing.iter().any(|col| col == field) {
                tracing::info!(field, "Skipping field - does not exist in database");
                continue;
            }
            let statement = Statement::update_all(PRODUCT_MODEL, field, SqlValue::Null);
            db.execute(&statement)
                .await
                .map_err(|source| shopify_update_error(field, source))?;
        }
        Ok(())
    }
}

fn shopify_update_error(key: &str, source: SqlError) -> DatabaseUpdateError {
    DatabaseUpdateError::ShopifyUpdate {
        key: key.to_string(),
        source,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqlRow;
    use crate::test_support::MockRunner;
    use secrecy::SecretString;

    fn shopify(shop_url_key: &str) -> ShopifySettings {
        ShopifySettings {
            shop_url_key: shop_url_key.to_string(),
            api_token: SecretString::from("shpat_abc123".to_string()),
            api_version: "2024-01".to_string(),
            webhook_key: SecretString::from("whsec_xyz".to_string()),
        }
    }

    #[tokio::test]
    async fn test_update_writes_all_four_keys() {
        let settings = shopify("dev-sandbox-42");
        let mut db = MockRunner::with_query_results(vec![vec![SqlRow::new([(
            "value",
            SqlValue::Text("opw-prod-store".to_string()),
        )])]]);
        ConfigUpdater::new(&settings)
            .update_shopify_config(&mut db)
            .await
            .unwrap();

        assert_eq!(db.executed.len(), 4);
        assert_eq!(
            db.executed[0],
            Statement::upsert(
                CONFIG_MODEL,
                "key",
                "shopify.shop_url_key",
                "value",
                "dev-sandbox-42"
            )
        );
        assert_eq!(
            db.executed[1],
            Statement::upsert(
                CONFIG_MODEL,
                "key",
                "shopify.api_token",
                "value",
                "shpat_abc123"
            )
        );
        assert_eq!(
            db.executed[3],
            Statement::upsert(CONFIG_MODEL, "key", "shopify.test_store", "value", "True")
        );
    }

    #[tokio::test]
    async fn test_production_shop_key_rejected_before_any_write() {
        let settings = shopify("opw-prod-store");
        let mut db = MockRunner::default();
        let err = ConfigUpdater::new(&settings)
            .update_shopify_config(&mut db)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DatabaseUpdateError::SafetyViolation { .. }
        ));
        assert!(db.executed.is_empty());
        assert!(db.queried.is_empty());
    }

    #[tokio::test]
    async fn test_driver_failure_wrapped_with_offending_key() {
        let settings = shopify("dev-sandbox-42");
        let mut db = MockRunner {
            fail_execute_containing: Some("ir_config_parameter".to_string()),
            ..MockRunner::default()
        };
        let err = ConfigUpdater::new(&settings)
            .update_shopify_config(&mut db)
            .await
            .unwrap_err();
        match err {
            DatabaseUpdateError::ShopifyUpdate { key, .. } => {
                assert_eq!(key, "shopify.shop_url_key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_clear_skips_missing_columns() {
        let settings = shopify("dev-sandbox-42");
        let mut db = MockRunner::default();
        db.schema_columns = SHOPIFY_ID_FIELDS
            .iter()
            .filter(|f| **f != "shopify_ebay_category_id")
            .map(|f| f.to_string())
            .collect();

        ConfigUpdater::new(&settings)
            .clear_shopify_ids(&mut db)
            .await
            .unwrap();

        assert_eq!(db.executed.len(), 6);
        assert!(db.executed.iter().all(|statement| {
            *statement
                != Statement::update_all(PRODUCT_MODEL, "shopify_ebay_category_id", SqlValue::Null)
        }));
        assert_eq!(
            db.executed[0],
            Statement::update_all(PRODUCT_MODEL, "shopify_created_at", SqlValue::Null)
        );
    }

    #[tokio::test]
    async fn test_clear_with_no_shopify_columns_is_a_no_op() {
        let settings = shopify("dev-sandbox-42");
        let mut db = MockRunner::default();
        ConfigUpdater::new(&settings)
            .clear_shopify_ids(&mut db)
            .await
            .unwrap();
        assert!(db.executed.is_empty());
    }
}
