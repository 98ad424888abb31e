use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use surrealdb::{engine::local::{Db, Mem}, Surreal};
use uuid::Uuid;

use crate::models::{
    notification::SubscriptionNotification,
    settings::NotificationSettings,
    tenant::Tenant,
};

pub const TENANTS: &str = "tenants";
pub const NOTIFICATIONS: &str = "subscription_notifications";
pub const SETTINGS: &str = "subscription_notification_settings";
const SETTINGS_KEY: &str = "global";

/// Row layout: the JSON record lives under `payload`, so its own `id` field
/// never collides with the SurrealDB record id.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    payload: Value,
}

#[derive(Clone)]
pub struct DatabaseService {
    db: Surreal<Db>,
}

impl DatabaseService {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db = if database_url.starts_with("memory://") {
            Surreal::new::<Mem>(()).await?
        } else if let Some(path) = database_url.strip_prefix("file://") {
            open_file(path).await?
        } else {
            return Err(anyhow!("Unsupported database URL: {}", database_url));
        };

        db.use_ns("debt_ledger").use_db("subscriptions").await?;

        log::info!("Database ready at {}", database_url);
        Ok(Self { db })
    }

    // Tenant operations
    pub async fn insert_tenant(&self, tenant: &Tenant) -> Result<()> {
        self.create(TENANTS, tenant.id.to_string(), tenant).await
    }

    pub async fn save_tenant(&self, tenant: &Tenant) -> Result<()> {
        self.put(TENANTS, tenant.id.to_string(), tenant).await
    }

    pub async fn get_tenant(&self, tenant_id: &Uuid) -> Result<Option<Tenant>> {
        self.fetch(TENANTS, tenant_id.to_string()).await
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        self.fetch_all(TENANTS).await
    }

    pub async fn delete_tenant(&self, tenant_id: &Uuid) -> Result<bool> {
        self.remove(TENANTS, tenant_id.to_string()).await
    }

    // Notification operations
    pub async fn insert_notification(&self, notification: &SubscriptionNotification) -> Result<()> {
        self.create(NOTIFICATIONS, notification.id.to_string(), notification).await
    }

    pub async fn save_notification(&self, notification: &SubscriptionNotification) -> Result<()> {
        self.put(NOTIFICATIONS, notification.id.to_string(), notification).await
    }

    pub async fn get_notification(&self, notification_id: &Uuid) -> Result<Option<SubscriptionNotification>> {
        self.fetch(NOTIFICATIONS, notification_id.to_string()).await
    }

    pub async fn list_notifications(&self) -> Result<Vec<SubscriptionNotification>> {
        self.fetch_all(NOTIFICATIONS).await
    }

    // Settings singleton
    pub async fn get_settings(&self) -> Result<Option<NotificationSettings>> {
        self.fetch(SETTINGS, SETTINGS_KEY.to_string()).await
    }

    pub async fn save_settings(&self, settings: &NotificationSettings) -> Result<()> {
        self.put(SETTINGS, SETTINGS_KEY.to_string(), settings).await
    }

    pub async fn health_check(&self) -> Result<()> {
        self.db.health().await?;
        Ok(())
    }

    async fn create<T: Serialize>(&self, table: &str, key: String, record: &T) -> Result<()> {
        let stored = StoredRecord {
            payload: serde_json::to_value(record)?,
        };
        let created: Option<StoredRecord> = self
            .db
            .create((table, key.clone()))
            .content(stored)
            .await
            .with_context(|| format!("Failed to create {}:{}", table, key))?;

        created
            .map(|_| ())
            .ok_or_else(|| anyhow!("Create of {}:{} was not acknowledged", table, key))
    }

    async fn put<T: Serialize>(&self, table: &str, key: String, record: &T) -> Result<()> {
        let stored = StoredRecord {
            payload: serde_json::to_value(record)?,
        };
        let updated: Option<StoredRecord> = self
            .db
            .update((table, key.clone()))
            .content(stored)
            .await
            .with_context(|| format!("Failed to write {}:{}", table, key))?;

        updated
            .map(|_| ())
            .ok_or_else(|| anyhow!("Write of {}:{} was not acknowledged", table, key))
    }

    async fn fetch<T: DeserializeOwned>(&self, table: &str, key: String) -> Result<Option<T>> {
        let stored: Option<StoredRecord> = self
            .db
            .select((table, key.clone()))
            .await
            .with_context(|| format!("Failed to read {}:{}", table, key))?;

        stored
            .map(|record| {
                serde_json::from_value(record.payload)
                    .with_context(|| format!("Malformed record {}:{}", table, key))
            })
            .transpose()
    }

    /// Loads every record of a table. Records that fail to decode are
    /// skipped with a warning.
    async fn fetch_all<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let stored: Vec<StoredRecord> = self
            .db
            .select(table)
            .await
            .with_context(|| format!("Failed to list {}", table))?;

        let records = stored
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record.payload) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    log::warn!("Skipping malformed {} record: {}", table, e);
                    None
                }
            })
            .collect();
        Ok(records)
    }

    async fn remove(&self, table: &str, key: String) -> Result<bool> {
        let removed: Option<StoredRecord> = self
            .db
            .delete((table, key.clone()))
            .await
            .with_context(|| format!("Failed to delete {}:{}", table, key))?;
        Ok(removed.is_some())
    }

    #[cfg(test)]
    pub(crate) async fn put_raw(&self, table: &str, key: &str, payload: Value) -> Result<()> {
        let _: Option<StoredRecord> = self
            .db
            .update((table, key.to_string()))
            .content(StoredRecord { payload })
            .await?;
        Ok(())
    }
}

#[cfg(feature = "rocksdb")]
async fn open_file(path: &str) -> Result<Surreal<Db>> {
    Ok(Surreal::new::<surrealdb::engine::local::RocksDb>(path).await?)
}

#[cfg(not(feature = "rocksdb"))]
async fn open_file(path: &str) -> Result<Surreal<Db>> {
    Err(anyhow!(
        "file://{} requires building with the `rocksdb` feature",
        path
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        plan::SubscriptionPlan,
        tenant::{CreateTenantRequest, TenantStatus},
    };
    use chrono::Utc;

    fn sample_tenant() -> Tenant {
        Tenant::new(
            CreateTenantRequest {
                store_name: "Mama Njeri Grocers".to_string(),
                plan: SubscriptionPlan::Basic,
                owner_id: "owner-7".to_string(),
                owner_name: "Njeri Wambui".to_string(),
                owner_phone: "+254712345678".to_string(),
                owner_email: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_tenant_operations() {
        let db = DatabaseService::new("memory://").await.unwrap();
        let mut tenant = sample_tenant();

        db.insert_tenant(&tenant).await.unwrap();
        let retrieved = db.get_tenant(&tenant.id).await.unwrap().unwrap();
        assert_eq!(retrieved.store_name, "Mama Njeri Grocers");
        assert_eq!(retrieved.status, TenantStatus::Trial);
        assert_eq!(retrieved.expiry_date, tenant.expiry_date);

        tenant.activate(Utc::now());
        db.save_tenant(&tenant).await.unwrap();
        let tenants = db.list_tenants().await.unwrap();
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].status, TenantStatus::Active);

        assert!(db.delete_tenant(&tenant.id).await.unwrap());
        assert!(db.get_tenant(&tenant.id).await.unwrap().is_none());
        assert!(!db.delete_tenant(&tenant.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_create_is_rejected() {
        let db = DatabaseService::new("memory://").await.unwrap();
        let tenant = sample_tenant();

        db.insert_tenant(&tenant).await.unwrap();
        assert!(db.insert_tenant(&tenant).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped_when_listing() {
        let db = DatabaseService::new("memory://").await.unwrap();
        db.insert_tenant(&sample_tenant()).await.unwrap();
        db.put_raw(TENANTS, "broken", serde_json::json!({ "id": "broken", "expiryDate": "not a date" }))
            .await
            .unwrap();

        let tenants = db.list_tenants().await.unwrap();
        assert_eq!(tenants.len(), 1);
    }

    #[tokio::test]
    async fn test_settings_singleton() {
        let db = DatabaseService::new("memory://").await.unwrap();
        assert!(db.get_settings().await.unwrap().is_none());

        let settings = NotificationSettings {
            auto_suspend_on_expiry: true,
            ..Default::default()
        };
        db.save_settings(&settings).await.unwrap();
        db.save_settings(&settings).await.unwrap();

        let stored = db.get_settings().await.unwrap().unwrap();
        assert_eq!(stored, settings);
    }

    #[tokio::test]
    async fn test_unsupported_url() {
        assert!(DatabaseService::new("postgres://localhost").await.is_err());
    }
}
