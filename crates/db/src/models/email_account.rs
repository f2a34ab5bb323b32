//! Mail accounts connected by a user.
//!
//! The stored password is write-only: [`EmailAccount`] has no field for it,
//! so it can never be serialized back to a client.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use crate::{DBService, Query, StoreError};

pub const TABLE: &str = "email_accounts";

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmailProvider {
    Gmail,
    Outlook,
    Yahoo,
    Icloud,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct EmailAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub provider: EmailProvider,
    pub imap_host: String,
    pub imap_port: i32,
    pub smtp_host: String,
    pub smtp_port: i32,
    pub username: String,
    pub use_ssl: bool,
    #[ts(type = "Date | null")]
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateEmailAccount {
    pub email: String,
    pub provider: EmailProvider,
    /// Defaults to `email`
    pub username: Option<String>,
    #[ts(type = "string")]
    pub password: SecretString,
    pub imap_host: Option<String>,
    pub imap_port: Option<i32>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub use_ssl: Option<bool>,
}

/// Row written on account creation. Only ever serialized towards the backend.
#[derive(Debug, Clone)]
pub struct NewEmailAccount {
    pub account: EmailAccount,
    pub password: SecretString,
}

impl Serialize for NewEmailAccount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let a = &self.account;
        let mut map = serializer.serialize_map(Some(13))?;
        map.serialize_entry("id", &a.id)?;
        map.serialize_entry("user_id", &a.user_id)?;
        map.serialize_entry("email", &a.email)?;
        map.serialize_entry("provider", &a.provider)?;
        map.serialize_entry("imap_host", &a.imap_host)?;
        map.serialize_entry("imap_port", &a.imap_port)?;
        map.serialize_entry("smtp_host", &a.smtp_host)?;
        map.serialize_entry("smtp_port", &a.smtp_port)?;
        map.serialize_entry("username", &a.username)?;
        map.serialize_entry("password", self.password.expose_secret())?;
        map.serialize_entry("use_ssl", &a.use_ssl)?;
        map.serialize_entry("last_synced_at", &a.last_synced_at)?;
        map.serialize_entry("created_at", &a.created_at)?;
        map.end()
    }
}

impl EmailAccount {
    pub async fn find_owned(
        db: &DBService,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, StoreError> {
        db.select_one(TABLE, Query::new().eq("id", id).eq("user_id", user_id))
            .await
    }

    pub async fn find_by_user(db: &DBService, user_id: Uuid) -> Result<Vec<Self>, StoreError> {
        db.select(
            TABLE,
            Query::new()
                .eq("user_id", user_id)
                .order_by("created_at", true),
        )
        .await
    }

    pub async fn find_by_address(
        db: &DBService,
        user_id: Uuid,
        email: &str,
    ) -> Result<Option<Self>, StoreError> {
        db.select_one(TABLE, Query::new().eq("user_id", user_id).eq("email", email))
            .await
    }

    pub async fn insert(db: &DBService, row: &NewEmailAccount) -> Result<Self, StoreError> {
        db.insert(TABLE, row).await
    }

    pub async fn set_last_synced(
        db: &DBService,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Self>, StoreError> {
        db.update_one(
            TABLE,
            Query::new().eq("id", id),
            serde_json::json!({ "last_synced_at": at }),
        )
        .await
    }

    pub async fn delete(db: &DBService, id: Uuid) -> Result<u64, StoreError> {
        db.delete(TABLE, Query::new().eq("id", id)).await
    }
}
