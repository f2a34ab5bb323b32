use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{DBService, Query, StoreError};

pub const TABLE: &str = "profiles";

/// Public profile of a user. `id` is the auth user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct Profile {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    #[ts(type = "Date | null")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateProfile {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Profile of a user who never saved one.
    pub fn empty(id: Uuid) -> Self {
        Self {
            id,
            username: None,
            full_name: None,
            avatar_url: None,
            updated_at: None,
        }
    }

    pub async fn find_by_id(db: &DBService, id: Uuid) -> Result<Option<Self>, StoreError> {
        db.select_one(TABLE, Query::new().eq("id", id)).await
    }

    pub async fn upsert(db: &DBService, profile: &Profile) -> Result<Self, StoreError> {
        db.upsert(TABLE, profile, "id").await
    }
}
