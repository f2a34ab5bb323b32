//! Projects own a board: a set of columns and the tasks placed in them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::changes;
use crate::{DBService, Query, StoreError};

pub const TABLE: &str = "projects";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// User id of the owner
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateProject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Project {
    pub fn new(owner: Uuid, name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn find_by_id(db: &DBService, id: Uuid) -> Result<Option<Self>, StoreError> {
        db.select_one(TABLE, Query::new().eq("id", id)).await
    }

    /// Find a project only if `owner` owns it.
    pub async fn find_owned(
        db: &DBService,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<Self>, StoreError> {
        db.select_one(TABLE, Query::new().eq("id", id).eq("owner", owner))
            .await
    }

    pub async fn find_by_owner(db: &DBService, owner: Uuid) -> Result<Vec<Self>, StoreError> {
        db.select(
            TABLE,
            Query::new()
                .eq("owner", owner)
                .order_by("created_at", true),
        )
        .await
    }

    pub async fn insert(db: &DBService, project: &Project) -> Result<Self, StoreError> {
        db.insert(TABLE, project).await
    }

    pub async fn update(
        db: &DBService,
        id: Uuid,
        payload: &UpdateProject,
    ) -> Result<Option<Self>, StoreError> {
        db.update_one(TABLE, Query::new().eq("id", id), changes(payload, true)?)
            .await
    }

    pub async fn delete(db: &DBService, id: Uuid) -> Result<u64, StoreError> {
        db.delete(TABLE, Query::new().eq("id", id)).await
    }
}
