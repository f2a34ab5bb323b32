use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use ts_rs::TS;
use uuid::Uuid;

use crate::{DBService, Query, StoreError};

pub const TABLE: &str = "columns";

/// Columns created with every new project, in board order.
pub const DEFAULT_COLUMNS: &[&str] = &["To Do", "In Progress", "Done"];

/// A board column. `position` is 0-based and dense within a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct Column {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateColumn {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateColumn {
    pub title: String,
}

impl Column {
    pub fn new(project_id: Uuid, title: String, position: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            title,
            position,
            created_at: Utc::now(),
        }
    }

    pub async fn find_by_id(db: &DBService, id: Uuid) -> Result<Option<Self>, StoreError> {
        db.select_one(TABLE, Query::new().eq("id", id)).await
    }

    pub async fn find_by_project_id(
        db: &DBService,
        project_id: Uuid,
    ) -> Result<Vec<Self>, StoreError> {
        db.select(
            TABLE,
            Query::new()
                .eq("project_id", project_id)
                .order_by("position", true),
        )
        .await
    }

    pub async fn insert(db: &DBService, column: &Column) -> Result<Self, StoreError> {
        db.insert(TABLE, column).await
    }

    pub async fn update_title(
        db: &DBService,
        id: Uuid,
        title: &str,
    ) -> Result<Option<Self>, StoreError> {
        db.update_one(TABLE, Query::new().eq("id", id), json!({ "title": title }))
            .await
    }

    pub async fn set_position(db: &DBService, id: Uuid, position: i32) -> Result<(), StoreError> {
        db.update::<Column>(
            TABLE,
            Query::new().eq("id", id),
            json!({ "position": position }),
        )
        .await?;
        Ok(())
    }

    pub async fn delete(db: &DBService, id: Uuid) -> Result<u64, StoreError> {
        db.delete(TABLE, Query::new().eq("id", id)).await
    }

    pub async fn delete_by_project_id(db: &DBService, project_id: Uuid) -> Result<u64, StoreError> {
        db.delete(TABLE, Query::new().eq("project_id", project_id))
            .await
    }
}
