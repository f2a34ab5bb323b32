//! Tasks live on a project's board.
//!
//! `column_id` decides where a task sits; `status` mirrors the title of that
//! column so list views and filters need no join.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::{changes, nullable};
use crate::{DBService, Query, StoreError};

pub const TABLE: &str = "tasks";

/// Status of a task that is not placed in any column.
pub const UNASSIGNED_STATUS: &str = "unassigned";

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub column_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[ts(type = "Date | null")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    pub attachment_url: Option<String>,
    /// Order within the column, 0-based
    #[serde(default)]
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTask {
    pub project_id: Uuid,
    /// Defaults to the first column of the project
    pub column_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    #[ts(type = "Date | null")]
    pub due_date: Option<DateTime<Utc>>,
    pub attachment_url: Option<String>,
}

impl CreateTask {
    pub fn from_title(project_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            project_id,
            column_id: None,
            title: title.into(),
            description: None,
            priority: None,
            due_date: None,
            attachment_url: None,
        }
    }
}

/// Partial edit of a task. Absent fields are left alone; `null` clears
/// `description`, `due_date` and `attachment_url`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub description: Option<Option<String>>,
    /// Moving through an update places the task at the end of the column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "Date | null | undefined")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub attachment_url: Option<Option<String>>,
}

/// Drag-and-drop target: a column and the index inside it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MoveTask {
    pub column_id: Uuid,
    pub index: usize,
}

/// Placement fields rewritten by every move/reorder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub column_id: Option<Uuid>,
    pub status: String,
    pub position: i32,
}

impl Task {
    pub fn new(
        data: &CreateTask,
        user_id: Uuid,
        column_id: Option<Uuid>,
        status: String,
        position: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id: data.project_id,
            user_id,
            column_id,
            title: data.title.clone(),
            description: data.description.clone(),
            status,
            priority: data.priority.unwrap_or_default(),
            due_date: data.due_date,
            completed: false,
            attachment_url: data.attachment_url.clone(),
            position,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn placement(&self) -> Placement {
        Placement {
            column_id: self.column_id,
            status: self.status.clone(),
            position: self.position,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }

    pub async fn find_by_id(db: &DBService, id: Uuid) -> Result<Option<Self>, StoreError> {
        db.select_one(TABLE, Query::new().eq("id", id)).await
    }

    pub async fn find_owned(
        db: &DBService,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, StoreError> {
        db.select_one(TABLE, Query::new().eq("id", id).eq("user_id", user_id))
            .await
    }

    pub async fn find_by_project_id(
        db: &DBService,
        project_id: Uuid,
    ) -> Result<Vec<Self>, StoreError> {
        db.select(
            TABLE,
            Query::new()
                .eq("project_id", project_id)
                .order_by("position", true)
                .order_by("created_at", true),
        )
        .await
    }

    pub async fn find_by_column_id(
        db: &DBService,
        column_id: Uuid,
    ) -> Result<Vec<Self>, StoreError> {
        db.select(
            TABLE,
            Query::new()
                .eq("column_id", column_id)
                .order_by("position", true),
        )
        .await
    }

    pub async fn insert(db: &DBService, task: &Task) -> Result<Self, StoreError> {
        db.insert(TABLE, task).await
    }

    pub async fn update(
        db: &DBService,
        id: Uuid,
        payload: &UpdateTask,
    ) -> Result<Option<Self>, StoreError> {
        db.update_one(TABLE, Query::new().eq("id", id), changes(payload, true)?)
            .await
    }

    pub async fn set_placement(
        db: &DBService,
        id: Uuid,
        placement: &Placement,
    ) -> Result<Option<Self>, StoreError> {
        // nulls are kept: moving back out of every column must clear column_id
        let patch = json!({
            "column_id": placement.column_id,
            "status": placement.status,
            "position": placement.position,
            "updated_at": Utc::now(),
        });
        db.update_one(TABLE, Query::new().eq("id", id), patch).await
    }

    pub async fn set_completed(
        db: &DBService,
        id: Uuid,
        completed: bool,
    ) -> Result<Option<Self>, StoreError> {
        let patch = json!({ "completed": completed, "updated_at": Utc::now() });
        db.update_one(TABLE, Query::new().eq("id", id), patch).await
    }

    /// Rename the status of every task in a column after the column's title changed.
    pub async fn set_status_for_column(
        db: &DBService,
        column_id: Uuid,
        status: &str,
    ) -> Result<Vec<Self>, StoreError> {
        let patch: Value = json!({ "status": status, "updated_at": Utc::now() });
        db.update(TABLE, Query::new().eq("column_id", column_id), patch)
            .await
    }

    pub async fn delete(db: &DBService, id: Uuid) -> Result<u64, StoreError> {
        db.delete(TABLE, Query::new().eq("id", id)).await
    }

    pub async fn delete_by_column_id(db: &DBService, column_id: Uuid) -> Result<u64, StoreError> {
        db.delete(TABLE, Query::new().eq("column_id", column_id))
            .await
    }

    pub async fn delete_by_project_id(db: &DBService, project_id: Uuid) -> Result<u64, StoreError> {
        db.delete(TABLE, Query::new().eq("project_id", project_id))
            .await
    }
}
