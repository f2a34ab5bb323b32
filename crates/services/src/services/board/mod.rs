//! Projects, columns and tasks: the one data-access path for the kanban board.
//!
//! Every write goes to the backend and is then mirrored into a cached
//! [`Board`] per project, with the difference broadcast as a JSON patch to
//! the project's subscribers. Drag and drop ([`BoardService::move_task`]) is
//! optimistic: the cache and subscribers see the move before the backend
//! does, and both are rolled back if the backend rejects it.

pub mod patches;
pub mod state;

use std::sync::Arc;

use dashmap::DashMap;
use db::{
    DBService, StoreError,
    models::{
        column::{Column, CreateColumn, DEFAULT_COLUMNS, UpdateColumn},
        notification::Notification,
        project::{CreateProject, Project, UpdateProject},
        task::{CreateTask, MoveTask, Placement, Task, UNASSIGNED_STATUS, UpdateTask},
    },
    validation::{ValidationError, normalize_optional, validate_title},
};
use futures::{StreamExt, stream::BoxStream};
use thiserror::Error;
use tokio::sync::Mutex;
use utils::{msg_store::MsgStore, stream_msg::StreamMsg};
use uuid::Uuid;

pub use state::Board;

use super::notification::NotificationCenter;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Column not found")]
    ColumnNotFound,
    #[error("Task not found")]
    TaskNotFound,
    #[error("Invalid column order: {0}")]
    InvalidColumnOrder(String),
}

/// Cached board of one project plus the hub its patches go out on.
///
/// Every mutation of a project's rows holds the `board` lock from its first
/// read of the current positions until the cache has been re-synced, so
/// positions stay dense and patches leave in the order the changes were made.
#[derive(Default)]
struct BoardChannel {
    board: Mutex<Option<Board>>,
    msgs: Arc<MsgStore>,
}

#[derive(Clone)]
pub struct BoardService {
    db: DBService,
    notifications: NotificationCenter,
    channels: Arc<DashMap<Uuid, Arc<BoardChannel>>>,
}

impl BoardService {
    pub fn new(db: DBService, notifications: NotificationCenter) -> Self {
        Self {
            db,
            notifications,
            channels: Arc::new(DashMap::new()),
        }
    }

    fn channel(&self, project_id: Uuid) -> Arc<BoardChannel> {
        self.channels.entry(project_id).or_default().clone()
    }

    // Projects

    pub async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, BoardError> {
        Ok(Project::find_by_owner(&self.db, user_id).await?)
    }

    pub async fn get_project(&self, user_id: Uuid, id: Uuid) -> Result<Project, BoardError> {
        Project::find_owned(&self.db, id, user_id)
            .await?
            .ok_or(BoardError::ProjectNotFound)
    }

    /// Creates the project with the default columns. If a column cannot be
    /// stored, the project and its columns are removed again.
    pub async fn create_project(
        &self,
        user_id: Uuid,
        data: CreateProject,
    ) -> Result<Project, BoardError> {
        let name = validate_title("name", &data.name)?;
        let description = normalize_optional(data.description);

        let project = Project::insert(&self.db, &Project::new(user_id, name, description)).await?;
        for (position, title) in DEFAULT_COLUMNS.iter().enumerate() {
            let column = Column::new(project.id, title.to_string(), position as i32);
            if let Err(e) = Column::insert(&self.db, &column).await {
                tracing::warn!(
                    project_id = %project.id,
                    error = %e,
                    "Failed to seed columns, removing project"
                );
                self.undo_project(project.id).await;
                return Err(e.into());
            }
        }

        tracing::info!(project_id = %project.id, user_id = %user_id, "Created project");
        Ok(project)
    }

    /// Best effort: remove a half-created project.
    async fn undo_project(&self, project_id: Uuid) {
        if let Err(e) = Column::delete_by_project_id(&self.db, project_id).await {
            tracing::error!(project_id = %project_id, error = %e, "Failed to remove seeded columns");
        }
        if let Err(e) = Project::delete(&self.db, project_id).await {
            tracing::error!(project_id = %project_id, error = %e, "Failed to remove project");
        }
    }

    pub async fn update_project(
        &self,
        user_id: Uuid,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Project, BoardError> {
        self.get_project(user_id, id).await?;
        let payload = UpdateProject {
            name: data.name.as_deref().map(|n| validate_title("name", n)).transpose()?,
            description: data.description.map(|d| d.trim().to_string()),
        };

        let channel = self.channel(id);
        let mut cached = channel.board.lock().await;
        let project = Project::update(&self.db, id, &payload)
            .await?
            .ok_or(BoardError::ProjectNotFound)?;
        self.resync(&channel, &mut cached, id).await;
        Ok(project)
    }

    /// Deletes tasks, then columns, then the project itself.
    pub async fn delete_project(&self, user_id: Uuid, id: Uuid) -> Result<(), BoardError> {
        self.get_project(user_id, id).await?;

        let channel = self.channel(id);
        let mut cached = channel.board.lock().await;
        let tasks = Task::delete_by_project_id(&self.db, id).await?;
        let columns = Column::delete_by_project_id(&self.db, id).await?;
        Project::delete(&self.db, id).await?;

        *cached = None;
        channel.msgs.push_patch(patches::project_removed());
        channel.msgs.push_finished();
        drop(cached);
        self.channels.remove(&id);

        tracing::info!(project_id = %id, tasks, columns, "Deleted project");
        Ok(())
    }

    // Board

    pub async fn load_board(&self, user_id: Uuid, project_id: Uuid) -> Result<Board, BoardError> {
        let project = self.get_project(user_id, project_id).await?;
        let channel = self.channel(project_id);
        let mut cached = channel.board.lock().await;
        if cached.is_none() {
            *cached = Some(Board::fetch(&self.db, project).await?);
        }
        cached.clone().ok_or(BoardError::ProjectNotFound)
    }

    /// Current board as one patch, followed by every later change.
    pub async fn subscribe(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<BoxStream<'static, Result<StreamMsg, std::io::Error>>, BoardError> {
        let project = self.get_project(user_id, project_id).await?;
        let channel = self.channel(project_id);

        // Snapshot and receiver are taken under the lock so no change falls
        // between them.
        let mut cached = channel.board.lock().await;
        let board = match cached.as_ref() {
            Some(board) => board.clone(),
            None => {
                let board = Board::fetch(&self.db, project).await?;
                *cached = Some(board.clone());
                board
            }
        };
        let live = channel.msgs.stream_live_only();
        drop(cached);

        let first = StreamMsg::JsonPatch(patches::snapshot(&board));
        Ok(futures::stream::once(async move { Ok(first) })
            .chain(live)
            .boxed())
    }

    /// Re-read the board after a committed write and broadcast what changed.
    ///
    /// Never fails: when the re-read does, the cache is dropped so the next
    /// read goes to the backend, and subscribers are told to refetch.
    async fn resync(&self, channel: &BoardChannel, cached: &mut Option<Board>, project_id: Uuid) {
        if cached.is_none() {
            if channel.msgs.subscriber_count() > 0 {
                channel.msgs.push(StreamMsg::RefreshRequired {
                    reason: "board changed while not cached".to_string(),
                });
            }
            return;
        }

        let fresh = match Project::find_by_id(&self.db, project_id).await {
            Ok(Some(project)) => Board::fetch(&self.db, project).await,
            Ok(None) => {
                *cached = None;
                return;
            }
            Err(e) => Err(e),
        };

        match fresh {
            Ok(fresh) => {
                if let Some(old) = cached.as_ref() {
                    let patch = patches::between(old, &fresh);
                    if !patch.0.is_empty() {
                        channel.msgs.push_patch(patch);
                    }
                }
                *cached = Some(fresh);
            }
            Err(e) => {
                tracing::warn!(
                    project_id = %project_id,
                    error = %e,
                    "Board re-read failed after write, dropping cached board"
                );
                *cached = None;
                channel.msgs.push(StreamMsg::RefreshRequired {
                    reason: format!("board re-read failed: {e}"),
                });
            }
        }
    }

    // Columns

    async fn owned_column(&self, user_id: Uuid, column_id: Uuid) -> Result<Column, BoardError> {
        let column = Column::find_by_id(&self.db, column_id)
            .await?
            .ok_or(BoardError::ColumnNotFound)?;
        match Project::find_owned(&self.db, column.project_id, user_id).await? {
            Some(_) => Ok(column),
            None => Err(BoardError::ColumnNotFound),
        }
    }

    pub async fn get_column(&self, user_id: Uuid, column_id: Uuid) -> Result<Column, BoardError> {
        self.owned_column(user_id, column_id).await
    }

    /// Appends a column at the end of the board.
    pub async fn create_column(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        data: CreateColumn,
    ) -> Result<Column, BoardError> {
        self.get_project(user_id, project_id).await?;
        let title = validate_title("title", &data.title)?;

        let channel = self.channel(project_id);
        let mut cached = channel.board.lock().await;
        let position = Column::find_by_project_id(&self.db, project_id).await?.len() as i32;
        let column = Column::insert(&self.db, &Column::new(project_id, title, position)).await?;
        self.resync(&channel, &mut cached, project_id).await;
        Ok(column)
    }

    /// Renames a column; its tasks take the new title as status.
    pub async fn rename_column(
        &self,
        user_id: Uuid,
        column_id: Uuid,
        data: UpdateColumn,
    ) -> Result<Column, BoardError> {
        let column = self.owned_column(user_id, column_id).await?;
        let title = validate_title("title", &data.title)?;

        let channel = self.channel(column.project_id);
        let mut cached = channel.board.lock().await;
        let updated = Column::update_title(&self.db, column_id, &title)
            .await?
            .ok_or(BoardError::ColumnNotFound)?;
        Task::set_status_for_column(&self.db, column_id, &title).await?;
        self.resync(&channel, &mut cached, column.project_id).await;
        Ok(updated)
    }

    /// Deletes a column. Its tasks move to the end of `reassign_to` when
    /// given, otherwise they are deleted with it.
    pub async fn delete_column(
        &self,
        user_id: Uuid,
        column_id: Uuid,
        reassign_to: Option<Uuid>,
    ) -> Result<(), BoardError> {
        let column = self.owned_column(user_id, column_id).await?;
        let channel = self.channel(column.project_id);
        let mut cached = channel.board.lock().await;
        let columns = Column::find_by_project_id(&self.db, column.project_id).await?;

        match reassign_to {
            Some(target_id) => {
                let target = columns
                    .iter()
                    .find(|c| c.id == target_id && c.id != column_id)
                    .ok_or(BoardError::ColumnNotFound)?;
                let base = Task::find_by_column_id(&self.db, target.id).await?.len() as i32;
                let moving = Task::find_by_column_id(&self.db, column_id).await?;
                for (offset, task) in moving.iter().enumerate() {
                    let placement = Placement {
                        column_id: Some(target.id),
                        status: target.title.clone(),
                        position: base + offset as i32,
                    };
                    Task::set_placement(&self.db, task.id, &placement).await?;
                }
            }
            None => {
                Task::delete_by_column_id(&self.db, column_id).await?;
            }
        }

        Column::delete(&self.db, column_id).await?;
        let remaining = columns.iter().filter(|c| c.id != column_id);
        for (position, c) in remaining.enumerate() {
            if c.position != position as i32 {
                Column::set_position(&self.db, c.id, position as i32).await?;
            }
        }

        self.resync(&channel, &mut cached, column.project_id).await;
        tracing::info!(column_id = %column_id, reassigned = reassign_to.is_some(), "Deleted column");
        Ok(())
    }

    /// `column_ids` must name every column of the project exactly once.
    pub async fn reorder_columns(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        column_ids: Vec<Uuid>,
    ) -> Result<Vec<Column>, BoardError> {
        self.get_project(user_id, project_id).await?;
        let channel = self.channel(project_id);
        let mut cached = channel.board.lock().await;
        let columns = Column::find_by_project_id(&self.db, project_id).await?;

        let mut expected: Vec<Uuid> = columns.iter().map(|c| c.id).collect();
        let mut given = column_ids.clone();
        expected.sort();
        given.sort();
        if expected != given {
            return Err(BoardError::InvalidColumnOrder(format!(
                "expected the {} columns of the project, each exactly once",
                columns.len()
            )));
        }

        let mut reordered = Vec::with_capacity(columns.len());
        for (position, id) in column_ids.iter().enumerate() {
            let Some(column) = columns.iter().find(|c| c.id == *id) else {
                continue;
            };
            if column.position != position as i32 {
                Column::set_position(&self.db, *id, position as i32).await?;
            }
            reordered.push(Column {
                position: position as i32,
                ..column.clone()
            });
        }

        self.resync(&channel, &mut cached, project_id).await;
        Ok(reordered)
    }

    // Tasks

    pub async fn list_tasks(&self, user_id: Uuid, project_id: Uuid) -> Result<Vec<Task>, BoardError> {
        Ok(self.load_board(user_id, project_id).await?.tasks)
    }

    pub async fn get_task(&self, user_id: Uuid, id: Uuid) -> Result<Task, BoardError> {
        Task::find_owned(&self.db, id, user_id)
            .await?
            .ok_or(BoardError::TaskNotFound)
    }

    /// Appends the task to its column; without a column it goes to the
    /// project's first one.
    pub async fn create_task(&self, user_id: Uuid, data: CreateTask) -> Result<Task, BoardError> {
        self.get_project(user_id, data.project_id).await?;
        let data = CreateTask {
            title: validate_title("title", &data.title)?,
            description: normalize_optional(data.description),
            attachment_url: normalize_optional(data.attachment_url),
            ..data
        };

        let channel = self.channel(data.project_id);
        let mut cached = channel.board.lock().await;
        let columns = Column::find_by_project_id(&self.db, data.project_id).await?;
        let column = match data.column_id {
            Some(id) => Some(
                columns
                    .iter()
                    .find(|c| c.id == id)
                    .ok_or(BoardError::ColumnNotFound)?,
            ),
            None => columns.first(),
        };

        let (column_id, status, position) = match column {
            Some(c) => (
                Some(c.id),
                c.title.clone(),
                Task::find_by_column_id(&self.db, c.id).await?.len() as i32,
            ),
            None => (None, UNASSIGNED_STATUS.to_string(), 0),
        };

        let task = Task::insert(
            &self.db,
            &Task::new(&data, user_id, column_id, status, position),
        )
        .await?;
        self.resync(&channel, &mut cached, task.project_id).await;
        Ok(task)
    }

    /// Applies field edits. A new `column_id` moves the task to the end of
    /// that column the same way [`BoardService::move_task`] does.
    pub async fn update_task(
        &self,
        user_id: Uuid,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Task, BoardError> {
        let existing = self.get_task(user_id, id).await?;
        let title = data
            .title
            .as_deref()
            .map(|t| validate_title("title", t))
            .transpose()?;

        let channel = self.channel(existing.project_id);
        let mut cached = channel.board.lock().await;

        if let Some(column_id) = data.column_id
            && existing.column_id != Some(column_id)
        {
            let project = self.get_project(user_id, existing.project_id).await?;
            let target = MoveTask {
                column_id,
                index: usize::MAX,
            };
            self.apply_move(user_id, &existing, project, &channel, &mut cached, target)
                .await?;
        }

        let payload = UpdateTask {
            title,
            column_id: None,
            description: data.description.map(normalize_optional),
            attachment_url: data.attachment_url.map(normalize_optional),
            ..data
        };
        let task = Task::update(&self.db, id, &payload)
            .await?
            .ok_or(BoardError::TaskNotFound)?;
        self.resync(&channel, &mut cached, task.project_id).await;
        Ok(task)
    }

    /// Deletes a task and closes the gap it leaves in its column.
    pub async fn delete_task(&self, user_id: Uuid, id: Uuid) -> Result<(), BoardError> {
        let project_id = self.get_task(user_id, id).await?.project_id;
        let channel = self.channel(project_id);
        let mut cached = channel.board.lock().await;

        // re-read under the lock: the task may have moved meanwhile
        let task = self.get_task(user_id, id).await?;
        Task::delete(&self.db, id).await?;

        let remaining = match task.column_id {
            Some(column_id) => Task::find_by_column_id(&self.db, column_id).await?,
            None => Vec::new(),
        };
        for (position, t) in remaining.iter().enumerate() {
            if t.position != position as i32 {
                let mut placement = t.placement();
                placement.position = position as i32;
                Task::set_placement(&self.db, t.id, &placement).await?;
            }
        }

        self.resync(&channel, &mut cached, project_id).await;
        Ok(())
    }

    pub async fn toggle_complete(&self, user_id: Uuid, id: Uuid) -> Result<Task, BoardError> {
        let project_id = self.get_task(user_id, id).await?.project_id;
        let channel = self.channel(project_id);
        let mut cached = channel.board.lock().await;

        let task = self.get_task(user_id, id).await?;
        let updated = Task::set_completed(&self.db, id, !task.completed)
            .await?
            .ok_or(BoardError::TaskNotFound)?;
        self.resync(&channel, &mut cached, project_id).await;
        Ok(updated)
    }

    /// Drag and drop: place a task at `index` in `column_id`.
    ///
    /// The cached board changes and subscribers are patched before anything
    /// is written. If a write fails, the tasks already written are put back,
    /// the cache and subscribers are restored, an error notification goes to
    /// the user's feed and the error is returned.
    pub async fn move_task(
        &self,
        user_id: Uuid,
        id: Uuid,
        target: MoveTask,
    ) -> Result<Task, BoardError> {
        let task = self.get_task(user_id, id).await?;
        let project = self.get_project(user_id, task.project_id).await?;
        let channel = self.channel(project.id);
        let mut cached = channel.board.lock().await;
        self.apply_move(user_id, &task, project, &channel, &mut cached, target)
            .await
    }

    /// Move under an already held board lock.
    async fn apply_move(
        &self,
        user_id: Uuid,
        task: &Task,
        project: Project,
        channel: &BoardChannel,
        cached: &mut Option<Board>,
        target: MoveTask,
    ) -> Result<Task, BoardError> {
        let id = task.id;
        let before = match cached.take() {
            Some(board) => board,
            None => Board::fetch(&self.db, project).await?,
        };
        let mut after = before.clone();
        let Some(changes) = after.apply_move(id, target.column_id, target.index) else {
            let missing = if after.task(id).is_none() {
                BoardError::TaskNotFound
            } else {
                BoardError::ColumnNotFound
            };
            *cached = Some(before);
            return Err(missing);
        };

        if changes.is_empty() {
            let unchanged = after.task(id).cloned().ok_or(BoardError::TaskNotFound);
            *cached = Some(after);
            return unchanged;
        }

        channel.msgs.push_patch(patches::between(&before, &after));
        *cached = Some(after.clone());

        let mut written: Vec<Uuid> = Vec::with_capacity(changes.len());
        for (task_id, placement) in &changes {
            match Task::set_placement(&self.db, *task_id, placement).await {
                Ok(_) => written.push(*task_id),
                Err(e) => {
                    tracing::warn!(
                        task_id = %id,
                        project_id = %before.project.id,
                        error = %e,
                        "Move failed, rolling back"
                    );
                    self.undo_writes(&before, &written).await;
                    channel.msgs.push_patch(patches::between(&after, &before));
                    *cached = Some(before);
                    self.notifications.push(
                        user_id,
                        Notification::error(
                            "Could not move task",
                            format!("\"{}\" was put back: {e}", task.title),
                        ),
                    );
                    return Err(e.into());
                }
            }
        }

        tracing::debug!(task_id = %id, moved = changes.len(), "Moved task");
        after.task(id).cloned().ok_or(BoardError::TaskNotFound)
    }

    /// Best effort: put tasks written during a failed move back where they were.
    async fn undo_writes(&self, before: &Board, written: &[Uuid]) {
        for task_id in written {
            let Some(original) = before.task(*task_id) else {
                continue;
            };
            if let Err(e) = Task::set_placement(&self.db, *task_id, &original.placement()).await {
                tracing::error!(task_id = %task_id, error = %e, "Failed to undo task placement");
            }
        }
    }
}
