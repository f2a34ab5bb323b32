//! The in-memory board and the pure placement logic behind drag and drop.

use std::collections::HashMap;

use db::{
    DBService, StoreError,
    models::{
        column::Column,
        project::Project,
        task::{Placement, Task, UNASSIGNED_STATUS},
    },
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// A project with its columns in board order and its tasks ordered by
/// column, then position. Tasks outside every column come last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Board {
    pub project: Project,
    pub columns: Vec<Column>,
    pub tasks: Vec<Task>,
}

impl Board {
    pub async fn fetch(db: &DBService, project: Project) -> Result<Self, StoreError> {
        let columns = Column::find_by_project_id(db, project.id).await?;
        let tasks = Task::find_by_project_id(db, project.id).await?;
        let mut board = Self {
            project,
            columns,
            tasks,
        };
        board.sort();
        Ok(board)
    }

    pub fn sort(&mut self) {
        self.columns.sort_by_key(|c| c.position);
        let rank: HashMap<Uuid, i32> = self.columns.iter().map(|c| (c.id, c.position)).collect();
        self.tasks.sort_by_key(|t| {
            let column_rank = t
                .column_id
                .and_then(|id| rank.get(&id).copied())
                .unwrap_or(i32::MAX);
            (column_rank, t.position, t.created_at)
        });
    }

    pub fn column(&self, id: Uuid) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Ids of the tasks in a column, in position order.
    pub fn column_task_ids(&self, column_id: Option<Uuid>) -> Vec<Uuid> {
        let mut tasks: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.column_id == column_id)
            .collect();
        tasks.sort_by_key(|t| (t.position, t.created_at));
        tasks.into_iter().map(|t| t.id).collect()
    }

    /// Move a task to `index` within `to_column`, clamping the index to the
    /// column's length. Both the source and target column are renumbered
    /// from 0 and every moved task takes the target column's title as status.
    ///
    /// Returns the tasks whose placement changed, with their new placement.
    /// `None` when the task or column is not on this board.
    pub fn apply_move(
        &mut self,
        task_id: Uuid,
        to_column: Uuid,
        index: usize,
    ) -> Option<Vec<(Uuid, Placement)>> {
        let status = self.column(to_column)?.title.clone();
        let from_column = self.task(task_id)?.column_id;

        let mut source = self.column_task_ids(from_column);
        source.retain(|id| *id != task_id);

        let mut target = if from_column == Some(to_column) {
            source.clone()
        } else {
            self.column_task_ids(Some(to_column))
        };
        target.insert(index.min(target.len()), task_id);

        let mut wanted: HashMap<Uuid, Placement> = HashMap::new();
        if from_column != Some(to_column) {
            let source_status = self.status_for(from_column);
            for (pos, id) in source.iter().enumerate() {
                wanted.insert(
                    *id,
                    Placement {
                        column_id: from_column,
                        status: source_status.clone(),
                        position: pos as i32,
                    },
                );
            }
        }
        for (pos, id) in target.iter().enumerate() {
            wanted.insert(
                *id,
                Placement {
                    column_id: Some(to_column),
                    status: status.clone(),
                    position: pos as i32,
                },
            );
        }

        Some(self.apply_placements(wanted))
    }

    /// Renumber the tasks of a column densely, keeping their order.
    pub fn compact_column(&mut self, column_id: Option<Uuid>) -> Vec<(Uuid, Placement)> {
        let status = self.status_for(column_id);
        let wanted = self
            .column_task_ids(column_id)
            .into_iter()
            .enumerate()
            .map(|(pos, id)| {
                (
                    id,
                    Placement {
                        column_id,
                        status: status.clone(),
                        position: pos as i32,
                    },
                )
            })
            .collect();
        self.apply_placements(wanted)
    }

    /// Put every task back where `placements` says.
    pub fn restore_placements(&mut self, placements: &[(Uuid, Placement)]) {
        let wanted = placements.iter().cloned().collect();
        self.apply_placements(wanted);
    }

    fn status_for(&self, column_id: Option<Uuid>) -> String {
        column_id
            .and_then(|id| self.column(id))
            .map(|c| c.title.clone())
            .unwrap_or_else(|| UNASSIGNED_STATUS.to_string())
    }

    fn apply_placements(&mut self, mut wanted: HashMap<Uuid, Placement>) -> Vec<(Uuid, Placement)> {
        let mut changed = Vec::new();
        for task in self.tasks.iter_mut() {
            let Some(placement) = wanted.remove(&task.id) else {
                continue;
            };
            if task.placement() != placement {
                task.column_id = placement.column_id;
                task.status = placement.status.clone();
                task.position = placement.position;
                changed.push((task.id, placement));
            }
        }
        self.sort();
        changed
    }
}
