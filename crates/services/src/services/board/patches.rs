//! JSON patches for the board stream.
//!
//! Clients hold the document `{"project": {...}, "columns": {id: column},
//! "tasks": {id: task}}`. Keying by id keeps patches stable when positions
//! change.

use json_patch::Patch;
use serde_json::{Map, Value, json};

use super::state::Board;

pub fn board_document(board: &Board) -> Value {
    let columns: Map<String, Value> = board
        .columns
        .iter()
        .map(|c| (c.id.to_string(), serde_json::to_value(c).unwrap_or(Value::Null)))
        .collect();
    let tasks: Map<String, Value> = board
        .tasks
        .iter()
        .map(|t| (t.id.to_string(), serde_json::to_value(t).unwrap_or(Value::Null)))
        .collect();

    json!({
        "project": board.project,
        "columns": columns,
        "tasks": tasks,
    })
}

/// Replaces the whole client document.
pub fn snapshot(board: &Board) -> Patch {
    let ops = json!([{ "op": "replace", "path": "", "value": board_document(board) }]);
    serde_json::from_value(ops).unwrap_or_default()
}

/// Minimal patch turning the client's copy of `from` into `to`.
pub fn between(from: &Board, to: &Board) -> Patch {
    json_patch::diff(&board_document(from), &board_document(to))
}

/// Tells clients the project is gone.
pub fn project_removed() -> Patch {
    let ops = json!([
        { "op": "replace", "path": "/project", "value": Value::Null },
        { "op": "replace", "path": "/columns", "value": {} },
        { "op": "replace", "path": "/tasks", "value": {} },
    ]);
    serde_json::from_value(ops).unwrap_or_default()
}
