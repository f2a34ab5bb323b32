//! Per-user notification feed.
//!
//! Failed optimistic operations and fired reminders end up here. The feed is
//! kept in memory, newest first, and streamed to the user's open clients as
//! JSON patches over the document `{"notifications": [...]}`.

use std::{
    collections::VecDeque,
    sync::{Arc, RwLock},
};

use dashmap::DashMap;
use db::models::notification::Notification;
use futures::{StreamExt, stream::BoxStream};
use json_patch::Patch;
use serde_json::json;
use thiserror::Error;
use utils::{msg_store::MsgStore, stream_msg::StreamMsg};
use uuid::Uuid;

/// Oldest entries are dropped beyond this many per user.
pub const MAX_NOTIFICATIONS: usize = 200;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,
}

#[derive(Default)]
struct UserFeed {
    entries: RwLock<VecDeque<Notification>>,
    msgs: Arc<MsgStore>,
}

fn feed_patch(entries: &VecDeque<Notification>) -> Patch {
    let value = json!([{
        "op": "replace",
        "path": "/notifications",
        "value": entries,
    }]);
    serde_json::from_value(value).unwrap_or_else(|_| Patch(Vec::new()))
}

impl UserFeed {
    /// Apply `f` to the entries and broadcast the result while still holding
    /// the lock, so subscribers see changes in the order they were made.
    fn modify<R>(&self, f: impl FnOnce(&mut VecDeque<Notification>) -> R) -> R {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let result = f(&mut entries);
        self.msgs.push_patch(feed_patch(&entries));
        result
    }
}

#[derive(Clone, Default)]
pub struct NotificationCenter {
    feeds: Arc<DashMap<Uuid, Arc<UserFeed>>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn feed(&self, user_id: Uuid) -> Arc<UserFeed> {
        self.feeds.entry(user_id).or_default().clone()
    }

    pub fn push(&self, user_id: Uuid, notification: Notification) -> Notification {
        tracing::debug!(
            user_id = %user_id,
            kind = %notification.kind,
            title = %notification.title,
            "Pushing notification"
        );
        self.feed(user_id).modify(|entries| {
            entries.push_front(notification.clone());
            entries.truncate(MAX_NOTIFICATIONS);
        });
        notification
    }

    pub fn list(&self, user_id: Uuid) -> Vec<Notification> {
        match self.feeds.get(&user_id) {
            Some(feed) => feed
                .entries
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn unread_count(&self, user_id: Uuid) -> usize {
        self.list(user_id).iter().filter(|n| !n.read).count()
    }

    pub fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification, NotificationError> {
        self.feed(user_id).modify(|entries| {
            let entry = entries
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or(NotificationError::NotFound)?;
            entry.read = true;
            Ok(entry.clone())
        })
    }

    /// Returns how many entries changed.
    pub fn mark_all_read(&self, user_id: Uuid) -> usize {
        self.feed(user_id).modify(|entries| {
            let mut changed = 0;
            for entry in entries.iter_mut().filter(|n| !n.read) {
                entry.read = true;
                changed += 1;
            }
            changed
        })
    }

    pub fn remove(&self, user_id: Uuid, id: Uuid) -> Result<(), NotificationError> {
        self.feed(user_id).modify(|entries| {
            let index = entries
                .iter()
                .position(|n| n.id == id)
                .ok_or(NotificationError::NotFound)?;
            entries.remove(index);
            Ok(())
        })
    }

    pub fn clear(&self, user_id: Uuid) {
        self.feed(user_id).modify(|entries| entries.clear());
    }

    /// Current feed as one patch, followed by every later change.
    pub fn subscribe(&self, user_id: Uuid) -> BoxStream<'static, Result<StreamMsg, std::io::Error>> {
        let feed = self.feed(user_id);
        let entries = feed.entries.read().unwrap_or_else(|e| e.into_inner());
        let snapshot = StreamMsg::JsonPatch(feed_patch(&entries));
        let live = feed.msgs.stream_live_only();
        drop(entries);

        futures::stream::once(async move { Ok(snapshot) })
            .chain(live)
            .boxed()
    }
}
