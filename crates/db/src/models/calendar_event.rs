use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use ts_rs::TS;
use uuid::Uuid;

use crate::{DBService, Query, StoreError};

pub const TABLE: &str = "calendar_events";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[ts(type = "Date")]
    pub start: DateTime<Utc>,
    #[ts(type = "Date")]
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_reminder: bool,
    /// Minutes before `start` at which the reminder fires
    pub reminder_time: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCalendarEvent {
    pub title: String,
    #[ts(type = "Date")]
    pub start: DateTime<Utc>,
    #[ts(type = "Date")]
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_reminder: bool,
    pub reminder_time: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCalendarEvent {
    pub title: Option<String>,
    #[ts(type = "Date | null")]
    pub start: Option<DateTime<Utc>>,
    #[ts(type = "Date | null")]
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub is_reminder: Option<bool>,
    pub reminder_time: Option<i32>,
}

impl CalendarEvent {
    pub fn new(user_id: Uuid, data: &CreateCalendarEvent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: data.title.clone(),
            start: data.start,
            end: data.end,
            location: data.location.clone(),
            description: data.description.clone(),
            is_reminder: data.is_reminder,
            reminder_time: data.reminder_time,
            created_at: now,
            updated_at: now,
        }
    }

    /// Instant the reminder fires, if this event is a reminder.
    pub fn reminder_at(&self) -> Option<DateTime<Utc>> {
        if !self.is_reminder {
            return None;
        }
        let minutes = self.reminder_time.unwrap_or(0);
        Some(self.start - Duration::minutes(i64::from(minutes)))
    }

    /// True when the event overlaps `[from, to)`.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start < to && self.end >= from
    }

    pub async fn find_owned(
        db: &DBService,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, StoreError> {
        db.select_one(TABLE, Query::new().eq("id", id).eq("user_id", user_id))
            .await
    }

    /// Events of a user overlapping `[from, to)`, ordered by start.
    pub async fn find_by_user(
        db: &DBService,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Self>, StoreError> {
        let mut query = Query::new().eq("user_id", user_id);
        if let Some(to) = to {
            query = query.lt("start", to);
        }
        if let Some(from) = from {
            query = query.gte("end", from);
        }
        db.select(TABLE, query.order_by("start", true)).await
    }

    /// Reminder events of every user starting within `[from, to)`.
    pub async fn find_reminders_starting_between(
        db: &DBService,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Self>, StoreError> {
        db.select(
            TABLE,
            Query::new()
                .eq("is_reminder", true)
                .gte("start", from)
                .lt("start", to)
                .order_by("start", true),
        )
        .await
    }

    pub async fn insert(db: &DBService, event: &CalendarEvent) -> Result<Self, StoreError> {
        db.insert(TABLE, event).await
    }

    /// Write every editable field, including cleared ones.
    pub async fn save(db: &DBService, event: &CalendarEvent) -> Result<Option<Self>, StoreError> {
        let patch = json!({
            "title": event.title,
            "start": event.start,
            "end": event.end,
            "location": event.location,
            "description": event.description,
            "is_reminder": event.is_reminder,
            "reminder_time": event.reminder_time,
            "updated_at": Utc::now(),
        });
        db.update_one(TABLE, Query::new().eq("id", event.id), patch)
            .await
    }

    pub async fn delete(db: &DBService, id: Uuid) -> Result<u64, StoreError> {
        db.delete(TABLE, Query::new().eq("id", id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn event_at(user_id: Uuid, start: DateTime<Utc>, hours: i64) -> CalendarEvent {
        CalendarEvent::new(
            user_id,
            &CreateCalendarEvent {
                title: "Standup".into(),
                start,
                end: start + Duration::hours(hours),
                location: None,
                description: None,
                is_reminder: false,
                reminder_time: None,
            },
        )
    }

    #[test]
    fn test_reminder_at() {
        let start = Utc::now();
        let mut event = event_at(Uuid::new_v4(), start, 1);
        assert_eq!(event.reminder_at(), None);

        event.is_reminder = true;
        assert_eq!(event.reminder_at(), Some(start));

        event.reminder_time = Some(15);
        assert_eq!(event.reminder_at(), Some(start - Duration::minutes(15)));
    }

    #[tokio::test]
    async fn test_find_by_user_returns_overlapping_events() {
        let db = DBService::memory(MemoryStore::new());
        let user = Uuid::new_v4();
        let day = Utc::now();

        let before = event_at(user, day - Duration::days(2), 1);
        let spanning = event_at(user, day - Duration::hours(2), 4);
        let inside = event_at(user, day + Duration::hours(3), 1);
        let after = event_at(user, day + Duration::days(2), 1);
        for e in [&before, &spanning, &inside, &after] {
            CalendarEvent::insert(&db, e).await.unwrap();
        }
        CalendarEvent::insert(&db, &event_at(Uuid::new_v4(), day, 1))
            .await
            .unwrap();

        let found =
            CalendarEvent::find_by_user(&db, user, Some(day), Some(day + Duration::days(1)))
                .await
                .unwrap();
        let ids: Vec<_> = found.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![spanning.id, inside.id]);
        assert!(found.iter().all(|e| e.overlaps(day, day + Duration::days(1))));
    }
}
