use chrono::{DateTime, Duration, Utc};
use db::{
    DBService, StoreError,
    models::calendar_event::{CalendarEvent, CreateCalendarEvent, UpdateCalendarEvent},
    validation::{
        MAX_REMINDER_MINUTES, ValidationError, normalize_optional, validate_reminder,
        validate_time_range, validate_title,
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Event not found")]
    NotFound,
}

/// Optional bounds for listing events; an event matches when it overlaps.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS)]
pub struct EventRange {
    #[ts(type = "Date | null")]
    pub from: Option<DateTime<Utc>>,
    #[ts(type = "Date | null")]
    pub to: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct CalendarService {
    db: DBService,
}

impl CalendarService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub async fn list_events(
        &self,
        user_id: Uuid,
        range: EventRange,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        if let (Some(from), Some(to)) = (range.from, range.to) {
            validate_time_range(from, to)?;
        }
        Ok(CalendarEvent::find_by_user(&self.db, user_id, range.from, range.to).await?)
    }

    pub async fn get_event(&self, user_id: Uuid, id: Uuid) -> Result<CalendarEvent, CalendarError> {
        CalendarEvent::find_owned(&self.db, id, user_id)
            .await?
            .ok_or(CalendarError::NotFound)
    }

    pub async fn create_event(
        &self,
        user_id: Uuid,
        data: CreateCalendarEvent,
    ) -> Result<CalendarEvent, CalendarError> {
        validate_time_range(data.start, data.end)?;
        let data = CreateCalendarEvent {
            title: validate_title("title", &data.title)?,
            location: normalize_optional(data.location),
            description: normalize_optional(data.description),
            reminder_time: validate_reminder(data.is_reminder, data.reminder_time)?,
            ..data
        };

        let event = CalendarEvent::insert(&self.db, &CalendarEvent::new(user_id, &data)).await?;
        tracing::debug!(event_id = %event.id, is_reminder = event.is_reminder, "Created event");
        Ok(event)
    }

    /// Merges `data` into the stored event and re-validates the result.
    /// Blank location or description clears it; turning the reminder off
    /// clears its offset.
    pub async fn update_event(
        &self,
        user_id: Uuid,
        id: Uuid,
        data: UpdateCalendarEvent,
    ) -> Result<CalendarEvent, CalendarError> {
        let mut event = self.get_event(user_id, id).await?;

        if let Some(title) = data.title.as_deref() {
            event.title = validate_title("title", title)?;
        }
        event.start = data.start.unwrap_or(event.start);
        event.end = data.end.unwrap_or(event.end);
        validate_time_range(event.start, event.end)?;
        if data.location.is_some() {
            event.location = normalize_optional(data.location);
        }
        if data.description.is_some() {
            event.description = normalize_optional(data.description);
        }
        event.is_reminder = data.is_reminder.unwrap_or(event.is_reminder);
        event.reminder_time =
            validate_reminder(event.is_reminder, data.reminder_time.or(event.reminder_time))?;

        CalendarEvent::save(&self.db, &event)
            .await?
            .ok_or(CalendarError::NotFound)
    }

    pub async fn delete_event(&self, user_id: Uuid, id: Uuid) -> Result<(), CalendarError> {
        self.get_event(user_id, id).await?;
        CalendarEvent::delete(&self.db, id).await?;
        Ok(())
    }

    /// Reminder events of every user whose reminder instant falls in
    /// `(now - window, now]`.
    pub async fn due_reminders(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let from = now - window;
        // the reminder fires at most MAX_REMINDER_MINUTES before the start
        let latest_start =
            now + Duration::minutes(i64::from(MAX_REMINDER_MINUTES)) + Duration::seconds(1);
        let candidates =
            CalendarEvent::find_reminders_starting_between(&self.db, from, latest_start).await?;

        Ok(candidates
            .into_iter()
            .filter(|e| e.reminder_at().is_some_and(|at| at > from && at <= now))
            .collect())
    }
}
