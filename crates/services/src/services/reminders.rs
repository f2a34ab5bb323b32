//! Background sweep that turns due calendar reminders into notifications.

use std::{collections::HashSet, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use db::models::notification::Notification;
use tokio::{
    sync::RwLock,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use uuid::Uuid;

use super::{calendar::CalendarService, config::Config, notification::NotificationCenter};

pub struct ReminderSweeper {
    calendar: CalendarService,
    notifications: NotificationCenter,
    config: Arc<RwLock<Config>>,
    /// (event, start) pairs already announced; moving an event re-arms it
    fired: HashSet<(Uuid, DateTime<Utc>)>,
}

impl ReminderSweeper {
    pub fn new(
        calendar: CalendarService,
        notifications: NotificationCenter,
        config: Arc<RwLock<Config>>,
    ) -> Self {
        Self {
            calendar,
            notifications,
            config,
            fired: HashSet::new(),
        }
    }

    /// Look back twice the interval so a slow tick cannot skip a reminder.
    fn window(interval_secs: u64) -> Duration {
        Duration::seconds(i64::try_from(interval_secs.saturating_mul(2)).unwrap_or(i64::MAX / 2))
    }

    /// One sweep. Returns how many notifications were pushed.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> usize {
        let (enabled, interval_secs) = {
            let config = self.config.read().await;
            (
                config.notifications.reminders_enabled,
                config.calendar.reminder_interval_secs,
            )
        };
        if !enabled {
            return 0;
        }

        let window = Self::window(interval_secs);
        let due = match self.calendar.due_reminders(now, window).await {
            Ok(due) => due,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load due reminders");
                return 0;
            }
        };

        let mut pushed = 0;
        for event in due {
            if !self.fired.insert((event.id, event.start)) {
                continue;
            }
            let mut message = format!("Starts at {}", event.start.format("%H:%M UTC"));
            if let Some(location) = &event.location {
                message.push_str(&format!(" at {location}"));
            }
            self.notifications.push(
                event.user_id,
                Notification::info(format!("Reminder: {}", event.title), message),
            );
            pushed += 1;
        }

        // events that already started can never fire again
        self.fired.retain(|(_, start)| *start > now - window);
        pushed
    }

    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut current_secs = self.config.read().await.calendar.reminder_interval_secs.max(1);
            let mut ticker = interval(StdDuration::from_secs(current_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval_secs = current_secs, "Reminder sweeper started");

            loop {
                ticker.tick().await;
                let fired = self.tick(Utc::now()).await;
                if fired > 0 {
                    tracing::debug!(fired, "Reminders fired");
                }

                let configured = self.config.read().await.calendar.reminder_interval_secs.max(1);
                if configured != current_secs {
                    current_secs = configured;
                    ticker = interval(StdDuration::from_secs(current_secs));
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    tracing::info!(interval_secs = current_secs, "Reminder interval changed");
                }
            }
        })
    }
}
