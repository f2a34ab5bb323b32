use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::changes;
use crate::{DBService, Query, StoreError};

pub const TABLE: &str = "emails";

/// Length of the preview derived from a body when the sender gives none.
pub const PREVIEW_LEN: usize = 140;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmailFolder {
    #[default]
    Inbox,
    Sent,
    Drafts,
    Trash,
    Archive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct Email {
    pub id: Uuid,
    pub account_id: Uuid,
    pub user_id: Uuid,
    /// RFC 5322 Message-ID as reported by the mail server
    pub message_id: String,
    pub folder: EmailFolder,
    #[serde(rename = "from")]
    pub from_address: String,
    #[serde(rename = "to", default)]
    pub to_addresses: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub preview: String,
    pub body: Option<String>,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub starred: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateEmail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<EmailFolder>,
}

/// First [`PREVIEW_LEN`] characters of `body` with whitespace collapsed.
pub fn preview_of(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(PREVIEW_LEN).collect()
}

impl Email {
    pub async fn find_owned(
        db: &DBService,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, StoreError> {
        db.select_one(TABLE, Query::new().eq("id", id).eq("user_id", user_id))
            .await
    }

    /// Newest first.
    pub async fn find_by_user(
        db: &DBService,
        user_id: Uuid,
        account_id: Option<Uuid>,
        folder: Option<EmailFolder>,
    ) -> Result<Vec<Self>, StoreError> {
        let mut query = Query::new().eq("user_id", user_id);
        if let Some(account_id) = account_id {
            query = query.eq("account_id", account_id);
        }
        if let Some(folder) = folder {
            query = query.eq("folder", folder);
        }
        db.select(TABLE, query.order_by("received_at", false)).await
    }

    /// Message ids already stored for an account, used to skip duplicates on sync.
    pub async fn known_message_ids(
        db: &DBService,
        account_id: Uuid,
    ) -> Result<Vec<String>, StoreError> {
        let rows: Vec<Email> = db
            .select(TABLE, Query::new().eq("account_id", account_id))
            .await?;
        Ok(rows.into_iter().map(|e| e.message_id).collect())
    }

    pub async fn insert(db: &DBService, email: &Email) -> Result<Self, StoreError> {
        db.insert(TABLE, email).await
    }

    pub async fn update(
        db: &DBService,
        id: Uuid,
        payload: &UpdateEmail,
    ) -> Result<Option<Self>, StoreError> {
        db.update_one(TABLE, Query::new().eq("id", id), changes(payload, false)?)
            .await
    }

    pub async fn delete(db: &DBService, id: Uuid) -> Result<u64, StoreError> {
        db.delete(TABLE, Query::new().eq("id", id)).await
    }

    pub async fn delete_by_account(db: &DBService, account_id: Uuid) -> Result<u64, StoreError> {
        db.delete(TABLE, Query::new().eq("account_id", account_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use chrono::Duration;

    fn email(user_id: Uuid, account_id: Uuid, folder: EmailFolder, age_mins: i64) -> Email {
        Email {
            id: Uuid::new_v4(),
            account_id,
            user_id,
            message_id: format!("<{}@example.com>", Uuid::new_v4()),
            folder,
            from_address: "alice@example.com".into(),
            to_addresses: vec!["me@example.com".into()],
            subject: "Lunch?".into(),
            preview: "Are you free".into(),
            body: None,
            received_at: Utc::now() - Duration::minutes(age_mins),
            read: false,
            starred: false,
        }
    }

    #[test]
    fn test_preview_collapses_whitespace() {
        assert_eq!(preview_of("Hi\n\n  there\tyou"), "Hi there you");
        assert_eq!(preview_of(&"x".repeat(500)).chars().count(), PREVIEW_LEN);
    }

    #[test]
    fn test_wire_names() {
        let e = email(Uuid::new_v4(), Uuid::new_v4(), EmailFolder::Inbox, 0);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["from"], "alice@example.com");
        assert_eq!(json["to"][0], "me@example.com");
        assert_eq!(json["folder"], "inbox");
    }

    #[tokio::test]
    async fn test_find_by_user_filters_and_orders_newest_first() {
        let db = DBService::memory(MemoryStore::new());
        let user = Uuid::new_v4();
        let account = Uuid::new_v4();

        let old = email(user, account, EmailFolder::Inbox, 60);
        let new = email(user, account, EmailFolder::Inbox, 1);
        let sent = email(user, account, EmailFolder::Sent, 5);
        for e in [&old, &new, &sent] {
            Email::insert(&db, e).await.unwrap();
        }

        let inbox = Email::find_by_user(&db, user, Some(account), Some(EmailFolder::Inbox))
            .await
            .unwrap();
        assert_eq!(
            inbox.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![new.id, old.id]
        );

        let all = Email::find_by_user(&db, user, None, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let ids = Email::known_message_ids(&db, account).await.unwrap();
        assert!(ids.contains(&sent.message_id));
    }

    #[tokio::test]
    async fn test_update_moves_folder() {
        let db = DBService::memory(MemoryStore::new());
        let e = Email::insert(
            &db,
            &email(Uuid::new_v4(), Uuid::new_v4(), EmailFolder::Inbox, 0),
        )
        .await
        .unwrap();

        let moved = Email::update(
            &db,
            e.id,
            &UpdateEmail {
                folder: Some(EmailFolder::Archive),
                read: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(moved.folder, EmailFolder::Archive);
        assert!(moved.read);
        assert!(!moved.starred);
    }
}
