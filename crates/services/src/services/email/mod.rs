//! Mail accounts and messages.
//!
//! Messages are stored in the backend's `emails` table; talking to the mail
//! servers is left to the backend's serverless functions.

pub mod functions;
pub mod providers;

use std::{collections::HashSet, str::FromStr};

use chrono::Utc;
use db::{
    DBService, StoreError,
    models::{
        email::{Email, EmailFolder, UpdateEmail, preview_of},
        email_account::{CreateEmailAccount, EmailAccount, NewEmailAccount},
    },
    validation::{ValidationError, normalize_optional, validate_email_address, validate_port},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use self::functions::{FetchEmailsRequest, FunctionError, FunctionsClient, SendEmailRequest};

/// Ports used for custom accounts that give hosts but no ports.
const DEFAULT_IMAP_PORT: i32 = 993;
const DEFAULT_SMTP_PORT: i32 = 587;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Function(#[from] FunctionError),
    #[error("Email account not found")]
    AccountNotFound,
    #[error("Email not found")]
    EmailNotFound,
    #[error("An account for {0} is already connected")]
    AccountExists(String),
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS)]
pub struct EmailQuery {
    pub account_id: Option<Uuid>,
    pub folder: Option<EmailFolder>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SendEmail {
    pub account_id: Uuid,
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct SyncResult {
    pub fetched: usize,
    pub stored: usize,
    pub account: EmailAccount,
}

/// Deleting outside the trash only moves the message there.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    MovedToTrash { email: Email },
    Deleted,
}

#[derive(Clone)]
pub struct EmailService {
    db: DBService,
    functions: FunctionsClient,
}

impl EmailService {
    pub fn new(db: DBService, functions: FunctionsClient) -> Self {
        Self { db, functions }
    }

    pub fn functions_enabled(&self) -> bool {
        self.functions.is_enabled()
    }

    // Accounts

    pub async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<EmailAccount>, EmailError> {
        Ok(EmailAccount::find_by_user(&self.db, user_id).await?)
    }

    pub async fn get_account(&self, user_id: Uuid, id: Uuid) -> Result<EmailAccount, EmailError> {
        EmailAccount::find_owned(&self.db, id, user_id)
            .await?
            .ok_or(EmailError::AccountNotFound)
    }

    /// Hosts and ports come from the provider preset unless given; a custom
    /// provider must name both hosts.
    pub async fn create_account(
        &self,
        user_id: Uuid,
        data: CreateEmailAccount,
    ) -> Result<EmailAccount, EmailError> {
        let email = validate_email_address(&data.email)?;
        if EmailAccount::find_by_address(&self.db, user_id, &email)
            .await?
            .is_some()
        {
            return Err(EmailError::AccountExists(email));
        }

        let preset = providers::preset(data.provider);
        let imap_host = normalize_optional(data.imap_host)
            .or_else(|| preset.as_ref().map(|p| p.imap_host.clone()))
            .ok_or(ValidationError::Empty("imap_host"))?;
        let smtp_host = normalize_optional(data.smtp_host)
            .or_else(|| preset.as_ref().map(|p| p.smtp_host.clone()))
            .ok_or(ValidationError::Empty("smtp_host"))?;
        let imap_port = validate_port(
            "imap_port",
            data.imap_port
                .or(preset.as_ref().map(|p| p.imap_port))
                .unwrap_or(DEFAULT_IMAP_PORT),
        )?;
        let smtp_port = validate_port(
            "smtp_port",
            data.smtp_port
                .or(preset.as_ref().map(|p| p.smtp_port))
                .unwrap_or(DEFAULT_SMTP_PORT),
        )?;
        let username = normalize_optional(data.username).unwrap_or_else(|| email.clone());

        let row = NewEmailAccount {
            account: EmailAccount {
                id: Uuid::new_v4(),
                user_id,
                email,
                provider: data.provider,
                imap_host,
                imap_port,
                smtp_host,
                smtp_port,
                username,
                use_ssl: data
                    .use_ssl
                    .or(preset.as_ref().map(|p| p.use_ssl))
                    .unwrap_or(true),
                last_synced_at: None,
                created_at: Utc::now(),
            },
            password: data.password,
        };

        let account = EmailAccount::insert(&self.db, &row).await?;
        tracing::info!(account_id = %account.id, provider = %account.provider, "Connected email account");
        Ok(account)
    }

    /// Removes the account and every message stored for it.
    pub async fn delete_account(&self, user_id: Uuid, id: Uuid) -> Result<(), EmailError> {
        self.get_account(user_id, id).await?;
        let emails = Email::delete_by_account(&self.db, id).await?;
        EmailAccount::delete(&self.db, id).await?;
        tracing::info!(account_id = %id, emails, "Removed email account");
        Ok(())
    }

    // Messages

    pub async fn list_emails(
        &self,
        user_id: Uuid,
        query: EmailQuery,
    ) -> Result<Vec<Email>, EmailError> {
        Ok(Email::find_by_user(&self.db, user_id, query.account_id, query.folder).await?)
    }

    pub async fn get_email(&self, user_id: Uuid, id: Uuid) -> Result<Email, EmailError> {
        Email::find_owned(&self.db, id, user_id)
            .await?
            .ok_or(EmailError::EmailNotFound)
    }

    pub async fn update_email(
        &self,
        user_id: Uuid,
        id: Uuid,
        data: UpdateEmail,
    ) -> Result<Email, EmailError> {
        self.get_email(user_id, id).await?;
        Email::update(&self.db, id, &data)
            .await?
            .ok_or(EmailError::EmailNotFound)
    }

    pub async fn delete_email(&self, user_id: Uuid, id: Uuid) -> Result<DeleteOutcome, EmailError> {
        let email = self.get_email(user_id, id).await?;
        if email.folder == EmailFolder::Trash {
            Email::delete(&self.db, id).await?;
            return Ok(DeleteOutcome::Deleted);
        }

        let moved = Email::update(
            &self.db,
            id,
            &UpdateEmail {
                folder: Some(EmailFolder::Trash),
                ..Default::default()
            },
        )
        .await?
        .ok_or(EmailError::EmailNotFound)?;
        Ok(DeleteOutcome::MovedToTrash { email: moved })
    }

    /// Pulls new messages through the `fetch-emails` function and stores the
    /// ones not seen before.
    pub async fn sync_account(&self, user_id: Uuid, id: Uuid) -> Result<SyncResult, EmailError> {
        let account = self.get_account(user_id, id).await?;
        let started = Utc::now();

        let response = self
            .functions
            .fetch_emails(&FetchEmailsRequest {
                account_id: account.id,
                user_id,
                since: account.last_synced_at,
            })
            .await?;
        let fetched = response.emails.len();

        let mut known: HashSet<String> = Email::known_message_ids(&self.db, account.id)
            .await?
            .into_iter()
            .collect();

        let mut stored = 0;
        for message in response.emails {
            if !known.insert(message.message_id.clone()) {
                continue;
            }
            let folder = message
                .folder
                .as_deref()
                .and_then(|f| EmailFolder::from_str(&f.to_ascii_lowercase()).ok())
                .unwrap_or_default();
            let preview = message
                .preview
                .unwrap_or_else(|| preview_of(message.body.as_deref().unwrap_or_default()));

            Email::insert(
                &self.db,
                &Email {
                    id: Uuid::new_v4(),
                    account_id: account.id,
                    user_id,
                    message_id: message.message_id,
                    folder,
                    from_address: message.from,
                    to_addresses: message.to,
                    subject: message.subject,
                    preview,
                    body: message.body,
                    received_at: message.received_at,
                    read: message.read,
                    starred: false,
                },
            )
            .await?;
            stored += 1;
        }

        let account = EmailAccount::set_last_synced(&self.db, account.id, started)
            .await?
            .ok_or(EmailError::AccountNotFound)?;
        tracing::info!(account_id = %account.id, fetched, stored, "Synced email account");
        Ok(SyncResult {
            fetched,
            stored,
            account,
        })
    }

    /// Sends through the `send-email` function and files the message under
    /// `sent` once the function accepted it.
    pub async fn send_email(&self, user_id: Uuid, data: SendEmail) -> Result<Email, EmailError> {
        let account = self.get_account(user_id, data.account_id).await?;
        if data.to.is_empty() {
            return Err(ValidationError::Empty("to").into());
        }
        let to = data
            .to
            .iter()
            .map(|a| validate_email_address(a))
            .collect::<Result<Vec<_>, _>>()?;
        let cc = data
            .cc
            .iter()
            .map(|a| validate_email_address(a))
            .collect::<Result<Vec<_>, _>>()?;
        let subject = data.subject.trim().to_string();

        let response = self
            .functions
            .send_email(&SendEmailRequest {
                account_id: account.id,
                user_id,
                to: to.clone(),
                cc,
                subject: subject.clone(),
                body: data.body.clone(),
            })
            .await?;

        let email = Email::insert(
            &self.db,
            &Email {
                id: Uuid::new_v4(),
                account_id: account.id,
                user_id,
                message_id: response.message_id,
                folder: EmailFolder::Sent,
                from_address: account.email,
                to_addresses: to,
                subject,
                preview: preview_of(&data.body),
                body: Some(data.body),
                received_at: Utc::now(),
                read: true,
                starred: false,
            },
        )
        .await?;
        Ok(email)
    }
}
