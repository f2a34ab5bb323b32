use chrono::Utc;
use db::{
    DBService, StoreError,
    models::profile::{Profile, UpdateProfile},
    validation::{MAX_TITLE_LEN, ValidationError, normalize_optional},
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Clone)]
pub struct ProfileService {
    db: DBService,
}

fn bounded(field: &'static str, value: Option<String>) -> Result<Option<String>, ValidationError> {
    match normalize_optional(value) {
        Some(v) if v.chars().count() > MAX_TITLE_LEN => Err(ValidationError::TooLong {
            field,
            max: MAX_TITLE_LEN,
        }),
        other => Ok(other),
    }
}

impl ProfileService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    /// A user who never saved a profile gets an empty one.
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Profile, ProfileError> {
        Ok(Profile::find_by_id(&self.db, user_id)
            .await?
            .unwrap_or_else(|| Profile::empty(user_id)))
    }

    /// Fields left out keep their value; blank fields are cleared.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        data: UpdateProfile,
    ) -> Result<Profile, ProfileError> {
        let mut profile = self.get_profile(user_id).await?;
        if data.username.is_some() {
            profile.username = bounded("username", data.username)?;
        }
        if data.full_name.is_some() {
            profile.full_name = bounded("full_name", data.full_name)?;
        }
        if data.avatar_url.is_some() {
            profile.avatar_url = normalize_optional(data.avatar_url);
        }
        profile.updated_at = Some(Utc::now());

        Ok(Profile::upsert(&self.db, &profile).await?)
    }
}

#[cfg(test)]
mod tests {
    use db::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_get_returns_empty_profile() {
        let service = ProfileService::new(DBService::memory(MemoryStore::new()));
        let user = Uuid::new_v4();
        assert_eq!(service.get_profile(user).await.unwrap(), Profile::empty(user));
    }

    #[tokio::test]
    async fn test_update_merges_and_clears() {
        let service = ProfileService::new(DBService::memory(MemoryStore::new()));
        let user = Uuid::new_v4();

        service
            .update_profile(
                user,
                UpdateProfile {
                    username: Some("sam".into()),
                    full_name: Some("Sam Doe".into()),
                    avatar_url: None,
                },
            )
            .await
            .unwrap();
        let profile = service
            .update_profile(
                user,
                UpdateProfile {
                    full_name: Some("  ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(profile.username.as_deref(), Some("sam"));
        assert_eq!(profile.full_name, None);
        assert!(profile.updated_at.is_some());

        let err = service
            .update_profile(
                user,
                UpdateProfile {
                    username: Some("x".repeat(MAX_TITLE_LEN + 1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::Validation(ValidationError::TooLong { .. })));
    }
}
