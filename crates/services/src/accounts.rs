//! Local sign-up/sign-in and find-or-create for OAuth identities.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    CredentialHasher, DomainError, DomainResult, NewUser, OAuthProfile, OAuthProvider, User,
    UserRepository, UserSummary,
};
use tracing::{info, warn};
use uuid::Uuid;

pub const DUPLICATE_USERNAME: &str = "A user with the given username is already registered";
pub const BAD_CREDENTIALS: &str = "Password or username is incorrect";

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn CredentialHasher>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { users, hasher }
    }

    pub async fn register(&self, input: NewUser) -> DomainResult<UserSummary> {
        input.check()?;
        let username = input.username.trim().to_string();

        if self.users.find_by_username(&username).await?.is_some() {
            return Err(DomainError::Conflict(DUPLICATE_USERNAME.into()));
        }

        let user = User {
            id: Uuid::now_v7(),
            username,
            email: input.email.trim().to_string(),
            password_hash: Some(self.hasher.hash(&input.password)?),
            github_id: None,
            google_id: None,
            created_at: Utc::now(),
        };
        self.users.insert(&user).await?;

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user.summary())
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> DomainResult<UserSummary> {
        let user = self.users.find_by_username(username.trim()).await?;
        match user {
            Some(user)
                if user
                    .password_hash
                    .as_deref()
                    .is_some_and(|hash| self.hasher.verify(password, hash)) =>
            {
                Ok(user.summary())
            }
            _ => {
                warn!(username = %username, "failed login attempt");
                Err(DomainError::Unauthorized(BAD_CREDENTIALS.into()))
            }
        }
    }

    /// Returns the account linked to the external identity, creating one on
    /// first sign-in.
    pub async fn sign_in_with(&self, profile: OAuthProfile) -> DomainResult<UserSummary> {
        if let Some(user) = self
            .users
            .find_by_external_id(profile.provider, &profile.external_id)
            .await?
        {
            return Ok(user.summary());
        }

        let username = self.free_username(&profile).await?;
        let mut user = User {
            id: Uuid::now_v7(),
            username,
            email: profile.email.clone().unwrap_or_default(),
            password_hash: None,
            github_id: None,
            google_id: None,
            created_at: Utc::now(),
        };
        match profile.provider {
            OAuthProvider::GitHub => user.github_id = Some(profile.external_id.clone()),
            OAuthProvider::Google => user.google_id = Some(profile.external_id.clone()),
        }
        self.users.insert(&user).await?;

        info!(
            user_id = %user.id,
            provider = profile.provider.slug(),
            "user created from external identity"
        );
        Ok(user.summary())
    }

    pub async fn current_user(&self, id: Uuid) -> DomainResult<Option<UserSummary>> {
        Ok(self.users.get(id).await?.map(|u| u.summary()))
    }

    async fn free_username(&self, profile: &OAuthProfile) -> DomainResult<String> {
        let base = match profile.username.trim() {
            "" => format!("{}-user", profile.provider.slug()),
            name => name.to_string(),
        };
        let candidates = [
            base.clone(),
            format!("{base}-{}", profile.provider.slug()),
            format!("{base}-{}", &Uuid::new_v4().simple().to_string()[..8]),
        ];
        for candidate in candidates {
            if self.users.find_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(DomainError::Conflict(DUPLICATE_USERNAME.into()))
    }
}
