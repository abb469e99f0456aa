use std::sync::Arc;

use crate::error::{AuthError, Error, Result};
use crate::model::profile::{Profile, ProfilePatch};
use crate::repository::{ProfileRepository, SessionProvider};
use crate::validation::validate_profile_patch;

const FALLBACK_NAME: &str = "there";
const FALLBACK_INITIALS: &str = "U";

/// The signed-in user's profile. `None` is a normal state: the row may not
/// have been provisioned yet.
pub struct ProfileStore<B: ?Sized> {
    backend: Arc<B>,
    profile: Option<Profile>,
    loaded: bool,
}

impl<B> ProfileStore<B>
where
    B: SessionProvider + ProfileRepository + ?Sized,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            profile: None,
            loaded: false,
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Replaces the cached profile wholesale. No signed-in user and no row
    /// both yield `None`.
    pub async fn fetch(&mut self) -> Result<Option<&Profile>> {
        let user = self.backend.current_user().await.map_err(|e| warn("fetch", e))?;
        let fetched = match user {
            Some(user) => self
                .backend
                .select_by_user(user.id)
                .await
                .map_err(|e| warn("fetch", e))?,
            None => None,
        };

        if fetched.is_none() {
            tracing::info!("no profile on record");
        }
        self.profile = fetched;
        self.loaded = true;
        Ok(self.profile.as_ref())
    }

    pub async fn update(&mut self, patch: ProfilePatch) -> Result<Profile> {
        validate_profile_patch(&patch)?;
        let patch = patch.normalized();
        let user = self
            .backend
            .current_user()
            .await
            .map_err(|e| warn("update", e))?
            .ok_or_else(|| warn("update", AuthError::NotAuthenticated.into()))?;

        let updated = self
            .backend
            .update_by_user(user.id, &patch)
            .await
            .map_err(|e| warn("update", e))?;
        tracing::info!(user_id = %user.id, "profile updated");
        self.profile = Some(updated.clone());
        Ok(updated)
    }

    /// Name for greetings, "there" when none is set.
    pub fn greeting_name(&self) -> &str {
        self.profile
            .as_ref()
            .and_then(|p| p.full_name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(FALLBACK_NAME)
    }

    /// Up to two initials from the full name, else from the email.
    pub fn initials(&self, email: Option<&str>) -> String {
        let from_name: String = self
            .profile
            .as_ref()
            .and_then(|p| p.full_name.as_deref())
            .map(|name| {
                name.split_whitespace()
                    .filter_map(|part| part.chars().next())
                    .flat_map(char::to_uppercase)
                    .take(2)
                    .collect()
            })
            .unwrap_or_default();
        if !from_name.is_empty() {
            return from_name;
        }
        match email.filter(|e| !e.is_empty()) {
            Some(email) => email.chars().take(2).flat_map(char::to_uppercase).collect(),
            None => FALLBACK_INITIALS.to_string(),
        }
    }

    pub fn clear(&mut self) {
        self.profile = None;
        self.loaded = false;
    }
}

fn warn(operation: &'static str, err: Error) -> Error {
    tracing::warn!(operation, kind = ?err.kind(), error = %err, "profile operation failed");
    err
}
