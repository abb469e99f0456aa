use std::sync::Arc;

use crate::error::{AuthError, Result};
use crate::model::user::{Credentials, SignUp, User};
use crate::repository::Backend;
use crate::service::profile_store::ProfileStore;
use crate::service::task_store::TaskStore;
use crate::validation::{validate_credentials, validate_sign_up};

/// Sign-in and sign-up with local validation in front of the provider.
pub struct AuthService<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: Backend + ?Sized> AuthService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn current_user(&self) -> Result<Option<User>> {
        self.backend.current_user().await
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<User> {
        validate_credentials(credentials)?;
        let user = self.backend.sign_in(credentials).await?;
        tracing::info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    pub async fn sign_up(&self, sign_up: &SignUp) -> Result<User> {
        validate_sign_up(sign_up)?;
        let user = self.backend.sign_up(sign_up).await?;
        tracing::info!(user_id = %user.id, "account created");
        Ok(user)
    }
}

/// Everything that lives between sign-in and sign-out: the user and the two
/// stores. Dropping the session drops their caches.
pub struct Session<B: ?Sized> {
    backend: Arc<B>,
    user: User,
    tasks: TaskStore<B>,
    profile: ProfileStore<B>,
}

impl<B: Backend + ?Sized> Session<B> {
    /// Opens a session for whoever the provider reports as signed in.
    pub async fn start(backend: Arc<B>) -> Result<Self> {
        let user = backend
            .current_user()
            .await?
            .ok_or(AuthError::NotAuthenticated)?;
        tracing::debug!(user_id = %user.id, "session started");
        Ok(Self {
            tasks: TaskStore::new(backend.clone()),
            profile: ProfileStore::new(backend.clone()),
            backend,
            user,
        })
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn tasks(&self) -> &TaskStore<B> {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut TaskStore<B> {
        &mut self.tasks
    }

    pub fn profile(&self) -> &ProfileStore<B> {
        &self.profile
    }

    pub fn profile_mut(&mut self) -> &mut ProfileStore<B> {
        &mut self.profile
    }

    /// Loads both stores side by side. Each store is updated on its own;
    /// the first failure is returned after both have finished.
    pub async fn refresh(&mut self) -> Result<()> {
        let (tasks, profile) = (&mut self.tasks, &mut self.profile);
        let (listed, fetched) = futures::join!(tasks.list(), profile.fetch());
        listed?;
        fetched?;
        Ok(())
    }

    /// Signs out remotely and tears the stores down.
    pub async fn sign_out(mut self) -> Result<()> {
        self.tasks.clear();
        self.profile.clear();
        self.backend.sign_out().await?;
        tracing::info!(user_id = %self.user.id, "signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::model::task::NewTask;
    use crate::repository::{MemoryBackend, SessionProvider};

    #[tokio::test]
    async fn test_start_requires_user() {
        let backend = Arc::new(MemoryBackend::new());
        let err = Session::start(backend).await.err().unwrap();
        assert_eq!(err, Error::Auth(AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_sign_up_then_session() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = AuthService::new(backend.clone());
        let user = auth
            .sign_up(&SignUp::new("ada@example.com", "lovelace", Some("Ada".into())))
            .await
            .unwrap();

        let mut session = Session::start(backend.clone()).await.unwrap();
        assert_eq!(session.user(), &user);
        session
            .tasks_mut()
            .create(NewTask::new("Buy milk"))
            .await
            .unwrap();
        session.refresh().await.unwrap();
        assert_eq!(session.tasks().tasks().len(), 1);
        assert_eq!(session.profile().greeting_name(), "Ada");

        session.sign_out().await.unwrap();
        assert_eq!(backend.current_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bad_credentials_never_reach_provider() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = AuthService::new(backend.clone());
        let err = auth
            .sign_in(&Credentials::new("nope", "123"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(backend.remote_calls(), 0);
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let (backend, _) = MemoryBackend::with_user("ada@example.com", "lovelace");
        let backend: Arc<dyn Backend> = Arc::new(backend);
        let mut session = Session::start(backend).await.unwrap();
        session.tasks_mut().list().await.unwrap();
        assert!(session.tasks().is_loaded());
    }

    #[tokio::test]
    async fn test_refresh_failure_on_one_side_keeps_the_other() {
        let backend = Arc::new(MemoryBackend::new());
        AuthService::new(backend.clone())
            .sign_up(&SignUp::new("ada@example.com", "lovelace", Some("Ada".into())))
            .await
            .unwrap();
        let mut session = Session::start(backend.clone()).await.unwrap();

        // The task list is polled first, so it takes the failure.
        backend.fail_next(Error::remote("Failed to fetch"));
        let err = session.refresh().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
        assert!(!session.tasks().is_loaded());
        assert!(session.profile().is_loaded());
        assert_eq!(session.profile().greeting_name(), "Ada");

        session.refresh().await.unwrap();
        assert!(session.tasks().is_loaded());
    }
}
