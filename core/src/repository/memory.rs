//! In-process backend that behaves like the hosted service: it assigns ids
//! and timestamps, scopes every row to the signed-in user and provisions a
//! profile on sign-up. Used by tests and for embedding without a network.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{AuthError, Error, Result};
use crate::model::profile::{Profile, ProfilePatch};
use crate::model::task::{Task, TaskInsert, TaskPatch};
use crate::model::user::{Credentials, SignUp, User};
use crate::repository::traits::{ProfileRepository, SessionProvider, TaskOrder, TaskRepository};

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    current: Option<User>,
    tasks: Vec<Task>,
    profiles: Vec<Profile>,
    fail_next: Option<Error>,
    calls: usize,
    last_timestamp: Option<DateTime<Utc>>,
}

impl State {
    /// Counts the call and returns an injected failure if one is armed.
    fn enter(&mut self) -> Result<()> {
        self.calls += 1;
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn require_user(&self) -> Result<Uuid> {
        self.current
            .as_ref()
            .map(|u| u.id)
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    /// Strictly increasing so creation order is total even within one tick.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account and signs it in, as a fresh sign-up would.
    pub fn with_user(email: &str, password: &str) -> (Self, User) {
        let backend = Self::new();
        let user = backend.register(email, password, None);
        backend.state.lock().current = Some(user.clone());
        (backend, user)
    }

    fn register(&self, email: &str, password: &str, full_name: Option<String>) -> User {
        let mut state = self.state.lock();
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        let now = state.now();
        let mut profile = Profile::new(user.id, full_name);
        profile.created_at = now;
        profile.updated_at = now;
        state.profiles.push(profile);
        state.accounts.insert(
            email.to_lowercase(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    /// Makes the next backend call fail with `err`.
    pub fn fail_next(&self, err: Error) {
        self.state.lock().fail_next = Some(err);
    }

    /// Number of backend calls made so far, including failed ones.
    pub fn remote_calls(&self) -> usize {
        self.state.lock().calls
    }

    /// Removes a row behind every store's back, as another session would.
    pub fn evict_task(&self, id: Uuid) -> bool {
        let mut state = self.state.lock();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        state.tasks.len() != before
    }

    /// Drops a user's profile row, leaving the identity in place.
    pub fn evict_profile(&self, user_id: Uuid) {
        self.state.lock().profiles.retain(|p| p.user_id != user_id);
    }
}

#[async_trait]
impl SessionProvider for MemoryBackend {
    async fn current_user(&self) -> Result<Option<User>> {
        let mut state = self.state.lock();
        state.enter()?;
        Ok(state.current.clone())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<User> {
        let mut state = self.state.lock();
        state.enter()?;
        let user = match state.accounts.get(&credentials.email.trim().to_lowercase()) {
            Some(account) if account.password == credentials.password => account.user.clone(),
            _ => return Err(AuthError::InvalidCredentials.into()),
        };
        state.current = Some(user.clone());
        Ok(user)
    }

    async fn sign_up(&self, sign_up: &SignUp) -> Result<User> {
        let email = sign_up.credentials.email.trim().to_lowercase();
        {
            let mut state = self.state.lock();
            state.enter()?;
            if state.accounts.contains_key(&email) {
                return Err(AuthError::AlreadyRegistered.into());
            }
        }
        let user = self.register(&email, &sign_up.credentials.password, sign_up.full_name.clone());
        self.state.lock().current = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.enter()?;
        state.current = None;
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for MemoryBackend {
    async fn select(&self, user_id: Uuid, order: TaskOrder) -> Result<Vec<Task>> {
        let mut state = self.state.lock();
        state.enter()?;
        let caller = state.require_user()?;
        if caller != user_id {
            return Ok(Vec::new());
        }
        let mut rows: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| t.user_id == caller)
            .cloned()
            .collect();
        match order {
            TaskOrder::CreatedDesc => rows.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            TaskOrder::CreatedAsc => rows.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
        Ok(rows)
    }

    async fn insert(&self, row: TaskInsert) -> Result<Task> {
        let mut state = self.state.lock();
        state.enter()?;
        let caller = state.require_user()?;
        if row.user_id != caller {
            return Err(Error::remote(
                "new row violates row-level security policy for table \"tasks\"",
            ));
        }
        let now = state.now();
        let task = Task {
            id: Uuid::new_v4(),
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            status: row.status,
            priority: row.priority,
            created_at: now,
            updated_at: now,
        };
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn update(&self, id: Uuid, patch: &TaskPatch) -> Result<Task> {
        let mut state = self.state.lock();
        state.enter()?;
        let caller = state.require_user()?;
        let now = state.now();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id && t.user_id == caller)
            .ok_or_else(|| Error::task_not_found(id))?;
        patch.apply_to(task);
        task.updated_at = now;
        Ok(task.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock();
        state.enter()?;
        let caller = state.require_user()?;
        let before = state.tasks.len();
        state.tasks.retain(|t| !(t.id == id && t.user_id == caller));
        if state.tasks.len() == before {
            return Err(Error::task_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for MemoryBackend {
    async fn select_by_user(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let mut state = self.state.lock();
        state.enter()?;
        let caller = state.require_user()?;
        if caller != user_id {
            return Ok(None);
        }
        Ok(state.profiles.iter().find(|p| p.user_id == caller).cloned())
    }

    async fn update_by_user(&self, user_id: Uuid, patch: &ProfilePatch) -> Result<Profile> {
        let mut state = self.state.lock();
        state.enter()?;
        let caller = state.require_user()?;
        if caller != user_id {
            return Err(Error::profile_not_found(user_id));
        }
        let now = state.now();
        let profile = state
            .profiles
            .iter_mut()
            .find(|p| p.user_id == caller)
            .ok_or_else(|| Error::profile_not_found(user_id))?;
        patch.apply_to(profile);
        profile.updated_at = now;
        Ok(profile.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::task::NewTask;

    #[tokio::test]
    async fn test_rows_are_scoped_to_caller() {
        let backend = MemoryBackend::new();
        let alice = backend
            .sign_up(&SignUp::new("alice@example.com", "secret1", None))
            .await
            .unwrap();
        backend.insert(NewTask::new("alice's").resolve(alice.id)).await.unwrap();

        let bob = backend
            .sign_up(&SignUp::new("bob@example.com", "secret2", None))
            .await
            .unwrap();
        assert!(backend.select(bob.id, TaskOrder::CreatedDesc).await.unwrap().is_empty());
        assert!(backend.select(alice.id, TaskOrder::CreatedDesc).await.unwrap().is_empty());

        let err = backend
            .insert(NewTask::new("spoofed").resolve(alice.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
    }

    #[tokio::test]
    async fn test_sign_in_errors() {
        let (backend, _) = MemoryBackend::with_user("ada@example.com", "lovelace");
        let err = backend
            .sign_in(&Credentials::new("ada@example.com", "wrong!"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::InvalidCredentials));

        let err = backend
            .sign_up(&SignUp::new("ADA@example.com", "another", None))
            .await
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::AlreadyRegistered));
    }

    #[tokio::test]
    async fn test_sign_up_provisions_profile() {
        let backend = MemoryBackend::new();
        let user = backend
            .sign_up(&SignUp::new("grace@example.com", "hopper", Some("Grace".into())))
            .await
            .unwrap();
        let profile = backend.select_by_user(user.id).await.unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Grace"));
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let (backend, user) = MemoryBackend::with_user("ada@example.com", "lovelace");
        backend.fail_next(Error::remote("network down"));
        assert!(backend.select(user.id, TaskOrder::CreatedDesc).await.is_err());
        assert!(backend.select(user.id, TaskOrder::CreatedDesc).await.is_ok());
        assert_eq!(backend.remote_calls(), 2);
    }
}
