use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::profile::{Profile, ProfilePatch};
use crate::model::task::{Task, TaskInsert, TaskPatch};
use crate::model::user::{Credentials, SignUp, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskOrder {
    #[default]
    CreatedDesc,
    CreatedAsc,
}

/// Hosted authentication. Issues and reports the current identity.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_user(&self) -> Result<Option<User>>;
    async fn sign_in(&self, credentials: &Credentials) -> Result<User>;
    async fn sign_up(&self, sign_up: &SignUp) -> Result<User>;
    async fn sign_out(&self) -> Result<()>;
}

/// The `tasks` collection. Every call is scoped to the caller's identity by
/// the service; rows of other users are never returned.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn select(&self, user_id: Uuid, order: TaskOrder) -> Result<Vec<Task>>;
    async fn insert(&self, row: TaskInsert) -> Result<Task>;
    async fn update(&self, id: Uuid, patch: &TaskPatch) -> Result<Task>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// The `profiles` collection, one row per user.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn select_by_user(&self, user_id: Uuid) -> Result<Option<Profile>>;
    async fn update_by_user(&self, user_id: Uuid, patch: &ProfilePatch) -> Result<Profile>;
}

/// A full backend: auth plus both collections.
pub trait Backend: SessionProvider + TaskRepository + ProfileRepository {}

impl<T> Backend for T where T: SessionProvider + TaskRepository + ProfileRepository {}
