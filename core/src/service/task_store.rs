use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AuthError, Error, Result};
use crate::model::task::{NewTask, Task, TaskPatch};
use crate::repository::{SessionProvider, TaskOrder, TaskRepository};
use crate::service::dto::{TaskFilter, TaskGroups, TaskStats};
use crate::validation::{validate_new_task, validate_task_patch};

/// The signed-in user's tasks, newest first, kept consistent with the data
/// service.
///
/// The cache is only ever written from rows the service returned. A failed
/// call leaves it exactly as it was, so every operation either fully applies
/// or does nothing.
pub struct TaskStore<B: ?Sized> {
    backend: Arc<B>,
    tasks: Vec<Task>,
    loaded: bool,
}

impl<B> TaskStore<B>
where
    B: SessionProvider + TaskRepository + ?Sized,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            tasks: Vec::new(),
            loaded: false,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// True once a `list()` has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    async fn require_user(&self) -> Result<Uuid> {
        match self.backend.current_user().await? {
            Some(user) => Ok(user.id),
            None => Err(AuthError::NotAuthenticated.into()),
        }
    }

    /// Replaces the whole cache with the service's rows, newest first.
    pub async fn list(&mut self) -> Result<&[Task]> {
        let user_id = self.require_user().await.map_err(|e| warn("list", e))?;
        tracing::debug!(%user_id, "fetching tasks");
        let rows = self
            .backend
            .select(user_id, TaskOrder::CreatedDesc)
            .await
            .map_err(|e| warn("list", e))?;

        tracing::info!(count = rows.len(), "task cache reconciled");
        self.tasks = rows;
        self.loaded = true;
        Ok(&self.tasks)
    }

    /// Inserts a task for the current user and puts the returned row at the
    /// head of the cache.
    pub async fn create(&mut self, input: NewTask) -> Result<Task> {
        validate_new_task(&input)?;
        let user_id = self.require_user().await.map_err(|e| warn("create", e))?;

        let row = input.resolve(user_id);
        tracing::debug!(title = %row.title, "creating task");
        let created = self.backend.insert(row).await.map_err(|e| warn("create", e))?;

        tracing::info!(task_id = %created.id, "task created");
        self.tasks.insert(0, created.clone());
        Ok(created)
    }

    /// Sends a trimmed partial update and swaps the returned row in at the
    /// same position. The list is not re-sorted.
    pub async fn update(&mut self, id: Uuid, patch: TaskPatch) -> Result<Task> {
        validate_task_patch(&patch)?;
        let patch = patch.normalized();
        tracing::debug!(task_id = %id, "updating task");
        let updated = self
            .backend
            .update(id, &patch)
            .await
            .map_err(|e| warn("update", e))?;

        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(slot) => *slot = updated.clone(),
            None => tracing::debug!(task_id = %id, "updated task was not cached"),
        }
        tracing::info!(task_id = %id, status = %updated.status, "task updated");
        Ok(updated)
    }

    /// Moves a cached task one step along pending -> in progress -> completed.
    pub async fn advance_status(&mut self, id: Uuid) -> Result<Task> {
        let next = self
            .get(id)
            .map(|t| t.status.next())
            .ok_or_else(|| Error::task_not_found(id))?;
        self.update(id, TaskPatch::status(next)).await
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<()> {
        tracing::debug!(task_id = %id, "deleting task");
        self.backend.delete(id).await.map_err(|e| warn("delete", e))?;

        self.tasks.retain(|t| t.id != id);
        tracing::info!(task_id = %id, "task deleted");
        Ok(())
    }

    pub fn filtered(&self, filter: &TaskFilter) -> Vec<&Task> {
        self.tasks.iter().filter(|t| filter.matches(t)).collect()
    }

    pub fn groups(&self, filter: &TaskFilter) -> TaskGroups {
        TaskGroups::from_tasks(self.tasks.iter().filter(|t| filter.matches(t)))
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.tasks)
    }

    pub fn recent(&self, n: usize) -> &[Task] {
        &self.tasks[..n.min(self.tasks.len())]
    }

    /// Drops everything cached, e.g. on sign-out.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.loaded = false;
    }
}

fn warn(operation: &'static str, err: Error) -> Error {
    tracing::warn!(operation, kind = ?err.kind(), error = %err, "task operation failed");
    err
}
