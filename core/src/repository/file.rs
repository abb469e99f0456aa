use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::error::{AuthError, Error, Result};
use crate::model::profile::{Profile, ProfilePatch};
use crate::model::task::{Task, TaskInsert, TaskPatch};
use crate::model::user::{Credentials, SignUp, User};
use crate::repository::traits::{ProfileRepository, SessionProvider, TaskOrder, TaskRepository};

const USERS_FILE: &str = "users.json";
const TASKS_FILE: &str = "tasks.json";
const PROFILES_FILE: &str = "profiles.json";
const SESSION_FILE: &str = "session.json";

#[derive(Serialize, Deserialize, Debug, Clone)]
struct StoredAccount {
    user: User,
    salt: String,
    password_hash: String,
}

/// Local single-machine backend keeping every collection in a JSON file
/// under one data directory. The signed-in user survives restarts through
/// `session.json`.
#[derive(Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let dir = match base_dir {
            Some(dir) => dir,
            None => crate::config::default_data_dir()?,
        };
        fs::create_dir_all(&dir)?;

        let backend = FileBackend { dir };
        backend.ensure_file::<Vec<StoredAccount>>(USERS_FILE, &Vec::new())?;
        backend.ensure_file::<Vec<Task>>(TASKS_FILE, &Vec::new())?;
        backend.ensure_file::<Vec<Profile>>(PROFILES_FILE, &Vec::new())?;
        backend.ensure_file::<Option<User>>(SESSION_FILE, &None)?;
        Ok(backend)
    }

    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_file<T: Serialize>(&self, name: &str, empty: &T) -> Result<()> {
        let path = self.dir.join(name);
        if !path.exists() {
            self.write_json(name, empty)?;
        }
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let file = File::open(self.dir.join(name))?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Writes to a sibling temp file and renames it over `name`, so readers
    /// see either the old or the new collection.
    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(self.dir.join(name)).map_err(|e| e.error)?;
        Ok(())
    }

    fn session_user(&self) -> Result<Uuid> {
        let session: Option<User> = self.read_json(SESSION_FILE)?;
        session
            .map(|u| u.id)
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", salt, password).as_bytes());
    format!("{:x}", digest)
}

#[async_trait]
impl SessionProvider for FileBackend {
    async fn current_user(&self) -> Result<Option<User>> {
        self.read_json(SESSION_FILE)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<User> {
        let accounts: Vec<StoredAccount> = self.read_json(USERS_FILE)?;
        let email = credentials.email.trim().to_lowercase();
        let account = accounts
            .into_iter()
            .find(|a| a.user.email.as_deref() == Some(email.as_str()))
            .filter(|a| a.password_hash == hash_password(&a.salt, &credentials.password))
            .ok_or(AuthError::InvalidCredentials)?;

        self.write_json(SESSION_FILE, &Some(&account.user))?;
        tracing::debug!(user_id = %account.user.id, "signed in");
        Ok(account.user)
    }

    async fn sign_up(&self, sign_up: &SignUp) -> Result<User> {
        let mut accounts: Vec<StoredAccount> = self.read_json(USERS_FILE)?;
        let email = sign_up.credentials.email.trim().to_lowercase();
        if accounts
            .iter()
            .any(|a| a.user.email.as_deref() == Some(email.as_str()))
        {
            return Err(AuthError::AlreadyRegistered.into());
        }

        let user = User {
            id: Uuid::new_v4(),
            email: Some(email),
        };
        // The account row is written last; a profile without one is unreachable.
        let mut profiles: Vec<Profile> = self.read_json(PROFILES_FILE)?;
        profiles.push(Profile::new(user.id, sign_up.full_name.clone()));
        self.write_json(PROFILES_FILE, &profiles)?;

        let salt = Uuid::new_v4().simple().to_string();
        accounts.push(StoredAccount {
            user: user.clone(),
            password_hash: hash_password(&salt, &sign_up.credentials.password),
            salt,
        });
        self.write_json(USERS_FILE, &accounts)?;

        self.write_json(SESSION_FILE, &Some(&user))?;
        tracing::debug!(user_id = %user.id, "signed up");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        self.write_json::<Option<User>>(SESSION_FILE, &None)
    }
}

#[async_trait]
impl TaskRepository for FileBackend {
    async fn select(&self, user_id: Uuid, order: TaskOrder) -> Result<Vec<Task>> {
        if self.session_user()? != user_id {
            return Ok(Vec::new());
        }
        let tasks: Vec<Task> = self.read_json(TASKS_FILE)?;
        let mut rows: Vec<Task> = tasks.into_iter().filter(|t| t.user_id == user_id).collect();
        match order {
            TaskOrder::CreatedDesc => rows.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            TaskOrder::CreatedAsc => rows.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
        Ok(rows)
    }

    async fn insert(&self, row: TaskInsert) -> Result<Task> {
        if self.session_user()? != row.user_id {
            return Err(Error::remote(
                "new row violates row-level security policy for table \"tasks\"",
            ));
        }
        let mut tasks: Vec<Task> = self.read_json(TASKS_FILE)?;

        // Keep created_at strictly increasing so newest-first order is total.
        let mut now = Utc::now();
        if let Some(latest) = tasks.iter().map(|t| t.created_at).max() {
            if now <= latest {
                now = latest + Duration::microseconds(1);
            }
        }

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
        tasks.push(task.clone());
        self.write_json(TASKS_FILE, &tasks)?;
        Ok(task)
    }

    async fn update(&self, id: Uuid, patch: &TaskPatch) -> Result<Task> {
        let caller = self.session_user()?;
        let mut tasks: Vec<Task> = self.read_json(TASKS_FILE)?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id && t.user_id == caller)
            .ok_or_else(|| Error::task_not_found(id))?;
        patch.apply_to(task);
        task.updated_at = Utc::now();
        let updated = task.clone();
        self.write_json(TASKS_FILE, &tasks)?;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let caller = self.session_user()?;
        let mut tasks: Vec<Task> = self.read_json(TASKS_FILE)?;
        let initial_len = tasks.len();
        tasks.retain(|t| !(t.id == id && t.user_id == caller));

        if tasks.len() == initial_len {
            return Err(Error::task_not_found(id));
        }

        self.write_json(TASKS_FILE, &tasks)
    }
}

#[async_trait]
impl ProfileRepository for FileBackend {
    async fn select_by_user(&self, user_id: Uuid) -> Result<Option<Profile>> {
        if self.session_user()? != user_id {
            return Ok(None);
        }
        let profiles: Vec<Profile> = self.read_json(PROFILES_FILE)?;
        Ok(profiles.into_iter().find(|p| p.user_id == user_id))
    }

    async fn update_by_user(&self, user_id: Uuid, patch: &ProfilePatch) -> Result<Profile> {
        if self.session_user()? != user_id {
            return Err(Error::profile_not_found(user_id));
        }
        let mut profiles: Vec<Profile> = self.read_json(PROFILES_FILE)?;
        let profile = profiles
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| Error::profile_not_found(user_id))?;
        patch.apply_to(profile);
        profile.updated_at = Utc::now();
        let updated = profile.clone();
        self.write_json(PROFILES_FILE, &profiles)?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::task::{NewTask, TaskStatus};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(Some(dir.path().to_path_buf())).unwrap();
        let user = backend
            .sign_up(&SignUp::new("ada@example.com", "lovelace", Some("Ada".into())))
            .await
            .unwrap();

        let reopened = FileBackend::new(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(reopened.current_user().await.unwrap(), Some(user.clone()));
        let profile = reopened.select_by_user(user.id).await.unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Ada"));

        reopened.sign_out().await.unwrap();
        assert_eq!(backend.current_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_password_is_checked() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(Some(dir.path().to_path_buf())).unwrap();
        backend
            .sign_up(&SignUp::new("ada@example.com", "lovelace", None))
            .await
            .unwrap();
        backend.sign_out().await.unwrap();

        let err = backend
            .sign_in(&Credentials::new("ada@example.com", "babbage"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(backend
            .sign_in(&Credentials::new("Ada@Example.com", "lovelace"))
            .await
            .is_ok());

        let raw = fs::read_to_string(dir.path().join(USERS_FILE)).unwrap();
        assert!(!raw.contains("lovelace"));
    }

    #[tokio::test]
    async fn test_task_rows_round_trip() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(Some(dir.path().to_path_buf())).unwrap();
        let user = backend
            .sign_up(&SignUp::new("ada@example.com", "lovelace", None))
            .await
            .unwrap();

        let first = backend.insert(NewTask::new("first").resolve(user.id)).await.unwrap();
        let second = backend.insert(NewTask::new("second").resolve(user.id)).await.unwrap();
        assert!(second.created_at > first.created_at);

        let rows = backend.select(user.id, TaskOrder::CreatedDesc).await.unwrap();
        let titles: Vec<_> = rows.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);

        let updated = backend
            .update(first.id, &TaskPatch::status(TaskStatus::Completed))
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.created_at, first.created_at);

        backend.delete(first.id).await.unwrap();
        let err = backend.delete(first.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_signed_out_calls_are_rejected() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(Some(dir.path().to_path_buf())).unwrap();
        let err = backend
            .select(Uuid::new_v4(), TaskOrder::CreatedDesc)
            .await
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_writes_leave_no_temp_files() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(Some(dir.path().to_path_buf())).unwrap();
        let user = backend
            .sign_up(&SignUp::new("ada@example.com", "lovelace", None))
            .await
            .unwrap();
        for title in ["one", "two"] {
            backend.insert(NewTask::new(title).resolve(user.id)).await.unwrap();
        }

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![PROFILES_FILE, SESSION_FILE, TASKS_FILE, USERS_FILE]
        );
        let tasks: Vec<Task> = backend.read_json(TASKS_FILE).unwrap();
        assert_eq!(tasks.len(), 2);
    }
}
