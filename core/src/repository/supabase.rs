//! Adapter for a hosted auth + PostgREST service (Supabase-compatible).
//!
//! Row-level access policies on the service scope every request to the
//! bearer token's user. Token refresh is not handled; an expired token
//! surfaces as an auth error and the user signs in again.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

use crate::error::{AuthError, Error, Result};
use crate::model::profile::{Profile, ProfilePatch};
use crate::model::task::{Task, TaskInsert, TaskPatch};
use crate::model::user::{Credentials, SignUp, User};
use crate::repository::traits::{ProfileRepository, SessionProvider, TaskOrder, TaskRepository};

const TASKS_TABLE: &str = "rest/v1/tasks";
const PROFILES_TABLE: &str = "rest/v1/profiles";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

pub struct SupabaseBackend {
    client: Client,
    base: Url,
    anon_key: String,
    session: RwLock<Option<AuthSession>>,
    session_file: Option<PathBuf>,
}

impl SupabaseBackend {
    pub fn new(url: &str, anon_key: impl Into<String>) -> Result<Self> {
        let mut base =
            Url::parse(url).map_err(|e| Error::Config(format!("invalid service url '{}': {}", url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base,
            anon_key: anon_key.into(),
            session: RwLock::new(None),
            session_file: None,
        })
    }

    /// Persists the session at `path` and restores it if the file exists.
    pub fn with_session_file(mut self, path: PathBuf) -> Result<Self> {
        if path.exists() {
            let raw = fs::read_to_string(&path)?;
            *self.session.write() = serde_json::from_str(&raw)?;
        }
        self.session_file = Some(path);
        Ok(self)
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.session.read().clone()
    }

    pub fn restore(&self, session: AuthSession) -> Result<()> {
        self.set_session(Some(session))
    }

    fn set_session(&self, session: Option<AuthSession>) -> Result<()> {
        if let Some(path) = &self.session_file {
            fs::write(path, serde_json::to_string_pretty(&session)?)?;
        }
        *self.session.write() = session;
        Ok(())
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| Error::Config(format!("invalid endpoint '{}': {}", path, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    fn access_token(&self) -> Result<String> {
        self.session
            .read()
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    /// Request against the REST surface, carrying the user's token.
    fn rest(&self, method: reqwest::Method, url: Url) -> Result<RequestBuilder> {
        let token = self.access_token()?;
        Ok(self
            .client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .header("Prefer", "return=representation"))
    }

    fn auth(&self, method: reqwest::Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
    }

    async fn send_rest<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let response = check(response, rest_error).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_auth<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let response = check(response, auth_error).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn check(response: Response, map: fn(StatusCode, &str) -> Error) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(map(status, &body))
}

/// Pulls the human-readable message out of an error body. The auth and
/// REST services use different field names.
fn error_message(status: StatusCode, body: &str) -> (Option<String>, String) {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("error_code").or_else(|| v.get("code")))
        .and_then(|c| c.as_str().map(str::to_string));
    let message = parsed
        .as_ref()
        .and_then(|v| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str))
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            }
        });
    (code, message)
}

fn auth_error(status: StatusCode, body: &str) -> Error {
    let (code, message) = error_message(status, body);
    let lowered = message.to_lowercase();
    match code.as_deref() {
        Some("invalid_credentials") => AuthError::InvalidCredentials.into(),
        Some("user_already_exists") | Some("email_exists") => AuthError::AlreadyRegistered.into(),
        // Older service versions only carry the message text.
        _ if lowered.contains("invalid login credentials") => AuthError::InvalidCredentials.into(),
        _ if lowered.contains("already registered") => AuthError::AlreadyRegistered.into(),
        _ if status.is_server_error() => Error::remote(message),
        _ => AuthError::Rejected(message).into(),
    }
}

fn rest_error(status: StatusCode, body: &str) -> Error {
    let (_, message) = error_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED => AuthError::Rejected(message).into(),
        _ => Error::remote(message),
    }
}

#[async_trait]
impl SessionProvider for SupabaseBackend {
    async fn current_user(&self) -> Result<Option<User>> {
        let token = match self.access_token() {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let url = self.endpoint("auth/v1/user", &[])?;
        let response = self
            .auth(reqwest::Method::GET, url)
            .bearer_auth(token)
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!("stored session rejected, clearing it");
            self.set_session(None)?;
            return Ok(None);
        }
        let response = check(response, auth_error).await?;
        Ok(Some(response.json::<User>().await?))
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<User> {
        let url = self.endpoint("auth/v1/token", &[("grant_type", "password".to_string())])?;
        let request = self.auth(reqwest::Method::POST, url).json(&json!({
            "email": credentials.email.trim(),
            "password": credentials.password,
        }));
        let session: AuthSession = self.send_auth(request).await?;
        let user = session.user.clone();
        self.set_session(Some(session))?;
        tracing::debug!(user_id = %user.id, "signed in");
        Ok(user)
    }

    async fn sign_up(&self, sign_up: &SignUp) -> Result<User> {
        let url = self.endpoint("auth/v1/signup", &[])?;
        let request = self.auth(reqwest::Method::POST, url).json(&json!({
            "email": sign_up.credentials.email.trim(),
            "password": sign_up.credentials.password,
            "data": { "full_name": sign_up.full_name },
        }));
        let body: Value = self.send_auth(request).await?;

        // With email confirmation enabled the service answers with a bare
        // user and no session.
        if body.get("access_token").is_some() {
            let session: AuthSession = serde_json::from_value(body)?;
            let user = session.user.clone();
            self.set_session(Some(session))?;
            Ok(user)
        } else {
            let user: User = serde_json::from_value(body.get("user").cloned().unwrap_or(body))?;
            tracing::info!(user_id = %user.id, "sign-up awaiting email confirmation");
            Ok(user)
        }
    }

    async fn sign_out(&self) -> Result<()> {
        if let Ok(token) = self.access_token() {
            let url = self.endpoint("auth/v1/logout", &[])?;
            let result = self
                .auth(reqwest::Method::POST, url)
                .bearer_auth(token)
                .send()
                .await;
            if let Err(err) = result {
                tracing::warn!(error = %err, "remote sign-out failed, dropping local session");
            }
        }
        self.set_session(None)
    }
}

#[async_trait]
impl TaskRepository for SupabaseBackend {
    async fn select(&self, user_id: Uuid, order: TaskOrder) -> Result<Vec<Task>> {
        let order = match order {
            TaskOrder::CreatedDesc => "created_at.desc",
            TaskOrder::CreatedAsc => "created_at.asc",
        };
        let url = self.endpoint(
            TASKS_TABLE,
            &[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("order", order.to_string()),
            ],
        )?;
        self.send_rest(self.rest(reqwest::Method::GET, url)?).await
    }

    async fn insert(&self, row: TaskInsert) -> Result<Task> {
        let url = self.endpoint(TASKS_TABLE, &[("select", "*".to_string())])?;
        let rows: Vec<Task> = self
            .send_rest(self.rest(reqwest::Method::POST, url)?.json(&row))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::remote("insert returned no row"))
    }

    async fn update(&self, id: Uuid, patch: &TaskPatch) -> Result<Task> {
        let url = self.endpoint(
            TASKS_TABLE,
            &[("id", format!("eq.{}", id)), ("select", "*".to_string())],
        )?;
        let rows: Vec<Task> = self
            .send_rest(self.rest(reqwest::Method::PATCH, url)?.json(patch))
            .await?;
        rows.into_iter().next().ok_or_else(|| Error::task_not_found(id))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let url = self.endpoint(TASKS_TABLE, &[("id", format!("eq.{}", id))])?;
        let rows: Vec<Task> = self
            .send_rest(self.rest(reqwest::Method::DELETE, url)?)
            .await?;
        if rows.is_empty() {
            return Err(Error::task_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for SupabaseBackend {
    async fn select_by_user(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let url = self.endpoint(
            PROFILES_TABLE,
            &[("select", "*".to_string()), ("user_id", format!("eq.{}", user_id))],
        )?;
        let rows: Vec<Profile> = self.send_rest(self.rest(reqwest::Method::GET, url)?).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_by_user(&self, user_id: Uuid, patch: &ProfilePatch) -> Result<Profile> {
        let url = self.endpoint(
            PROFILES_TABLE,
            &[("user_id", format!("eq.{}", user_id)), ("select", "*".to_string())],
        )?;
        let rows: Vec<Profile> = self
            .send_rest(self.rest(reqwest::Method::PATCH, url)?.json(patch))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::profile_not_found(user_id))
    }
}
