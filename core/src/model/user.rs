use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity issued by the session provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignUp {
    pub credentials: Credentials,
    pub full_name: Option<String>,
}

impl SignUp {
    pub fn new(email: impl Into<String>, password: impl Into<String>, full_name: Option<String>) -> Self {
        Self {
            credentials: Credentials::new(email, password),
            full_name: full_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        }
    }
}
