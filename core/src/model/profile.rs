use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{blank_as_null, non_blank};

/// Display metadata for one user. Provisioned together with the identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: Uuid, full_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            full_name,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "blank_as_null")]
    pub avatar_url: Option<String>,
}

impl ProfilePatch {
    pub fn full_name(name: impl Into<String>) -> Self {
        Self {
            full_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.avatar_url.is_none()
    }

    /// Trims both fields; a blank one stays `Some("")` and clears.
    pub fn normalized(self) -> Self {
        let clean = |value: String| non_blank(&value).unwrap_or_default();
        Self {
            full_name: self.full_name.map(clean),
            avatar_url: self.avatar_url.map(clean),
        }
    }

    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(name) = &self.full_name {
            profile.full_name = non_blank(name);
        }
        if let Some(url) = &self.avatar_url {
            profile.avatar_url = non_blank(url);
        }
    }
}
