//! Local input checks. Everything here runs before a backend is touched.

use url::Url;

use crate::error::{Error, FieldError, Result};
use crate::model::profile::ProfilePatch;
use crate::model::task::{NewTask, TaskPatch};
use crate::model::user::{Credentials, SignUp};

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const PASSWORD_MIN_CHARS: usize = 6;
pub const FULL_NAME_MAX_CHARS: usize = 100;

pub fn validate_new_task(input: &NewTask) -> Result<()> {
    let mut errors = Vec::new();
    check_title(&input.title, &mut errors);
    if let Some(description) = &input.description {
        check_description(description, &mut errors);
    }
    finish(errors)
}

pub fn validate_task_patch(patch: &TaskPatch) -> Result<()> {
    if patch.is_empty() {
        return Err(FieldError::new("patch", "Nothing to update").into());
    }
    let mut errors = Vec::new();
    if let Some(title) = &patch.title {
        check_title(title, &mut errors);
    }
    if let Some(description) = &patch.description {
        check_description(description, &mut errors);
    }
    finish(errors)
}

pub fn validate_credentials(credentials: &Credentials) -> Result<()> {
    let mut errors = Vec::new();
    check_credentials(credentials, &mut errors);
    finish(errors)
}

pub fn validate_sign_up(sign_up: &SignUp) -> Result<()> {
    let mut errors = Vec::new();
    check_credentials(&sign_up.credentials, &mut errors);
    if let Some(name) = &sign_up.full_name {
        check_full_name(name, &mut errors);
    }
    finish(errors)
}

pub fn validate_profile_patch(patch: &ProfilePatch) -> Result<()> {
    if patch.is_empty() {
        return Err(FieldError::new("patch", "Nothing to update").into());
    }
    let mut errors = Vec::new();
    if let Some(name) = &patch.full_name {
        check_full_name(name, &mut errors);
    }
    if let Some(avatar) = &patch.avatar_url {
        let avatar = avatar.trim();
        // Empty clears the avatar.
        if !avatar.is_empty() {
            let ok = Url::parse(avatar)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !ok {
                errors.push(FieldError::new("avatar_url", "Please enter a valid URL"));
            }
        }
    }
    finish(errors)
}

/// Loose `local@domain.tld` shape check; the auth provider has the final say.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .rsplit_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    }
}

fn check_title(title: &str, errors: &mut Vec<FieldError>) {
    let len = title.trim().chars().count();
    if len == 0 {
        errors.push(FieldError::new("title", "Title is required"));
    } else if len > TITLE_MAX_CHARS {
        errors.push(FieldError::new(
            "title",
            "Title must be less than 100 characters",
        ));
    }
}

fn check_description(description: &str, errors: &mut Vec<FieldError>) {
    if description.trim().chars().count() > DESCRIPTION_MAX_CHARS {
        errors.push(FieldError::new(
            "description",
            "Description must be less than 500 characters",
        ));
    }
}

fn check_full_name(name: &str, errors: &mut Vec<FieldError>) {
    if name.trim().chars().count() > FULL_NAME_MAX_CHARS {
        errors.push(FieldError::new(
            "full_name",
            "Name must be less than 100 characters",
        ));
    }
}

fn check_credentials(credentials: &Credentials, errors: &mut Vec<FieldError>) {
    if !is_valid_email(&credentials.email) {
        errors.push(FieldError::new("email", "Please enter a valid email"));
    }
    if credentials.password.chars().count() < PASSWORD_MIN_CHARS {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters",
        ));
    }
}

fn finish(errors: Vec<FieldError>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_empty_title_rejected() {
        let err = validate_new_task(&NewTask::new("")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.field_errors()[0].field, "title");

        assert!(validate_new_task(&NewTask::new("   ")).is_err());
    }

    #[test]
    fn test_title_limit_counts_chars() {
        assert!(validate_new_task(&NewTask::new("a".repeat(100))).is_ok());
        assert!(validate_new_task(&NewTask::new("a".repeat(101))).is_err());
        // 100 multi-byte characters are still 100 characters.
        assert!(validate_new_task(&NewTask::new("é".repeat(100))).is_ok());
    }

    #[test]
    fn test_collects_every_field() {
        let input = NewTask::new("").with_description("x".repeat(501));
        let err = validate_new_task(&input).unwrap_err();
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["title", "description"]);
    }

    #[test]
    fn test_patch_rules() {
        assert!(validate_task_patch(&TaskPatch::default()).is_err());
        let patch = TaskPatch {
            title: Some(String::new()),
            ..TaskPatch::default()
        };
        assert!(validate_task_patch(&patch).is_err());
        assert!(validate_task_patch(&TaskPatch::status(crate::TaskStatus::Completed)).is_ok());
    }

    #[test]
    fn test_credentials() {
        assert!(validate_credentials(&Credentials::new("a@b.co", "secret")).is_ok());
        let err = validate_credentials(&Credentials::new("not-an-email", "123")).unwrap_err();
        assert_eq!(err.field_errors().len(), 2);
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("@c.de"));
    }

    #[test]
    fn test_profile_patch() {
        assert!(validate_profile_patch(&ProfilePatch::full_name("Ada")).is_ok());
        let patch = ProfilePatch {
            avatar_url: Some("ftp://example.com/a.png".to_string()),
            ..ProfilePatch::default()
        };
        assert!(validate_profile_patch(&patch).is_err());
        let clear = ProfilePatch {
            avatar_url: Some(String::new()),
            ..ProfilePatch::default()
        };
        assert!(validate_profile_patch(&clear).is_ok());
    }
}
