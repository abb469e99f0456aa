use std::collections::HashMap;

use crate::error::{Error, FieldError, Result};
use crate::model::task::{NewTask, TaskPatch, TaskPriority, TaskStatus};

pub const TASK_KEYS: [&str; 3] = ["description", "priority", "status"];

#[derive(Debug, PartialEq)]
pub struct ParsedInput {
    pub title: String,
    pub metadata: HashMap<String, String>,
}

/// Splits `Buy milk pri:low desc:"2 litres"` style arguments into the title
/// words and `key:value` pairs. Keys are expanded against `keys` by unique
/// prefix; a token whose key does not expand stays part of the title, so
/// `Standup 10:30` keeps its time.
pub fn parse_args(args: &[String], keys: &[&str]) -> Result<ParsedInput> {
    let mut title_parts = Vec::new();
    let mut metadata = HashMap::new();

    for arg in args {
        if let Some((key, value)) = arg.split_once(':') {
            if !key.is_empty() && key.chars().all(char::is_alphabetic) {
                match expand_key(key, keys) {
                    Ok(full_key) => {
                        metadata.insert(full_key, value.to_string());
                        continue;
                    }
                    Err(err) if is_ambiguous(&err) => return Err(err),
                    Err(_) => {}
                }
            }
        }
        title_parts.push(arg.as_str());
    }

    Ok(ParsedInput {
        title: title_parts.join(" "),
        metadata,
    })
}

fn is_ambiguous(err: &Error) -> bool {
    err.field_errors()
        .iter()
        .any(|e| e.message.starts_with("Ambiguous"))
}

pub fn expand_key(key: &str, candidates: &[&str]) -> Result<String> {
    // 1. Exact match
    if candidates.contains(&key) {
        return Ok(key.to_string());
    }

    // 2. Prefix match
    let matches: Vec<&str> = candidates
        .iter()
        .filter(|&&c| c.starts_with(key))
        .cloned()
        .collect();

    match matches.len() {
        1 => Ok(matches[0].to_string()),
        0 => Err(FieldError::new("key", format!("Unknown key: '{}'", key)).into()),
        _ => Err(FieldError::new(
            "key",
            format!("Ambiguous key: '{}' matches {:?}", key, matches),
        )
        .into()),
    }
}

impl ParsedInput {
    pub fn into_new_task(self) -> Result<NewTask> {
        let mut task = NewTask::new(self.title);
        task.description = self.metadata.get("description").cloned();
        task.status = self
            .metadata
            .get("status")
            .map(|s| s.parse::<TaskStatus>())
            .transpose()?;
        task.priority = self
            .metadata
            .get("priority")
            .map(|p| p.parse::<TaskPriority>())
            .transpose()?;
        Ok(task)
    }

    /// Title words, when given, replace the title.
    pub fn into_patch(self) -> Result<TaskPatch> {
        Ok(TaskPatch {
            title: (!self.title.is_empty()).then_some(self.title),
            description: self.metadata.get("description").cloned(),
            status: self
                .metadata
                .get("status")
                .map(|s| s.parse::<TaskStatus>())
                .transpose()?,
            priority: self
                .metadata
                .get("priority")
                .map(|p| p.parse::<TaskPriority>())
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_parse_simple() {
        let parsed = parse_args(
            &args(&["Buy", "milk", "pri:low", "desc:2 litres, skimmed"]),
            &TASK_KEYS,
        )
        .unwrap();
        assert_eq!(parsed.title, "Buy milk");
        assert_eq!(parsed.metadata.get("priority"), Some(&"low".to_string()));
        assert_eq!(
            parsed.metadata.get("description"),
            Some(&"2 litres, skimmed".to_string())
        );
    }

    #[test]
    fn test_times_stay_in_title() {
        let parsed = parse_args(&args(&["Standup", "10:30", "note:x"]), &TASK_KEYS).unwrap();
        assert_eq!(parsed.title, "Standup 10:30 note:x");
        assert!(parsed.metadata.is_empty());
    }

    #[test]
    fn test_expand_key() {
        let candidates = vec!["description", "priority", "project"];

        assert_eq!(expand_key("d", &candidates).unwrap(), "description");
        assert_eq!(expand_key("pri", &candidates).unwrap(), "priority");
        assert_eq!(expand_key("pro", &candidates).unwrap(), "project");

        // Ambiguous
        assert!(expand_key("p", &candidates).is_err()); // matches priority, project
        assert!(expand_key("pr", &candidates).is_err());

        // Unknown
        assert!(expand_key("x", &candidates).is_err());
    }

    #[test]
    fn test_ambiguous_key_is_reported() {
        let err = parse_args(&args(&["x", "p:1"]), &["priority", "project"]).unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));
    }

    #[test]
    fn test_into_new_task() {
        let task = parse_args(&args(&["Ship", "it", "s:ip", "p:h"]), &TASK_KEYS)
            .unwrap()
            .into_new_task()
            .unwrap();
        assert_eq!(task.title, "Ship it");
        assert_eq!(task.status, Some(TaskStatus::InProgress));
        assert_eq!(task.priority, Some(TaskPriority::High));

        let err = parse_args(&args(&["Ship", "p:urgent"]), &TASK_KEYS)
            .unwrap()
            .into_new_task()
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "priority");
    }

    #[test]
    fn test_into_patch_without_title() {
        let patch = parse_args(&args(&["status:done"]), &TASK_KEYS)
            .unwrap()
            .into_patch()
            .unwrap();
        assert_eq!(patch, TaskPatch::status(TaskStatus::Completed));
    }
}
