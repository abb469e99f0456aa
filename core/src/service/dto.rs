use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::task::{Task, TaskPriority, TaskStatus};

/// Dashboard filter. `None` means "all".
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub search: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

impl TaskFilter {
    pub fn is_active(&self) -> bool {
        self.search.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
            || self.status.is_some()
            || self.priority.is_some()
    }

    pub fn matches(&self, task: &Task) -> bool {
        let search_ok = match self.search.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => task.matches_search(q),
            _ => true,
        };
        search_ok
            && self.status.map(|s| s == task.status).unwrap_or(true)
            && self.priority.map(|p| p == task.priority).unwrap_or(true)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// High priority and not yet completed.
    pub high_priority_open: usize,
    /// Rounded percentage, 0 when there are no tasks.
    pub completion_rate: u32,
}

impl TaskStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = TaskStats::default();
        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            if task.priority == TaskPriority::High && task.status != TaskStatus::Completed {
                stats.high_priority_open += 1;
            }
        }
        if stats.total > 0 {
            stats.completion_rate =
                ((stats.completed as f64 / stats.total as f64) * 100.0).round() as u32;
        }
        stats
    }
}

/// Tasks split by status, each group keeping store order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TaskGroups {
    pub in_progress: Vec<Task>,
    pub pending: Vec<Task>,
    pub completed: Vec<Task>,
}

impl TaskGroups {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut groups = TaskGroups::default();
        for task in tasks {
            let bucket = match task.status {
                TaskStatus::InProgress => &mut groups.in_progress,
                TaskStatus::Pending => &mut groups.pending,
                TaskStatus::Completed => &mut groups.completed,
            };
            bucket.push(task.clone());
        }
        groups
    }

    pub fn is_empty(&self) -> bool {
        self.in_progress.is_empty() && self.pending.is_empty() && self.completed.is_empty()
    }

    /// Display order: in progress first, then pending, then completed.
    pub fn iter(&self) -> impl Iterator<Item = (TaskStatus, &[Task])> {
        [
            (TaskStatus::InProgress, self.in_progress.as_slice()),
            (TaskStatus::Pending, self.pending.as_slice()),
            (TaskStatus::Completed, self.completed.as_slice()),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchTasks,
    CreateTask,
    UpdateTask,
    DeleteTask,
    FetchProfile,
    UpdateProfile,
    SignIn,
    SignUp,
}

impl Operation {
    fn success(self) -> (&'static str, &'static str) {
        match self {
            Operation::FetchTasks => ("Tasks loaded", "Your tasks are up to date."),
            Operation::CreateTask => ("Task created", "Your task has been created successfully."),
            Operation::UpdateTask => ("Task updated", "Your task has been updated successfully."),
            Operation::DeleteTask => ("Task deleted", "Your task has been deleted successfully."),
            Operation::FetchProfile => ("Profile loaded", "Your profile is up to date."),
            Operation::UpdateProfile => {
                ("Profile updated", "Your profile has been updated successfully.")
            }
            Operation::SignIn => ("Signed in", "Welcome back!"),
            Operation::SignUp => ("Account created", "Welcome to TaskFlow!"),
        }
    }

    fn failure_title(self) -> &'static str {
        match self {
            Operation::FetchTasks => "Error fetching tasks",
            Operation::CreateTask => "Error creating task",
            Operation::UpdateTask => "Error updating task",
            Operation::DeleteTask => "Error deleting task",
            Operation::FetchProfile => "Error fetching profile",
            Operation::UpdateProfile => "Error updating profile",
            Operation::SignIn => "Error signing in",
            Operation::SignUp => "Error signing up",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// User-facing feedback for one finished operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn for_result<T>(operation: Operation, result: &Result<T>) -> Self {
        match result {
            Ok(_) => {
                let (title, description) = operation.success();
                Notice {
                    level: NoticeLevel::Success,
                    title: title.to_string(),
                    description: description.to_string(),
                }
            }
            Err(err) => Notice {
                level: NoticeLevel::Error,
                title: operation.failure_title().to_string(),
                description: err.to_string(),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::Utc;
    use uuid::Uuid;

    fn task(title: &str, status: TaskStatus, priority: TaskPriority) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            title: title.to_string(),
            description: Some(format!("notes for {}", title.to_lowercase())),
            status,
            priority,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_filter_combines_criteria() {
        let tasks = vec![
            task("Write report", TaskStatus::Pending, TaskPriority::High),
            task("Buy milk", TaskStatus::Completed, TaskPriority::Low),
            task("Review PR", TaskStatus::InProgress, TaskPriority::High),
        ];

        let filter = TaskFilter {
            search: Some("REPORT".into()),
            ..TaskFilter::default()
        };
        assert_eq!(tasks.iter().filter(|t| filter.matches(t)).count(), 1);

        // Search also looks at the description.
        let filter = TaskFilter {
            search: Some("notes for buy".into()),
            ..TaskFilter::default()
        };
        assert_eq!(tasks.iter().filter(|t| filter.matches(t)).count(), 1);

        let filter = TaskFilter {
            priority: Some(TaskPriority::High),
            status: Some(TaskStatus::InProgress),
            ..TaskFilter::default()
        };
        let hits: Vec<_> = tasks.iter().filter(|t| filter.matches(t)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Review PR");

        assert!(!TaskFilter::default().is_active());
        assert!(TaskFilter::default().matches(&tasks[0]));
    }

    #[test]
    fn test_stats() {
        let tasks = vec![
            task("a", TaskStatus::Completed, TaskPriority::High),
            task("b", TaskStatus::InProgress, TaskPriority::High),
            task("c", TaskStatus::Pending, TaskPriority::Low),
        ];
        let stats = TaskStats::from_tasks(&tasks);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.high_priority_open, 1);
        assert_eq!(stats.completion_rate, 33);

        assert_eq!(TaskStats::from_tasks(std::iter::empty()).completion_rate, 0);
    }

    #[test]
    fn test_groups_keep_order() {
        let tasks = vec![
            task("first", TaskStatus::Pending, TaskPriority::Low),
            task("second", TaskStatus::Completed, TaskPriority::Low),
            task("third", TaskStatus::Pending, TaskPriority::Low),
        ];
        let groups = TaskGroups::from_tasks(&tasks);
        let pending: Vec<_> = groups.pending.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(pending, vec!["first", "third"]);
        let order: Vec<_> = groups.iter().map(|(status, _)| status).collect();
        assert_eq!(
            order,
            vec![TaskStatus::InProgress, TaskStatus::Pending, TaskStatus::Completed]
        );
    }

    #[test]
    fn test_notice_text() {
        let ok: Result<()> = Ok(());
        let notice = Notice::for_result(Operation::CreateTask, &ok);
        assert_eq!(notice.title, "Task created");
        assert!(!notice.is_error());

        let failed: Result<()> = Err(Error::remote("duplicate key value"));
        let notice = Notice::for_result(Operation::UpdateTask, &failed);
        assert_eq!(notice.title, "Error updating task");
        assert_eq!(notice.description, "duplicate key value");
    }
}
