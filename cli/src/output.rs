use chrono::{DateTime, Duration, Utc};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use taskflow_core::{Notice, Profile, Task, TaskStats};

const SHORT_ID_LEN: usize = 8;

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Created")]
    created: String,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "")]
    name: &'static str,
    #[tabled(rename = "")]
    value: String,
}

pub fn short_id(task: &Task) -> String {
    task.id.simple().to_string()[..SHORT_ID_LEN].to_string()
}

pub fn task_table<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> String {
    let now = Utc::now();
    let rows: Vec<TaskRow> = tasks
        .into_iter()
        .map(|task| TaskRow {
            id: short_id(task),
            status: task.status.label().to_string(),
            priority: task.priority.label().to_string(),
            title: match &task.description {
                Some(description) => format!("{}\n  {}", task.title, description),
                None => task.title.clone(),
            },
            created: relative_time(task.created_at, now),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

pub fn stats_table(stats: &TaskStats) -> String {
    let rows = vec![
        FieldRow { name: "Total Tasks", value: stats.total.to_string() },
        FieldRow { name: "Completed", value: stats.completed.to_string() },
        FieldRow { name: "In Progress", value: stats.in_progress.to_string() },
        FieldRow { name: "Pending", value: stats.pending.to_string() },
        FieldRow { name: "High Priority", value: stats.high_priority_open.to_string() },
        FieldRow { name: "Completion", value: format!("{}%", stats.completion_rate) },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

pub fn profile_table(profile: Option<&Profile>, email: Option<&str>, initials: &str) -> String {
    let dash = || "-".to_string();
    let rows = vec![
        FieldRow { name: "Initials", value: initials.to_string() },
        FieldRow {
            name: "Name",
            value: profile.and_then(|p| p.full_name.clone()).unwrap_or_else(dash),
        },
        FieldRow { name: "Email", value: email.map(str::to_string).unwrap_or_else(dash) },
        FieldRow {
            name: "Avatar",
            value: profile.and_then(|p| p.avatar_url.clone()).unwrap_or_else(dash),
        },
        FieldRow {
            name: "Member since",
            value: profile
                .map(|p| p.created_at.format("%B %Y").to_string())
                .unwrap_or_else(dash),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

pub fn print_notice(notice: &Notice, field_errors: &[taskflow_core::FieldError]) {
    if notice.is_error() {
        eprintln!("✗ {}: {}", notice.title, notice.description);
        if field_errors.len() > 1 {
            for err in field_errors {
                eprintln!("  - {}", err);
            }
        }
    } else {
        println!("✓ {}: {}", notice.title, notice.description);
    }
}

/// "just now", "5 minutes ago", "3 days ago" and so on.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    if elapsed < Duration::minutes(1) {
        return "just now".to_string();
    }
    let (count, unit) = if elapsed < Duration::hours(1) {
        (elapsed.num_minutes(), "minute")
    } else if elapsed < Duration::days(1) {
        (elapsed.num_hours(), "hour")
    } else if elapsed < Duration::days(30) {
        (elapsed.num_days(), "day")
    } else if elapsed < Duration::days(365) {
        (elapsed.num_days() / 30, "month")
    } else {
        (elapsed.num_days() / 365, "year")
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("{} {}{} ago", count, unit, plural)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_time() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(relative_time(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(relative_time(now - Duration::days(3), now), "3 days ago");
        assert_eq!(relative_time(now - Duration::days(400), now), "1 year ago");
        // Clock skew still reads as fresh.
        assert_eq!(relative_time(now + Duration::minutes(2), now), "just now");
    }
}
