//! Persisted entities: projects, tasks, tag configurations, time entries

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Workflow status of a time entry. Transitions go through
/// [`crate::workflow`] only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Status {
    NotReported,
    Submitted,
    Approved,
    Declined,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotReported => "NotReported",
            Status::Submitted => "Submitted",
            Status::Approved => "Approved",
            Status::Declined => "Declined",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTask {
    pub id: u64,
    /// Shadow reference: follows the parent project's code, not editable
    /// directly.
    pub project_code: String,
    pub name: String,
    pub is_active: bool,
}

/// Closed set of legal values for one tag name within a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagConfiguration {
    pub id: u64,
    pub project_code: String,
    pub tag_name: String,
    pub allowed_values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Immutable storage key; acts as the foreign key for entries and tasks
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub tasks: Vec<ProjectTask>,
    pub tag_configurations: Vec<TagConfiguration>,
}

impl Project {
    /// ACL path for this project, `Project/{code}`
    pub fn resource_path(&self) -> String {
        project_path(&self.code)
    }

    pub fn task(&self, task_id: u64) -> Option<&ProjectTask> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Case-sensitive task lookup by name
    pub fn task_by_name(&self, name: &str) -> Option<&ProjectTask> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn tag_configuration(&self, tag_name: &str) -> Option<&TagConfiguration> {
        self.tag_configurations
            .iter()
            .find(|c| c.tag_name == tag_name)
    }
}

/// ACL path for a project code
pub fn project_path(code: &str) -> String {
    format!("Project/{code}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTag {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: u64,
    pub project_code: String,
    pub task_id: u64,
    pub standard_hours: f64,
    pub overtime_hours: f64,
    pub start_date: NaiveDate,
    pub completion_date: NaiveDate,
    pub description: Option<String>,
    pub issue_id: Option<String>,
    pub tags: Vec<EntryTag>,
    pub status: Status,
    pub decline_reason: Option<String>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    /// ACL path of the project this entry is persisted under. Authorization
    /// always derives from this, never from client-supplied arguments.
    pub fn resource_path(&self) -> String {
        project_path(&self.project_code)
    }

    pub fn is_owned_by(&self, subject: &str) -> bool {
        self.owner_id == subject
    }
}
