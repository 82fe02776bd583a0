//! Mutation pipeline: permission-checked operations over time entries and
//! projects
//!
//! Every operation takes the identity first and runs its gates in a fixed
//! order: not-found, forbidden, validation, conflict. Nothing downstream of a
//! failed gate executes, and each mutation is one write transaction, so a
//! failed or cancelled request leaves no partial state. Authorization paths
//! always come from the persisted entity, never from client arguments.

use chrono::{NaiveDate, Utc};

use crate::caps;
use crate::claims::Identity;
use crate::db::{read, write};
use crate::error::{Error, Result};
use crate::model::{
    project_path, EntryTag, Project, ProjectTask, Status, TagConfiguration, TimeEntry,
};
use crate::resolver::{has_capability, require};
use crate::store;
use crate::validate;
use crate::workflow::Transition;

/// Fields for a new time entry
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub project_code: String,
    pub task_id: u64,
    pub standard_hours: f64,
    pub overtime_hours: f64,
    pub start_date: NaiveDate,
    pub completion_date: NaiveDate,
    pub description: Option<String>,
    pub issue_id: Option<String>,
    pub tags: Vec<EntryTag>,
}

/// Sparse update: only supplied fields are validated and changed.
/// `Some(None)` clears an optional field, `None` leaves it untouched.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub task_id: Option<u64>,
    pub standard_hours: Option<f64>,
    pub overtime_hours: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub description: Option<Option<String>>,
    pub issue_id: Option<Option<String>>,
    pub tags: Option<Vec<EntryTag>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

/// Result of a move: the updated entry plus the tags the target project's
/// configuration did not accept.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub entry: TimeEntry,
    pub dropped_tags: Vec<EntryTag>,
}

// ============================================================================
// Time entries
// ============================================================================

/// Create a time entry. Requires Track on the project path; the entry starts
/// as NotReported and is owned by the caller.
pub fn create_entry(identity: &Identity, new: NewEntry) -> Result<TimeEntry> {
    write(|d, tx| {
        let project = store::require_project(d, tx, &new.project_code)?;
        require(identity, &project.resource_path(), caps::TRACK)?;
        validate::check_project_active(&project)?;
        validate::check_task(&project, new.task_id)?;
        validate::check_hours("standardHours", new.standard_hours)?;
        validate::check_hours("overtimeHours", new.overtime_hours)?;
        validate::check_dates(new.start_date, new.completion_date)?;
        validate::check_tags(&project, &new.tags)?;

        let now = Utc::now();
        let entry = TimeEntry {
            id: store::next_id(d, tx, store::NEXT_ENTRY_ID)?,
            project_code: project.code.clone(),
            task_id: new.task_id,
            standard_hours: new.standard_hours,
            overtime_hours: new.overtime_hours,
            start_date: new.start_date,
            completion_date: new.completion_date,
            description: new.description,
            issue_id: new.issue_id,
            tags: new.tags,
            status: Status::NotReported,
            decline_reason: None,
            owner_id: identity.subject.clone(),
            created_at: now,
            updated_at: now,
        };
        store::put_entry(d, tx, &entry, None)?;
        tracing::info!(entry = entry.id, project = %entry.project_code, "entry created");
        Ok(entry)
    })
}

/// Update fields of an entry. The owner may edit their own
/// NotReported/Declined entries; anyone else needs the Edit capability.
/// Editing a Declined entry clears the decline reason and resets it to
/// NotReported.
pub fn update_entry(identity: &Identity, id: u64, patch: EntryPatch) -> Result<TimeEntry> {
    write(|d, tx| {
        let mut entry = store::require_entry(d, tx, id)?;
        if !entry.is_owned_by(&identity.subject) {
            require(identity, &entry.resource_path(), caps::EDIT)?;
        }

        if let Some(h) = patch.standard_hours {
            validate::check_hours("standardHours", h)?;
        }
        if let Some(h) = patch.overtime_hours {
            validate::check_hours("overtimeHours", h)?;
        }
        let start = patch.start_date.unwrap_or(entry.start_date);
        let completion = patch.completion_date.unwrap_or(entry.completion_date);
        validate::check_dates(start, completion)?;
        if patch.task_id.is_some() || patch.tags.is_some() {
            let project = store::require_project(d, tx, &entry.project_code)?;
            if let Some(task_id) = patch.task_id {
                validate::check_task(&project, task_id)?;
            }
            if let Some(ref tags) = patch.tags {
                validate::check_tags(&project, tags)?;
            }
        }

        Transition::Edit.apply(&mut entry, Utc::now())?;

        if let Some(task_id) = patch.task_id {
            entry.task_id = task_id;
        }
        if let Some(h) = patch.standard_hours {
            entry.standard_hours = h;
        }
        if let Some(h) = patch.overtime_hours {
            entry.overtime_hours = h;
        }
        entry.start_date = start;
        entry.completion_date = completion;
        if let Some(description) = patch.description {
            entry.description = description;
        }
        if let Some(issue_id) = patch.issue_id {
            entry.issue_id = issue_id;
        }
        if let Some(tags) = patch.tags {
            entry.tags = tags;
        }

        store::put_entry(d, tx, &entry, None)?;
        Ok(entry)
    })
}

/// Submit an entry for approval. Owner-only; the full field validation runs
/// again at submit time to catch drift since creation.
pub fn submit_entry(identity: &Identity, id: u64) -> Result<TimeEntry> {
    write(|d, tx| {
        let mut entry = store::require_entry(d, tx, id)?;
        if !entry.is_owned_by(&identity.subject) {
            return Err(Error::Forbidden {
                path: entry.resource_path(),
                required: caps::cap_letter(caps::TRACK),
            });
        }
        require(identity, &entry.resource_path(), caps::TRACK)?;

        let project = store::require_project(d, tx, &entry.project_code)?;
        validate::check_project_active(&project)?;
        validate::check_task(&project, entry.task_id)?;
        validate::check_hours("standardHours", entry.standard_hours)?;
        validate::check_hours("overtimeHours", entry.overtime_hours)?;
        validate::check_dates(entry.start_date, entry.completion_date)?;
        validate::check_tags(&project, &entry.tags)?;

        Transition::Submit.apply(&mut entry, Utc::now())?;
        store::put_entry(d, tx, &entry, None)?;
        tracing::info!(entry = entry.id, "entry submitted");
        Ok(entry)
    })
}

/// Approve a submitted entry. Requires Approve on the entry's project path.
pub fn approve_entry(identity: &Identity, id: u64) -> Result<TimeEntry> {
    write(|d, tx| {
        let mut entry = store::require_entry(d, tx, id)?;
        require(identity, &entry.resource_path(), caps::APPROVE)?;
        Transition::Approve.apply(&mut entry, Utc::now())?;
        store::put_entry(d, tx, &entry, None)?;
        tracing::info!(entry = entry.id, approver = %identity.subject, "entry approved");
        Ok(entry)
    })
}

/// Decline a submitted entry with a non-empty comment, stored as the decline
/// reason. Requires Approve on the entry's project path.
pub fn decline_entry(identity: &Identity, id: u64, comment: &str) -> Result<TimeEntry> {
    write(|d, tx| {
        let mut entry = store::require_entry(d, tx, id)?;
        require(identity, &entry.resource_path(), caps::APPROVE)?;
        validate::check_comment(comment)?;
        Transition::Decline { comment: comment.trim().to_string() }.apply(&mut entry, Utc::now())?;
        store::put_entry(d, tx, &entry, None)?;
        tracing::info!(entry = entry.id, approver = %identity.subject, "entry declined");
        Ok(entry)
    })
}

/// Move a NotReported entry to another project/task. Tags the target project
/// does not configure are dropped, not rejected; the outcome reports them.
pub fn move_entry(
    identity: &Identity,
    id: u64,
    new_project_code: &str,
    new_task_name: &str,
) -> Result<MoveOutcome> {
    write(|d, tx| {
        let mut entry = store::require_entry(d, tx, id)?;
        if !entry.is_owned_by(&identity.subject) {
            require(identity, &entry.resource_path(), caps::EDIT)?;
        }

        let target = store::get_project(d, tx, new_project_code)?.ok_or_else(|| {
            Error::validation(
                "projectCode",
                format!("project {new_project_code} does not exist"),
            )
        })?;
        // Track on the target: moving an entry places time on that project.
        require(identity, &target.resource_path(), caps::TRACK)?;
        validate::check_project_active(&target)?;
        let task = validate::check_task_by_name(&target, new_task_name)?;

        let (kept, dropped) = validate::filter_tags(&target, entry.tags.clone());
        let prev_project = entry.project_code.clone();
        Transition::Move {
            project_code: target.code.clone(),
            task_id: task.id,
            tags: kept,
        }
        .apply(&mut entry, Utc::now())?;

        store::put_entry(d, tx, &entry, Some(&prev_project))?;
        tracing::info!(
            entry = entry.id,
            from = %prev_project,
            to = %entry.project_code,
            dropped = dropped.len(),
            "entry moved"
        );
        Ok(MoveOutcome { entry, dropped_tags: dropped })
    })
}

/// Delete a NotReported entry. Owner or Manage-capable actor.
pub fn delete_entry(identity: &Identity, id: u64) -> Result<bool> {
    write(|d, tx| {
        let entry = store::require_entry(d, tx, id)?;
        if !entry.is_owned_by(&identity.subject) {
            require(identity, &entry.resource_path(), caps::MANAGE)?;
        }
        Transition::Delete.guard(&entry)?;
        let removed = store::delete_entry(d, tx, &entry)?;
        tracing::info!(entry = id, "entry deleted");
        Ok(removed)
    })
}

/// Fetch one entry. Owner or View on the entry's project path.
pub fn get_entry(identity: &Identity, id: u64) -> Result<TimeEntry> {
    read(|d, tx| {
        let entry = store::require_entry(d, tx, id)?;
        if !entry.is_owned_by(&identity.subject) {
            require(identity, &entry.resource_path(), caps::VIEW)?;
        }
        Ok(entry)
    })
}

/// The caller's own entries
pub fn list_entries_for_owner(identity: &Identity) -> Result<Vec<TimeEntry>> {
    read(|d, tx| store::list_entries_for_owner(d, tx, &identity.subject))
}

/// All entries of a project. Requires View on the project path.
pub fn list_project_entries(identity: &Identity, code: &str) -> Result<Vec<TimeEntry>> {
    read(|d, tx| {
        let project = store::require_project(d, tx, code)?;
        require(identity, &project.resource_path(), caps::VIEW)?;
        store::list_entries_for_project(d, tx, &project.code)
    })
}

// ============================================================================
// Projects
// ============================================================================

/// Create a project. Requires Manage on `Project/{code}` (a root
/// `Project=M` grant covers every code).
pub fn create_project(identity: &Identity, code: &str, name: &str) -> Result<Project> {
    write(|d, tx| {
        require(identity, &project_path(code), caps::MANAGE)?;
        if code.is_empty() || code.contains('/') || code.trim() != code {
            return Err(Error::validation(
                "code",
                "project code must be non-empty and free of '/' and surrounding whitespace",
            ));
        }
        if store::get_project(d, tx, code)?.is_some() {
            return Err(Error::validation("code", format!("project code {code} already in use")));
        }
        let project = Project {
            code: code.to_string(),
            name: name.to_string(),
            is_active: true,
            tasks: Vec::new(),
            tag_configurations: Vec::new(),
        };
        store::put_project(d, tx, &project)?;
        tracing::info!(project = %code, "project created");
        Ok(project)
    })
}

/// Rename or (de)activate a project. Requires Manage.
pub fn update_project(identity: &Identity, code: &str, patch: ProjectPatch) -> Result<Project> {
    write(|d, tx| {
        let mut project = store::require_project(d, tx, code)?;
        require(identity, &project.resource_path(), caps::MANAGE)?;
        if let Some(name) = patch.name {
            project.name = name;
        }
        if let Some(is_active) = patch.is_active {
            project.is_active = is_active;
        }
        store::put_project(d, tx, &project)?;
        Ok(project)
    })
}

/// Delete a project; embedded tasks and tag configurations go with it.
/// Refused while any time entry still references the code.
pub fn delete_project(identity: &Identity, code: &str) -> Result<bool> {
    write(|d, tx| {
        let project = store::require_project(d, tx, code)?;
        require(identity, &project.resource_path(), caps::MANAGE)?;
        if store::project_has_entries(d, tx, &project.code)? {
            return Err(Error::Conflict {
                current: "referenced by time entries".into(),
                expected: "no referencing entries".into(),
            });
        }
        let removed = store::delete_project(d, tx, &project.code)?;
        tracing::info!(project = %code, "project deleted");
        Ok(removed)
    })
}

/// Add a task to a project. Task names are unique per project.
pub fn add_task(identity: &Identity, code: &str, name: &str) -> Result<Project> {
    write(|d, tx| {
        let mut project = store::require_project(d, tx, code)?;
        require(identity, &project.resource_path(), caps::MANAGE)?;
        if name.is_empty() {
            return Err(Error::validation("name", "task name must be non-empty"));
        }
        if project.task_by_name(name).is_some() {
            return Err(Error::validation("name", format!("task name {name} already in use")));
        }
        project.tasks.push(ProjectTask {
            id: store::next_id(d, tx, store::NEXT_TASK_ID)?,
            project_code: project.code.clone(),
            name: name.to_string(),
            is_active: true,
        });
        store::put_project(d, tx, &project)?;
        Ok(project)
    })
}

/// Rename or (de)activate a task, keeping per-project name uniqueness
pub fn update_task(
    identity: &Identity,
    code: &str,
    task_id: u64,
    patch: TaskPatch,
) -> Result<Project> {
    write(|d, tx| {
        let mut project = store::require_project(d, tx, code)?;
        require(identity, &project.resource_path(), caps::MANAGE)?;
        let idx = project
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| Error::not_found("task", task_id.to_string()))?;
        if let Some(ref name) = patch.name {
            if project.tasks.iter().any(|t| t.id != task_id && &t.name == name) {
                return Err(Error::validation("name", format!("task name {name} already in use")));
            }
        }
        let task = &mut project.tasks[idx];
        if let Some(name) = patch.name {
            task.name = name;
        }
        if let Some(is_active) = patch.is_active {
            task.is_active = is_active;
        }
        store::put_project(d, tx, &project)?;
        Ok(project)
    })
}

/// Replace the allowed-value set for a tag name; an empty set removes the
/// configuration. Requires Manage.
pub fn set_tag_configuration(
    identity: &Identity,
    code: &str,
    tag_name: &str,
    allowed_values: Vec<String>,
) -> Result<Project> {
    write(|d, tx| {
        let mut project = store::require_project(d, tx, code)?;
        require(identity, &project.resource_path(), caps::MANAGE)?;
        if tag_name.is_empty() {
            return Err(Error::validation("tagName", "tag name must be non-empty"));
        }
        project.tag_configurations.retain(|c| c.tag_name != tag_name);
        if !allowed_values.is_empty() {
            project.tag_configurations.push(TagConfiguration {
                id: store::next_id(d, tx, store::NEXT_TAG_ID)?,
                project_code: project.code.clone(),
                tag_name: tag_name.to_string(),
                allowed_values,
            });
        }
        store::put_project(d, tx, &project)?;
        Ok(project)
    })
}

/// Fetch one project. Requires View.
pub fn get_project(identity: &Identity, code: &str) -> Result<Project> {
    read(|d, tx| {
        let project = store::require_project(d, tx, code)?;
        require(identity, &project.resource_path(), caps::VIEW)?;
        Ok(project)
    })
}

/// Projects the identity holds View on
pub fn list_projects(identity: &Identity) -> Result<Vec<Project>> {
    read(|d, tx| {
        Ok(store::list_projects(d, tx)?
            .into_iter()
            .filter(|p| has_capability(identity, &p.resource_path(), caps::VIEW))
            .collect())
    })
}
