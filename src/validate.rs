//! Field-level business rules for time entries
//!
//! Pure, stateless checks applied before any state transition that changes
//! field values. Field names in errors use the wire-facing camelCase form.

use crate::error::{Error, Result};
use crate::model::{EntryTag, Project, ProjectTask};

/// Hours must be finite and non-negative. Rejects NaN as well: a NaN never
/// compares >= 0.
pub fn check_hours(field: &str, hours: f64) -> Result<()> {
    if hours >= 0.0 && hours.is_finite() {
        Ok(())
    } else {
        Err(Error::validation(field, "must be a non-negative number"))
    }
}

pub fn check_dates(start: chrono::NaiveDate, completion: chrono::NaiveDate) -> Result<()> {
    if start <= completion {
        Ok(())
    } else {
        Err(Error::Validation {
            fields: vec!["startDate".into(), "completionDate".into()],
            message: "startDate must not be after completionDate".into(),
        })
    }
}

/// The target project must be active; absence is handled upstream by the
/// store fetch.
pub fn check_project_active(project: &Project) -> Result<()> {
    if project.is_active {
        Ok(())
    } else {
        Err(Error::validation("projectCode", format!("project {} is not active", project.code)))
    }
}

/// The target task must exist under the project and be active
pub fn check_task(project: &Project, task_id: u64) -> Result<()> {
    match project.task(task_id) {
        Some(task) if task.is_active => Ok(()),
        Some(_) => Err(Error::validation("taskId", format!("task {task_id} is not active"))),
        None => Err(Error::validation(
            "taskId",
            format!("task {task_id} does not exist in project {}", project.code),
        )),
    }
}

/// Resolve a task by its case-sensitive name, requiring it to be active
pub fn check_task_by_name<'a>(project: &'a Project, name: &str) -> Result<&'a ProjectTask> {
    match project.task_by_name(name) {
        Some(task) if task.is_active => Ok(task),
        Some(_) => Err(Error::validation("taskName", format!("task {name} is not active"))),
        None => Err(Error::validation(
            "taskName",
            format!("task {name} does not exist in project {}", project.code),
        )),
    }
}

fn tag_is_allowed(project: &Project, tag: &EntryTag) -> bool {
    project
        .tag_configuration(&tag.name)
        .is_some_and(|c| c.allowed_values.iter().any(|v| v == &tag.value))
}

/// Create/update semantics: every supplied tag must name a configured
/// `(name, value)` pair of the project.
pub fn check_tags(project: &Project, tags: &[EntryTag]) -> Result<()> {
    for tag in tags {
        if !tag_is_allowed(project, tag) {
            return Err(Error::validation(
                "tags",
                format!("tag {}={} is not configured for project {}", tag.name, tag.value, project.code),
            ));
        }
    }
    Ok(())
}

/// Move semantics: tags unknown to the target project are dropped, not
/// rejected. Returns (kept, dropped).
pub fn filter_tags(project: &Project, tags: Vec<EntryTag>) -> (Vec<EntryTag>, Vec<EntryTag>) {
    tags.into_iter().partition(|t| tag_is_allowed(project, t))
}

/// Decline comments must carry content
pub fn check_comment(comment: &str) -> Result<()> {
    if comment.trim().is_empty() {
        Err(Error::validation("comment", "a decline comment is required"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn project() -> Project {
        Project {
            code: "INTERNAL".into(),
            name: "Internal".into(),
            is_active: true,
            tasks: vec![
                ProjectTask { id: 1, project_code: "INTERNAL".into(), name: "Dev".into(), is_active: true },
                ProjectTask { id: 2, project_code: "INTERNAL".into(), name: "Retired".into(), is_active: false },
            ],
            tag_configurations: vec![crate::model::TagConfiguration {
                id: 1,
                project_code: "INTERNAL".into(),
                tag_name: "billing".into(),
                allowed_values: vec!["billable".into(), "internal".into()],
            }],
        }
    }

    fn tag(name: &str, value: &str) -> EntryTag {
        EntryTag { name: name.into(), value: value.into() }
    }

    #[test]
    fn negative_hours_rejected_with_field_name() {
        let err = check_hours("standardHours", -1.0).unwrap_err();
        match err {
            Error::Validation { fields, .. } => assert_eq!(fields, vec!["standardHours"]),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert!(check_hours("overtimeHours", 0.0).is_ok());
    }

    #[test]
    fn nan_hours_rejected() {
        assert!(check_hours("standardHours", f64::NAN).is_err());
        assert!(check_hours("standardHours", f64::INFINITY).is_err());
    }

    #[test]
    fn date_order_enforced_naming_both_fields() {
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let err = check_dates(d1, d2).unwrap_err();
        match err {
            Error::Validation { fields, .. } => {
                assert_eq!(fields, vec!["startDate", "completionDate"])
            }
            other => panic!("expected Validation, got {other:?}"),
        }
        assert!(check_dates(d2, d1).is_ok());
        assert!(check_dates(d1, d1).is_ok());
    }

    #[test]
    fn task_must_exist_and_be_active() {
        let p = project();
        assert!(check_task(&p, 1).is_ok());
        assert!(check_task(&p, 2).is_err());
        assert!(check_task(&p, 99).is_err());
    }

    #[test]
    fn task_name_match_is_case_sensitive() {
        let p = project();
        assert!(check_task_by_name(&p, "Dev").is_ok());
        assert!(check_task_by_name(&p, "dev").is_err());
        assert!(check_task_by_name(&p, "Retired").is_err());
    }

    #[test]
    fn unknown_tags_rejected_on_create() {
        let p = project();
        assert!(check_tags(&p, &[tag("billing", "billable")]).is_ok());
        assert!(check_tags(&p, &[tag("billing", "nonsense")]).is_err());
        assert!(check_tags(&p, &[tag("unknown", "x")]).is_err());
    }

    #[test]
    fn filter_tags_partitions_instead_of_rejecting() {
        let p = project();
        let (kept, dropped) = filter_tags(
            &p,
            vec![tag("billing", "billable"), tag("unknown", "x"), tag("billing", "bad")],
        );
        assert_eq!(kept, vec![tag("billing", "billable")]);
        assert_eq!(dropped.len(), 2);
    }

    #[test]
    fn decline_comment_must_be_non_empty() {
        assert!(check_comment("   ").is_err());
        assert!(check_comment("hours exceed budget").is_ok());
    }
}
