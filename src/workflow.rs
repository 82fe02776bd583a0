//! Workflow state machine for time entries
//!
//! One tagged variant per mutation so the full transition table is auditable
//! in one place. Guards reject illegal source statuses with a Conflict error
//! naming the actual and expected status; effects are the only code allowed
//! to change `status` and `decline_reason`.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{EntryTag, Status, TimeEntry};

#[derive(Debug, Clone)]
pub enum Transition {
    /// Any field edit. Editing a Declined entry clears the decline reason
    /// and resets the entry to NotReported.
    Edit,
    Submit,
    Approve,
    Decline { comment: String },
    /// Reassign to another project/task; tags were already filtered against
    /// the target's configuration.
    Move { project_code: String, task_id: u64, tags: Vec<EntryTag> },
    /// Guard-only: the pipeline removes the record after the guard passes.
    Delete,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Edit => "edit",
            Transition::Submit => "submit",
            Transition::Approve => "approve",
            Transition::Decline { .. } => "decline",
            Transition::Move { .. } => "move",
            Transition::Delete => "delete",
        }
    }

    /// Legal source statuses for this transition
    pub fn allowed_from(&self) -> &'static [Status] {
        match self {
            Transition::Edit => &[Status::NotReported, Status::Declined],
            Transition::Submit => &[Status::NotReported],
            Transition::Approve | Transition::Decline { .. } => &[Status::Submitted],
            Transition::Move { .. } | Transition::Delete => &[Status::NotReported],
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Transition::Edit => "NotReported or Declined",
            Transition::Submit => "NotReported",
            Transition::Approve | Transition::Decline { .. } => "Submitted",
            Transition::Move { .. } | Transition::Delete => "NotReported",
        }
    }

    /// Check the source status without applying any effect
    pub fn guard(&self, entry: &TimeEntry) -> Result<()> {
        if self.allowed_from().contains(&entry.status) {
            Ok(())
        } else {
            Err(Error::Conflict {
                current: entry.status.as_str().to_string(),
                expected: self.expected().to_string(),
            })
        }
    }

    /// Guard, then apply this transition's effects and stamp `updated_at`
    pub fn apply(self, entry: &mut TimeEntry, now: DateTime<Utc>) -> Result<()> {
        self.guard(entry)?;
        tracing::debug!(entry = entry.id, transition = self.name(), from = entry.status.as_str(), "applying transition");
        match self {
            Transition::Edit => {
                if entry.status == Status::Declined {
                    entry.decline_reason = None;
                    entry.status = Status::NotReported;
                }
            }
            Transition::Submit => entry.status = Status::Submitted,
            Transition::Approve => entry.status = Status::Approved,
            Transition::Decline { comment } => {
                entry.status = Status::Declined;
                entry.decline_reason = Some(comment);
            }
            Transition::Move { project_code, task_id, tags } => {
                entry.project_code = project_code;
                entry.task_id = task_id;
                entry.tags = tags;
            }
            Transition::Delete => {}
        }
        entry.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(status: Status) -> TimeEntry {
        let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        TimeEntry {
            id: 1,
            project_code: "INTERNAL".into(),
            task_id: 1,
            standard_hours: 8.0,
            overtime_hours: 0.0,
            start_date: day,
            completion_date: day,
            description: None,
            issue_id: None,
            tags: Vec::new(),
            status,
            decline_reason: if status == Status::Declined { Some("too vague".into()) } else { None },
            owner_id: "user:alice".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn submit_moves_not_reported_to_submitted() {
        let mut e = entry(Status::NotReported);
        Transition::Submit.apply(&mut e, Utc::now()).unwrap();
        assert_eq!(e.status, Status::Submitted);
    }

    #[test]
    fn approve_requires_submitted_and_names_actual_status() {
        let mut e = entry(Status::NotReported);
        let err = Transition::Approve.apply(&mut e, Utc::now()).unwrap_err();
        match err {
            Error::Conflict { current, expected } => {
                assert_eq!(current, "NotReported");
                assert_eq!(expected, "Submitted");
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn decline_stores_the_comment() {
        let mut e = entry(Status::Submitted);
        Transition::Decline { comment: "missing issue id".into() }
            .apply(&mut e, Utc::now())
            .unwrap();
        assert_eq!(e.status, Status::Declined);
        assert_eq!(e.decline_reason.as_deref(), Some("missing issue id"));
    }

    #[test]
    fn editing_declined_resets_status_and_clears_reason() {
        let mut e = entry(Status::Declined);
        Transition::Edit.apply(&mut e, Utc::now()).unwrap();
        assert_eq!(e.status, Status::NotReported);
        assert!(e.decline_reason.is_none());
    }

    #[test]
    fn editing_not_reported_keeps_status() {
        let mut e = entry(Status::NotReported);
        Transition::Edit.apply(&mut e, Utc::now()).unwrap();
        assert_eq!(e.status, Status::NotReported);
    }

    #[test]
    fn approved_is_terminal() {
        for t in [
            Transition::Edit,
            Transition::Submit,
            Transition::Approve,
            Transition::Decline { comment: "x".into() },
            Transition::Move { project_code: "X".into(), task_id: 1, tags: Vec::new() },
            Transition::Delete,
        ] {
            let mut e = entry(Status::Approved);
            assert!(t.apply(&mut e, Utc::now()).is_err());
        }
    }

    #[test]
    fn submitted_rejects_everything_but_approve_and_decline() {
        for t in [Transition::Edit, Transition::Submit, Transition::Delete] {
            let mut e = entry(Status::Submitted);
            assert!(t.apply(&mut e, Utc::now()).is_err());
        }
        let mut e = entry(Status::Submitted);
        assert!(Transition::Move { project_code: "X".into(), task_id: 1, tags: Vec::new() }
            .apply(&mut e, Utc::now())
            .is_err());
    }

    #[test]
    fn move_swaps_project_task_and_tags() {
        let mut e = entry(Status::NotReported);
        Transition::Move {
            project_code: "CLIENT-A".into(),
            task_id: 9,
            tags: vec![EntryTag { name: "billing".into(), value: "billable".into() }],
        }
        .apply(&mut e, Utc::now())
        .unwrap();
        assert_eq!(e.project_code, "CLIENT-A");
        assert_eq!(e.task_id, 9);
        assert_eq!(e.tags.len(), 1);
        assert_eq!(e.status, Status::NotReported);
    }
}
