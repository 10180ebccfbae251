//! Pull-request status transition rules.
//!
//! The structural graph is fixed: a transition outside it is always an
//! error. On top of that sits a business-rule layer (reviewer counts,
//! blocked merges) that can be bypassed with a caller flag; structural
//! violations cannot.
//!
//! ```text
//! draft    -> open, closed
//! open     -> draft, review, approved, merged, closed
//! review   -> open, approved, closed
//! approved -> review, merged, closed
//! merged   -> (terminal)
//! closed   -> draft, open
//! ```

use crate::models::{PrStatus, PullRequest};
use crate::{Error, Result};

/// Structurally allowed target states for a given source state.
pub fn allowed_transitions(from: PrStatus) -> &'static [PrStatus] {
    match from {
        PrStatus::Draft => &[PrStatus::Open, PrStatus::Closed],
        PrStatus::Open => &[
            PrStatus::Draft,
            PrStatus::Review,
            PrStatus::Approved,
            PrStatus::Merged,
            PrStatus::Closed,
        ],
        PrStatus::Review => &[PrStatus::Open, PrStatus::Approved, PrStatus::Closed],
        PrStatus::Approved => &[PrStatus::Review, PrStatus::Merged, PrStatus::Closed],
        PrStatus::Merged => &[],
        PrStatus::Closed => &[PrStatus::Draft, PrStatus::Open],
    }
}

/// Whether the structural graph permits `from -> to`.
pub fn is_allowed(from: PrStatus, to: PrStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Outcome of a permitted transition check.
#[derive(Debug, Clone, Default)]
pub struct TransitionCheck {
    /// Non-fatal business-rule advisories
    pub warnings: Vec<String>,
}

/// Validate a requested transition for a PR.
///
/// Structural violations return [`Error::InvalidTransition`] unconditionally.
/// Business rules are evaluated afterwards and skipped entirely when
/// `bypass_rules` is set:
/// - moving to `approved` warns on zero reviewers or fewer approvals than
///   reviewers
/// - moving to `merged` is rejected unless the current status is `approved`
///   and `blocked_by` is empty
/// - moving from `approved` to `closed` warns that merging may have been
///   intended
///
/// No file is written here; callers persist only after a successful check.
pub fn check_transition(
    pr: &PullRequest,
    to: PrStatus,
    bypass_rules: bool,
) -> Result<TransitionCheck> {
    let from = pr.pr_status;

    if !is_allowed(from, to) {
        return Err(Error::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    let mut check = TransitionCheck::default();
    if bypass_rules {
        return Ok(check);
    }

    match to {
        PrStatus::Approved => {
            if pr.reviewers.is_empty() {
                check
                    .warnings
                    .push(format!("{} has no reviewers assigned", pr.pr_id));
            } else if pr.approvals.len() < pr.reviewers.len() {
                check.warnings.push(format!(
                    "{} has {} of {} reviewer approvals",
                    pr.pr_id,
                    pr.approvals.len(),
                    pr.reviewers.len()
                ));
            }
        }
        PrStatus::Merged => {
            if from != PrStatus::Approved {
                return Err(Error::TransitionRejected(format!(
                    "{} must be approved before merging (currently {})",
                    pr.pr_id, from
                )));
            }
            if !pr.blocked_by.is_empty() {
                return Err(Error::TransitionRejected(format!(
                    "{} is blocked by {}",
                    pr.pr_id,
                    pr.blocked_by.join(", ")
                )));
            }
        }
        PrStatus::Closed => {
            if from == PrStatus::Approved {
                check.warnings.push(format!(
                    "{} is approved; did you mean to merge instead of close?",
                    pr.pr_id
                ));
            }
        }
        _ => {}
    }

    Ok(check)
}
