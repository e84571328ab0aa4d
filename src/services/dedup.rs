//! Splits discovered senders by what is already stored for them.

use std::collections::HashMap;

use crate::domain::{CategoryOutcome, ExistingAssignment};

/// Discovered senders grouped by their stored assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderPartition {
    /// Senders with no stored assignment, in discovery order.
    pub new: Vec<String>,
    /// Stored sentinel or dangling assignments that get another chance in
    /// the fallback pass.
    pub needs_fallback: Vec<ExistingAssignment>,
    /// Senders already assigned to a real category.
    pub already_categorized: Vec<String>,
}

/// Partitions `senders` against the assignments found for them.
///
/// Assignments for senders outside `senders` are ignored.
pub fn partition(senders: &[String], existing: &[ExistingAssignment]) -> SenderPartition {
    let stored: HashMap<&str, &ExistingAssignment> =
        existing.iter().map(|a| (a.sender.as_str(), a)).collect();

    let mut result = SenderPartition::default();
    for sender in senders {
        match stored.get(sender.as_str()) {
            None => result.new.push(sender.clone()),
            Some(ExistingAssignment {
                outcome: Some(CategoryOutcome::Resolved(_)),
                ..
            }) => result.already_categorized.push(sender.clone()),
            Some(assignment) => result.needs_fallback.push((*assignment).clone()),
        }
    }
    result
}
