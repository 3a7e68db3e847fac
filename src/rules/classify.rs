//! Classification of scheduler reason strings
//!
//! The scheduler reports placement failures as prose, e.g.
//! `0/3 nodes are available: 1 Insufficient cpu, 2 Insufficient memory.`
//! This is the only place that reads that prose.

use super::types::ShortResource;
use std::collections::BTreeSet;

const MARKER: &str = "insufficient ";

/// Resources named as insufficient in an unschedulable reason
///
/// Returns an empty set when the reason is about something else (taints,
/// affinity, unbound claims).
pub fn classify_unschedulable(reason: &str) -> BTreeSet<ShortResource> {
    let lower = reason.to_ascii_lowercase();
    let mut short = BTreeSet::new();

    let mut rest = lower.as_str();
    while let Some(idx) = rest.find(MARKER) {
        rest = &rest[idx + MARKER.len()..];
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '/' | '-' | '_'))
            .collect();
        let name = name.trim_end_matches('.');

        match name {
            "" => {}
            "cpu" => {
                short.insert(ShortResource::Cpu);
            }
            "memory" => {
                short.insert(ShortResource::Memory);
            }
            other => {
                short.insert(ShortResource::Other(other.to_string()));
            }
        }
    }

    short
}
