//! Merging a flattened SPF record into an existing TXT record set, and
//! deciding whether the result differs from what is published.

use std::collections::BTreeSet;

use crate::record::TxtRecordSet;
use crate::spf::{collapse_segments, is_spf};

/// More than one SPF record was found. Only `kept` was replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleSpfRecords {
    pub kept: String,
    pub ignored: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The existing set, with segment boundaries of the replaced SPF record
    /// collapsed so it compares against `new` byte for byte.
    pub old_normalized: TxtRecordSet,
    pub new: TxtRecordSet,
    pub warnings: Vec<MultipleSpfRecords>,
}

/// Replaces the first SPF record of `existing` with `flattened_spf`.
///
/// Other records, including any further SPF records, keep their position.
/// A set without any SPF record is returned unchanged: the domain never
/// opted into SPF, so nothing is added to it.
pub fn reconcile(existing: &[String], flattened_spf: &str) -> Reconciliation {
    let mut old_normalized = Vec::with_capacity(existing.len());
    let mut new = Vec::with_capacity(existing.len());
    let mut warnings = Vec::new();
    let mut replaced: Option<&String> = None;

    for record in existing {
        if !is_spf(record) {
            log::debug!("Keeping record untouched: {record}");
            old_normalized.push(record.clone());
            new.push(record.clone());
            continue;
        }
        match replaced {
            None => {
                log::debug!("Flattening record: {record}");
                old_normalized.push(collapse_segments(record));
                new.push(flattened_spf.to_string());
                replaced = Some(record);
            }
            Some(kept) => {
                log::warn!("Multiple SPF records detected!\n1. {kept}\n2. {record}");
                warnings.push(MultipleSpfRecords {
                    kept: kept.clone(),
                    ignored: record.clone(),
                });
                old_normalized.push(record.clone());
                new.push(record.clone());
            }
        }
    }

    if replaced.is_none() {
        log::warn!("No SPF record found, leaving the TXT records unchanged");
    }

    Reconciliation {
        old_normalized,
        new,
        warnings,
    }
}

/// Whether two record sets differ.
///
/// Both sides are sorted and compared pairwise. A pair where both values are
/// SPF records is equal when their whitespace-separated tokens form the same
/// set, because mechanism order carries no meaning once flattened. Every
/// other pair must match exactly.
pub fn changed(before: &[String], after: &[String]) -> bool {
    if before.len() != after.len() {
        return true;
    }

    let mut sorted_before: Vec<&str> = before.iter().map(String::as_str).collect();
    let mut sorted_after: Vec<&str> = after.iter().map(String::as_str).collect();
    sorted_before.sort_unstable();
    sorted_after.sort_unstable();

    sorted_before
        .iter()
        .zip(&sorted_after)
        .any(|(b, a)| {
            if is_spf(b) && is_spf(a) {
                tokens(b) != tokens(a)
            } else {
                b != a
            }
        })
}

fn tokens(record: &str) -> BTreeSet<&str> {
    record.split_whitespace().collect()
}
