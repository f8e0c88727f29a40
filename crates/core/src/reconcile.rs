//! Poll option reconciliation.
//!
//! Editing a poll replaces its option list wholesale, but votes are attached
//! to option rows by id. [`reconcile`] works out the smallest change that
//! turns the stored options into the edited list while leaving every option
//! whose text survives the edit (and therefore its votes) untouched.
//!
//! Text is the only key. Two consequences:
//! - duplicate texts in the edited list collapse to a single option, the
//!   first occurrence deciding its position among the inserts;
//! - if several stored options share a text, all of them are kept when the
//!   text survives and all of them are deleted when it does not.

use std::collections::HashSet;

/// The changes that bring a poll's stored options in line with an edited
/// option list.
///
/// Apply `to_delete` (by option id) and then `to_insert` (by text, in order).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionDiff {
    /// Ids of stored options whose text is no longer wanted.
    pub to_delete: Vec<String>,
    /// Texts that have no stored option yet, in the order they were given.
    pub to_insert: Vec<String>,
}

impl OptionDiff {
    /// Returns true when the stored options already match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_insert.is_empty()
    }

    /// The option texts a poll ends up with once this diff is applied to
    /// `existing`: surviving texts in their stored order, then the inserts.
    #[must_use]
    pub fn apply_to<'a, I>(&self, existing: I) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        existing
            .into_iter()
            .filter(|(id, _)| !self.to_delete.iter().any(|d| d == id))
            .map(|(_, text)| text.to_string())
            .chain(self.to_insert.iter().cloned())
            .collect()
    }
}

/// Compute the option changes needed to reach `target`.
///
/// `existing` yields `(id, text)` pairs for the options currently stored
/// for the poll; it may be empty, as when a poll is first created. The
/// function performs no validation and never fails.
pub fn reconcile<'a, I>(existing: I, target: &[String]) -> OptionDiff
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let existing: Vec<(&str, &str)> = existing.into_iter().collect();
    let wanted: HashSet<&str> = target.iter().map(String::as_str).collect();

    let to_delete = existing
        .iter()
        .filter(|(_, text)| !wanted.contains(text))
        .map(|(id, _)| (*id).to_string())
        .collect();

    // Seeding with the stored texts makes `insert` reject both texts that
    // already exist and repeats within `target`.
    let mut seen: HashSet<&str> = existing.iter().map(|(_, text)| *text).collect();
    let to_insert = target
        .iter()
        .filter(|text| seen.insert(text.as_str()))
        .cloned()
        .collect();

    OptionDiff {
        to_delete,
        to_insert,
    }
}
