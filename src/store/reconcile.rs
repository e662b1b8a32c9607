//! Reconciliation of a mystery's clue associations against a submitted form.
//!
//! Classification is pure; the transactional writes live on the store.

use serde::{Deserialize, Serialize};

use crate::types::{Quantity, QuantityError};

/// One row of the clue checklist as submitted by a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClueSubmission {
    pub clue_id: String,
    pub checked: bool,
    pub quantity: String,
}

impl ClueSubmission {
    pub fn new(clue_id: impl Into<String>, checked: bool, quantity: impl Into<String>) -> Self {
        Self {
            clue_id: clue_id.into(),
            checked,
            quantity: quantity.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidEntry {
    pub clue_id: i64,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unchecked,
    InvalidClueId,
    MissingQuantity,
    NonPositiveQuantity,
    UnknownClue,
}

impl SkipReason {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            SkipReason::Unchecked => "not selected",
            SkipReason::InvalidClueId => "invalid clue id",
            SkipReason::MissingQuantity => "quantity is required",
            SkipReason::NonPositiveQuantity => "numeric quantity must be greater than zero",
            SkipReason::UnknownClue => "clue no longer exists",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    pub clue_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct Classified {
    pub valid: Vec<ValidEntry>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    Inserted { clue_id: i64 },
    Updated { clue_id: i64 },
    Skipped(SkippedEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationOutcome {
    Inserted,
    Updated,
}

/// Result of reconciling a mystery's clues. `outcomes` lists written entries
/// in write order, followed by the skipped ones.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub mystery_id: i64,
    pub outcomes: Vec<EntryOutcome>,
}

impl Reconciliation {
    /// Warnings for entries that were not written.
    pub fn skipped(&self) -> impl Iterator<Item = &SkippedEntry> {
        self.outcomes.iter().filter_map(|o| match o {
            EntryOutcome::Skipped(s) => Some(s),
            _ => None,
        })
    }
}

pub const NO_VALID_CLUES: &str = "You must add at least one clue with a valid quantity \
     (if numeric, it must be positive) to create a mystery.";

/// Parses a clue or mystery id. Ids must be positive integers.
#[must_use]
pub fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

fn classify_one(submission: &ClueSubmission) -> Result<ValidEntry, SkipReason> {
    if !submission.checked {
        return Err(SkipReason::Unchecked);
    }
    let clue_id = parse_id(&submission.clue_id).ok_or(SkipReason::InvalidClueId)?;
    let quantity = Quantity::parse(&submission.quantity).map_err(|e| match e {
        QuantityError::Empty => SkipReason::MissingQuantity,
        QuantityError::NotPositive => SkipReason::NonPositiveQuantity,
    })?;
    Ok(ValidEntry { clue_id, quantity })
}

/// Splits submissions into writable entries and skipped ones. When a clue id
/// appears more than once, the last valid entry wins.
#[must_use]
pub fn classify(submissions: &[ClueSubmission]) -> Classified {
    let mut classified = Classified::default();

    for submission in submissions {
        match classify_one(submission) {
            Ok(entry) => {
                classified.valid.retain(|e| e.clue_id != entry.clue_id);
                classified.valid.push(entry);
            }
            Err(reason) => classified.skipped.push(SkippedEntry {
                clue_id: submission.clue_id.clone(),
                reason,
            }),
        }
    }

    classified
}
