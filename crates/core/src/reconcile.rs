//! Compare the draft's learning targets against what the service reports.
//!
//! The service assigns target positions itself (appends on create, compacts
//! on delete). When its answer disagrees with the draft, the draft is no
//! longer a faithful picture and the caller should re-fetch.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::draft::ModuleDraft;
use crate::module::SltRecord;
use crate::types::SltIndex;

/// One disagreement between draft and service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SltDivergence {
    /// The draft has a target at `index`; the service does not.
    Missing { index: SltIndex, text: String },
    /// The service has a target at `index` the draft does not know about.
    Unexpected { index: SltIndex, text: String },
    /// Both have a target at `index` but the text differs.
    TextMismatch {
        index: SltIndex,
        expected: String,
        actual: String,
    },
    /// The service holds the target at a different position.
    IndexMismatch {
        text: String,
        expected: SltIndex,
        actual: SltIndex,
    },
    /// The draft's target order does not cover the positions it knows, so
    /// no reorder can be expressed until the draft is rebuilt.
    UnresolvedOrder { order: Vec<SltIndex> },
}

impl fmt::Display for SltDivergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { index, .. } => write!(f, "SLT {index} missing on the service"),
            Self::Unexpected { index, .. } => write!(f, "unexpected SLT {index} on the service"),
            Self::TextMismatch { index, .. } => write!(f, "SLT {index} text differs"),
            Self::IndexMismatch {
                expected, actual, ..
            } => write!(f, "SLT expected at {expected} is at {actual}"),
            Self::UnresolvedOrder { order } => {
                write!(f, "SLT order {order:?} is not a permutation of known positions")
            }
        }
    }
}

/// Diff the live targets of `draft` against the service's `records`.
///
/// An empty result means the service agrees with the draft exactly.
pub fn diff_slts(draft: &ModuleDraft, records: &[SltRecord]) -> Vec<SltDivergence> {
    let mut divergences = Vec::new();

    for slt in draft.slts() {
        let at_index = records.iter().find(|r| r.index == slt.module_index);
        match at_index {
            Some(record) if record.text == slt.text => {}
            other => {
                let elsewhere = records
                    .iter()
                    .find(|r| r.text == slt.text && r.index != slt.module_index);
                match (other, elsewhere) {
                    (_, Some(moved)) => divergences.push(SltDivergence::IndexMismatch {
                        text: slt.text.clone(),
                        expected: slt.module_index,
                        actual: moved.index,
                    }),
                    (Some(record), None) => divergences.push(SltDivergence::TextMismatch {
                        index: slt.module_index,
                        expected: slt.text.clone(),
                        actual: record.text.clone(),
                    }),
                    (None, None) => divergences.push(SltDivergence::Missing {
                        index: slt.module_index,
                        text: slt.text.clone(),
                    }),
                }
            }
        }
    }

    let live = draft.slts().len() as SltIndex;
    divergences.extend(
        records
            .iter()
            .filter(|r| r.index == 0 || r.index > live)
            .map(|r| SltDivergence::Unexpected {
                index: r.index,
                text: r.text.clone(),
            }),
    );

    divergences
}

/// Check that `order` holds each position `1..=order.len()` exactly once.
pub fn is_full_permutation(order: &[SltIndex]) -> bool {
    let mut seen = vec![false; order.len()];
    order.iter().all(|&index| {
        let Some(slot) = index.checked_sub(1).and_then(|i| seen.get_mut(i as usize)) else {
            return false;
        };
        !std::mem::replace(slot, true)
    })
}
