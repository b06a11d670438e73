//! Outcome values for operations that depend on lazily loaded chunk data.
//!
//! Missing data is never an error. Every resumable step reports how far it
//! got through one of these enums and the caller polls again later.

use serde::{Deserialize, Serialize};

/// Result of one `generate` step of a resumable operation.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Progress {
    /// Nothing is left to do (including terminal failure, which callers
    /// detect through a separate flag).
    Complete,
    /// Required chunks are not available yet. Call again after loading.
    Incomplete,
}

impl Progress {
    /// True for [`Progress::Complete`].
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }

    /// Combine two steps that were both driven in the same pass.
    pub fn and(self, other: Progress) -> Progress {
        if self.is_complete() && other.is_complete() {
            Progress::Complete
        } else {
            Progress::Incomplete
        }
    }
}

/// Whether an aggregate was computed over all of its input.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completeness {
    Complete,
    /// At least one chunk was unavailable; the partial result is still valid
    /// for the chunks that were read.
    Incomplete,
}

impl Completeness {
    /// True for [`Completeness::Complete`].
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }

    /// Mark as incomplete.
    pub fn degrade(&mut self) {
        *self = Completeness::Incomplete;
    }
}

/// Decision of a placement supervisor about a candidate location.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Freeze the location.
    Accepted,
    /// Move on to the next candidate.
    Rejected,
    /// Ask again about the same candidate on a later call.
    Retry,
}
