//! Assignee scheduling-conflict detection.
//!
//! A candidate booking conflicts with an existing task when the two share an
//! assignee and their deadline windows overlap. Windows are closed intervals,
//! so a booking ending at 11:00 and another starting at 11:00 do conflict.
//!
//! Everything here is pure: the caller supplies the current task list and
//! (optionally) the project range, and gets back a [`ConflictResult`].

use std::fmt;

use chrono::NaiveDateTime;

use crate::Error;

const INSTANT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A closed `[from, to]` interval with `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    from: NaiveDateTime,
    to: NaiveDateTime,
}

impl Window {
    /// Builds a window, rejecting one that ends before it starts.
    pub fn new(from: NaiveDateTime, to: NaiveDateTime) -> crate::Result<Self> {
        if from > to {
            return Err(Error::InvalidWindow { from, to });
        }
        Ok(Window { from, to })
    }

    pub fn from(&self) -> NaiveDateTime {
        self.from
    }

    pub fn to(&self) -> NaiveDateTime {
        self.to
    }

    /// Closed-interval overlap. Touching endpoints count.
    pub fn overlaps(&self, other: &Window) -> bool {
        self.from <= other.to && self.to >= other.from
    }

    /// Whether `other` lies entirely inside this window.
    pub fn contains(&self, other: &Window) -> bool {
        other.from >= self.from && other.to <= self.to
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.from.format(INSTANT_FORMAT), self.to.format(INSTANT_FORMAT))
    }
}

/// The booking being validated before a write.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub assignees: &'a [String],
    pub window: Window,
    /// Id of the task being edited in place; it never conflicts with itself.
    pub exclude_task_id: Option<u64>,
}

/// An existing task as seen by the checker.
#[derive(Debug, Clone)]
pub struct Booking<'a> {
    pub id: u64,
    pub assignees: &'a [String],
    pub window: Window,
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Conflict {
    #[error("task deadline must be within the project's date range (from {allowed})")]
    OutOfRange { allowed: Window, requested: Window },

    #[error("{assignee} is already scheduled in task {with_task} from {existing}; the new schedule (from {requested}) conflicts with it")]
    Overlap {
        with_task: u64,
        assignee: String,
        existing: Window,
        requested: Window,
    },
}

pub type ConflictResult = std::result::Result<(), Conflict>;

/// Checks `candidate` against the project range (if given) and then against
/// `existing`, in order.
///
/// A range violation is reported on its own, without looking for overlaps.
/// The first overlapping task wins; the reported assignee is the first of the
/// candidate's assignees that the task shares.
pub fn check_conflict<'a, I>(candidate: &Candidate<'_>, existing: I, range: Option<Window>) -> ConflictResult
where
    I: IntoIterator<Item = Booking<'a>>,
{
    if let Some(allowed) = range {
        if !allowed.contains(&candidate.window) {
            return Err(Conflict::OutOfRange { allowed, requested: candidate.window });
        }
    }

    for booking in existing {
        if candidate.exclude_task_id == Some(booking.id) {
            continue;
        }
        if !candidate.window.overlaps(&booking.window) {
            continue;
        }
        if let Some(shared) = candidate.assignees.iter().find(|a| booking.assignees.contains(*a)) {
            return Err(Conflict::Overlap {
                with_task: booking.id,
                assignee: shared.clone(),
                existing: booking.window,
                requested: candidate.window,
            });
        }
    }
    Ok(())
}
