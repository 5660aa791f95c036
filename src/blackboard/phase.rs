//! Scoped role turns over the blackboard.
//!
//! Each round hands `&mut Blackboard` to exactly one role. A [`Phase`]
//! wraps that borrow for the length of the turn. On drop it appends a
//! `phase:end` entry that carries the turn's duration and how many fields
//! the role wrote, so the trace alone shows who touched what and for how
//! long.

use std::time::Instant;

use super::view::Blackboard;
use crate::agents::Role;

/// A role's turn with `&mut Blackboard` access.
///
/// # Example
///
/// ```
/// use estatewise::{Blackboard, Phase, Role};
///
/// let mut bb = Blackboard::new();
/// {
///     let mut phase = Phase::begin(&mut bb, Role::Executor);
///     phase.bb().set_map_link("https://example.test/map");
/// }
/// let end = bb.trace().last().unwrap();
/// assert_eq!(end.key, "phase:end");
/// assert_eq!(end.writes, Some(1));
/// ```
pub struct Phase<'a> {
    blackboard: &'a mut Blackboard,
    role: Role,
    started: Instant,
    /// Trace length right after the start marker.
    mark: usize,
}

impl<'a> Phase<'a> {
    pub fn begin(blackboard: &'a mut Blackboard, role: Role) -> Self {
        blackboard.record_phase_start(role);
        let mark = blackboard.trace().len();
        Self {
            blackboard,
            role,
            started: Instant::now(),
            mark,
        }
    }

    pub fn bb(&mut self) -> &mut Blackboard {
        self.blackboard
    }

    pub fn bb_ref(&self) -> &Blackboard {
        self.blackboard
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Fields written since the phase began.
    pub fn writes(&self) -> usize {
        self.blackboard.trace().len().saturating_sub(self.mark)
    }
}

impl Drop for Phase<'_> {
    fn drop(&mut self) {
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let writes = self.writes();
        self.blackboard.record_phase_end(self.role, elapsed_ms, writes);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
