//! Blackboard: the run's shared fact record with phase-based `&mut` discipline.
//!
//! Agents borrow the blackboard mutably for the duration of their turn and
//! release it before the next turn starts, so the borrow checker guarantees
//! a single writer at any time.
//!
//! # Phase Discipline
//!
//! The [`Phase`] type provides scoped `&mut Blackboard` access and records
//! the start and end of each turn in the write trace.
//!
//! # Merging
//!
//! [`merge_tool_result`] turns tool-result text into typed facts. Output
//! that cannot be read leaves the blackboard untouched.

pub mod facts;
pub mod merge;
pub mod phase;
pub mod view;

pub use facts::{AnalyticsSummary, ComplianceReport, MortgageEstimate, ParsedFilters, ZipGroup};
pub use merge::merge_tool_result;
pub use phase::Phase;
pub use view::{Blackboard, TraceEntry};
