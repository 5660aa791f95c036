//! Plan and step state machine.
//!
//! A [`Plan`] is the fixed, ordered list of [`PlanStep`]s built from
//! [`STEP_TABLE`]. Steps move `pending → running → done`, or directly
//! `pending → done` when skipped or executed inline. At most one step is
//! `running` at a time; [`Plan::in_flight`] names it.

#[allow(clippy::module_inception)]
pub mod plan;
pub mod step;

pub use plan::{InFlight, Plan};
pub use step::{PlanStep, StepKey, StepOutcome, StepStatus, STEP_TABLE};
