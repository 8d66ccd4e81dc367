//! Release orchestration: the run state machine and the pipeline that drives it.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{
    Failure, NoReleaseReason, ReleaseOptions, ReleaseOrchestrator, RunOutcome, RunReport,
    EXIT_FAILED, EXIT_PARTIAL_SUCCESS, EXIT_SUCCESS,
};
pub use state::{ReleaseState, StateMachine};
