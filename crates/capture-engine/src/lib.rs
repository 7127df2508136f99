//! Login capture engine.
//!
//! Consumes normalized [`SessionSignal`]s in arrival order, tracks login
//! progress, accumulates identity first-write-wins and hands the host exactly
//! one completion once the session cookie has been seen on the landing page.
//!
//! [`SessionSignal`]: sessioncap_core_types::SessionSignal

pub mod accumulator;
pub mod config;
pub mod contribution;
pub mod engine;
pub mod errors;
pub mod guard;
pub mod host;
pub mod latch;
pub mod session;
pub mod state;
pub mod tasks;

pub use accumulator::{IdentityAccumulator, MergeOutcome};
pub use config::{EngineConfig, NavigationPatterns};
pub use contribution::{
    CacheError, CacheStats, CommunityCache, ContributedIdentity, IdentityObservation,
    InMemoryCommunityCache,
};
pub use engine::{CaptureEngine, EngineEvent, EngineHandle, EngineOutcome, EngineStatus};
pub use errors::{EngineError, EngineResult};
pub use guard::{CompletionGuard, FinalizeReason, GuardAction};
pub use host::CompletionHandler;
pub use session::{CaptureSession, ProbeEndpoints};
pub use state::{CaptureStateMachine, Transition};
pub use tasks::{TaskId, TaskInfo, TimerKind};
