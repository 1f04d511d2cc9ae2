//! Off-ledger orchestration for the interest vault program
//!
//! Talks to the ledger only through [`ledger::LedgerNetwork`]; an in-memory
//! implementation with fault injection lives in [`ledger::memory`].

pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod orchestrator;

pub use clock::{ManualClock, SystemClock, TimeSource};
pub use config::OrchestratorConfig;
pub use error::{ClientError, ClientResult};
pub use identity::Identity;
pub use ledger::{
    memory::{Fault, InMemoryLedger},
    AccountView, Confirmation, LedgerNetwork, Rejection, Submission, SubmissionId,
    SubmissionStatus,
};
pub use orchestrator::{
    CompositeError, CompositeReceipt, InterestPayout, StepReport, StepState, TransferPlan,
    TransferStep, VaultOrchestrator, VaultOverview,
};
