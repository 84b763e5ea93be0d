//! Correction workflow: request building, the service state machine and
//! applying accepted changes.

pub mod apply;
pub mod request;
pub mod service;

pub use apply::{apply_card_change, apply_change, apply_changes, document_range, ApplyError, ChangeLedger};
pub use request::build_request;
pub use service::{CorrectionPhase, CorrectionResult, CorrectionService};
