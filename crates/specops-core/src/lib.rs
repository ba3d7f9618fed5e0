//! SpecOps Core
//!
//! Assessment sessions that reconcile a REST API specification with the
//! traffic actually sent to it.
//!
//! # Overview
//!
//! A session wires the pipeline together:
//!
//! 1. The specification is loaded once and shared read-only
//! 2. Each observed request is matched to an operation and recorded
//! 3. Synthesized requests cover what passive traffic never touched
//! 4. A drift report lists shadow endpoints, undocumented methods and
//!    uncovered or stale operations
//!
//! # Example
//!
//! ```rust,ignore
//! use specops_core::{AssessmentSession, SessionConfig};
//! use specops_normalizer::FormatHint;
//!
//! let session = AssessmentSession::from_document(bytes, FormatHint::Auto, SessionConfig::default())?;
//! for request in traffic {
//!     session.observe(&request)?;
//! }
//! println!("{}", session.drift_report().render_text());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod registry;
pub mod session;

// Re-exports
pub use config::{CacheConfig, SessionConfig};
pub use error::{SessionError, SessionResult};
pub use registry::SessionRegistry;
pub use session::{AssessmentSession, Observation, SessionId};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running assessments
    pub use crate::{AssessmentSession, SessionConfig, SessionError, SessionRegistry};
    pub use specops_coverage::{CoverageState, DriftReport};
    pub use specops_model::{ObservedRequest, SynthesisStrategy};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
