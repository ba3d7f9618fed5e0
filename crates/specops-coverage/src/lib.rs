//! SpecOps Coverage
//!
//! Tracks which declared operations have been seen in passive traffic or
//! exercised by synthesized requests, and reports drift between the
//! declared surface and what traffic actually hits.
//!
//! # Core Concepts
//!
//! - [`CoverageState`]: forward-only lifecycle `Undiscovered -> Observed -> Tested`
//! - [`CoverageTracker`]: concurrent per-operation state plus unmatched evidence
//! - [`DriftReporter`]: on-demand [`DriftReport`] from a consistent snapshot
//!
//! # Example
//!
//! ```rust,ignore
//! use specops_coverage::{CoverageTracker, DriftReporter};
//!
//! let tracker = CoverageTracker::new(spec.clone());
//! tracker.record(&matcher.match_request(&request))?;
//! println!("{}", DriftReporter::new(&tracker).report().render_text());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod drift;
pub mod error;
pub mod state;
pub mod tracker;

// Re-exports
pub use drift::{DriftReport, DriftReporter, DriftTotals, OperationDrift};
pub use error::{CoverageError, CoverageResult};
pub use state::{validate_transition, CoverageState};
pub use tracker::{
    CoverageConfig, CoverageRecord, CoverageSnapshot, CoverageTracker, ShadowEvidence,
    UndocumentedMethod,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for coverage tracking
    pub use crate::{CoverageState, CoverageTracker, DriftReport, DriftReporter};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
