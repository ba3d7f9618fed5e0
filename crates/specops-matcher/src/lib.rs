//! SpecOps Path Matcher
//!
//! Binds concrete request paths to the declared path templates of a
//! [`Specification`](specops_model::Specification).
//!
//! # Matching Rules
//!
//! - Paths are split on `/`; a template matches only with the same number of
//!   segments. Literal segments compare exactly (after percent-decoding),
//!   placeholder segments bind any non-empty token.
//! - When several templates match, the one with the fewest placeholder
//!   segments wins; among equals, the first declared.
//! - Query, header and cookie parameters play no part in choosing the
//!   template. They are checked afterwards for presence and type only.
//!
//! # Example
//!
//! ```rust,ignore
//! use specops_matcher::{MatcherConfig, PathMatcher};
//!
//! let matcher = PathMatcher::new(spec, MatcherConfig::default());
//! let result = matcher.match_request(&ObservedRequest::new("GET", "/users/42"));
//! assert_eq!(result.path_params["id"], "42");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod matcher;
pub mod params;
pub mod result;
pub mod template;

// Re-exports
pub use matcher::{match_path, MatcherConfig, PathMatcher};
pub use params::{check_parameters, check_value};
pub use result::{IssueKind, MatchKind, MatchResult, ParameterIssue, PathMatch, TemplateRef};
pub use template::{CompiledTemplate, Segment};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for matching traffic
    pub use crate::{MatchKind, MatchResult, MatcherConfig, PathMatcher};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
