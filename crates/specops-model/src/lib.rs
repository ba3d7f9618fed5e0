//! SpecOps Model
//!
//! Canonical, version-independent model of a REST API specification and of the
//! traffic reconciled against it.
//!
//! # Core Concepts
//!
//! - [`Specification`]: normalized document, immutable after load
//! - [`PathTemplate`] / [`OperationEntry`]: declared paths and their methods
//! - [`SchemaArena`] / [`SchemaNode`]: resolved schema graph addressed by [`SchemaId`]
//! - [`ObservedRequest`]: a request captured from traffic or produced by synthesis
//! - [`FieldPath`]: address of one field inside a request
//! - [`DocumentHash`]: Blake3 fingerprint of the source document
//!
//! # Example
//!
//! ```rust,ignore
//! use specops_model::{ObservedRequest, RequestOrigin};
//!
//! let request = ObservedRequest::new("GET", "/users/42?expand=profile")
//!     .with_header("Authorization", "Bearer abc");
//! assert_eq!(request.path, "/users/42");
//! assert_eq!(request.origin, RequestOrigin::Passive);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod field_path;
mod hash;
mod method;
mod render;
mod schema;
mod spec;
mod traffic;

// Re-exports
pub use error::{SpecError, SpecResult};
pub use field_path::{FieldLocation, FieldPath, FieldPathError, ITEM_SEGMENT};
pub use hash::{DocumentHash, HashError};
pub use method::{HttpMethod, UnknownMethod};
pub use render::render_schema;
pub use schema::{
    AdditionalProperties, Constraints, PrimitiveKind, Schema, SchemaArena, SchemaId, SchemaMeta,
    SchemaNode, UnionKind,
};
pub use spec::{
    placeholder_names, ApiInfo, ApiKeyLocation, MediaSpec, OperationEntry, OperationId,
    ParameterLocation, ParameterSpec, PathTemplate, RequestBodySpec, ResponseSpec,
    SecurityRequirement, SecurityScheme, Server, ServerVariable, SourceVersion, Specification,
};
pub use traffic::{
    parse_query, ObservedRequest, ObservedResponse, RequestOrigin, SynthesisStrategy,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the specification model
    pub use crate::{
        FieldPath, HttpMethod, ObservedRequest, OperationEntry, OperationId, RequestOrigin,
        SchemaId, SchemaNode, SpecError, Specification, SynthesisStrategy,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
