//! SpecOps Request Synthesis
//!
//! Turns the parameter and body schemas of declared operations into concrete
//! request descriptors, ready for a host to send.
//!
//! # Strategies
//!
//! - [`ValidCases`]: a baseline request satisfying every constraint, plus one
//!   request per alternative `oneOf`/`anyOf` branch
//! - [`BoundaryCases`]: values at and one past each numeric and length limit,
//!   every enum member plus an outsider, and required fields left out
//! - [`MalformedCases`]: type mismatches, oversized values, injection payloads,
//!   unexpected properties and a truncated body, capped per operation
//!
//! Values from a shared [`ParameterStore`] (set by the user or harvested
//! from passive traffic) replace generated ones, and [`HeaderRule`]s add
//! scoped custom headers.
//!
//! `allOf` branches are merged before generation; constraints that cannot
//! hold together fail the operation with `ConflictingConstraints`.
//! Self-referencing schemas are cut at the configured depth, so every
//! sequence is finite.
//!
//! # Example
//!
//! ```rust,ignore
//! use specops_synth::{SchemaRequestSynthesizer, SynthesisConfig};
//! use specops_model::SynthesisStrategy;
//!
//! let synth = SchemaRequestSynthesizer::new(spec, SynthesisConfig::default());
//! for request in synth.synthesize_named("createOrder", SynthesisStrategy::Boundary)? {
//!     println!("{} {} ({})", request.method, request.url(), request.label);
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod request;
pub mod rules;
pub mod sequence;
pub mod shape;
pub mod store;
pub mod strategy;
pub mod synthesizer;
pub mod values;

// Re-exports
pub use config::SynthesisConfig;
pub use error::{SynthResult, SynthesisError};
pub use request::{Payload, RequestDraft, RequestRenderer, SynthesizedBody, SynthesizedRequest};
pub use rules::{HeaderRule, HeaderScope, ResolvedHeader};
pub use sequence::SynthesisSequence;
pub use shape::{merge, Additional, Shape, ShapeBuilder, ShapeKind};
pub use store::{ParameterStore, StoredValue, ValueSource};
pub use strategy::{
    strategy_for, BoundaryCases, CasePlan, CaseStrategy, MalformedCases, Mutation,
    OperationShapes, ValidCases, INJECTION_PAYLOADS,
};
pub use synthesizer::{BatchOutcome, SchemaRequestSynthesizer, SynthesisFailure};
pub use values::ValueGenerator;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for request synthesis
    pub use crate::{
        SchemaRequestSynthesizer, SynthesisConfig, SynthesisError, SynthesizedRequest,
    };
    pub use specops_model::SynthesisStrategy;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
