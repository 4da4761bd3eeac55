//! Semantic resolution for Weft
//!
//! This crate turns a parsed [`wf_ast::SourceModule`] into a fully typed,
//! inheritance-resolved [`wf_sema::Module`]. It owns the hardest machinery
//! of the compiler: name and scope lookup, overload resolution over
//! user-defined methods, attributes and element constructors,
//! implicit-conversion search, multi-base linearization and facet merging
//! for pipeline types, the frequency-qualified subtyping and coercion
//! algebra, and generic-parameter deduction.
//!
//! # Usage
//!
//! ```rust,ignore
//! use wf_resolve::resolve_module;
//!
//! let resolution = resolve_module(&source, &interner)?;
//! for diagnostic in &resolution.diagnostics {
//!     // hand to the driver's renderer
//! }
//! // resolution.module is ready for the lowering stage
//! ```
//!
//! User errors never halt resolution: each one is reported and replaced by
//! an inert error sentinel so a single run surfaces as many independent
//! problems as possible. Only internal invariant violations ([`wf_sema::Ice`])
//! abort the module.

mod candidate;
mod convert;
mod deduce;
pub mod error;
mod exprs;
mod frequency;
mod linearize;
mod resolver;
pub mod scope;
mod terms;

pub use error::ResolveError;
pub use resolver::{resolve_module, ConversionCost, Resolution, Resolver};
