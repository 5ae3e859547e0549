//! lsp-mux Router — presents N feature servers to the client as one.
//!
//! The router owns the ordered registry of feature adapters, merges their
//! initialize results into a single capability declaration, and dispatches
//! each `workspace/executeCommand` to the one adapter that claims it.

pub mod adapter;
pub mod merge;
pub mod router;

pub use adapter::FeatureServerAdapter;
pub use router::{FeatureRouter, RouterConfig};
