//! Physical plan layer for a distributed SQL engine.
//!
//! The analyzer hands over validated expressions with resolved tuple
//! and slot ids; this crate assembles them into a plan node tree,
//! freezes the tree with a distribution decision per join, and renders
//! it as a versioned wire message for workers and as explain text for
//! humans.

pub mod errors;
pub mod ir;
pub mod protocol;
