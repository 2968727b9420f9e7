//! # Dependency Graph Construction
//!
//! Turns model entities into dependency edges between completion states.

mod anonymous;
mod builder;
pub mod condition;

pub use anonymous::{structurally_equal, AnonymousGroups};
pub use builder::GraphBuilder;
