//! # Domain Module
//!
//! Core domain types for the vote-integrity subsystem.

pub mod button;
pub mod entities;
pub mod invariants;
pub mod value_objects;

pub use button::*;
pub use entities::*;
pub use invariants::*;
pub use value_objects::*;
