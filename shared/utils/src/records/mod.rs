//! Record Processing Module
//!
//! Turns extraction documents into flat rows and accumulates them in the
//! `applications` and `medications` tables.

pub mod dosage;
pub mod merger;
pub mod normalizer;

pub use dosage::*;
pub use merger::*;
pub use normalizer::*;
