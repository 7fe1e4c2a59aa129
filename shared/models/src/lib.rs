//! # Intake Domain Models
//!
//! Data shapes for the insurance application intake pipeline.
//!
//! ## Key Models
//!
//! - **ApplicationDocument**: one extraction result per PDF, decoded leniently
//!   from whatever JSON the model returned
//! - **Applicant** / **Medication**: the parts of the document the record
//!   builders read
//! - **ApplicationRecord** / **MedicationRecord**: flat rows for the two
//!   persisted tables, each with a fixed column order via [`TableRecord`]

pub mod application;
pub mod lenient;
pub mod records;


pub use application::*;
pub use records::*;
