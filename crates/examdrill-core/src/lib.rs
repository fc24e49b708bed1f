//! examdrill-core: Timed assessment sessions, grading, and remediation.
//!
//! This crate defines the data model, the session state machine and its
//! async driver, answer normalization, grading, and the trait seams used by
//! external graders and host applications.

pub mod clock;
pub mod engine;
pub mod error;
pub mod external;
pub mod feedback;
pub mod grading;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod range;
pub mod remediation;
pub mod report;
pub mod session;
pub mod statistics;
pub mod traits;
