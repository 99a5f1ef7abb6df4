//! CLI command implementations

pub mod checkpoint;
pub mod combine;
pub mod convert;
pub mod count;
pub mod run;
