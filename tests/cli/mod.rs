//! CLI tests module

#[cfg(feature = "cli")]
pub mod checkpoint_tests;
#[cfg(feature = "cli")]
pub mod combine_tests;
#[cfg(feature = "cli")]
pub mod convert_tests;
#[cfg(feature = "cli")]
pub mod run_tests;
