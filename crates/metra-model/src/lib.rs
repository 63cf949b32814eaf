//! Plain data types shared by the metra crates.
//!
//! Nothing in here owns state or performs I/O: these are the values a
//! registry snapshot is made of and what the exporter consumes.
mod domain;
pub use domain::*;
