//! Shared fixtures for unit tests.
//!
//! - [`factories`] builds crafted image headers and payloads
//! - [`helpers`] provides guest memory and vspace doubles that record or fail on demand

mod factories;
mod helpers;

pub use factories::*;
pub use helpers::*;
