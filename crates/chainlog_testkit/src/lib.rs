//! # Chainlog Testkit
//!
//! Test utilities for chainlog.
//!
//! This crate provides:
//! - Sample entity types, recording hooks and a shared writer/reader chain
//! - Raw stream construction with per-trailer layouts
//! - Property-based test generators using proptest
//! - Fuzz testing harnesses
//! - Wire-format test vectors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chainlog_testkit::prelude::*;
//!
//! #[test]
//! fn widgets_materialize() {
//!     let mut chain = TestChain::memory();
//!     let id = chain.writer.instantiate(WIDGET, &Widget::named("w")).unwrap();
//!     chain.writer.seal_block().unwrap();
//!     chain.poll();
//!     assert_eq!(chain.widget(id).unwrap().name, "w");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod stream;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::stream::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use stream::*;
pub use vectors::*;
