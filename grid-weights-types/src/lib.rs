//! # grid-weights-types
//!
//! Core value types shared by the grid-weights regridding engine.
//!
//! - **Bounding boxes**: [`bbox::BoundingBox`], the broad-phase filter shape
//! - **Dimensions**: [`labels::Dimension`] and row-major index helpers used to
//!   map flat cell identifiers back onto a caller's N-dimensional layout
//! - **Configuration**: [`config::RegridConfig`], tolerances and execution flags
//!
//! All types are serializable with Serde and built on top of the `geo` crate's
//! geometric primitives.
//!
//! ## Examples
//!
//! ```rust
//! use grid_weights_types::bbox::BoundingBox;
//!
//! let cell = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
//! let other = BoundingBox::new(0.5, 0.5, 2.0, 2.0);
//! assert!(cell.intersects(&other));
//! ```

pub mod bbox;
pub mod config;
pub mod labels;
