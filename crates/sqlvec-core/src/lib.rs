//! Host-independent building blocks of sqlvec
//!
//! - [`types`]: element types, [`Vector`] and packed [`BitVector`]s
//! - [`codec`]: the headerless little-endian blob format and JSON arrays
//! - [`kernels`]: distance metrics and element-wise operations
//! - [`topk`]: bounded top-k selection with rowid tie-breaking
//! - [`config`]: [`ExtensionConfig`]
//! - [`observe`]: optional `metrics` instrumentation
//!
//! # Example
//!
//! ```
//! use sqlvec_core::{kernels, Vector};
//!
//! let a = Vector::from(vec![1.0f32, 0.0]);
//! let b = Vector::from(vec![0.0f32, 1.0]);
//! let d = kernels::cosine(&a, &b).unwrap();
//! assert!((d - 1.0).abs() < 1e-9);
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod kernels;
pub mod observe;
pub mod topk;
pub mod types;

pub use config::ExtensionConfig;
pub use error::{Result, VecError};
pub use kernels::DistanceMetric;
pub use topk::{Neighbor, TopK};
pub use types::{BitVector, ElementType, Vector};
