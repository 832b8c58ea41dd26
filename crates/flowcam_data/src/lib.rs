//! # flowcam_data
//!
//! Flow-field patch loading for flowcam.
//!
//! This crate provides:
//! - [`read_flow_npy`] for `(component, row, col)` velocity stacks
//! - [`FlowField`] with the velocity magnitude the classifiers consume
//! - [`FlowPatch`], a field plus its source path, convertible to a classifier input
//! - [`PatchSource`] for scanning, streaming and parallel loading of patch directories
//!
//! ## Example
//!
//! ```rust,ignore
//! use flowcam_data::PatchSource;
//!
//! let source = PatchSource::from_dir("flow_patches/centered_CW")?;
//! for patch in source.load_all().into_iter().flatten() {
//!     let input = patch.to_tensor::<NdArray>(&device);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod flow;
mod io;
mod source;

pub use error::{DataError, Result};
pub use flow::{FlowField, FlowPatch};
pub use io::{read_flow_npy, read_npy, write_flow_npy};
pub use source::PatchSource;
