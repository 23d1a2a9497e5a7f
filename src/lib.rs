// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Side-by-side point cloud embeddings with scalar-field overlays.
//!
//! Embedview shows several 2D/3D point sets of the same underlying items
//! (for example one point per cell, embedded on a torus and with UMAP) in
//! square tiles that share one drawing surface. Up to three scalar fields
//! from a catalogue can be toggled on at a time; each is painted with its
//! own colormap and the overlays are summed per point.
//!
//! # Key entry points
//!
//! - [`session::Session`] - loads data in the background and owns the
//!   selection and every color buffer
//! - [`frame::FrameDriver`] - lays out tiles and dispatches one frame to a
//!   [`frame::TileRenderer`]
//! - [`options::Options`] - layout, color, camera, effects and data
//!   settings
//! - `Viewer` - a ready-made winit window (feature `viewer`)
//!
//! # Architecture
//!
//! A background [`loader::Loader`] thread fetches point sets, fields and the
//! catalogue through a [`source::DataSource`]. The frame thread drains its
//! results in [`session::Session::poll`]; field results are tagged with the
//! selection [`selection::Generation`] they were requested under and dropped
//! if the selection has moved on. Layout is pure ([`layout`]) and the GPU
//! side ([`gpu`]) only consumes finished color buffers, drawing into an HDR
//! target that is bloomed and tone-mapped onto the surface.

pub mod colormap;
pub mod compositor;
pub mod error;
pub mod field;
pub mod frame;
pub mod gpu;
pub mod layout;
pub mod loader;
pub mod options;
pub mod point_set;
pub mod selection;
pub mod session;
pub mod source;
#[cfg(feature = "viewer")]
pub mod viewer;

pub use error::EmbedError;
pub use options::Options;
pub use session::Session;
#[cfg(feature = "viewer")]
pub use viewer::{Viewer, ViewerBuilder};
