//! seqview - image sequence viewer library
//!
//! Re-exports all modules for use by the binary target.

// Display engine (images, sequences, texture streaming)
pub mod core;

// Edit program backends
pub mod edit;

// App modules
pub mod app;
pub mod cli;
pub mod config;
pub mod paths;

// Re-export commonly used types from core
pub use core::image::{Image, ImageHandle};
pub use core::player::Player;
pub use core::sequence::{EditProgram, Sequence};
pub use core::session::Session;
pub use edit::{EditKind, EditRegistry};
