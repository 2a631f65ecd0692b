//! Decoded-frame sources for the vidextract workspace.
//!
//! The extraction core needs exactly one decode primitive: fetch the luma
//! plane of frame `i`. Backends wrap concrete codec libraries behind the
//! [`FrameSource`] trait; the `mock` backend is always compiled and renders
//! synthetic overlay timestamps for tests and CI.

pub mod backends;
pub mod config;
mod core;

pub use config::{Backend, Configuration};
pub use core::{DynFrameSource, FrameSource};
pub use vidextract_types::{FrameError, FrameResult, LumaFrame, VideoMetadata};
