#![forbid(unsafe_code)]

//! PixelPress (pxp) — terminal client for context-aware image optimization.
//!
//! A guided wizard in four screens:
//! 1. **Upload** — type or drop a path; format, size, and daily-quota checks
//! 2. **Context** — pick where the image will be used
//! 3. **Processing** — staged optimization pipeline with progress
//! 4. **Result** — before/after comparison and a local download
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use pixelpress::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use pixelpress::core::config::Config;
//! use pixelpress::session::optimize_once;
//! ```

pub mod prelude;

pub mod catalog;
pub mod core;
pub mod logger;
pub mod present;
pub mod quota;
pub mod session;
#[cfg(feature = "tui")]
pub mod tui;
pub mod validate;
pub mod wizard;
