//! Core library for the followup-tools command line application.
//!
//! The library turns multi-sheet clinical follow-up workbooks into
//! normalised tables for survival analysis. The modules are structured to
//! keep responsibilities narrow and composable: workbook and CSV adapters
//! live under [`io`], the in-memory data model inside [`model`], the
//! column/sheet-name normalisation in [`import`], the first-event
//! computation in [`events`], table assembly in [`tabulate`], and the
//! end-to-end orchestration under [`pipeline`].

pub mod config;
pub mod error;
pub mod events;
pub mod import;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod tabulate;

pub use error::{Result, ToolError};
