//! Acute pain service (APS) case reporting.
//!
//! A workbook of monthly sheets is normalized into [`types::Case`] records,
//! narrowed by a [`filter::Selection`], and reduced into dashboard reports.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod partition;
pub mod reports;
pub mod types;
pub mod util;
pub mod workbook;

#[cfg(test)]
mod fixtures;

pub use error::{ReportError, Result};
