//! Utility functions and data structures
//!
//! This module provides various helpers for:
//! - Configuration files
//! - Loading and saving slice datasets
//! - Metrics and evaluation
//! - Synthetic corpora with drifting topics

pub mod config;
pub mod evaluation;
pub mod io;
pub mod synthetic;
