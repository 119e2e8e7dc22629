//! Topic modeling algorithms
//!
//! This module provides:
//! - Count state and the collapsed Gibbs sampler
//! - Complete-data log likelihood
//! - Single-slice LDA fitting
//! - Soft temporal alignment across slices
//! - The online orchestrator
//! - Held-out inference with iterated pseudo-counts

pub mod align;
pub mod gibbs;
pub mod inference;
pub mod lda;
pub mod likelihood;
pub mod online;
pub mod state;
