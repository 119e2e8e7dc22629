//! Input boundary
//!
//! Converts document-term matrices (dense or sparse) into the token-list
//! form consumed by the sampler.

pub mod matrix;
