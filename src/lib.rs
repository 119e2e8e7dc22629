//! # Online Topic Modeling
//!
//! Topic discovery over a stream of document batches ("time slices") using
//! collapsed Gibbs sampling for Latent Dirichlet Allocation. Each slice's
//! word-topic prior is built from the topic-word distributions fitted on
//! earlier slices through a soft temporal alignment, so topics drift smoothly
//! across time instead of being re-learned from scratch.
//!
//! ## Modules
//!
//! - `preprocessing`: document-term matrices (dense or sparse) and their
//!   token-list form
//! - `models`: count state, Gibbs sampler, likelihood, single-slice fitter,
//!   temporal aligner, online orchestrator and held-out inference
//! - `utils`: configuration, slice loading, evaluation and synthetic corpora
//!
//! ## Example
//!
//! ```rust,ignore
//! use ndarray::Array2;
//! use online_lda::models::online::OnlineLda;
//! use online_lda::utils::config::OnlineLdaConfig;
//!
//! let config = OnlineLdaConfig::new(2).n_iter(100).random_seed(0);
//! let mut model = OnlineLda::new(config)?;
//! model.fit(&slices)?;
//! println!("{:?}", model.topic_word_history().last());
//! ```

pub mod models;
pub mod preprocessing;
pub mod utils;

pub use models::align::{SoftAligner, WeightingMode};
pub use models::lda::{LdaError, SliceFit, SliceFitter, SlicePriors};
pub use models::online::{OnlineLda, OnlineState};
pub use preprocessing::matrix::{DocTermMatrix, SparseCounts, TokenLists};
pub use utils::config::OnlineLdaConfig;
