//! Latent Dirichlet Allocation for a single time slice
//!
//! Fits one document-term matrix with collapsed Gibbs sampling under
//! per-slice Dirichlet priors. The document-topic prior is a D x K matrix
//! and the word-topic prior a K x W matrix, so a slice can be fitted under
//! a prior produced by the temporal aligner rather than a flat constant.

use super::gibbs::{sample_topics, RandomPool};
use super::likelihood::log_likelihood;
use super::state::CountState;
use crate::preprocessing::matrix::DocTermMatrix;
use log::info;
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use thiserror::Error;

/// Errors that can occur during LDA computation
#[derive(Error, Debug)]
pub enum LdaError {
    #[error("Matrix dimensions mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Number of topics must be positive")]
    InvalidTopicCount,

    #[error("Model not fitted yet")]
    NotFitted,

    #[error("Invalid hyperparameter: {0}")]
    InvalidParameter(String),

    #[error("Expected integer count at ({doc}, {term}), found {value}")]
    NonIntegerCount { doc: usize, term: usize, value: f64 },

    #[error("Negative count at ({doc}, {term}): {value}")]
    NegativeCount { doc: usize, term: usize, value: f64 },

    #[error("Entry ({doc}, {term}) outside a {n_docs} x {n_terms} matrix")]
    IndexOutOfBounds {
        doc: usize,
        term: usize,
        n_docs: usize,
        n_terms: usize,
    },

    #[error("Document-term matrix holds no tokens")]
    EmptyMatrix,

    #[error("Non-finite log likelihood {value} at iteration {iteration}")]
    NonFiniteLikelihood { iteration: usize, value: f64 },

    #[error("Soft alignment needs at least one fitted slice")]
    EmptyHistory,

    #[error("Online model already finished")]
    Finished,

    #[error("Slice {slice} failed: {source}")]
    Slice {
        slice: usize,
        #[source]
        source: Box<LdaError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}

/// Dirichlet priors for one slice
#[derive(Debug, Clone, PartialEq)]
pub struct SlicePriors {
    /// Document-topic prior: n_docs x n_topics
    alpha: Array2<f64>,
    /// Word-topic prior: n_topics x vocab_size
    eta: Array2<f64>,
    alpha_sum: Array1<f64>,
    eta_sum: Array1<f64>,
}

impl SlicePriors {
    /// Build priors from explicit matrices.
    ///
    /// Every entry must be positive and finite and the two matrices must
    /// agree on the number of topics.
    pub fn new(alpha: Array2<f64>, eta: Array2<f64>) -> Result<Self, LdaError> {
        if alpha.ncols() != eta.nrows() {
            return Err(LdaError::DimensionMismatch(format!(
                "alpha has {} topics, eta has {}",
                alpha.ncols(),
                eta.nrows()
            )));
        }
        if eta.nrows() == 0 {
            return Err(LdaError::InvalidTopicCount);
        }
        if let Some(bad) = alpha.iter().find(|&&a| !(a.is_finite() && a > 0.0)) {
            return Err(LdaError::InvalidParameter(format!(
                "alpha entries must be positive, found {}",
                bad
            )));
        }
        if let Some(bad) = eta.iter().find(|&&e| !(e.is_finite() && e > 0.0)) {
            return Err(LdaError::InvalidParameter(format!(
                "eta entries must be positive, found {}",
                bad
            )));
        }

        let alpha_sum = alpha.sum_axis(Axis(1));
        let eta_sum = eta.sum_axis(Axis(1));
        Ok(Self {
            alpha,
            eta,
            alpha_sum,
            eta_sum,
        })
    }

    /// Constant priors, used for the first slice
    pub fn flat(
        n_docs: usize,
        n_topics: usize,
        vocab_size: usize,
        alpha: f64,
        eta: f64,
    ) -> Result<Self, LdaError> {
        Self::new(
            Array2::from_elem((n_docs, n_topics), alpha),
            Array2::from_elem((n_topics, vocab_size), eta),
        )
    }

    /// Constant document-topic prior with an explicit word-topic prior
    pub fn with_eta(n_docs: usize, alpha: f64, eta: Array2<f64>) -> Result<Self, LdaError> {
        let n_topics = eta.nrows();
        Self::new(Array2::from_elem((n_docs, n_topics), alpha), eta)
    }

    pub fn n_topics(&self) -> usize {
        self.eta.nrows()
    }

    pub fn n_docs(&self) -> usize {
        self.alpha.nrows()
    }

    pub fn vocab_size(&self) -> usize {
        self.eta.ncols()
    }

    pub fn alpha(&self) -> &Array2<f64> {
        &self.alpha
    }

    pub fn eta(&self) -> &Array2<f64> {
        &self.eta
    }

    /// Row sums of alpha, one per document
    pub fn alpha_sum(&self) -> &Array1<f64> {
        &self.alpha_sum
    }

    /// Row sums of eta, one per topic
    pub fn eta_sum(&self) -> &Array1<f64> {
        &self.eta_sum
    }
}

/// Point estimates and likelihoods of a fitted slice
#[derive(Debug, Clone)]
pub struct SliceFit {
    /// Topic-word distribution: n_topics x vocab_size, rows sum to 1
    pub topic_word: Array2<f64>,
    /// Document-topic distribution: n_docs x n_topics, rows sum to 1
    pub doc_topic: Array2<f64>,
    /// Log likelihood after the final sweep
    pub log_likelihood: f64,
    /// Log likelihood recorded every `refresh` sweeps
    pub trace: Vec<f64>,
}

/// Runs collapsed Gibbs sampling on one slice
#[derive(Debug, Clone)]
pub struct SliceFitter {
    n_topics: usize,
    n_iter: usize,
    refresh: usize,
}

impl SliceFitter {
    pub fn new(n_topics: usize, n_iter: usize, refresh: usize) -> Result<Self, LdaError> {
        if n_topics == 0 {
            return Err(LdaError::InvalidTopicCount);
        }
        if n_iter == 0 {
            return Err(LdaError::InvalidParameter("n_iter must be positive".into()));
        }
        if refresh == 0 {
            return Err(LdaError::InvalidParameter("refresh must be positive".into()));
        }
        Ok(Self {
            n_topics,
            n_iter,
            refresh,
        })
    }

    pub fn n_topics(&self) -> usize {
        self.n_topics
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn refresh(&self) -> usize {
        self.refresh
    }

    /// Fit `matrix` under `priors`.
    ///
    /// `pool` is copied and the copy reshuffled with `rng` before every
    /// sweep. The count state lives only for the duration of this call.
    pub fn fit<R: Rng + ?Sized>(
        &self,
        matrix: &DocTermMatrix,
        priors: &SlicePriors,
        pool: &RandomPool,
        rng: &mut R,
    ) -> Result<SliceFit, LdaError> {
        let (n_docs, vocab_size) = matrix.shape();
        if priors.n_topics() != self.n_topics
            || priors.n_docs() != n_docs
            || priors.vocab_size() != vocab_size
        {
            return Err(LdaError::DimensionMismatch(format!(
                "priors cover {} docs x {} topics x {} terms, slice is {} docs x {} terms with {} topics",
                priors.n_docs(),
                priors.n_topics(),
                priors.vocab_size(),
                n_docs,
                vocab_size,
                self.n_topics
            )));
        }

        let tokens = matrix.to_token_lists()?;
        let mut state = CountState::initialize(tokens, self.n_topics)?;
        info!("n_iter: {}", self.n_iter);

        let mut rands = pool.clone();
        let mut trace = Vec::with_capacity(self.n_iter / self.refresh + 1);
        for it in 0..self.n_iter {
            rands.shuffle(rng);
            if it % self.refresh == 0 {
                let ll = checked_log_likelihood(&state, priors, it)?;
                info!("<{}> log likelihood: {:.0}", it, ll);
                trace.push(ll);
            }
            sample_topics(&mut state, priors, &rands);
        }
        debug_assert!(state.is_consistent());

        let ll = checked_log_likelihood(&state, priors, self.n_iter - 1)?;
        info!("<{}> log likelihood: {:.0}", self.n_iter - 1, ll);

        let (topic_word, doc_topic) = state.into_estimates(priors);
        Ok(SliceFit {
            topic_word,
            doc_topic,
            log_likelihood: ll,
            trace,
        })
    }
}

fn checked_log_likelihood(
    state: &CountState,
    priors: &SlicePriors,
    iteration: usize,
) -> Result<f64, LdaError> {
    let value = log_likelihood(state, priors);
    if !value.is_finite() {
        return Err(LdaError::NonFiniteLikelihood { iteration, value });
    }
    Ok(value)
}
