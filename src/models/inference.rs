//! Held-out inference with iterated pseudo-counts
//!
//! Estimates the topic proportions of unseen documents under a fixed
//! topic-word matrix, following Wallach et al. (2009) and Buntine (2009).
//! Every token keeps a responsibility vector over topics; each iteration
//! sets a token's responsibility proportional to
//! `topic_word[k, w] * (sum of the other tokens' responsibilities for k + alpha)`
//! until the total absolute change drops below `tol` or `max_iter` is hit.

use super::lda::LdaError;
use crate::preprocessing::matrix::DocTermMatrix;
use log::debug;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;

/// Stopping rule for the fixed-point iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
    /// Document-topic concentration
    pub alpha: f64,
    /// Maximum number of updates after initialization
    pub max_iter: usize,
    /// Tolerance on the summed absolute change
    pub tol: f64,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            max_iter: 20,
            tol: 1e-16,
        }
    }
}

/// Topic proportions of every document in `matrix`.
///
/// Documents are independent once the model is fixed, so they are
/// processed in parallel. Empty documents get the uniform distribution.
pub fn transform(
    topic_word: &Array2<f64>,
    matrix: &DocTermMatrix,
    params: &InferenceParams,
) -> Result<Array2<f64>, LdaError> {
    let n_topics = topic_word.nrows();
    if matrix.n_terms() != topic_word.ncols() {
        return Err(LdaError::DimensionMismatch(format!(
            "model has {} terms, matrix has {}",
            topic_word.ncols(),
            matrix.n_terms()
        )));
    }
    let tokens = matrix.to_token_lists()?;

    let rows: Vec<Array1<f64>> = (0..tokens.n_docs())
        .into_par_iter()
        .map(|d| transform_document(topic_word, tokens.document(d), params))
        .collect();

    let mut doc_topic = Array2::zeros((rows.len(), n_topics));
    for (mut target, row) in doc_topic.outer_iter_mut().zip(rows) {
        target.assign(&row);
    }
    Ok(doc_topic)
}

/// Topic proportions of a single document given as word ids
pub fn transform_document(
    topic_word: &Array2<f64>,
    words: &[usize],
    params: &InferenceParams,
) -> Array1<f64> {
    let n_topics = topic_word.nrows();
    if words.is_empty() {
        return Array1::from_elem(n_topics, 1.0 / n_topics as f64);
    }

    // word likelihoods per token: n_tokens x n_topics
    let word_probs = topic_word.select(Axis(1), words).reversed_axes();
    let mut pzs = Array2::<f64>::zeros((words.len(), n_topics));

    // +1 for the initialization step
    for iteration in 0..=params.max_iter {
        let totals = pzs.sum_axis(Axis(0));
        let mut pzs_new = &word_probs * &(&totals - &pzs + params.alpha);
        for mut row in pzs_new.rows_mut() {
            let sum = row.sum();
            if sum > 0.0 {
                row /= sum;
            }
        }

        let delta: f64 = (&pzs_new - &pzs).mapv(f64::abs).sum();
        debug!("transform iter {}, delta {}", iteration, delta);
        pzs = pzs_new;
        if delta < params.tol {
            break;
        }
    }

    let theta = pzs.sum_axis(Axis(0));
    let total = theta.sum();
    theta / total
}
