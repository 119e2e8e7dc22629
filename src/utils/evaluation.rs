//! Evaluation metrics for fitted slices

use crate::models::lda::LdaError;
use crate::preprocessing::matrix::DocTermMatrix;
use ndarray::Array2;
use std::collections::HashSet;

/// `sum_{d,w} X[d,w] * ln((doc_topic . topic_word)[d,w])`
///
/// Only non-zero cells of `matrix` contribute.
pub fn predictive_log_likelihood(
    doc_topic: &Array2<f64>,
    topic_word: &Array2<f64>,
    matrix: &DocTermMatrix,
) -> Result<f64, LdaError> {
    let (n_docs, n_terms) = matrix.shape();
    if doc_topic.nrows() != n_docs
        || topic_word.ncols() != n_terms
        || doc_topic.ncols() != topic_word.nrows()
    {
        return Err(LdaError::DimensionMismatch(format!(
            "doc_topic {:?} x topic_word {:?} does not cover a {} x {} matrix",
            doc_topic.dim(),
            topic_word.dim(),
            n_docs,
            n_terms
        )));
    }

    let mut ll = 0.0;
    for (doc, term, count) in matrix.nonzero_counts()? {
        let p = doc_topic.row(doc).dot(&topic_word.column(term));
        ll += count as f64 * p.ln();
    }
    Ok(ll)
}

/// Per-token perplexity, `exp(-ll / n_tokens)`
pub fn perplexity(log_likelihood: f64, n_tokens: usize) -> f64 {
    if n_tokens == 0 {
        return f64::NAN;
    }
    (-log_likelihood / n_tokens as f64).exp()
}

/// Most probable topic of every document
pub fn dominant_topics(doc_topic: &Array2<f64>) -> Vec<usize> {
    doc_topic
        .rows()
        .into_iter()
        .map(|row| {
            let mut best_topic = 0;
            let mut best_prob = f64::NEG_INFINITY;
            for (topic, &p) in row.iter().enumerate() {
                if p > best_prob {
                    best_prob = p;
                    best_topic = topic;
                }
            }
            best_topic
        })
        .collect()
}

/// The `n` most probable term indices of every topic, with probabilities
pub fn top_terms(topic_word: &Array2<f64>, n: usize) -> Vec<Vec<(usize, f64)>> {
    topic_word
        .rows()
        .into_iter()
        .map(|row| {
            let mut word_probs: Vec<(usize, f64)> = row.iter().copied().enumerate().collect();
            word_probs.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            word_probs.truncate(n);
            word_probs
        })
        .collect()
}

/// Compute topic diversity
///
/// Share of unique terms among all topics' top terms. Higher values
/// indicate more diverse topics.
pub fn topic_diversity(topics: &[Vec<usize>]) -> f64 {
    let total: usize = topics.iter().map(Vec::len).sum();
    if total == 0 {
        return 0.0;
    }
    let unique: HashSet<usize> = topics.iter().flatten().copied().collect();
    unique.len() as f64 / total as f64
}

/// Jaccard similarity between two topics' term sets
pub fn topic_overlap(topic1: &[usize], topic2: &[usize]) -> f64 {
    let set1: HashSet<usize> = topic1.iter().copied().collect();
    let set2: HashSet<usize> = topic2.iter().copied().collect();

    let union = set1.union(&set2).count();
    if union == 0 {
        return 0.0;
    }
    set1.intersection(&set2).count() as f64 / union as f64
}

/// Top-term overlap of each topic between two consecutive slices
pub fn topic_drift(previous: &Array2<f64>, current: &Array2<f64>, n: usize) -> Vec<f64> {
    let ids = |m: &Array2<f64>| -> Vec<Vec<usize>> {
        top_terms(m, n)
            .into_iter()
            .map(|t| t.into_iter().map(|(w, _)| w).collect())
            .collect()
    };
    ids(previous)
        .iter()
        .zip(ids(current).iter())
        .map(|(a, b)| topic_overlap(a, b))
        .collect()
}

/// Least-squares slope of a likelihood trace against its index
pub fn likelihood_trend(trace: &[f64]) -> f64 {
    let n = trace.len();
    if n < 2 {
        return 0.0;
    }
    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = trace.iter().sum::<f64>() / n as f64;
    let (mut cov, mut var) = (0.0, 0.0);
    for (i, &y) in trace.iter().enumerate() {
        let dx = i as f64 - mean_x;
        cov += dx * (y - mean_y);
        var += dx * dx;
    }
    cov / var
}

/// Summary statistics for one fitted slice
#[derive(Debug, Clone)]
pub struct SliceSummary {
    /// Slice index
    pub slice: usize,
    /// Number of documents in the slice
    pub n_docs: usize,
    /// Final training log likelihood
    pub log_likelihood: f64,
    /// Slope of the in-slice likelihood trace
    pub trend: f64,
    /// Topic diversity over the top terms
    pub diversity: f64,
    /// Log likelihood of this slice under the previous slice's model
    pub predictive: Option<f64>,
}

impl SliceSummary {
    /// Print summary to console
    pub fn print(&self) {
        println!("=== Slice {} ===", self.slice);
        println!("Documents: {}", self.n_docs);
        println!("Log likelihood: {:.2}", self.log_likelihood);
        println!("Likelihood trend: {:+.4}", self.trend);
        println!("Topic diversity: {:.4}", self.diversity);
        if let Some(ll) = self.predictive {
            println!("Predictive log likelihood: {:.2}", ll);
        }
    }
}
