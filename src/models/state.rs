//! Count state for collapsed Gibbs sampling
//!
//! Holds the token-level topic assignments of one slice together with the
//! count matrices derived from them. The state is exclusively owned by the
//! slice fitter while it runs and is consumed when point estimates are
//! derived, which drops the token buffers.

use super::lda::{LdaError, SlicePriors};
use crate::preprocessing::matrix::TokenLists;
use log::info;
use ndarray::{Array1, Array2, Axis};

/// Token assignments plus topic-word, document-topic and topic-total counts
#[derive(Debug, Clone)]
pub struct CountState {
    /// Word id of each token
    pub(crate) words: Vec<usize>,
    /// Document id of each token
    pub(crate) docs: Vec<usize>,
    /// Current topic of each token
    pub(crate) topics: Vec<usize>,
    /// Topic-word counts: n_topics x vocab_size
    pub(crate) nzw: Array2<u32>,
    /// Document-topic counts: n_docs x n_topics
    pub(crate) ndz: Array2<u32>,
    /// Tokens assigned to each topic
    pub(crate) nz: Array1<u32>,
}

impl CountState {
    /// Allocate counts for `tokens` and assign topic `i mod n_topics` to the
    /// i-th token.
    ///
    /// The initial assignment is deterministic so it does not consume the
    /// random stream.
    pub fn initialize(tokens: TokenLists, n_topics: usize) -> Result<Self, LdaError> {
        if n_topics == 0 {
            return Err(LdaError::InvalidTopicCount);
        }
        if tokens.is_empty() {
            return Err(LdaError::EmptyMatrix);
        }

        let (words, docs, n_docs, vocab_size) = tokens.into_parts();
        info!("n_documents: {}", n_docs);
        info!("vocab_size: {}", vocab_size);
        info!("n_words: {}", words.len());
        info!("n_topics: {}", n_topics);

        let mut nzw = Array2::zeros((n_topics, vocab_size));
        let mut ndz = Array2::zeros((n_docs, n_topics));
        let mut nz = Array1::zeros(n_topics);
        let mut topics = Vec::with_capacity(words.len());

        for (i, (&w, &d)) in words.iter().zip(&docs).enumerate() {
            let z = i % n_topics;
            topics.push(z);
            nzw[[z, w]] += 1;
            ndz[[d, z]] += 1;
            nz[z] += 1;
        }

        Ok(Self {
            words,
            docs,
            topics,
            nzw,
            ndz,
            nz,
        })
    }

    pub fn n_topics(&self) -> usize {
        self.nz.len()
    }

    pub fn n_docs(&self) -> usize {
        self.ndz.nrows()
    }

    pub fn vocab_size(&self) -> usize {
        self.nzw.ncols()
    }

    /// Total number of tokens
    pub fn n_tokens(&self) -> usize {
        self.topics.len()
    }

    pub fn topic_word_counts(&self) -> &Array2<u32> {
        &self.nzw
    }

    pub fn doc_topic_counts(&self) -> &Array2<u32> {
        &self.ndz
    }

    pub fn topic_counts(&self) -> &Array1<u32> {
        &self.nz
    }

    /// Current topic assignment of every token
    pub fn assignments(&self) -> &[usize] {
        &self.topics
    }

    /// Document lengths derived from the document-topic counts
    pub fn doc_lengths(&self) -> Array1<u32> {
        self.ndz.sum_axis(Axis(1))
    }

    /// Take token `i` out of the counts, returning its `(word, doc)`
    #[inline]
    pub(crate) fn remove(&mut self, i: usize) -> (usize, usize) {
        let (w, d, z) = (self.words[i], self.docs[i], self.topics[i]);
        self.nzw[[z, w]] -= 1;
        self.ndz[[d, z]] -= 1;
        self.nz[z] -= 1;
        (w, d)
    }

    /// Put token `i` back into the counts under topic `z`
    #[inline]
    pub(crate) fn add(&mut self, i: usize, z: usize) {
        let (w, d) = (self.words[i], self.docs[i]);
        self.topics[i] = z;
        self.nzw[[z, w]] += 1;
        self.ndz[[d, z]] += 1;
        self.nz[z] += 1;
    }

    /// Recount from the assignment sequence and compare with the live counts
    pub fn is_consistent(&self) -> bool {
        let mut nzw = Array2::<u32>::zeros(self.nzw.dim());
        let mut ndz = Array2::<u32>::zeros(self.ndz.dim());
        let mut nz = Array1::<u32>::zeros(self.nz.len());
        for ((&w, &d), &z) in self.words.iter().zip(&self.docs).zip(&self.topics) {
            nzw[[z, w]] += 1;
            ndz[[d, z]] += 1;
            nz[z] += 1;
        }
        nzw == self.nzw
            && ndz == self.ndz
            && nz == self.nz
            && self.nzw.sum_axis(Axis(1)) == self.nz
    }

    /// Consume the state and derive the Dirichlet-smoothed point estimates
    /// `(topic_word, doc_topic)`, each row-normalized.
    pub fn into_estimates(self, priors: &SlicePriors) -> (Array2<f64>, Array2<f64>) {
        let topic_word = normalize_rows(self.nzw.mapv(f64::from) + priors.eta());
        let doc_topic = normalize_rows(self.ndz.mapv(f64::from) + priors.alpha());
        (topic_word, doc_topic)
    }
}

/// Divide every row by its sum
pub(crate) fn normalize_rows(mut matrix: Array2<f64>) -> Array2<f64> {
    for mut row in matrix.rows_mut() {
        let total = row.sum();
        if total > 0.0 {
            row /= total;
        }
    }
    matrix
}
