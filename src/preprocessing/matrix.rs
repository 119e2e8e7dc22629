//! Document-term matrices and their token-list form
//!
//! A slice arrives as a matrix of non-negative integer counts (documents as
//! rows, vocabulary terms as columns), either dense or sparse. Both variants
//! are normalized to [`TokenLists`] at this boundary, so the sampler never
//! branches on the representation again.

use crate::models::lda::LdaError;
use log::warn;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Sparse document-term counts stored as `(doc, term, count)` triplets.
///
/// Triplets may come in any order and may repeat a cell; repeated cells are
/// summed when the matrix is converted to token lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseCounts {
    /// Number of documents (rows)
    pub n_docs: usize,
    /// Vocabulary size (columns)
    pub n_terms: usize,
    /// Non-zero entries
    pub entries: Vec<(usize, usize, f64)>,
}

impl SparseCounts {
    /// Create an empty sparse matrix with the given shape
    pub fn new(n_docs: usize, n_terms: usize) -> Self {
        Self {
            n_docs,
            n_terms,
            entries: Vec::new(),
        }
    }

    /// Build from triplets, rejecting out-of-range indices
    pub fn from_triplets(
        n_docs: usize,
        n_terms: usize,
        entries: Vec<(usize, usize, f64)>,
    ) -> Result<Self, LdaError> {
        let mut sparse = Self::new(n_docs, n_terms);
        for (doc, term, count) in entries {
            sparse.push(doc, term, count)?;
        }
        Ok(sparse)
    }

    /// Append a single entry
    pub fn push(&mut self, doc: usize, term: usize, count: f64) -> Result<(), LdaError> {
        self.check_bounds(doc, term)?;
        self.entries.push((doc, term, count));
        Ok(())
    }

    fn check_bounds(&self, doc: usize, term: usize) -> Result<(), LdaError> {
        if doc >= self.n_docs || term >= self.n_terms {
            return Err(LdaError::IndexOutOfBounds {
                doc,
                term,
                n_docs: self.n_docs,
                n_terms: self.n_terms,
            });
        }
        Ok(())
    }
}

/// A slice's document-term matrix in either representation
#[derive(Debug, Clone, PartialEq)]
pub enum DocTermMatrix {
    /// Dense counts, shape (n_docs, n_terms)
    Dense(Array2<f64>),
    /// Sparse triplet counts
    Sparse(SparseCounts),
}

impl From<Array2<f64>> for DocTermMatrix {
    fn from(matrix: Array2<f64>) -> Self {
        DocTermMatrix::Dense(matrix)
    }
}

impl From<Array2<usize>> for DocTermMatrix {
    fn from(matrix: Array2<usize>) -> Self {
        DocTermMatrix::Dense(matrix.mapv(|c| c as f64))
    }
}

impl From<SparseCounts> for DocTermMatrix {
    fn from(matrix: SparseCounts) -> Self {
        DocTermMatrix::Sparse(matrix)
    }
}

impl DocTermMatrix {
    /// Matrix shape as (n_docs, n_terms)
    pub fn shape(&self) -> (usize, usize) {
        match self {
            DocTermMatrix::Dense(m) => m.dim(),
            DocTermMatrix::Sparse(s) => (s.n_docs, s.n_terms),
        }
    }

    /// Number of documents
    pub fn n_docs(&self) -> usize {
        self.shape().0
    }

    /// Vocabulary size
    pub fn n_terms(&self) -> usize {
        self.shape().1
    }

    /// Validated non-zero cells as `(doc, term, count)`, ordered by document
    /// then term. Repeated sparse cells are merged.
    pub fn nonzero_counts(&self) -> Result<Vec<(usize, usize, usize)>, LdaError> {
        let mut cells = Vec::new();
        match self {
            DocTermMatrix::Dense(m) => {
                for ((doc, term), &value) in m.indexed_iter() {
                    let count = validate_count(doc, term, value)?;
                    if count > 0 {
                        cells.push((doc, term, count));
                    }
                }
            }
            DocTermMatrix::Sparse(s) => {
                for &(doc, term, value) in &s.entries {
                    s.check_bounds(doc, term)?;
                    let count = validate_count(doc, term, value)?;
                    if count > 0 {
                        cells.push((doc, term, count));
                    }
                }
                cells.sort_unstable_by_key(|&(doc, term, _)| (doc, term));
                cells.dedup_by(|next, kept| {
                    if next.0 == kept.0 && next.1 == kept.1 {
                        kept.2 += next.2;
                        true
                    } else {
                        false
                    }
                });
            }
        }
        Ok(cells)
    }

    /// Convert to token-list form.
    ///
    /// Fails on non-integer or negative counts and on a matrix holding no
    /// tokens. Empty documents and unused terms only produce a warning.
    pub fn to_token_lists(&self) -> Result<TokenLists, LdaError> {
        let (n_docs, n_terms) = self.shape();
        let cells = self.nonzero_counts()?;

        let n_tokens: usize = cells.iter().map(|&(_, _, c)| c).sum();
        if n_tokens == 0 {
            return Err(LdaError::EmptyMatrix);
        }

        let mut words = Vec::with_capacity(n_tokens);
        let mut docs = Vec::with_capacity(n_tokens);
        for &(doc, term, count) in &cells {
            words.extend(std::iter::repeat(term).take(count));
            docs.extend(std::iter::repeat(doc).take(count));
        }

        let tokens = TokenLists::from_sorted(words, docs, n_docs, n_terms);
        let empty_docs = tokens.empty_documents();
        if !empty_docs.is_empty() {
            warn!("all zero row in document-term matrix found ({} documents)", empty_docs.len());
        }
        let unused_terms = tokens.unused_terms();
        if !unused_terms.is_empty() {
            warn!("all zero column in document-term matrix found ({} terms)", unused_terms.len());
        }
        Ok(tokens)
    }
}

fn validate_count(doc: usize, term: usize, value: f64) -> Result<usize, LdaError> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(LdaError::NonIntegerCount { doc, term, value });
    }
    if value < 0.0 {
        return Err(LdaError::NegativeCount { doc, term, value });
    }
    Ok(value as usize)
}

/// Token-list representation of a slice.
///
/// `words[i]` is the vocabulary index and `docs[i]` the owning document of
/// the i-th token occurrence. Tokens are grouped by document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLists {
    words: Vec<usize>,
    docs: Vec<usize>,
    /// `doc_offsets[d]..doc_offsets[d + 1]` are the tokens of document `d`
    doc_offsets: Vec<usize>,
    vocab_size: usize,
}

impl TokenLists {
    fn from_sorted(words: Vec<usize>, docs: Vec<usize>, n_docs: usize, vocab_size: usize) -> Self {
        let mut doc_offsets = vec![0; n_docs + 1];
        for &doc in &docs {
            doc_offsets[doc + 1] += 1;
        }
        for d in 0..n_docs {
            doc_offsets[d + 1] += doc_offsets[d];
        }
        Self {
            words,
            docs,
            doc_offsets,
            vocab_size,
        }
    }

    /// Total number of token occurrences
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word id of every token
    pub fn words(&self) -> &[usize] {
        &self.words
    }

    /// Document id of every token
    pub fn docs(&self) -> &[usize] {
        &self.docs
    }

    pub fn n_docs(&self) -> usize {
        self.doc_offsets.len() - 1
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Word ids of a single document
    pub fn document(&self, doc: usize) -> &[usize] {
        &self.words[self.doc_offsets[doc]..self.doc_offsets[doc + 1]]
    }

    /// Number of tokens in each document
    pub fn doc_lengths(&self) -> Vec<usize> {
        self.doc_offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Documents without any token (all-zero rows)
    pub fn empty_documents(&self) -> Vec<usize> {
        self.doc_offsets
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[0] == w[1])
            .map(|(doc, _)| doc)
            .collect()
    }

    /// Vocabulary terms that never occur (all-zero columns)
    pub fn unused_terms(&self) -> Vec<usize> {
        let mut used = vec![false; self.vocab_size];
        for &word in &self.words {
            used[word] = true;
        }
        (0..self.vocab_size).filter(|&term| !used[term]).collect()
    }

    /// Rebuild the dense document-term matrix these lists were built from
    pub fn to_matrix(&self) -> Array2<f64> {
        let mut matrix = Array2::zeros((self.n_docs(), self.vocab_size));
        for (&word, &doc) in self.words.iter().zip(&self.docs) {
            matrix[[doc, word]] += 1.0;
        }
        matrix
    }

    pub(crate) fn into_parts(self) -> (Vec<usize>, Vec<usize>, usize, usize) {
        let n_docs = self.n_docs();
        (self.words, self.docs, n_docs, self.vocab_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dense_to_token_lists() {
        let matrix = DocTermMatrix::from(array![[1.0, 2.0], [0.0, 1.0]]);
        let tokens = matrix.to_token_lists().unwrap();

        assert_eq!(tokens.words(), &[0, 1, 1, 1]);
        assert_eq!(tokens.docs(), &[0, 0, 0, 1]);
        assert_eq!(tokens.doc_lengths(), vec![3, 1]);
        assert_eq!(tokens.document(1), &[1]);
    }

    #[test]
    fn test_sparse_matches_dense() {
        let dense = array![[1.0, 1.0], [2.0, 1.0], [3.0, 1.0]];
        let sparse = SparseCounts::from_triplets(
            3,
            2,
            vec![(2, 1, 1.0), (0, 0, 1.0), (1, 0, 2.0), (0, 1, 1.0), (1, 1, 1.0), (2, 0, 2.0), (2, 0, 1.0)],
        )
        .unwrap();

        let from_dense = DocTermMatrix::from(dense).to_token_lists().unwrap();
        let from_sparse = DocTermMatrix::from(sparse).to_token_lists().unwrap();
        assert_eq!(from_dense, from_sparse);
    }

    #[test]
    fn test_round_trip_to_matrix() {
        let dense = array![[1.0, 1.0], [2.0, 1.0], [3.0, 1.0], [4.0, 1.0], [5.0, 8.0], [6.0, 1.0]];
        let tokens = DocTermMatrix::from(dense.clone()).to_token_lists().unwrap();
        assert_eq!(tokens.len(), 34);
        assert_eq!(tokens.to_matrix(), dense);
    }

    #[test]
    fn test_rejects_non_integer_counts() {
        let matrix = DocTermMatrix::from(array![[1.0, 0.5]]);
        assert!(matches!(
            matrix.to_token_lists(),
            Err(LdaError::NonIntegerCount { doc: 0, term: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_negative_counts() {
        let matrix = DocTermMatrix::from(array![[1.0, -2.0]]);
        assert!(matches!(
            matrix.to_token_lists(),
            Err(LdaError::NegativeCount { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_matrix() {
        let matrix = DocTermMatrix::from(Array2::<f64>::zeros((3, 4)));
        assert!(matches!(matrix.to_token_lists(), Err(LdaError::EmptyMatrix)));

        let matrix = DocTermMatrix::from(Array2::<f64>::zeros((0, 0)));
        assert!(matches!(matrix.to_token_lists(), Err(LdaError::EmptyMatrix)));
    }

    #[test]
    fn test_zero_rows_are_kept() {
        let matrix = DocTermMatrix::from(array![[0.0, 0.0], [1.0, 0.0]]);
        let tokens = matrix.to_token_lists().unwrap();
        assert_eq!(tokens.n_docs(), 2);
        assert_eq!(tokens.doc_lengths(), vec![0, 1]);
        assert!(tokens.document(0).is_empty());
    }

    #[test]
    fn test_zero_rows_and_columns_are_reported() {
        let matrix = DocTermMatrix::from(array![[0.0, 2.0, 0.0, 1.0], [0.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]]);
        let tokens = matrix.to_token_lists().unwrap();
        assert_eq!(tokens.empty_documents(), vec![1]);
        assert_eq!(tokens.unused_terms(), vec![0, 2]);

        let full = DocTermMatrix::from(array![[1.0, 1.0], [2.0, 1.0]]).to_token_lists().unwrap();
        assert!(full.empty_documents().is_empty());
        assert!(full.unused_terms().is_empty());
    }

    #[test]
    fn test_sparse_out_of_bounds() {
        let mut sparse = SparseCounts::new(2, 2);
        assert!(sparse.push(2, 0, 1.0).is_err());
        assert!(sparse.push(0, 1, 1.0).is_ok());
    }
}
