//! Loading time-sliced document-term matrices
//!
//! A dataset is a JSON file holding an optional vocabulary and an ordered
//! list of slices, each either dense rows or sparse triplets:
//!
//! ```json
//! {
//!   "vocabulary": ["bitcoin", "ethereum"],
//!   "slices": [
//!     { "label": "2017-01", "dense": [[1, 0], [2, 3]] },
//!     { "label": "2017-02", "sparse": { "n_docs": 2, "n_terms": 2, "entries": [[0, 1, 4]] } }
//!   ]
//! }
//! ```

use crate::models::lda::LdaError;
use crate::preprocessing::matrix::{DocTermMatrix, SparseCounts};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Counts of one slice as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceCounts {
    /// One row of term counts per document
    Dense(Vec<Vec<f64>>),
    /// Triplet counts
    Sparse(SparseCounts),
}

/// One time slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceRecord {
    /// Free-form label such as a month
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub counts: SliceCounts,
}

impl SliceRecord {
    /// Convert to a document-term matrix, rejecting ragged dense rows
    pub fn to_matrix(&self) -> Result<DocTermMatrix, LdaError> {
        match &self.counts {
            SliceCounts::Dense(rows) => {
                let n_docs = rows.len();
                let n_terms = rows.first().map_or(0, Vec::len);
                if let Some((doc, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_terms) {
                    return Err(LdaError::DimensionMismatch(format!(
                        "row {} has {} terms, expected {}",
                        doc,
                        row.len(),
                        n_terms
                    )));
                }
                let flat: Vec<f64> = rows.iter().flatten().copied().collect();
                Array2::from_shape_vec((n_docs, n_terms), flat)
                    .map(DocTermMatrix::Dense)
                    .map_err(|e| LdaError::DimensionMismatch(e.to_string()))
            }
            SliceCounts::Sparse(sparse) => Ok(DocTermMatrix::Sparse(sparse.clone())),
        }
    }
}

/// An ordered collection of slices sharing one vocabulary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceDataset {
    #[serde(default)]
    pub vocabulary: Vec<String>,
    pub slices: Vec<SliceRecord>,
}

impl SliceDataset {
    /// Load dataset from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, LdaError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Save dataset to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), LdaError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Build a dataset from in-memory dense matrices
    pub fn from_dense(vocabulary: Vec<String>, matrices: &[Array2<f64>]) -> Self {
        let slices = matrices
            .iter()
            .map(|m| SliceRecord {
                label: None,
                counts: SliceCounts::Dense(m.rows().into_iter().map(|r| r.to_vec()).collect()),
            })
            .collect();
        Self { vocabulary, slices }
    }

    /// All slices as document-term matrices, in order
    pub fn matrices(&self) -> Result<Vec<DocTermMatrix>, LdaError> {
        self.slices.iter().map(SliceRecord::to_matrix).collect()
    }

    /// Term string for a vocabulary index, if a vocabulary is present
    pub fn term(&self, index: usize) -> Option<&str> {
        self.vocabulary.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}
