//! Synthetic corpora with drifting topics
//!
//! Topics start as Dirichlet draws over the vocabulary. Between slices every
//! topic moves towards a fresh draw by `drift`, so consecutive slices share
//! most of their structure while the topics slowly change. Documents are
//! generated by the usual LDA process: topic proportions from a Dirichlet,
//! then a topic and a word per token.

use crate::models::lda::LdaError;
use crate::preprocessing::matrix::DocTermMatrix;
use log::debug;
use ndarray::{Array1, Array2};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_distr::Dirichlet;

/// Generator settings
#[derive(Debug, Clone, PartialEq)]
pub struct DriftingCorpus {
    /// Number of true topics
    pub n_topics: usize,
    /// Vocabulary size
    pub vocab_size: usize,
    /// Documents per slice
    pub n_docs: usize,
    /// Tokens per document
    pub doc_length: usize,
    /// Share of each topic replaced by a fresh draw between slices
    pub drift: f64,
    /// Concentration of the document-topic Dirichlet
    pub doc_concentration: f64,
    /// Concentration of the topic-word Dirichlet
    pub topic_concentration: f64,
}

impl Default for DriftingCorpus {
    fn default() -> Self {
        Self {
            n_topics: 3,
            vocab_size: 30,
            n_docs: 40,
            doc_length: 50,
            drift: 0.1,
            doc_concentration: 0.2,
            topic_concentration: 0.05,
        }
    }
}

/// Generated slices and the topics that produced them
#[derive(Debug, Clone)]
pub struct SyntheticSlices {
    pub slices: Vec<DocTermMatrix>,
    /// True topic-word matrix of each slice
    pub topic_word: Vec<Array2<f64>>,
}

impl DriftingCorpus {
    pub fn new(n_topics: usize, vocab_size: usize) -> Self {
        Self {
            n_topics,
            vocab_size,
            ..Default::default()
        }
    }

    /// Set documents per slice and tokens per document
    pub fn documents(mut self, n_docs: usize, doc_length: usize) -> Self {
        self.n_docs = n_docs;
        self.doc_length = doc_length;
        self
    }

    /// Set the per-slice drift
    pub fn drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    fn validate(&self) -> Result<(), LdaError> {
        if self.n_topics == 0 {
            return Err(LdaError::InvalidTopicCount);
        }
        if self.vocab_size < 2 {
            return Err(LdaError::InvalidParameter("vocab_size must be at least 2".into()));
        }
        if self.n_docs == 0 || self.doc_length == 0 {
            return Err(LdaError::InvalidParameter("documents must be non-empty".into()));
        }
        if !(0.0..=1.0).contains(&self.drift) {
            return Err(LdaError::InvalidParameter("drift must be in [0, 1]".into()));
        }
        if !(self.doc_concentration > 0.0 && self.topic_concentration > 0.0) {
            return Err(LdaError::InvalidParameter("concentrations must be positive".into()));
        }
        Ok(())
    }

    /// Generate `n_slices` slices
    pub fn generate<R: Rng + ?Sized>(
        &self,
        n_slices: usize,
        rng: &mut R,
    ) -> Result<SyntheticSlices, LdaError> {
        self.validate()?;

        let mut topics = self.draw_topics(rng)?;
        let mut slices = Vec::with_capacity(n_slices);
        let mut topic_word = Vec::with_capacity(n_slices);

        for t in 0..n_slices {
            if t > 0 {
                let fresh = self.draw_topics(rng)?;
                topics = &topics * (1.0 - self.drift) + &fresh * self.drift;
            }
            slices.push(self.sample_slice(&topics, rng)?);
            topic_word.push(topics.clone());
            debug!("generated slice {} with {} documents", t, self.n_docs);
        }

        Ok(SyntheticSlices { slices, topic_word })
    }

    fn draw_topics<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array2<f64>, LdaError> {
        let mut topics = Array2::zeros((self.n_topics, self.vocab_size));
        for mut row in topics.rows_mut() {
            let draw = dirichlet(self.topic_concentration, self.vocab_size, rng)?;
            row.assign(&draw);
        }
        Ok(topics)
    }

    fn sample_slice<R: Rng + ?Sized>(
        &self,
        topics: &Array2<f64>,
        rng: &mut R,
    ) -> Result<DocTermMatrix, LdaError> {
        let word_dists = topics
            .rows()
            .into_iter()
            .map(|row| WeightedIndex::new(row.iter()).map_err(sampling_error))
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = Array2::<f64>::zeros((self.n_docs, self.vocab_size));
        for mut doc in counts.rows_mut() {
            let proportions = dirichlet(self.doc_concentration, self.n_topics, rng)?;
            let topic_dist = WeightedIndex::new(proportions.iter()).map_err(sampling_error)?;
            for _ in 0..self.doc_length {
                let z = topic_dist.sample(rng);
                let w = word_dists[z].sample(rng);
                doc[w] += 1.0;
            }
        }
        Ok(DocTermMatrix::Dense(counts))
    }
}

/// Symmetric Dirichlet draw; a single category always gets everything
fn dirichlet<R: Rng + ?Sized>(
    concentration: f64,
    dim: usize,
    rng: &mut R,
) -> Result<Array1<f64>, LdaError> {
    if dim == 1 {
        return Ok(Array1::ones(1));
    }
    let dist = Dirichlet::new(&vec![concentration; dim]).map_err(sampling_error)?;
    Ok(Array1::from(dist.sample(rng)))
}

fn sampling_error<E: std::fmt::Display>(e: E) -> LdaError {
    LdaError::InvalidParameter(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;

    #[test]
    fn test_generate_shapes() {
        let mut rng = StdRng::seed_from_u64(3);
        let corpus = DriftingCorpus::new(3, 12).documents(8, 20);
        let generated = corpus.generate(4, &mut rng).unwrap();

        assert_eq!(generated.slices.len(), 4);
        assert_eq!(generated.topic_word.len(), 4);
        for (slice, topics) in generated.slices.iter().zip(&generated.topic_word) {
            assert_eq!(slice.shape(), (8, 12));
            let tokens = slice.to_token_lists().unwrap();
            assert_eq!(tokens.doc_lengths(), vec![20; 8]);
            for row in topics.rows() {
                assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_zero_drift_keeps_topics() {
        let mut rng = StdRng::seed_from_u64(5);
        let generated = DriftingCorpus::new(2, 10).drift(0.0).generate(3, &mut rng).unwrap();
        assert_eq!(generated.topic_word[0], generated.topic_word[2]);
    }

    #[test]
    fn test_single_topic() {
        let mut rng = StdRng::seed_from_u64(0);
        let generated = DriftingCorpus::new(1, 5).documents(2, 4).generate(1, &mut rng).unwrap();
        assert_eq!(generated.slices[0].to_token_lists().unwrap().len(), 8);
    }

    #[test]
    fn test_invalid_settings() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(DriftingCorpus::new(0, 5).generate(1, &mut rng).is_err());
        assert!(DriftingCorpus::new(2, 1).generate(1, &mut rng).is_err());
        assert!(DriftingCorpus::new(2, 5).drift(1.5).generate(1, &mut rng).is_err());
    }
}
