//! Soft temporal alignment of topic-word distributions
//!
//! Builds the word-topic prior of slice `t` from the topic-word estimates
//! of slices `0..t`. For each of the most recent `window_size` slices the
//! per-topic similarity to the latest slice is the row-wise dot product of
//! the two topic-word matrices. Per topic, the similarities are turned into
//! weights over time offsets (a softmax, optionally multiplied by an
//! exponential decay), the slices are averaged with those weights, and the
//! result is blended with the latest slice:
//!
//! `prior = theta * latest + (1 - theta) * combined`
//!
//! Entries are floored at `f64::MIN_POSITIVE`. A term a topic never uses
//! shrinks by roughly the topic's token count every slice, and on a long
//! stream it would otherwise underflow to zero and invalidate the prior.

use super::lda::LdaError;
use log::info;
use ndarray::{Array2, Axis, Zip};
use serde::{Deserialize, Serialize};

/// How offsets within the window are weighted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightingMode {
    /// Softmax of the similarity scores
    #[default]
    Similarity,
    /// Softmax of the similarity scores times `exp(-k * (window - i - 1))`
    Decay,
}

impl std::fmt::Display for WeightingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightingMode::Similarity => write!(f, "similarity"),
            WeightingMode::Decay => write!(f, "decay"),
        }
    }
}

impl std::str::FromStr for WeightingMode {
    type Err = LdaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "similarity" => Ok(WeightingMode::Similarity),
            "decay" => Ok(WeightingMode::Decay),
            other => Err(LdaError::InvalidParameter(format!(
                "unknown weighting mode '{}'",
                other
            ))),
        }
    }
}

/// Soft aligner configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SoftAligner {
    window_size: usize,
    theta: f64,
    mode: WeightingMode,
    decay_rate: f64,
}

impl SoftAligner {
    /// Create an aligner.
    ///
    /// `window_size` must be positive and `theta` within `[0, 1]`.
    pub fn new(window_size: usize, theta: f64, mode: WeightingMode) -> Result<Self, LdaError> {
        if window_size == 0 {
            return Err(LdaError::InvalidParameter("window_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&theta) {
            return Err(LdaError::InvalidParameter(format!(
                "theta must be in [0, 1], got {}",
                theta
            )));
        }
        Ok(Self {
            window_size,
            theta,
            mode,
            decay_rate: 1.0,
        })
    }

    /// Set the decay rate `k` used in decay mode (default 1.0)
    pub fn decay_rate(mut self, k: f64) -> Result<Self, LdaError> {
        if !(k.is_finite() && k > 0.0) {
            return Err(LdaError::InvalidParameter(format!(
                "decay_rate must be positive, got {}",
                k
            )));
        }
        self.decay_rate = k;
        Ok(self)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn mode(&self) -> WeightingMode {
        self.mode
    }

    /// Number of history entries the window reaches
    pub fn n_offsets(&self, history_len: usize) -> usize {
        self.window_size.min(history_len)
    }

    /// Similarity of every topic between the latest slice and each offset:
    /// row `i` holds the row-wise dot products with `history[len - 1 - i]`.
    pub fn similarities(&self, history: &[Array2<f64>]) -> Result<Array2<f64>, LdaError> {
        let latest = latest(history)?;
        let n_offsets = self.n_offsets(history.len());
        let mut scores = Array2::zeros((n_offsets, latest.nrows()));

        for (i, mut row) in scores.outer_iter_mut().enumerate() {
            let past = &history[history.len() - 1 - i];
            if past.dim() != latest.dim() {
                return Err(LdaError::DimensionMismatch(format!(
                    "history entry {} is {:?}, latest is {:?}",
                    history.len() - 1 - i,
                    past.dim(),
                    latest.dim()
                )));
            }
            row.assign(&(latest * past).sum_axis(Axis(1)));
        }
        Ok(scores)
    }

    /// Weights over offsets, one column per topic; each column sums to 1
    pub fn weights(&self, history: &[Array2<f64>]) -> Result<Array2<f64>, LdaError> {
        let mut logits = self.similarities(history)?;

        if self.mode == WeightingMode::Decay {
            // the decay exponent uses the configured window even when
            // history is shorter
            for (i, mut row) in logits.outer_iter_mut().enumerate() {
                let decay = self.decay_rate * (self.window_size - i - 1) as f64;
                row -= decay;
            }
        }

        for mut column in logits.columns_mut() {
            let max = column.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            column.mapv_inplace(|v| (v - max).exp());
            let total = column.sum();
            column /= total;
        }
        Ok(logits)
    }

    /// Per-topic weighted sum of the history within the window
    pub fn combine(&self, history: &[Array2<f64>]) -> Result<Array2<f64>, LdaError> {
        let weights = self.weights(history)?;
        let latest = latest(history)?;
        let mut combined = Array2::zeros(latest.raw_dim());

        for (i, w) in weights.outer_iter().enumerate() {
            let past = &history[history.len() - 1 - i];
            let w = w.insert_axis(Axis(1));
            combined = combined + &w * past;
        }
        Ok(combined)
    }

    /// Word-topic prior for the next slice
    pub fn align(&self, history: &[Array2<f64>]) -> Result<Array2<f64>, LdaError> {
        let n_offsets = self.n_offsets(history.len());
        info!("Using {} weighting over {} slice(s).", self.mode, n_offsets);
        let latest = latest(history)?;

        // a single offset always gets weight 1
        if n_offsets == 1 {
            return Ok(latest.mapv(floor_positive));
        }

        let combined = self.combine(history)?;
        let theta = self.theta;
        Ok(Zip::from(latest)
            .and(&combined)
            .map_collect(|&l, &c| floor_positive(theta * l + (1.0 - theta) * c)))
    }
}

#[inline]
fn floor_positive(value: f64) -> f64 {
    value.max(f64::MIN_POSITIVE)
}

fn latest(history: &[Array2<f64>]) -> Result<&Array2<f64>, LdaError> {
    history.last().ok_or(LdaError::EmptyHistory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn history() -> Vec<Array2<f64>> {
        vec![
            array![[0.7, 0.2, 0.1], [0.1, 0.1, 0.8]],
            array![[0.5, 0.4, 0.1], [0.2, 0.2, 0.6]],
            array![[0.6, 0.3, 0.1], [0.3, 0.3, 0.4]],
        ]
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(SoftAligner::new(0, 0.5, WeightingMode::Similarity).is_err());
        assert!(SoftAligner::new(2, 1.5, WeightingMode::Similarity).is_err());
        assert!(SoftAligner::new(2, -0.1, WeightingMode::Decay).is_err());
        assert!(SoftAligner::new(2, 0.5, WeightingMode::Decay).unwrap().decay_rate(0.0).is_err());
    }

    #[test]
    fn test_empty_history() {
        let aligner = SoftAligner::new(2, 0.5, WeightingMode::Similarity).unwrap();
        assert!(matches!(aligner.align(&[]), Err(LdaError::EmptyHistory)));
    }

    #[test]
    fn test_similarities_are_row_dot_products() {
        let aligner = SoftAligner::new(2, 0.5, WeightingMode::Similarity).unwrap();
        let scores = aligner.similarities(&history()).unwrap();

        assert_eq!(scores.dim(), (2, 2));
        assert_abs_diff_eq!(scores[[0, 0]], 0.36 + 0.09 + 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(scores[[1, 0]], 0.30 + 0.12 + 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(scores[[1, 1]], 0.06 + 0.06 + 0.24, epsilon = 1e-12);
    }

    #[test]
    fn test_weights_normalize_per_topic() {
        for mode in [WeightingMode::Similarity, WeightingMode::Decay] {
            for window in 1..=5 {
                let aligner = SoftAligner::new(window, 0.5, mode).unwrap();
                let weights = aligner.weights(&history()).unwrap();
                assert_eq!(weights.nrows(), window.min(3));
                for column in weights.columns() {
                    assert_abs_diff_eq!(column.sum(), 1.0, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_similarity_weights_are_softmax() {
        let aligner = SoftAligner::new(2, 0.5, WeightingMode::Similarity).unwrap();
        let weights = aligner.weights(&history()).unwrap();

        let (a, b) = (0.46f64.exp(), 0.43f64.exp());
        assert_abs_diff_eq!(weights[[0, 0]], a / (a + b), epsilon = 1e-12);
        assert_abs_diff_eq!(weights[[1, 0]], b / (a + b), epsilon = 1e-12);
    }

    #[test]
    fn test_decay_weights() {
        let aligner = SoftAligner::new(2, 0.5, WeightingMode::Decay).unwrap();
        let weights = aligner.weights(&history()).unwrap();

        let a = 0.46f64.exp() * (-1.0f64).exp();
        let b = 0.43f64.exp();
        assert_abs_diff_eq!(weights[[0, 0]], a / (a + b), epsilon = 1e-12);
        assert_abs_diff_eq!(weights[[1, 0]], b / (a + b), epsilon = 1e-12);
    }

    #[test]
    fn test_window_one_is_latest() {
        for mode in [WeightingMode::Similarity, WeightingMode::Decay] {
            for theta in [0.0, 0.3, 0.5, 1.0] {
                let aligner = SoftAligner::new(1, theta, mode).unwrap();
                let hist = history();
                assert_eq!(aligner.combine(&hist).unwrap(), hist[2]);
                assert_eq!(aligner.align(&hist).unwrap(), hist[2]);
            }
        }
    }

    #[test]
    fn test_theta_boundaries() {
        let hist = history();
        let latest_only = SoftAligner::new(3, 1.0, WeightingMode::Similarity).unwrap();
        assert_eq!(latest_only.align(&hist).unwrap(), hist[2]);

        let combined_only = SoftAligner::new(3, 0.0, WeightingMode::Decay).unwrap();
        assert_eq!(
            combined_only.align(&hist).unwrap(),
            combined_only.combine(&hist).unwrap()
        );
    }

    #[test]
    fn test_blend_differs_from_latest() {
        let hist = history();
        let aligner = SoftAligner::new(2, 0.5, WeightingMode::Decay).unwrap();
        let prior = aligner.align(&hist).unwrap();

        assert_ne!(prior, hist[2]);
        for row in prior.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_single_entry_history_with_wide_window() {
        let hist = vec![history().remove(0)];
        let aligner = SoftAligner::new(4, 0.2, WeightingMode::Decay).unwrap();
        assert_eq!(aligner.align(&hist).unwrap(), hist[0]);
    }

    #[test]
    fn test_vanishing_entries_are_floored() {
        let hist = vec![array![[1.0, 0.0]], array![[1.0, 1e-320]]];
        for window in [1, 2] {
            let aligner = SoftAligner::new(window, 0.5, WeightingMode::Similarity).unwrap();
            let prior = aligner.align(&hist).unwrap();
            assert_eq!(prior[[0, 0]], 1.0);
            assert_eq!(prior[[0, 1]], f64::MIN_POSITIVE);
        }
    }

    #[test]
    fn test_mismatched_history() {
        let hist = vec![Array2::from_elem((2, 4), 0.25), history().remove(0)];
        let aligner = SoftAligner::new(2, 0.5, WeightingMode::Similarity).unwrap();
        assert!(matches!(aligner.align(&hist), Err(LdaError::DimensionMismatch(_))));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("decay".parse::<WeightingMode>().unwrap(), WeightingMode::Decay);
        assert_eq!("Similarity".parse::<WeightingMode>().unwrap(), WeightingMode::Similarity);
        assert!("cosine".parse::<WeightingMode>().is_err());
    }
}
