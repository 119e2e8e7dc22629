//! Collapsed Gibbs sampler
//!
//! One call to [`sample_topics`] is one full sweep over every token of a
//! slice. The sweep is sequential: the conditional for token `i + 1` reads
//! the counts left behind by token `i`.

use super::lda::SlicePriors;
use super::state::CountState;
use rand::seq::SliceRandom;
use rand::Rng;

/// 1 MiB worth of f64 variates
pub const DEFAULT_POOL_SIZE: usize = 1024 * 1024 / 8;

/// Fixed-size pool of uniform variates in `[0, 1)`.
///
/// Drawn once, reshuffled once per sweep and read cyclically by token
/// position. When a slice has more tokens than the pool holds, draws wrap
/// around.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomPool {
    values: Vec<f64>,
}

impl RandomPool {
    /// Draw `size` uniform variates from `rng`
    pub fn new<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Self {
        let values = (0..size.max(1)).map(|_| rng.gen::<f64>()).collect();
        Self { values }
    }

    /// Permute the pool in place
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.values.shuffle(rng);
    }

    /// Variate for token position `i`
    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        self.values[i % self.values.len()]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resample the topic of every token once, in token order.
///
/// For token `i` with word `w` in document `d` the unnormalized conditional
/// of topic `k` is
/// `(nzw[k,w] + eta[k,w]) / (nz[k] + eta_sum[k]) * (ndz[d,k] + alpha[d,k])`,
/// computed after removing the token from the counts.
pub fn sample_topics(state: &mut CountState, priors: &SlicePriors, rands: &RandomPool) {
    let n_topics = state.n_topics();
    let eta = priors.eta();
    let eta_sum = priors.eta_sum();
    let alpha = priors.alpha();
    let mut dist_sum = vec![0.0; n_topics];

    for i in 0..state.n_tokens() {
        let (w, d) = state.remove(i);

        let mut dist_cum = 0.0;
        for (k, cum) in dist_sum.iter_mut().enumerate() {
            dist_cum += (f64::from(state.nzw[[k, w]]) + eta[[k, w]])
                / (f64::from(state.nz[k]) + eta_sum[k])
                * (f64::from(state.ndz[[d, k]]) + alpha[[d, k]]);
            *cum = dist_cum;
        }

        let r = rands.get(i) * dist_cum;
        let z_new = search_sorted(&dist_sum, r);
        state.add(i, z_new);
    }
}

/// First index whose cumulative value is at least `value`, clamped to the
/// last index
#[inline]
pub fn search_sorted(cumulative: &[f64], value: f64) -> usize {
    cumulative
        .partition_point(|&c| c < value)
        .min(cumulative.len().saturating_sub(1))
}
