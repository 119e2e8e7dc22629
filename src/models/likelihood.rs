//! Complete-data log-likelihood
//!
//! `log p(w, z) = log p(w | z) + log p(z)` from the Dirichlet-multinomial
//! marginals, evaluated in the log domain with `ln_gamma` so large counts
//! do not overflow.

use super::lda::SlicePriors;
use super::state::CountState;
use statrs::function::gamma::ln_gamma;

/// Joint log-likelihood of the current assignments under `priors`
pub fn log_likelihood(state: &CountState, priors: &SlicePriors) -> f64 {
    let eta = priors.eta();
    let eta_sum = priors.eta_sum();
    let alpha = priors.alpha();
    let alpha_sum = priors.alpha_sum();

    let mut ll = 0.0;

    // log p(w | z)
    for (k, row) in state.nzw.outer_iter().enumerate() {
        ll += ln_gamma(eta_sum[k]) - ln_gamma(eta_sum[k] + f64::from(state.nz[k]));
        for (w, &count) in row.iter().enumerate() {
            if count > 0 {
                let prior = eta[[k, w]];
                ll += ln_gamma(prior + f64::from(count)) - ln_gamma(prior);
            }
        }
    }

    // log p(z)
    for (d, row) in state.ndz.outer_iter().enumerate() {
        let nd: u32 = row.sum();
        ll += ln_gamma(alpha_sum[d]) - ln_gamma(alpha_sum[d] + f64::from(nd));
        for (k, &count) in row.iter().enumerate() {
            if count > 0 {
                let prior = alpha[[d, k]];
                ll += ln_gamma(prior + f64::from(count)) - ln_gamma(prior);
            }
        }
    }

    ll
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::matrix::DocTermMatrix;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_single_token_closed_form() {
        // one token, one topic: p(w|z) = eta / (W * eta), p(z) = alpha / alpha
        let matrix = DocTermMatrix::from(array![[1.0, 0.0, 0.0]]);
        let state = CountState::initialize(matrix.to_token_lists().unwrap(), 1).unwrap();
        let priors = SlicePriors::flat(1, 1, 3, 0.1, 0.01).unwrap();

        let ll = log_likelihood(&state, &priors);
        assert_relative_eq!(ll, (1.0f64 / 3.0).ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_finite_for_large_counts() {
        let matrix = DocTermMatrix::from(array![[50_000.0, 20_000.0], [30_000.0, 90_000.0]]);
        let state = CountState::initialize(matrix.to_token_lists().unwrap(), 3).unwrap();
        let priors = SlicePriors::flat(2, 3, 2, 0.1, 0.01).unwrap();

        let ll = log_likelihood(&state, &priors);
        assert!(ll.is_finite());
        assert!(ll < 0.0);
    }

    #[test]
    fn test_concentrated_assignment_scores_higher() {
        let matrix = DocTermMatrix::from(array![[4.0, 0.0], [0.0, 4.0]]);
        let tokens = matrix.to_token_lists().unwrap();
        let priors = SlicePriors::flat(2, 2, 2, 0.1, 0.01).unwrap();

        // round robin mixes both topics in both documents
        let mixed = CountState::initialize(tokens, 2).unwrap();
        let mut separated = mixed.clone();
        for i in 0..separated.n_tokens() {
            let z = separated.docs[i];
            separated.remove(i);
            separated.add(i, z);
        }

        assert!(log_likelihood(&separated, &priors) > log_likelihood(&mixed, &priors));
    }
}
