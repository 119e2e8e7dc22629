//! Online LDA over a sequence of time slices
//!
//! The first slice is fitted under flat priors. Every later slice gets its
//! word-topic prior from the soft aligner applied to the topic-word
//! estimates of all previous slices. A failing slice aborts the run, since
//! every later slice depends on the earlier posteriors.

use super::align::SoftAligner;
use super::gibbs::RandomPool;
use super::inference::{self, InferenceParams};
use super::lda::{LdaError, SliceFit, SliceFitter, SlicePriors};
use crate::preprocessing::matrix::DocTermMatrix;
use crate::utils::config::OnlineLdaConfig;
use crate::utils::evaluation;
use log::info;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Position of the orchestrator in the slice sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlineState {
    /// No slice fitted yet; the next slice uses flat priors
    Init,
    /// `slice` slices fitted; the next one uses the aligned prior
    Running { slice: usize },
    /// All slices consumed
    Terminal,
}

/// Online LDA model
#[derive(Debug)]
pub struct OnlineLda {
    config: OnlineLdaConfig,
    fitter: SliceFitter,
    aligner: SoftAligner,
    rng: StdRng,
    pool: RandomPool,
    state: OnlineState,
    /// Priors of the most recent slice
    priors: Option<SlicePriors>,
    /// Topic-word estimates per slice (B)
    topic_word_history: Vec<Array2<f64>>,
    /// Document-topic estimates per slice (A)
    doc_topic_history: Vec<Array2<f64>>,
    /// Final training log likelihood per slice
    loglikelihoods_train: Vec<f64>,
    /// Log likelihood trace recorded during each slice's sweeps
    likelihood_traces: Vec<Vec<f64>>,
    /// Predictive log likelihood of slice t+1 under slice t's model
    loglikelihoods_pred: Vec<f64>,
}

impl OnlineLda {
    /// Create a model whose generator comes from `random_seed`, or from
    /// entropy when no seed is configured
    pub fn new(config: OnlineLdaConfig) -> Result<Self, LdaError> {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }

    /// Create a model driven by an explicit generator
    pub fn with_rng(config: OnlineLdaConfig, mut rng: StdRng) -> Result<Self, LdaError> {
        config.validate()?;
        let fitter = SliceFitter::new(config.n_topics, config.n_iter, config.refresh)?;
        let aligner = SoftAligner::new(config.window_size, config.theta, config.weighting)?
            .decay_rate(config.decay_rate)?;
        let pool = RandomPool::new(config.pool_size, &mut rng);

        Ok(Self {
            config,
            fitter,
            aligner,
            rng,
            pool,
            state: OnlineState::Init,
            priors: None,
            topic_word_history: Vec::new(),
            doc_topic_history: Vec::new(),
            loglikelihoods_train: Vec::new(),
            likelihood_traces: Vec::new(),
            loglikelihoods_pred: Vec::new(),
        })
    }

    /// Fit every slice in order, then move to the terminal state
    pub fn fit(&mut self, slices: &[DocTermMatrix]) -> Result<&mut Self, LdaError> {
        for (t, slice) in slices.iter().enumerate() {
            self.partial_fit(slice)?;

            if self.config.evaluate_next_slice {
                if let Some(next) = slices.get(t + 1) {
                    let ll = self
                        .estimate_log_likelihood(next)
                        .map_err(|e| slice_error(t + 1, e))?;
                    info!("slice {} predictive log likelihood: {:.2}", t + 1, ll);
                    self.loglikelihoods_pred.push(ll);
                }
            }
        }
        self.finish();
        Ok(self)
    }

    /// Fit the next slice, returning its index
    pub fn partial_fit(&mut self, slice: &DocTermMatrix) -> Result<usize, LdaError> {
        let t = match self.state {
            OnlineState::Init => 0,
            OnlineState::Running { slice: next } => next,
            OnlineState::Terminal => return Err(LdaError::Finished),
        };

        let fit = self.fit_slice(slice).map_err(|e| slice_error(t, e))?;
        info!("slice {} done, log likelihood: {:.2}", t, fit.log_likelihood);

        self.loglikelihoods_train.push(fit.log_likelihood);
        self.likelihood_traces.push(fit.trace);
        self.topic_word_history.push(fit.topic_word);
        self.doc_topic_history.push(fit.doc_topic);
        self.state = OnlineState::Running { slice: t + 1 };
        Ok(t)
    }

    /// Fit `matrix` as the next slice and return its document-topic
    /// estimate. On a fresh model this is plain LDA under flat priors.
    pub fn fit_transform(&mut self, matrix: &DocTermMatrix) -> Result<Array2<f64>, LdaError> {
        self.partial_fit(matrix)?;
        self.doc_topic_history.last().cloned().ok_or(LdaError::NotFitted)
    }

    fn fit_slice(&mut self, slice: &DocTermMatrix) -> Result<SliceFit, LdaError> {
        let n_docs = slice.n_docs();
        let priors = if self.topic_word_history.is_empty() {
            SlicePriors::flat(
                n_docs,
                self.config.n_topics,
                slice.n_terms(),
                self.config.alpha,
                self.config.eta,
            )?
        } else {
            let eta = self.aligner.align(&self.topic_word_history)?;
            SlicePriors::with_eta(n_docs, self.config.alpha, eta)?
        };

        let fit = self.fitter.fit(slice, &priors, &self.pool, &mut self.rng)?;
        self.priors = Some(priors);
        Ok(fit)
    }

    /// Mark the sequence as complete
    pub fn finish(&mut self) {
        self.state = OnlineState::Terminal;
    }

    /// Topic proportions of new documents under the latest topic-word estimate
    pub fn transform(&self, matrix: &DocTermMatrix) -> Result<Array2<f64>, LdaError> {
        let topic_word = self.topic_word_history.last().ok_or(LdaError::NotFitted)?;
        inference::transform(topic_word, matrix, &self.inference_params())
    }

    /// Log likelihood of `matrix` under the latest model, with document
    /// proportions from held-out inference
    pub fn estimate_log_likelihood(&self, matrix: &DocTermMatrix) -> Result<f64, LdaError> {
        let topic_word = self.topic_word_history.last().ok_or(LdaError::NotFitted)?;
        let doc_topic = self.transform(matrix)?;
        evaluation::predictive_log_likelihood(&doc_topic, topic_word, matrix)
    }

    /// Per-token perplexity of `matrix` under the latest model
    pub fn perplexity(&self, matrix: &DocTermMatrix) -> Result<f64, LdaError> {
        let ll = self.estimate_log_likelihood(matrix)?;
        let n_tokens = matrix.to_token_lists()?.len();
        Ok(evaluation::perplexity(ll, n_tokens))
    }

    fn inference_params(&self) -> InferenceParams {
        InferenceParams {
            alpha: self.config.alpha,
            max_iter: self.config.transform_max_iter,
            tol: self.config.transform_tol,
        }
    }

    pub fn config(&self) -> &OnlineLdaConfig {
        &self.config
    }

    pub fn state(&self) -> OnlineState {
        self.state
    }

    /// Number of slices fitted so far
    pub fn n_slices(&self) -> usize {
        self.topic_word_history.len()
    }

    /// Priors used for the most recent slice
    pub fn current_priors(&self) -> Option<&SlicePriors> {
        self.priors.as_ref()
    }

    /// Topic-word estimate of every fitted slice
    pub fn topic_word_history(&self) -> &[Array2<f64>] {
        &self.topic_word_history
    }

    /// Document-topic estimate of every fitted slice
    pub fn doc_topic_history(&self) -> &[Array2<f64>] {
        &self.doc_topic_history
    }

    pub fn loglikelihoods_train(&self) -> &[f64] {
        &self.loglikelihoods_train
    }

    pub fn likelihood_traces(&self) -> &[Vec<f64>] {
        &self.likelihood_traces
    }

    pub fn loglikelihoods_pred(&self) -> &[f64] {
        &self.loglikelihoods_pred
    }
}

fn slice_error(slice: usize, source: LdaError) -> LdaError {
    LdaError::Slice {
        slice,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::align::WeightingMode;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn slices() -> Vec<DocTermMatrix> {
        vec![
            DocTermMatrix::from(array![[4.0, 3.0, 0.0, 0.0], [0.0, 0.0, 5.0, 2.0], [3.0, 4.0, 1.0, 0.0]]),
            DocTermMatrix::from(array![[5.0, 2.0, 0.0, 1.0], [0.0, 1.0, 4.0, 3.0]]),
            DocTermMatrix::from(array![[2.0, 5.0, 0.0, 0.0], [0.0, 0.0, 3.0, 5.0], [1.0, 1.0, 1.0, 1.0]]),
        ]
    }

    fn config() -> OnlineLdaConfig {
        OnlineLdaConfig::new(2)
            .n_iter(50)
            .refresh(5)
            .pool_size(256)
            .random_seed(1)
    }

    #[test]
    fn test_state_transitions() {
        let mut model = OnlineLda::new(config()).unwrap();
        assert_eq!(model.state(), OnlineState::Init);
        assert!(model.current_priors().is_none());

        let data = slices();
        assert_eq!(model.partial_fit(&data[0]).unwrap(), 0);
        assert_eq!(model.state(), OnlineState::Running { slice: 1 });
        assert_eq!(model.partial_fit(&data[1]).unwrap(), 1);
        assert_eq!(model.state(), OnlineState::Running { slice: 2 });

        model.finish();
        assert_eq!(model.state(), OnlineState::Terminal);
        assert!(matches!(model.partial_fit(&data[2]), Err(LdaError::Finished)));
    }

    #[test]
    fn test_first_slice_uses_flat_prior() {
        let mut model = OnlineLda::new(config()).unwrap();
        model.partial_fit(&slices()[0]).unwrap();

        let priors = model.current_priors().unwrap();
        assert!(priors.eta().iter().all(|&e| e == 0.01));
        assert!(priors.alpha().iter().all(|&a| a == 0.1));
    }

    #[test]
    fn test_later_slice_uses_aligned_prior() {
        let mut model = OnlineLda::new(config().window_size(1)).unwrap();
        let data = slices();
        model.partial_fit(&data[0]).unwrap();
        model.partial_fit(&data[1]).unwrap();

        // window 1 reduces the prior to the previous slice's estimate
        let priors = model.current_priors().unwrap();
        assert_eq!(priors.eta(), &model.topic_word_history()[0]);
        assert_eq!(priors.alpha().dim(), (2, 2));
    }

    #[test]
    fn test_histories_grow_per_slice() {
        let mut model = OnlineLda::new(config().window_size(2).weighting(WeightingMode::Decay)).unwrap();
        model.fit(&slices()).unwrap();

        assert_eq!(model.state(), OnlineState::Terminal);
        assert_eq!(model.n_slices(), 3);
        assert_eq!(model.doc_topic_history().len(), 3);
        assert_eq!(model.loglikelihoods_train().len(), 3);
        assert_eq!(model.likelihood_traces()[0].len(), 10);
        assert!(model.loglikelihoods_pred().is_empty());

        for (a, n_docs) in model.doc_topic_history().iter().zip([3, 2, 3]) {
            assert_eq!(a.dim(), (n_docs, 2));
            for row in a.rows() {
                assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_predictive_likelihood_recorded() {
        let mut model = OnlineLda::new(config().evaluate_next_slice(true)).unwrap();
        model.fit(&slices()).unwrap();

        assert_eq!(model.loglikelihoods_pred().len(), 2);
        assert!(model.loglikelihoods_pred().iter().all(|ll| ll.is_finite() && *ll < 0.0));
    }

    #[test]
    fn test_bad_slice_is_fatal() {
        let mut data = slices();
        data[1] = DocTermMatrix::from(array![[1.5, 0.0, 0.0, 0.0]]);

        let mut model = OnlineLda::new(config()).unwrap();
        let err = model.fit(&data).unwrap_err();
        assert!(matches!(err, LdaError::Slice { slice: 1, .. }));
        assert_eq!(model.n_slices(), 1);
    }

    #[test]
    fn test_non_finite_likelihood_aborts_run() {
        let mut model = OnlineLda::new(config().eta(1e308)).unwrap();
        let slice = DocTermMatrix::from(array![[1.0, 2.0], [3.0, 0.0]]);

        let err = model.partial_fit(&slice).unwrap_err();
        match err {
            LdaError::Slice { slice: 0, source } => {
                assert!(matches!(*source, LdaError::NonFiniteLikelihood { iteration: 0, .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(model.n_slices(), 0);
        assert_eq!(model.state(), OnlineState::Init);
    }

    #[test]
    fn test_long_stream_keeps_unused_terms_positive() {
        let config = OnlineLdaConfig::new(1).n_iter(1).pool_size(16).random_seed(3);
        let mut model = OnlineLda::new(config).unwrap();
        let slices = vec![DocTermMatrix::from(array![[10_000.0, 0.0]]); 100];

        model.fit(&slices).unwrap();
        assert_eq!(model.n_slices(), 100);
        let eta = model.current_priors().unwrap().eta();
        assert_eq!(eta[[0, 1]], f64::MIN_POSITIVE);
    }

    #[test]
    fn test_transform_limits_reach_inference() {
        let model = OnlineLda::new(config().transform_limits(3, 1e-6)).unwrap();
        let params = model.inference_params();
        assert_eq!(params.max_iter, 3);
        assert_eq!(params.tol, 1e-6);
        assert_eq!(params.alpha, 0.1);
    }

    #[test]
    fn test_vocabulary_change_is_fatal() {
        let mut model = OnlineLda::new(config()).unwrap();
        model.partial_fit(&slices()[0]).unwrap();

        let wider = DocTermMatrix::from(array![[1.0, 1.0, 1.0, 1.0, 1.0]]);
        assert!(matches!(
            model.partial_fit(&wider),
            Err(LdaError::Slice { slice: 1, .. })
        ));
    }

    #[test]
    fn test_fit_transform_single_matrix() {
        let data = slices();
        let mut model = OnlineLda::new(config()).unwrap();
        let doc_topic = model.fit_transform(&data[0]).unwrap();

        assert_eq!(doc_topic.dim(), (3, 2));
        assert_eq!(&doc_topic, &model.doc_topic_history()[0]);
        assert_eq!(model.state(), OnlineState::Running { slice: 1 });

        let held_out = model.transform(&data[1]).unwrap();
        assert_eq!(held_out.dim(), (2, 2));
        assert!(model.perplexity(&data[1]).unwrap() > 1.0);
    }

    #[test]
    fn test_transform_requires_fit() {
        let model = OnlineLda::new(config()).unwrap();
        assert!(matches!(model.transform(&slices()[0]), Err(LdaError::NotFitted)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(OnlineLda::new(config().theta(-1.0)).is_err());
        assert!(OnlineLda::new(OnlineLdaConfig::new(0)).is_err());
    }
}
