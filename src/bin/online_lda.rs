//! Online LDA CLI
//!
//! Fits a sequence of time slices and reports per-slice likelihoods and
//! topics, or runs the model on a synthetic drifting corpus.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use online_lda::models::online::OnlineLda;
use online_lda::preprocessing::matrix::DocTermMatrix;
use online_lda::utils::config::{Config, OnlineLdaConfig};
use online_lda::utils::evaluation::{self, SliceSummary};
use online_lda::utils::io::SliceDataset;
use online_lda::utils::synthetic::DriftingCorpus;
use online_lda::WeightingMode;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "online_lda")]
#[command(about = "Topic modeling over time slices with soft temporal alignment")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the slices of a JSON dataset in order
    Fit {
        /// Slice dataset (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Number of topics, overriding the config file
        #[arg(short = 'k', long)]
        topics: Option<usize>,

        /// Random seed, overriding the config file
        #[arg(short, long)]
        seed: Option<u64>,

        /// Terms shown per topic
        #[arg(long, default_value = "8")]
        top: usize,

        /// Score every slice under the model of the previous one
        #[arg(long)]
        evaluate: bool,
    },

    /// Run on a synthetic corpus whose topics drift between slices
    Demo {
        /// Number of slices
        #[arg(long, default_value = "4")]
        slices: usize,

        /// Number of topics
        #[arg(short = 'k', long, default_value = "3")]
        topics: usize,

        /// Vocabulary size
        #[arg(long, default_value = "30")]
        vocab: usize,

        /// Gibbs sweeps per slice
        #[arg(long, default_value = "200")]
        n_iter: usize,

        /// Alignment window size
        #[arg(short, long, default_value = "2")]
        window: usize,

        /// Offset weighting (similarity or decay)
        #[arg(long, default_value = "similarity")]
        weighting: WeightingMode,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Write the generated slices to this JSON file
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Write the default configuration to a TOML file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "online_lda.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level))
        .init();

    match cli.command {
        Commands::Fit {
            input,
            topics,
            seed,
            top,
            evaluate,
        } => {
            let mut model_config = config.model.clone();
            if let Some(k) = topics {
                model_config.n_topics = k;
            }
            if let Some(seed) = seed {
                model_config.random_seed = Some(seed);
            }
            model_config.evaluate_next_slice |= evaluate;
            fit_dataset(&input, model_config, top)?;
        }
        Commands::Demo {
            slices,
            topics,
            vocab,
            n_iter,
            window,
            weighting,
            seed,
            save,
        } => {
            let model_config = config
                .model
                .clone()
                .n_iter(n_iter)
                .window_size(window)
                .weighting(weighting)
                .random_seed(seed)
                .evaluate_next_slice(true);
            let model_config = OnlineLdaConfig {
                n_topics: topics,
                ..model_config
            };
            run_demo(slices, vocab, model_config, save)?;
        }
        Commands::InitConfig { output } => {
            Config::default().save(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

fn fit_dataset(input: &Path, config: OnlineLdaConfig, top: usize) -> Result<()> {
    let dataset = SliceDataset::load_json(input)
        .with_context(|| format!("failed to load slices from {}", input.display()))?;
    let slices = dataset.matrices()?;
    println!("Loaded {} slices from {}\n", slices.len(), input.display());

    let mut model = OnlineLda::new(config)?;
    model.fit(&slices)?;
    report(&model, &slices, &dataset.vocabulary, top);
    Ok(())
}

fn run_demo(
    n_slices: usize,
    vocab_size: usize,
    config: OnlineLdaConfig,
    save: Option<PathBuf>,
) -> Result<()> {
    println!("=== Online LDA on a drifting corpus ===\n");

    let seed = config.random_seed.unwrap_or_default();
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let generated = DriftingCorpus::new(config.n_topics, vocab_size).generate(n_slices, &mut rng)?;
    let vocabulary: Vec<String> = (0..vocab_size).map(|w| format!("w{}", w)).collect();

    if let Some(path) = save {
        let dense: Vec<_> = generated
            .slices
            .iter()
            .map(|s| s.to_token_lists().map(|t| t.to_matrix()))
            .collect::<Result<_, _>>()?;
        SliceDataset::from_dense(vocabulary.clone(), &dense).save_json(&path)?;
        println!("Saved generated slices to {}\n", path.display());
    }

    let mut model = OnlineLda::new(config)?;
    model.fit(&generated.slices)?;
    report(&model, &generated.slices, &vocabulary, 5);

    println!("True topics per slice:");
    for (t, topics) in generated.topic_word.iter().enumerate() {
        let terms: Vec<Vec<usize>> = evaluation::top_terms(topics, 5)
            .into_iter()
            .map(|topic| topic.into_iter().map(|(w, _)| w).collect())
            .collect();
        println!("  slice {}: {:?}", t, terms);
    }
    Ok(())
}

fn report(model: &OnlineLda, slices: &[DocTermMatrix], vocabulary: &[String], top: usize) {
    let term = |w: usize| vocabulary.get(w).cloned().unwrap_or_else(|| w.to_string());

    for (t, topic_word) in model.topic_word_history().iter().enumerate() {
        let top_terms = evaluation::top_terms(topic_word, top);
        let ids: Vec<Vec<usize>> = top_terms
            .iter()
            .map(|topic| topic.iter().map(|&(w, _)| w).collect())
            .collect();

        let summary = SliceSummary {
            slice: t,
            n_docs: slices[t].n_docs(),
            log_likelihood: model.loglikelihoods_train()[t],
            trend: evaluation::likelihood_trend(&model.likelihood_traces()[t]),
            diversity: evaluation::topic_diversity(&ids),
            predictive: t.checked_sub(1).and_then(|p| model.loglikelihoods_pred().get(p).copied()),
        };
        summary.print();

        let mut docs_per_topic = vec![0usize; topic_word.nrows()];
        for k in evaluation::dominant_topics(&model.doc_topic_history()[t]) {
            docs_per_topic[k] += 1;
        }
        println!("Documents per dominant topic: {:?}", docs_per_topic);

        for (k, topic) in top_terms.iter().enumerate() {
            let words: Vec<String> = topic
                .iter()
                .map(|&(w, p)| format!("{} ({:.3})", term(w), p))
                .collect();
            println!("  Topic {}: {}", k, words.join(", "));
        }

        if t > 0 {
            let drift = evaluation::topic_drift(&model.topic_word_history()[t - 1], topic_word, top);
            let formatted: Vec<String> = drift.iter().map(|d| format!("{:.2}", d)).collect();
            println!("  Top-term overlap with slice {}: [{}]", t - 1, formatted.join(", "));
        }
        println!();
    }
}
