use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use s2s_core::{get_max_epoch_model, CheckpointPaths, LocalRank, NoBarrier, Shuffle};
use s2s_data_provider::{
    load_and_cache_doc_examples, load_and_cache_examples, load_features, load_tokenizer,
    BatchIter, DatasetConfig, DocFeature, FeatureLoadOptions, RetrievalDocDataset, Seq2SeqDataset,
    Seq2SeqFeature,
};
use s2s_logging::{init_logging, LogOutput};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// How log lines are formatted on stderr.
    #[clap(long, value_enum, default_value_t = LogOutput::Console, global = true, env)]
    log_output: LogOutput,

    #[clap(long, default_value_t = Level::INFO, global = true, env)]
    log_level: Level,

    /// Also append every log line to this file.
    #[clap(long, global = true, env)]
    write_log: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes an example file and writes its feature cache.
    Cache {
        /// JSONL file of {"src": ..., "tgt": ...} examples, or one document per line with --doc.
        #[clap(long, env)]
        examples: PathBuf,

        /// Path to a tokenizer.json.
        #[clap(long, env)]
        tokenizer: PathBuf,

        /// Where to write the features. Without it nothing is cached.
        #[clap(long, env)]
        cache: Option<PathBuf>,

        /// Treat every line of the example file as a document.
        #[clap(long, default_value_t = false)]
        doc: bool,

        /// Seed for the one-time shuffle of seq2seq features.
        #[clap(long, default_value_t = 42, env)]
        seed: u64,

        #[clap(long, default_value_t = false)]
        no_shuffle: bool,

        #[clap(long, default_value_t = false)]
        no_progress: bool,
    },

    /// Prints the first batch a cached feature file produces, as JSON.
    Preview {
        /// TOML dataset config.
        #[clap(long, env)]
        config: PathBuf,

        #[clap(long, env)]
        cache: PathBuf,

        /// The cache holds document features.
        #[clap(long, default_value_t = false)]
        doc: bool,

        #[clap(long, default_value_t = 4)]
        batch_size: usize,

        /// Seed for the noise and span draws.
        #[clap(long, default_value_t = 42)]
        seed: u64,
    },

    /// Prints the newest epoch with both a model and an optimizer checkpoint.
    LatestCheckpoint {
        output_dir: PathBuf,
    },

    // Prints the help, optionally as markdown. Used for docs generation.
    #[clap(hide = true)]
    PrintAllHelp {
        #[arg(long, required = true)]
        markdown: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn cache(
    examples: &Path,
    tokenizer: &Path,
    cache: Option<&Path>,
    doc: bool,
    options: FeatureLoadOptions,
) -> Result<()> {
    let tokenizer = load_tokenizer(tokenizer)?;
    let count = if doc {
        load_and_cache_doc_examples(
            examples,
            &tokenizer,
            LocalRank::Standalone,
            &NoBarrier,
            cache,
            options,
        )?
        .len()
    } else {
        load_and_cache_examples(
            examples,
            &tokenizer,
            LocalRank::Standalone,
            &NoBarrier,
            cache,
            options,
        )?
        .len()
    };
    match cache {
        Some(path) => info!("{count} features cached in {}", path.display()),
        None => info!("{count} features built, no cache file given"),
    }
    Ok(())
}

fn preview(config: &Path, cache: &Path, doc: bool, batch_size: usize, seed: u64) -> Result<()> {
    let config = DatasetConfig::from_toml_file(config)?;
    let rng = ChaCha8Rng::seed_from_u64(seed);
    if doc {
        let dataset = RetrievalDocDataset::new(load_features::<DocFeature>(cache)?, config)?;
        match BatchIter::new(&dataset, batch_size, rng)?.next() {
            Some(batch) => print_json(&batch?),
            None => bail!("{} holds no documents", cache.display()),
        }
    } else {
        let dataset = Seq2SeqDataset::new(load_features::<Seq2SeqFeature>(cache)?, config)?;
        match BatchIter::new(&dataset, batch_size, rng)?.next() {
            Some(batch) => print_json(&batch?),
            None => bail!("{} yields no training instances", cache.display()),
        }
    }
}

fn latest_checkpoint(output_dir: &Path) -> Result<()> {
    let epoch = get_max_epoch_model(output_dir)
        .with_context(|| format!("couldn't look for checkpoints in {}", output_dir.display()))?;
    match epoch {
        Some(epoch) => {
            let paths = CheckpointPaths::for_epoch(output_dir, epoch);
            info!(
                "resuming would load {} and {}",
                paths.model.display(),
                paths.optimizer.display()
            );
            println!("{epoch}");
        }
        None => {
            info!("no complete checkpoint in {}", output_dir.display());
            println!("none");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Commands::PrintAllHelp { markdown } = args.command {
        // This is a required argument for the time being.
        assert!(markdown);

        let () = clap_markdown::print_help_markdown::<Args>();

        return Ok(());
    }

    init_logging(args.log_output, args.log_level, args.write_log)?;

    match args.command {
        Commands::Cache {
            examples,
            tokenizer,
            cache: cache_file,
            doc,
            seed,
            no_shuffle,
            no_progress,
        } => {
            let options = FeatureLoadOptions {
                shuffle: match no_shuffle || doc {
                    true => Shuffle::DontShuffle,
                    false => Shuffle::from_optional_seed(Some(seed)),
                },
                show_progress: !no_progress,
            };
            cache(&examples, &tokenizer, cache_file.as_deref(), doc, options)
        }
        Commands::Preview {
            config,
            cache,
            doc,
            batch_size,
            seed,
        } => preview(&config, &cache, doc, batch_size, seed),
        Commands::LatestCheckpoint { output_dir } => latest_checkpoint(&output_dir),
        Commands::PrintAllHelp { .. } => unreachable!("handled before logging starts"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_subcommands_with_global_log_flags() {
        let args = Args::try_parse_from([
            "s2s-preprocess",
            "latest-checkpoint",
            "out",
            "--log-output",
            "json",
        ])
        .unwrap();
        assert_eq!(args.log_output, LogOutput::Json);
        assert!(matches!(
            args.command,
            Commands::LatestCheckpoint { output_dir } if output_dir == Path::new("out")
        ));

        let args = Args::try_parse_from(["s2s-preprocess", "print-all-help", "--markdown"]).unwrap();
        assert!(matches!(args.command, Commands::PrintAllHelp { markdown: true }));
    }
}
