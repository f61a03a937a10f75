use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use dbpe::config::{CorpusFormat, EvalConfig, IngestConfig, TrainerConfig};
use dbpe::corpus::read_corpus_lines;
use dbpe::segmenter::load_segmenter;
use dbpe::{BpeModel, Evaluator, Trainer};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::ThreadPoolBuilder;
use serde_json::json;

const DEFAULT_ARTIFACT: &str = "tokenizer.json";
const DEFAULT_MERGES: &str = "merges.txt";

#[derive(Parser, Debug)]
#[command(author, version, about = "Defended BPE toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a defended tokenizer from text inputs
    Train(TrainArgs),
    /// Segment text with a trained tokenizer
    Tokenize(TokenizeArgs),
    /// Compare two tokenizers by token-boundary precision/recall/F1
    Evaluate(EvaluateArgs),
    /// Write the merge table as plain-text merges.txt
    ExtractMerges(ExtractMergesArgs),
    /// Inspect tokenizer metadata
    Info(InfoArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    /// Plain UTF-8 text
    Text,
    /// One JSON document per line
    Jsonl,
}

impl From<FormatArg> for CorpusFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Text => CorpusFormat::PlainText,
            FormatArg::Jsonl => CorpusFormat::JsonLines,
        }
    }
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Files or directories to ingest
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory receiving tokenizer.json
    #[arg(short, long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Number of merge steps
    #[arg(short = 'n', long, value_name = "COUNT")]
    num_merges: Option<usize>,

    /// Frequency merges between random merges (k)
    #[arg(short = 'k', long, value_name = "K", conflicts_with = "no_defense")]
    defense_interval: Option<usize>,

    /// Train plain BPE without random merges
    #[arg(long)]
    no_defense: bool,

    /// Seed for the random merge steps
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Corpus file format
    #[arg(long, value_enum, default_value = "text")]
    format: FormatArg,

    /// File extensions picked up inside directories (repeat flag)
    #[arg(long = "extension", value_name = "EXT")]
    extensions: Vec<String>,

    /// Emit pretty JSON
    #[arg(long)]
    pretty: bool,

    /// Also write merges.txt next to tokenizer.json
    #[arg(long)]
    write_merges: bool,

    /// Disable per-iteration logging/progress
    #[arg(long)]
    no_progress: bool,

    /// Limit Rayon worker threads
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,
}

#[derive(Args, Debug)]
struct TokenizeArgs {
    /// Tokenizer artifact to load
    #[arg(short = 'm', long, value_name = "PATH")]
    tokenizer: PathBuf,

    /// Read text from a file instead of the command line or stdin
    #[arg(short, long, value_name = "PATH", conflicts_with = "text")]
    input: Option<PathBuf>,

    /// Text to segment (stdin when omitted)
    text: Option<String>,

    /// Emit JSON instead of space-separated tokens
    #[arg(long)]
    json: bool,

    /// Report word and token counts
    #[arg(long)]
    stats: bool,

    /// Apply only the first COUNT merges of the table
    #[arg(long, value_name = "COUNT")]
    max_merges: Option<usize>,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Evaluation corpus, one line per example
    #[arg(short, long, value_name = "PATH")]
    file: PathBuf,

    /// Candidate tokenizer: `whitespace`, `words`, or a tokenizer file
    #[arg(short, long, value_name = "SPEC", default_value = DEFAULT_ARTIFACT)]
    candidate: String,

    /// Reference tokenizer: `whitespace`, `words`, or a tokenizer file
    #[arg(short, long, value_name = "SPEC", default_value = "words")]
    reference: String,

    /// Emit JSON
    #[arg(long)]
    json: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Limit Rayon worker threads
    #[arg(long, value_name = "N")]
    threads: Option<usize>,
}

#[derive(Args, Debug)]
struct ExtractMergesArgs {
    /// Tokenizer artifact to read
    #[arg(short = 'm', long, value_name = "PATH")]
    tokenizer: PathBuf,

    /// Destination merges.txt
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_MERGES)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Tokenizer artifact to inspect
    #[arg(short = 'm', long, value_name = "PATH")]
    tokenizer: PathBuf,

    /// Emit JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Tokenize(args) => run_tokenize(args),
        Commands::Evaluate(args) => run_evaluate(args),
        Commands::ExtractMerges(args) => run_extract_merges(args),
        Commands::Info(args) => run_info(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn configure_threads(threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("unable to configure Rayon thread pool")?;
    }
    Ok(())
}

fn load_model(path: &Path) -> Result<BpeModel> {
    BpeModel::load(path)
        .with_context(|| format!("failed to load tokenizer from {}", path.display()))
}

fn run_train(args: TrainArgs) -> Result<()> {
    configure_threads(args.threads)?;

    let mut cfg = TrainerConfig::builder();
    if let Some(num_merges) = args.num_merges {
        cfg = cfg.num_merges(num_merges);
    }
    if args.no_defense {
        cfg = cfg.defense_interval(None);
    } else if let Some(k) = args.defense_interval {
        cfg = cfg.defense_interval(Some(k));
    }
    cfg = cfg.seed(args.seed);
    cfg = cfg.show_progress(!args.no_progress);
    let trainer_cfg = cfg.build()?;

    let mut ingest = IngestConfig::builder()
        .recursive(!args.no_recursive)
        .follow_symlinks(args.follow_symlinks)
        .format(args.format.into());
    if !args.extensions.is_empty() {
        ingest = ingest.extensions(args.extensions.clone());
    } else if matches!(args.format, FormatArg::Jsonl) {
        ingest = ingest.extensions(["jsonl", "json"]);
    }
    let ingest_cfg = ingest.build();

    let spinner = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} training merges... {elapsed}")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let trainer = Trainer::new(trainer_cfg);
    let start = Instant::now();
    let artifacts = trainer
        .train_from_paths(&args.inputs, &ingest_cfg)
        .with_context(|| "failed to train on text corpus")?;
    if let Some(pb) = spinner {
        pb.finish_with_message("training complete");
    }
    let elapsed = start.elapsed();
    if artifacts.model.vocab().is_empty() {
        warn!("corpus contains no words; the merge table is empty");
    }

    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            args.output_dir.display()
        )
    })?;
    let output = args.output_dir.join(DEFAULT_ARTIFACT);
    artifacts
        .model
        .save(&output, args.pretty)
        .with_context(|| format!("failed to save tokenizer to {}", output.display()))?;
    if args.write_merges {
        let merges_path = args.output_dir.join(DEFAULT_MERGES);
        artifacts
            .model
            .save_merges_txt(&merges_path)
            .with_context(|| format!("failed to write {}", merges_path.display()))?;
    }

    let merges = artifacts.model.merges().len();
    let random = artifacts.metrics.defense_steps().len();
    info!(
        "training complete: merges={merges} random={random} stop={:?} duration={elapsed:.2?}",
        artifacts.metrics.stop_reason
    );
    println!(
        "wrote tokenizer with {} merges ({} random) to {}",
        merges,
        random,
        output.display()
    );

    Ok(())
}

fn run_tokenize(args: TokenizeArgs) -> Result<()> {
    let mut model = load_model(&args.tokenizer)?;
    if let Some(count) = args.max_merges {
        model = model.truncate_merges(count);
    }
    let tokenizer = model.tokenizer();

    let text = if let Some(path) = &args.input {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    } else if let Some(text) = args.text {
        text
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read stdin")?;
        buffer
    };

    let tokens = tokenizer.tokenize(&text);
    let stats = args.stats.then(|| tokenizer.stats(&text));
    if args.json {
        let mut record = json!({ "tokens": tokens });
        if let Some(stats) = stats {
            record["stats"] = serde_json::to_value(stats)?;
        }
        println!("{}", serde_json::to_string(&record)?);
    } else {
        println!("{}", tokens.join(" "));
        if let Some(stats) = stats {
            println!(
                "words {} | tokens {} | tokens/word {:.3}",
                stats.words, stats.tokens, stats.tokens_per_word
            );
        }
    }

    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    configure_threads(args.threads)?;

    let lines = read_corpus_lines(&args.file)
        .with_context(|| format!("failed to read corpus {}", args.file.display()))?;
    let candidate = load_segmenter(&args.candidate)
        .with_context(|| format!("failed to load candidate tokenizer {}", args.candidate))?;
    let reference = load_segmenter(&args.reference)
        .with_context(|| format!("failed to load reference tokenizer {}", args.reference))?;

    let evaluator = Evaluator::new(EvalConfig {
        show_progress: !args.no_progress,
        ..EvalConfig::default()
    });
    let report = evaluator.evaluate(&lines, candidate.as_ref(), reference.as_ref())?;

    if args.json {
        let summary = json!({
            "corpus": args.file.display().to_string(),
            "candidate": args.candidate,
            "reference": args.reference,
            "lines": report.lines,
            "precision": report.precision,
            "recall": report.recall,
            "f1": report.f1,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Lines    : {}", report.lines);
        println!("Precision: {:.4}", report.precision);
        println!("Recall   : {:.4}", report.recall);
        println!("F1       : {:.4}", report.f1);
    }

    Ok(())
}

fn run_extract_merges(args: ExtractMergesArgs) -> Result<()> {
    let model = load_model(&args.tokenizer)?;
    model
        .save_merges_txt(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "wrote {} merges to {}",
        model.merges().len(),
        args.output.display()
    );
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let model = load_model(&args.tokenizer)?;
    let vocab = model.vocab();
    let summary = json!({
        "path": args.tokenizer.display().to_string(),
        "merges": model.merges().len(),
        "vocab_entries": vocab.len(),
        "word_occurrences": vocab.total_frequency(),
        "symbols": vocab.symbol_count(),
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Merges          : {}", model.merges().len());
        println!("Vocab entries   : {}", vocab.len());
        println!("Word occurrences: {}", vocab.total_frequency());
        println!("Symbols         : {}", vocab.symbol_count());
    }

    Ok(())
}
