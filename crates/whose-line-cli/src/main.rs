use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use whose_line::{
    sample_misclassified, Analysis, AnalysisReport, Attribution, InspectionFilter, LambdaRule,
};
use whose_line_pre_processing::corpus::{load_corpus, DirSource, GutenbergSource};

#[derive(Parser)]
#[command(name = "whose-line")]
#[command(about = "Which novel did this line come from?", long_about = None)]
struct Cli {
    /// Works to classify between (exactly two; first is the positive class)
    #[arg(
        short = 'T',
        long = "title",
        num_args = 2,
        default_values = ["The War of the Worlds", "Pride and Prejudice"]
    )]
    titles: Vec<String>,

    /// Where to fetch the texts from
    #[arg(short, long, value_enum, default_value = "gutenberg")]
    source: Source,

    /// Directory holding {gutenberg_id}.txt files (with --source dir)
    #[arg(short, long, value_name = "PATH", required_if_eq("source", "dir"))]
    dir: Option<PathBuf>,

    /// Keep words occurring strictly more than this many times
    #[arg(long, default_value_t = 10)]
    min_count: usize,

    /// Fraction of lines used for training
    #[arg(long, default_value_t = 0.75)]
    train_fraction: f64,

    /// Cross-validation folds for lambda selection
    #[arg(short, long, default_value_t = 10)]
    folds: usize,

    /// Pick lambda.min instead of lambda.1se
    #[arg(long)]
    lambda_min: bool,

    /// Probability cutoff for hard predictions
    #[arg(short = 't', long, default_value_t = 0.5)]
    threshold: f64,

    /// Seed for the split, folds and inspection sampling
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Coefficient rows to print per direction
    #[arg(long, default_value_t = 15)]
    top_terms: usize,

    /// Sample this many confidently-wrong test lines for inspection
    #[arg(long, default_value_t = 0)]
    inspect: usize,

    /// Quiet mode (skip the descriptive word-frequency table)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy)]
enum Source {
    /// Fetch plain-text editions from gutenberg.org
    Gutenberg,
    /// Read {gutenberg_id}.txt files from --dir
    Dir,
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    /// Fixed-width tables
    Table,
    /// The whole report as JSON
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    let documents = match cli.source {
        Source::Gutenberg => load_corpus(&cli.titles, &GutenbergSource::new()),
        Source::Dir => {
            let dir = cli.dir.as_ref().expect("clap enforces --dir");
            load_corpus(&cli.titles, &DirSource::new(dir))
        }
    }
    .context("failed to load the corpus")?;

    let rule = if cli.lambda_min {
        LambdaRule::CrossValidatedMin { folds: cli.folds }
    } else {
        LambdaRule::CrossValidatedOneSe { folds: cli.folds }
    };
    let report = Analysis::new(documents)
        .with_min_count(cli.min_count)
        .with_train_fraction(cli.train_fraction)
        .with_threshold(cli.threshold)
        .with_seed(cli.seed)
        .with_lambda_rule(rule)
        .run()
        .context("analysis failed")?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_report(&report, &cli),
    }

    tracing::info!(elapsed = ?start.elapsed(), "Run complete");
    Ok(())
}

fn print_report(report: &AnalysisReport, cli: &Cli) {
    let positive = &report.class_labels.positive;
    let negative = &report.class_labels.negative;

    println!("Classifying: {positive} (positive) vs {negative} (negative)");
    println!(
        "Lambda: selected={:.6} min={} 1se={}",
        report.lambda.selected,
        report
            .lambda
            .min
            .map_or_else(|| "-".to_string(), |l| format!("{l:.6}")),
        report
            .lambda
            .one_se
            .map_or_else(|| "-".to_string(), |l| format!("{l:.6}")),
    );

    if !cli.quiet {
        println!("\nMost frequent words (stop words removed)");
        println!("{}", "-".repeat(34));
        for entry in &report.top_words {
            println!("{:>20} {:>8}", entry.word, entry.count);
        }
    }

    println!("\nCoefficients at the selected lambda");
    println!("{}", "=".repeat(34));
    println!("{:>20} {:>12}", "term", "estimate");
    println!("{}", "-".repeat(34));
    println!("{:>20} {:>12.4}", "(intercept)", report.coefficients.intercept);
    // terms are sorted by estimate, so the head leans toward the positive
    // work and the tail toward the negative one
    let terms = &report.coefficients.terms;
    let head = cli.top_terms.min(terms.len());
    let tail_start = terms.len().saturating_sub(cli.top_terms).max(head);
    for coef in &terms[..head] {
        println!("{:>20} {:>12.4}", coef.term, coef.estimate);
    }
    if tail_start > head {
        println!("{:>20} {:>12}", "...", "...");
    }
    for coef in &terms[tail_start..] {
        println!("{:>20} {:>12.4}", coef.term, coef.estimate);
    }

    println!("\nTest-set probabilities");
    println!("{}", "=".repeat(44));
    println!("{:>10} {:>14} {:>16}", "line", "P(positive)", "actually from");
    println!("{}", "-".repeat(44));
    for score in &report.scores {
        let actual = match score.actual {
            Attribution::Positive => positive,
            Attribution::Negative => negative,
        };
        println!("{:>10} {:>14.4} {:>16}", score.id, score.probability, actual);
    }

    match report.auc {
        Some(auc) => println!("\nAUC: {auc:.4}"),
        None => println!("\nAUC: undefined (test set contains a single class)"),
    }

    let cm = &report.confusion;
    println!("\nConfusion matrix (threshold {:.2})", cli.threshold);
    println!("{}", "=".repeat(52));
    println!("{:>24} {:>12} {:>12}", "", format!("pred {}", shorten(positive)), format!("pred {}", shorten(negative)));
    println!(
        "{:>24} {:>12} {:>12}",
        format!("true {}", shorten(positive)),
        cm.true_positive,
        cm.false_negative
    );
    println!(
        "{:>24} {:>12} {:>12}",
        format!("true {}", shorten(negative)),
        cm.false_positive,
        cm.true_negative
    );
    println!("Accuracy: {:.4} over {} test lines", cm.accuracy(), cm.total());

    if cli.inspect > 0 {
        let filter = InspectionFilter::overconfident_positive(0.8);
        let sampled = sample_misclassified(&report.scores, &filter, cli.inspect, cli.seed);
        println!(
            "\nConfidently '{positive}' but actually '{negative}' ({} sampled)",
            sampled.len()
        );
        for result in sampled {
            println!("  line {:>8}  P(positive)={:.4}", result.id, result.probability);
        }
    }
}

/// Last word of a title ("Worlds", "Prejudice"), enough to label
/// confusion-matrix columns.
fn shorten(title: &str) -> &str {
    title.split_whitespace().last().unwrap_or(title)
}
