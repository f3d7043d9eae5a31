//! pocc - change-preserving class breaks for multi-temporal data

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use pocc::classify::{
    ClassifyParams, EquidistantClassification, PoccClassification, ProgressSink, SearchMode,
    SearchOptions, SearchPlan, equidistant_classify,
};
use pocc::data::loader::{InputKind, LoadOptions, LoadedDataset, load_file};
use pocc::data::model::DEFAULT_NODATA;
use pocc::export::write_classified_geojson;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pocc")]
#[command(
    version,
    about = "Calculate change-preserving class breaks for a multi-temporal dataset",
    long_about = None
)]
struct Cli {
    /// The csv or geojson input file
    filename: PathBuf,

    /// Number of classes
    classes: usize,

    /// Desired class difference for 'significant' change
    #[arg(short, default_value_t = 0.05)]
    p: f64,

    /// Value that indicates missing data
    #[arg(long, default_value_t = DEFAULT_NODATA, allow_negative_numbers = true)]
    nodata: f64,

    /// csv only. The column in which the time series data begins, 0-indexed
    #[arg(long)]
    startcolumn: Option<usize>,

    /// csv only. Field delimiter
    #[arg(long, default_value_t = ';')]
    delimiter: char,

    /// geojson only. Names of the properties that contain data values
    #[arg(long, num_args = 1..)]
    keys: Option<Vec<String>>,

    /// geojson only. Name of the property that contains a list of data
    #[arg(long)]
    vkey: Option<String>,

    /// geojson only. Name of the property that contains a list of names for the data columns
    #[arg(long)]
    kkey: Option<String>,

    /// Search combinations on all cores
    #[arg(long)]
    parallel: bool,

    /// Abort the search after this many seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// geojson only. Write the classified features to this file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_options(&self) -> Result<LoadOptions> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character");
        }
        Ok(LoadOptions {
            nodata: self.nodata,
            start_column: self.startcolumn,
            delimiter: self.delimiter as u8,
            keys: self.keys.clone(),
            values_key: self.vkey.clone(),
            keys_key: self.kkey.clone(),
        })
    }

    fn search_options(&self) -> Result<SearchOptions> {
        let mut opts = SearchOptions::default();
        if self.parallel {
            opts = opts.with_mode(SearchMode::Parallel);
        }
        if let Some(secs) = self.timeout {
            let limit = Duration::try_from_secs_f64(secs)
                .with_context(|| format!("invalid timeout: {secs}"))?;
            opts = opts.with_time_limit(limit);
        }
        Ok(opts)
    }
}

// ─── Report ─────────────────────────────────────────────────────────────

/// What is known about the input before the break search starts.
#[derive(Serialize)]
struct Summary {
    rows: usize,
    epochs: usize,
    value_range: Option<(f64, f64)>,
    intervals: usize,
    candidate_positions: usize,
    combinations: Option<String>,
    equidistant: EquidistantClassification,
}

impl Summary {
    fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("{} rows", self.rows),
            format!("{} epochs", self.epochs),
        ];
        lines.push(match self.value_range {
            Some((min, max)) => format!("value range: [{min}-{max}]"),
            None => "value range: (no data)".to_string(),
        });
        lines.push(format!("intervals: {}", self.intervals));
        lines.push(format!("possible break positions: {}", self.candidate_positions));
        if let Some(c) = &self.combinations {
            lines.push(format!("combinations: {c}"));
        }
        lines.push(format!("equidistant: {:?}", self.equidistant.boundaries));
        lines
    }
}

#[derive(Serialize)]
struct Report {
    #[serde(flatten)]
    summary: Summary,
    pocc: PoccClassification,
}

fn pocc_line(pocc: &PoccClassification) -> String {
    format!("pocc-based: breaks {:?}, POCC = {}", pocc.thresholds, pocc.score)
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .init();
}

/// Progress bar fed by the search engine.
struct BarSink(ProgressBar);

impl ProgressSink for BarSink {
    fn on_start(&self, total: Option<u128>) {
        if let Some(total) = total.and_then(|t| u64::try_from(t).ok()) {
            self.0.set_length(total);
        }
    }

    fn on_advance(&self, evaluated: u64) {
        self.0.inc(evaluated);
    }

    fn on_finish(&self) {
        self.0.finish_and_clear();
    }
}

fn progress_bar(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta})")
    {
        pb.set_style(style);
    }
    pb
}

fn run(cli: &Cli) -> Result<()> {
    let kind = InputKind::from_path(&cli.filename)?;
    if cli.export.is_some() && kind != InputKind::FeatureCollection {
        bail!("--export needs geojson input");
    }
    let params = ClassifyParams {
        num_classes: cli.classes,
        p: cli.p,
    };
    params.validate()?;

    let LoadedDataset {
        dataset,
        geometries,
    } = load_file(&cli.filename, &cli.load_options()?)
        .with_context(|| format!("loading {}", cli.filename.display()))?;
    log::info!(
        "{} rows, {} epochs",
        dataset.num_units(),
        dataset.num_epochs()
    );

    let equidistant = equidistant_classify(&dataset, params.num_classes)?;

    let plan = SearchPlan::new(&dataset, &params)?;
    let summary = Summary {
        rows: dataset.num_units(),
        epochs: dataset.num_epochs(),
        value_range: dataset.value_range(),
        intervals: plan.num_intervals(),
        candidate_positions: plan.candidates().len(),
        combinations: plan.combinations().map(|c| c.to_string()),
        equidistant,
    };
    // Printed before the search starts
    if !cli.json {
        for line in summary.lines() {
            println!("{line}");
        }
    }

    let bar = progress_bar(cli.json);
    let opts = cli
        .search_options()?
        .with_progress(Arc::new(BarSink(bar)));
    let pocc = plan.run(&opts)?;

    if let (Some(path), Some(geometries)) = (&cli.export, &geometries) {
        write_classified_geojson(&dataset, geometries, &pocc.thresholds, path)?;
    }

    if cli.json {
        let report = Report { summary, pocc };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", pocc_line(&pocc));
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
