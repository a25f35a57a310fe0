use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use getpaper_core::output::bib_path;
use getpaper_core::{
    BatchUpdater, Config, ExitCode, Identifier, PaperError, PaperOutcome, PaperPipeline, RunMode,
    RunReport, UpdateOptions,
};

const ENV_JSON: &str = "GETPAPER_JSON";

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "getpaper",
    about = "Download the PDF of a paper and add its BibTeX entry to a .bib file, using INSPIRE",
    version,
    after_help = "At least one identifier option is required unless --update is given. \
                  If several are given, --arxiv wins over --doi, which wins over --inspire; \
                  the others are ignored."
)]
struct Cli {
    /// Destination directory for PDFs.
    directory: PathBuf,

    /// arXiv identifier (1207.7214, hep-th/9711200, arXiv:... or an arxiv.org URL).
    #[arg(short = 'a', long)]
    arxiv: Option<String>,

    /// DOI.
    #[arg(short = 'd', long)]
    doi: Option<String>,

    /// INSPIRE literature identifier.
    #[arg(short = 'i', long)]
    inspire: Option<String>,

    /// BibTeX file to update, or a directory to hold `<DIRECTORY name>.bib`.
    /// Defaults to `<DIRECTORY>/<DIRECTORY name>.bib`.
    #[arg(short = 'b', long = "bib", value_name = "DEST")]
    bib: Option<PathBuf>,

    /// Re-fetch every arXiv paper already in the bibliography.
    #[arg(short = 'u', long)]
    update: bool,

    /// Do not write the bibliography.
    #[arg(short = 'n', long = "no-bib")]
    no_bib: bool,

    /// Debug logging on stderr.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Print the run report as JSON. Also enabled by GETPAPER_JSON=1.
    #[arg(long)]
    json: bool,

    /// Config file (default: ~/.config/getpaper/config.toml or $GETPAPER_CONFIG).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Debug)]
enum Mode {
    Single(Identifier),
    Update { extra: Option<Identifier> },
}

impl Cli {
    fn mode(&self) -> getpaper_core::Result<Mode> {
        let identifier = Identifier::from_flags(
            self.arxiv.as_deref(),
            self.doi.as_deref(),
            self.inspire.as_deref(),
        )?;
        match (self.update, identifier) {
            (true, extra) => Ok(Mode::Update { extra }),
            (false, Some(identifier)) => Ok(Mode::Single(identifier)),
            (false, None) => Err(PaperError::MissingIdentifier),
        }
    }
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let start = Instant::now();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            e.print().context("failed to print usage")?;
            std::process::exit(ExitCode::InvalidArgs as i32);
        }
    };

    let json_output = cli.json || std::env::var(ENV_JSON).as_deref() == Ok("1");
    init_tracing(cli.verbose, json_output);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let outcome = runtime.block_on(run(&cli));
    let dur = start.elapsed().as_millis();

    match outcome {
        Ok(report) => {
            if json_output {
                let status = if report.has_failures() { "error" } else { "ok" };
                print_json(&serde_json::json!({
                    "status": status,
                    "data": report,
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                print_report(&report);
            }
            let code = report.exit_code();
            if code != ExitCode::Success {
                std::process::exit(code as i32);
            }
        }
        Err(e) => {
            if json_output {
                print_json(&serde_json::json!({
                    "status": "error",
                    "error": error_kind(&e),
                    "message": e.to_string(),
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                eprintln!("error: {e}");
            }
            std::process::exit(e.exit_code() as i32);
        }
    }

    Ok(())
}

async fn run(cli: &Cli) -> getpaper_core::Result<RunReport> {
    let mode = cli.mode()?;
    let config = load_config(cli.config.as_deref())?;
    let pipeline = Arc::new(PaperPipeline::from_config(&config)?);
    let bib = bib_path(&cli.directory, cli.bib.as_deref())?;
    debug!(
        directory = %cli.directory.display(),
        bib = %bib.display(),
        write_bib = !cli.no_bib,
        ?mode,
        "starting run"
    );

    match mode {
        Mode::Single(identifier) => {
            let bib = (!cli.no_bib).then_some(bib.as_path());
            pipeline.get_paper(&identifier, &cli.directory, bib).await
        }
        Mode::Update { extra } => {
            let options = UpdateOptions {
                extra,
                skip_bibliography: cli.no_bib,
            };
            BatchUpdater::new(pipeline)
                .run(&cli.directory, &bib, options)
                .await
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool, json_output: bool) {
    let level = match (verbose, json_output) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("getpaper={level},getpaper_core={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// An explicit `--config` must exist; the default location may be absent.
fn load_config(path: Option<&Path>) -> getpaper_core::Result<Config> {
    let Some(path) = path else {
        return Config::load();
    };
    if !path.is_file() {
        return Err(PaperError::Config(format!(
            "{} does not exist",
            path.display()
        )));
    }
    let mut config = Config::load_from(path)?;
    config.apply_env();
    Ok(config)
}

fn error_kind(err: &PaperError) -> &'static str {
    match err {
        PaperError::InvalidArxivId(_)
        | PaperError::InvalidDoi(_)
        | PaperError::InvalidInspireId(_)
        | PaperError::MissingIdentifier => "invalid_args",
        PaperError::NotFound(_) => "not_found",
        PaperError::Http(_) | PaperError::Remote(..) | PaperError::RateLimit(..) => "network",
        PaperError::MalformedResponse(..) => "malformed_response",
        PaperError::Download { .. } => "download",
        PaperError::Parse { .. } => "parse",
        PaperError::Filesystem { .. } => "filesystem",
        PaperError::Config(_) => "config",
    }
}

fn print_report(report: &RunReport) {
    for paper in &report.papers {
        match paper {
            PaperOutcome::Ok { pdf, .. } => println!("Saved paper to {}", pdf.path.display()),
            PaperOutcome::Failed {
                identifier, error, ..
            } => eprintln!("Failed {identifier}: {error}"),
        }
    }
    if let Some(path) = &report.bibliography
        && report.succeeded() > 0
    {
        println!("Saved BibTeX citation to {}", path.display());
    }
    if report.mode == RunMode::Update {
        println!(
            "Updated {} of {} papers",
            report.succeeded(),
            report.papers.len()
        );
    }
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}
