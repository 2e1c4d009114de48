use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use atelier::buffer::PixelBuffer;
use atelier::engine::Engine;
use atelier::filters::TransformationKind;
use atelier::job::{JobId, JobStatus};
use atelier::queue::Scheduler;
use atelier::settings::{self, Settings};
use atelier::worker::WorkerPool;

fn version_string() -> &'static str {
    let hash = env!("GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup — trivial, called exactly once
        Box::leak(format!("{} ({hash})", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "atelier")]
#[command(about = "Artistic photo transformations for kiosk photo booths")]
#[command(long_about = "\
Artistic photo transformations for kiosk photo booths

Photos are transformed by one of three filters — pencil sketch,
watercolor, or oil painting — tuned through a single kiosk.toml settings
file. Batch runs go through the same bounded-concurrency queue the kiosk
uses, so a stack of captures never overwhelms the machine.

Settings resolution: every parameter has a built-in default; a settings
file overrides only the keys it names. Run 'atelier gen-settings' for a
fully documented kiosk.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Kiosk settings file (built-in defaults when omitted)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transform one photo synchronously
    Apply {
        /// Source photo (JPEG, PNG, or WebP)
        input: PathBuf,
        /// Where to write the result (format from extension)
        output: PathBuf,
        /// Override the transformation from settings
        #[arg(long, value_enum)]
        kind: Option<TransformationKind>,
    },
    /// Transform many photos through the kiosk queue
    Batch {
        /// Source photos
        files: Vec<PathBuf>,
        /// Output directory (defaults to each photo's directory)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Override the transformation from settings
        #[arg(long, value_enum)]
        kind: Option<TransformationKind>,
        /// Retry failed jobs this many extra rounds
        #[arg(long, default_value_t = 0)]
        retries: u32,
        /// Write a JSON job report here
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Validate a settings file and print the effective values
    Check,
    /// Print a stock kiosk.toml with all options documented
    GenSettings,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Command::Apply {
            input,
            output,
            kind,
        } => {
            init_thread_pool(&settings);
            let params = settings.params_for(kind.unwrap_or(settings.transformation));
            let image = read_photo(&input)?;
            let engine = Engine::cpu();
            let result = engine.transform(&image, &params)?;
            write_photo(&result, &output)?;
            println!("{} → {} ({})", input.display(), output.display(), params.kind());
        }
        Command::Batch {
            files,
            output_dir,
            kind,
            retries,
            report,
        } => {
            if files.is_empty() {
                return Err("no input files given".into());
            }
            init_thread_pool(&settings);
            run_batch(&settings, &files, output_dir.as_deref(), kind, retries, report.as_deref())?;
        }
        Command::Check => {
            println!("transformation: {}", settings.transformation);
            print!("{}", toml::to_string_pretty(&settings)?);
            println!("settings are valid");
        }
        Command::GenSettings => {
            print!("{}", settings::stock_settings_toml());
        }
    }

    Ok(())
}

/// Per-job line in the `--report` JSON.
#[derive(Serialize)]
struct JobReport {
    source: String,
    output: Option<String>,
    status: JobStatus,
    error: Option<String>,
}

fn run_batch(
    settings: &Settings,
    files: &[PathBuf],
    output_dir: Option<&Path>,
    kind: Option<TransformationKind>,
    retries: u32,
    report: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind = kind.unwrap_or(settings.transformation);
    let params = settings.params_for(kind);

    let (tx, rx) = std::sync::mpsc::channel();
    let pool = WorkerPool::spawn(settings.queue.workers.max(1), tx);
    let mut scheduler = Scheduler::new(pool, rx, settings.queue.scheduler_config());

    // Decode failures are reported up front; they never become jobs.
    let mut sources: BTreeMap<JobId, PathBuf> = BTreeMap::new();
    let mut decode_failures = Vec::new();
    for file in files {
        match read_photo(file) {
            Ok(image) => {
                let id = scheduler.enqueue(image, params);
                sources.insert(id, file.clone());
            }
            Err(e) => {
                eprintln!("✗ {}: {e}", file.display());
                decode_failures.push(file.clone());
            }
        }
    }

    let poll = Duration::from_millis(50);
    scheduler.run_to_completion(poll, |job| {
        let source = sources[&job.id].display();
        match job.status {
            JobStatus::Completed => println!("✓ {source}"),
            JobStatus::Failed => {
                let error = job.error.as_ref().map(|e| e.message.as_str()).unwrap_or("unknown");
                eprintln!("✗ {source}: {error}");
            }
            _ => {}
        }
    });

    // Retry is the only recovery the queue offers; each round re-enqueues
    // every failed job at the tail.
    for round in 1..=retries {
        let failed: Vec<JobId> = scheduler
            .jobs()
            .filter(|j| j.status == JobStatus::Failed)
            .map(|j| j.id)
            .collect();
        if failed.is_empty() {
            break;
        }
        println!("retry round {round}: {} job(s)", failed.len());
        for id in failed {
            scheduler.retry(id);
        }
        scheduler.run_to_completion(poll, |job| {
            let source = sources[&job.id].display();
            match job.status {
                JobStatus::Completed => println!("✓ {source} (retry)"),
                JobStatus::Failed => eprintln!("✗ {source}: still failing"),
                _ => {}
            }
        });
    }

    let mut reports = Vec::new();
    let mut failures = decode_failures.len();
    for job in scheduler.jobs() {
        let source = &sources[&job.id];
        let mut written = None;
        match (&job.status, &job.result) {
            (JobStatus::Completed, Some(result)) => {
                let output = output_path(source, output_dir, kind);
                write_photo(result, &output)?;
                written = Some(output.display().to_string());
            }
            _ => failures += 1,
        }
        reports.push(JobReport {
            source: source.display().to_string(),
            output: written,
            status: job.status,
            error: job.error.as_ref().map(|e| e.message.clone()),
        });
    }
    for file in &decode_failures {
        reports.push(JobReport {
            source: file.display().to_string(),
            output: None,
            status: JobStatus::Failed,
            error: Some("could not decode".into()),
        });
    }

    if let Some(path) = report {
        std::fs::write(path, serde_json::to_string_pretty(&reports)?)?;
    }

    if failures > 0 {
        return Err(format!("{failures} photo(s) failed").into());
    }
    Ok(())
}

/// `photo.jpg` + pencil → `photo-pencil.png`, in `output_dir` when given.
fn output_path(source: &Path, output_dir: Option<&Path>, kind: TransformationKind) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "photo".into());
    let name = format!("{stem}-{kind}.png");
    match output_dir {
        Some(dir) => dir.join(name),
        None => source.with_file_name(name),
    }
}

/// Decode a photo into the pipeline's RGBA representation.
fn read_photo(path: &Path) -> Result<PixelBuffer, Box<dyn std::error::Error>> {
    let decoded = image::ImageReader::open(path)?.decode()?.to_rgba8();
    let (width, height) = decoded.dimensions();
    Ok(PixelBuffer::from_rgba(width, height, decoded.into_raw())?)
}

/// Encode a result buffer, format chosen by the output extension.
/// JPEG has no alpha channel, so it gets the RGB projection.
fn write_photo(buffer: &PixelBuffer, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    let rgba = image::RgbaImage::from_raw(
        buffer.width(),
        buffer.height(),
        buffer.as_bytes().to_vec(),
    )
    .ok_or("buffer dimensions disagree with pixel data")?;

    let jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    if jpeg {
        image::DynamicImage::ImageRgba8(rgba).to_rgb8().save(path)?;
    } else {
        rgba.save(path)?;
    }
    Ok(())
}

/// Initialize the rayon thread pool from settings.
///
/// Caps at the number of available CPU cores — user can constrain down,
/// not up.
fn init_thread_pool(settings: &Settings) {
    let threads = settings::effective_threads(&settings.processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
