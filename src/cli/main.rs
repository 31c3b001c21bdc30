//! Background Removal CLI Tool
//!
//! Command-line interface for the matting processor. One image in, one
//! image out.

use super::config::{CliConfigBuilder, OutputTarget};
use crate::{
    processor::MattingProcessor,
    services::{
        ImageIOService, OutputFormatHandler, ProcessingStage, ProgressReporter, ProgressUpdate,
    },
    tracing_config::spans,
    types::{Bitmap, MattingResult, ProcessingTimings},
    OutputFormat,
    BACKGROUND_THRESHOLD_RANGE, DEFAULT_BACKGROUND_THRESHOLD, DEFAULT_HAIR_SENSITIVITY,
    HAIR_SENSITIVITY_RANGE,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Hair-preserving background removal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "hairmatte")]
pub struct Cli {
    /// Input image file (use "-" for stdin)
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Output file. Use "-" for stdout [default: <INPUT stem>_bg_removed.<ext>]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format [default: from the output extension, else png]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// How far below pure white a pixel may be and still count as background
    #[arg(
        short = 'b',
        long,
        default_value_t = DEFAULT_BACKGROUND_THRESHOLD,
        value_parser = clap::value_parser!(i32).range(
            i64::from(*BACKGROUND_THRESHOLD_RANGE.start())..=i64::from(*BACKGROUND_THRESHOLD_RANGE.end())
        )
    )]
    pub background_threshold: i32,

    /// Minimum colour variance for a dark pixel to be treated as hair
    #[arg(
        short = 's',
        long,
        default_value_t = DEFAULT_HAIR_SENSITIVITY,
        value_parser = clap::value_parser!(i32).range(
            i64::from(*HAIR_SENSITIVITY_RANGE.start())..=i64::from(*HAIR_SENSITIVITY_RANGE.end())
        )
    )]
    pub hair_sensitivity: i32,

    /// Scheduling of the per-pixel pass
    #[arg(short, long, value_enum, default_value_t = CliExecutionMode::Auto)]
    pub execution: CliExecutionMode,

    /// Number of worker threads (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Also write a side-by-side checkerboard preview PNG
    #[arg(long, value_name = "PATH")]
    pub preview: Option<PathBuf>,

    /// Print classification counts and timings to stderr
    #[arg(long)]
    pub stats: bool,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub(crate) fn reads_stdin(&self) -> bool {
        self.input == "-"
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Webp,
    Tiff,
    Rgba8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliExecutionMode {
    /// Parallel for large images, sequential for small ones
    Auto,
    Sequential,
    Parallel,
}

/// Spinner-backed progress reporter
struct SpinnerProgressReporter {
    bar: ProgressBar,
}

impl SpinnerProgressReporter {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl ProgressReporter for SpinnerProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        self.bar
            .set_message(format!("[{}%] {}", update.progress, update.description));
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        self.bar
            .set_message(format!("Matte ready in {}ms", timings.total_ms));
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.bar
            .abandon_with_message(format!("Error during {}: {}", stage.description(), error));
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = init_tracing(cli.verbose).context("Failed to initialize tracing")?;
    let _session = spans::session(&session_id, cli.background_threshold, cli.hair_sensitivity)
        .entered();

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let output = CliConfigBuilder::resolve_output(&cli, config.output_format);

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    info!("Input: {}", cli.input);
    info!(
        "Background threshold: {}, hair sensitivity: {}, execution: {}",
        config.params.background_threshold, config.params.hair_sensitivity, config.execution_mode
    );

    let spinner = Arc::new(SpinnerProgressReporter::new());
    let processor = MattingProcessor::new(config)
        .context("Failed to create matting processor")?
        .with_progress_reporter(spinner.clone());

    let outcome = run(&cli, &processor, &output);
    spinner.bar.finish_and_clear();
    let result = outcome?;

    if cli.stats {
        eprintln!("{}", result.stats_summary());
        eprintln!("{}", result.timing_summary());
    }

    match output {
        OutputTarget::Stdout => info!("Image written to stdout"),
        OutputTarget::File(path) => info!(
            "Saved {} ({}x{})",
            path.display(),
            result.dimensions().0,
            result.dimensions().1
        ),
    }

    let timings = result.timings();
    let total_ms = timings.total_ms + timings.image_encode_ms.unwrap_or(0);
    info!("Done in {:.2}s", total_ms as f64 / 1000.0);

    Ok(())
}

/// Decode, classify, encode, then write the optional preview and the result
///
/// Both outputs are encoded in memory first. The preview is written before
/// the result and removed again if writing the result fails.
fn run(cli: &Cli, processor: &MattingProcessor, output: &OutputTarget) -> Result<MattingResult> {
    let (source, mut result) = {
        let _span = spans::file_processing(
            &cli.input,
            &processor.config().output_format.to_string(),
        )
        .entered();

        if cli.reads_stdin() {
            let data = read_stdin()?;
            processor
                .process_bytes_with_source(&data)
                .context("Failed to remove background from stdin image")?
        } else {
            processor
                .process_file_with_source(&cli.input)
                .with_context(|| format!("Failed to remove background from {}", cli.input))?
        }
    };

    let preview = match &cli.preview {
        Some(path) => Some((path, render_preview(processor, &source, &mut result)?)),
        None => None,
    };
    let data = processor
        .encode_result(&mut result)
        .context("Failed to encode result")?;

    if let Some((path, png)) = &preview {
        ImageIOService::write_bytes(png, path)
            .with_context(|| format!("Failed to save preview to {}", path.display()))?;
        info!("Preview written to {}", path.display());
    }

    if let Err(err) = write_output(processor, &data, output) {
        if let Some((path, _)) = &preview {
            discard_file(path);
        }
        return Err(err);
    }

    Ok(result)
}

fn write_output(processor: &MattingProcessor, data: &[u8], output: &OutputTarget) -> Result<()> {
    let format = processor.config().output_format;

    match output {
        OutputTarget::Stdout => {
            let _span = spans::output_writing("stdout", &format.to_string()).entered();
            if io::stdout().is_terminal() {
                warn!("Writing binary image data to a terminal");
            }
            write_stdout(data)
        },
        OutputTarget::File(path) => {
            let _span =
                spans::output_writing(&path.display().to_string(), &format.to_string()).entered();
            ImageIOService::write_bytes(data, path)
                .with_context(|| format!("Failed to save result to {}", path.display()))
        },
    }
}

/// Render the side-by-side preview and encode it as PNG
fn render_preview(
    processor: &MattingProcessor,
    source: &Bitmap,
    result: &mut MattingResult,
) -> Result<Vec<u8>> {
    let canvas = processor
        .render_preview(source, result)
        .context("Failed to render preview")?;
    OutputFormatHandler::encode(&canvas, OutputFormat::Png).context("Failed to encode preview")
}

fn discard_file(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        warn!("Could not remove {}: {}", path.display(), err);
    }
}

/// Initialize tracing based on verbosity level
fn init_tracing(verbose_count: u8) -> Result<String> {
    let session_id = crate::tracing_config::init_cli_tracing(verbose_count)
        .context("Failed to initialize tracing subscriber")?;
    tracing::debug!(verbosity = verbose_count, "Tracing initialized");
    Ok(session_id)
}

/// Read image data from stdin
fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("Failed to read image data from stdin")?;

    if buffer.is_empty() {
        anyhow::bail!("No data received from stdin");
    }

    Ok(buffer)
}

/// Write image data to stdout
fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["hairmatte", "portrait.jpg"]).unwrap();

        assert_eq!(cli.input, "portrait.jpg");
        assert_eq!(cli.output, None);
        assert_eq!(cli.format, None);
        assert_eq!(cli.background_threshold, 10);
        assert_eq!(cli.hair_sensitivity, 3);
        assert_eq!(cli.execution, CliExecutionMode::Auto);
        assert_eq!(cli.threads, 0);
        assert!(cli.preview.is_none());
        assert!(!cli.stats);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.reads_stdin());
    }

    #[test]
    fn test_cli_full_arguments() {
        let cli = Cli::try_parse_from([
            "hairmatte",
            "-",
            "-o",
            "-",
            "-f",
            "webp",
            "-b",
            "50",
            "-s",
            "1",
            "--execution",
            "sequential",
            "--preview",
            "preview.png",
            "--stats",
            "-vvv",
        ])
        .unwrap();

        assert!(cli.reads_stdin());
        assert_eq!(cli.output.as_deref(), Some("-"));
        assert_eq!(cli.format, Some(CliOutputFormat::Webp));
        assert_eq!(cli.background_threshold, 50);
        assert_eq!(cli.hair_sensitivity, 1);
        assert_eq!(cli.execution, CliExecutionMode::Sequential);
        assert_eq!(cli.preview, Some(PathBuf::from("preview.png")));
        assert!(cli.stats);
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn test_cli_requires_input() {
        assert!(Cli::try_parse_from(["hairmatte"]).is_err());
    }

    #[test]
    fn test_write_stdout_empty_data() {
        assert!(write_stdout(&[]).is_ok());
    }

    struct Workspace {
        dir: tempfile::TempDir,
        input: PathBuf,
        blocker: PathBuf,
    }

    fn workspace() -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("portrait.png");
        let image = image::RgbaImage::from_fn(6, 4, |x, _| {
            if x < 3 {
                image::Rgba([250, 250, 250, 255])
            } else {
                image::Rgba([80, 40, 30, 255])
            }
        });
        ImageIOService::save_image(&image, &input, OutputFormat::Png).unwrap();

        // A plain file, so nothing can be created beneath it
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();

        Workspace {
            dir,
            input,
            blocker,
        }
    }

    fn run_with(ws: &Workspace, output: &Path, preview: &Path) -> Result<MattingResult> {
        let cli = Cli::try_parse_from([
            OsStr::new("hairmatte"),
            ws.input.as_os_str(),
            OsStr::new("--preview"),
            preview.as_os_str(),
        ])
        .unwrap();
        let processor = MattingProcessor::new(crate::MattingConfig::default()).unwrap();
        run(&cli, &processor, &OutputTarget::File(output.to_path_buf()))
    }

    #[test]
    fn test_run_writes_result_and_preview() {
        let ws = workspace();
        let output = ws.dir.path().join("out").join("portrait_bg_removed.png");
        let preview = ws.dir.path().join("preview.png");

        let result = run_with(&ws, &output, &preview).unwrap();
        assert!(result.timings().image_encode_ms.is_some());
        assert!(result.timings().preview_ms.is_some());

        let matte = ImageIOService::load_image(&output).unwrap().to_rgba8();
        assert_eq!(matte.get_pixel(0, 0).0, [250, 250, 250, 0]);
        assert_eq!(matte.get_pixel(5, 3).0, [80, 40, 30, 100]);
        assert!(preview.exists());
    }

    #[test]
    fn test_run_failed_preview_writes_no_result() {
        let ws = workspace();
        let output = ws.dir.path().join("portrait_bg_removed.png");
        let preview = ws.blocker.join("preview.png");

        assert!(run_with(&ws, &output, &preview).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_run_failed_result_removes_preview() {
        let ws = workspace();
        let output = ws.blocker.join("portrait_bg_removed.png");
        let preview = ws.dir.path().join("preview.png");

        assert!(run_with(&ws, &output, &preview).is_err());
        assert!(!preview.exists());
    }
}
