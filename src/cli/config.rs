//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliExecutionMode, CliOutputFormat};
use crate::{
    config::{ExecutionMode, MattingConfig, MattingParams, OutputFormat},
    services::{OutputFormatHandler, DEFAULT_DOWNLOAD_NAME},
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where the encoded result goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutputTarget {
    Stdout,
    File(PathBuf),
}

/// Convert CLI arguments to `MattingConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build `MattingConfig` from CLI arguments
    ///
    /// Slider ranges are enforced here: the CLI plays the part of the UI and
    /// owns range-limiting, the engine accepts any value.
    pub(crate) fn from_cli(cli: &Cli) -> Result<MattingConfig> {
        let execution_mode = match cli.execution {
            CliExecutionMode::Auto => ExecutionMode::Auto,
            CliExecutionMode::Sequential => ExecutionMode::Sequential,
            CliExecutionMode::Parallel => ExecutionMode::Parallel,
        };

        MattingConfig::builder()
            .params(MattingParams::new(
                cli.background_threshold,
                cli.hair_sensitivity,
            ))
            .execution_mode(execution_mode)
            .output_format(Self::resolve_format(cli))
            .strict_ui_ranges(true)
            .debug(cli.verbose >= 2)
            .build()
            .context("Invalid configuration")
    }

    /// Explicit `--format`, else the output file's extension, else PNG
    pub(crate) fn resolve_format(cli: &Cli) -> OutputFormat {
        if let Some(format) = cli.format {
            return match format {
                CliOutputFormat::Png => OutputFormat::Png,
                CliOutputFormat::Webp => OutputFormat::WebP,
                CliOutputFormat::Tiff => OutputFormat::Tiff,
                CliOutputFormat::Rgba8 => OutputFormat::Rgba8,
            };
        }

        cli.output
            .as_deref()
            .filter(|output| *output != "-")
            .and_then(|output| OutputFormatHandler::from_extension(Path::new(output)))
            .unwrap_or_default()
    }

    /// Resolve the output destination
    ///
    /// File inputs default to `<stem>_bg_removed.<ext>` next to the input;
    /// stdin defaults to `removed_background.<ext>` in the working directory.
    pub(crate) fn resolve_output(cli: &Cli, format: OutputFormat) -> OutputTarget {
        match cli.output.as_deref() {
            Some("-") => OutputTarget::Stdout,
            Some(path) => OutputTarget::File(PathBuf::from(path)),
            None if cli.reads_stdin() => OutputTarget::File(
                Path::new(DEFAULT_DOWNLOAD_NAME)
                    .with_extension(OutputFormatHandler::get_extension(format)),
            ),
            None => OutputTarget::File(OutputFormatHandler::derive_output_path(
                Path::new(&cli.input),
                format,
            )),
        }
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        MattingParams::new(cli.background_threshold, cli.hair_sensitivity)
            .validate_ui_range()
            .context("Invalid sensitivity settings")?;

        if let Some(preview) = &cli.preview {
            if preview.as_os_str() == "-" {
                anyhow::bail!("--preview needs a file path; stdout is reserved for the result");
            }
        }

        #[cfg(not(feature = "webp-support"))]
        if Self::resolve_format(cli) == OutputFormat::WebP {
            anyhow::bail!("WebP output requires the `webp-support` feature");
        }

        if let OutputTarget::File(path) = Self::resolve_output(cli, Self::resolve_format(cli)) {
            if !cli.reads_stdin() && path == Path::new(&cli.input) {
                anyhow::bail!("Output path {} would overwrite the input", path.display());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hairmatte").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_config_conversion() {
        let cli = parse(&["photo.jpg", "--background-threshold", "25", "--hair-sensitivity", "7"]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();

        assert_eq!(config.params, MattingParams::new(25, 7));
        assert_eq!(config.execution_mode, ExecutionMode::Auto);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert!(config.strict_ui_ranges);
        assert!(!config.debug);
    }

    #[test]
    fn test_debug_from_verbosity() {
        assert!(!CliConfigBuilder::from_cli(&parse(&["a.png", "-v"])).unwrap().debug);
        assert!(CliConfigBuilder::from_cli(&parse(&["a.png", "-vv"])).unwrap().debug);
    }

    #[test]
    fn test_format_resolution() {
        assert_eq!(
            CliConfigBuilder::resolve_format(&parse(&["a.jpg", "-o", "out.tiff"])),
            OutputFormat::Tiff
        );
        assert_eq!(
            CliConfigBuilder::resolve_format(&parse(&["a.jpg", "-o", "out.tiff", "-f", "png"])),
            OutputFormat::Png
        );
        assert_eq!(
            CliConfigBuilder::resolve_format(&parse(&["a.jpg", "-o", "-"])),
            OutputFormat::Png
        );
        assert_eq!(
            CliConfigBuilder::resolve_format(&parse(&["a.jpg", "-o", "out.jpg"])),
            OutputFormat::Png
        );
    }

    #[test]
    fn test_output_resolution() {
        let cli = parse(&["shots/portrait.jpg"]);
        assert_eq!(
            CliConfigBuilder::resolve_output(&cli, OutputFormat::Png),
            OutputTarget::File(PathBuf::from("shots/portrait_bg_removed.png"))
        );

        let cli = parse(&["-"]);
        assert_eq!(
            CliConfigBuilder::resolve_output(&cli, OutputFormat::Png),
            OutputTarget::File(PathBuf::from("removed_background.png"))
        );
        assert_eq!(
            CliConfigBuilder::resolve_output(&cli, OutputFormat::Tiff),
            OutputTarget::File(PathBuf::from("removed_background.tiff"))
        );

        let cli = parse(&["-", "-o", "-"]);
        assert_eq!(
            CliConfigBuilder::resolve_output(&cli, OutputFormat::Png),
            OutputTarget::Stdout
        );
    }

    #[test]
    fn test_cli_validation() {
        assert!(CliConfigBuilder::validate_cli(&parse(&["a.jpg"])).is_ok());
        assert!(CliConfigBuilder::validate_cli(&parse(&["a.jpg", "--preview", "-"])).is_err());
        assert!(CliConfigBuilder::validate_cli(&parse(&["a.png", "-o", "a.png"])).is_err());
    }

    #[test]
    fn test_slider_ranges_enforced_by_parser() {
        let args = ["hairmatte", "a.jpg", "--background-threshold", "51"];
        assert!(Cli::try_parse_from(args).is_err());

        let args = ["hairmatte", "a.jpg", "--hair-sensitivity", "0"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
