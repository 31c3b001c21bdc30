//! Request-level processing
//!
//! `MattingProcessor` wraps the stateless engine with the parts a front end
//! needs around it: decoding, stage timings, progress callbacks and preview
//! rendering. It keeps no per-request state, so a failed call never touches
//! results handed out earlier.

use crate::{
    config::MattingConfig,
    error::{MattingError, Result},
    matting::{CancellationToken, MattingEngine},
    preview,
    services::{
        ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, ProcessingStage,
        ProgressReporter, ProgressTracker,
    },
    types::{Bitmap, MattingResult, ProcessingMetadata, ProcessingTimings},
};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, span, Level};

/// Matting processor driving the engine for whole images
pub struct MattingProcessor {
    config: MattingConfig,
    engine: MattingEngine,
    reporter: Arc<dyn ProgressReporter>,
    cancellation: Option<CancellationToken>,
}

impl MattingProcessor {
    /// Create a processor from a validated configuration
    ///
    /// Debug configurations log every stage through the console reporter.
    ///
    /// # Errors
    /// - `MattingError::InvalidConfig` if `config.validate()` fails
    ///
    /// # Examples
    /// ```rust
    /// use hairmatte::{MattingConfig, MattingProcessor};
    ///
    /// let processor = MattingProcessor::new(MattingConfig::default()).unwrap();
    /// assert_eq!(processor.config().params.background_threshold, 10);
    /// ```
    pub fn new(config: MattingConfig) -> Result<Self> {
        config.validate()?;

        let reporter: Arc<dyn ProgressReporter> = if config.debug {
            Arc::new(ConsoleProgressReporter::new(true))
        } else {
            Arc::new(NoOpProgressReporter)
        };

        Ok(Self {
            engine: MattingEngine::from_config(&config),
            config,
            reporter,
            cancellation: None,
        })
    }

    /// Replace the progress reporter
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Stop classification between chunks once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &MattingConfig {
        &self.config
    }

    /// Process an already decoded source bitmap
    ///
    /// # Errors
    /// - `MattingError::InvalidBitmap` for a malformed bitmap
    /// - `MattingError::Cancelled` if the cancellation token fired
    pub fn process_bitmap(&self, bitmap: &Bitmap) -> Result<MattingResult> {
        let mut tracker = self.tracker();
        let start = Instant::now();
        self.classify(bitmap, &mut tracker, ProcessingTimings::new(), start)
    }

    /// Process a decoded image
    ///
    /// The image is flattened to an opaque RGBA bitmap first, so any alpha it
    /// carries is discarded.
    ///
    /// # Errors
    /// - `MattingError::InvalidBitmap` for a zero-sized image
    /// - `MattingError::Cancelled` if the cancellation token fired
    #[instrument(skip(self, image), fields(dimensions = %format!("{}x{}", image.width(), image.height())))]
    pub fn process_image(&self, image: &DynamicImage) -> Result<MattingResult> {
        let mut tracker = self.tracker();
        let start = Instant::now();
        let mut timings = ProcessingTimings::new();

        tracker.report_stage(ProcessingStage::ImageLoading);
        let decode_start = Instant::now();
        let bitmap = Self::track(&tracker, Bitmap::opaque_from_image(image))?;
        timings.image_decode_ms = decode_start.elapsed().as_millis() as u64;

        self.classify(&bitmap, &mut tracker, timings, start)
    }

    /// Decode and process image bytes (PNG, JPEG, WebP, BMP, TIFF)
    ///
    /// # Errors
    /// - Decoding failures
    /// - `MattingError::Cancelled` if the cancellation token fired
    pub fn process_bytes(&self, image_bytes: &[u8]) -> Result<MattingResult> {
        let (_, result) = self.process_bytes_with_source(image_bytes)?;
        Ok(result)
    }

    /// Decode and process image bytes, also returning the opaque source bitmap
    ///
    /// # Errors
    /// - Decoding failures
    /// - `MattingError::Cancelled` if the cancellation token fired
    pub fn process_bytes_with_source(&self, image_bytes: &[u8]) -> Result<(Bitmap, MattingResult)> {
        let mut tracker = self.tracker();
        let start = Instant::now();
        let mut timings = ProcessingTimings::new();

        tracker.report_stage(ProcessingStage::ImageLoading);
        let decode_start = Instant::now();
        let bitmap = Self::track(
            &tracker,
            ImageIOService::load_from_bytes(image_bytes)
                .and_then(|image| Bitmap::opaque_from_image(&image)),
        )?;
        timings.image_decode_ms = decode_start.elapsed().as_millis() as u64;

        let result = self.classify(&bitmap, &mut tracker, timings, start)?;
        Ok((bitmap, result))
    }

    /// Load and process an image file
    ///
    /// # Errors
    /// - File missing, unreadable or not an image
    /// - `MattingError::Cancelled` if the cancellation token fired
    pub fn process_file<P: AsRef<Path>>(&self, input_path: P) -> Result<MattingResult> {
        let (_, result) = self.process_file_with_source(input_path)?;
        Ok(result)
    }

    /// Load and process an image file, also returning the opaque source bitmap
    ///
    /// The source is what [`MattingProcessor::render_preview`] shows on the left.
    ///
    /// # Errors
    /// - File missing, unreadable or not an image
    /// - `MattingError::Cancelled` if the cancellation token fired
    #[instrument(skip(self, input_path), fields(input = %input_path.as_ref().display()))]
    pub fn process_file_with_source<P: AsRef<Path>>(
        &self,
        input_path: P,
    ) -> Result<(Bitmap, MattingResult)> {
        let path_ref = input_path.as_ref();
        let mut tracker = self.tracker();
        let start = Instant::now();
        let mut timings = ProcessingTimings::new();

        tracker.report_stage_with_description(
            ProcessingStage::ImageLoading,
            format!("Loading {}", path_ref.display()),
        );
        let decode_start = Instant::now();
        let bitmap = {
            let _span = span!(Level::DEBUG, "image_loading").entered();
            Self::track(&tracker, ImageIOService::load_bitmap(path_ref))?
        };
        timings.image_decode_ms = decode_start.elapsed().as_millis() as u64;

        let result = self
            .classify(&bitmap, &mut tracker, timings, start)?
            .with_input_path(path_ref.display().to_string());

        Ok((bitmap, result))
    }

    /// Render the side-by-side checkerboard preview and record its timing
    ///
    /// # Errors
    /// - `MattingError::Processing` if an image buffer cannot be built
    pub fn render_preview(&self, original: &Bitmap, result: &mut MattingResult) -> Result<RgbaImage> {
        let mut tracker = self.tracker();
        tracker.report_stage(ProcessingStage::Preview);

        let preview_start = Instant::now();
        let canvas = Self::track(&tracker, preview::side_by_side(original, &result.bitmap))?;
        let preview_ms = preview_start.elapsed().as_millis() as u64;

        result.metadata.timings.preview_ms = Some(preview_ms);
        result.metadata.timings.total_ms += preview_ms;

        Ok(canvas)
    }

    /// Encode the result in the configured output format and record the encode time
    ///
    /// # Errors
    /// - `MattingError::Processing` if encoding fails
    pub fn encode_result(&self, result: &mut MattingResult) -> Result<Vec<u8>> {
        let mut tracker = self.tracker();
        tracker.report_stage(ProcessingStage::Encoding);

        let encode_start = Instant::now();
        let data = Self::track(&tracker, result.to_bytes(self.config.output_format))?;
        result.metadata.timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);

        Ok(data)
    }

    fn classify(
        &self,
        bitmap: &Bitmap,
        tracker: &mut ProgressTracker,
        mut timings: ProcessingTimings,
        start: Instant,
    ) -> Result<MattingResult> {
        let (width, height) = bitmap.dimensions();
        tracker.report_stage_with_description(
            ProcessingStage::Classification,
            format!("Classifying {}x{} pixels", width, height),
        );

        let classify_start = Instant::now();
        let output = {
            let _span = span!(
                Level::INFO,
                "classification",
                width = width,
                height = height,
                background_threshold = self.config.params.background_threshold,
                hair_sensitivity = self.config.params.hair_sensitivity
            )
            .entered();

            let outcome = match &self.cancellation {
                Some(token) => self.engine.process_with_cancellation(bitmap, token),
                None => self.engine.process(bitmap),
            };
            Self::track(tracker, outcome)?
        };
        timings.classification_ms = classify_start.elapsed().as_millis() as u64;
        timings.total_ms = start.elapsed().as_millis() as u64;

        let mut metadata = ProcessingMetadata::new(self.config.params, self.config.execution_mode);
        metadata.parallel = output.parallel;
        metadata.timings = timings;

        tracker.report_stage(ProcessingStage::Completed);
        tracker.report_completion(&metadata.timings);

        info!(
            width,
            height,
            background = output.stats.background,
            hair = output.stats.hair,
            foreground = output.stats.foreground,
            parallel = output.parallel,
            total_ms = metadata.timings.total_ms,
            "Matting completed"
        );

        Ok(MattingResult::new(output.bitmap, output.stats, metadata))
    }

    fn tracker(&self) -> ProgressTracker {
        ProgressTracker::new(Box::new(Arc::clone(&self.reporter)))
    }

    /// Forward a failure to the reporter before returning it
    fn track<T>(tracker: &ProgressTracker, outcome: Result<T>) -> Result<T> {
        if let Err(ref e) = outcome {
            if !matches!(e, MattingError::Cancelled) {
                tracker.report_error(&e.to_string());
            }
        }
        outcome
    }
}
