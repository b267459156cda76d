//! The batch dispatcher: run every source in a batch through the right
//! extractor, in order, and label the results.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::{StreamExt as _, TryStreamExt as _, stream};
use tokio::task::JoinHandle;

use crate::{
    errors::{BatchError, ExtractError},
    extractors::{
        ExtractorBackend,
        image::{crop_artifact, discard_artifact},
    },
    prelude::*,
    source::{ExtractionOptions, Source, SourceKind},
};

/// Everything needed to run one batch.
#[derive(Clone, Debug)]
pub struct BatchRequest {
    /// The sources, all of kind `kind`.
    pub sources: Vec<Source>,
    pub kind: SourceKind,
    pub options: ExtractionOptions,
    /// How many sources may be extracted at once. `1` is strictly
    /// sequential.
    pub jobs: usize,
}

impl BatchRequest {
    /// A crop region only applies when OCRing a single image that isn't a
    /// PDF.
    pub fn crop_applies(&self) -> bool {
        self.kind == SourceKind::ImageOcr
            && self.sources.len() == 1
            && !self.sources[0].is_pdf()
    }
}

/// Reported once per source, just before it is processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    /// 1-based.
    pub current: usize,
    pub total: usize,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Processing file {} of {}", self.current, self.total)
    }
}

/// Progress callback.
pub type ProgressFn = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// The text extracted from one source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchBlock {
    pub label: String,
    pub text: String,
}

impl fmt::Display for BatchBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "=== Results for {} ===\n{}\n", self.label, self.text)
    }
}

/// The results of a successful batch, in input order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub blocks: Vec<BatchBlock>,
}

impl BatchResult {
    /// All the blocks, separated by blank lines.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|block| block.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Run a batch to completion, stopping at the first failure.
///
/// With `jobs > 1`, later sources may already be running when an earlier one
/// fails. Their results are dropped, and the earliest failure is reported.
#[instrument(level = "debug", skip_all, fields(kind = ?request.kind, count = request.sources.len()))]
pub async fn run_batch(
    backend: Arc<dyn ExtractorBackend>,
    mut request: BatchRequest,
    progress: ProgressFn,
) -> Result<BatchResult, BatchError> {
    if request.options.crop_region.is_some() && !request.crop_applies() {
        warn!("Ignoring crop region, which only applies to a single non-PDF image");
        request.options.crop_region = None;
    }
    let BatchRequest {
        sources,
        kind,
        options,
        jobs,
    } = request;
    let total = sources.len();
    let options = Arc::new(options);

    let blocks = stream::iter(sources.into_iter().enumerate())
        .map(|(idx, source)| {
            // `buffered` creates each future in input order, only when it
            // has room to run it.
            progress(ProgressEvent {
                current: idx + 1,
                total,
            });
            let backend = backend.clone();
            let options = options.clone();
            async move {
                match extract_source(backend.as_ref(), &source, kind, &options).await {
                    Ok(text) => {
                        debug!(source = %source, "Extracted text");
                        Ok(BatchBlock {
                            label: source.label(),
                            text,
                        })
                    }
                    Err(cause) => Err(BatchError::ExtractionFailed {
                        input: source,
                        cause,
                    }),
                }
            }
        })
        .buffered(jobs.max(1))
        .try_collect::<Vec<_>>()
        .await?;
    Ok(BatchResult { blocks })
}

/// Run a single source through the extractor for `kind`.
async fn extract_source(
    backend: &dyn ExtractorBackend,
    source: &Source,
    kind: SourceKind,
    options: &ExtractionOptions,
) -> Result<String, ExtractError> {
    match (kind, source.file_path()) {
        (SourceKind::Web, _) => backend.extract_web_text(&source.to_string()).await,
        (_, None) => Err(ExtractError::NotAFile(source.to_string())),
        (SourceKind::Pdf, Some(path)) => {
            backend.extract_pdf_text(path, options.page_range).await
        }
        (SourceKind::ImageOcr, Some(path)) if source.is_pdf() => {
            backend
                .ocr_scanned_pdf(path, options.engine, options.page_range)
                .await
        }
        (SourceKind::ImageOcr, Some(path)) => match options.crop_region {
            Some(region) => {
                let cropped = crop_artifact(path, region, backend.scratch_dir()).await?;
                let result = backend.perform_ocr(cropped.path(), options.engine).await;
                discard_artifact(cropped);
                result
            }
            None => backend.perform_ocr(path, options.engine).await,
        },
    }
}

/// Runs one batch at a time in the background.
pub struct BatchRunner {
    backend: Arc<dyn ExtractorBackend>,
    busy: Arc<AtomicBool>,
}

impl BatchRunner {
    pub fn new(backend: Arc<dyn ExtractorBackend>) -> Self {
        Self {
            backend,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Is a batch running right now?
    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Start a batch on a background task. Fails with
    /// [`BatchError::BatchInFlight`] if one is already running.
    pub fn submit(
        &self,
        request: BatchRequest,
        progress: ProgressFn,
    ) -> Result<BatchHandle, BatchError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BatchError::BatchInFlight);
        }
        let slot = SlotGuard(self.busy.clone());
        let backend = self.backend.clone();
        let handle = tokio::spawn(async move {
            // Released when the task ends, even if nobody is waiting on it.
            let _slot = slot;
            run_batch(backend, request, progress).await
        });
        Ok(BatchHandle { handle })
    }
}

/// Marks a [`BatchRunner`] idle again when dropped.
struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A running batch.
pub struct BatchHandle {
    handle: JoinHandle<Result<BatchResult, BatchError>>,
}

impl BatchHandle {
    /// Wait for the batch to finish.
    pub async fn join(self) -> Result<BatchResult, BatchError> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(BatchError::Join(err.to_string())),
        }
    }
}
