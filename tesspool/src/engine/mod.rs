//! OCR engine seam
//!
//! The pool never talks to Tesseract directly. It drives workers through
//! the `OcrWorker` trait and obtains them from a `WorkerFactory`, which
//! keeps the scheduler testable without trained data on disk.
//!
//! Worker setup mirrors the engine's own lifecycle:
//! create → `load` → `load_language` → `initialize` → `set_parameters`.
//! All methods block; callers run them on `spawn_blocking`.

#[cfg(feature = "tesseract")]
mod tesseract;

#[cfg(feature = "tesseract")]
pub use tesseract::{TesseractWorker, TesseractWorkerFactory};

use crate::config::{WorkerOptions, WorkerParams};
use crate::error::Result;
use crate::image_ops::ImageData;

/// A single OCR engine instance able to run one job at a time.
pub trait OcrWorker: Send {
    /// Prepare the engine runtime (locate trained data, allocate state).
    fn load(&mut self) -> Result<()>;

    /// Make the language model(s) available, e.g. `eng` or `eng+deu`.
    fn load_language(&mut self, langs: &str) -> Result<()>;

    /// Initialize the engine with the loaded language(s).
    fn initialize(&mut self, langs: &str) -> Result<()>;

    fn set_parameters(&mut self, params: &WorkerParams) -> Result<()>;

    fn recognize(&mut self, image: &ImageData) -> Result<RecognizeResult>;
}

/// Creates unconfigured workers.
pub trait WorkerFactory: Send + Sync {
    fn create_worker(&self, options: &WorkerOptions) -> Result<Box<dyn OcrWorker>>;
}

/// Work accepted by the scheduler.
#[derive(Debug, Clone)]
pub enum Job {
    Recognize(ImageData),
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Recognize(_) => "recognize",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognizeResult {
    pub data: RecognizeData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognizeData {
    pub text: String,
    /// Mean word confidence reported by the engine (0-100).
    pub confidence: f32,
}

impl RecognizeResult {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            data: RecognizeData {
                text: text.into(),
                confidence,
            },
        }
    }
}
