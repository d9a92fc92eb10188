//! Tesspool
//!
//! Preprocesses in-memory images and forwards them to a pool of OCR workers.
//!
//! # Architecture
//!
//! - `image_ops`: crop, minimum-size enforcement, threshold and padding
//! - `engine`: `OcrWorker` / `WorkerFactory` seam, Tesseract implementation
//! - `scheduler`: job queue shared by the registered workers
//! - `pool`: sequential pool initialization and the `recognize_text` helper
//! - `trigger`: `TesseractTrigger` tying preprocessing and recognition together
//! - `runner`: background task feeding images to a trigger
//!
//! # Usage
//!
//! ```rust,ignore
//! let scheduler = Arc::new(init_tesseract_scheduler(Default::default()).await?);
//! let trigger = TesseractTrigger::new(scheduler)
//!     .with_crop(Crop::new(10.0, 80.0, 30.0, 10.0))
//!     .on_text(|text| println!("{text}"));
//! trigger.run(image::open("frame.png")?).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod image_ops;
pub mod pool;
pub mod runner;
pub mod scheduler;
pub mod trigger;

pub use config::{
    load_options, ErrorHandler, InitPolicy, PartialTesseractOptions, TesseractOptions,
    WorkerOptions, WorkerParams,
};
pub use engine::{Job, OcrWorker, RecognizeData, RecognizeResult, WorkerFactory};
pub use error::{Result, TessError};
pub use image_ops::{Crop, ImageData, Rgba, ThresholdFilter};
#[cfg(feature = "tesseract")]
pub use pool::init_tesseract_scheduler;
pub use pool::{init_scheduler, init_tesseract_worker, recognize_text};
pub use runner::{RunnerStats, TriggerRunner};
pub use scheduler::Scheduler;
pub use trigger::{TesseractTrigger, TextCallback, Trigger};
