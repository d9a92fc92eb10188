use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, error, info, warn};

use crate::config::{InitPolicy, TesseractOptions, WorkerOptions, WorkerParams};
use crate::engine::{Job, OcrWorker, WorkerFactory};
use crate::error::{Result, TessError};
use crate::image_ops::image_data;
use crate::scheduler::Scheduler;

#[cfg(feature = "tesseract")]
use crate::config::PartialTesseractOptions;
#[cfg(feature = "tesseract")]
use crate::engine::TesseractWorkerFactory;

/// Build a scheduler of local Tesseract workers.
///
/// `overrides` are merged onto `TesseractOptions::default()`.
#[cfg(feature = "tesseract")]
pub async fn init_tesseract_scheduler(overrides: PartialTesseractOptions) -> Result<Scheduler> {
    let options = TesseractOptions::default().merge(overrides);
    init_scheduler(&TesseractWorkerFactory, &options).await
}

/// Build a scheduler holding up to `options.num_workers` ready workers.
///
/// Workers are brought up one after another. With `InitPolicy::SkipFailed`
/// a worker whose setup fails is logged and left out, so the pool can end
/// up smaller than requested. `InitPolicy::FailFast` returns the first
/// setup error instead.
pub async fn init_scheduler(
    factory: &dyn WorkerFactory,
    options: &TesseractOptions,
) -> Result<Scheduler> {
    let scheduler = Scheduler::new(Arc::clone(&options.worker_options.error_handler));

    for index in 0..options.num_workers {
        let worker = init_tesseract_worker(
            factory,
            &options.worker_options,
            &options.worker_params,
            &options.langs,
        )
        .await;

        match worker {
            Ok(worker) => {
                let id = scheduler.add_worker(worker);
                debug!(worker = id, "OCR worker ready");
            }
            Err(e) => {
                error!(worker = index, error = %e, "Failed to initialize OCR worker");
                if options.init_policy == InitPolicy::FailFast {
                    scheduler.terminate().await;
                    return Err(e);
                }
            }
        }
    }

    let ready = scheduler.num_workers();
    if ready < options.num_workers {
        warn!(
            ready,
            requested = options.num_workers,
            "OCR pool started with fewer workers than requested"
        );
    }
    info!(workers = ready, langs = %options.langs, "OCR scheduler initialized");

    Ok(scheduler)
}

/// Create one worker and run it through load, language, init and parameters.
pub async fn init_tesseract_worker(
    factory: &dyn WorkerFactory,
    options: &WorkerOptions,
    params: &WorkerParams,
    langs: &str,
) -> Result<Box<dyn OcrWorker>> {
    let mut worker = factory.create_worker(options)?;
    let params = params.clone();
    let langs = langs.to_string();

    tokio::task::spawn_blocking(move || {
        worker.load()?;
        worker.load_language(&langs)?;
        worker.initialize(&langs)?;
        worker.set_parameters(&params)?;
        Ok::<_, TessError>(worker)
    })
    .await
    .map_err(|e| TessError::WorkerInit(format!("Worker setup task panicked: {e}")))?
}

/// Recognize the text in `image` using whichever worker is free.
pub async fn recognize_text(image: &DynamicImage, scheduler: &Scheduler) -> Result<String> {
    let data = image_data(image);
    debug!(width = data.width, height = data.height, "Submitting recognize job");
    let result = scheduler.add_job(Job::Recognize(data)).await?;
    Ok(result.data.text)
}
