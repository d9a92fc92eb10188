use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tesspool::engine::TesseractWorkerFactory;
use tesspool::{
    init_scheduler, load_options, Crop, InitPolicy, PartialTesseractOptions, TesseractOptions,
    TesseractTrigger, ThresholdFilter, Trigger, WorkerOptions, WorkerParams,
};

#[derive(Parser)]
#[command(name = "tesspool")]
#[command(about = "Recognize text in images through a pool of Tesseract workers")]
struct Args {
    /// Image files to recognize
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// JSON file with pool options (defaults come from the environment otherwise)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of Tesseract workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Tesseract language string, e.g. eng or eng+deu
    #[arg(short, long)]
    langs: Option<String>,

    /// Directory containing *.traineddata files
    #[arg(long)]
    tessdata: Option<String>,

    /// Crop region as left,top,width,height percentages
    #[arg(long)]
    crop: Option<Crop>,

    /// Keep only pixels near a colour: r,g,b,threshold
    #[arg(long)]
    threshold: Option<ThresholdFilter>,

    /// Restrict recognition to these characters
    #[arg(long)]
    whitelist: Option<String>,

    /// Tesseract page segmentation mode
    #[arg(long)]
    psm: Option<u8>,

    /// Abort if any worker fails to start
    #[arg(long)]
    fail_fast: bool,

    /// Print one JSON object per image instead of plain text
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn overrides(&self, base: &TesseractOptions) -> PartialTesseractOptions {
        let worker_options = self.tessdata.as_ref().map(|path| WorkerOptions {
            data_path: Some(path.clone()),
            ..base.worker_options.clone()
        });

        let worker_params = if self.whitelist.is_some() || self.psm.is_some() {
            Some(WorkerParams {
                char_whitelist: self
                    .whitelist
                    .clone()
                    .or_else(|| base.worker_params.char_whitelist.clone()),
                pageseg_mode: self.psm.or(base.worker_params.pageseg_mode),
                ..base.worker_params.clone()
            })
        } else {
            None
        };

        PartialTesseractOptions {
            num_workers: self.workers,
            langs: self.langs.clone(),
            worker_options,
            worker_params,
            init_policy: self.fail_fast.then_some(InitPolicy::FailFast),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tesspool=info".into()),
        )
        .with(
            args.log_json
                .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with(
            (!args.log_json)
                .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
        .init();

    let base = match &args.config {
        Some(path) => load_options(path)?,
        None => TesseractOptions::from_env(),
    };
    let overrides = args.overrides(&base);
    let options = base.merge(overrides);

    tracing::info!(
        "Starting {} Tesseract worker(s) for '{}'...",
        options.num_workers,
        options.langs
    );
    let scheduler = Arc::new(init_scheduler(&TesseractWorkerFactory, &options).await?);
    if scheduler.num_workers() == 0 {
        return Err(anyhow::anyhow!(
            "No Tesseract worker could be started - check TESSDATA_PREFIX and --langs"
        ));
    }

    let runs = args.images.iter().map(|path| {
        let scheduler = Arc::clone(&scheduler);
        let json = args.json;
        let display = path.display().to_string();

        let mut trigger = TesseractTrigger::new(scheduler).on_text(move |text| {
            if json {
                println!("{}", serde_json::json!({ "path": display, "text": text }));
            } else {
                println!("==> {display} <==\n{}", text.trim_end());
            }
        });
        trigger.crop = args.crop;
        trigger.threshold = args.threshold;

        async move {
            let image = image::open(path)?;
            trigger.run(image).await?;
            Ok::<_, anyhow::Error>(())
        }
    });

    let mut failures = 0;
    for (path, result) in args
        .images
        .iter()
        .zip(futures::future::join_all(runs).await)
    {
        if let Err(e) = result {
            failures += 1;
            tracing::error!("Failed to recognize {}: {}", path.display(), e);
        }
    }

    scheduler.terminate().await;

    if failures > 0 {
        return Err(anyhow::anyhow!(
            "{failures} of {} image(s) failed",
            args.images.len()
        ));
    }

    Ok(())
}
