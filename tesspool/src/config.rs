use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, TessError};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

/// Callback receiving errors raised inside a worker after it joined the pool.
pub type ErrorHandler = Arc<dyn Fn(&TessError) + Send + Sync>;

pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|error: &TessError| {
        tracing::error!(error = %error, "[tesseract] Encountered an error inside a Tesseract worker");
    })
}

/// What the pool initializer does when a single worker fails to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitPolicy {
    /// Log the failure and continue with the remaining workers.
    #[default]
    SkipFailed,
    /// Abort initialization and return the first failure.
    FailFast,
}

/// Options used when creating each worker.
#[derive(Clone, Deserialize)]
pub struct WorkerOptions {
    /// Directory holding `*.traineddata` files; `None` uses the engine default.
    pub data_path: Option<String>,
    #[serde(skip, default = "default_error_handler")]
    pub error_handler: ErrorHandler,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            data_path: None,
            error_handler: default_error_handler(),
        }
    }
}

impl fmt::Debug for WorkerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerOptions")
            .field("data_path", &self.data_path)
            .finish_non_exhaustive()
    }
}

/// Recognition parameters applied to each worker after initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorkerParams {
    pub char_whitelist: Option<String>,
    pub char_blacklist: Option<String>,
    /// Tesseract page segmentation mode (`--psm`).
    pub pageseg_mode: Option<u8>,
    pub preserve_interword_spaces: Option<bool>,
    /// Source DPI reported to the engine.
    pub source_resolution: Option<i32>,
}

impl WorkerParams {
    pub fn is_empty(&self) -> bool {
        self == &WorkerParams::default()
    }
}

#[derive(Debug, Clone)]
pub struct TesseractOptions {
    pub num_workers: usize,
    /// Tesseract language string, e.g. `eng` or `eng+deu`.
    pub langs: String,
    pub worker_options: WorkerOptions,
    pub worker_params: WorkerParams,
    pub init_policy: InitPolicy,
}

impl Default for TesseractOptions {
    fn default() -> Self {
        Self {
            num_workers: 3,
            langs: "eng".to_string(),
            worker_options: WorkerOptions::default(),
            worker_params: WorkerParams::default(),
            init_policy: InitPolicy::SkipFailed,
        }
    }
}

/// Caller overrides; unset fields keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartialTesseractOptions {
    pub num_workers: Option<usize>,
    pub langs: Option<String>,
    pub worker_options: Option<WorkerOptions>,
    pub worker_params: Option<WorkerParams>,
    pub init_policy: Option<InitPolicy>,
}

impl TesseractOptions {
    /// Apply `overrides` on top of these options.
    pub fn merge(self, overrides: PartialTesseractOptions) -> Self {
        Self {
            num_workers: overrides.num_workers.unwrap_or(self.num_workers),
            langs: overrides.langs.unwrap_or(self.langs),
            worker_options: overrides.worker_options.unwrap_or(self.worker_options),
            worker_params: overrides.worker_params.unwrap_or(self.worker_params),
            init_policy: overrides.init_policy.unwrap_or(self.init_policy),
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            num_workers: parse_env_or("TESSPOOL_WORKERS", defaults.num_workers),
            langs: env::var("TESSPOOL_LANGS").unwrap_or(defaults.langs),
            worker_options: WorkerOptions {
                data_path: env::var("TESSDATA_PREFIX").ok(),
                ..defaults.worker_options
            },
            worker_params: WorkerParams {
                char_whitelist: env::var("TESSPOOL_WHITELIST").ok(),
                pageseg_mode: parse_env_opt("TESSPOOL_PSM"),
                ..defaults.worker_params
            },
            init_policy: if parse_env_or("TESSPOOL_FAIL_FAST", false) {
                InitPolicy::FailFast
            } else {
                defaults.init_policy
            },
        }
    }
}

/// Load overrides from a JSON file and merge them onto the defaults.
pub fn load_options(path: &Path) -> Result<TesseractOptions> {
    let content = std::fs::read_to_string(path)?;
    let overrides: PartialTesseractOptions = serde_json::from_str(&content)?;
    Ok(TesseractOptions::default().merge(overrides))
}
