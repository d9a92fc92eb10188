// Shared helpers for integration tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use tesspool::{
    ImageData, OcrWorker, RecognizeResult, Result, TessError, WorkerFactory, WorkerOptions,
    WorkerParams,
};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Counts `ERROR` events seen while its guard is alive on the current thread.
#[derive(Clone, Default)]
pub struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub fn capture_errors() -> (ErrorCounter, tracing::subscriber::DefaultGuard) {
    let counter = ErrorCounter::default();
    let guard = tracing_subscriber::registry()
        .with(counter.clone())
        .set_default();
    (counter, guard)
}

/// Setup step at which a mock worker fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Create,
    Load,
    LoadLanguage,
    Initialize,
    SetParameters,
}

/// Worker factory producing scripted in-memory workers.
pub struct MockWorkerFactory {
    created: AtomicUsize,
    failing: HashSet<usize>,
    fail_at: FailAt,
    panics: bool,
    text: String,
    /// Setup calls in order, prefixed with the worker index.
    pub calls: Arc<Mutex<Vec<String>>>,
    /// Dimensions of every image recognized by any worker.
    pub seen: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl MockWorkerFactory {
    pub fn new(text: &str) -> Self {
        Self {
            created: AtomicUsize::new(0),
            failing: HashSet::new(),
            fail_at: FailAt::Initialize,
            panics: false,
            text: text.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make the workers created at these (zero-based) positions fail.
    pub fn failing(mut self, indices: &[usize], at: FailAt) -> Self {
        self.failing = indices.iter().copied().collect();
        self.fail_at = at;
        self
    }

    /// Failing steps panic instead of returning an error.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn seen(&self) -> Vec<(u32, u32)> {
        self.seen.lock().unwrap().clone()
    }
}

impl WorkerFactory for MockWorkerFactory {
    fn create_worker(&self, _options: &WorkerOptions) -> Result<Box<dyn OcrWorker>> {
        let index = self.created.fetch_add(1, Ordering::SeqCst);
        let fail_at = self.failing.contains(&index).then_some(self.fail_at);
        self.calls.lock().unwrap().push(format!("{index}:create"));

        if fail_at == Some(FailAt::Create) {
            return Err(TessError::WorkerInit(format!("worker {index} could not be created")));
        }

        Ok(Box::new(MockWorker {
            index,
            fail_at,
            panics: self.panics,
            text: self.text.clone(),
            calls: Arc::clone(&self.calls),
            seen: Arc::clone(&self.seen),
        }))
    }
}

pub struct MockWorker {
    index: usize,
    fail_at: Option<FailAt>,
    panics: bool,
    text: String,
    calls: Arc<Mutex<Vec<String>>>,
    seen: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl MockWorker {
    fn step(&self, name: String, step: FailAt) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{name}", self.index));
        if self.fail_at == Some(step) {
            if self.panics {
                panic!("worker {} crashed at {name}", self.index);
            }
            return Err(TessError::WorkerInit(format!(
                "worker {} failed at {name}",
                self.index
            )));
        }
        Ok(())
    }
}

impl OcrWorker for MockWorker {
    fn load(&mut self) -> Result<()> {
        self.step("load".to_string(), FailAt::Load)
    }

    fn load_language(&mut self, langs: &str) -> Result<()> {
        self.step(format!("load_language({langs})"), FailAt::LoadLanguage)
    }

    fn initialize(&mut self, langs: &str) -> Result<()> {
        self.step(format!("initialize({langs})"), FailAt::Initialize)
    }

    fn set_parameters(&mut self, params: &WorkerParams) -> Result<()> {
        let psm = params
            .pageseg_mode
            .map(|p| p.to_string())
            .unwrap_or_default();
        self.step(format!("set_parameters({psm})"), FailAt::SetParameters)
    }

    fn recognize(&mut self, image: &ImageData) -> Result<RecognizeResult> {
        self.seen.lock().unwrap().push((image.width, image.height));
        if image.data.is_empty() {
            return Err(TessError::Recognition("empty pixel buffer".to_string()));
        }
        Ok(RecognizeResult::new(self.text.clone(), 95.0))
    }
}
