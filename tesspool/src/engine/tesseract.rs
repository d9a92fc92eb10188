use std::path::Path;

use leptess::{LepTess, Variable};
use tracing::debug;

use super::{OcrWorker, RecognizeResult, WorkerFactory};
use crate::config::{WorkerOptions, WorkerParams};
use crate::error::{Result, TessError};
use crate::image_ops::ImageData;

/// Creates local Tesseract workers backed by leptess.
#[derive(Debug, Clone, Copy, Default)]
pub struct TesseractWorkerFactory;

impl WorkerFactory for TesseractWorkerFactory {
    fn create_worker(&self, options: &WorkerOptions) -> Result<Box<dyn OcrWorker>> {
        Ok(Box::new(TesseractWorker::new(options.data_path.clone())))
    }
}

pub struct TesseractWorker {
    data_path: Option<String>,
    api: Option<LepTess>,
    source_resolution: Option<i32>,
}

impl TesseractWorker {
    pub fn new(data_path: Option<String>) -> Self {
        Self {
            data_path,
            api: None,
            source_resolution: None,
        }
    }

    fn api_mut(&mut self) -> Result<&mut LepTess> {
        self.api
            .as_mut()
            .ok_or_else(|| TessError::WorkerInit("Tesseract worker is not initialized".to_string()))
    }
}

impl OcrWorker for TesseractWorker {
    fn load(&mut self) -> Result<()> {
        if let Some(path) = &self.data_path {
            if !Path::new(path).is_dir() {
                return Err(TessError::WorkerInit(format!(
                    "tessdata directory not found: {path}"
                )));
            }
        }
        Ok(())
    }

    fn load_language(&mut self, langs: &str) -> Result<()> {
        if langs.trim().is_empty() {
            return Err(TessError::WorkerInit("no language requested".to_string()));
        }

        // Without an explicit data path the engine resolves models itself
        // and reports missing ones from `initialize`.
        let Some(path) = &self.data_path else {
            return Ok(());
        };

        for lang in langs.split('+') {
            let model = Path::new(path).join(format!("{lang}.traineddata"));
            if !model.is_file() {
                return Err(TessError::WorkerInit(format!(
                    "language model '{lang}' not found at {}",
                    model.display()
                )));
            }
        }
        Ok(())
    }

    fn initialize(&mut self, langs: &str) -> Result<()> {
        let api = LepTess::new(self.data_path.as_deref(), langs)
            .map_err(|e| TessError::WorkerInit(format!("Failed to initialize Tesseract: {e}")))?;
        self.api = Some(api);
        Ok(())
    }

    fn set_parameters(&mut self, params: &WorkerParams) -> Result<()> {
        self.source_resolution = params.source_resolution;
        let api = self.api_mut()?;

        let mut variables: Vec<(&str, Variable, String)> = Vec::new();
        if let Some(whitelist) = &params.char_whitelist {
            variables.push((
                "tessedit_char_whitelist",
                Variable::TesseditCharWhitelist,
                whitelist.clone(),
            ));
        }
        if let Some(blacklist) = &params.char_blacklist {
            variables.push((
                "tessedit_char_blacklist",
                Variable::TesseditCharBlacklist,
                blacklist.clone(),
            ));
        }
        if let Some(psm) = params.pageseg_mode {
            variables.push((
                "tessedit_pageseg_mode",
                Variable::TesseditPagesegMode,
                psm.to_string(),
            ));
        }
        if let Some(preserve) = params.preserve_interword_spaces {
            let value = if preserve { "1" } else { "0" };
            variables.push((
                "preserve_interword_spaces",
                Variable::PreserveInterwordSpaces,
                value.to_string(),
            ));
        }

        for (name, variable, value) in variables {
            api.set_variable(variable, &value).map_err(|e| {
                TessError::WorkerInit(format!("Failed to set {name}={value}: {e:?}"))
            })?;
        }
        Ok(())
    }

    fn recognize(&mut self, image: &ImageData) -> Result<RecognizeResult> {
        let png = image.to_png()?;
        let source_resolution = self.source_resolution;
        let api = self
            .api
            .as_mut()
            .ok_or_else(|| TessError::Recognition("Tesseract worker is not initialized".to_string()))?;

        api.set_image_from_mem(&png)
            .map_err(|e| TessError::Recognition(format!("Failed to set image: {e}")))?;
        if let Some(dpi) = source_resolution {
            api.set_source_resolution(dpi);
        }

        let text = api
            .get_utf8_text()
            .map_err(|e| TessError::Recognition(format!("Failed to extract text: {e}")))?;
        let confidence = api.mean_text_conf() as f32;

        debug!(
            width = image.width,
            height = image.height,
            text_length = text.len(),
            confidence,
            "Tesseract recognition finished"
        );

        Ok(RecognizeResult::new(text, confidence))
    }
}
