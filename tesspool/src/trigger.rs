//! Triggers react to images coming from some external source.
//!
//! A `TesseractTrigger` crops, normalizes and pads each image, runs it
//! through the OCR pool and hands the text to a callback.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use tracing::debug;

use crate::error::Result;
use crate::image_ops::{
    ensure_minimum_size, pad_uniform, Crop, Rgba, ThresholdFilter, MIN_DIMENSION, PADDING,
};
use crate::pool::recognize_text;
use crate::scheduler::Scheduler;

pub type TextCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[async_trait]
pub trait Trigger: Send + Sync {
    async fn run(&self, image: DynamicImage) -> Result<()>;
}

pub struct TesseractTrigger {
    pub crop: Option<Crop>,
    pub threshold: Option<ThresholdFilter>,
    pub scheduler: Arc<Scheduler>,
    pub on_text: Option<TextCallback>,
}

impl TesseractTrigger {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self {
            crop: None,
            threshold: None,
            scheduler,
            on_text: None,
        }
    }

    pub fn with_crop(mut self, crop: Crop) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn with_threshold(mut self, threshold: ThresholdFilter) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn on_text(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_text = Some(Arc::new(callback));
        self
    }

    /// Crop, enforce the minimum size, threshold, then pad with white.
    pub fn preprocess(&self, image: DynamicImage) -> DynamicImage {
        let mut image = image;
        if let Some(crop) = &self.crop {
            image = crop.apply(image);
        }
        image = ensure_minimum_size(image, MIN_DIMENSION);
        if let Some(threshold) = &self.threshold {
            image = threshold.apply(image);
        }
        pad_uniform(image, PADDING, Rgba::WHITE)
    }
}

#[async_trait]
impl Trigger for TesseractTrigger {
    async fn run(&self, image: DynamicImage) -> Result<()> {
        let image = self.preprocess(image);
        let text = recognize_text(&image, &self.scheduler).await?;
        debug!(text_length = text.len(), "Trigger recognized text");
        if let Some(on_text) = &self.on_text {
            on_text(&text);
        }
        Ok(())
    }
}

impl fmt::Debug for TesseractTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TesseractTrigger")
            .field("crop", &self.crop)
            .field("threshold", &self.threshold)
            .field("workers", &self.scheduler.num_workers())
            .field("on_text", &self.on_text.is_some())
            .finish()
    }
}
