//! Layer stacking: fetch → decode → optional pattern fill → contain-fit → composite.
//!
//! Layers are composited strictly in ascending index order (index 0 at the
//! bottom). Base-art fetches may run concurrently, but decoding, filling and
//! compositing happen one layer at a time so only one working surface is alive.
//!
//! A layer that cannot be fetched or decoded is skipped; a pattern that cannot
//! be applied falls back to the unfilled layer. Neither aborts the render. Every
//! layer's fate is recorded in a [`LayerReport`].
//!
//! When the overall deadline fires, an in-flight pattern fill running on
//! `spawn_blocking` is detached, not cancelled: it runs to completion on the
//! blocking pool and its buffers are freed only then, so one extra working
//! surface may outlive the failed render.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use image::imageops;
use image::{ImageFormat, ImageReader, RgbaImage};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::compose::pattern::{FillOutcome, PatternApplier};
use crate::compose::resize::contain_fit;
use crate::contract::{AssetFetcher, BoxError};
use crate::error::ComposeError;
use crate::model::{CanvasSize, CustomizationMap, Layer};

/// What happened to one layer during composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LayerStatus {
    /// Composited as uploaded.
    Original,
    /// Filled with the requested pattern.
    Patterned { pattern_id: String },
    /// Pattern requested but could not be applied; composited unfilled.
    Fallback { pattern_id: String, reason: String },
    /// Base art unavailable; nothing composited for this layer.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerReport {
    pub index: u32,
    #[serde(flatten)]
    pub status: LayerStatus,
}

/// Encoded output plus the dimensions read back from the encoded bytes.
#[derive(Debug, Clone)]
pub struct ComposedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: &'static str,
    pub layers: Vec<LayerReport>,
}

impl ComposedImage {
    pub fn fallback_layers(&self) -> impl Iterator<Item = &LayerReport> {
        self.layers
            .iter()
            .filter(|r| !matches!(r.status, LayerStatus::Original | LayerStatus::Patterned { .. }))
    }
}

#[derive(Debug, Clone)]
pub struct ComposeOptions {
    pub fetch_timeout: Duration,
    pub deadline: Duration,
    pub parallel_fetch: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            deadline: Duration::from_secs(120),
            parallel_fetch: true,
        }
    }
}

pub struct ImageComposer {
    fetcher: Arc<dyn AssetFetcher>,
    applier: PatternApplier,
    options: ComposeOptions,
}

impl ImageComposer {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, options: ComposeOptions) -> Self {
        let applier = PatternApplier::new(Arc::clone(&fetcher), options.fetch_timeout);
        Self {
            fetcher,
            applier,
            options,
        }
    }

    /// Compose `layers` onto a transparent `canvas`, filling customized pattern layers.
    #[instrument(skip_all, fields(layers = layers.len(), width = canvas.width, height = canvas.height))]
    pub async fn compose(
        &self,
        layers: &[Layer],
        customizations: &CustomizationMap,
        canvas: CanvasSize,
    ) -> Result<ComposedImage, ComposeError> {
        if canvas.width == 0 || canvas.height == 0 {
            return Err(ComposeError::InvalidCanvas {
                width: canvas.width,
                height: canvas.height,
            });
        }

        let deadline = self.options.deadline;
        tokio::time::timeout(deadline, self.compose_inner(layers, customizations, canvas))
            .await
            .map_err(|_| ComposeError::DeadlineExceeded(deadline))?
    }

    async fn compose_inner(
        &self,
        layers: &[Layer],
        customizations: &CustomizationMap,
        canvas: CanvasSize,
    ) -> Result<ComposedImage, ComposeError> {
        let mut ordered: Vec<&Layer> = layers.iter().collect();
        ordered.sort_by_key(|l| l.index);

        for index in customizations.keys() {
            if !ordered.iter().any(|l| l.index == *index) {
                warn!(layer_index = index, "[RENDER] Customization targets a missing layer, ignoring");
            }
        }

        let fetched = self.fetch_layers(&ordered).await;

        let mut canvas_image = RgbaImage::new(canvas.width, canvas.height);
        let mut reports = Vec::with_capacity(ordered.len());

        for (layer, bytes) in ordered.iter().zip(fetched) {
            let (rendered, status) = self.render_layer(layer, bytes, customizations, canvas).await;
            if let Some(rendered) = rendered {
                imageops::overlay(&mut canvas_image, &rendered, 0, 0);
            }
            debug!(layer_index = layer.index, status = ?status, "[RENDER] Layer composited");
            reports.push(LayerReport {
                index: layer.index,
                status,
            });
        }

        let bytes = encode_png(&canvas_image)?;
        drop(canvas_image);

        // Dimensions come from the encoded result, not the request.
        let (width, height) = ImageReader::with_format(Cursor::new(&bytes), ImageFormat::Png)
            .into_dimensions()?;

        info!(
            width,
            height,
            bytes = bytes.len(),
            layers = reports.len(),
            "[RENDER] Composition complete"
        );
        Ok(ComposedImage {
            bytes,
            width,
            height,
            format: "png",
            layers: reports,
        })
    }

    async fn fetch_layers(&self, layers: &[&Layer]) -> Vec<Result<Vec<u8>, BoxError>> {
        if self.options.parallel_fetch {
            join_all(layers.iter().map(|l| self.fetch(&l.url))).await
        } else {
            let mut out = Vec::with_capacity(layers.len());
            for layer in layers {
                out.push(self.fetch(&layer.url).await);
            }
            out
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BoxError> {
        match tokio::time::timeout(self.options.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(format!("fetch timed out after {:?}", self.options.fetch_timeout).into()),
        }
    }

    /// One pipeline step. `None` image means the layer contributes nothing.
    async fn render_layer(
        &self,
        layer: &Layer,
        bytes: Result<Vec<u8>, BoxError>,
        customizations: &CustomizationMap,
        canvas: CanvasSize,
    ) -> (Option<RgbaImage>, LayerStatus) {
        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(layer_index = layer.index, url = %layer.url, error = %e, "[RENDER] Layer fetch failed, skipping");
                return (None, LayerStatus::Skipped { reason: e.to_string() });
            }
        };
        let base = match image::load_from_memory(&bytes) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                warn!(layer_index = layer.index, url = %layer.url, error = %e, "[RENDER] Layer decode failed, skipping");
                return (None, LayerStatus::Skipped { reason: e.to_string() });
            }
        };
        drop(bytes);

        let customization = customizations.get(&layer.index);
        match customization {
            Some(c) if layer.layer_type.is_customizable() => {
                let fill = self.applier.apply(&base, &c.pattern_url, canvas).await;
                let status = match fill.outcome {
                    FillOutcome::Filled => LayerStatus::Patterned {
                        pattern_id: c.pattern_id.clone(),
                    },
                    FillOutcome::Fallback { reason } => LayerStatus::Fallback {
                        pattern_id: c.pattern_id.clone(),
                        reason,
                    },
                };
                (Some(fill.image), status)
            }
            Some(_) => {
                debug!(layer_index = layer.index, "[RENDER] Fixed layer ignores customization");
                (Some(contain_fit(&base, canvas)), LayerStatus::Original)
            }
            None => (Some(contain_fit(&base, canvas)), LayerStatus::Original),
        }
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
