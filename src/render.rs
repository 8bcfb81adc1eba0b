//! Render requests: validation, composition, and hand-off to the uploader.
//!
//! # Responsibilities
//! - Reject malformed requests before any network or CPU work starts
//! - Run the [`ImageComposer`] at the requested canvas size
//! - Upload the full-resolution composite (the technical plant) and a
//!   downscaled preview through a [`RenderUploader`]
//! - Report timing and per-layer outcomes in a [`RenderResponse`]
//!
//! Validation failures are returned as `Err`; everything that goes wrong after
//! validation is reported in the response with `success: false`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::compose::composer::{encode_png, ComposedImage, ImageComposer, LayerReport};
use crate::compose::resize::fit_dimensions;
use crate::contract::RenderUploader;
use crate::error::{ComposeError, RenderError};
use crate::model::{CanvasSize, CustomizationMap, Layer, LayerCustomization};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub item_id: String,
    #[serde(default)]
    pub collection_id: String,
    pub customizations: Vec<LayerCustomization>,
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRender {
    pub item_id: String,
    pub customizations: CustomizationMap,
    pub layers: Vec<Layer>,
    pub canvas: CanvasSize,
}

impl RenderRequest {
    /// Check the request and key customizations by layer. Two customizations
    /// for the same layer are rejected rather than silently overriding each other.
    pub fn validate(&self, defaults: CanvasSize, max_dimension: u32) -> Result<ValidatedRender, RenderError> {
        if self.item_id.trim().is_empty() {
            return Err(RenderError::validation("item_id is required"));
        }
        // The id becomes a path segment of the upload key.
        if self.item_id.contains(['/', '\\'])
            || self.item_id.contains("..")
            || self.item_id.chars().any(char::is_control)
        {
            return Err(RenderError::validation(format!(
                "item_id '{}' contains path separators or control characters",
                self.item_id.escape_debug()
            )));
        }
        if self.customizations.is_empty() {
            return Err(RenderError::validation("at least one customization is required"));
        }
        if self.layers.is_empty() {
            return Err(RenderError::validation("item has no layers"));
        }

        let mut customizations = BTreeMap::new();
        for c in &self.customizations {
            if c.pattern_url.trim().is_empty() {
                return Err(RenderError::validation(format!(
                    "customization for layer {} has no pattern_url",
                    c.layer_index
                )));
            }
            if customizations.insert(c.layer_index, c.clone()).is_some() {
                return Err(RenderError::validation(format!(
                    "duplicate customization for layer {}",
                    c.layer_index
                )));
            }
        }

        let canvas = CanvasSize::new(
            self.width.unwrap_or(defaults.width),
            self.height.unwrap_or(defaults.height),
        );
        if canvas.width == 0 || canvas.height == 0 {
            return Err(RenderError::validation("canvas dimensions must be positive"));
        }
        if canvas.width > max_dimension || canvas.height > max_dimension {
            return Err(RenderError::validation(format!(
                "canvas {}x{} exceeds maximum dimension {max_dimension}",
                canvas.width, canvas.height
            )));
        }

        Ok(ValidatedRender {
            item_id: self.item_id.clone(),
            customizations,
            layers: self.layers.clone(),
            canvas,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderResponse {
    pub success: bool,
    pub preview_url: Option<String>,
    pub technical_plant_url: Option<String>,
    pub render_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub width: u32,
    pub height: u32,
    pub layers: Vec<LayerReport>,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub canvas: CanvasSize,
    pub max_dimension: u32,
    pub preview_max_edge: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::default(),
            max_dimension: 8000,
            preview_max_edge: 1024,
        }
    }
}

pub struct RenderService {
    composer: ImageComposer,
    uploader: Arc<dyn RenderUploader>,
    settings: RenderSettings,
}

impl RenderService {
    pub fn new(composer: ImageComposer, uploader: Arc<dyn RenderUploader>, settings: RenderSettings) -> Self {
        Self {
            composer,
            uploader,
            settings,
        }
    }

    pub async fn render(&self, request: &RenderRequest) -> Result<RenderResponse, RenderError> {
        let validated = request.validate(self.settings.canvas, self.settings.max_dimension)?;
        let started = Instant::now();
        let render_id = Uuid::new_v4();
        info!(
            item_id = %validated.item_id,
            render_id = %render_id,
            customizations = validated.customizations.len(),
            "[RENDER] Starting render"
        );

        let outcome = self.compose_and_upload(&validated, render_id).await;
        let render_time_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok((composed, preview_url, technical_plant_url)) => {
                info!(render_id = %render_id, render_time_ms, "[RENDER] Render complete");
                Ok(RenderResponse {
                    success: true,
                    preview_url: Some(preview_url),
                    technical_plant_url: Some(technical_plant_url),
                    render_time_ms,
                    error: None,
                    width: composed.width,
                    height: composed.height,
                    layers: composed.layers,
                })
            }
            Err(e) => {
                error!(render_id = %render_id, error = %e, "[RENDER] Render failed");
                Ok(RenderResponse {
                    success: false,
                    preview_url: None,
                    technical_plant_url: None,
                    render_time_ms,
                    error: Some(e.to_string()),
                    width: 0,
                    height: 0,
                    layers: Vec::new(),
                })
            }
        }
    }

    async fn compose_and_upload(
        &self,
        validated: &ValidatedRender,
        render_id: Uuid,
    ) -> Result<(ComposedImage, String, String), RenderError> {
        let composed = self
            .composer
            .compose(&validated.layers, &validated.customizations, validated.canvas)
            .await?;

        let preview = preview_png(&composed.bytes, self.settings.preview_max_edge)?;

        let base_key = format!("renders/{}/{}", validated.item_id, render_id);
        let technical_key = format!("{base_key}-technical.png");
        let preview_key = format!("{base_key}-preview.png");

        let technical_plant_url = self.upload(&technical_key, composed.bytes.clone()).await?;
        let preview_url = self.upload(&preview_key, preview).await?;
        Ok((composed, preview_url, technical_plant_url))
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<String, RenderError> {
        self.uploader
            .upload(key, bytes, "image/png")
            .await
            .map_err(|source| RenderError::Upload {
                key: key.to_string(),
                source,
            })
    }
}

/// Downscale an encoded PNG so its longest edge is at most `max_edge`.
fn preview_png(full: &[u8], max_edge: u32) -> Result<Vec<u8>, RenderError> {
    let decoded = image::load_from_memory(full)
        .map_err(ComposeError::from)?
        .to_rgba8();
    let (w, h) = decoded.dimensions();
    if max_edge == 0 || (w <= max_edge && h <= max_edge) {
        return Ok(full.to_vec());
    }
    let (pw, ph) = fit_dimensions(w, h, CanvasSize::new(max_edge, max_edge));
    let preview = imageops::resize(&decoded, pw, ph, FilterType::Triangle);
    let bytes = encode_png(&preview).map_err(ComposeError::from)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LayerType;

    fn request() -> RenderRequest {
        RenderRequest {
            item_id: "tees-basic".into(),
            collection_id: "tees".into(),
            customizations: vec![LayerCustomization {
                layer_index: 1,
                pattern_id: "3".into(),
                pattern_url: "https://cdn.test/textures/3.png".into(),
                pattern_name: "3".into(),
            }],
            layers: vec![Layer {
                index: 1,
                file: "1.png".into(),
                url: "https://cdn.test/tees/basic/1.png".into(),
                layer_type: LayerType::Pattern,
            }],
            width: None,
            height: None,
        }
    }

    #[test]
    fn defaults_fill_missing_dimensions() {
        let v = request().validate(CanvasSize::new(2000, 2000), 8000).unwrap();
        assert_eq!(v.canvas, CanvasSize::new(2000, 2000));
        assert!(v.customizations.contains_key(&1));
    }

    #[test]
    fn oversized_canvas_is_rejected() {
        let mut req = request();
        req.width = Some(9000);
        assert!(matches!(
            req.validate(CanvasSize::default(), 8000),
            Err(RenderError::Validation(_))
        ));
    }

    #[test]
    fn preview_respects_max_edge() {
        let img = image::RgbaImage::new(40, 20);
        let full = encode_png(&img).unwrap();
        let preview = preview_png(&full, 10).unwrap();
        let decoded = image::load_from_memory(&preview).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 5));
    }
}
