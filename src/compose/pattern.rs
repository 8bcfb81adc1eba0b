//! Pattern fill: tiles a swatch across a layer and masks it to the layer's alpha.
//!
//! The algorithm, for a canvas of `W × H` and a swatch of `pw × ph`:
//!
//! 1. contain-fit the layer art to the canvas; its alpha channel is the mask
//! 2. `tiles_x = ceil(W / pw) + 1`, `tiles_y = ceil(H / ph) + 1`
//! 3. stamp the swatch at every `(x·pw, y·ph)` of a transparent surface
//! 4. crop the top-left `W × H` of that surface
//! 5. destination-in: keep swatch color where the mask is non-zero, with the
//!    mask's exact alpha
//!
//! Tiling is always anchored at the canvas origin, so two layers filled with
//! the same swatch line up at the same absolute positions.
//!
//! Any failure (fetch, decode, tile math) falls back to the resized, unfilled
//! layer; the caller gets a [`FillOutcome`] saying which happened.

use std::sync::Arc;
use std::time::Duration;

use image::imageops;
use image::RgbaImage;
use tracing::{debug, warn};

use crate::compose::resize::contain_fit;
use crate::contract::{AssetFetcher, BoxError};
use crate::model::CanvasSize;

/// Swatch size used when the pattern's dimensions cannot be read.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Result of filling one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    Filled,
    Fallback { reason: String },
}

#[derive(Debug, Clone)]
pub struct PatternFill {
    pub image: RgbaImage,
    pub outcome: FillOutcome,
}

pub struct PatternApplier {
    fetcher: Arc<dyn AssetFetcher>,
    fetch_timeout: Duration,
}

impl PatternApplier {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            fetch_timeout,
        }
    }

    /// Fill `base` with the swatch at `pattern_url`. Never fails: on error the
    /// contain-fit base is returned with a [`FillOutcome::Fallback`].
    pub async fn apply(&self, base: &RgbaImage, pattern_url: &str, canvas: CanvasSize) -> PatternFill {
        let resized = Arc::new(contain_fit(base, canvas));

        match self.try_fill(Arc::clone(&resized), pattern_url, canvas).await {
            Ok(image) => {
                debug!(pattern_url, "Pattern applied");
                PatternFill {
                    image,
                    outcome: FillOutcome::Filled,
                }
            }
            Err(e) => {
                warn!(pattern_url, error = %e, "Pattern fill failed, using unpatterned layer");
                PatternFill {
                    image: Arc::try_unwrap(resized).unwrap_or_else(|shared| (*shared).clone()),
                    outcome: FillOutcome::Fallback {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    async fn try_fill(
        &self,
        mask: Arc<RgbaImage>,
        pattern_url: &str,
        canvas: CanvasSize,
    ) -> Result<RgbaImage, BoxError> {
        let bytes = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(pattern_url))
            .await
            .map_err(|_| format!("pattern fetch timed out after {:?}", self.fetch_timeout))??;

        let filled = tokio::task::spawn_blocking(move || -> Result<RgbaImage, BoxError> {
            let swatch = decode_swatch(&bytes)?;
            fill_layer(&mask, &swatch, canvas)
        })
        .await??;
        Ok(filled)
    }
}

/// Decode a swatch and normalize its dimensions with [`normalize_swatch`].
pub fn decode_swatch(bytes: &[u8]) -> Result<RgbaImage, BoxError> {
    let decoded = image::load_from_memory(bytes)?.to_rgba8();
    Ok(normalize_swatch(decoded))
}

/// A swatch with a zero width or height becomes a transparent
/// [`DEFAULT_TILE_SIZE`] square; any other swatch is returned unchanged.
pub fn normalize_swatch(swatch: RgbaImage) -> RgbaImage {
    let (w, h) = swatch.dimensions();
    if w > 0 && h > 0 {
        return swatch;
    }
    debug!(width = w, height = h, "Swatch has no area, using default tile size");
    RgbaImage::new(DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE)
}

/// `(ceil(W / pw) + 1, ceil(H / ph) + 1)`. The extra row and column guarantee
/// coverage of the far edges when the canvas is not a multiple of the swatch.
pub fn tile_counts(canvas: CanvasSize, pattern_w: u32, pattern_h: u32) -> Result<(u32, u32), BoxError> {
    if pattern_w == 0 || pattern_h == 0 {
        return Err(format!("pattern has zero dimension {pattern_w}x{pattern_h}").into());
    }
    Ok((
        canvas.width.div_ceil(pattern_w) + 1,
        canvas.height.div_ceil(pattern_h) + 1,
    ))
}

/// Stamp `swatch` on a `tiles_x × tiles_y` grid over a transparent surface.
pub fn tile_surface(swatch: &RgbaImage, tiles_x: u32, tiles_y: u32) -> Result<RgbaImage, BoxError> {
    let (pw, ph) = swatch.dimensions();
    let width = pw
        .checked_mul(tiles_x)
        .ok_or("tiled surface width overflows")?;
    let height = ph
        .checked_mul(tiles_y)
        .ok_or("tiled surface height overflows")?;

    let mut surface = RgbaImage::new(width, height);
    for y in 0..tiles_y {
        for x in 0..tiles_x {
            imageops::replace(
                &mut surface,
                swatch,
                i64::from(x * pw),
                i64::from(y * ph),
            );
        }
    }
    Ok(surface)
}

/// Tile, crop at the origin, and mask `swatch` against `mask` (already canvas-sized).
pub fn fill_layer(mask: &RgbaImage, swatch: &RgbaImage, canvas: CanvasSize) -> Result<RgbaImage, BoxError> {
    if mask.dimensions() != (canvas.width, canvas.height) {
        return Err(format!(
            "mask is {}x{}, expected {}x{}",
            mask.width(),
            mask.height(),
            canvas.width,
            canvas.height
        )
        .into());
    }

    let (tiles_x, tiles_y) = tile_counts(canvas, swatch.width(), swatch.height())?;
    let surface = tile_surface(swatch, tiles_x, tiles_y)?;
    let mut tiled = imageops::crop_imm(&surface, 0, 0, canvas.width, canvas.height).to_image();
    drop(surface);

    destination_in(&mut tiled, mask);
    Ok(tiled)
}

/// Keep `top`'s color where `mask` alpha is non-zero and take the mask's alpha verbatim.
pub fn destination_in(top: &mut RgbaImage, mask: &RgbaImage) {
    for (px, m) in top.pixels_mut().zip(mask.pixels()) {
        let alpha = m[3];
        if alpha == 0 {
            px.0 = [0, 0, 0, 0];
        } else {
            px[3] = alpha;
        }
    }
}
