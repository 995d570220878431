use anyhow::{anyhow, Context};
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontStyle;
use std::{io::Cursor, path::Path, sync::OnceLock};
use tracing::info;

use crate::error::ChartError;

pub const FONT_FAMILY: &str = "sans-serif";

pub type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

static TEXT_FONT: OnceLock<&'static str> = OnceLock::new();

/// Registers the font used for captions, ticks and annotations. Called once
/// at startup; without it charts are drawn with data marks only.
pub fn register_font_file(path: &Path) -> anyhow::Result<()> {
    if TEXT_FONT.get().is_some() {
        return Ok(());
    }
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read font {}", path.display()))?;
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, bytes)
        .map_err(|_| anyhow!("invalid font file {}", path.display()))?;
    let _ = TEXT_FONT.set(FONT_FAMILY);
    info!("registered chart font {}", path.display());
    Ok(())
}

pub fn text_enabled() -> bool {
    TEXT_FONT.get().is_some()
}

/// Pixel surface owned by a single render call. Drawing happens inside
/// `render`; the buffer is either encoded or dropped before it returns.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 3],
        }
    }

    /// Paints on a white background and returns the PNG bytes.
    pub fn render<F>(self, paint: F) -> Result<Vec<u8>, ChartError>
    where
        F: FnOnce(&Area<'_>) -> anyhow::Result<()>,
    {
        let Canvas {
            width,
            height,
            mut pixels,
        } = self;
        {
            let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(ChartError::render)?;
            paint(&root).map_err(|e| ChartError::RenderFailure(format!("{:#}", e)))?;
            root.present().map_err(ChartError::render)?;
        }
        encode_png(width, height, pixels)
    }
}

fn encode_png(width: u32, height: u32, pixels: Vec<u8>) -> Result<Vec<u8>, ChartError> {
    let img = RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| ChartError::RenderFailure("pixel buffer does not match canvas size".into()))?;
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .map_err(ChartError::render)?;
    Ok(out.into_inner())
}
