//! Frame renderer
//!
//! Draws the wall-clock timestamp in the top-left corner and, while the
//! camera is recording, a red dot with "REC" in the top-right corner. Runs
//! after the motion and recording decisions for the frame.

use ab_glyph::{FontArc, InvalidFont, PxScale};
use chrono::{DateTime, Local};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_text_mut, text_size};
use tracing::{info, warn};

use crate::config::OverlayConfig;

/// DejaVu Sans Mono, used unless `overlay.font_path` names a loadable font
const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSansMono.ttf");

const TIMESTAMP_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const REC_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const MARGIN: i32 = 10;
const DOT_RADIUS: i32 = 10;
/// Dot center distance from the top-right corner
const DOT_OFFSET: i32 = 30;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn load_font(path: &str) -> Result<FontArc, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    FontArc::try_from_vec(bytes).map_err(|e| e.to_string())
}

pub struct FrameRenderer {
    font: FontArc,
    scale: PxScale,
    custom_font: bool,
}

impl FrameRenderer {
    pub fn new(config: &OverlayConfig) -> Result<Self, InvalidFont> {
        let custom = config.font_path.as_deref().and_then(|path| match load_font(path) {
            Ok(font) => {
                info!("Overlay font loaded from {}", path);
                Some(font)
            }
            Err(e) => {
                warn!("Cannot load overlay font {}: {}, using embedded font", path, e);
                None
            }
        });

        let custom_font = custom.is_some();
        let font = match custom {
            Some(font) => font,
            None => FontArc::try_from_slice(EMBEDDED_FONT)?,
        };

        Ok(Self {
            font,
            scale: PxScale::from(config.font_size.max(7.0)),
            custom_font,
        })
    }

    /// Renderer with the embedded font at the default size
    pub fn embedded() -> Result<Self, InvalidFont> {
        Self::new(&OverlayConfig::default())
    }

    /// Whether `overlay.font_path` was loaded instead of the embedded font
    pub fn has_custom_font(&self) -> bool {
        self.custom_font
    }

    pub fn render(&self, image: &mut RgbImage, now: DateTime<Local>, recording: bool) {
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        draw_text_mut(
            image,
            TIMESTAMP_COLOR,
            MARGIN,
            MARGIN,
            self.scale,
            &self.font,
            &timestamp,
        );

        if recording {
            let width = image.width() as i32;
            let center = (width - DOT_OFFSET, DOT_OFFSET);
            draw_filled_circle_mut(image, center, DOT_RADIUS, REC_COLOR);

            let (text_w, text_h) = text_size(self.scale, &self.font, "REC");
            let x = center.0 - DOT_RADIUS - 5 - text_w as i32;
            let y = center.1 - text_h as i32 / 2;
            draw_text_mut(image, REC_COLOR, x, y, self.scale, &self.font, "REC");
        }
    }
}
