//! Visual grounding.
//!
//! Detected text regions become numbered labels the decision provider can
//! refer to. Labels run 1..n top-to-bottom, then left-to-right within a row
//! (boxes whose top edges are within `row_tolerance_px` share a row). The
//! annotated overlay draws every box with a numbered label tag, using the
//! configured font or the bundled DejaVu Sans Mono Bold.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ab_glyph::{FontArc, FontVec, PxScale};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use visicrawl_config::GroundingConfig;
use visicrawl_protocols::{BoundingBox, Point, Screenshot, TextDetection, TextDetector};

use crate::error::GroundingError;

#[cfg(test)]
#[path = "grounding_tests.rs"]
mod tests;

static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono-Bold.ttf");

const PALETTE: [Rgba<u8>; 6] = [
    Rgba([0, 230, 64, 255]),
    Rgba([255, 64, 129, 255]),
    Rgba([41, 121, 255, 255]),
    Rgba([255, 171, 0, 255]),
    Rgba([170, 0, 255, 255]),
    Rgba([0, 184, 212, 255]),
];

/// A detected region with its label.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundedElement {
    pub label: u32,
    pub text: String,
    pub bounds: BoundingBox,
    pub center: Point,
    pub confidence: f32,
}

/// Labelled elements and the annotated image for one step.
#[derive(Debug, Clone)]
pub struct GroundingOverlay {
    elements: Vec<GroundedElement>,
    centers: BTreeMap<u32, Point>,
    image: Screenshot,
    duration: Duration,
}

impl GroundingOverlay {
    /// Overlay with no elements; the image is returned unannotated.
    pub fn empty(image: Screenshot) -> Self {
        Self {
            elements: Vec::new(),
            centers: BTreeMap::new(),
            image,
            duration: Duration::ZERO,
        }
    }

    pub fn new(elements: Vec<GroundedElement>, image: Screenshot, duration: Duration) -> Self {
        let centers = elements.iter().map(|e| (e.label, e.center)).collect();
        Self {
            elements,
            centers,
            image,
            duration,
        }
    }

    /// Center of a label.
    pub fn resolve(&self, label: u32) -> Option<Point> {
        self.centers.get(&label).copied()
    }

    pub fn elements(&self) -> &[GroundedElement] {
        &self.elements
    }

    pub fn label_map(&self) -> &BTreeMap<u32, Point> {
        &self.centers
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Annotated image (the original when nothing was detected).
    pub fn image(&self) -> &Screenshot {
        &self.image
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Filter, clamp, order and label raw detections.
pub fn arrange_detections(
    detections: Vec<TextDetection>,
    width: u32,
    height: u32,
    min_confidence: f32,
    row_tolerance_px: u32,
) -> Vec<GroundedElement> {
    let mut kept: Vec<(String, BoundingBox, f32)> = detections
        .into_iter()
        .filter(|d| d.confidence.is_finite() && d.confidence >= min_confidence)
        .filter_map(|d| {
            let text = d.text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let bounds = d.bounds.clamp_to(width, height)?;
            Some((text, bounds, d.confidence))
        })
        .collect();

    kept.sort_by(|a, b| (a.1.y, a.1.x).cmp(&(b.1.y, b.1.x)));

    // Group into rows anchored at the first box's top edge.
    let tolerance = i64::from(row_tolerance_px);
    let mut rows: Vec<Vec<(String, BoundingBox, f32)>> = Vec::new();
    let mut anchor = 0i64;
    for item in kept {
        let top = i64::from(item.1.y);
        if rows.is_empty() || top - anchor > tolerance {
            anchor = top;
            rows.push(vec![item]);
        } else if let Some(row) = rows.last_mut() {
            row.push(item);
        }
    }

    rows.into_iter()
        .flat_map(|mut row| {
            row.sort_by(|a, b| (a.1.x, a.1.y).cmp(&(b.1.x, b.1.y)));
            row
        })
        .enumerate()
        .map(|(i, (text, bounds, confidence))| GroundedElement {
            label: i as u32 + 1,
            text,
            center: bounds.center(),
            bounds,
            confidence,
        })
        .collect()
}

/// Draw boxes and label tags onto a copy of the screenshot.
pub fn render_overlay(
    screenshot: &Screenshot,
    elements: &[GroundedElement],
    font: Option<&FontArc>,
    font_size: f32,
) -> Result<Screenshot, GroundingError> {
    let mut img: RgbaImage = image::load_from_memory(&screenshot.data)
        .map_err(|e| GroundingError::Decode(e.to_string()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    let scale = PxScale::from(font_size);

    for element in elements {
        let color = PALETTE[(element.label as usize - 1) % PALETTE.len()];
        let b = element.bounds;
        let w = b.width.max(1);
        let h = b.height.max(1);

        draw_hollow_rect_mut(&mut img, Rect::at(b.x, b.y).of_size(w, h), color);
        if w > 2 && h > 2 {
            draw_hollow_rect_mut(&mut img, Rect::at(b.x + 1, b.y + 1).of_size(w - 2, h - 2), color);
        }

        let label = element.label.to_string();
        let tag_w = (label.len() as f32 * font_size * 0.6) as u32 + 4;
        let tag_h = font_size as u32 + 4;
        let tag_x = b.x.clamp(0, width.saturating_sub(tag_w) as i32);
        let mut tag_y = b.y - tag_h as i32;
        if tag_y < 0 {
            tag_y = b.y;
        }

        draw_filled_rect_mut(&mut img, Rect::at(tag_x, tag_y).of_size(tag_w, tag_h), color);
        if let Some(font) = font {
            draw_text_mut(
                &mut img,
                Rgba([0, 0, 0, 255]),
                tag_x + 2,
                tag_y + 2,
                scale,
                font,
                &label,
            );
        }
    }

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| GroundingError::Encode(e.to_string()))?;
    Ok(Screenshot::new(buf.into_inner(), width, height))
}

/// Load a label font from disk.
pub fn load_font(path: &Path) -> Result<FontVec, GroundingError> {
    let bytes = std::fs::read(path).map_err(|e| GroundingError::Font {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    FontVec::try_from_vec(bytes).map_err(|e| GroundingError::Font {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// The label font shipped with the crate.
pub fn bundled_font() -> Result<FontArc, GroundingError> {
    FontArc::try_from_slice(BUNDLED_FONT).map_err(|e| GroundingError::Font {
        path: "<bundled>".to_string(),
        message: e.to_string(),
    })
}

/// Turns screenshots into labelled overlays.
pub struct VisualGroundingEngine {
    detector: Arc<dyn TextDetector>,
    config: GroundingConfig,
    font: Option<FontArc>,
    last_duration: Mutex<Option<Duration>>,
}

impl VisualGroundingEngine {
    /// Create an engine. A configured font that fails to load falls back to
    /// the bundled one.
    pub fn new(detector: Arc<dyn TextDetector>, config: GroundingConfig) -> Self {
        let configured = config.font_path.as_deref().and_then(|path| match load_font(path) {
            Ok(font) => Some(FontArc::new(font)),
            Err(e) => {
                warn!("Label font unavailable, using bundled font: {}", e);
                None
            }
        });
        let font = configured.or_else(|| match bundled_font() {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("Bundled label font unusable, drawing boxes only: {}", e);
                None
            }
        });

        Self {
            detector,
            config,
            font,
            last_duration: Mutex::new(None),
        }
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(FontArc::new(font));
        self
    }

    /// Duration of the most recent [`process_screenshot`](Self::process_screenshot) call.
    pub fn last_duration(&self) -> Option<Duration> {
        *self.last_duration.lock()
    }

    /// Detect, label and annotate.
    ///
    /// Detector or rendering failures degrade to fewer annotations; this
    /// never fails the step.
    pub async fn process_screenshot(&self, screenshot: &Screenshot) -> GroundingOverlay {
        let started = Instant::now();

        let detections = match self.detector.detect(screenshot).await {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Text detection failed, continuing without labels: {}", e);
                Vec::new()
            }
        };

        let elements = arrange_detections(
            detections,
            screenshot.width,
            screenshot.height,
            self.config.min_confidence,
            self.config.row_tolerance_px,
        );

        let image = if elements.is_empty() {
            screenshot.clone()
        } else {
            self.render(screenshot, &elements).await
        };

        let duration = started.elapsed();
        *self.last_duration.lock() = Some(duration);
        debug!(elements = elements.len(), ?duration, "Grounding completed");

        GroundingOverlay::new(elements, image, duration)
    }

    async fn render(&self, screenshot: &Screenshot, elements: &[GroundedElement]) -> Screenshot {
        let shot = screenshot.clone();
        let owned = elements.to_vec();
        let font = self.font.clone();
        let size = self.config.label_font_size;

        let rendered = tokio::task::spawn_blocking(move || {
            render_overlay(&shot, &owned, font.as_ref(), size)
        })
        .await;

        match rendered {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => {
                warn!("Overlay rendering failed, using raw screenshot: {}", e);
                screenshot.clone()
            }
            Err(e) => {
                warn!("Overlay rendering task failed: {}", e);
                screenshot.clone()
            }
        }
    }
}
