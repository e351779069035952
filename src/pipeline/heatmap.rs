//! Heatmap overlay: one soft radial highlight per finding on a transparent layer.
//!
//! Each gradient runs linearly from `peak_opacity` at the centre to fully
//! transparent at `radius`. Gradients are source-over composited in finding
//! order, so the layer never becomes opaque and the image underneath stays
//! visible.

use image::{imageops, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::detection::Finding;
use super::enhance::encode_png;
use super::AnalysisError;

/// Appearance of the highlights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapStyle {
    /// Gradient radius in image pixels.
    pub radius: f32,
    pub color: [u8; 3],
    /// Opacity at the gradient centre, `0.0..=1.0`.
    pub peak_opacity: f32,
}

impl Default for HeatmapStyle {
    fn default() -> Self {
        Self {
            radius: 50.0,
            color: [255, 0, 0],
            peak_opacity: 0.4,
        }
    }
}

/// Transparent overlay the size of the processed image.
#[derive(Debug, Clone)]
pub struct HeatmapLayer {
    pub pixels: RgbaImage,
}

impl HeatmapLayer {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// PNG encoding for display.
    pub fn to_png(&self) -> Result<Vec<u8>, AnalysisError> {
        encode_png(&self.pixels)
    }

    /// Alpha-composite this layer over `base` (top-left aligned).
    pub fn overlay_onto(&self, base: &RgbaImage) -> RgbaImage {
        let mut out = base.clone();
        imageops::overlay(&mut out, &self.pixels, 0, 0);
        out
    }
}

/// Render the overlay for `findings` on a `width`x`height` layer.
pub fn render(width: u32, height: u32, findings: &[Finding], style: &HeatmapStyle) -> HeatmapLayer {
    let mut alpha = vec![0.0f32; width as usize * height as usize];

    for finding in findings {
        paint_gradient(&mut alpha, width, height, finding, style);
    }

    let [r, g, b] = style.color;
    let pixels = RgbaImage::from_fn(width, height, |px, py| {
        let a = alpha[py as usize * width as usize + px as usize];
        if a <= 0.0 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([r, g, b, (a * 255.0).round().clamp(0.0, 255.0) as u8])
        }
    });

    debug!(
        size = format!("{width}x{height}"),
        gradients = findings.len(),
        radius = style.radius,
        "Heatmap rendered"
    );

    HeatmapLayer { pixels }
}

/// Source-over one radial gradient into the alpha buffer.
/// Only the gradient's bounding box is visited; everything outside is transparent.
fn paint_gradient(alpha: &mut [f32], width: u32, height: u32, finding: &Finding, style: &HeatmapStyle) {
    let radius = style.radius.max(0.0) as f64;
    if radius == 0.0 || width == 0 || height == 0 {
        return;
    }
    let peak = style.peak_opacity.clamp(0.0, 1.0);

    let x0 = (finding.x - radius).floor().max(0.0) as u32;
    let y0 = (finding.y - radius).floor().max(0.0) as u32;
    let x1 = ((finding.x + radius).ceil().max(0.0) as u32).min(width - 1);
    let y1 = ((finding.y + radius).ceil().max(0.0) as u32).min(height - 1);

    for py in y0..=y1 {
        for px in x0..=x1 {
            // Sample at the pixel centre.
            let dx = px as f64 + 0.5 - finding.x;
            let dy = py as f64 + 0.5 - finding.y;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist >= radius {
                continue;
            }
            let src = peak * (1.0 - (dist / radius) as f32);
            let dst = &mut alpha[py as usize * width as usize + px as usize];
            *dst = src + *dst * (1.0 - src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::detection::Category;

    fn finding_at(x: f64, y: f64) -> Finding {
        Finding {
            x,
            y,
            category: Category::Mass,
            confidence: 75.0,
        }
    }

    #[test]
    fn layer_matches_image_dimensions() {
        let layer = render(320, 200, &[finding_at(10.0, 10.0)], &HeatmapStyle::default());
        assert_eq!((layer.width(), layer.height()), (320, 200));
    }

    #[test]
    fn no_findings_is_fully_transparent() {
        let layer = render(64, 64, &[], &HeatmapStyle::default());
        assert!(layer.pixels.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn centre_is_semi_transparent_red() {
        let layer = render(200, 200, &[finding_at(100.5, 100.5)], &HeatmapStyle::default());
        let centre = layer.pixels.get_pixel(100, 100).0;
        assert_eq!(&centre[..3], &[255, 0, 0]);
        assert_eq!(centre[3], 102); // 0.4 * 255
    }

    #[test]
    fn alpha_fades_with_distance_and_vanishes_at_radius() {
        let layer = render(200, 200, &[finding_at(100.5, 100.5)], &HeatmapStyle::default());
        let near = layer.pixels.get_pixel(110, 100).0[3];
        let far = layer.pixels.get_pixel(140, 100).0[3];
        assert!(near > far && far > 0);
        assert_eq!(layer.pixels.get_pixel(150, 100).0[3], 0);
        assert_eq!(layer.pixels.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn overlapping_gradients_composite_but_stay_translucent() {
        let single = render(100, 100, &[finding_at(50.5, 50.5)], &HeatmapStyle::default());
        let double = render(
            100,
            100,
            &[finding_at(50.5, 50.5), finding_at(50.5, 50.5)],
            &HeatmapStyle::default(),
        );
        let a1 = single.pixels.get_pixel(50, 50).0[3];
        let a2 = double.pixels.get_pixel(50, 50).0[3];
        assert!(a2 > a1);
        assert!(a2 < 255);
        // 0.4 + 0.4 * 0.6 = 0.64
        assert_eq!(a2, 163);
    }

    #[test]
    fn finding_near_edge_is_clipped() {
        let layer = render(20, 20, &[finding_at(0.0, 19.9)], &HeatmapStyle::default());
        assert!(layer.pixels.get_pixel(0, 19).0[3] > 0);
    }

    #[test]
    fn overlay_keeps_base_visible() {
        let base = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 255, 255]));
        let layer = render(100, 100, &[finding_at(50.5, 50.5)], &HeatmapStyle::default());
        let out = layer.overlay_onto(&base);
        let centre = out.get_pixel(50, 50).0;
        assert!(centre[0] > 0, "red contributed");
        assert!(centre[2] > 0, "blue still visible");
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn layer_encodes_as_png() {
        let layer = render(30, 30, &[finding_at(15.0, 15.0)], &HeatmapStyle::default());
        let png = layer.to_png().unwrap();
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }
}
