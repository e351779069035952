//! `printpdf` backend: draws a laid-out `Document` and writes it to disk.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfLayerReference, Rgb,
};

use super::{Block, Document, FontWeight, ImageBlock, LayoutConfig, TextBlock};
use crate::config::REPORT_FILE_NAME;
use crate::pipeline::ReportError;

/// Resolution used to size embedded images before scaling.
const IMAGE_DPI: f32 = 300.0;

const MM_PER_INCH: f32 = 25.4;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn for_weight(&self, weight: FontWeight) -> &IndirectFontRef {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }
}

/// Render `document` to PDF bytes.
pub fn render_pdf(document: &Document, config: &LayoutConfig) -> Result<Vec<u8>, ReportError> {
    let (width, height) = (Mm(config.page_width), Mm(config.page_height));
    let (doc, page1, layer1) = PdfDocument::new(&document.title, width, height, "Layer 1");

    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Render(format!("PDF font error: {e}")))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Render(format!("PDF font error: {e}")))?,
    };

    for (index, page) in document.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(page1).get_layer(layer1)
        } else {
            let (p, l) = doc.add_page(width, height, "Layer 1");
            doc.get_page(p).get_layer(l)
        };

        for block in &page.blocks {
            match block {
                Block::Text(t) => draw_text(&layer, t, &fonts, config.page_height),
                Block::Image(i) => draw_image(&layer, i, config.page_height),
            }
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReportError::Render(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ReportError::Render(format!("PDF buffer error: {e}")))
}

fn draw_text(layer: &PdfLayerReference, block: &TextBlock, fonts: &Fonts, page_height: f32) {
    let [r, g, b] = block.color;
    layer.set_fill_color(Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    )));
    layer.use_text(
        &block.text,
        block.font_size,
        Mm(block.x),
        Mm(page_height - block.y),
        fonts.for_weight(block.weight),
    );
}

/// Stretch the image into its box. PDF origin is bottom-left, so the box's
/// lower edge is the translation.
fn draw_image(layer: &PdfLayerReference, block: &ImageBlock, page_height: f32) {
    let natural_w = block.image.width() as f32 * MM_PER_INCH / IMAGE_DPI;
    let natural_h = block.image.height() as f32 * MM_PER_INCH / IMAGE_DPI;
    if natural_w <= 0.0 || natural_h <= 0.0 {
        return;
    }

    Image::from_dynamic_image(&block.image).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(block.x)),
            translate_y: Some(Mm(page_height - block.y - block.height)),
            scale_x: Some(block.width / natural_w),
            scale_y: Some(block.height / natural_h),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        },
    );
}

/// Write PDF bytes to `dir/medical-analysis-report.pdf`.
///
/// Written to a temp file in the same directory and renamed into place, so a
/// failed write never leaves a truncated report behind.
pub fn export_pdf_to_file(pdf_bytes: &[u8], dir: &Path) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(REPORT_FILE_NAME);
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(pdf_bytes)?;
    tmp.flush()?;
    tmp.persist(&path).map_err(|e| ReportError::Io(e.error))?;

    Ok(path)
}
