// ── DANFE Renderer ─────────────────────────────────────────────
//
// Fixed-layout A4 DANFE. Boxes are built as descriptors by `sections`,
// painted by `layout::paint`, and the item table paginates on its own.
pub mod barcode;
pub mod canvas;
pub mod items;
pub mod layout;
pub mod legacy;
pub mod sections;

use canvas::{Align, Canvas, Font, CONTENT_WIDTH, MARGIN, PAGE_BOTTOM};

use crate::error::RenderError;
use crate::format::format_document_number;
use crate::nfe::FiscalDocument;

const SIGNATURE_HEIGHT: f32 = 10.0;
const CONTINUATION_BANNER: f32 = 16.0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Printed in the footer. Fixing it makes output byte-identical.
    pub printed_at: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            printed_at: chrono::Local::now().format("%d/%m/%Y %H:%M:%S").to_string(),
        }
    }
}

/// Anything that can turn an extracted document into PDF bytes.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, doc: &FiscalDocument) -> Result<Vec<u8>, RenderError>;
}

/// Full layout with barcode, tax grid and paginated item table.
#[derive(Clone, Debug, Default)]
pub struct CompliantRenderer {
    options: Option<RenderOptions>,
}

impl CompliantRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RenderOptions) -> Self {
        Self {
            options: Some(options),
        }
    }
}

impl DocumentRenderer for CompliantRenderer {
    fn render(&self, doc: &FiscalDocument) -> Result<Vec<u8>, RenderError> {
        match &self.options {
            Some(options) => render_with(doc, options),
            None => render(doc),
        }
    }
}

/// Flowing text layout.
#[derive(Clone, Debug, Default)]
pub struct LegacyRenderer {
    options: Option<RenderOptions>,
}

impl LegacyRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RenderOptions) -> Self {
        Self {
            options: Some(options),
        }
    }
}

impl DocumentRenderer for LegacyRenderer {
    fn render(&self, doc: &FiscalDocument) -> Result<Vec<u8>, RenderError> {
        let options = self.options.clone().unwrap_or_default();
        legacy::render_legacy(doc, &options)
    }
}

pub fn render(doc: &FiscalDocument) -> Result<Vec<u8>, RenderError> {
    render_with(doc, &RenderOptions::default())
}

pub fn render_with(doc: &FiscalDocument, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
    // The first pass only counts pages so the header can print "FOLHA 1/N".
    let counted = draw(doc, options, 1)?;
    let total = counted.page_count();
    if total == 1 {
        return counted.finish();
    }
    draw(doc, options, total)?.finish()
}

fn continuation_banner(canvas: &mut Canvas, doc: &FiscalDocument, total_pages: usize) -> f32 {
    let text = format!(
        "DANFE - NF-e Nº {}  SÉRIE {}  FOLHA {}/{}",
        format_document_number(&doc.number),
        doc.series,
        canvas.page_count(),
        total_pages.max(canvas.page_count())
    );
    canvas.text_in(MARGIN, MARGIN, CONTENT_WIDTH, &text, Font::Bold, 8.0, Align::Left);
    if let Some(key) = &doc.access_key {
        canvas.text_in(MARGIN, MARGIN, CONTENT_WIDTH, &key.formatted(), Font::Mono, 7.0, Align::Right);
    }
    MARGIN + CONTINUATION_BANNER
}

fn draw(doc: &FiscalDocument, options: &RenderOptions, total_pages: usize) -> Result<Canvas, RenderError> {
    let mut canvas = Canvas::new(format!("DANFE NF-e {}", doc.number));
    canvas.line_width(0.5);
    let x = MARGIN;
    let width = CONTENT_WIDTH;
    let mut y = MARGIN;

    for spec in sections::leading_boxes(doc, total_pages) {
        y = layout::paint(&mut canvas, &spec, x, y, width)?;
    }

    y = items::draw_items(&mut canvas, &doc.items, x, y, width, |c| {
        c.line_width(0.5);
        continuation_banner(c, doc, total_pages)
    })?;

    let footer = sections::footer(doc);
    if y + footer.height() + SIGNATURE_HEIGHT > PAGE_BOTTOM {
        canvas.new_page();
        canvas.line_width(0.5);
        y = continuation_banner(&mut canvas, doc, total_pages);
    }
    y = layout::paint(&mut canvas, &footer, x, y, width)?;

    for (text, align) in sections::signature_line(&options.printed_at) {
        canvas.text_in(x, y, width, &text, Font::Regular, 6.0, align);
    }
    Ok(canvas)
}
