// ── Box Descriptors ────────────────────────────────────────────
//
// Every DANFE block is described as data (titled box → rows → weighted
// cells) and painted by `paint`. Section builders never touch the canvas.
use super::barcode;
use super::canvas::{Align, Canvas, Font};
use crate::error::RenderError;
use crate::nfe::AccessKey;

pub const TITLE_HEIGHT: f32 = 9.0;
pub const BOX_GAP: f32 = 3.0;
const PAD: f32 = 2.0;
const LABEL_SIZE: f32 = 5.0;
const VALUE_SIZE: f32 = 8.0;

#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub font: Font,
    pub size: f32,
    pub align: Align,
    pub max_lines: usize,
}

impl TextLine {
    pub fn new(text: impl Into<String>, font: Font, size: f32) -> Self {
        Self {
            text: text.into(),
            font,
            size,
            align: Align::Left,
            max_lines: 1,
        }
    }

    pub fn centered(mut self) -> Self {
        self.align = Align::Center;
        self
    }

    pub fn wrapped(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CellContent {
    /// Small caption on top, value underneath.
    Field {
        label: &'static str,
        value: String,
        align: Align,
        bold: bool,
    },
    /// Stacked free text.
    Lines(Vec<TextLine>),
    /// Entry/exit marker with the document number block.
    DocumentTitle {
        direction_code: String,
        number: String,
        series: String,
        page: String,
    },
    /// Barcode, formatted key and consultation hint.
    AccessKey(Option<AccessKey>),
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub weight: f32,
    pub content: CellContent,
}

impl Cell {
    pub fn field(weight: f32, label: &'static str, value: impl Into<String>) -> Self {
        Self {
            weight,
            content: CellContent::Field {
                label,
                value: value.into(),
                align: Align::Left,
                bold: false,
            },
        }
    }

    /// Right-aligned numeric field.
    pub fn amount(weight: f32, label: &'static str, value: impl Into<String>) -> Self {
        Self {
            weight,
            content: CellContent::Field {
                label,
                value: value.into(),
                align: Align::Right,
                bold: false,
            },
        }
    }

    pub fn lines(weight: f32, lines: Vec<TextLine>) -> Self {
        Self {
            weight,
            content: CellContent::Lines(lines),
        }
    }

    pub fn bold(mut self) -> Self {
        if let CellContent::Field { bold, .. } = &mut self.content {
            *bold = true;
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub height: f32,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(height: f32, cells: Vec<Cell>) -> Self {
        Self { height, cells }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoxSpec {
    pub title: Option<&'static str>,
    pub rows: Vec<Row>,
}

impl BoxSpec {
    pub fn height(&self) -> f32 {
        let title = if self.title.is_some() { TITLE_HEIGHT } else { 0.0 };
        title + self.rows.iter().map(|r| r.height).sum::<f32>()
    }
}

/// Splits `width` across cells in proportion to their weights.
pub fn cell_widths(cells: &[Cell], width: f32) -> Vec<f32> {
    let total: f32 = cells.iter().map(|c| c.weight.max(0.0)).sum();
    if total <= 0.0 {
        return vec![width / cells.len().max(1) as f32; cells.len()];
    }
    cells
        .iter()
        .map(|c| width * c.weight.max(0.0) / total)
        .collect()
}

/// Paints the box at `y` and returns the y where the next box starts.
pub fn paint(canvas: &mut Canvas, spec: &BoxSpec, x: f32, y: f32, width: f32) -> Result<f32, RenderError> {
    let mut cursor = y;
    if let Some(title) = spec.title {
        canvas.text(x, cursor + 2.0, title, Font::Bold, 6.0);
        cursor += TITLE_HEIGHT;
    }
    for row in &spec.rows {
        let mut cx = x;
        for (cell, w) in row.cells.iter().zip(cell_widths(&row.cells, width)) {
            canvas.rect(cx, cursor, w, row.height);
            paint_cell(canvas, &cell.content, cx, cursor, w, row.height)?;
            cx += w;
        }
        cursor += row.height;
    }
    Ok(cursor + BOX_GAP)
}

fn paint_cell(
    canvas: &mut Canvas,
    content: &CellContent,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
) -> Result<(), RenderError> {
    let inner = w - 2.0 * PAD;
    match content {
        CellContent::Field {
            label,
            value,
            align,
            bold,
        } => {
            canvas.text_in(x + PAD, y + 1.5, inner, label, Font::Regular, LABEL_SIZE, Align::Left);
            let font = if *bold { Font::Bold } else { Font::Regular };
            let value_y = y + h - VALUE_SIZE - 2.5;
            canvas.text_in(x + PAD, value_y, inner, value, font, VALUE_SIZE, *align);
        }
        CellContent::Lines(lines) => {
            let mut ly = y + PAD;
            for line in lines {
                if ly + line.size > y + h {
                    break;
                }
                let room = ((y + h - ly) / (line.size * 1.2)).floor().max(1.0) as usize;
                let drawn = canvas.paragraph(
                    x + PAD,
                    ly,
                    inner,
                    &line.text,
                    line.font,
                    line.size,
                    line.align,
                    line.max_lines.min(room),
                );
                ly += line.size * 1.2 * drawn.max(1) as f32;
            }
        }
        CellContent::DocumentTitle {
            direction_code,
            number,
            series,
            page,
        } => {
            canvas.text_in(x + PAD, y + 4.0, inner, "DANFE", Font::Bold, 12.0, Align::Center);
            let caption = "Documento Auxiliar da Nota Fiscal Eletrônica";
            canvas.paragraph(x + PAD, y + 18.0, inner, caption, Font::Regular, 6.0, Align::Center, 2);
            canvas.text(x + PAD + 4.0, y + 34.0, "0 - ENTRADA", Font::Regular, 6.5);
            canvas.text(x + PAD + 4.0, y + 42.0, "1 - SAÍDA", Font::Regular, 6.5);
            let bx = x + w - PAD - 18.0;
            canvas.rect(bx, y + 34.0, 14.0, 14.0);
            canvas.text_in(bx, y + 37.0, 14.0, direction_code, Font::Bold, 9.0, Align::Center);
            canvas.text_in(x + PAD, y + 54.0, inner, &format!("Nº {}", number), Font::Bold, 8.0, Align::Center);
            canvas.text_in(x + PAD, y + 63.0, inner, &format!("SÉRIE {}", series), Font::Bold, 8.0, Align::Center);
            canvas.text_in(x + PAD, y + 72.0, inner, &format!("FOLHA {}", page), Font::Regular, 6.5, Align::Center);
        }
        CellContent::AccessKey(key) => {
            let bar_height = (h * 0.38).min(32.0);
            if let Some(key) = key {
                barcode::draw_access_key(canvas, key, x + 6.0, y + 3.0, w - 12.0, bar_height)?;
            }
            let mut ky = y + bar_height + 6.0;
            canvas.text(x + PAD, ky, "CHAVE DE ACESSO", Font::Regular, LABEL_SIZE);
            ky += 7.0;
            let formatted = key.as_ref().map(AccessKey::formatted).unwrap_or_default();
            canvas.text_in(x + PAD, ky, inner, &formatted, Font::Bold, 7.5, Align::Center);
            ky += 11.0;
            let hint = "Consulta de autenticidade no portal nacional da NF-e www.nfe.fazenda.gov.br/portal ou no site da Sefaz Autorizadora";
            canvas.paragraph(x + PAD, ky, inner, hint, Font::Regular, 6.0, Align::Center, 3);
        }
        CellContent::Empty => {}
    }
    Ok(())
}
