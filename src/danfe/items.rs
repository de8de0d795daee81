// ── Line-Item Table ────────────────────────────────────────────
//
// 15 proportional columns. The table is painted in segments: one per page,
// each with its own header row. A row that would cross the bottom margin
// closes the segment and continues on a fresh page.
use super::canvas::{Align, Canvas, Font, PAGE_BOTTOM};
use super::layout::{BOX_GAP, TITLE_HEIGHT};
use crate::error::RenderError;
use crate::format::{format_money, format_quantity, format_rate};
use crate::nfe::LineItem;

pub const HEADER_HEIGHT: f32 = 15.0;
pub const ROW_HEIGHT: f32 = 10.0;
const CELL_PAD: f32 = 1.5;
const ROW_FONT: f32 = 6.0;

pub struct Column {
    pub label: &'static str,
    pub weight: f32,
    pub align: Align,
    pub value: fn(&LineItem) -> String,
}

fn opt(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

pub const COLUMNS: [Column; 15] = [
    Column { label: "CÓDIGO PRODUTO", weight: 0.07, align: Align::Left, value: |i| i.code.clone() },
    Column { label: "DESCRIÇÃO DO PRODUTO / SERVIÇO", weight: 0.22, align: Align::Left, value: |i| i.description.clone() },
    Column { label: "NCM/SH", weight: 0.06, align: Align::Center, value: |i| opt(&i.ncm) },
    Column { label: "CST", weight: 0.035, align: Align::Center, value: |i| opt(&i.cst) },
    Column { label: "CFOP", weight: 0.04, align: Align::Center, value: |i| opt(&i.cfop) },
    Column { label: "UN", weight: 0.035, align: Align::Center, value: |i| i.unit.clone() },
    Column { label: "QUANT.", weight: 0.065, align: Align::Right, value: |i| format_quantity(i.quantity) },
    Column { label: "VALOR UNIT.", weight: 0.07, align: Align::Right, value: |i| format_money(i.unit_price) },
    Column { label: "VALOR TOTAL", weight: 0.07, align: Align::Right, value: |i| format_money(i.total) },
    Column { label: "VALOR DESC.", weight: 0.05, align: Align::Right, value: |i| format_money(i.discount) },
    Column { label: "B.CÁLC. ICMS", weight: 0.065, align: Align::Right, value: |i| format_money(i.icms_base) },
    Column { label: "VALOR ICMS", weight: 0.055, align: Align::Right, value: |i| format_money(i.icms_amount) },
    Column { label: "VALOR IPI", weight: 0.05, align: Align::Right, value: |i| format_money(i.ipi_amount) },
    Column { label: "ALÍQ. ICMS", weight: 0.04, align: Align::Right, value: |i| format_rate(i.icms_rate) },
    Column { label: "ALÍQ. IPI", weight: 0.04, align: Align::Right, value: |i| format_rate(i.ipi_rate) },
];

pub fn column_widths(width: f32) -> Vec<f32> {
    let total: f32 = COLUMNS.iter().map(|c| c.weight).sum();
    COLUMNS.iter().map(|c| width * c.weight / total).collect()
}

/// Segment height for `rows` rows, computed before anything is painted.
pub fn segment_height(rows: usize) -> f32 {
    TITLE_HEIGHT + HEADER_HEIGHT + rows as f32 * ROW_HEIGHT
}

/// How many rows fit between `y` and the bottom margin under a fresh header.
pub fn rows_that_fit(y: f32) -> usize {
    let room = PAGE_BOTTOM - y - segment_height(0);
    if room < ROW_HEIGHT {
        0
    } else {
        (room / ROW_HEIGHT).floor() as usize
    }
}

fn draw_header(canvas: &mut Canvas, x: f32, y: f32, widths: &[f32]) -> f32 {
    canvas.text(x, y + 2.0, "DADOS DOS PRODUTOS / SERVIÇOS", Font::Bold, 6.0);
    let top = y + TITLE_HEIGHT;
    let mut cx = x;
    for (col, w) in COLUMNS.iter().zip(widths) {
        canvas.paragraph(
            cx + CELL_PAD,
            top + 2.0,
            w - 2.0 * CELL_PAD,
            col.label,
            Font::Regular,
            4.5,
            Align::Center,
            2,
        );
        cx += w;
    }
    canvas.line(x, top + HEADER_HEIGHT, x + widths.iter().sum::<f32>(), top + HEADER_HEIGHT);
    top + HEADER_HEIGHT
}

fn draw_row(canvas: &mut Canvas, item: &LineItem, x: f32, y: f32, widths: &[f32]) {
    let mut cx = x;
    for (col, w) in COLUMNS.iter().zip(widths) {
        let text = (col.value)(item);
        canvas.text_in(cx + CELL_PAD, y + 2.0, w - 2.0 * CELL_PAD, &text, Font::Regular, ROW_FONT, col.align);
        cx += w;
    }
}

/// Outer frame and column rules for one finished segment.
fn close_segment(canvas: &mut Canvas, x: f32, top: f32, bottom: f32, widths: &[f32]) {
    let frame_top = top + TITLE_HEIGHT;
    let width: f32 = widths.iter().sum();
    canvas.rect(x, frame_top, width, bottom - frame_top);
    let mut cx = x;
    for w in &widths[..widths.len() - 1] {
        cx += w;
        canvas.line(cx, frame_top, cx, bottom);
    }
}

/// Paints the table starting at `y`. `continue_page` is called after each
/// page break and returns the y where the table resumes.
pub fn draw_items<F>(
    canvas: &mut Canvas,
    items: &[LineItem],
    x: f32,
    y: f32,
    width: f32,
    mut continue_page: F,
) -> Result<f32, RenderError>
where
    F: FnMut(&mut Canvas) -> f32,
{
    let widths = column_widths(width);
    let mut top = y;
    if rows_that_fit(top) == 0 && !items.is_empty() {
        canvas.new_page();
        top = continue_page(canvas);
        if rows_that_fit(top) == 0 {
            return Err(RenderError::Layout("página sem espaço para a tabela de itens".into()));
        }
    }

    let mut cursor = draw_header(canvas, x, top, &widths);
    for item in items {
        if cursor + ROW_HEIGHT > PAGE_BOTTOM {
            close_segment(canvas, x, top, cursor, &widths);
            canvas.new_page();
            top = continue_page(canvas);
            cursor = draw_header(canvas, x, top, &widths);
        }
        draw_row(canvas, item, x, cursor, &widths);
        cursor += ROW_HEIGHT;
    }
    close_segment(canvas, x, top, cursor, &widths);
    Ok(cursor + BOX_GAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::danfe::canvas::{CONTENT_WIDTH, MARGIN};
    use pretty_assertions::assert_eq;

    /// Pages the table will occupy, given where it starts and where
    /// continuation pages resume.
    fn pages_needed(items: usize, start_y: f32, continuation_y: f32) -> usize {
        let first = rows_that_fit(start_y);
        let next = rows_that_fit(continuation_y).max(1);
        if items == 0 {
            return 1;
        }
        if first == 0 {
            return 1 + items.div_ceil(next);
        }
        if items <= first {
            1
        } else {
            1 + (items - first).div_ceil(next)
        }
    }

    fn items(n: usize) -> Vec<LineItem> {
        (1..=n)
            .map(|i| LineItem {
                item_number: i as u32,
                code: format!("P{:04}", i),
                description: format!("PRODUTO {}", i),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn fifteen_columns_span_the_width() {
        let widths = column_widths(CONTENT_WIDTH);
        assert_eq!(widths.len(), 15);
        assert!((widths.iter().sum::<f32>() - CONTENT_WIDTH).abs() < 0.01);
    }

    #[test]
    fn segment_height_is_linear_in_rows() {
        assert_eq!(segment_height(3) - segment_height(2), ROW_HEIGHT);
    }

    #[test]
    fn short_table_stays_on_one_page() {
        let mut canvas = Canvas::new("t");
        let end = draw_items(&mut canvas, &items(3), MARGIN, 400.0, CONTENT_WIDTH, |_| MARGIN).unwrap();
        assert_eq!(canvas.page_count(), 1);
        assert_eq!(end, 400.0 + segment_height(3) + BOX_GAP);
    }

    #[test]
    fn overflow_breaks_per_row() {
        let mut canvas = Canvas::new("t");
        let mut resumed = 0;
        let rows = items(200);
        draw_items(&mut canvas, &rows, MARGIN, 400.0, CONTENT_WIDTH, |_| {
            resumed += 1;
            MARGIN
        })
        .unwrap();
        assert!(canvas.page_count() > 1);
        assert_eq!(resumed, canvas.page_count() - 1);
        assert_eq!(canvas.page_count(), pages_needed(rows.len(), 400.0, MARGIN));
    }

    #[test]
    fn table_starting_below_the_fold_moves_on() {
        let mut canvas = Canvas::new("t");
        draw_items(&mut canvas, &items(1), MARGIN, PAGE_BOTTOM - 5.0, CONTENT_WIDTH, |_| MARGIN).unwrap();
        assert_eq!(canvas.page_count(), 2);
        assert_eq!(pages_needed(1, PAGE_BOTTOM - 5.0, MARGIN), 2);
    }
}
