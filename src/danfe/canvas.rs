// ── PDF Canvas ─────────────────────────────────────────────────
//
// Top-left based drawing surface over lopdf content streams. Callers work
// in "y grows downwards" coordinates; conversion to PDF space happens here.
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, StringFormat, Stream};

use crate::error::RenderError;

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
pub const MARGIN: f32 = 15.0;
pub const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
pub const PAGE_BOTTOM: f32 = PAGE_HEIGHT - MARGIN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
    Mono,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Mono => "F3",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Mono => "Courier",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Approximate advance of one glyph, in units of font size.
fn glyph_width(c: char, font: Font) -> f32 {
    if font == Font::Mono {
        return 0.6;
    }
    let w = match c {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' | 'I' => 0.278,
        ' ' | 'f' | 't' | 'r' | '/' | '-' | '(' | ')' => 0.333,
        'M' | 'W' | 'm' | 'w' => 0.833,
        '0'..='9' | 'a'..='z' | '$' | '?' => 0.556,
        'A'..='Z' => 0.667,
        _ => 0.6,
    };
    if font == Font::Bold {
        w * 1.06
    } else {
        w
    }
}

pub fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars().map(|c| glyph_width(c, font)).sum::<f32>() * size
}

/// Longest prefix of `text` that fits in `width`.
pub fn truncate_to_width(text: &str, font: Font, size: f32, width: f32) -> String {
    let mut used = 0.0;
    let mut out = String::new();
    for c in text.chars() {
        used += glyph_width(c, font) * size;
        if used > width {
            break;
        }
        out.push(c);
    }
    out
}

/// Greedy word wrap. Words longer than a line are hard-cut.
pub fn wrap_text(text: &str, font: Font, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if text_width(&candidate, font, size) <= width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let mut rest = word.to_string();
            while text_width(&rest, font, size) > width {
                let head = truncate_to_width(&rest, font, size, width);
                if head.is_empty() {
                    break;
                }
                rest = rest[head.len()..].to_string();
                lines.push(head);
            }
            current = rest;
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// WinAnsiEncoding for the standard fonts. Anything outside it becomes '?'.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => b' ',
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}

fn real(v: f32) -> Object {
    Object::Real(v)
}

pub struct Canvas {
    pages: Vec<Vec<Operation>>,
    title: String,
}

impl Canvas {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            pages: vec![Vec::new()],
            title: title.into(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn new_page(&mut self) {
        self.pages.push(Vec::new());
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn line_width(&mut self, width: f32) {
        self.ops().push(Operation::new("w", vec![real(width)]));
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let ops = self.ops();
        ops.push(Operation::new(
            "re",
            vec![real(x), real(PAGE_HEIGHT - y - h), real(w), real(h)],
        ));
        ops.push(Operation::new("S", vec![]));
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let ops = self.ops();
        ops.push(Operation::new(
            "re",
            vec![real(x), real(PAGE_HEIGHT - y - h), real(w), real(h)],
        ));
        ops.push(Operation::new("f", vec![]));
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        let ops = self.ops();
        ops.push(Operation::new("m", vec![real(x1), real(PAGE_HEIGHT - y1)]));
        ops.push(Operation::new("l", vec![real(x2), real(PAGE_HEIGHT - y2)]));
        ops.push(Operation::new("S", vec![]));
    }

    /// Draws one line of text whose top edge sits at `y`.
    pub fn text(&mut self, x: f32, y: f32, text: &str, font: Font, size: f32) {
        if text.is_empty() {
            return;
        }
        let baseline = PAGE_HEIGHT - y - size * 0.8;
        let ops = self.ops();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource().as_bytes().to_vec()), real(size)],
        ));
        ops.push(Operation::new("Td", vec![real(x), real(baseline)]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    /// Single line clipped to `width` and aligned inside it.
    pub fn text_in(&mut self, x: f32, y: f32, width: f32, text: &str, font: Font, size: f32, align: Align) {
        let fitted = truncate_to_width(text, font, size, width);
        let used = text_width(&fitted, font, size);
        let left = match align {
            Align::Left => x,
            Align::Center => x + (width - used) / 2.0,
            Align::Right => x + width - used,
        };
        self.text(left, y, &fitted, font, size);
    }

    /// Wrapped paragraph; returns the number of lines drawn.
    #[allow(clippy::too_many_arguments)]
    pub fn paragraph(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        text: &str,
        font: Font,
        size: f32,
        align: Align,
        max_lines: usize,
    ) -> usize {
        let leading = size * 1.2;
        let lines = wrap_text(text, font, size, width);
        let count = lines.len().min(max_lines);
        for (i, line) in lines.iter().take(count).enumerate() {
            self.text_in(x, y + leading * i as f32, width, line, font, size, align);
        }
        count
    }

    /// Serializes every page into one PDF.
    pub fn finish(self) -> Result<Vec<u8>, RenderError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut fonts = lopdf::Dictionary::new();
        for font in [Font::Regular, Font::Bold, Font::Mono] {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(font.resource(), Object::Reference(font_id));
        }
        let resources_id = doc.add_object(dictionary! {
            "Font" => fonts,
        });

        let mut kids = Vec::with_capacity(self.pages.len());
        for operations in self.pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            // Resources and MediaBox live on each page so pages survive merging.
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
                "Resources" => Object::Reference(resources_id),
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::String(encode_win_ansi(&self.title), StringFormat::Literal),
            "Producer" => Object::string_literal("CrossWMS DANFE"),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.trailer.set("Info", Object::Reference(info_id));
        doc.compress();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn latin1_characters_map_to_single_bytes() {
        assert_eq!(encode_win_ansi("SÃO"), vec![b'S', 0xC3, b'O']);
        assert_eq!(encode_win_ansi("Nº"), vec![b'N', 0xBA]);
        assert_eq!(encode_win_ansi("a\nb"), b"a b".to_vec());
        assert_eq!(encode_win_ansi("漢"), b"?".to_vec());
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("PALAVRA OUTRA PALAVRA MAIS UMA", Font::Regular, 8.0, 60.0);
        assert!(lines.len() > 1);
        assert!(lines
            .iter()
            .all(|l| text_width(l, Font::Regular, 8.0) <= 60.0));
    }

    #[test]
    fn long_word_is_hard_cut() {
        let lines = wrap_text(&"9".repeat(60), Font::Mono, 10.0, 60.0);
        assert!(lines.len() >= 6);
        assert_eq!(lines.concat(), "9".repeat(60));
    }

    #[test]
    fn lowercase_m_and_w_are_wide() {
        assert!(text_width("m", Font::Regular, 10.0) > text_width("a", Font::Regular, 10.0));
        assert_eq!(text_width("w", Font::Regular, 10.0), text_width("M", Font::Regular, 10.0));
        assert!(truncate_to_width("mmmmmmmmmm", Font::Regular, 10.0, 60.0).chars().count() < 10);
    }

    #[test]
    fn finished_canvas_loads_back() {
        let mut canvas = Canvas::new("teste");
        canvas.rect(MARGIN, MARGIN, 100.0, 20.0);
        canvas.text(MARGIN + 2.0, MARGIN + 2.0, "AÇÚCAR", Font::Bold, 9.0);
        canvas.new_page();
        canvas.line(MARGIN, 100.0, 200.0, 100.0);
        let bytes = canvas.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }
}
