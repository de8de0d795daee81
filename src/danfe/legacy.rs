// ── Legacy DANFE ───────────────────────────────────────────────
//
// Simpler flowing layout kept as a second local option when the full
// layout cannot be produced. Text runs top to bottom; the product table
// breaks per row like the main renderer.
use super::canvas::{Align, Canvas, Font, CONTENT_WIDTH, MARGIN, PAGE_BOTTOM};
use super::RenderOptions;
use crate::error::RenderError;
use crate::format::{format_money, format_quantity, format_tax_id};
use crate::nfe::{FiscalDocument, LineItem, Party};

const TABLE_ROW: f32 = 14.0;
const TABLE_COLUMNS: [(&str, f32, Align); 6] = [
    ("CÓDIGO", 60.0, Align::Left),
    ("DESCRIÇÃO DO PRODUTO/SERVIÇO", 245.0, Align::Left),
    ("QTD", 55.0, Align::Right),
    ("UN", 30.0, Align::Center),
    ("VL UNIT", 87.5, Align::Right),
    ("VL TOTAL", 87.5, Align::Right),
];

struct Flow {
    canvas: Canvas,
    y: f32,
}

impl Flow {
    fn ensure(&mut self, height: f32) -> bool {
        if self.y + height > PAGE_BOTTOM {
            self.canvas.new_page();
            self.y = MARGIN;
            return true;
        }
        false
    }

    fn line(&mut self, text: &str, font: Font, size: f32) {
        let leading = size * 1.4;
        self.ensure(leading);
        self.canvas.text_in(MARGIN, self.y, CONTENT_WIDTH, text, font, size, Align::Left);
        self.y += leading;
    }

    fn centered(&mut self, text: &str, font: Font, size: f32) {
        let leading = size * 1.4;
        self.ensure(leading);
        self.canvas.text_in(MARGIN, self.y, CONTENT_WIDTH, text, font, size, Align::Center);
        self.y += leading;
    }

    fn wrapped(&mut self, text: &str, size: f32) {
        for line in super::canvas::wrap_text(text, Font::Regular, size, CONTENT_WIDTH) {
            self.line(&line, Font::Regular, size);
        }
    }

    fn gap(&mut self, height: f32) {
        self.y += height;
    }

    fn table_header(&mut self) {
        let mut x = MARGIN;
        self.canvas.rect(MARGIN, self.y, CONTENT_WIDTH, TABLE_ROW);
        for (label, width, _) in TABLE_COLUMNS {
            self.canvas.text_in(x + 2.0, self.y + 4.0, width - 4.0, label, Font::Bold, 7.0, Align::Center);
            x += width;
        }
        self.y += TABLE_ROW;
    }

    fn table_row(&mut self, item: &LineItem) {
        if self.ensure(TABLE_ROW) {
            self.table_header();
        }
        let values = [
            item.code.clone(),
            item.description.clone(),
            format_quantity(item.quantity),
            item.unit.clone(),
            format_money(item.unit_price),
            format_money(item.total),
        ];
        self.canvas.rect(MARGIN, self.y, CONTENT_WIDTH, TABLE_ROW);
        let mut x = MARGIN;
        for ((_, width, align), value) in TABLE_COLUMNS.iter().zip(values.iter()) {
            self.canvas.text_in(x + 2.0, self.y + 4.0, width - 4.0, value, Font::Regular, 7.0, *align);
            x += width;
        }
        self.y += TABLE_ROW;
    }

    fn party(&mut self, title: &str, party: &Party) {
        self.line(title, Font::Bold, 10.0);
        self.line(&party.name, Font::Regular, 9.0);
        self.line(&format!("CNPJ/CPF: {}", format_tax_id(&party.tax_id)), Font::Regular, 9.0);
        if let Some(ie) = &party.state_registration {
            self.line(&format!("Inscrição Estadual: {}", ie), Font::Regular, 9.0);
        }
        self.line(&party.address.street_line(), Font::Regular, 9.0);
        let city = format!(
            "{} - {} - {}",
            party.address.district, party.address.city, party.address.state
        );
        self.line(&city, Font::Regular, 9.0);
        self.gap(6.0);
    }
}

pub fn render_legacy(doc: &FiscalDocument, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
    let mut flow = Flow {
        canvas: Canvas::new(format!("DANFE NF-e {}", doc.number)),
        y: MARGIN,
    };

    flow.centered("DANFE", Font::Bold, 18.0);
    flow.centered("Documento Auxiliar da Nota Fiscal Eletrônica", Font::Regular, 10.0);
    flow.gap(6.0);
    flow.line(&format!("Nº {}   SÉRIE {}", doc.number, doc.series), Font::Bold, 12.0);
    flow.line(&format!("Data de Emissão: {}", doc.issue_date), Font::Regular, 9.0);
    flow.line(&format!("Natureza da Operação: {}", doc.operation_nature), Font::Regular, 9.0);
    if let Some(key) = &doc.access_key {
        flow.line(&format!("Chave de Acesso: {}", key.formatted()), Font::Mono, 9.0);
    }
    if let Some(protocol) = &doc.protocol {
        flow.line(&format!("Protocolo de Autorização: {}", protocol), Font::Regular, 9.0);
    }
    flow.gap(8.0);

    flow.party("EMITENTE", &doc.emitter);
    flow.party("DESTINATÁRIO / REMETENTE", &doc.recipient);

    flow.line("DADOS DOS PRODUTOS/SERVIÇOS", Font::Bold, 10.0);
    flow.ensure(TABLE_ROW * 2.0);
    flow.table_header();
    for item in &doc.items {
        flow.table_row(item);
    }
    flow.gap(10.0);

    let t = &doc.totals;
    flow.line("CÁLCULO DO IMPOSTO", Font::Bold, 10.0);
    flow.line(
        &format!(
            "Base Cálc. ICMS: {}   Valor ICMS: {}   Valor IPI: {}",
            format_money(t.icms_base),
            format_money(t.icms_amount),
            format_money(t.ipi_total)
        ),
        Font::Regular,
        9.0,
    );
    flow.line(
        &format!(
            "Total dos Produtos: {}   Frete: {}   Desconto: {}",
            format_money(t.products_total),
            format_money(t.freight),
            format_money(t.discount)
        ),
        Font::Regular,
        9.0,
    );
    flow.line(&format!("VALOR TOTAL DA NOTA: R$ {}", format_money(t.grand_total)), Font::Bold, 11.0);
    flow.gap(8.0);

    if !doc.additional_info.taxpayer_notes.is_empty() {
        flow.line("DADOS ADICIONAIS", Font::Bold, 10.0);
        flow.wrapped(&doc.additional_info.taxpayer_notes, 8.0);
        flow.gap(6.0);
    }

    flow.centered(
        "Consulte a autenticidade em www.nfe.fazenda.gov.br/portal",
        Font::Regular,
        8.0,
    );
    flow.centered(&format!("Impresso em {}", options.printed_at), Font::Regular, 7.0);

    flow.canvas.finish()
}
