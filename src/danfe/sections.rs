// ── DANFE Sections ─────────────────────────────────────────────
//
// Builders that turn a FiscalDocument into box descriptors, in draw order.
use super::canvas::{Align, Font};
use super::layout::{BoxSpec, Cell, CellContent, Row, TextLine};
use crate::format::{
    format_document_number, format_money, format_postal_code, format_tax_id,
    format_weight, pad_number,
};
use crate::nfe::{FiscalDocument, Party};
use rust_decimal::Decimal;

const FIELD_ROW: f32 = 21.0;
const HEADER_ROW: f32 = 86.0;
const MAX_DUPLICATE_COLUMNS: usize = 8;

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn city_line(party: &Party) -> String {
    match (party.address.city.is_empty(), party.address.state.is_empty()) {
        (false, false) => format!("{} - {}", party.address.city, party.address.state),
        (false, true) => party.address.city.clone(),
        (true, _) => party.address.state.clone(),
    }
}

pub fn receipt(doc: &FiscalDocument) -> BoxSpec {
    let ack = format!(
        "RECEBEMOS DE {} OS PRODUTOS E/OU SERVIÇOS CONSTANTES DA NOTA FISCAL ELETRÔNICA INDICADA AO LADO",
        doc.emitter.name
    );
    let summary = format!(
        "EMISSÃO: {}  VALOR TOTAL: R$ {}  DESTINATÁRIO: {}",
        doc.issue_date,
        format_money(doc.totals.grand_total),
        doc.recipient.name
    );
    let left = Cell::lines(
        0.8,
        vec![
            TextLine::new(ack, Font::Regular, 6.0).wrapped(2),
            TextLine::new(summary, Font::Regular, 6.0),
            TextLine::new("", Font::Regular, 4.0),
            TextLine::new(
                "DATA DE RECEBIMENTO            IDENTIFICAÇÃO E ASSINATURA DO RECEBEDOR",
                Font::Regular,
                5.0,
            ),
        ],
    );
    let right = Cell::lines(
        0.2,
        vec![
            TextLine::new("NF-e", Font::Bold, 11.0).centered(),
            TextLine::new(format!("Nº {}", format_document_number(&doc.number)), Font::Bold, 8.0).centered(),
            TextLine::new(format!("SÉRIE {}", pad_number(&doc.series, 3)), Font::Bold, 8.0).centered(),
        ],
    );
    BoxSpec {
        title: None,
        rows: vec![Row::new(38.0, vec![left, right])],
    }
}

pub fn header(doc: &FiscalDocument, total_pages: usize) -> BoxSpec {
    let emitter = &doc.emitter;
    let mut identity = vec![
        TextLine::new("IDENTIFICAÇÃO DO EMITENTE", Font::Regular, 5.0),
        TextLine::new(emitter.name.as_str(), Font::Bold, 9.0).centered().wrapped(2),
    ];
    if let Some(trade) = &emitter.trade_name {
        identity.push(TextLine::new(trade.as_str(), Font::Regular, 7.0).centered());
    }
    identity.push(TextLine::new(emitter.address.street_line(), Font::Regular, 7.0).centered().wrapped(2));
    identity.push(
        TextLine::new(
            format!(
                "{} - {}",
                emitter.address.district,
                format_postal_code(&emitter.address.postal_code)
            ),
            Font::Regular,
            7.0,
        )
        .centered(),
    );
    identity.push(TextLine::new(city_line(emitter), Font::Regular, 7.0).centered());
    if let Some(phone) = &emitter.phone {
        identity.push(TextLine::new(format!("Fone: {}", phone), Font::Regular, 7.0).centered());
    }

    let title = Cell {
        weight: 0.2,
        content: CellContent::DocumentTitle {
            direction_code: doc.direction.code().to_string(),
            number: format_document_number(&doc.number),
            series: pad_number(&doc.series, 3),
            page: format!("1/{}", total_pages.max(1)),
        },
    };
    let key = Cell {
        weight: 0.38,
        content: CellContent::AccessKey(doc.access_key.clone()),
    };
    BoxSpec {
        title: None,
        rows: vec![Row::new(HEADER_ROW, vec![Cell::lines(0.42, identity), title, key])],
    }
}

pub fn emitter_identification(doc: &FiscalDocument) -> BoxSpec {
    let e = &doc.emitter;
    BoxSpec {
        title: None,
        rows: vec![
            Row::new(
                FIELD_ROW,
                vec![
                    Cell::field(0.6, "NATUREZA DA OPERAÇÃO", doc.operation_nature.as_str()),
                    Cell::field(0.4, "PROTOCOLO DE AUTORIZAÇÃO DE USO", doc.protocol_line()),
                ],
            ),
            Row::new(
                FIELD_ROW,
                vec![
                    Cell::field(1.0, "INSCRIÇÃO ESTADUAL", opt(&e.state_registration)),
                    Cell::field(1.0, "INSCRIÇÃO MUNICIPAL", opt(&e.municipal_registration)),
                    Cell::field(1.0, "INSCRIÇÃO ESTADUAL DO SUBST. TRIB.", ""),
                    Cell::field(1.0, "CNPJ / CPF", format_tax_id(&e.tax_id)),
                ],
            ),
        ],
    }
}

pub fn recipient(doc: &FiscalDocument) -> BoxSpec {
    let r = &doc.recipient;
    BoxSpec {
        title: Some("DESTINATÁRIO / REMETENTE"),
        rows: vec![
            Row::new(
                FIELD_ROW,
                vec![
                    Cell::field(0.55, "NOME / RAZÃO SOCIAL", r.name.as_str()),
                    Cell::field(0.25, "CNPJ / CPF", format_tax_id(&r.tax_id)),
                    Cell::field(0.2, "DATA DA EMISSÃO", doc.issue_date.as_str()),
                ],
            ),
            Row::new(
                FIELD_ROW,
                vec![
                    Cell::field(0.43, "ENDEREÇO", r.address.street_line()),
                    Cell::field(0.23, "BAIRRO / DISTRITO", r.address.district.as_str()),
                    Cell::field(0.14, "CEP", format_postal_code(&r.address.postal_code)),
                    Cell::field(0.2, "DATA DA SAÍDA/ENTRADA", doc.exit_date.as_str()),
                ],
            ),
            Row::new(
                FIELD_ROW,
                vec![
                    Cell::field(0.35, "MUNICÍPIO", r.address.city.as_str()),
                    Cell::field(0.18, "FONE / FAX", opt(&r.phone)),
                    Cell::field(0.07, "UF", r.address.state.as_str()),
                    Cell::field(0.2, "INSCRIÇÃO ESTADUAL", opt(&r.state_registration)),
                    Cell::field(0.2, "HORA DA SAÍDA/ENTRADA", doc.exit_time.as_str()),
                ],
            ),
        ],
    }
}

/// Only present when the document carries duplicates or an invoice summary.
pub fn duplicates(doc: &FiscalDocument) -> Option<BoxSpec> {
    if doc.duplicates.is_empty() && doc.invoice.is_none() {
        return None;
    }
    let mut rows = Vec::new();
    if let Some(invoice) = &doc.invoice {
        rows.push(Row::new(
            FIELD_ROW,
            vec![
                Cell::field(1.0, "NÚMERO DA FATURA", invoice.number.as_str()),
                Cell::amount(1.0, "VALOR ORIGINAL", format_money(invoice.original_value)),
                Cell::amount(1.0, "VALOR DO DESCONTO", format_money(invoice.discount)),
                Cell::amount(1.0, "VALOR LÍQUIDO", format_money(invoice.net_value)),
            ],
        ));
    }
    for chunk in doc.duplicates.chunks(MAX_DUPLICATE_COLUMNS) {
        let mut cells: Vec<Cell> = chunk
            .iter()
            .map(|dup| {
                Cell::lines(
                    1.0,
                    vec![
                        TextLine::new(format!("Num. {}", dup.number), Font::Regular, 6.5),
                        TextLine::new(format!("Venc. {}", dup.due_date), Font::Regular, 6.5),
                        TextLine::new(format!("Valor R$ {}", format_money(dup.amount)), Font::Bold, 6.5),
                    ],
                )
            })
            .collect();
        while cells.len() < 2 {
            cells.push(Cell {
                weight: 1.0,
                content: CellContent::Empty,
            });
        }
        rows.push(Row::new(26.0, cells));
    }
    Some(BoxSpec {
        title: Some("FATURA / DUPLICATA"),
        rows,
    })
}

pub fn tax_grid(doc: &FiscalDocument) -> BoxSpec {
    let t = &doc.totals;
    let m = format_money;
    BoxSpec {
        title: Some("CÁLCULO DO IMPOSTO"),
        rows: vec![
            Row::new(
                FIELD_ROW,
                vec![
                    Cell::amount(1.0, "BASE DE CÁLC. DO ICMS", m(t.icms_base)),
                    Cell::amount(1.0, "VALOR DO ICMS", m(t.icms_amount)),
                    Cell::amount(1.0, "BASE DE CÁLC. ICMS S.T.", m(t.icms_st_base)),
                    Cell::amount(1.0, "VALOR DO ICMS SUBST.", m(t.icms_st_amount)),
                    Cell::amount(1.0, "V. IMP. IMPORTAÇÃO", m(t.import_tax)),
                    Cell::amount(1.0, "VALOR DO PIS", m(t.pis)),
                    Cell::amount(1.0, "VALOR DA COFINS", m(t.cofins)),
                    Cell::amount(1.0, "V. TOTAL PRODUTOS", m(t.products_total)),
                ],
            ),
            Row::new(
                FIELD_ROW,
                vec![
                    Cell::amount(1.0, "VALOR DO FRETE", m(t.freight)),
                    Cell::amount(1.0, "VALOR DO SEGURO", m(t.insurance)),
                    Cell::amount(1.0, "DESCONTO", m(t.discount)),
                    Cell::amount(1.0, "OUTRAS DESPESAS", m(t.other_expenses)),
                    Cell::amount(1.0, "VALOR TOTAL IPI", m(t.ipi_total)),
                    Cell::amount(1.0, "V. APROX. TRIBUTOS", m(t.approximate_taxes)),
                    Cell::amount(1.0, "V. ICMS UF DEST.", m(t.icms_destination_state)),
                    Cell::amount(1.0, "V. TOTAL DA NOTA", m(t.grand_total)).bold(),
                ],
            ),
        ],
    }
}

/// Only present when the document carries transport information.
pub fn carrier(doc: &FiscalDocument) -> Option<BoxSpec> {
    let transport = doc.transport.as_ref()?;
    let carrier = transport.carrier.clone().unwrap_or_default();
    let vehicle = transport.vehicle.clone().unwrap_or_default();
    let volume = transport.volumes.first().cloned().unwrap_or_default();
    let has_volume = !transport.volumes.is_empty();
    let weight = |v: Decimal| if has_volume { format_weight(v) } else { String::new() };

    Some(BoxSpec {
        title: Some("TRANSPORTADOR / VOLUMES TRANSPORTADOS"),
        rows: vec![
            Row::new(
                FIELD_ROW,
                vec![
                    Cell::field(0.29, "NOME / RAZÃO SOCIAL", carrier.name),
                    Cell::field(0.18, "FRETE POR CONTA", transport.modality.label()),
                    Cell::field(0.12, "CÓDIGO ANTT", carrier.registry_code),
                    Cell::field(0.12, "PLACA DO VEÍCULO", vehicle.plate),
                    Cell::field(0.05, "UF", vehicle.state),
                    Cell::field(0.24, "CNPJ / CPF", format_tax_id(&carrier.tax_id)),
                ],
            ),
            Row::new(
                FIELD_ROW,
                vec![
                    Cell::field(0.42, "ENDEREÇO", carrier.address),
                    Cell::field(0.29, "MUNICÍPIO", carrier.city),
                    Cell::field(0.05, "UF", carrier.state),
                    Cell::field(0.24, "INSCRIÇÃO ESTADUAL", carrier.state_registration),
                ],
            ),
            Row::new(
                FIELD_ROW,
                vec![
                    Cell::amount(
                        0.1,
                        "QUANTIDADE",
                        if has_volume { volume.count.normalize().to_string() } else { String::new() },
                    ),
                    Cell::field(0.17, "ESPÉCIE", volume.kind),
                    Cell::field(0.17, "MARCA", volume.mark),
                    Cell::field(0.17, "NUMERAÇÃO", volume.numbering),
                    Cell::amount(0.19, "PESO BRUTO", weight(volume.gross_weight)),
                    Cell::amount(0.2, "PESO LÍQUIDO", weight(volume.net_weight)),
                ],
            ),
        ],
    })
}

/// Boxes drawn before the item table, in order.
pub fn leading_boxes(doc: &FiscalDocument, total_pages: usize) -> Vec<BoxSpec> {
    let mut boxes = vec![
        receipt(doc),
        header(doc, total_pages),
        emitter_identification(doc),
        recipient(doc),
    ];
    boxes.extend(duplicates(doc));
    boxes.push(tax_grid(doc));
    boxes.extend(carrier(doc));
    boxes
}

pub fn footer(doc: &FiscalDocument) -> BoxSpec {
    let info = &doc.additional_info;
    BoxSpec {
        title: Some("DADOS ADICIONAIS"),
        rows: vec![Row::new(
            72.0,
            vec![
                Cell::lines(
                    0.65,
                    vec![
                        TextLine::new("INFORMAÇÕES COMPLEMENTARES", Font::Regular, 5.0),
                        TextLine::new(info.taxpayer_notes.as_str(), Font::Regular, 6.5).wrapped(8),
                    ],
                ),
                Cell::lines(
                    0.35,
                    vec![
                        TextLine::new("RESERVADO AO FISCO", Font::Regular, 5.0),
                        TextLine::new(info.fiscal_notes.as_str(), Font::Regular, 6.5).wrapped(8),
                    ],
                ),
            ],
        )],
    }
}

/// Print timestamp on the left, product signature on the right.
pub fn signature_line(printed_at: &str) -> [(String, Align); 2] {
    [
        (format!("Impresso em {}", printed_at), Align::Left),
        ("CrossWMS - Sistema de Gestão Logística".to_string(), Align::Right),
    ]
}
