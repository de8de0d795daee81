use lopdf::Document;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use crosswms_danfe_lib::danfe::legacy::render_legacy;
use crosswms_danfe_lib::danfe::sections::leading_boxes;
use crosswms_danfe_lib::nfe::LineItem;
use crosswms_danfe_lib::pdf_utils::{merge_pdfs, pdf_info};
use crosswms_danfe_lib::{extract, render_with, validate_xml, RenderOptions};

const PROC: &str = include_str!("fixtures/nfe_proc_single_item.xml");
const BARE: &str = include_str!("fixtures/nfe_bare_two_items.xml");

fn options() -> RenderOptions {
    RenderOptions {
        printed_at: "17/04/2025 10:00:00".into(),
    }
}

fn pages(pdf: &[u8]) -> usize {
    Document::load_mem(pdf).unwrap().get_pages().len()
}

#[test]
fn rendering_is_deterministic_for_a_fixed_timestamp() {
    let doc = extract(PROC).unwrap();
    let first = render_with(&doc, &options()).unwrap();
    let second = render_with(&extract(PROC).unwrap(), &options()).unwrap();
    assert_eq!(first, second);
    assert_eq!(pages(&first), 1);
}

#[test]
fn footer_timestamp_changes_the_output() {
    let doc = extract(BARE).unwrap();
    let other = RenderOptions {
        printed_at: "18/04/2025 10:00:00".into(),
    };
    assert_ne!(render_with(&doc, &options()).unwrap(), render_with(&doc, &other).unwrap());
}

#[test]
fn long_item_lists_span_several_pages() {
    let mut doc = extract(PROC).unwrap();
    let template = doc.items[0].clone();
    doc.items = (1..=180)
        .map(|n| LineItem {
            item_number: n,
            code: format!("{:06}", n),
            ..template.clone()
        })
        .collect();

    let pdf = render_with(&doc, &options()).unwrap();
    assert!(pages(&pdf) >= 3);

    let legacy = render_legacy(&doc, &options()).unwrap();
    assert!(pages(&legacy) >= 2);
}

#[test]
fn batch_page_count_is_the_sum() {
    let a = render_with(&extract(PROC).unwrap(), &options()).unwrap();
    let b = render_with(&extract(BARE).unwrap(), &options()).unwrap();
    let expected = pages(&a) + pages(&b);
    let merged = merge_pdfs(vec![a, b]).unwrap();
    assert_eq!(pdf_info(&merged).unwrap().page_count, expected);
}

#[test]
fn totals_are_shown_as_given() {
    let mut doc = extract(BARE).unwrap();
    doc.totals.grand_total = Decimal::new(1, 2);
    // no reconciliation against the items: rendering still succeeds
    assert!(render_with(&doc, &options()).is_ok());
}

#[test]
fn stripped_emitter_fails_validation() {
    let stripped = PROC.replace(
        "<xNome>CORSUL COMERCIO E REPRESENTACOES DO SUL LTDA</xNome>",
        "",
    );
    let report = validate_xml(&stripped);
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("emitente")));
    assert!(validate_xml(PROC).valid);
}

#[test]
fn invoice_without_installments_keeps_the_billing_box() {
    let start = PROC.find("<dup>").unwrap();
    let end = PROC.find("</dup>").unwrap() + "</dup>".len();
    let xml = format!("{}{}", &PROC[..start], &PROC[end..]);
    let doc = extract(&xml).unwrap();
    assert!(doc.duplicates.is_empty());
    assert!(doc.invoice.is_some());

    let titles: Vec<_> = leading_boxes(&doc, 1).into_iter().filter_map(|b| b.title).collect();
    assert!(titles.contains(&"FATURA / DUPLICATA"), "{:?}", titles);
    assert!(render_with(&doc, &options()).is_ok());
}
