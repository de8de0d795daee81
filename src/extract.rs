// ── NFe XML Extraction ─────────────────────────────────────────
use std::borrow::Cow;
use std::io::Read;

use base64::Engine;
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::format::{format_date, format_date_time, format_time, parse_decimal};
use crate::nfe::{
    AccessKey, AdditionalInfo, Address, AuthorizationProtocol, BillingDuplicate, Carrier,
    FiscalDocument, FreightModality, InvoiceSummary, LineItem, OperationDirection, Party,
    TaxTotals, TransportInfo, Vehicle, Volume,
};
use crate::xml::{self, XmlNode};

/// Parses NFe XML (either a `nfeProc` envelope or a bare `NFe`) into a
/// `FiscalDocument`. Only the envelope nodes and at least one `det` are
/// mandatory; every other field falls back to empty or zero.
pub fn extract(xml_text: &str) -> Result<FiscalDocument, ExtractionError> {
    read_document(xml_text, true)
}

/// Same as [`extract`] but accepts a document without `det` entries. The
/// simplified layout uses it to print whatever header data survived.
pub fn extract_lenient(xml_text: &str) -> Result<FiscalDocument, ExtractionError> {
    read_document(xml_text, false)
}

fn read_document(xml_text: &str, require_items: bool) -> Result<FiscalDocument, ExtractionError> {
    let root = xml::parse(xml_text)?;
    let (inf, prot) = locate_inf_nfe(&root)?;

    let ide = inf.child("ide").cloned().unwrap_or_default();
    let items: Vec<LineItem> = inf
        .children_named("det")
        .enumerate()
        .map(|(idx, det)| parse_item(det, idx))
        .collect();
    if require_items && items.is_empty() {
        return Err(ExtractionError::NoItems);
    }

    let exit_raw = ide.opt_text("dhSaiEnt").or_else(|| ide.opt_text("dSaiEnt")).unwrap_or("");
    let exit_time = ide
        .opt_text("dhSaiEnt")
        .map(format_time)
        .or_else(|| ide.opt_text("hSaiEnt").map(format_time))
        .unwrap_or_default();
    let issue_raw = ide.opt_text("dhEmi").or_else(|| ide.opt_text("dEmi")).unwrap_or("");

    let doc = FiscalDocument {
        number: ide.text_of("nNF").to_string(),
        series: ide.text_of("serie").to_string(),
        issue_date: format_date(issue_raw),
        issue_time: format_time(issue_raw),
        exit_date: format_date(exit_raw),
        exit_time,
        access_key: access_key(inf, prot),
        operation_nature: ide.text_of("natOp").to_string(),
        direction: OperationDirection::from_code(ide.text_of("tpNF")),
        protocol: prot.and_then(parse_protocol),
        emitter: inf
            .child("emit")
            .map(|n| parse_party(n, "enderEmit"))
            .unwrap_or_default(),
        recipient: inf
            .child("dest")
            .map(|n| parse_party(n, "enderDest"))
            .unwrap_or_default(),
        items,
        totals: inf
            .path(&["total", "ICMSTot"])
            .map(parse_totals)
            .unwrap_or_default(),
        transport: inf.child("transp").map(parse_transport),
        invoice: inf.path(&["cobr", "fat"]).map(parse_invoice),
        duplicates: inf
            .child("cobr")
            .map(parse_duplicates)
            .unwrap_or_default(),
        additional_info: inf
            .child("infAdic")
            .map(|n| AdditionalInfo {
                taxpayer_notes: n.text_of("infCpl").to_string(),
                fiscal_notes: n.text_of("infAdFisco").to_string(),
            })
            .unwrap_or_default(),
    };

    debug!(
        numero = %doc.number,
        itens = doc.items.len(),
        chave = doc.access_key_str(),
        "NF-e extraída"
    );
    Ok(doc)
}

fn locate_inf_nfe(root: &XmlNode) -> Result<(&XmlNode, Option<&XmlNode>), ExtractionError> {
    let (nfe, prot) = match root.name.as_str() {
        "nfeProc" => (
            root.child("NFe").ok_or(ExtractionError::MissingRoot)?,
            root.path(&["protNFe", "infProt"]),
        ),
        "NFe" => (root, None),
        _ => return Err(ExtractionError::MissingRoot),
    };
    let inf = nfe.child("infNFe").ok_or(ExtractionError::MissingRoot)?;
    Ok((inf, prot))
}

fn access_key(inf: &XmlNode, prot: Option<&XmlNode>) -> Option<AccessKey> {
    if let Some(id) = inf.attr("Id") {
        return match AccessKey::from_inf_nfe_id(id) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("Ignorando atributo Id de infNFe: {}", e);
                None
            }
        };
    }
    let ch = prot?.opt_text("chNFe")?;
    AccessKey::parse(ch)
        .map_err(|e| warn!("Ignorando chNFe do protocolo: {}", e))
        .ok()
}

fn parse_protocol(inf_prot: &XmlNode) -> Option<AuthorizationProtocol> {
    let number = inf_prot.opt_text("nProt")?;
    Some(AuthorizationProtocol {
        number: number.to_string(),
        authorized_at: format_date_time(inf_prot.text_of("dhRecbto")),
    })
}

fn parse_address(node: &XmlNode) -> Address {
    Address {
        street: node.text_of("xLgr").to_string(),
        number: node.text_of("nro").to_string(),
        complement: node.text_of("xCpl").to_string(),
        district: node.text_of("xBairro").to_string(),
        city: node.text_of("xMun").to_string(),
        state: node.text_of("UF").to_string(),
        postal_code: node.text_of("CEP").to_string(),
    }
}

fn parse_party(node: &XmlNode, address_tag: &str) -> Party {
    let address_node = node.child(address_tag);
    Party {
        name: node.text_of("xNome").to_string(),
        trade_name: node.opt_text("xFant").map(str::to_string),
        tax_id: node
            .opt_text("CNPJ")
            .or_else(|| node.opt_text("CPF"))
            .unwrap_or("")
            .to_string(),
        state_registration: node.opt_text("IE").map(str::to_string),
        municipal_registration: node.opt_text("IM").map(str::to_string),
        address: address_node.map(parse_address).unwrap_or_default(),
        phone: address_node
            .and_then(|a| a.opt_text("fone"))
            .map(str::to_string),
    }
}

fn parse_item(det: &XmlNode, idx: usize) -> LineItem {
    let item_number = det
        .attr("nItem")
        .or_else(|| det.opt_text("nItem"))
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(idx as u32 + 1);

    let prod = det.child("prod").cloned().unwrap_or_default();
    let imposto = det.child("imposto");
    // ICMS00, ICMS10, ICMSSN102 ... whichever group the tax regime uses.
    let icms = imposto
        .and_then(|i| i.child("ICMS"))
        .and_then(XmlNode::first_structured_child)
        .cloned()
        .unwrap_or_default();
    let ipi = imposto
        .and_then(|i| i.path(&["IPI", "IPITrib"]))
        .cloned()
        .unwrap_or_default();

    LineItem {
        item_number,
        code: prod.text_of("cProd").to_string(),
        description: prod.text_of("xProd").to_string(),
        ncm: prod.opt_text("NCM").map(str::to_string),
        cst: icms
            .opt_text("CST")
            .or_else(|| icms.opt_text("CSOSN"))
            .map(str::to_string),
        cfop: prod.opt_text("CFOP").map(str::to_string),
        unit: prod.text_of("uCom").to_string(),
        quantity: parse_decimal(prod.text_of("qCom")),
        unit_price: parse_decimal(prod.text_of("vUnCom")),
        total: parse_decimal(prod.text_of("vProd")),
        discount: parse_decimal(prod.text_of("vDesc")),
        icms_base: parse_decimal(icms.text_of("vBC")),
        icms_amount: parse_decimal(icms.text_of("vICMS")),
        icms_rate: parse_decimal(icms.text_of("pICMS")),
        ipi_amount: parse_decimal(ipi.text_of("vIPI")),
        ipi_rate: parse_decimal(ipi.text_of("pIPI")),
    }
}

fn parse_totals(node: &XmlNode) -> TaxTotals {
    let v = |tag: &str| parse_decimal(node.text_of(tag));
    TaxTotals {
        icms_base: v("vBC"),
        icms_amount: v("vICMS"),
        icms_st_base: v("vBCST"),
        icms_st_amount: v("vST"),
        import_tax: v("vII"),
        products_total: v("vProd"),
        freight: v("vFrete"),
        insurance: v("vSeg"),
        discount: v("vDesc"),
        other_expenses: v("vOutro"),
        ipi_total: v("vIPI"),
        pis: v("vPIS"),
        cofins: v("vCOFINS"),
        approximate_taxes: v("vTotTrib"),
        icms_destination_state: v("vICMSUFDest"),
        grand_total: v("vNF"),
    }
}

fn parse_transport(node: &XmlNode) -> TransportInfo {
    let vehicle_node = node.child("veicTransp");
    let carrier = node.child("transporta").map(|t| Carrier {
        name: t.text_of("xNome").to_string(),
        tax_id: t
            .opt_text("CNPJ")
            .or_else(|| t.opt_text("CPF"))
            .unwrap_or("")
            .to_string(),
        state_registration: t.text_of("IE").to_string(),
        address: t.text_of("xEnder").to_string(),
        city: t.text_of("xMun").to_string(),
        state: t.text_of("UF").to_string(),
        registry_code: vehicle_node
            .and_then(|v| v.opt_text("RNTRC"))
            .or_else(|| t.opt_text("RNTRC"))
            .unwrap_or("")
            .to_string(),
    });

    TransportInfo {
        modality: FreightModality::from_code(node.text_of("modFrete")),
        carrier,
        vehicle: vehicle_node.map(|v| Vehicle {
            plate: v.text_of("placa").to_string(),
            state: v.text_of("UF").to_string(),
        }),
        volumes: node
            .children_named("vol")
            .map(|vol| Volume {
                count: parse_decimal(vol.text_of("qVol")),
                kind: vol.text_of("esp").to_string(),
                mark: vol.text_of("marca").to_string(),
                numbering: vol.text_of("nVol").to_string(),
                gross_weight: parse_decimal(vol.text_of("pesoB")),
                net_weight: parse_decimal(vol.text_of("pesoL")),
            })
            .collect(),
    }
}

fn parse_invoice(fat: &XmlNode) -> InvoiceSummary {
    InvoiceSummary {
        number: fat.text_of("nFat").to_string(),
        original_value: parse_decimal(fat.text_of("vOrig")),
        discount: parse_decimal(fat.text_of("vDesc")),
        net_value: parse_decimal(fat.text_of("vLiq")),
    }
}

fn parse_duplicates(cobr: &XmlNode) -> Vec<BillingDuplicate> {
    cobr.children_named("dup")
        .map(|dup| BillingDuplicate {
            number: dup.text_of("nDup").to_string(),
            due_date: format_date(dup.text_of("dVenc")),
            amount: parse_decimal(dup.text_of("vDup")),
        })
        .collect()
}

// ── Validation ─────────────────────────────────────────────────

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Structural check run before accepting an uploaded XML.
pub fn validate_xml(xml_text: &str) -> ValidationReport {
    let doc = match extract(xml_text) {
        Ok(doc) => doc,
        Err(e) => {
            return ValidationReport {
                valid: false,
                errors: vec![e.to_string()],
            }
        }
    };

    let mut errors = Vec::new();
    if doc.access_key.is_none() {
        errors.push("Chave de acesso não encontrada ou inválida".to_string());
    }
    if doc.number.is_empty() {
        errors.push("Número da nota fiscal não encontrado".to_string());
    }
    if doc.emitter.name.is_empty() {
        errors.push("Nome do emitente não encontrado".to_string());
    }
    if doc.emitter.tax_id.is_empty() {
        errors.push("CNPJ/CPF do emitente não encontrado".to_string());
    }
    if doc.recipient.name.is_empty() {
        errors.push("Nome do destinatário não encontrado".to_string());
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

// ── docZip Payloads ────────────────────────────────────────────

/// Decodes a SEFAZ `docZip` payload (base64 of gzip) into XML text.
pub fn decode_doc_zip(b64_content: &str) -> Result<String, ExtractionError> {
    let compact: String = b64_content.chars().filter(|c| !c.is_whitespace()).collect();
    let compressed = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ExtractionError::DocZip(format!("base64: {}", e)))?;

    let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
    let mut result = String::new();
    decoder
        .read_to_string(&mut result)
        .map_err(|e| ExtractionError::DocZip(format!("gzip: {}", e)))?;
    if result.is_empty() {
        return Err(ExtractionError::DocZip("conteúdo vazio".into()));
    }
    Ok(result)
}

/// Stored XML is either plain text or a `docZip` payload.
pub fn xml_from_stored(content: &str) -> Result<Cow<'_, str>, ExtractionError> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('<') {
        Ok(Cow::Borrowed(content))
    } else {
        decode_doc_zip(content).map(Cow::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::io::Write;

    const PROC: &str = include_str!("../tests/fixtures/nfe_proc_single_item.xml");
    const BARE: &str = include_str!("../tests/fixtures/nfe_bare_two_items.xml");

    #[test]
    fn extracts_envelope_with_protocol() {
        let doc = extract(PROC).unwrap();
        assert_eq!(doc.number, "417533");
        assert_eq!(doc.series, "2");
        assert_eq!(doc.issue_date, "17/04/2025");
        assert_eq!(doc.exit_time, "18:05");
        assert_eq!(doc.access_key_str(), "42250485179240000239550020004175331780623268");
        assert_eq!(doc.direction, OperationDirection::Outbound);
        assert_eq!(
            doc.protocol_line(),
            "242250145815827 - 17/04/2025 17:30:42"
        );
        assert_eq!(doc.emitter.tax_id, "85179240000239");
        assert_eq!(doc.emitter.address.city, "JOINVILLE");
        assert_eq!(doc.emitter.phone.as_deref(), Some("4731458100"));
        assert_eq!(doc.additional_info.taxpayer_notes, "PEDIDO 4500123 & ENTREGA AGENDADA");
    }

    #[test]
    fn single_det_becomes_one_item() {
        let doc = extract(PROC).unwrap();
        assert_eq!(doc.items.len(), 1);
        let item = &doc.items[0];
        assert_eq!(item.item_number, 1);
        assert_eq!(item.cst.as_deref(), Some("00"));
        assert_eq!(item.icms_amount, Decimal::new(5780, 2));
        assert_eq!(item.icms_rate, Decimal::new(7, 0));
        assert_eq!(item.quantity, Decimal::new(8, 0));
    }

    #[test]
    fn bare_nfe_with_two_items_and_simples_icms() {
        let doc = extract(BARE).unwrap();
        assert_eq!(doc.items.len(), 2);
        assert!(doc.protocol.is_none());
        assert_eq!(doc.direction, OperationDirection::Inbound);
        assert_eq!(doc.issue_date, "03/06/2024");
        assert_eq!(doc.issue_time, "");
        assert_eq!(doc.items[0].cst.as_deref(), Some("102"));
        assert_eq!(doc.items[0].ipi_amount, Decimal::new(2275, 2));
        assert_eq!(doc.items[0].discount, Decimal::new(5, 0));
        assert_eq!(doc.items[1].cst, None);
        assert_eq!(doc.items[1].ncm, None);
        assert_eq!(doc.emitter.tax_id, "12345678901");
        assert_eq!(doc.emitter.address.street_line(), "AV PAULISTA, 1000, CONJ 12");
    }

    #[test]
    fn missing_totals_default_to_zero() {
        let doc = extract(BARE).unwrap();
        assert_eq!(doc.totals.icms_base, Decimal::ZERO);
        assert_eq!(doc.totals.freight, Decimal::ZERO);
        assert_eq!(doc.totals.grand_total, Decimal::new(54275, 2));
        assert!(doc.transport.is_none());
        assert!(doc.duplicates.is_empty());
    }

    #[test]
    fn destination_state_icms_is_read_from_totals() {
        let xml = BARE.replace("<vNF>542.75</vNF>", "<vICMSUFDest>12.34</vICMSUFDest><vNF>542.75</vNF>");
        let doc = extract(&xml).unwrap();
        assert_eq!(doc.totals.icms_destination_state, Decimal::new(1234, 2));
        assert_eq!(extract(BARE).unwrap().totals.icms_destination_state, Decimal::ZERO);
    }

    #[test]
    fn transport_and_billing() {
        let doc = extract(PROC).unwrap();
        let transport = doc.transport.unwrap();
        assert_eq!(transport.modality, FreightModality::ByEmitter);
        assert_eq!(transport.carrier.unwrap().name, "SCHREIBER LOGISTICA LTDA");
        assert_eq!(transport.volumes.len(), 1);
        assert_eq!(transport.volumes[0].gross_weight, Decimal::new(115, 1));
        assert_eq!(doc.duplicates.len(), 1);
        assert_eq!(doc.duplicates[0].due_date, "15/08/2025");
        assert_eq!(doc.invoice.unwrap().number, "2000417533");
    }

    #[test]
    fn bad_id_leaves_key_empty() {
        let xml = BARE.replace(
            "NFe35240612345678000195550010000012341000012345",
            "NFe3524061234",
        );
        let doc = extract(&xml).unwrap();
        assert_eq!(doc.access_key_str(), "");
    }

    #[test]
    fn key_falls_back_to_protocol() {
        let xml = PROC.replace(
            r#"Id="NFe42250485179240000239550020004175331780623268" "#,
            "",
        );
        let doc = extract(&xml).unwrap();
        assert_eq!(doc.access_key_str(), "42250485179240000239550020004175331780623268");
    }

    #[test]
    fn lenient_read_accepts_missing_items() {
        let xml = "<NFe><infNFe><ide><nNF>77</nNF></ide><emit><xNome>ACME</xNome></emit></infNFe></NFe>";
        assert!(matches!(extract(xml), Err(ExtractionError::NoItems)));
        let doc = extract_lenient(xml).unwrap();
        assert_eq!(doc.number, "77");
        assert_eq!(doc.emitter.name, "ACME");
        assert!(doc.items.is_empty());
        assert!(matches!(extract_lenient("<CTe/>"), Err(ExtractionError::MissingRoot)));
    }

    #[test]
    fn error_taxonomy() {
        assert!(matches!(extract("<NFe><infNFe>"), Err(ExtractionError::MalformedXml(_))));
        assert!(matches!(extract("não é xml"), Err(ExtractionError::MalformedXml(_))));
        assert!(matches!(extract("<nfeProc><protNFe/></nfeProc>"), Err(ExtractionError::MissingRoot)));
        assert!(matches!(extract("<NFe><outro/></NFe>"), Err(ExtractionError::MissingRoot)));
        assert!(matches!(extract("<CTe><infCte/></CTe>"), Err(ExtractionError::MissingRoot)));
        assert!(matches!(
            extract("<NFe><infNFe><ide><nNF>1</nNF></ide></infNFe></NFe>"),
            Err(ExtractionError::NoItems)
        ));
    }

    #[test]
    fn validation_report() {
        assert_eq!(validate_xml(PROC), ValidationReport { valid: true, errors: vec![] });

        let stripped = PROC.replace(
            "<xNome>CORSUL COMERCIO E REPRESENTACOES DO SUL LTDA</xNome>",
            "",
        );
        let report = validate_xml(&stripped);
        assert!(!report.valid);
        assert_eq!(report.errors, vec!["Nome do emitente não encontrado".to_string()]);

        let broken = validate_xml("<NFe>");
        assert!(!broken.valid);
        assert_eq!(broken.errors.len(), 1);
    }

    #[test]
    fn doc_zip_round_trip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(BARE.as_bytes()).unwrap();
        let gz = encoder.finish().unwrap();
        let b64 = base64::engine::general_purpose::STANDARD.encode(gz);

        assert_eq!(decode_doc_zip(&b64).unwrap(), BARE);
        assert_eq!(xml_from_stored(&b64).unwrap(), BARE);
        assert!(matches!(xml_from_stored(BARE).unwrap(), Cow::Borrowed(_)));
        assert!(decode_doc_zip("!!!").is_err());
    }
}
