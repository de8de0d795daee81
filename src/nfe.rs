// ── NFe Data Model ─────────────────────────────────────────────
use rust_decimal::Decimal;
use std::fmt;

/// 44-digit NFe access key (chave de acesso).
#[derive(serde::Serialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct AccessKey(String);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Chave de acesso deve conter exatamente 44 dígitos numéricos (recebido: '{0}')")]
pub struct InvalidAccessKey(pub String);

impl AccessKey {
    pub const LEN: usize = 44;

    pub fn parse(raw: &str) -> Result<Self, InvalidAccessKey> {
        let trimmed = raw.trim();
        if trimmed.len() != Self::LEN || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(InvalidAccessKey(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Accepts the `infNFe/@Id` form (`NFe` + 44 digits) as well as a bare key.
    pub fn from_inf_nfe_id(id: &str) -> Result<Self, InvalidAccessKey> {
        let id = id.trim();
        Self::parse(id.strip_prefix("NFe").unwrap_or(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 11 groups of 4 digits separated by single spaces.
    pub fn formatted(&self) -> String {
        self.0
            .as_bytes()
            .chunks(4)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Enumerations ───────────────────────────────────────────────

#[derive(serde::Serialize, Clone, Debug, PartialEq, Eq, Default)]
pub enum OperationDirection {
    Inbound,
    #[default]
    Outbound,
    Unknown(String),
}

impl OperationDirection {
    /// `tpNF`: 0 = entrada, 1 = saída. Missing values default to saída.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "0" => Self::Inbound,
            "1" | "" => Self::Outbound,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Inbound => "0",
            Self::Outbound => "1",
            Self::Unknown(code) => code,
        }
    }
}

#[derive(serde::Serialize, Clone, Debug, PartialEq, Eq, Default)]
pub enum FreightModality {
    ByEmitter,
    ByRecipient,
    ThirdParty,
    OwnBySender,
    OwnByRecipient,
    NoTransport,
    #[default]
    Unspecified,
    Unknown(String),
}

impl FreightModality {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "0" => Self::ByEmitter,
            "1" => Self::ByRecipient,
            "2" => Self::ThirdParty,
            "3" => Self::OwnBySender,
            "4" => Self::OwnByRecipient,
            "9" => Self::NoTransport,
            "" => Self::Unspecified,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Label printed in the "FRETE POR CONTA" field. Unknown codes print nothing.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ByEmitter => "0-Por conta do Emit",
            Self::ByRecipient => "1-Por conta do Dest",
            Self::ThirdParty => "2-Por conta de Terceiros",
            Self::OwnBySender => "3-Próprio por conta do Rem",
            Self::OwnByRecipient => "4-Próprio por conta do Dest",
            Self::NoTransport => "9-Sem Ocorrência de Transporte",
            Self::Unspecified | Self::Unknown(_) => "",
        }
    }
}

// ── Records ────────────────────────────────────────────────────

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl Address {
    /// "Rua X, 123, Sala 4", the single-line form used by the address fields.
    pub fn street_line(&self) -> String {
        let mut line = self.street.clone();
        if !self.number.is_empty() {
            if !line.is_empty() {
                line.push_str(", ");
            }
            line.push_str(&self.number);
        }
        if !self.complement.is_empty() {
            line.push_str(", ");
            line.push_str(&self.complement);
        }
        line
    }
}

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct Party {
    pub name: String,
    pub trade_name: Option<String>,
    pub tax_id: String,
    pub state_registration: Option<String>,
    pub municipal_registration: Option<String>,
    pub address: Address,
    pub phone: Option<String>,
}

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct LineItem {
    pub item_number: u32,
    pub code: String,
    pub description: String,
    pub ncm: Option<String>,
    pub cst: Option<String>,
    pub cfop: Option<String>,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub discount: Decimal,
    pub icms_base: Decimal,
    pub icms_amount: Decimal,
    pub icms_rate: Decimal,
    pub ipi_amount: Decimal,
    pub ipi_rate: Decimal,
}

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct TaxTotals {
    pub icms_base: Decimal,
    pub icms_amount: Decimal,
    pub icms_st_base: Decimal,
    pub icms_st_amount: Decimal,
    pub import_tax: Decimal,
    pub products_total: Decimal,
    pub freight: Decimal,
    pub insurance: Decimal,
    pub discount: Decimal,
    pub other_expenses: Decimal,
    pub ipi_total: Decimal,
    pub pis: Decimal,
    pub cofins: Decimal,
    pub approximate_taxes: Decimal,
    /// Interstate ICMS owed to the destination state (`vICMSUFDest`).
    pub icms_destination_state: Decimal,
    pub grand_total: Decimal,
}

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct Carrier {
    pub name: String,
    pub tax_id: String,
    pub state_registration: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub registry_code: String,
}

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct Vehicle {
    pub plate: String,
    pub state: String,
}

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct Volume {
    pub count: Decimal,
    pub kind: String,
    pub mark: String,
    pub numbering: String,
    pub gross_weight: Decimal,
    pub net_weight: Decimal,
}

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct TransportInfo {
    pub modality: FreightModality,
    pub carrier: Option<Carrier>,
    pub vehicle: Option<Vehicle>,
    pub volumes: Vec<Volume>,
}

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct BillingDuplicate {
    pub number: String,
    pub due_date: String,
    pub amount: Decimal,
}

/// `cobr/fat`: the invoice the duplicates belong to.
#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct InvoiceSummary {
    pub number: String,
    pub original_value: Decimal,
    pub discount: Decimal,
    pub net_value: Decimal,
}

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct AuthorizationProtocol {
    pub number: String,
    pub authorized_at: String,
}

impl fmt::Display for AuthorizationProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.authorized_at.is_empty() {
            write!(f, "{}", self.number)
        } else {
            write!(f, "{} - {}", self.number, self.authorized_at)
        }
    }
}

#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct AdditionalInfo {
    pub taxpayer_notes: String,
    pub fiscal_notes: String,
}

/// Canonical record extracted from one NFe. Built once per request and
/// never mutated after extraction.
#[derive(serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct FiscalDocument {
    pub number: String,
    pub series: String,
    pub issue_date: String,
    pub issue_time: String,
    pub exit_date: String,
    pub exit_time: String,
    pub access_key: Option<AccessKey>,
    pub operation_nature: String,
    pub direction: OperationDirection,
    pub protocol: Option<AuthorizationProtocol>,
    pub emitter: Party,
    pub recipient: Party,
    pub items: Vec<LineItem>,
    pub totals: TaxTotals,
    pub transport: Option<TransportInfo>,
    pub invoice: Option<InvoiceSummary>,
    pub duplicates: Vec<BillingDuplicate>,
    pub additional_info: AdditionalInfo,
}

impl FiscalDocument {
    /// The access key or an empty string.
    pub fn access_key_str(&self) -> &str {
        self.access_key.as_ref().map(AccessKey::as_str).unwrap_or("")
    }

    pub fn protocol_line(&self) -> String {
        self.protocol.as_ref().map(ToString::to_string).unwrap_or_default()
    }
}
