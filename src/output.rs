//! Output types: the invoice record, the analysis result and document metadata.
//!
//! The JSON keys of [`InvoiceRecord`] are the wire contract shared with the
//! model prompt and with downstream consumers of the downloaded file, so they
//! are pinned with `#[serde(rename)]` while the Rust fields stay descriptive.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::warn;

/// File name offered when the record is downloaded.
pub const RECORD_FILE_NAME: &str = "analisis_factura.json";

/// Final verdict for an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    /// Every check passed.
    #[serde(rename = "valida")]
    Valid,
    /// Both company checks passed but something minor is off.
    #[serde(rename = "con_observaciones")]
    ValidWithObservations,
    /// A critical check failed.
    #[serde(rename = "no_valida")]
    Invalid,
    /// The model answered with a status outside the contract.
    #[serde(rename = "indeterminado", other)]
    Undetermined,
}

impl InvoiceStatus {
    /// Heading shown above the report.
    pub fn title(&self) -> &'static str {
        match self {
            InvoiceStatus::Valid => "Factura Válida",
            InvoiceStatus::ValidWithObservations => "Válida con Observaciones",
            InvoiceStatus::Invalid => "Factura No Válida",
            InvoiceStatus::Undetermined => "Estado Indeterminado",
        }
    }

    /// Wire value, as written in `estado_final`.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Valid => "valida",
            InvoiceStatus::ValidWithObservations => "con_observaciones",
            InvoiceStatus::Invalid => "no_valida",
            InvoiceStatus::Undetermined => "indeterminado",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured half of the model reply.
///
/// Parsing is lenient: unknown keys are ignored, missing or `null` strings
/// read as empty, a missing pickup address reads as `None`. Booleans and the status
/// are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Seller name matches the bank account holder. The critical check.
    #[serde(rename = "vendedor_coincide_cuenta_bancaria")]
    pub seller_matches_account_holder: bool,

    /// Recipient matches the reference record exactly.
    #[serde(rename = "destinatario_valido")]
    pub recipient_valid: bool,

    #[serde(rename = "incoterm", default, deserialize_with = "null_as_empty")]
    pub incoterm: String,

    /// Incoterm present and complete (pickup address for EXW, port for FOB).
    #[serde(rename = "incoterm_valido")]
    pub incoterm_valid: bool,

    /// Pickup address, only for EXW.
    #[serde(rename = "incoterm_direccion_recogida", default)]
    pub pickup_address: Option<String>,

    #[serde(rename = "terminos_pago", default, deserialize_with = "null_as_empty")]
    pub payment_terms: String,

    #[serde(rename = "terminos_pago_validos")]
    pub payment_terms_valid: bool,

    /// Short description of the goods.
    #[serde(rename = "mercaderia", default, deserialize_with = "null_as_empty")]
    pub goods: String,

    /// Detected or suggested HS code, or "No determinado".
    #[serde(rename = "hs_code_sugerido", default, deserialize_with = "null_as_empty")]
    pub suggested_hs_code: String,

    /// `false` only when a code printed on the invoice is wrong. A missing
    /// code with a suggestion stays `true`.
    #[serde(rename = "hs_code_valido")]
    pub hs_code_valid: bool,

    #[serde(rename = "estado_final")]
    pub status: InvoiceStatus,
}

/// Models answer `null` for a field they could not find.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl InvoiceRecord {
    /// `true` when either company check failed, which forces `no_valida`.
    pub fn has_critical_failure(&self) -> bool {
        !self.seller_matches_account_holder || !self.recipient_valid
    }

    /// Force `no_valida` when a critical check failed.
    ///
    /// Returns `true` if the status had to be corrected.
    pub fn enforce_critical_checks(&mut self) -> bool {
        if self.has_critical_failure() && self.status != InvoiceStatus::Invalid {
            warn!(
                reported = %self.status,
                seller_match = self.seller_matches_account_holder,
                recipient_valid = self.recipient_valid,
                "Model status contradicts a failed critical check; forcing no_valida"
            );
            self.status = InvoiceStatus::Invalid;
            return true;
        }
        false
    }

    /// Pretty-printed JSON, the downloadable/clipboard artifact.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Both halves of a successful analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Human-readable report, one check per line.
    pub visual_report: String,
    pub json_data: InvoiceRecord,
}

impl AnalysisResult {
    /// Parse the report into display items, skipping blank lines.
    pub fn report_items(&self) -> Vec<ReportItem> {
        self.visual_report
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(ReportItem::parse)
            .collect()
    }
}

/// Check mark leading a report value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Warning,
    Fail,
}

impl Verdict {
    const MARKS: [(&'static str, Verdict); 4] = [
        ("✅", Verdict::Pass),
        ("⚠️", Verdict::Warning),
        // Some models drop the variation selector.
        ("⚠", Verdict::Warning),
        ("❌", Verdict::Fail),
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Verdict::Pass => "✅",
            Verdict::Warning => "⚠️",
            Verdict::Fail => "❌",
        }
    }
}

/// One line of the visual report, e.g. `🚢 Incoterm: ✅ FOB Shanghai`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportItem {
    /// Text before the first colon, without markdown asterisks. Empty when
    /// the line has no colon.
    pub label: String,
    pub verdict: Option<Verdict>,
    /// Value with the verdict mark removed.
    pub text: String,
}

impl ReportItem {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some((label, value)) = line.split_once(':') else {
            return Self {
                label: String::new(),
                verdict: None,
                text: line.to_string(),
            };
        };

        let label = label.replace('*', "").trim().to_string();
        let value = value.trim();

        for (mark, verdict) in Verdict::MARKS {
            if let Some(rest) = value.strip_prefix(mark) {
                return Self {
                    label,
                    verdict: Some(verdict),
                    text: rest.trim().to_string(),
                };
            }
        }

        Self {
            label,
            verdict: None,
            text: value.to_string(),
        }
    }
}

/// Metadata read from a PDF without calling the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub page_count: usize,
    pub pdf_version: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub is_encrypted: bool,
}
