//! Shared fixtures: lopdf-built invoices and fake model clients.

#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use proforma_audit::{AuditError, ModelClient, REPORT_SEPARATOR};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const RECIPIENT: &str = "Guangzhou Baiyun Export & Import Co. LTD.";

/// Build a PDF with one page per entry, each page holding the given lines.
pub fn invoice_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 11.into()]),
            Operation::new("Td", vec![56.into(), 780.into()]),
        ];
        for line in *lines {
            ops.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            ops.push(Operation::new("Td", vec![0.into(), (-14).into()]));
        }
        ops.push(Operation::new("ET", vec![]));
        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
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
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// A well-formed model reply around `record`.
pub fn reply(report: &str, record: &serde_json::Value, fenced: bool) -> String {
    let json = serde_json::to_string_pretty(record).unwrap();
    if fenced {
        format!("{report}\n{REPORT_SEPARATOR}\n```json\n{json}\n```")
    } else {
        format!("{report}\n{REPORT_SEPARATOR}\n{json}")
    }
}

/// A record with every check passing.
pub fn passing_record() -> serde_json::Value {
    serde_json::json!({
        "vendedor_coincide_cuenta_bancaria": true,
        "destinatario_valido": true,
        "incoterm": "FOB Ningbo",
        "incoterm_valido": true,
        "incoterm_direccion_recogida": null,
        "terminos_pago": "30% deposit, 70% before shipment",
        "terminos_pago_validos": true,
        "mercaderia": "1200 LED panel lights",
        "hs_code_sugerido": "9405.11",
        "hs_code_valido": true,
        "estado_final": "valida"
    })
}

pub enum Scripted {
    Text(String),
    ApiFailure(String),
}

/// Replays canned replies in order and records every prompt it receives.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Scripted>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Scripted>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(vec![Scripted::Text(text.into())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn generate(&self, prompt: &str) -> Result<String, AuditError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::ApiFailure(message)) => Err(AuditError::ApiError { message }),
            None => Err(AuditError::ApiError {
                message: "no scripted reply left".to_string(),
            }),
        }
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

/// A stand-in auditor that reads `KEY: value` lines of the invoice text and
/// answers the way a careful model would for the handful of fields the
/// fixtures use: SELLER, BENEFICIARY, CONSIGNEE, INCOTERM, PICKUP.
#[derive(Default)]
pub struct ClerkClient {
    calls: AtomicUsize,
}

impl ClerkClient {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for ClerkClient {
    async fn generate(&self, prompt: &str) -> Result<String, AuditError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = prompt
            .split("--- INVOICE TEXT TO ANALYZE ---")
            .nth(1)
            .unwrap_or_default();
        let field = |key: &str| {
            text.lines()
                .find_map(|l| l.trim().strip_prefix(key))
                .map(|v| v.trim_start_matches(':').trim().to_string())
        };

        let seller = field("SELLER");
        let holder = field("BENEFICIARY");
        let seller_match = seller.is_some() && seller == holder;
        let recipient_valid = field("CONSIGNEE").as_deref() == Some(RECIPIENT);
        let incoterm = field("INCOTERM").unwrap_or_default();
        let pickup = field("PICKUP");
        let incoterm_valid = match incoterm.split_whitespace().next() {
            Some("EXW") => pickup.is_some(),
            Some(_) => true,
            None => false,
        };
        let status = if !seller_match || !recipient_valid {
            "no_valida"
        } else if !incoterm_valid {
            "con_observaciones"
        } else {
            "valida"
        };

        let mark = |ok: bool| if ok { "✅" } else { "❌" };
        let report = format!(
            "🏢 **Vendedor vs. Cta. Bancaria**: {} {} / {}\n\
             📦 Destinatario: {} {}\n\
             🚢 Incoterm: {} {}",
            mark(seller_match),
            seller.as_deref().unwrap_or("-"),
            holder.as_deref().unwrap_or("-"),
            mark(recipient_valid),
            field("CONSIGNEE").unwrap_or_default(),
            if incoterm_valid { "✅" } else { "⚠️" },
            incoterm,
        );
        let record = serde_json::json!({
            "vendedor_coincide_cuenta_bancaria": seller_match,
            "destinatario_valido": recipient_valid,
            "incoterm": incoterm,
            "incoterm_valido": incoterm_valid,
            "incoterm_direccion_recogida": pickup,
            "terminos_pago": "TT",
            "terminos_pago_validos": true,
            "mercaderia": "LED panels",
            "hs_code_sugerido": "9405.11",
            "hs_code_valido": true,
            "estado_final": status
        });
        Ok(reply(&report, &record, true))
    }

    fn model_id(&self) -> &str {
        "clerk"
    }
}

/// Answers with `text` after `delay`, like a slow provider.
pub struct SlowClient {
    delay: std::time::Duration,
    text: String,
}

impl SlowClient {
    pub fn new(delay: std::time::Duration, text: impl Into<String>) -> Self {
        Self {
            delay,
            text: text.into(),
        }
    }
}

#[async_trait]
impl ModelClient for SlowClient {
    async fn generate(&self, _prompt: &str) -> Result<String, AuditError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.text.clone())
    }

    fn model_id(&self) -> &str {
        "slow"
    }
}
