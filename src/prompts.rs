//! The audit prompt: template, reference recipient and rendering.
//!
//! All invoice rules live in a natural-language template that is handed to
//! the model; nothing here evaluates them. The default template ships as a
//! versioned file under `prompts/` and is embedded at compile time, so a
//! deployment can override it with a file (see
//! [`crate::config::AuditConfig::prompt_template`]) without a rebuild.
//!
//! ## Placeholders
//!
//! | Placeholder | Replaced with |
//! |-------------|---------------|
//! | `{{recipient_name}}` | [`ReferenceRecipient::name`] |
//! | `{{recipient_address}}` | [`ReferenceRecipient::address`] |
//! | `{{recipient_tax_id}}` | [`ReferenceRecipient::tax_id`] |
//! | `{{separator}}` | [`crate::pipeline::parse::REPORT_SEPARATOR`] |
//! | `{{invoice_text}}` | the extracted invoice text (required) |

use crate::error::AuditError;
use crate::pipeline::parse::REPORT_SEPARATOR;
use serde::{Deserialize, Serialize};

/// Identifier of the embedded template, logged with every analysis.
pub const DEFAULT_TEMPLATE_NAME: &str = "invoice_audit.v1";

/// Default audit template.
pub const DEFAULT_AUDIT_TEMPLATE: &str = include_str!("../prompts/invoice_audit.v1.md");

const INVOICE_TEXT: &str = "{{invoice_text}}";

/// The one recipient every invoice is expected to be addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecipient {
    pub name: String,
    pub address: String,
    pub tax_id: String,
}

impl Default for ReferenceRecipient {
    fn default() -> Self {
        Self {
            name: "Guangzhou Baiyun Export & Import Co. LTD.".to_string(),
            address: "Thomson Commercial Building, 8 Thomson Road, Hong Kong, CHINA.".to_string(),
            tax_id: "76303593".to_string(),
        }
    }
}

/// Renders the audit prompt for one invoice.
///
/// Everything except the invoice text is substituted once, up front, so
/// [`PromptBuilder::build`] is a single deterministic replacement.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    prepared: String,
    template_name: String,
}

impl PromptBuilder {
    /// Prepare a template. Fails if `{{invoice_text}}` is missing.
    pub fn new(
        template: &str,
        template_name: impl Into<String>,
        recipient: &ReferenceRecipient,
    ) -> Result<Self, AuditError> {
        if !template.contains(INVOICE_TEXT) {
            return Err(AuditError::InvalidConfig(format!(
                "prompt template must contain the {INVOICE_TEXT} placeholder"
            )));
        }

        Ok(Self {
            prepared: prepare(template, recipient),
            template_name: template_name.into(),
        })
    }

    /// Builder for the embedded template and default recipient.
    pub fn default_template() -> Self {
        Self {
            prepared: prepare(DEFAULT_AUDIT_TEMPLATE, &ReferenceRecipient::default()),
            template_name: DEFAULT_TEMPLATE_NAME.to_string(),
        }
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// Interpolate the invoice text.
    ///
    /// The text goes in last, so placeholder-looking strings inside an
    /// invoice are left as they are.
    pub fn build(&self, invoice_text: &str) -> String {
        self.prepared.replacen(INVOICE_TEXT, invoice_text.trim_end(), 1)
    }
}

fn prepare(template: &str, recipient: &ReferenceRecipient) -> String {
    template
        .replace("{{recipient_name}}", &recipient.name)
        .replace("{{recipient_address}}", &recipient.address)
        .replace("{{recipient_tax_id}}", &recipient.tax_id)
        .replace("{{separator}}", REPORT_SEPARATOR)
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::default_template()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_has_every_placeholder() {
        for placeholder in [
            "{{recipient_name}}",
            "{{recipient_address}}",
            "{{recipient_tax_id}}",
            "{{separator}}",
            "{{invoice_text}}",
        ] {
            assert!(
                DEFAULT_AUDIT_TEMPLATE.contains(placeholder),
                "missing {placeholder}"
            );
        }
    }

    #[test]
    fn test_build_interpolates_text_at_the_end() {
        let prompt = PromptBuilder::default().build("SELLER: Acme Ltd\nBENEFICIARY: Acme Ltd\n");
        assert!(prompt.trim_end().ends_with("BENEFICIARY: Acme Ltd"));
        assert!(prompt.contains("--- INVOICE TEXT TO ANALYZE ---\nSELLER: Acme Ltd"));
        assert!(!prompt.contains("{{"), "unrendered placeholder left in prompt");
    }

    #[test]
    fn test_build_mentions_separator_and_recipient() {
        let prompt = PromptBuilder::default().build("x");
        assert!(prompt.contains(REPORT_SEPARATOR));
        assert!(prompt.contains("Guangzhou Baiyun Export & Import Co. LTD."));
        assert!(prompt.contains("76303593"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = PromptBuilder::default();
        assert_eq!(builder.build("Invoice 42"), builder.build("Invoice 42"));
    }

    #[test]
    fn test_invoice_text_is_not_expanded() {
        let prompt = PromptBuilder::default().build("note: {{recipient_name}} {{invoice_text}}");
        assert!(prompt.contains("note: {{recipient_name}} {{invoice_text}}"));
    }

    #[test]
    fn test_custom_template_and_recipient() {
        let recipient = ReferenceRecipient {
            name: "Acme Imports SpA".into(),
            address: "Av. Apoquindo 3000, Santiago".into(),
            tax_id: "76.123.456-7".into(),
        };
        let builder = PromptBuilder::new(
            "To {{recipient_name}} ({{recipient_tax_id}})\n{{separator}}\n{{invoice_text}}",
            "custom",
            &recipient,
        )
        .unwrap();
        assert_eq!(builder.template_name(), "custom");
        assert_eq!(
            builder.build("PI-7"),
            format!("To Acme Imports SpA (76.123.456-7)\n{REPORT_SEPARATOR}\nPI-7")
        );
    }

    #[test]
    fn test_template_without_text_placeholder_is_rejected() {
        let err = PromptBuilder::new("no slot here", "broken", &ReferenceRecipient::default())
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidConfig(_)));
    }
}
