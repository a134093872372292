use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::error::LeadError;

/// Russian mobile number: +7, 7 or 8 followed by ten digits.
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+7|7|8)[0-9]{10}$").expect("phone pattern is valid"));

/// Form submission from the landing page. Every field is free text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Lead {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    /// Vehicle condition ("type" on the wire).
    #[serde(default, rename = "type")]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPhone(String);

impl NormalizedPhone {
    /// Keep only ASCII digits and `+`, then check the result against the pattern.
    pub fn parse(raw: &str) -> Result<Self, LeadError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();

        if PHONE_PATTERN.is_match(&cleaned) {
            Ok(Self(cleaned))
        } else {
            Err(LeadError::InvalidPhone)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits for wa.me links: no `+`, and a leading 8 becomes 7.
    pub fn whatsapp_digits(&self) -> String {
        let digits = self.0.trim_start_matches('+');
        match digits.strip_prefix('8') {
            Some(rest) => format!("7{}", rest),
            None => digits.to_string(),
        }
    }

    pub fn whatsapp_link(&self) -> String {
        format!("https://wa.me/{}", self.whatsapp_digits())
    }
}

impl std::fmt::Display for NormalizedPhone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A lead whose phone passed validation.
#[derive(Debug, Clone)]
pub struct ValidLead {
    pub lead: Lead,
    pub phone: NormalizedPhone,
}

pub fn validate(lead: Lead) -> Result<ValidLead, LeadError> {
    let raw_phone = match lead.phone.as_deref() {
        Some(p) if !p.is_empty() => p,
        _ => return Err(LeadError::MissingPhone),
    };

    let phone = NormalizedPhone::parse(raw_phone)?;
    Ok(ValidLead { lead, phone })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead_with_phone(phone: &str) -> Lead {
        Lead {
            phone: Some(phone.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_phone() {
        assert_eq!(validate(Lead::default()).unwrap_err(), LeadError::MissingPhone);
        assert_eq!(
            validate(lead_with_phone("")).unwrap_err(),
            LeadError::MissingPhone
        );
    }

    #[test]
    fn test_formatted_eight_prefix() {
        let valid = validate(lead_with_phone("8 (999) 566-12-67")).unwrap();
        assert_eq!(valid.phone.as_str(), "89995661267");
        assert_eq!(valid.phone.whatsapp_digits(), "79995661267");
        assert_eq!(valid.phone.whatsapp_link(), "https://wa.me/79995661267");
    }

    #[test]
    fn test_plus_seven_prefix() {
        let valid = validate(lead_with_phone("+79991234567")).unwrap();
        assert_eq!(valid.phone.as_str(), "+79991234567");
        assert_eq!(valid.phone.whatsapp_link(), "https://wa.me/79991234567");
    }

    #[test]
    fn test_bare_seven_prefix() {
        let phone = NormalizedPhone::parse("7 999 123 45 67").unwrap();
        assert_eq!(phone.as_str(), "79991234567");
        assert_eq!(phone.whatsapp_digits(), "79991234567");
    }

    #[test]
    fn test_invalid_phones() {
        for raw in [
            "   ",
            "12345",
            "+89991234567",
            "99991234567",
            "8999123456",
            "899912345678",
            "+7999123456",
            "7+9991234567",
            "++79991234567",
            "+1 999 123 45 67",
        ] {
            assert_eq!(
                NormalizedPhone::parse(raw).unwrap_err(),
                LeadError::InvalidPhone,
                "expected {:?} to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_non_ascii_digits_are_stripped() {
        // Arabic-Indic digits are not phone digits.
        assert!(NormalizedPhone::parse("٨٩٩٩١٢٣٤٥٦٧").is_err());
    }

    #[test]
    fn test_lead_deserializes_type_field() {
        let lead: Lead = serde_json::from_str(
            r#"{"name":"Иван","phone":"89995661267","brand":"Lada","model":"Vesta","year":"2019","type":"битая"}"#,
        )
        .unwrap();
        assert_eq!(lead.condition.as_deref(), Some("битая"));
        assert_eq!(lead.brand.as_deref(), Some("Lada"));
    }

    #[test]
    fn test_lead_missing_fields_are_none() {
        let lead: Lead = serde_json::from_str(r#"{"phone":"89995661267"}"#).unwrap();
        assert!(lead.name.is_none());
        assert!(lead.condition.is_none());
    }

    #[test]
    fn test_validate_keeps_free_text_fields() {
        let lead = Lead {
            name: Some("Пётр_*[]".into()),
            phone: Some("+7 (912) 000-00-00".into()),
            ..Default::default()
        };
        let valid = validate(lead).unwrap();
        assert_eq!(valid.lead.name.as_deref(), Some("Пётр_*[]"));
        assert_eq!(valid.phone.as_str(), "+79120000000");
    }
}
