use chrono::NaiveDateTime;
use teloxide::utils::markdown;

use crate::config::MessageFormat;
use crate::lead::ValidLead;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━";
const PLACEHOLDER: &str = "-";

/// Inline URL button attached under the notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionButton {
    pub text: String,
    pub url: String,
}

/// Text and keyboard for one lead, identical for every destination.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub text: String,
    pub format: MessageFormat,
    pub button: ActionButton,
}

fn or_placeholder(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => PLACEHOLDER,
    }
}

impl NotificationMessage {
    pub fn build(valid: &ValidLead, received_at: NaiveDateTime, format: MessageFormat) -> Self {
        let lead = &valid.lead;
        let render = |value: &str| -> String {
            match format {
                MessageFormat::Markdown => markdown::escape(value),
                MessageFormat::Plain => value.to_string(),
            }
        };

        let headline = match format {
            MessageFormat::Markdown => format!("*{}*", markdown::escape("🆕 Новая заявка на выкуп авто")),
            MessageFormat::Plain => "🆕 Новая заявка на выкуп авто".to_string(),
        };
        let time = received_at.format("%d.%m.%Y, %H:%M:%S").to_string();

        let lines = [
            headline,
            RULE.to_string(),
            format!("👤 Имя: {}", render(or_placeholder(lead.name.as_deref()))),
            format!("📞 Телефон: {}", render(valid.phone.as_str())),
            format!("🚗 Марка: {}", render(or_placeholder(lead.brand.as_deref()))),
            format!("🔧 Модель: {}", render(or_placeholder(lead.model.as_deref()))),
            format!("📅 Год: {}", render(or_placeholder(lead.year.as_deref()))),
            format!(
                "⚙️ Состояние: {}",
                render(or_placeholder(lead.condition.as_deref()))
            ),
            format!("🕒 Время: {}", render(&time)),
            RULE.to_string(),
        ];

        Self {
            text: lines.join("\n"),
            format,
            button: ActionButton {
                text: "💬 Написать в WhatsApp".to_string(),
                url: valid.phone.whatsapp_link(),
            },
        }
    }
}
