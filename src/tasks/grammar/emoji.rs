use std::sync::LazyLock;

use crate::settings::GrammarKind;

use super::{FieldKey, FieldPattern, TaskGrammar, PRIORITY_EMOJI};

const DATE: &str = r"\d{4}-\d{2}-\d{2}|\d{2}-\d{2}-\d{4}";

fn date_after(emoji: &str) -> String {
    format!(r"(?:{emoji})\x{{FE0F}}?\s*({DATE})")
}

fn date_time_after(emoji: &str) -> String {
    format!(r"(?:{emoji})\x{{FE0F}}?\s*(?:\[([^\]]*)\]|((?:{DATE})(?:[/T]\d{{1,2}}:\d{{2}})?))")
}

/// Both emoji grammars read either bracketed or bare time/completion values.
static EMOJI_PATTERNS: LazyLock<Vec<FieldPattern>> = LazyLock::new(|| {
    vec![
        FieldPattern::new(
            FieldKey::Time,
            r"⏰\x{FE0F}?\s*(?:\[([^\]]*)\]|(\d{1,2}:\d{2}(?:\s*-\s*\d{1,2}:\d{2})?))",
        ),
        FieldPattern::new(FieldKey::Priority, r"(🔺|⏫|🔼|🔽|⏬)\x{FE0F}?"),
        FieldPattern::new(FieldKey::Start, &date_after("🛫")),
        FieldPattern::new(FieldKey::Created, &date_after("➕")),
        FieldPattern::new(FieldKey::Scheduled, &date_after("⏳|⌛")),
        FieldPattern::new(FieldKey::Due, &date_after("📅|📆|🗓")),
        FieldPattern::new(FieldKey::Completion, &date_time_after("✅")),
        FieldPattern::new(FieldKey::Cancelled, &date_time_after("❌")),
        FieldPattern::new(FieldKey::DependsOn, r"⛔\x{FE0F}?\s*(\d+(?:\s*,\s*\d+)*)"),
        FieldPattern::new(FieldKey::Reminder, r"\(@([^)]*)\)"),
        FieldPattern::new(FieldKey::Id, r"🆔\x{FE0F}?\s*(\d+)"),
    ]
});

fn format_common(key: FieldKey, value: &str) -> String {
    match key {
        FieldKey::Priority => value
            .parse::<u8>()
            .ok()
            .and_then(|p| PRIORITY_EMOJI.iter().find(|(n, _)| *n == p))
            .map(|(_, emoji)| emoji.to_string())
            .unwrap_or_default(),
        FieldKey::Start => format!("🛫 {value}"),
        FieldKey::Created => format!("➕ {value}"),
        FieldKey::Scheduled => format!("⏳ {value}"),
        FieldKey::Due => format!("📅 {value}"),
        FieldKey::DependsOn => format!("⛔ {value}"),
        FieldKey::Reminder => format!("(@{value})"),
        FieldKey::Id => format!("🆔 {value}"),
        FieldKey::Time => format!("⏰ {value}"),
        FieldKey::Completion => format!("✅ {value}"),
        FieldKey::Cancelled => format!("❌ {value}"),
    }
}

/// `Title | ⏰[09:00 - 10:00] 📅 2024-09-21 #tag ✅[2024-09-21/12:20]`
pub struct DefaultGrammar;

impl TaskGrammar for DefaultGrammar {
    fn kind(&self) -> GrammarKind {
        GrammarKind::Default
    }

    fn patterns(&self) -> &[FieldPattern] {
        &EMOJI_PATTERNS
    }

    fn format_field(&self, key: FieldKey, value: &str) -> String {
        match key {
            FieldKey::Time => format!("⏰[{value}]"),
            FieldKey::Completion => format!("✅[{value}]"),
            FieldKey::Cancelled => format!("❌[{value}]"),
            other => format_common(other, value),
        }
    }

    fn separator(&self) -> &'static str {
        " | "
    }
}

/// `Title ⏰ 09:00 - 10:00 📅 2024-09-21 #tag ✅ 2024-09-21`
pub struct BracketFieldGrammar;

impl TaskGrammar for BracketFieldGrammar {
    fn kind(&self) -> GrammarKind {
        GrammarKind::BracketField
    }

    fn patterns(&self) -> &[FieldPattern] {
        &EMOJI_PATTERNS
    }

    fn format_field(&self, key: FieldKey, value: &str) -> String {
        format_common(key, value)
    }
}
