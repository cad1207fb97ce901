use std::sync::LazyLock;

use crate::settings::GrammarKind;

use super::{FieldKey, FieldPattern, TaskGrammar};

static PATTERNS: LazyLock<Vec<FieldPattern>> = LazyLock::new(|| {
    FieldKey::ALL
        .iter()
        .map(|key| FieldPattern::new(*key, &format!(r"@{}\(\s*([^)]*?)\s*\)", key.name())))
        .collect()
});

/// `@key(value)` fields.
pub struct AnnotationGrammar;

impl TaskGrammar for AnnotationGrammar {
    fn kind(&self) -> GrammarKind {
        GrammarKind::Annotation
    }

    fn patterns(&self) -> &[FieldPattern] {
        &PATTERNS
    }

    fn format_field(&self, key: FieldKey, value: &str) -> String {
        format!("@{}({value})", key.name())
    }
}
