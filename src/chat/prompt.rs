//! System prompt templates with `{{field}}` placeholders

use std::collections::HashMap;

/// Sales assistant prompt used when no template is supplied
pub const DEFAULT_SALES_TEMPLATE: &str = "You are a helpful sales assistant. \
You are speaking with {{prospect_name}} from {{company}} about {{product}}. \
Answer questions accurately, stay concise, and guide the conversation toward next steps.";

/// A system prompt rendered from named fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_SALES_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of first appearance
    pub fn fields(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (name, _) in placeholders(&self.template) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Substitute every placeholder; unknown fields render empty
    pub fn render(&self, fields: &HashMap<String, String>) -> String {
        let mut rendered = String::with_capacity(self.template.len());
        let mut cursor = 0;

        for (name, range) in placeholders(&self.template) {
            rendered.push_str(&self.template[cursor..range.start]);
            if let Some(value) = fields.get(name) {
                rendered.push_str(value);
            }
            cursor = range.end;
        }

        rendered.push_str(&self.template[cursor..]);
        rendered
    }
}

/// `(trimmed name, byte range of the whole placeholder)` pairs
fn placeholders(template: &str) -> Vec<(&str, std::ops::Range<usize>)> {
    let mut found = Vec::new();
    let mut offset = 0;

    while let Some(open) = template[offset..].find("{{") {
        let start = offset + open;
        let Some(close) = template[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + close + 2;
        found.push((template[start + 2..end - 2].trim(), start..end));
        offset = end;
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_fields() {
        let template = PromptTemplate::new("Hi {{ name }}, welcome to {{company}}.");
        let rendered = template.render(&fields(&[("name", "Ada"), ("company", "Acme")]));

        assert_eq!(rendered, "Hi Ada, welcome to Acme.");
    }

    #[test]
    fn test_unknown_fields_render_empty() {
        let template = PromptTemplate::new("[{{missing}}]");
        assert_eq!(template.render(&HashMap::new()), "[]");
    }

    #[test]
    fn test_unterminated_placeholder_is_literal() {
        let template = PromptTemplate::new("keep {{this");
        assert_eq!(template.render(&HashMap::new()), "keep {{this");
    }

    #[test]
    fn test_default_template_fields() {
        let template = PromptTemplate::default();
        assert_eq!(template.fields(), vec!["prospect_name", "company", "product"]);

        let rendered = template.render(&fields(&[
            ("prospect_name", "Grace"),
            ("company", "Initech"),
            ("product", "the analytics suite"),
        ]));
        assert!(rendered.contains("Grace from Initech about the analytics suite"));
    }
}
