//! Model catalog listing.

use crate::core::models::{ModelDescriptor, ModelRegistry};

pub fn describe_model(model: &ModelDescriptor, selected: bool, default: bool) -> Vec<String> {
    let mut marker = String::new();
    if selected {
        marker.push_str(" ← selected");
    }
    if default {
        marker.push_str(" (default)");
    }
    let mut lines = vec![format!("  • {} [{}]{marker}", model.name, model.id)];
    lines.push(format!(
        "    {} · {} tokens",
        model.provider,
        format_tokens(model.max_tokens)
    ));
    if !model.description.is_empty() {
        lines.push(format!("    {}", model.description));
    }
    if !model.strengths.is_empty() {
        lines.push(format!("    Strengths: {}", model.strengths.join(", ")));
    }
    lines
}

pub fn model_lines(registry: &ModelRegistry, selected_id: &str) -> Vec<String> {
    let default_id = registry.default_model().id.as_str();
    let mut lines = vec![
        "🤖 Available Models".to_string(),
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━".to_string(),
    ];
    for model in registry.models() {
        lines.extend(describe_model(
            model,
            model.id == selected_id,
            model.id == default_id,
        ));
    }
    lines
}

fn format_tokens(tokens: u32) -> String {
    let digits = tokens.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
