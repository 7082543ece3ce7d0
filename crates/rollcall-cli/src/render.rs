use rollcall_core::presenter::NO_MATCHES_TEXT;
use rollcall_core::DisplayModel;
use std::fmt::Write;

/// Plain-text rendering of a results view.
pub fn render_text(model: &DisplayModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", model.heading);
    let _ = writeln!(out, "{}", "=".repeat(model.heading.len()));

    match &model.body_text {
        Some(body) => {
            let _ = writeln!(out, "{body}");
        }
        None if model.items.is_empty() => {
            let _ = writeln!(out, "{NO_MATCHES_TEXT}");
        }
        None => {}
    }
    for item in &model.items {
        let _ = writeln!(out, "  - {item}");
    }

    let _ = writeln!(out);
    let _ = write!(out, "[{}] -> {}", model.action_label, model.action_target);
    out
}

pub fn render_json(model: &DisplayModel) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(model)
}
