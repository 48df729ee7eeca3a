// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handlebars registry for every e-mail template.

use handlebars::Handlebars;
use laika_core::{EmailMessage, LaikaError};
use serde_json::Value;

const PARTIALS: &[(&str, &str)] = &[
    ("header", include_str!("../../templates/header.hbs")),
    ("footer", include_str!("../../templates/footer.hbs")),
];

const TEMPLATES: &[(&str, &str)] = &[
    ("comment_alert", include_str!("../../templates/comment_alert.hbs")),
    (
        "evidence_comment_alert",
        include_str!("../../templates/evidence_comment_alert.hbs"),
    ),
    ("audit_alert", include_str!("../../templates/audit_alert.hbs")),
    ("control_alert", include_str!("../../templates/control_alert.hbs")),
    ("policy_alert", include_str!("../../templates/policy_alert.hbs")),
    ("generic_alert", include_str!("../../templates/generic_alert.hbs")),
    ("daily_digest", include_str!("../../templates/daily_digest.hbs")),
    ("audit_digest", include_str!("../../templates/audit_digest.hbs")),
];

/// Escapes markup characters only, leaving `=` and `/` in URLs readable.
fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn template_error(e: impl std::fmt::Display) -> LaikaError {
    LaikaError::delivery("email", format!("template: {e}"))
}

/// Compiled templates, shared by every send.
pub struct EmailTemplates {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for EmailTemplates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailTemplates")
            .field("templates", &TEMPLATES.len())
            .finish()
    }
}

impl EmailTemplates {
    pub fn new() -> Result<Self, LaikaError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_escape_fn(escape_markup);
        for (name, source) in PARTIALS {
            registry
                .register_partial(name, *source)
                .map_err(template_error)?;
        }
        for (name, source) in TEMPLATES {
            registry
                .register_template_string(name, *source)
                .map_err(template_error)?;
        }
        Ok(Self { registry })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// HTML body for `message`. The subject is exposed to the template too.
    pub fn render_html(&self, message: &EmailMessage) -> Result<String, LaikaError> {
        let mut context = message.context.clone();
        if let Value::Object(map) = &mut context {
            map.insert("subject".into(), Value::String(message.subject.clone()));
        }
        self.registry
            .render(&message.template, &context)
            .map_err(template_error)
    }

    /// Plain-text alternative: the message line plus the link.
    pub fn render_text(message: &EmailMessage) -> String {
        let field = |key: &str| message.context.get(key).and_then(Value::as_str).unwrap_or("");
        let mut text = message.subject.clone();
        for line in [field("message"), field("url")] {
            if !line.is_empty() {
                text.push_str("\n\n");
                text.push_str(line);
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(template: &str, context: Value) -> EmailMessage {
        EmailMessage {
            to: "a@x.com".into(),
            from: "no-reply@heylaika.com".into(),
            subject: "B mentioned you in a comment in Ctl-1.".into(),
            template: template.into(),
            context,
        }
    }

    #[test]
    fn every_template_registers() {
        let templates = EmailTemplates::new().unwrap();
        for (name, _) in TEMPLATES {
            assert!(templates.has_template(name), "{name}");
        }
    }

    #[test]
    fn comment_alert_renders_content_and_link() {
        let templates = EmailTemplates::new().unwrap();
        let html = templates
            .render_html(&message(
                "control_alert",
                json!({
                    "receiver_name": "A Name",
                    "entity_name": "Ctl-1",
                    "message": "Hi @A Name",
                    "url": "http://localhost:3000/controls/ctl?activeTab=Comments",
                    "call_to_action_url": "http://localhost:3000/dashboard/?alertsOpen=true",
                }),
            ))
            .unwrap();
        assert!(html.contains("Hi A Name,"));
        assert!(html.contains("Ctl-1"));
        assert!(html.contains("<title>B mentioned you in a comment in Ctl-1.</title>"));
        assert!(html.contains("dashboard/?alertsOpen=true"));
        assert!(html.contains("controls/ctl?activeTab=Comments"));
    }

    #[test]
    fn content_is_html_escaped() {
        let templates = EmailTemplates::new().unwrap();
        let html = templates
            .render_html(&message("comment_alert", json!({"content": "<script>x</script>"})))
            .unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn unknown_template_is_a_delivery_error() {
        let templates = EmailTemplates::new().unwrap();
        let err = templates.render_html(&message("nope", json!({}))).unwrap_err();
        assert_eq!(err.code(), "delivery");
    }

    #[test]
    fn plain_text_fallback() {
        let text = EmailTemplates::render_text(&message(
            "generic_alert",
            json!({"message": "Open Laika", "url": "http://h/x"}),
        ));
        assert_eq!(text, "B mentioned you in a comment in Ctl-1.\n\nOpen Laika\n\nhttp://h/x");
    }
}
