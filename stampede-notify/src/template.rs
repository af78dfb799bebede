//! Handlebars rendering for alert messages

use handlebars::Handlebars;
use serde::Serialize;

use crate::errors::NotifyError;

/// Template engine for trigger messages.
///
/// Strict mode is on, so a template naming an unknown variable fails instead
/// of rendering an empty string. Output is plain text and never HTML-escaped.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String, NotifyError> {
        self.handlebars
            .render_template(template, data)
            .map_err(|e| NotifyError::TemplateRender {
                template: template.to_string(),
                error: e.to_string(),
            })
    }

    /// Check template syntax without rendering
    pub fn validate(&self, template: &str) -> Result<(), NotifyError> {
        handlebars::Template::compile(template)
            .map(|_| ())
            .map_err(|e| NotifyError::TemplateRender {
                template: template.to_string(),
                error: e.to_string(),
            })
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_trigger_message() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render(
                stampede_config::domains::alerting::default_message_template().as_str(),
                &json!({
                    "alert_name": "Slow p95",
                    "test_id": "api-smoke",
                    "metric": "p95",
                    "value": "412.00",
                    "operator": ">",
                    "threshold": 300.0,
                }),
            )
            .unwrap();
        assert_eq!(
            rendered,
            "Alert 'Slow p95' triggered for test api-smoke: p95 is 412.00 (> 300.0)"
        );
    }

    #[test]
    fn test_missing_variable_fails() {
        let engine = TemplateEngine::new();
        assert!(engine.render("{{nope}}", &json!({})).is_err());
    }

    #[test]
    fn test_validate_syntax() {
        let engine = TemplateEngine::new();
        assert!(engine.validate("{{metric}} is {{value}}").is_ok());
        assert!(engine.validate("{{#if}").is_err());
    }
}
