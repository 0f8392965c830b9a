//! Minimal `{{ .Path.to.value }}` interpolation over a JSON context.
//!
//! Only field lookups are supported.  Anything else inside `{{ }}` is an
//! error, and callers that must not fail fall back to the raw string.

use serde_json::Value;
use thiserror::Error;

use crate::logging::Log;
use crate::platform::SystemInfo;

/// Why a template could not be rendered.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{{` has no matching `}}`.
    #[error("unclosed action at byte {0}")]
    Unclosed(usize),
    /// The action is not a `.field` lookup.
    #[error("unsupported template action '{0}'")]
    Unsupported(String),
    /// The looked-up path does not exist or is not a scalar.
    #[error("no value for '{0}'")]
    Missing(String),
}

/// Render `template`, replacing each `{{ .a.b }}` with the scalar at
/// `context["a"]["b"]`.
///
/// # Errors
///
/// Returns a [`TemplateError`] for unclosed or unsupported actions and for
/// paths that do not resolve to a scalar.
pub fn render(template: &str, context: &Value) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(rest.get(..start).unwrap_or_default());
        let after = rest.get(start + 2..).unwrap_or_default();
        let end = after
            .find("}}")
            .ok_or(TemplateError::Unclosed(offset + start))?;
        let action = after.get(..end).unwrap_or_default();
        out.push_str(&lookup(action, context)?);
        let consumed = start + 2 + end + 2;
        rest = rest.get(consumed..).unwrap_or_default();
        offset += consumed;
    }
    out.push_str(rest);
    Ok(out)
}

fn lookup(action: &str, context: &Value) -> Result<String, TemplateError> {
    let expr = action.trim().trim_start_matches('-').trim_end_matches('-').trim();
    let path = expr
        .strip_prefix('.')
        .filter(|p| !p.is_empty() && !p.contains(char::is_whitespace))
        .ok_or_else(|| TemplateError::Unsupported(expr.to_string()))?;

    let value = path
        .split('.')
        .try_fold(context, |v, key| v.get(key))
        .ok_or_else(|| TemplateError::Missing(expr.to_string()))?;
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(TemplateError::Missing(expr.to_string())),
    }
}

/// Render `s` with the host facts under `.Values`.
///
/// A template that cannot be rendered is returned unchanged and a warning
/// is logged.
pub fn render_system(log: &dyn Log, s: &str, system: &SystemInfo) -> String {
    if !s.contains("{{") {
        return s.to_string();
    }
    let context = serde_json::json!({ "Values": system.values() });
    match render(s, &context) {
        Ok(rendered) => rendered,
        Err(e) => {
            log.warn(&format!("failed rendering '{s}': {e}"));
            s.to_string()
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_nested_lookups() {
        let ctx = json!({"Values": {"node": {"hostname": "edge-1"}, "n": 3}});
        assert_eq!(
            render("host={{ .Values.node.hostname }} n={{.Values.n}}", &ctx).unwrap(),
            "host=edge-1 n=3"
        );
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(render("no actions here", &json!({})).unwrap(), "no actions here");
    }

    #[test]
    fn trim_markers_are_accepted() {
        let ctx = json!({"UUID": "abc"});
        assert_eq!(render("x-{{- .UUID -}}", &ctx).unwrap(), "x-abc");
    }

    #[test]
    fn missing_path_is_an_error() {
        let err = render("{{ .Values.nope }}", &json!({"Values": {}})).unwrap_err();
        assert_eq!(err, TemplateError::Missing(".Values.nope".to_string()));
    }

    #[test]
    fn unclosed_and_unsupported_actions_fail() {
        assert_eq!(
            render("a {{ .x", &json!({})).unwrap_err(),
            TemplateError::Unclosed(2)
        );
        assert!(matches!(
            render("{{ upper .x }}", &json!({})).unwrap_err(),
            TemplateError::Unsupported(_)
        ));
    }

    #[test]
    fn render_system_falls_back_to_input() {
        let (log, _tmp, _guard) = crate::logging::isolated_logger();
        let system = SystemInfo::with_hostname("box");
        assert_eq!(
            render_system(&log, "{{ .Values.node.hostname }}.lan", &system),
            "box.lan"
        );
        assert_eq!(
            render_system(&log, "{{ .Values.missing }}", &system),
            "{{ .Values.missing }}"
        );
    }
}
