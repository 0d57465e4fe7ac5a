//! Ad-request URL macro substitution.
//!
//! Replaces `{player.id}`, `{mediainfo.*}`, `{timestamp}`, `{random}` and
//! friends with run-time values, then resolves `{pageVariable.a.b}` against
//! the host page's variables.

use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;

static PAGE_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{pageVariable\.([^}]+)\}").expect("Invalid page variable regex"));

const MEDIAINFO_FIELDS: [&str; 7] = [
    "id",
    "name",
    "description",
    "tags",
    "reference_id",
    "duration",
    "ad_keys",
];

/// Run-time values macros expand to.
#[derive(Debug, Clone, Default)]
pub struct MacroContext {
    pub player_id: String,
    /// Catalog metadata for the loaded media, if any.
    pub media_info: Option<Value>,
    /// Seconds; `f64::INFINITY` for live streams.
    pub duration: f64,
    pub referrer: String,
    pub location_href: String,
    /// The page's global variables, as a JSON object tree.
    pub page_variables: Value,
}

/// Expand every macro in `template`.
///
/// Caller-supplied `custom` macros are applied first and must include their
/// braces (`{five}`). With `uri_encode`, every substituted value is
/// percent-encoded.
pub fn ad_macro_replacement(
    template: &str,
    uri_encode: bool,
    custom: Option<&BTreeMap<String, String>>,
    ctx: &MacroContext,
) -> String {
    let mut macros: Vec<(String, String)> = custom
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    macros.push(("{player.id}".into(), ctx.player_id.clone()));
    for field in MEDIAINFO_FIELDS {
        let value = ctx
            .media_info
            .as_ref()
            .and_then(|info| info.get(field))
            .map(render_value)
            .unwrap_or_default();
        macros.push((format!("{{mediainfo.{field}}}"), value));
    }
    macros.push(("{player.duration}".into(), format_number(ctx.duration)));
    macros.push((
        "{timestamp}".into(),
        chrono::Utc::now().timestamp_millis().to_string(),
    ));
    macros.push(("{document.referrer}".into(), ctx.referrer.clone()));
    macros.push(("{window.location.href}".into(), ctx.location_href.clone()));
    macros.push((
        "{random}".into(),
        fastrand::u64(..1_000_000_000_000).to_string(),
    ));

    if let Some(info) = &ctx.media_info {
        custom_fields(info, "custom_fields", &mut macros);
        custom_fields(info, "customFields", &mut macros);
    }

    let mut out = template.to_string();
    for (name, value) in &macros {
        if out.contains(name.as_str()) {
            out = out.replace(name.as_str(), &encode_if(value, uri_encode));
        }
    }

    PAGE_VARIABLE
        .replace_all(&out, |caps: &Captures| {
            page_variable(&ctx.page_variables, &caps[1])
                .map(|v| encode_if(&v, uri_encode))
                .unwrap_or_default()
        })
        .into_owned()
}

fn custom_fields(info: &Value, property: &str, macros: &mut Vec<(String, String)>) {
    let Some(fields) = info.get(property).and_then(Value::as_object) else {
        return;
    };
    for (name, value) in fields {
        macros.push((
            format!("{{mediainfo.{property}.{name}}}"),
            render_value(value),
        ));
    }
}

/// Resolve a dotted page-variable path. `None` means "substitute nothing".
fn page_variable(root: &Value, path: &str) -> Option<String> {
    let mut current = root;
    for part in path.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => {
                warn!("Page variable \"{}\" not found", path);
                return None;
            }
        }
    }
    match current {
        Value::Null => Some("null".to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(current.to_string()),
        _ => {
            warn!("Page variable \"{}\" is not a supported type", path);
            None
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn encode_if(value: &str, uri_encode: bool) -> String {
    if uri_encode {
        urlencoding::encode(value).into_owned()
    } else {
        value.to_string()
    }
}
