//! Channel topic rendering.
//!
//! Templates are Handlebars in strict mode: referencing a schedule that is not
//! part of the sync is an error rather than an empty string. Go-style field
//! references (`{{.Backend}}`) are accepted and rewritten to `{{Backend}}`,
//! and Go trim markers (`{{- ` and ` -}}`) become Handlebars `~`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use handlebars::{no_escape, Handlebars, Template};
use regex::Regex;

use crate::error::{ConfigError, SyncError, SyncResult};

static GO_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(~?)\s*\.([A-Za-z0-9_])").expect("static regex is valid")
});

// Go only treats the dash as a trim marker when whitespace separates it from
// the action; `{{-3}}` is a number.
static GO_TRIM_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{-(\s)").expect("static regex is valid"));
static GO_TRIM_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\s)-\}\}").expect("static regex is valid"));

/// Placeholder key for a schedule: its name with every character that is not
/// an ASCII letter or digit removed.
#[must_use]
pub fn placeholder_key(schedule_name: &str) -> String {
    schedule_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Value substituted for a schedule's placeholder.
///
/// In pretend mode the ID is prefixed with a backslash so Slack renders it
/// as text instead of a mention.
#[must_use]
pub fn account_reference(account_id: &str, pretend_users: bool) -> String {
    if pretend_users {
        format!("\\{account_id}")
    } else {
        account_id.to_string()
    }
}

/// A syntax-checked topic template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTemplate {
    /// Text as configured.
    raw: String,
    /// Text after Go-style normalization; this is what gets rendered.
    source: String,
}

impl StatusTemplate {
    /// Normalize and syntax-check a template.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let source = GO_TRIM_OPEN_RE.replace_all(raw, "{{~$1");
        let source = GO_TRIM_CLOSE_RE.replace_all(&source, "$1~}}");
        let source = GO_FIELD_RE.replace_all(&source, "{{$1$2").into_owned();
        Template::compile(&source).map_err(|e| ConfigError::Template {
            template: raw.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            source,
        })
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Pure renderer: same template and values always give the same output.
pub struct StatusRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for StatusRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusRenderer {
    #[must_use]
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        // Topics are plain text; IDs and backslashes must come through verbatim.
        handlebars.register_escape_fn(no_escape);
        Self { handlebars }
    }

    /// Render `template` with `values` keyed by [`placeholder_key`].
    pub fn render(
        &self,
        template: &StatusTemplate,
        values: &BTreeMap<String, String>,
    ) -> SyncResult<String> {
        self.handlebars
            .render_template(template.source(), values)
            .map_err(|e| SyncError::Render(e.to_string()))
    }
}
