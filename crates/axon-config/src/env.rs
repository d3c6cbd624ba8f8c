use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// An optional fallback is supported via `{{ env.VAR | default("value") }}`;
/// the fallback is used when the variable is unset. A placeholder without a
/// fallback whose variable is unset fails the whole expansion.
pub fn expand_env(raw: &str) -> Result<String, String> {
    fn placeholder() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r#"\{\{\s*env\.([A-Za-z0-9_]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
                .expect("must be valid regex")
        })
    }

    let mut missing: Option<String> = None;

    let expanded = placeholder().replace_all(raw, |caps: &Captures<'_>| {
        let var = &caps[1];
        match std::env::var(var) {
            Ok(value) => value,
            Err(_) => caps.get(2).map_or_else(
                || {
                    missing.get_or_insert_with(|| var.to_string());
                    String::new()
                },
                |default| default.as_str().to_string(),
            ),
        }
    });

    match missing {
        Some(var) => Err(format!("environment variable not found: `{var}`")),
        None => Ok(expanded.into_owned()),
    }
}
