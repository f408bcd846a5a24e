// src/template.rs

//! Literal `${NAME}` substitution for checked-in compose templates.
//!
//! This is whole-token text replacement, not a template language. A token
//! is `${` + `[A-Z0-9_]+` + `}`; anything else (including `${VAR:-default}`)
//! is copied through untouched so it reaches docker compose verbatim.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::errors::{FleetdagError, Result};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z0-9_]+)\}").expect("placeholder pattern is valid")
});

/// Render `template`, replacing every placeholder with its value.
///
/// - Each key may be supplied only once.
/// - Every placeholder in the template must have a value.
pub fn render(template: &str, values: &[(&str, String)]) -> Result<String> {
    let mut map: BTreeMap<&str, &str> = BTreeMap::new();
    for (key, value) in values {
        if map.insert(*key, value.as_str()).is_some() {
            return Err(FleetdagError::Template(format!(
                "placeholder '{key}' supplied more than once"
            )));
        }
    }

    let mut missing: Vec<String> = Vec::new();
    let out = PLACEHOLDER_RE.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        match map.get(name) {
            Some(value) => value.to_string(),
            None => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(FleetdagError::Template(format!(
            "no value supplied for placeholder(s): {}",
            missing.join(", ")
        )));
    }

    Ok(out.into_owned())
}

/// Placeholder names found in `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}
