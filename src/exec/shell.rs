// src/exec/shell.rs

//! Small helpers for synthesizing POSIX shell snippets.

use std::collections::BTreeMap;

use crate::errors::{FleetdagError, Result};

/// Delimiter of heredoc file writes. A file whose contents contain this line
/// cannot be written with a heredoc and is rejected.
pub const HEREDOC_DELIMITER: &str = "FLEETDAG_EOF";

/// Single-quote `value` for a POSIX shell.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// `export KEY='value'` lines for every entry, in key order.
pub fn export_preamble(env: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in env {
        out.push_str("export ");
        out.push_str(key);
        out.push('=');
        out.push_str(&quote(value));
        out.push('\n');
    }
    out
}

/// Snippet that writes `contents` to `path`, creating the parent directory.
pub fn heredoc_write(path: &str, contents: &str) -> Result<String> {
    if contents.lines().any(|line| line == HEREDOC_DELIMITER) {
        return Err(FleetdagError::Template(format!(
            "contents for {path} contain the heredoc delimiter {HEREDOC_DELIMITER}"
        )));
    }

    let quoted = quote(path);
    let mut script = format!(
        "mkdir -p \"$(dirname {quoted})\"\ncat > {quoted} <<'{HEREDOC_DELIMITER}'\n{contents}"
    );
    if !contents.ends_with('\n') {
        script.push('\n');
    }
    script.push_str(HEREDOC_DELIMITER);
    script.push('\n');
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_single_quotes() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn preamble_is_sorted_by_key() {
        let mut env = BTreeMap::new();
        env.insert("ZED".to_string(), "1".to_string());
        env.insert("ALPHA".to_string(), "a b".to_string());
        assert_eq!(export_preamble(&env), "export ALPHA='a b'\nexport ZED='1'\n");
    }

    #[test]
    fn heredoc_rejects_delimiter_line() {
        let snippet = heredoc_write("/mnt/data/compose.yml", "services: {}\n").unwrap();
        assert!(snippet.starts_with("mkdir -p \"$(dirname '/mnt/data/compose.yml')\"\n"));
        assert!(snippet.ends_with("services: {}\nFLEETDAG_EOF\n"));

        let err = heredoc_write("/tmp/x", "a\nFLEETDAG_EOF\nb").unwrap_err();
        assert!(matches!(err, FleetdagError::Template(_)));
    }
}
