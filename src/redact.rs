use crate::picker::compile_patterns;
use regex::{Captures, NoExpand, Regex};

pub const REDACTED: &str = "***REDACTED***";

/// Environment-style names whose assigned value is masked. A name matches
/// when it ends with one of these, case-insensitively (`GITHUB_TOKEN`,
/// `db_password`).
pub const SECRET_KEYS: &[&str] = &[
    "TOKEN",
    "KEY",
    "SECRET",
    "PASSWORD",
    "PASS",
    "AUTH",
    "BEARER",
    "AWS_SECRET_ACCESS_KEY",
    "GITHUB_TOKEN",
];

/// Long options whose argument is masked.
pub const SECRET_FLAGS: &[&str] = &["token", "password", "apikey", "api-key"];

/// Masks secret values in command text.
///
/// Matching is purely textual. It does not understand shell quoting, so a
/// value hidden behind escapes or unusual quoting can slip through.
pub struct Redactor {
    assignments: Vec<Regex>,
    quoted_assignments: Vec<Regex>,
    flags: Vec<Regex>,
    custom: Vec<Regex>,
}

impl Redactor {
    /// Built-in key and flag rules plus `custom_patterns`, each of which
    /// replaces its whole match. Patterns that do not compile are skipped.
    pub fn new(custom_patterns: &[String]) -> Self {
        Self::with_rules(SECRET_KEYS, SECRET_FLAGS, custom_patterns)
    }

    pub fn with_rules(keys: &[&str], flags: &[&str], custom_patterns: &[String]) -> Self {
        let assignments = compile_patterns(
            &keys
                .iter()
                .map(|key| format!(r#"{}=[^\s"']+"#, ident_regex(key)))
                .collect::<Vec<_>>(),
        );
        let quoted_assignments = compile_patterns(
            &keys
                .iter()
                .map(|key| format!(r#"{}="[^"]+""#, ident_regex(key)))
                .collect::<Vec<_>>(),
        );
        let flags = compile_patterns(
            &flags
                .iter()
                .map(|flag| format!(r#"(--{})([= ]+)[^\s"']+"#, regex::escape(flag)))
                .collect::<Vec<_>>(),
        );

        Self {
            assignments,
            quoted_assignments,
            flags,
            custom: compile_patterns(custom_patterns),
        }
    }

    pub fn redact(&self, cmd: &str) -> String {
        let mut redacted = cmd.to_string();

        for (plain, quoted) in self.assignments.iter().zip(&self.quoted_assignments) {
            redacted = plain
                .replace_all(&redacted, |caps: &Captures| format!("{}={}", &caps[1], REDACTED))
                .into_owned();
            redacted = quoted
                .replace_all(&redacted, |caps: &Captures| {
                    format!("{}=\"{}\"", &caps[1], REDACTED)
                })
                .into_owned();
        }

        for flag in &self.flags {
            redacted = flag
                .replace_all(&redacted, |caps: &Captures| {
                    format!("{}{}{}", &caps[1], &caps[2], REDACTED)
                })
                .into_owned();
        }

        for re in &self.custom {
            redacted = re.replace_all(&redacted, NoExpand(REDACTED)).into_owned();
        }

        redacted
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(&[])
    }
}

// Any identifier ending in `key`, captured as group 1.
fn ident_regex(key: &str) -> String {
    format!("(?i:([A-Z0-9_]*{}))", regex::escape(key))
}
