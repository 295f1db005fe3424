//! The flat diagnostic record shared across the pipeline's stages (§7).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// `{code, severity, message, location}`, matching the flat taxonomy every
/// stage reports through. `Serialize` so a driver can emit `--format json`
/// alongside the default human-readable rendering.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub location: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            code: code.to_string(),
            severity: Severity::Error,
            message: message.into(),
            location: None,
        }
    }

    /// Splits an aggregated checker error (one line per accumulated
    /// problem, per the accumulate-don't-abort policy) into one diagnostic
    /// per line.
    #[must_use]
    pub fn from_check_error(err: &anyhow::Error) -> Vec<Diagnostic> {
        err.to_string()
            .lines()
            .map(|line| Diagnostic::error("TypeCheckError", line.to_string()))
            .collect()
    }

    /// `code: message`, the default stderr rendering.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_check_error_splits_on_newline() {
        let err = anyhow::anyhow!("first problem\nsecond problem");
        let diagnostics = Diagnostic::from_check_error(&err);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].message, "first problem");
        assert_eq!(diagnostics[1].message, "second problem");
    }

    #[test]
    fn render_matches_code_colon_message() {
        let d = Diagnostic::error("SymbolNotFound", "undefined variable \"x\"");
        assert_eq!(d.render(), "SymbolNotFound: undefined variable \"x\"");
    }
}
