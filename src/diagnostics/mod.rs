//! Structured diagnostics (spec component G).
//!
//! A diagnostic carries a severity, an optional source range, a short
//! summary, and an optional detail. Diagnostics accumulate monotonically
//! through a run; `Diagnostics::has_errors` is the gate every phase checks
//! before handing its output to the next phase.

mod fuzzy;

pub use fuzzy::{best_suggestion, suggestions};

use std::fmt;

/// Severity of a single diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A location within a single source document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceRange {
    pub file: String,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SourceRange {
    pub fn new(file: impl Into<String>, start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            file: file.into(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// A synthetic range for diagnostics that don't originate from a parsed
    /// document position (e.g. cross-node reference errors discovered
    /// during graph construction).
    pub fn unknown() -> Self {
        Self::default()
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            return write!(f, "<unknown>");
        }
        write!(
            f,
            "{}:{}:{}",
            self.file, self.start_line, self.start_col
        )
    }
}

/// A single diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub range: Option<SourceRange>,
    pub summary: String,
    pub detail: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(r) => write!(f, "{}: {}: {}", r, self.severity, self.summary)?,
            None => write!(f, "{}: {}", self.severity, self.summary)?,
        }
        if let Some(d) = &self.detail {
            write!(f, "\n  {}", d)?;
        }
        Ok(())
    }
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// An append-only collection of diagnostics produced during a single run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, range: Option<SourceRange>, summary: impl Into<String>, detail: impl Into<String>) {
        let detail = detail.into();
        self.0.push(Diagnostic {
            severity: Severity::Error,
            range,
            summary: summary.into(),
            detail: if detail.is_empty() { None } else { Some(detail) },
        });
    }

    pub fn warning(&mut self, range: Option<SourceRange>, summary: impl Into<String>, detail: impl Into<String>) {
        let detail = detail.into();
        self.0.push(Diagnostic {
            severity: Severity::Warning,
            range,
            summary: summary.into(),
            detail: if detail.is_empty() { None } else { Some(detail) },
        });
    }

    /// An "internal error" is always a warning — it should never abort the
    /// run, only surface enough context to file a bug.
    pub fn internal_error(&mut self, range: Option<SourceRange>, summary: impl Into<String>) {
        self.warning(range, format!("internal error: {}", summary.into()), "");
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no diagnostics");
        }
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
