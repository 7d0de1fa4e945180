//! Diagnostics engine
//!
//! The lexer and file manager never write to standard error; every
//! problem is reported here as a structured record. The engine buffers
//! diagnostics and forwards each one to an optional client. Rendering
//! and exit-code policy belong to the host.

use crate::{SourceLocation, SourceRange};

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Ignored,
    Note,
    Warning,
    Extension,
    Error,
    Fatal,
}

impl DiagnosticLevel {
    pub fn name(self) -> &'static str {
        match self {
            DiagnosticLevel::Ignored => "ignored",
            DiagnosticLevel::Note => "note",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Extension => "extension",
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Fatal => "fatal",
        }
    }
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub location: SourceLocation,
    pub message: String,
    pub ranges: Vec<SourceRange>,
}

/// Capability consulted for every reported diagnostic, e.g. a renderer.
pub trait DiagnosticClient {
    fn handle_diagnostic(&mut self, diag: &Diagnostic);
}

/// Collects diagnostics for one translation unit.
#[derive(Default)]
pub struct DiagnosticsEngine {
    diagnostics: Vec<Diagnostic>,
    client: Option<Box<dyn DiagnosticClient>>,
    num_errors: u32,
    num_warnings: u32,
}

impl DiagnosticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_client(&mut self, client: Box<dyn DiagnosticClient>) {
        self.client = Some(client);
    }

    /// Report a diagnostic without source ranges.
    pub fn report(
        &mut self,
        level: DiagnosticLevel,
        location: SourceLocation,
        message: impl Into<String>,
    ) {
        self.report_with_ranges(level, location, message, Vec::new());
    }

    /// Report a diagnostic that underlines the given ranges.
    pub fn report_with_ranges(
        &mut self,
        level: DiagnosticLevel,
        location: SourceLocation,
        message: impl Into<String>,
        ranges: Vec<SourceRange>,
    ) {
        match level {
            DiagnosticLevel::Error | DiagnosticLevel::Fatal => self.num_errors += 1,
            DiagnosticLevel::Warning | DiagnosticLevel::Extension => self.num_warnings += 1,
            _ => {}
        }
        let diag = Diagnostic {
            level,
            location,
            message: message.into(),
            ranges,
        };
        if let Some(client) = &mut self.client {
            client.handle_diagnostic(&diag);
        }
        self.diagnostics.push(diag);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn num_errors(&self) -> u32 {
        self.num_errors
    }

    pub fn num_warnings(&self) -> u32 {
        self.num_warnings
    }

    pub fn has_error_occurred(&self) -> bool {
        self.num_errors != 0
    }
}

impl std::fmt::Debug for DiagnosticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsEngine")
            .field("diagnostics", &self.diagnostics)
            .field("num_errors", &self.num_errors)
            .field("num_warnings", &self.num_warnings)
            .finish()
    }
}
