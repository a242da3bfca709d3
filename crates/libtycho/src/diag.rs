//! Diagnostic accumulation and terminal rendering.
//!
//! Fatal errors unwind as [`CompilerError`](crate::error::CompilerError); this
//! module covers everything that must *not* stop compilation: warnings and the
//! accumulated error list used in intellisense mode. Logs are rendered with
//! `codespan-reporting` as `file:line:col:` followed by the message, the
//! offending source line and a caret underline.

use std::ops::Range;

use codespan_reporting::{
    diagnostic::{Diagnostic, Label},
    files::SimpleFiles,
    term::{self, termcolor::{ColorChoice, StandardStream}},
};

use crate::{file::SourceFile, span::Span};

/// File extension for Tycho language source files
pub static TYCHO_LANG_EXT: &str = "tc";

/// Initializes terminal logging for the `debug!` traces the compiler emits
/// while resolving, inferring and lowering. Safe to call more than once; a
/// second initialization is ignored.
pub fn init_logging(level: log::LevelFilter) {
    let _ = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
}

/// Severity of an accumulated diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Error,
    Warning,
}

/// A single accumulated diagnostic with its labeled source ranges.
#[derive(Debug, Clone)]
pub struct CompilerLog {
    pub kind: LogKind,
    pub message: String,
    /// Labeled ranges into `file`, primary label first
    pub labels: Vec<(Range<usize>, String)>,
    pub help: Option<String>,
    pub file: SourceFile,
}

impl CompilerLog {
    pub fn error(message: impl Into<String>, span: &Span, label: impl Into<String>) -> Self {
        Self {
            kind: LogKind::Error,
            message: message.into(),
            labels: vec![(span.to_range(), label.into())],
            help: None,
            file: span.file.clone(),
        }
    }

    pub fn warning(message: impl Into<String>, span: &Span, label: impl Into<String>) -> Self {
        Self {
            kind: LogKind::Warning,
            message: message.into(),
            labels: vec![(span.to_range(), label.into())],
            help: None,
            file: span.file.clone(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Per-package diagnostic sink.
///
/// Warnings always accumulate here. Errors accumulate too when the compiler
/// runs in intellisense mode; the `has_errors` flag flips on the first one and
/// stays set.
#[derive(Debug, Default)]
pub struct LogSink {
    logs: Vec<CompilerLog>,
    has_errors: bool,
    suppress_warnings: bool,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops warnings instead of accumulating them.
    pub fn without_warnings() -> Self {
        Self {
            suppress_warnings: true,
            ..Self::default()
        }
    }

    pub fn push(&mut self, log: CompilerLog) {
        match log.kind {
            LogKind::Error => self.has_errors = true,
            LogKind::Warning if self.suppress_warnings => return,
            LogKind::Warning => {}
        }
        self.logs.push(log);
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn logs(&self) -> &[CompilerLog] {
        &self.logs
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

/// Renders a batch of logs to a string, one `codespan` diagnostic each.
pub fn render_logs(logs: &[CompilerLog]) -> String {
    let mut files = SimpleFiles::new();
    let mut out = Vec::new();
    let config = term::Config::default();

    for log in logs {
        let file_id = files.add(
            format!("{}.{}", log.file.display_path(), TYCHO_LANG_EXT),
            log.file.code().to_string(),
        );

        let mut diagnostic = match log.kind {
            LogKind::Error => Diagnostic::error(),
            LogKind::Warning => Diagnostic::warning(),
        };
        diagnostic = diagnostic.with_message(log.message.clone());

        let labels = log
            .labels
            .iter()
            .map(|(range, message)| Label::primary(file_id, range.clone()).with_message(message.clone()))
            .collect::<Vec<_>>();
        diagnostic = diagnostic.with_labels(labels);

        if let Some(help) = &log.help {
            diagnostic = diagnostic.with_notes(vec![help.clone()]);
        }

        let mut buffer = codespan_reporting::term::termcolor::NoColor::new(Vec::new());
        term::emit(&mut buffer, &config, &files, &diagnostic).expect("diagnostic rendering failed");
        out.extend_from_slice(buffer.get_ref());
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Renders a batch of logs to stderr with terminal colors.
pub fn print_logs(logs: &[CompilerLog]) {
    let mut files = SimpleFiles::new();
    let config = term::Config::default();
    let writer = StandardStream::stderr(ColorChoice::Auto);

    for log in logs {
        let file_id = files.add(
            format!("{}.{}", log.file.display_path(), TYCHO_LANG_EXT),
            log.file.code().to_string(),
        );

        let mut diagnostic = match log.kind {
            LogKind::Error => Diagnostic::error(),
            LogKind::Warning => Diagnostic::warning(),
        };
        diagnostic = diagnostic.with_message(log.message.clone());
        diagnostic = diagnostic.with_labels(
            log.labels
                .iter()
                .map(|(range, message)| Label::primary(file_id, range.clone()).with_message(message.clone()))
                .collect(),
        );
        if let Some(help) = &log.help {
            diagnostic = diagnostic.with_notes(vec![help.clone()]);
        }

        term::emit(&mut writer.lock(), &config, &files, &diagnostic).expect("diagnostic rendering failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(code: &str, range: Range<usize>) -> Span {
        Span::new(range, SourceFile::new(vec!["test".into()], code.to_string()))
    }

    #[test]
    fn sink_tracks_errors() {
        let mut sink = LogSink::new();
        assert!(!sink.has_errors());

        sink.push(CompilerLog::warning("shadowed", &span("let x = 1", 4..5), "here"));
        assert!(!sink.has_errors());

        sink.push(CompilerLog::error("bad type", &span("let x = 1", 8..9), "here"));
        assert!(sink.has_errors());
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn sink_without_warnings_drops_them() {
        let mut sink = LogSink::without_warnings();
        sink.push(CompilerLog::warning("shadowed", &span("let x = 1", 4..5), "here"));
        assert!(sink.is_empty());
    }

    #[test]
    fn rendering_contains_caret_and_message() {
        let log = CompilerLog::error("unknown type", &span("let x: Foo = 1", 7..10), "not defined")
            .with_help("import the type first");
        let rendered = render_logs(&[log]);
        assert!(rendered.contains("unknown type"));
        assert!(rendered.contains('^'));
        assert!(rendered.contains("import the type first"));
    }
}
