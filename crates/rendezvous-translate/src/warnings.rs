//! Non-fatal translation findings.
//!
//! Anything the translator cannot model exactly is approximated and recorded
//! as a [`TranslationWarning`]; translation itself continues.

use std::fmt;

use miette::{Diagnostic, LabeledSpan, NamedSource, Severity, SourceCode, SourceSpan};
use rendezvous_ir::{Program, Span};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WarningCode {
    DynamicUnresolved,
    UnsupportedExpr,
    UnsupportedType,
    PartialCopy,
    RedundantAnnotation,
    ChannelPayload,
    MapIndex,
}

impl WarningCode {
    pub fn as_str(self) -> &'static str {
        match self {
            WarningCode::DynamicUnresolved => "W-DYNAMIC-UNRESOLVED",
            WarningCode::UnsupportedExpr => "W-UNSUPPORTED-EXPR",
            WarningCode::UnsupportedType => "W-UNSUPPORTED-TYPE",
            WarningCode::PartialCopy => "W-PARTIAL-COPY",
            WarningCode::RedundantAnnotation => "W-REDUNDANT-ANNOTATION",
            WarningCode::ChannelPayload => "W-CHANNEL-PAYLOAD",
            WarningCode::MapIndex => "W-MAP-INDEX",
        }
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationWarning {
    pub code: WarningCode,
    pub message: String,
    /// Name of the function being translated, `None` for global scope.
    pub function: Option<String>,
    pub span: Option<Span>,
}

impl TranslationWarning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            function: None,
            span: None,
        }
    }

    pub fn in_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach the program's source text, if it has any, for rendering.
    pub fn report(&self, program: &Program) -> WarningReport {
        let src = program
            .source
            .as_ref()
            .map(|text| NamedSource::new(program.file.clone(), text.clone()));
        let span = match (&src, self.span) {
            (Some(_), Some(s)) => Some(SourceSpan::new(s.start.into(), s.len())),
            _ => None,
        };
        WarningReport {
            code: self.code,
            message: self.to_string(),
            src,
            span,
        }
    }
}

impl fmt::Display for TranslationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(func) = &self.function {
            write!(f, " (in {func})")?;
        }
        Ok(())
    }
}

/// A warning bound to source text, renderable through `miette`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct WarningReport {
    code: WarningCode,
    message: String,
    src: Option<NamedSource<String>>,
    span: Option<SourceSpan>,
}

impl Diagnostic for WarningReport {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Warning)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.src.as_ref().map(|s| s as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some("here".to_string()),
            span,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_ir::ProgramBuilder;

    #[test]
    fn report_labels_source_when_available() {
        let mut b = ProgramBuilder::new("demo").with_source("demo.go", "func main() {}\n");
        let main = b.func("main");
        b.set_entry(main);
        let program = b.build();

        let w = TranslationWarning::new(WarningCode::MapIndex, "map index is not modeled")
            .in_function("main")
            .at(Span::new(5, 9));
        assert_eq!(
            w.to_string(),
            "W-MAP-INDEX: map index is not modeled (in main)"
        );
        let report = w.report(&program);
        assert_eq!(report.code().map(|c| c.to_string()).as_deref(), Some("W-MAP-INDEX"));
        assert_eq!(report.severity(), Some(Severity::Warning));
        assert!(report.source_code().is_some());
        assert_eq!(report.labels().map(|l| l.count()), Some(1));
    }

    #[test]
    fn report_without_source_has_no_labels() {
        let mut b = ProgramBuilder::new("bare");
        let main = b.func("main");
        b.set_entry(main);
        let program = b.build();

        let report = TranslationWarning::new(WarningCode::PartialCopy, "shared mutex")
            .at(Span::new(0, 3))
            .report(&program);
        assert!(report.source_code().is_none());
        assert!(report.labels().is_none());
    }
}
