//! Error types carrying source positions.
//!
//! Every failure names a line/column pair (1-based) and, when the failing
//! template came from a file or registered module, that file's identity.
//! [`report`] bridges an error into a `miette` diagnostic with the offending
//! source line and a caret under the column.

use miette::{LabeledSpan, NamedSource};
use thiserror::Error;

// ============================================================================
// Parse Errors
// ============================================================================

/// Errors produced while tokenizing or parsing a template.
///
/// `UnrecognizedCharacter` and `UnterminatedString` come from the tokenizer;
/// the rest come from the parser.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unrecognized character: {character}")]
    UnrecognizedCharacter {
        character: char,
        line: u32,
        column: u32,
        file: Option<String>,
    },

    #[error("unterminated string")]
    UnterminatedString {
        line: u32,
        column: u32,
        file: Option<String>,
    },

    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: u32,
        column: u32,
        file: Option<String>,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof {
        expected: String,
        line: u32,
        column: u32,
        file: Option<String>,
    },
}

impl ParseError {
    /// Line/column of the offending input.
    pub fn position(&self) -> (u32, u32) {
        match self {
            ParseError::UnrecognizedCharacter { line, column, .. }
            | ParseError::UnterminatedString { line, column, .. }
            | ParseError::UnexpectedToken { line, column, .. }
            | ParseError::UnexpectedEof { line, column, .. } => (*line, *column),
        }
    }

    /// File identity of the template that failed to parse, if any.
    pub fn file(&self) -> Option<&str> {
        self.file_slot().as_deref()
    }

    /// Attach a file identity to an error parsed from an anonymous source.
    pub fn with_file(mut self, file: &str) -> Self {
        *self.file_slot_mut() = Some(file.to_string());
        self
    }

    fn file_slot(&self) -> &Option<String> {
        match self {
            ParseError::UnrecognizedCharacter { file, .. }
            | ParseError::UnterminatedString { file, .. }
            | ParseError::UnexpectedToken { file, .. }
            | ParseError::UnexpectedEof { file, .. } => file,
        }
    }

    fn file_slot_mut(&mut self) -> &mut Option<String> {
        match self {
            ParseError::UnrecognizedCharacter { file, .. }
            | ParseError::UnterminatedString { file, .. }
            | ParseError::UnexpectedToken { file, .. }
            | ParseError::UnexpectedEof { file, .. } => file,
        }
    }
}

// ============================================================================
// Render Errors
// ============================================================================

fn plural(count: &usize) -> &'static str {
    if *count == 1 { "argument" } else { "arguments" }
}

/// Errors produced while evaluating a parsed template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("undefined variable: {name}")]
    UndefinedVariable {
        name: String,
        line: u32,
        column: u32,
        file: Option<String>,
    },

    #[error("undefined function: {name}")]
    UndefinedFunction {
        name: String,
        line: u32,
        column: u32,
        file: Option<String>,
    },

    #[error("undefined command: {name}")]
    UndefinedCommand {
        name: String,
        line: u32,
        column: u32,
        file: Option<String>,
    },

    #[error("{command}: {required} {} required, but only {present} present", plural(.required))]
    ArityMismatch {
        command: String,
        required: usize,
        present: usize,
        line: u32,
        column: u32,
        file: Option<String>,
    },

    #[error("default is not allowed for builtin {target}: {name}")]
    IllegalDefault {
        name: String,
        /// `"command"` or `"function"`, depending on the call position.
        target: &'static str,
        line: u32,
        column: u32,
        file: Option<String>,
    },

    #[error("input value is not a number: {value}")]
    InvalidValue {
        value: String,
        line: u32,
        column: u32,
        file: Option<String>,
    },

    /// Attributed to the call site that failed to supply the value, not to
    /// the prop declaration; at the root call there is no call site and the
    /// position is absent.
    #[error("there is no default value: {name}")]
    MissingDefault {
        name: String,
        line: Option<u32>,
        column: Option<u32>,
        file: Option<String>,
    },

    #[error("file not found: {path}")]
    ImportNotFound {
        path: String,
        line: u32,
        column: u32,
        file: Option<String>,
    },
}

impl RenderError {
    /// Line/column of the failure, when one is attributable.
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            RenderError::UndefinedVariable { line, column, .. }
            | RenderError::UndefinedFunction { line, column, .. }
            | RenderError::UndefinedCommand { line, column, .. }
            | RenderError::ArityMismatch { line, column, .. }
            | RenderError::IllegalDefault { line, column, .. }
            | RenderError::InvalidValue { line, column, .. }
            | RenderError::ImportNotFound { line, column, .. } => Some((*line, *column)),
            RenderError::MissingDefault { line, column, .. } => line.zip(*column),
        }
    }

    /// File identity of the template that failed, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            RenderError::UndefinedVariable { file, .. }
            | RenderError::UndefinedFunction { file, .. }
            | RenderError::UndefinedCommand { file, .. }
            | RenderError::ArityMismatch { file, .. }
            | RenderError::IllegalDefault { file, .. }
            | RenderError::InvalidValue { file, .. }
            | RenderError::MissingDefault { file, .. }
            | RenderError::ImportNotFound { file, .. } => file.as_deref(),
        }
    }
}

// ============================================================================
// Top-level error
// ============================================================================

/// Any failure a render entry point can produce.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl Error {
    /// Line/column of the failure, when one is attributable.
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            Error::Parse(e) => Some(e.position()),
            Error::Render(e) => e.position(),
        }
    }

    /// File identity of the failing template, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            Error::Parse(e) => e.file(),
            Error::Render(e) => e.file(),
        }
    }
}

// ============================================================================
// Diagnostic presentation
// ============================================================================

/// Byte offset of a 1-based line/column pair within `source`.
fn offset_of(source: &str, line: u32, column: u32) -> usize {
    let mut skip = line.saturating_sub(1);
    let mut offset = 0;
    for text in source.split_inclusive('\n') {
        if skip == 0 {
            let col = column.saturating_sub(1) as usize;
            return offset
                + text
                    .char_indices()
                    .nth(col)
                    .map(|(i, _)| i)
                    .unwrap_or(text.len());
        }
        skip -= 1;
        offset += text.len();
    }
    source.len()
}

/// Build a `miette` report for `error` against the source text it refers to.
///
/// The report carries the source line and a label under the failing column,
/// which `miette`'s fancy handler renders as the caret display a CLI prints
/// before exiting non-zero.
pub fn report(error: &Error, source: &str) -> miette::Report {
    let name = error.file().unwrap_or("<template>").to_string();
    let diagnostic = match error.position() {
        Some((line, column)) => {
            let start = offset_of(source, line, column).min(source.len());
            let end = source[start..]
                .chars()
                .next()
                .map(|c| start + c.len_utf8())
                .unwrap_or(start);
            miette::miette!(labels = vec![LabeledSpan::at(start..end, "here")], "{error}")
        }
        None => miette::miette!("{error}"),
    };
    diagnostic.with_source_code(NamedSource::new(name, source.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_mismatch_message_pluralizes() {
        let one = RenderError::ArityMismatch {
            command: "H".into(),
            required: 1,
            present: 0,
            line: 1,
            column: 1,
            file: None,
        };
        assert_eq!(one.to_string(), "H: 1 argument required, but only 0 present");

        let two = RenderError::ArityMismatch {
            command: "M".into(),
            required: 2,
            present: 1,
            line: 1,
            column: 1,
            file: None,
        };
        assert_eq!(two.to_string(), "M: 2 arguments required, but only 1 present");
    }

    #[test]
    fn offset_of_walks_lines_and_columns() {
        let src = "M 0,0\nL 1,2\n";
        assert_eq!(offset_of(src, 1, 1), 0);
        assert_eq!(offset_of(src, 2, 1), 6);
        assert_eq!(offset_of(src, 2, 3), 8);
        // Past the end clamps to the source length.
        assert_eq!(offset_of(src, 9, 1), src.len());
    }

    #[test]
    fn with_file_attaches_identity() {
        let err = ParseError::UnexpectedEof {
            expected: "`}`".into(),
            line: 3,
            column: 1,
            file: None,
        }
        .with_file("lib/wave.path");
        assert_eq!(err.file(), Some("lib/wave.path"));
        assert_eq!(err.position(), (3, 1));
    }

    #[test]
    fn report_renders_a_caret_under_the_column() {
        let source = "M 0,x";
        let error = Error::Render(RenderError::UndefinedVariable {
            name: "x".into(),
            line: 1,
            column: 5,
            file: None,
        });
        let rendered = format!("{:?}", report(&error, source));
        assert!(rendered.contains("undefined variable: x"), "{rendered}");
        assert!(rendered.contains("M 0,x"), "{rendered}");
    }
}
