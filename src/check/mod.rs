//! Per-language error checking feeding the gutter annotations.
//!
//! Each pass produces at most one [`Diagnostic`] per language: the first
//! error its checker hits. Checkers never touch the bundle.

mod markup;
mod script;
mod styles;

use std::sync::OnceLock;

use regex::Regex;

use crate::bundle::{Language, SourceBundle};

pub use markup::{check_markup, MarkupError};
#[cfg(target_arch = "wasm32")]
pub use script::EngineCompiler;
pub use script::{ScriptCompileError, ScriptCompiler, SyntaxScanner};
pub use styles::{check_styles, StyleError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub language: Language,
    /// 1-based.
    pub line: usize,
    pub message: String,
}

pub struct ErrorChecker {
    compiler: Box<dyn ScriptCompiler>,
}

impl Default for ErrorChecker {
    /// The engine in the browser, the scanner everywhere else.
    fn default() -> Self {
        #[cfg(target_arch = "wasm32")]
        let compiler: Box<dyn ScriptCompiler> = Box::new(EngineCompiler);
        #[cfg(not(target_arch = "wasm32"))]
        let compiler: Box<dyn ScriptCompiler> = Box::new(SyntaxScanner);
        Self::with_compiler(compiler)
    }
}

impl ErrorChecker {
    pub fn with_compiler(compiler: Box<dyn ScriptCompiler>) -> Self {
        Self { compiler }
    }

    pub fn check(&self, bundle: &SourceBundle) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if let Err(err) = check_markup(&bundle.markup) {
            diagnostics.push(Diagnostic {
                language: Language::Markup,
                line: err.line(),
                message: err.to_string(),
            });
        }

        if let Err(err) = check_styles(&bundle.styles) {
            let message = err.to_string();
            diagnostics.push(Diagnostic {
                language: Language::Styles,
                line: line_from_message(&message).unwrap_or(1),
                message,
            });
        }

        if let Err(err) = self.compiler.compile(&bundle.script) {
            let line = err
                .line
                .or_else(|| err.trace.as_deref().and_then(line_from_trace))
                .unwrap_or(1);
            diagnostics.push(Diagnostic {
                language: Language::Script,
                line,
                message: err.message,
            });
        }

        log::debug!("check pass produced {} diagnostic(s)", diagnostics.len());
        diagnostics
    }
}

/// Checks a bundle with the default checkers.
pub fn check(bundle: &SourceBundle) -> Vec<Diagnostic> {
    ErrorChecker::default().check(bundle)
}

pub fn for_language(diagnostics: &[Diagnostic], language: Language) -> Option<&Diagnostic> {
    diagnostics.iter().find(|d| d.language == language)
}

/// Pulls `N` out of a `line N` fragment.
pub fn line_from_message(message: &str) -> Option<usize> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"line (\d+)").unwrap());
    re.captures(message)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
        .filter(|line| *line > 0)
}

/// Pulls the line out of an `<anonymous>:N` stack frame.
pub fn line_from_trace(trace: &str) -> Option<usize> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"<anonymous>:(\d+)").unwrap());
    re.captures(trace)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
        .filter(|line| *line > 0)
}
