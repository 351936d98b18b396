use std::fmt;

use thiserror::Error;

#[derive(Clone, Copy, Debug)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub const fn dummy() -> Self {
        Self { line: 0, column: 0 }
    }

    pub const fn is_dummy(&self) -> bool {
        self.line == 0 && self.column == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dummy() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{span}: undefined variable @{name}")]
    UndefinedVariable { name: String, span: Span },

    #[error("{span}: undefined mixin {name}")]
    UndefinedMixin { name: String, span: Span },

    #[error("{span}: cyclic variable definition involving @{name}")]
    VariableCycle { name: String, span: Span },

    #[error("{span}: cyclic mixin call involving {name}")]
    MixinCycle { name: String, span: Span },

    #[error("{span}: {message}")]
    Syntax { message: String, span: Span },

    #[error("{span}: unknown at-rule @{name}")]
    UnknownAtRule { name: String, span: Span },

    #[error("{span}: {message}")]
    Color { message: String, span: Span },

    #[error("{message}")]
    Import { message: String },

    #[error("failed to load theme: {message}")]
    Theme { message: String },

    #[error("{message}")]
    Io { message: String },
}

pub type CompileResult<T> = Result<T, CompileError>;
