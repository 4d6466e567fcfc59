use std::path::PathBuf;
use thiserror::Error;

/// Main error type for libpack
#[derive(Error, Debug)]
pub enum LibpackError {
    /// A required configuration field is missing or contradicts another one.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
        /// Which part of the project the error belongs to, e.g. `bundles[1]`.
        location: Option<String>,
    },

    /// Something the pipeline itself should have established was not set.
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Compilation failed: {message}")]
    Compile {
        message: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("Bundling failed: {message}")]
    Bundle {
        message: String,
        details: Option<String>,
        stack: Option<String>,
    },

    #[error("Minification error: {message}")]
    Minify {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported style format '{extension}': {file}")]
    UnsupportedFormat { file: PathBuf, extension: String },

    #[error("Parse error in file {file}: {message}")]
    Parse {
        file: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Style processing error in {file}: {message}")]
    Style { file: PathBuf, message: String },

    #[error("Source map error in {file}: {message}")]
    SourceMap { file: PathBuf, message: String },

    #[error("File system error: {message}")]
    FileSystem {
        message: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LibpackError>;

/// A single compiler diagnostic, e.g. `src/a.ts:3:7 - error TS2304: Cannot find name 'x'.`
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub category: DiagnosticCategory,
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Message,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCategory {
    Configuration,
    Internal,
    Compile,
    Bundle,
    Minification,
    Style,
    Parsing,
    SourceMap,
    FileSystem,
    Process,
}

impl LibpackError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            location: None,
        }
    }

    pub fn invalid_config_at(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            location: Some(location.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile {
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn bundle(message: impl Into<String>) -> Self {
        Self::Bundle {
            message: message.into(),
            details: None,
            stack: None,
        }
    }

    pub fn minify(message: impl Into<String>) -> Self {
        Self::Minify {
            message: message.into(),
            source: None,
        }
    }

    pub fn parse_error(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn file_system_error(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            message: message.into(),
            path: path.into(),
            source,
        }
    }

    /// Shorthand for mapping `std::io::Error` with the offending path attached.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::FileSystem {
            message: format!("{}: {}", path.display(), source),
            path,
            source,
        }
    }

    /// Errors a single bundle target may fail with without stopping the build.
    ///
    /// Transpilation failures abort the pipeline, bundle-stage failures
    /// (backend or tier transform) are logged and the next target runs.
    pub fn is_bundle_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Bundle { .. } | Self::Compile { .. } | Self::Spawn { .. } | Self::SourceMap { .. }
        )
    }

    /// Get error category for reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
            Self::Compile { .. } => ErrorCategory::Compile,
            Self::Bundle { .. } => ErrorCategory::Bundle,
            Self::Minify { .. } => ErrorCategory::Minification,
            Self::UnsupportedFormat { .. } | Self::Style { .. } => ErrorCategory::Style,
            Self::Parse { .. } => ErrorCategory::Parsing,
            Self::SourceMap { .. } => ErrorCategory::SourceMap,
            Self::FileSystem { .. } => ErrorCategory::FileSystem,
            Self::Spawn { .. } => ErrorCategory::Process,
        }
    }

    /// Full multi-line report: message, then details, then stack or diagnostics.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        match self {
            Self::Bundle { details, stack, .. } => {
                if let Some(details) = details.as_deref().filter(|d| !d.trim().is_empty()) {
                    out.push('\n');
                    out.push_str(details.trim_end());
                }
                if let Some(stack) = stack.as_deref().filter(|s| !s.trim().is_empty()) {
                    out.push('\n');
                    out.push_str(stack.trim_end());
                }
            }
            Self::Compile { diagnostics, .. } => {
                for diagnostic in diagnostics {
                    out.push_str("\n  ");
                    out.push_str(&diagnostic.to_string());
                }
            }
            Self::InvalidConfig {
                location: Some(location),
                ..
            } => {
                out.push_str(&format!(" (at {})", location));
            }
            _ => {}
        }
        out
    }
}

impl From<std::io::Error> for LibpackError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            message: err.to_string(),
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for LibpackError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            file: PathBuf::from("unknown"),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl std::fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Message => "message",
        };
        f.write_str(label)
    }
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            file: None,
            line: None,
            column: None,
            category: DiagnosticCategory::Error,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_location(mut self, file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}", file.display())?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
                if let Some(column) = self.column {
                    write!(f, ":{}", column)?;
                }
            }
            write!(f, " - ")?;
        }
        write!(f, "{}", self.category)?;
        if let Some(code) = &self.code {
            write!(f, " {}", code)?;
        }
        write!(f, ": {}", self.message)
    }
}
