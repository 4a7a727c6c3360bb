use std::fmt;
use std::path::PathBuf;

/// Engine-level errors used across optiflow crates.
///
/// Contract rule: this type lives in `optiflow-core` and is re-exported by runtimes.
/// Everything here is fatal for the caller; the steady-state frame loop has no
/// error path besides sequence exhaustion, which is a status and not an error.
#[derive(Debug)]
pub enum EngineError {
    // ---- Startup (host / device) ----
    /// Window, context or device creation failed.
    Initialization(String),

    // ---- Program compilation ----
    VertexCompile(String),
    FragmentCompile(String),
    Link(String),
    GlCreate(String),

    // ---- Geometry ----
    /// Malformed geometry line or out-of-range index. `line` is 1-based.
    Format {
        line: usize,
        message: String,
    },

    // ---- Contract violations ----
    /// Upload size mismatch, attachment/unit index out of range, bad index buffer.
    ResourceBounds(String),
    /// A draw was issued against a pass whose destination is no longer bound.
    InactivePass,

    // ---- Config / files ----
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    InvalidConfig {
        path: PathBuf,
        msg: String,
    },

    /// Image sequence decoding or validation failure.
    Input(String),

    // ---- Fallback ----
    Other(String),
}

impl EngineError {
    pub fn other<T: Into<String>>(s: T) -> Self {
        EngineError::Other(s.into())
    }

    pub fn format<T: Into<String>>(line: usize, message: T) -> Self {
        EngineError::Format {
            line,
            message: message.into(),
        }
    }

    pub fn bounds<T: Into<String>>(s: T) -> Self {
        EngineError::ResourceBounds(s.into())
    }

    /// True for the three program-compilation kinds.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            EngineError::VertexCompile(_) | EngineError::FragmentCompile(_) | EngineError::Link(_)
        )
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Initialization(msg) => write!(f, "initialization failed: {msg}"),

            EngineError::VertexCompile(msg) => write!(f, "vertex shader compile error: {msg}"),
            EngineError::FragmentCompile(msg) => write!(f, "fragment shader compile error: {msg}"),
            EngineError::Link(msg) => write!(f, "program link error: {msg}"),
            EngineError::GlCreate(msg) => write!(f, "backend object creation failed: {msg}"),

            EngineError::Format { line, message } => {
                write!(f, "geometry format error at line {line}: {message}")
            }

            EngineError::ResourceBounds(msg) => write!(f, "resource bounds violation: {msg}"),
            EngineError::InactivePass => {
                write!(f, "draw issued against a pass whose target is not bound")
            }

            EngineError::Io { path, source } => {
                write!(f, "io error at {}: {}", path.display(), source)
            }
            EngineError::Json { path, source } => {
                write!(f, "json parse error at {}: {}", path.display(), source)
            }
            EngineError::InvalidConfig { path, msg } => {
                write!(f, "invalid config at {}: {}", path.display(), msg)
            }
            EngineError::Input(msg) => write!(f, "input error: {msg}"),

            EngineError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            EngineError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}
