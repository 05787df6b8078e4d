// error.rs — 统一错误类型
// 所有模块都返回 crate::error::Result，由 main 负责打印并映射为退出码

use std::path::PathBuf;
use thiserror::Error;

/// ChromaDesk 的错误枚举
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    IoBare(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    ConfigValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("Bing API response contained no usable image")]
    NoImages,

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("required tool `{0}` was not found")]
    ToolMissing(String),

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("template has unresolved placeholders: {0}")]
    Template(String),

    #[error("invalid version '{0}', expected N.N.N")]
    InvalidVersion(String),

    #[error("{what}: every strategy failed ({attempts})")]
    Exhausted { what: String, attempts: String },

    #[error("{0}")]
    Message(String),
}

impl Error {
    /// 为 io::Error 附带出错路径
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Message(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Message(message.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 给 std::io::Result 附加路径上下文
pub trait IoContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
