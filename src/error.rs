//! 错误类型定义
//!
//! 提供扇区缓存及其设备边界的错误类型。

use core::fmt;

/// 缓存/设备操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 设备 I/O 错误
    Io,
    /// 无效参数（未知驱动器、缓冲区长度不符等）
    InvalidInput,
    /// 设备未就绪
    NotReady,
    /// 设备写保护
    WriteProtected,
    /// 无效状态（缓存簿记不一致，例如没有可驱逐的槽位）
    InvalidState,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 是否为设备 I/O 错误
    pub const fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl core::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
