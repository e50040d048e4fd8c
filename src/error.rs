//! # 统一错误处理模块
//!
//! 定义 qcio 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 错误分类
//! - 格式错误 (`ParseError`)：非法数值、字段数不符、原子数不符、段落未闭合
//! - 参数错误 (`InvalidValue`)：坐标长度、倍数、查询路径、布尔值
//! - 越界错误 (`IndexOutOfBounds`)：网格下标越界、体数据数量与声明不符
//! - 不支持的输入 (`UnsupportedFormat`)：多帧 XYZ
//! - 定义域错误 (`Domain`)：零长度向量、非有限数、奇异晶格
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// qcio 统一错误类型
#[derive(Error, Debug)]
pub enum QcioError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} input at line {line}: {reason}")]
    ParseError {
        format: String,
        line: usize,
        reason: String,
    },

    #[error("Unsupported input: {0}")]
    UnsupportedFormat(String),

    // ─────────────────────────────────────────────────────────────
    // 参数与数值错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),

    #[error("Math domain error: {0}")]
    Domain(String),
}

impl QcioError {
    /// 构造带行号的格式错误
    pub(crate) fn parse(format: &str, line: usize, reason: impl Into<String>) -> Self {
        QcioError::ParseError {
            format: format.to_string(),
            line,
            reason: reason.into(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, QcioError>;
