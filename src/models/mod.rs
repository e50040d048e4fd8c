//! # 数据模型模块
//!
//! 定义格式无关的晶胞参数与原子数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/` 和 `geometry/` 使用
//! - 子模块: structure

pub mod structure;

pub use structure::{Atom, CellParameters};
