//! # qcio - 量子化学计算输出的文件读写与晶格几何
//!
//! 读取、变换并重新写出计算化学常用的文本格式，同时提供晶格几何运算。
//!
//! ## 模块
//! - `geometry` - 晶胞参数化、坐标变换、周期性距离、超胞复制
//! - `parsers` - 格式解析与写出
//!   - `cube` - Gaussian cube 体数据
//!   - `cp2k_input` - CP2K 输入段落树与路径查询
//!   - `xyz` - XYZ 坐标
//! - `models` - 晶胞参数与原子
//! - `units` - 物理常数
//!
//! ## 依赖关系
//! ```text
//! lib.rs
//!   ├── parsers/   (格式解析器)
//!   │     ├── geometry/  (晶格运算)
//!   │     └── models/    (数据模型)
//!   ├── units.rs   (单位换算常数)
//!   └── error.rs   (错误处理)
//! ```
//!
//! 库本身不安装日志后端，日志通过 `log` 门面输出，由调用方决定如何收集。

pub mod error;
pub mod geometry;
pub mod models;
pub mod parsers;
pub mod units;

pub use error::{QcioError, Result};
pub use geometry::HMatrix;
pub use models::{Atom, CellParameters};
pub use parsers::cp2k_input::{Cp2kInput, KeywordKind, KeywordValue, PathValue, WriteOptions};
pub use parsers::cube::CubeFile;
pub use parsers::xyz::Xyz;
pub use parsers::{HoldsCoordinates, HoldsLabels, HoldsUnitCell};
