//! # 晶胞与原子数据模型
//!
//! 定义格式无关的晶胞参数与原子表示，供各解析器共享。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `geometry/` 使用
//! - 使用 `geometry/lattice.rs` 完成与 h 矩阵的互换

use crate::error::Result;
use crate::geometry::{self, HMatrix};
use serde::{Deserialize, Serialize};

/// 晶胞参数 (a, b, c, α, β, γ)
///
/// 角度的单位由构造方式决定：`hmatrix_to_abc(_, true)` 给出度，否则为弧度。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellParameters {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl CellParameters {
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        CellParameters {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
        }
    }

    /// 按 [a, b, c, α, β, γ] 顺序导出
    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.alpha, self.beta, self.gamma]
    }

    /// 构造 h 矩阵，`degrees` 指明自身角度的单位
    pub fn to_hmatrix(&self, degrees: bool) -> Result<HMatrix> {
        geometry::abc_to_hmatrix(
            self.a, self.b, self.c, self.alpha, self.beta, self.gamma, degrees,
        )
    }

    /// 从 h 矩阵读取晶胞参数（角度以度为单位）
    pub fn from_hmatrix(h: &HMatrix) -> Result<Self> {
        geometry::hmatrix_to_abc(h, true)
    }

    /// 晶胞体积，角度以度为单位
    pub fn volume(&self) -> Result<f64> {
        Ok(geometry::cell_volume(&self.to_hmatrix(true)?))
    }
}

/// 原子：标签 + 位置
///
/// 标签可以重复；位置的坐标系（笛卡尔或分数）由所在文件决定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub label: String,
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(label: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            label: label.into(),
            position,
        }
    }
}
