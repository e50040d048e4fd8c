//! # 晶格几何模块
//!
//! 纯函数形式的晶格数学：晶胞参数与 h 矩阵互换、分数/笛卡尔坐标变换、
//! 周期性边界下的距离、超胞复制。
//!
//! h 矩阵约定：`h[row][col]`，每一**列**是一个晶格向量 a, b, c。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`models/` 使用
//! - 子模块: lattice, pbc

pub mod lattice;
pub mod pbc;

pub use lattice::{
    abc_to_hmatrix, angle_between, cart_to_frac, cartesian_to_scaled, cell_volume, determinant,
    frac_to_cart, hmatrix_from_columns, hmatrix_to_abc, invert_hmatrix, lattice_vector,
    scaled_to_cartesian, HMatrix, IDENTITY,
};
pub use pbc::{
    box_vertices, cell_longest_diameter, cell_multiply, distance_pbc, repeat_vector,
    vector_repetitions, Multiplier,
};
