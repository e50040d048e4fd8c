//! # 晶胞参数与坐标变换
//!
//! ## 晶胞约定
//! ```text
//! a = (a, 0, 0)
//! b = (b·cosγ, b·sinγ, 0)
//! c = (c₁, c₂, c₃)
//!     c₁ = c·cosβ
//!     c₂ = c·(cosα − cosβ·cosγ) / sinγ
//!     c₃ = √(c² − c₁² − c₂²)
//! ```
//!
//! ## 依赖关系
//! - 被 `geometry/pbc.rs`, `parsers/cube.rs`, `parsers/cp2k_input.rs` 使用
//! - 使用 `models/structure.rs` 的 `CellParameters`

use crate::error::{QcioError, Result};
use crate::models::CellParameters;

/// 3x3 晶格矩阵，列向量为 a, b, c
pub type HMatrix = [[f64; 3]; 3];

/// 单位矩阵（分数坐标空间本身）
pub const IDENTITY: HMatrix = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

pub(crate) fn dot(u: [f64; 3], v: [f64; 3]) -> f64 {
    u[0] * v[0] + u[1] * v[1] + u[2] * v[2]
}

pub(crate) fn norm(u: [f64; 3]) -> f64 {
    dot(u, u).sqrt()
}

pub(crate) fn cross(u: [f64; 3], v: [f64; 3]) -> [f64; 3] {
    [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ]
}

pub(crate) fn add(u: [f64; 3], v: [f64; 3]) -> [f64; 3] {
    [u[0] + v[0], u[1] + v[1], u[2] + v[2]]
}

pub(crate) fn sub(u: [f64; 3], v: [f64; 3]) -> [f64; 3] {
    [u[0] - v[0], u[1] - v[1], u[2] - v[2]]
}

/// 取第 `axis` 个晶格向量（h 矩阵的第 `axis` 列）
pub fn lattice_vector(h: &HMatrix, axis: usize) -> [f64; 3] {
    [h[0][axis], h[1][axis], h[2][axis]]
}

/// 由三个晶格向量组装 h 矩阵
pub fn hmatrix_from_columns(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> HMatrix {
    [[a[0], b[0], c[0]], [a[1], b[1], c[1]], [a[2], b[2], c[2]]]
}

/// 两向量夹角（弧度，范围 [0, π]）
///
/// 零长度向量或含 NaN/inf 分量时返回 `Domain` 错误，不会产生 NaN。
pub fn angle_between(u: [f64; 3], v: [f64; 3]) -> Result<f64> {
    if u.iter().chain(v.iter()).any(|x| !x.is_finite()) {
        return Err(QcioError::Domain(format!(
            "Non-finite component in {:?} or {:?}",
            u, v
        )));
    }

    let nu = norm(u);
    let nv = norm(v);
    if nu == 0.0 || nv == 0.0 {
        return Err(QcioError::Domain(
            "Angle to a zero-length vector is undefined".to_string(),
        ));
    }

    // 浮点误差可能让余弦略超出 [-1, 1]
    let cos = (dot(u, v) / (nu * nv)).clamp(-1.0, 1.0);
    Ok(cos.acos())
}

/// 从晶胞参数 (a, b, c, α, β, γ) 构造 h 矩阵
///
/// `degrees` 为 true 时角度以度为单位，否则为弧度。
pub fn abc_to_hmatrix(
    a: f64,
    b: f64,
    c: f64,
    alpha: f64,
    beta: f64,
    gamma: f64,
    degrees: bool,
) -> Result<HMatrix> {
    for (name, length) in [("a", a), ("b", b), ("c", c)] {
        if !length.is_finite() || length <= 0.0 {
            return Err(QcioError::Domain(format!(
                "Cell length {} must be positive, got {}",
                name, length
            )));
        }
    }

    let (alpha, beta, gamma) = if degrees {
        (alpha.to_radians(), beta.to_radians(), gamma.to_radians())
    } else {
        (alpha, beta, gamma)
    };
    for angle in [alpha, beta, gamma] {
        if !angle.is_finite() || angle <= 0.0 || angle >= std::f64::consts::PI {
            return Err(QcioError::Domain(format!(
                "Cell angle must lie in (0, 180) degrees, got {} rad",
                angle
            )));
        }
    }

    let cos_alpha = alpha.cos();
    let cos_beta = beta.cos();
    let cos_gamma = gamma.cos();
    let sin_gamma = gamma.sin();

    let a_vec = [a, 0.0, 0.0];
    let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

    let c1 = c * cos_beta;
    let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
    let c3_sq = c * c - c1 * c1 - c2 * c2;
    if c3_sq <= 0.0 {
        return Err(QcioError::Domain(
            "Cell angles do not describe a three-dimensional cell".to_string(),
        ));
    }
    let c_vec = [c1, c2, c3_sq.sqrt()];

    Ok(hmatrix_from_columns(a_vec, b_vec, c_vec))
}

/// 从 h 矩阵计算晶胞参数
///
/// 长度为列向量模长；α=∠(b,c)，β=∠(a,c)，γ=∠(a,b)。
pub fn hmatrix_to_abc(h: &HMatrix, degrees: bool) -> Result<CellParameters> {
    let a_vec = lattice_vector(h, 0);
    let b_vec = lattice_vector(h, 1);
    let c_vec = lattice_vector(h, 2);

    let mut alpha = angle_between(b_vec, c_vec)?;
    let mut beta = angle_between(a_vec, c_vec)?;
    let mut gamma = angle_between(a_vec, b_vec)?;
    if degrees {
        alpha = alpha.to_degrees();
        beta = beta.to_degrees();
        gamma = gamma.to_degrees();
    }

    Ok(CellParameters {
        a: norm(a_vec),
        b: norm(b_vec),
        c: norm(c_vec),
        alpha,
        beta,
        gamma,
    })
}

/// 行列式（有符号）
pub fn determinant(h: &HMatrix) -> f64 {
    h[0][0] * (h[1][1] * h[2][2] - h[1][2] * h[2][1])
        - h[0][1] * (h[1][0] * h[2][2] - h[1][2] * h[2][0])
        + h[0][2] * (h[1][0] * h[2][1] - h[1][1] * h[2][0])
}

/// 晶胞体积 |det h|
pub fn cell_volume(h: &HMatrix) -> f64 {
    determinant(h).abs()
}

/// h 矩阵求逆（伴随矩阵法）
pub fn invert_hmatrix(h: &HMatrix) -> Result<HMatrix> {
    let det = determinant(h);
    let scale = (0..3).map(|i| norm(lattice_vector(h, i))).product::<f64>();
    if !det.is_finite() || det.abs() <= f64::EPSILON * scale || scale == 0.0 {
        return Err(QcioError::Domain(
            "Lattice matrix is singular".to_string(),
        ));
    }

    let m = h;
    Ok([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
        ],
    ])
}

fn apply(m: &HMatrix, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// 分数坐标转笛卡尔坐标（单点）
pub fn frac_to_cart(frac: [f64; 3], h: &HMatrix) -> [f64; 3] {
    apply(h, frac)
}

/// 笛卡尔坐标转分数坐标（单点）
pub fn cart_to_frac(cart: [f64; 3], h: &HMatrix) -> Result<[f64; 3]> {
    Ok(apply(&invert_hmatrix(h)?, cart))
}

/// 批量分数坐标转笛卡尔坐标
pub fn scaled_to_cartesian(frac: &[[f64; 3]], h: &HMatrix) -> Vec<[f64; 3]> {
    frac.iter().map(|&f| apply(h, f)).collect()
}

/// 批量笛卡尔坐标转分数坐标
pub fn cartesian_to_scaled(cart: &[[f64; 3]], h: &HMatrix) -> Result<Vec<[f64; 3]>> {
    let inv = invert_hmatrix(h)?;
    Ok(cart.iter().map(|&c| apply(&inv, c)).collect())
}
