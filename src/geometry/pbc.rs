//! # 周期性边界与超胞
//!
//! 最小镜像距离、超胞复制以及晶胞包围盒等辅助函数。
//!
//! ## 依赖关系
//! - 被调用方直接使用（超胞工具、RDF 分析等）
//! - 使用 `geometry/lattice.rs`

use crate::error::{QcioError, Result};
use crate::geometry::lattice::{
    add, cart_to_frac, cartesian_to_scaled, cell_volume, cross, frac_to_cart, hmatrix_from_columns,
    lattice_vector, norm, scaled_to_cartesian, sub, HMatrix, IDENTITY,
};
use itertools::iproduct;

/// 超胞倍数
///
/// 倍数必须是 ≥ 1 的整数。浮点数只有在恰好为整数时才被接受，
/// 因此 `-1` 与 `1.1` 都会得到 `InvalidValue`。
pub trait Multiplier: Copy {
    fn repeat_count(self) -> Result<usize>;
}

macro_rules! impl_integer_multiplier {
    ($($t:ty),*) => {
        $(
            impl Multiplier for $t {
                fn repeat_count(self) -> Result<usize> {
                    usize::try_from(self)
                        .ok()
                        .filter(|&n| n >= 1)
                        .ok_or_else(|| {
                            QcioError::InvalidValue(format!(
                                "Multiplier has to be a positive integer, got {}",
                                self
                            ))
                        })
                }
            }
        )*
    };
}

impl_integer_multiplier!(i32, i64, u32, u64, usize);

impl Multiplier for f64 {
    fn repeat_count(self) -> Result<usize> {
        if self.is_finite() && self >= 1.0 && self.fract() == 0.0 && self <= u32::MAX as f64 {
            Ok(self as usize)
        } else {
            Err(QcioError::InvalidValue(format!(
                "Multiplier has to be a positive integer, got {}",
                self
            )))
        }
    }
}

/// 枚举超胞内全部平移向量 i·a + j·b + k·c
///
/// 顺序：i 最慢，k 最快，与 `cell_multiply` 的输出一致。
pub fn repeat_vector(h: &HMatrix, nx: usize, ny: usize, nz: usize) -> Vec<[f64; 3]> {
    iproduct!(0..nx, 0..ny, 0..nz)
        .map(|(i, j, k)| frac_to_cart([i as f64, j as f64, k as f64], h))
        .collect()
}

/// 沿晶格向量复制坐标得到 nx×ny×nz 超胞
///
/// - `scaling_in`: 输入为分数坐标
/// - `scaling_out`: 输出为新超胞 (nx·a, ny·b, nz·c) 的分数坐标
///
/// 输出按镜像分组：每个平移镜像内原子保持输入顺序。
/// 输入输出均为分数坐标时不需要 h 矩阵，其余情况缺少 h 矩阵返回 `InvalidValue`。
pub fn cell_multiply<M: Multiplier>(
    coords: &[[f64; 3]],
    nx: M,
    ny: M,
    nz: M,
    h_matrix: Option<&HMatrix>,
    scaling_in: bool,
    scaling_out: bool,
) -> Result<Vec<[f64; 3]>> {
    let (nx, ny, nz) = (nx.repeat_count()?, ny.repeat_count()?, nz.repeat_count()?);

    // 纯分数坐标的复制在单位晶格中完成
    let h = if scaling_in && scaling_out {
        IDENTITY
    } else {
        *h_matrix.ok_or_else(|| {
            QcioError::InvalidValue(
                "An h matrix is required unless input and output are both scaled".to_string(),
            )
        })?
    };

    let base = if scaling_in {
        scaled_to_cartesian(coords, &h)
    } else {
        coords.to_vec()
    };

    let translations = repeat_vector(&h, nx, ny, nz);
    let mut multiplied = Vec::with_capacity(base.len() * translations.len());
    for shift in &translations {
        multiplied.extend(base.iter().map(|&p| add(p, *shift)));
    }

    if scaling_out {
        let scale = |axis: usize, n: usize| lattice_vector(&h, axis).map(|x| x * n as f64);
        let supercell = hmatrix_from_columns(scale(0, nx), scale(1, ny), scale(2, nz));
        cartesian_to_scaled(&multiplied, &supercell)
    } else {
        Ok(multiplied)
    }
}

/// 周期性边界条件下两点的最小距离
///
/// 先把分数坐标差折叠到 [-0.5, 0.5]，再检查相邻的 27 个镜像；
/// 斜交晶胞中单次折叠得到的镜像未必最近。
pub fn distance_pbc(p: [f64; 3], q: [f64; 3], h: &HMatrix) -> Result<f64> {
    let mut frac = cart_to_frac(sub(q, p), h)?;
    for x in frac.iter_mut() {
        *x -= x.round();
    }

    let best = iproduct!(-1..=1, -1..=1, -1..=1)
        .map(|(i, j, k)| {
            let image = [frac[0] + i as f64, frac[1] + j as f64, frac[2] + k as f64];
            norm(frac_to_cart(image, h))
        })
        .fold(f64::INFINITY, f64::min);

    Ok(best)
}

/// 沿 `axis` 方向覆盖半径为 `radius` 的球所需的最少重复次数
///
/// 依据该方向的晶面间距 d = V / |bⱼ × bₖ|，结果为 ⌈2r / d⌉，至少为 1。
pub fn vector_repetitions(radius: f64, h: &HMatrix, axis: usize) -> Result<usize> {
    if axis > 2 {
        return Err(QcioError::IndexOutOfBounds(format!(
            "Lattice axis {} does not exist",
            axis
        )));
    }
    if !radius.is_finite() || radius < 0.0 {
        return Err(QcioError::Domain(format!(
            "Radius must be a non-negative number, got {}",
            radius
        )));
    }

    let area = norm(cross(
        lattice_vector(h, (axis + 1) % 3),
        lattice_vector(h, (axis + 2) % 3),
    ));
    let volume = cell_volume(h);
    if area == 0.0 || volume == 0.0 {
        return Err(QcioError::Domain("Lattice matrix is singular".to_string()));
    }

    let spacing = volume / area;
    Ok(((2.0 * radius / spacing).ceil() as usize).max(1))
}

/// 分数坐标下的晶胞顶点顺序
const BOX_CORNERS: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0],
    [0.0, 1.0, 1.0],
    [1.0, 1.0, 1.0],
    [1.0, 1.0, 0.0],
    [1.0, 0.0, 1.0],
    [1.0, 0.0, 0.0],
];

/// 平移 (i, j, k) 个晶格向量后的晶胞 8 个顶点
///
/// 顶点顺序（分数坐标）：
/// (0,0,0), (0,0,1), (0,1,0), (0,1,1), (1,1,1), (1,1,0), (1,0,1), (1,0,0)
pub fn box_vertices(h: &HMatrix, i: i64, j: i64, k: i64) -> [[f64; 3]; 8] {
    let offset = [i as f64, j as f64, k as f64];
    BOX_CORNERS.map(|corner| frac_to_cart(add(corner, offset), h))
}

/// 晶胞最长体对角线
pub fn cell_longest_diameter(h: &HMatrix) -> f64 {
    let a = lattice_vector(h, 0);
    let b = lattice_vector(h, 1);
    let c = lattice_vector(h, 2);

    [
        add(add(a, b), c),
        sub(add(a, b), c),
        add(sub(a, b), c),
        add(sub(b, a), c),
    ]
    .into_iter()
    .map(norm)
    .fold(0.0, f64::max)
}
