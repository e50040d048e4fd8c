//! # 物理常数
//!
//! 单位换算常数集中定义于此，其他模块不得重复书写字面量。
//!
//! ## 依赖关系
//! - 被 `parsers/cube.rs`, `parsers/cp2k_input.rs` 使用

/// Bohr -> Å
pub const BOHR_TO_ANGSTROM: f64 = 0.529177;

/// Hartree -> eV
///
/// 本库的解析器不使用，供分析电子结构输出（如 PDOS）的调用方换算能量。
pub const HARTREE_TO_EV: f64 = 27.21138505;

/// 将以 Hartree 为单位的能量换算为 eV
pub fn hartree_to_ev(energy: f64) -> f64 {
    energy * HARTREE_TO_EV
}
