//! # 解析器模块
//!
//! 提供 cube 体数据、CP2K 输入与 XYZ 坐标文件的解析与序列化。
//!
//! 每个具体格式实现其能提供的能力接口：
//! - [`HoldsCoordinates`]: 原子坐标（cube, xyz）
//! - [`HoldsUnitCell`]: 晶胞 h 矩阵（cube, cp2k_input）
//! - [`HoldsLabels`]: 原子标签（xyz）
//!
//! 按扩展名选择格式的分派逻辑由调用方负责。
//!
//! ## 依赖关系
//! - 使用 `geometry/`, `models/`
//! - 子模块: cube, cp2k_input, xyz

pub mod cp2k_input;
pub mod cube;
pub mod xyz;

use crate::error::{QcioError, Result};
use crate::geometry::HMatrix;
use std::fs;
use std::io::Read;
use std::path::Path;

/// 提供原子坐标的格式
pub trait HoldsCoordinates {
    /// 原子数
    fn count_atoms(&self) -> usize;

    /// 坐标副本，修改返回值不会影响内部状态
    fn get_coordinates(&self) -> Vec<[f64; 3]>;

    /// 以扁平数组 [x0, y0, z0, x1, ...] 覆盖坐标，长度必须为原子数 × 3
    fn set_coordinates(&mut self, values: &[f64]) -> Result<()>;
}

/// 提供晶胞的格式
pub trait HoldsUnitCell {
    /// h 矩阵，列向量为 a, b, c
    fn get_h_matrix(&self) -> Result<HMatrix>;
}

/// 提供原子标签的格式
pub trait HoldsLabels {
    fn get_labels(&self) -> Vec<String>;
}

/// 读取整个文件，文件句柄在返回前关闭
pub(crate) fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| QcioError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 从调用方提供的句柄读取全部内容，句柄的所有权保留在调用方
pub(crate) fn read_handle<R: Read + ?Sized>(reader: &mut R) -> Result<String> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|e| QcioError::FileReadError {
            path: "<reader>".to_string(),
            source: e,
        })?;
    Ok(content)
}

/// 写出文本文件
pub(crate) fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| QcioError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 把扁平坐标数组按三个一组拆分，长度不符时返回 `InvalidValue`
pub(crate) fn chunk_coordinates(values: &[f64], atoms: usize) -> Result<Vec<[f64; 3]>> {
    if values.len() != atoms * 3 {
        return Err(QcioError::InvalidValue(format!(
            "Expected {} coordinate values for {} atoms, got {}",
            atoms * 3,
            atoms,
            values.len()
        )));
    }

    Ok(values
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}
