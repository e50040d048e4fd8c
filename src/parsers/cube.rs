//! # Gaussian cube 体数据格式
//!
//! 解析与写出 cube 文件：原子坐标 + 三维标量场。
//!
//! ## cube 格式说明
//! ```text
//! Comment line 1
//! Comment line 2
//! NATOMS  ox oy oz          # 原子数 + 网格原点
//! NX      x1 x2 x3          # 第一轴：点数 + 体素向量
//! NY      y1 y2 y3
//! NZ      z1 z2 z3
//! Z  charge  x y z          # NATOMS 行原子
//! ...
//! v v v v v v               # NX·NY·NZ 个数值，第一轴最慢、最后一轴最快
//! ```
//!
//! 点数为正时体素向量以 Bohr 为单位，导出 h 矩阵、体素体积与体素位置时乘以
//! [`BOHR_TO_ANGSTROM`]；点数为负时已是 Å。原子坐标始终按 Å 处理，不做换算。
//!
//! ## 依赖关系
//! - 被调用方直接使用
//! - 使用 `geometry/lattice.rs` 计算体积与组装 h 矩阵
//! - 使用 `units.rs`

use crate::error::{QcioError, Result};
use crate::geometry::{self, HMatrix};
use crate::parsers::{self, HoldsCoordinates, HoldsUnitCell};
use crate::units::BOHR_TO_ANGSTROM;

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

const FORMAT: &str = "cube";

/// 每行最多写出的场数值个数
const VALUES_PER_LINE: usize = 6;

/// 网格轴：带符号的点数 + 单个体素的步长向量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    /// 正数表示向量为 Bohr，负数表示 Å
    pub count: i64,
    pub vector: [f64; 3],
}

impl GridAxis {
    /// 沿该轴的网格点数
    pub fn points(&self) -> usize {
        self.count.unsigned_abs() as usize
    }

    /// 单位换算因子
    fn unit_factor(&self) -> f64 {
        if self.count > 0 {
            BOHR_TO_ANGSTROM
        } else {
            1.0
        }
    }

    /// 以 Å 表示的体素向量
    pub fn voxel_vector(&self) -> [f64; 3] {
        let factor = self.unit_factor();
        self.vector.map(|x| x * factor)
    }
}

/// cube 文件中的原子行
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubeAtom {
    pub atomic_number: i32,
    pub charge: f64,
    pub position: [f64; 3],
}

/// cube 文件
#[derive(Debug, Clone, PartialEq)]
pub struct CubeFile {
    comments: [String; 2],
    /// 原子数行是否带负号（写出时保持）
    negative_atom_count: bool,
    origin: [f64; 3],
    axes: [GridAxis; 3],
    atoms: Vec<CubeAtom>,
    data: Vec<f64>,
}

impl CubeFile {
    /// 解析 cube 文件，文件在返回前关闭
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = parsers::read_file(path)?;
        Self::parse_content(&content)
    }

    /// 从调用方的句柄解析；句柄不会被关闭
    pub fn from_reader<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let content = parsers::read_handle(reader)?;
        Self::parse_content(&content)
    }

    /// 从字符串内容解析
    pub fn parse_content(content: &str) -> Result<Self> {
        let mut lines = content.lines().enumerate().map(|(i, l)| (i + 1, l));
        let mut consumed = 0;
        let mut next_line = |what: &str| match lines.next() {
            Some((lineno, line)) => {
                consumed = lineno;
                Ok((lineno, line))
            }
            None => Err(QcioError::parse(
                FORMAT,
                consumed + 1,
                format!("Input ended before {}", what),
            )),
        };

        let (_, first) = next_line("the first comment line")?;
        let (_, second) = next_line("the second comment line")?;
        let comments = [first.to_string(), second.to_string()];

        let (lineno, line) = next_line("the atom count line")?;
        let (atom_count, origin) = parse_count_line(line, lineno)?;

        let mut axes = [GridAxis {
            count: 0,
            vector: [0.0; 3],
        }; 3];
        let mut grid_line = 0;
        for axis in axes.iter_mut() {
            let (lineno, line) = next_line("all grid axes were read")?;
            grid_line = lineno;
            let (count, vector) = parse_count_line(line, lineno)?;
            if count == 0 {
                return Err(QcioError::parse(FORMAT, lineno, "Grid axis has zero points"));
            }
            *axis = GridAxis { count, vector };
        }

        // 头部计数未经验证，不据此预分配
        let natoms = atom_count.unsigned_abs();
        let mut atoms = Vec::new();
        for _ in 0..natoms {
            let (lineno, line) = next_line("all atom lines were read")?;
            atoms.push(parse_atom_line(line, lineno)?);
        }

        let expected = axes
            .iter()
            .try_fold(1usize, |total, axis| total.checked_mul(axis.points()))
            .ok_or_else(|| {
                QcioError::parse(FORMAT, grid_line, "Declared grid size overflows")
            })?;
        let mut data = Vec::new();
        for (lineno, line) in lines {
            for token in line.split_whitespace() {
                let value: f64 = parse_token(token, lineno)?;
                if data.len() == expected {
                    return Err(QcioError::IndexOutOfBounds(format!(
                        "Field data exceeds the declared {} values (line {})",
                        expected, lineno
                    )));
                }
                data.push(value);
            }
        }
        if data.len() < expected {
            return Err(QcioError::IndexOutOfBounds(format!(
                "Field data exhausted after {} of {} values",
                data.len(),
                expected
            )));
        }

        debug!(
            "Parsed cube file: {} atoms, {}x{}x{} grid",
            atoms.len(),
            axes[0].points(),
            axes[1].points(),
            axes[2].points()
        );

        Ok(CubeFile {
            comments,
            negative_atom_count: atom_count < 0,
            origin,
            axes,
            atoms,
            data,
        })
    }

    /// 原子数
    pub fn count_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// 原子笛卡尔坐标的副本
    pub fn get_coordinates(&self) -> Vec<[f64; 3]> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// 以扁平数组覆盖原子坐标
    pub fn set_coordinates(&mut self, values: &[f64]) -> Result<()> {
        let coords = parsers::chunk_coordinates(values, self.atoms.len())?;
        for (atom, position) in self.atoms.iter_mut().zip(coords) {
            atom.position = position;
        }
        Ok(())
    }

    /// 原子序数
    pub fn get_atomic_numbers(&self) -> Vec<i32> {
        self.atoms.iter().map(|a| a.atomic_number).collect()
    }

    pub fn get_origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn get_axes(&self) -> &[GridAxis; 3] {
        &self.axes
    }

    /// 扁平标量场（第一轴最慢）
    pub fn get_data(&self) -> &[f64] {
        &self.data
    }

    pub fn get_xlen(&self) -> usize {
        self.axes[0].points()
    }

    pub fn get_ylen(&self) -> usize {
        self.axes[1].points()
    }

    pub fn get_zlen(&self) -> usize {
        self.axes[2].points()
    }

    fn flat_index(&self, i: usize, j: usize, k: usize) -> Result<usize> {
        let (nx, ny, nz) = (self.get_xlen(), self.get_ylen(), self.get_zlen());
        if i >= nx || j >= ny || k >= nz {
            return Err(QcioError::IndexOutOfBounds(format!(
                "Grid point ({}, {}, {}) outside of {}x{}x{} grid",
                i, j, k, nx, ny, nz
            )));
        }
        Ok((i * ny + j) * nz + k)
    }

    /// 网格点 (i, j, k) 上的数值
    pub fn get_val(&self, i: usize, j: usize, k: usize) -> Result<f64> {
        Ok(self.data[self.flat_index(i, j, k)?])
    }

    /// 网格点的笛卡尔位置；`centered` 时偏移半个体素
    pub fn get_voxel_pos(&self, i: usize, j: usize, k: usize, centered: bool) -> [f64; 3] {
        let shift = if centered { 0.5 } else { 0.0 };
        let mut pos = self.origin;
        for (axis, index) in self.axes.iter().zip([i, j, k]) {
            let step = axis.voxel_vector();
            for d in 0..3 {
                pos[d] += (index as f64 + shift) * step[d];
            }
        }
        pos
    }

    /// 整个网格对应的 h 矩阵（Å）
    pub fn get_h_matrix(&self) -> HMatrix {
        let column = |axis: &GridAxis| axis.voxel_vector().map(|x| x * axis.points() as f64);
        geometry::hmatrix_from_columns(
            column(&self.axes[0]),
            column(&self.axes[1]),
            column(&self.axes[2]),
        )
    }

    /// 单个体素的体积（Å³）
    pub fn get_voxel_volume(&self) -> f64 {
        geometry::cell_volume(&geometry::hmatrix_from_columns(
            self.axes[0].voxel_vector(),
            self.axes[1].voxel_vector(),
            self.axes[2].voxel_vector(),
        ))
    }

    /// 原子坐标沿 `axis` 的 (最小值, 最大值)
    ///
    /// `absolute` 为 false 时相对于网格原点。
    pub fn get_projection(&self, axis: usize, absolute: bool) -> Result<(f64, f64)> {
        check_axis(axis)?;
        if self.atoms.is_empty() {
            return Err(QcioError::InvalidValue(
                "Cube file has no atoms to project".to_string(),
            ));
        }

        let offset = if absolute { 0.0 } else { self.origin[axis] };
        let (min, max) = self
            .atoms
            .iter()
            .map(|a| a.position[axis] - offset)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                (lo.min(x), hi.max(x))
            });
        Ok((min, max))
    }

    /// 标量场在 `axis` 上的投影：对另外两轴求和
    ///
    /// `absolute` 为 true 时累加绝对值。
    pub fn get_field_projection(&self, axis: usize, absolute: bool) -> Result<Vec<f64>> {
        check_axis(axis)?;
        let (ny, nz) = (self.get_ylen(), self.get_zlen());
        let mut projection = vec![0.0; self.axes[axis].points()];

        for (flat, &value) in self.data.iter().enumerate() {
            let index = [flat / (ny * nz), (flat / nz) % ny, flat % nz];
            projection[index[axis]] += if absolute { value.abs() } else { value };
        }
        Ok(projection)
    }

    /// 写出到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        parsers::write_file(path, &self.to_string())
    }
}

fn check_axis(axis: usize) -> Result<()> {
    if axis > 2 {
        return Err(QcioError::IndexOutOfBounds(format!(
            "Grid axis {} does not exist",
            axis
        )));
    }
    Ok(())
}

fn parse_token<T: FromStr>(token: &str, lineno: usize) -> Result<T> {
    token
        .parse()
        .map_err(|_| QcioError::parse(FORMAT, lineno, format!("Invalid number '{}'", token)))
}

/// 解析 "计数 x y z" 行（原子数行与网格轴行）
fn parse_count_line(line: &str, lineno: usize) -> Result<(i64, [f64; 3])> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 4 {
        return Err(QcioError::parse(
            FORMAT,
            lineno,
            format!("Expected a count and three numbers, found {} fields", parts.len()),
        ));
    }

    let count = parse_token(parts[0], lineno)?;
    let vector = [
        parse_token(parts[1], lineno)?,
        parse_token(parts[2], lineno)?,
        parse_token(parts[3], lineno)?,
    ];
    Ok((count, vector))
}

/// 解析 "Z charge x y z" 原子行
fn parse_atom_line(line: &str, lineno: usize) -> Result<CubeAtom> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 5 {
        return Err(QcioError::parse(
            FORMAT,
            lineno,
            format!("Expected 'Z charge x y z', found {} fields", parts.len()),
        ));
    }

    Ok(CubeAtom {
        atomic_number: parse_token(parts[0], lineno)?,
        charge: parse_token(parts[1], lineno)?,
        position: [
            parse_token(parts[2], lineno)?,
            parse_token(parts[3], lineno)?,
            parse_token(parts[4], lineno)?,
        ],
    })
}

/// C 风格科学计数法：1.000000e+00
fn format_scientific(value: f64) -> String {
    let raw = format!("{:.6e}", value);
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => raw,
    }
}

/// 原点与网格向量：能以 6 位小数精确表示时用定宽格式，否则写出最短的可还原表示
fn format_grid_value(value: f64) -> String {
    let fixed = format!("{:12.6}", value);
    if fixed.trim().parse::<f64>().ok() == Some(value) {
        fixed
    } else {
        format!("{:12}", value)
    }
}

impl fmt::Display for CubeFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.comments[0])?;
        writeln!(f, "{}", self.comments[1])?;

        let natoms = self.atoms.len() as i64;
        let natoms = if self.negative_atom_count { -natoms } else { natoms };
        writeln!(
            f,
            "{:5} {}",
            natoms,
            self.origin.iter().map(|&x| format_grid_value(x)).join(" ")
        )?;
        for axis in &self.axes {
            writeln!(
                f,
                "{:5} {}",
                axis.count,
                axis.vector.iter().map(|&x| format_grid_value(x)).join(" ")
            )?;
        }
        for atom in &self.atoms {
            writeln!(
                f,
                "{:5} {:12.6} {:12.6} {:12.6} {:12.6}",
                atom.atomic_number, atom.charge, atom.position[0], atom.position[1], atom.position[2]
            )?;
        }

        // 每条最快轴的数据单独分组，组内每行至多 6 个数
        for row in self.data.chunks(self.get_zlen()) {
            for values in row.chunks(VALUES_PER_LINE) {
                writeln!(f, "{}", values.iter().map(|&v| format_scientific(v)).join(" "))?;
            }
        }
        Ok(())
    }
}

impl FromStr for CubeFile {
    type Err = QcioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_content(s)
    }
}

impl HoldsCoordinates for CubeFile {
    fn count_atoms(&self) -> usize {
        CubeFile::count_atoms(self)
    }

    fn get_coordinates(&self) -> Vec<[f64; 3]> {
        CubeFile::get_coordinates(self)
    }

    fn set_coordinates(&mut self, values: &[f64]) -> Result<()> {
        CubeFile::set_coordinates(self, values)
    }
}

impl HoldsUnitCell for CubeFile {
    fn get_h_matrix(&self) -> Result<HMatrix> {
        Ok(CubeFile::get_h_matrix(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SIMPLE: &str = "HEADER 1
HEADER 2
1 0 0 0
-1 1 0 0
-1 0 2 0
-1 0 0 3
12 0 1 2 3
1
";

    const SIMPLE_TWO_ATOMS: &str = "HEADER 1
HEADER 2
2 0 0 0
-1 1 0 0
-1 0 2 0
-1 0 0 3
12 0 1 2 3
12 0 2 3 4
1
";

    const SURPLUS_VALUES: &str = "HEADER 1
HEADER 2
2 0 0 0
-1 1 0 0
-1 0 2 0
-1 0 0 3
12 0 1 2 3
12 0 2 3 4
1 1 1 1 1 1 1
";

    const MIXED_UNITS: &str = "HEADER 1
HEADER 2
1 0 0 0
1 1 0 0
-1 0 1 0
1 0 0 1
12 0 1 2 3
1
";

    const PROJECTION: &str = "HEADER 1
HEADER 2
1 0 0 0
-2 1 0 0
-2 0 1 0
-1 0 0 1
12 0 1 2 3
1 -2 3 -4
";

    const ROW_OF_FIVE: &str = "HEADER 1
HEADER 2
1 0 0 0
1 1 0 0
1 0 1 0
5 0 0 1
12 0 0 0 0
1 1 1 1 1";

    fn quickstep() -> String {
        let mut content = String::from(
            "-Quickstep-
 HARTREE POTENTIAL
  1    0.000000    0.000000    0.000000
  10    0.154626    0.000154    0.004382
  10   -0.077234    0.134457   -0.001403
  10    0.004438    0.000880    0.155833
  1 0 0 0 0
  ",
        );
        content.push_str(&"1 ".repeat(1000));
        content
    }

    #[test]
    fn test_count_atoms() {
        assert_eq!(SIMPLE.parse::<CubeFile>().unwrap().count_atoms(), 1);
        assert_eq!(SIMPLE_TWO_ATOMS.parse::<CubeFile>().unwrap().count_atoms(), 2);
    }

    #[test]
    fn test_get_coordinates() {
        let cube: CubeFile = SIMPLE.parse().unwrap();
        assert_eq!(cube.get_coordinates(), vec![[1.0, 2.0, 3.0]]);
        assert_eq!(cube.get_atomic_numbers(), vec![12]);
    }

    #[test]
    fn test_get_coordinates_is_a_copy() {
        let cube: CubeFile = MIXED_UNITS.parse().unwrap();
        let mut coords = cube.get_coordinates();
        coords[0][0] += 1.0;
        assert_eq!(cube.get_coordinates()[0][0], 1.0);
    }

    #[test]
    fn test_set_coordinates_validates_length() {
        let mut cube: CubeFile = MIXED_UNITS.parse().unwrap();
        assert!(matches!(
            cube.set_coordinates(&[0.0, 0.0]),
            Err(QcioError::InvalidValue(_))
        ));
        assert!(matches!(
            cube.set_coordinates(&[0.0; 4]),
            Err(QcioError::InvalidValue(_))
        ));

        cube.set_coordinates(&[0.0, 0.5, 1.0]).unwrap();
        assert_eq!(cube.get_coordinates(), vec![[0.0, 0.5, 1.0]]);
    }

    #[test]
    fn test_voxel_volume() {
        let cube: CubeFile = SIMPLE.parse().unwrap();
        assert!((cube.get_voxel_volume() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_get_val() {
        let cube: CubeFile = SIMPLE.parse().unwrap();
        assert_eq!(cube.get_val(0, 0, 0).unwrap(), 1.0);
        assert!(matches!(
            cube.get_val(1, 0, 0),
            Err(QcioError::IndexOutOfBounds(_))
        ));
    }

    #[test]
    fn test_get_val_order() {
        // 第一轴最慢：(i, j, k) -> (i·NY + j)·NZ + k
        let cube: CubeFile = PROJECTION.parse().unwrap();
        assert_eq!(cube.get_val(0, 0, 0).unwrap(), 1.0);
        assert_eq!(cube.get_val(0, 1, 0).unwrap(), -2.0);
        assert_eq!(cube.get_val(1, 0, 0).unwrap(), 3.0);
        assert_eq!(cube.get_val(1, 1, 0).unwrap(), -4.0);
        assert!(cube.get_val(0, 0, 1).is_err());
    }

    #[test]
    fn test_get_voxel_pos() {
        let cube: CubeFile = SIMPLE.parse().unwrap();
        assert_eq!(cube.get_voxel_pos(0, 0, 0, true), [0.5, 1.0, 1.5]);
        assert_eq!(cube.get_voxel_pos(0, 0, 0, false), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_units() {
        let cube: CubeFile = MIXED_UNITS.parse().unwrap();
        assert_eq!(cube.get_xlen(), 1);
        assert_eq!(cube.get_ylen(), 1);
        assert_eq!(cube.get_zlen(), 1);

        let h = cube.get_h_matrix();
        assert!((h[0][0] - 0.529).abs() < 1e-3);
        assert_eq!(h[1][1], 1.0);
        assert!((h[2][2] - 0.529).abs() < 1e-3);
        for (row, values) in h.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                if row != col {
                    assert_eq!(*value, 0.0);
                }
            }
        }
        assert!((cube.get_voxel_volume() - 0.280).abs() < 1e-3);

        // 原子坐标不做单位换算
        assert_eq!(cube.get_coordinates(), vec![[1.0, 2.0, 3.0]]);
    }

    #[test]
    fn test_quickstep_h_matrix() {
        let cube: CubeFile = quickstep().parse().unwrap();
        let h = cube.get_h_matrix();
        let reference = [
            [8.18245553e-01, -4.08704726e-01, 2.34848846e-02],
            [8.14932903e-04, 7.11515801e-01, 4.65675945e-03],
            [2.31885453e-02, -7.42435626e-03, 8.24632722e-01],
        ];
        for (row, ref_row) in h.iter().zip(reference.iter()) {
            for (value, expected) in row.iter().zip(ref_row.iter()) {
                assert!((value - expected).abs() < 1e-6);
            }
        }
        assert_eq!(cube.get_data().len(), 1000);
    }

    #[test]
    fn test_string_round_trip() {
        let cube: CubeFile = MIXED_UNITS.parse().unwrap();
        let cube2: CubeFile = cube.to_string().parse().unwrap();

        assert_eq!(cube.get_coordinates(), cube2.get_coordinates());
        assert_eq!(cube.get_data(), cube2.get_data());
        assert!((cube.get_voxel_volume() - cube2.get_voxel_volume()).abs() < 1e-6);
        assert_eq!(cube.get_xlen(), cube2.get_xlen());
        assert_eq!(cube.get_ylen(), cube2.get_ylen());
        assert_eq!(cube.get_zlen(), cube2.get_zlen());
    }

    #[test]
    fn test_string_representation_layout() {
        let cube: CubeFile = ROW_OF_FIVE.parse().unwrap();
        let text = cube.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "HEADER 1");
        assert_eq!(
            lines[lines.len() - 1],
            "1.000000e+00 1.000000e+00 1.000000e+00 1.000000e+00 1.000000e+00"
        );
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_string_representation_wraps_long_rows() {
        let cube: CubeFile = quickstep().parse().unwrap();
        let text = cube.to_string();
        let data_lines: Vec<&str> = text.lines().skip(7).collect();

        // 每行 10 个数 -> 6 + 4
        assert_eq!(data_lines.len(), 200);
        assert_eq!(data_lines[0].split_whitespace().count(), 6);
        assert_eq!(data_lines[1].split_whitespace().count(), 4);
    }

    #[test]
    fn test_precise_grid_vectors_survive_serialization() {
        let precise = SIMPLE
            .replacen("-1 1 0 0", "-1 0.1234567891 0 0", 1)
            .replacen("1 0 0 0", "1 0.25 0.000000123 0", 1);
        let cube: CubeFile = precise.parse().unwrap();
        let text = cube.to_string();
        let again: CubeFile = text.parse().unwrap();

        assert_eq!(cube.get_voxel_volume(), again.get_voxel_volume());
        assert_eq!(cube.get_origin(), again.get_origin());
        // 6 位小数可精确表示的值仍按定宽写出
        assert!(text.lines().nth(4).unwrap().contains("    2.000000"));
    }

    #[test]
    fn test_format_scientific() {
        assert_eq!(format_scientific(1.0), "1.000000e+00");
        assert_eq!(format_scientific(-0.00125), "-1.250000e-03");
        assert_eq!(format_scientific(123456.0), "1.234560e+05");
        assert_eq!(format_scientific(0.0), "0.000000e+00");
    }

    #[test]
    fn test_get_projection_of_atoms() {
        let cube: CubeFile = SIMPLE_TWO_ATOMS.parse().unwrap();
        assert_eq!(cube.get_projection(0, true).unwrap(), (1.0, 2.0));
        assert_eq!(cube.get_projection(2, true).unwrap(), (3.0, 4.0));

        let shifted = SIMPLE_TWO_ATOMS.replacen("2 0 0 0", "2 0.5 1 1", 1);
        let cube: CubeFile = shifted.parse().unwrap();
        assert_eq!(cube.get_projection(1, false).unwrap(), (1.0, 2.0));
        assert_eq!(cube.get_projection(1, true).unwrap(), (2.0, 3.0));
        assert!(matches!(
            cube.get_projection(3, true),
            Err(QcioError::IndexOutOfBounds(_))
        ));
    }

    #[test]
    fn test_get_field_projection() {
        let cube: CubeFile = PROJECTION.parse().unwrap();

        assert_eq!(cube.get_field_projection(2, false).unwrap()[0], -2.0);
        assert_eq!(cube.get_field_projection(2, true).unwrap()[0], 10.0);
        assert_eq!(cube.get_field_projection(1, false).unwrap()[0], 4.0);
        assert_eq!(cube.get_field_projection(1, true).unwrap()[1], 6.0);
        assert_eq!(cube.get_field_projection(0, false).unwrap()[0], -1.0);
        assert_eq!(cube.get_field_projection(0, true).unwrap()[1], 7.0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            " ".parse::<CubeFile>(),
            Err(QcioError::ParseError { line: 2, .. })
        ));

        let lines: Vec<&str> = PROJECTION.lines().collect();
        let with_line = |index: usize, replacement: &str| {
            let mut copy = lines.clone();
            copy[index] = replacement;
            copy.join("\n")
        };

        // 原子数行为空
        assert!(matches!(
            with_line(2, "").parse::<CubeFile>(),
            Err(QcioError::ParseError { line: 3, .. })
        ));
        // 非数值计数
        assert!(matches!(
            with_line(3, "a 1 1 1").parse::<CubeFile>(),
            Err(QcioError::ParseError { line: 4, .. })
        ));
        // 字段过多
        assert!(matches!(
            with_line(3, "1 1 1 1 1").parse::<CubeFile>(),
            Err(QcioError::ParseError { .. })
        ));
        // 场数据中的非数值
        assert!(matches!(
            with_line(7, "a a a a").parse::<CubeFile>(),
            Err(QcioError::ParseError { line: 8, .. })
        ));
        // 原子行被截断
        assert!(matches!(
            "H\nH\n2 0 0 0\n-1 1 0 0\n-1 0 1 0\n-1 0 0 1\n1 0 0 0 0\n".parse::<CubeFile>(),
            Err(QcioError::ParseError { line: 8, .. })
        ));
    }

    #[test]
    fn test_huge_declared_grid_fails_cleanly() {
        let header = |count: i64| {
            format!(
                "H\nH\n0 0 0 0\n{c} 1 0 0\n{c} 0 1 0\n{c} 0 0 1\n1\n",
                c = count
            )
        };

        // 10^15 个点但只有一个数值
        assert!(matches!(
            header(-100_000).parse::<CubeFile>(),
            Err(QcioError::IndexOutOfBounds(_))
        ));
        // 10^21 个点超出 usize
        assert!(matches!(
            header(-10_000_000).parse::<CubeFile>(),
            Err(QcioError::ParseError { line: 6, .. })
        ));
        // 原子数巨大但原子行缺失
        assert!(matches!(
            "H\nH\n1000000000000 0 0 0\n-1 1 0 0\n-1 0 1 0\n-1 0 0 1\n".parse::<CubeFile>(),
            Err(QcioError::ParseError { line: 7, .. })
        ));
    }

    #[test]
    fn test_field_size_mismatch_is_a_bounds_error() {
        assert!(matches!(
            SURPLUS_VALUES.parse::<CubeFile>(),
            Err(QcioError::IndexOutOfBounds(_))
        ));

        let short = PROJECTION.replace("1 -2 3 -4", "1");
        assert!(matches!(
            short.parse::<CubeFile>(),
            Err(QcioError::IndexOutOfBounds(_))
        ));
    }

    #[test]
    fn test_from_reader_and_file() {
        let mut cursor = Cursor::new(SIMPLE.as_bytes());
        let cube = CubeFile::from_reader(&mut cursor).unwrap();
        assert_eq!(cube.count_atoms(), 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("density.cube");
        cube.save(&path).unwrap();
        let reloaded = CubeFile::from_file(&path).unwrap();
        assert_eq!(reloaded.get_coordinates(), cube.get_coordinates());
        assert_eq!(reloaded.get_data(), cube.get_data());
    }

    #[test]
    fn test_negative_atom_count_is_preserved() {
        let cube: CubeFile = SIMPLE.replacen("1 0 0 0", "-1 0 0 0", 1).parse().unwrap();
        assert_eq!(cube.count_atoms(), 1);
        assert!(cube.to_string().lines().nth(2).unwrap().trim_start().starts_with("-1"));
    }

    #[test]
    fn test_capabilities() {
        let mut cube: CubeFile = SIMPLE.parse().unwrap();
        let holder: &mut dyn HoldsCoordinates = &mut cube;
        assert_eq!(holder.count_atoms(), 1);
        holder.set_coordinates(&[3.0, 2.0, 1.0]).unwrap();

        let cell: &dyn HoldsUnitCell = &cube;
        let h = cell.get_h_matrix().unwrap();
        assert_eq!(h[1][1], 2.0);
        assert_eq!(cube.get_coordinates(), vec![[3.0, 2.0, 1.0]]);
    }
}
