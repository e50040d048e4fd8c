//! # XYZ 坐标文件
//!
//! 单帧 XYZ 文件的解析与写出。
//!
//! ## XYZ 格式说明
//! ```text
//! <原子数>
//! <注释行>
//! <标签> <x> <y> <z>
//! ...
//! ```
//!
//! 坐标单位为 Å，原样保存。原子行之后出现非空内容视为多帧文件，不予支持。
//!
//! ## 依赖关系
//! - 被调用方直接使用
//! - 使用 `models/structure.rs` 的 [`Atom`]

use crate::error::{QcioError, Result};
use crate::models::Atom;
use crate::parsers::{self, HoldsCoordinates, HoldsLabels};

use log::debug;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

const FORMAT: &str = "XYZ";

/// XYZ 文件
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Xyz {
    comment: String,
    atoms: Vec<Atom>,
}

impl Xyz {
    pub fn new(comment: impl Into<String>, atoms: Vec<Atom>) -> Self {
        Xyz {
            comment: comment.into(),
            atoms,
        }
    }

    /// 解析 XYZ 文件，文件在返回前关闭
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

        let (_, first) = lines
            .next()
            .ok_or_else(|| QcioError::parse(FORMAT, 1, "Empty input"))?;
        let count: usize = first.trim().parse().map_err(|_| {
            QcioError::parse(
                FORMAT,
                1,
                format!("First line must be the number of atoms, got '{}'", first.trim()),
            )
        })?;

        let (_, comment) = lines
            .next()
            .ok_or_else(|| QcioError::parse(FORMAT, 2, "Missing comment line"))?;

        // 声明的原子数未经验证，不据此预分配
        let mut atoms = Vec::new();
        for index in 0..count {
            let (lineno, line) = lines.next().ok_or_else(|| {
                QcioError::parse(
                    FORMAT,
                    index + 3,
                    format!("Header says {} atoms but found {}", count, index),
                )
            })?;
            atoms.push(parse_atom_line(line, lineno)?);
        }

        if let Some((lineno, _)) = lines.find(|(_, l)| !l.trim().is_empty()) {
            return Err(QcioError::UnsupportedFormat(format!(
                "Content after the last atom on line {}; multi-frame XYZ files are not supported",
                lineno
            )));
        }

        debug!("Parsed XYZ file: {} atoms", atoms.len());

        Ok(Xyz {
            comment: comment.to_string(),
            atoms,
        })
    }

    pub fn count_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn get_labels(&self) -> Vec<String> {
        self.atoms.iter().map(|a| a.label.clone()).collect()
    }

    pub fn get_coordinates(&self) -> Vec<[f64; 3]> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// 以扁平数组覆盖坐标，原子数不变
    pub fn set_coordinates(&mut self, values: &[f64]) -> Result<()> {
        let coords = parsers::chunk_coordinates(values, self.atoms.len())?;
        for (atom, position) in self.atoms.iter_mut().zip(coords) {
            atom.position = position;
        }
        Ok(())
    }

    /// 整体替换标签与坐标
    pub fn set_data(&mut self, labels: Vec<String>, coordinates: &[[f64; 3]]) -> Result<()> {
        if labels.len() != coordinates.len() {
            return Err(QcioError::InvalidValue(format!(
                "Got {} labels for {} coordinates",
                labels.len(),
                coordinates.len()
            )));
        }
        self.atoms = labels
            .into_iter()
            .zip(coordinates)
            .map(|(label, &position)| Atom { label, position })
            .collect();
        Ok(())
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// 写出到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        parsers::write_file(path, &self.to_string())
    }
}

fn parse_atom_line(line: &str, lineno: usize) -> Result<Atom> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 4 {
        return Err(QcioError::parse(
            FORMAT,
            lineno,
            format!("Expected 'label x y z', got '{}'", line.trim()),
        ));
    }

    let mut position = [0.0; 3];
    for (value, token) in position.iter_mut().zip(&parts[1..]) {
        *value = token.parse().map_err(|_| {
            QcioError::parse(FORMAT, lineno, format!("Invalid coordinate '{}'", token))
        })?;
    }
    Ok(Atom::new(parts[0], position))
}

impl fmt::Display for Xyz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.atoms.len())?;
        writeln!(f, "{}", self.comment)?;
        for atom in &self.atoms {
            writeln!(
                f,
                "{:<4} {:>15.8} {:>15.8} {:>15.8}",
                atom.label, atom.position[0], atom.position[1], atom.position[2]
            )?;
        }
        Ok(())
    }
}

impl FromStr for Xyz {
    type Err = QcioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_content(s)
    }
}

impl HoldsCoordinates for Xyz {
    fn count_atoms(&self) -> usize {
        Xyz::count_atoms(self)
    }

    fn get_coordinates(&self) -> Vec<[f64; 3]> {
        Xyz::get_coordinates(self)
    }

    fn set_coordinates(&mut self, values: &[f64]) -> Result<()> {
        Xyz::set_coordinates(self, values)
    }
}

impl HoldsLabels for Xyz {
    fn get_labels(&self) -> Vec<String> {
        Xyz::get_labels(self)
    }
}
