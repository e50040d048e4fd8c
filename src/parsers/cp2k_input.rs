//! # CP2K 输入文件解析
//!
//! 将 CP2K 输入解析为段落树，支持路径查询、关键字改写与重新序列化。
//!
//! ## CP2K 输入格式说明
//! ```text
//! &FORCE_EVAL
//!   METHOD Quickstep
//!   &SUBSYS
//!     &CELL
//!       A 10.0 0.0 0.0
//!     &END CELL
//!     &KIND H            # 段落可带参数
//!       ELEMENT H
//!     &END
//!   &END SUBSYS
//! &END FORCE_EVAL
//! ```
//!
//! - `&NAME [参数]` 打开段落，`&END [NAME]` 关闭最内层段落
//! - 以 `#` 或 `!` 开头的行为注释
//! - 其余行为 `KEYWORD VALUE...`，同一段落内关键字可以重复
//!
//! 路径查询形如 `FORCE_EVAL/SUBSYS/CELL/A`，大小写不敏感，`*` 匹配该层所有子节点。
//!
//! ## 依赖关系
//! - 被调用方直接使用
//! - 使用 `geometry/lattice.rs` 处理 ABC 形式的晶胞
//! - 使用 `regex` 识别段落行与单位标记

use crate::error::{QcioError, Result};
use crate::geometry::{self, HMatrix};
use crate::parsers::{self, HoldsUnitCell};
use crate::units::BOHR_TO_ANGSTROM;

use log::{debug, trace};
use regex::Regex;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

const FORMAT: &str = "CP2K input";

/// 每层缩进
const INDENT: &str = "  ";

static END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^&END\b\s*(\S*)").unwrap());

static OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^&(\S+)\s*(.*)$").unwrap());

static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[([A-Za-z_]+)\]$").unwrap());

// ─────────────────────────────────────────────────────────────
// 文档树
// ─────────────────────────────────────────────────────────────

/// 关键字行：名称 + 原始取值文本
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub name: String,
    pub value: String,
}

impl Keyword {
    fn from_line(line: &str) -> Self {
        let line = line.trim();
        match line.split_once(char::is_whitespace) {
            Some((name, value)) => Keyword {
                name: name.to_string(),
                value: value.trim().to_string(),
            },
            None => Keyword {
                name: line.to_string(),
                value: String::new(),
            },
        }
    }

    /// "NAME VALUE" 形式的整行
    pub fn line(&self) -> String {
        if self.value.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.value)
        }
    }
}

/// 段落
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    /// `&KIND H` 中的 `H`
    pub parameter: Option<String>,
    pub children: Vec<Node>,
    /// 源文件中 `&END` 是否带了段落名
    pub closed_with_name: bool,
    /// 打开段落的行号（从 1 开始）
    pub line: usize,
}

impl Section {
    fn keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.children.iter().filter_map(Node::as_keyword)
    }
}

/// 文档树节点
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Section(Section),
    Keyword(Keyword),
    /// 原始注释行（保留原缩进）
    Comment(String),
    Blank,
}

impl Node {
    pub fn as_section(&self) -> Option<&Section> {
        match self {
            Node::Section(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<&Keyword> {
        match self {
            Node::Keyword(k) => Some(k),
            _ => None,
        }
    }
}

/// 路径段是否匹配节点名
fn segment_matches(segment: &str, name: &str) -> bool {
    segment == "*" || segment.eq_ignore_ascii_case(name)
}

// ─────────────────────────────────────────────────────────────
// 查询结果与类型转换
// ─────────────────────────────────────────────────────────────

/// 路径查询的结果
#[derive(Debug, Clone, PartialEq)]
pub enum PathValue {
    /// 唯一的关键字取值
    Single(String),
    /// 重复关键字的全部取值，或整段的 "NAME VALUE" 行
    Multiple(Vec<String>),
}

/// `get_keyword_checked` 的目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeywordKind {
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
}

/// 类型化的关键字取值
#[derive(Debug, Clone, PartialEq)]
pub enum KeywordValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// 复合取值按空白拆分后的记号
    List(Vec<String>),
}

/// 解析 CP2K 逻辑值
///
/// `.T.` / `TRUE` / `T` 为真，`.F.` / `FALSE` / `F` 为假（大小写不敏感）；
/// `None` 返回 `default`。
pub fn boolean(token: Option<&str>, default: bool) -> Result<bool> {
    let Some(token) = token else {
        return Ok(default);
    };
    match token.trim().to_ascii_uppercase().as_str() {
        ".T." | "TRUE" | "T" => Ok(true),
        ".F." | "FALSE" | "F" => Ok(false),
        _ => Err(QcioError::InvalidValue(format!(
            "'{}' is not a logical value",
            token
        ))),
    }
}

/// 浮点数，兼容 Fortran 的 `1.0D-6` 写法
fn parse_float(token: &str) -> Result<f64> {
    token
        .replace(['d', 'D'], "e")
        .parse()
        .map_err(|_| QcioError::InvalidValue(format!("'{}' is not a number", token)))
}

fn cast_token(token: &str, kind: KeywordKind) -> Result<KeywordValue> {
    match kind {
        KeywordKind::Text => Ok(KeywordValue::Text(token.to_string())),
        KeywordKind::Integer => token
            .parse()
            .map(KeywordValue::Integer)
            .map_err(|_| QcioError::InvalidValue(format!("'{}' is not an integer", token))),
        KeywordKind::Float => parse_float(token).map(KeywordValue::Float),
        KeywordKind::Boolean => boolean(Some(token), false).map(KeywordValue::Boolean),
    }
}

// ─────────────────────────────────────────────────────────────
// 序列化选项
// ─────────────────────────────────────────────────────────────

/// 序列化选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// 所有 `&END` 都带上段落名
    pub close_sections: bool,
    /// 输出注释行
    pub keep_comments: bool,
    /// 注释按所在层级缩进；否则保留原样
    pub indent_comments: bool,
    /// 输出源文件中的空行
    pub keep_empty: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            close_sections: false,
            keep_comments: true,
            indent_comments: true,
            keep_empty: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 文档
// ─────────────────────────────────────────────────────────────

/// CP2K 输入文档
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cp2kInput {
    lines: Vec<String>,
    root: Vec<Node>,
}

impl Cp2kInput {
    /// 空文档
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析输入文件，文件在返回前关闭
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
        let mut input = Self::new();
        input.set_lines(content.lines().map(String::from).collect())?;
        Ok(input)
    }

    /// 用新的源行重建文档；失败时文档保持不变
    pub fn set_lines(&mut self, lines: Vec<String>) -> Result<()> {
        let root = build_tree(&lines)?;
        debug!(
            "Parsed CP2K input: {} lines, {} top-level sections",
            lines.len(),
            root.iter().filter(|n| n.as_section().is_some()).count()
        );
        self.lines = lines;
        self.root = root;
        Ok(())
    }

    /// 最近一次解析时的源行
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 顶层节点
    pub fn root(&self) -> &[Node] {
        &self.root
    }

    /// 路径查询
    ///
    /// - 关键字终点：唯一时 `Single`，重复时按出现顺序 `Multiple`
    /// - `*` 终点：所有关键字子节点的 "NAME VALUE" 行
    /// - 段落终点：该段落关键字的 "NAME VALUE" 行
    /// - 路径不存在：`None`
    pub fn get_path(&self, path: &str) -> Result<Option<PathValue>> {
        let segments = split_path(path)?;
        let Some((terminal, parents)) = segments.split_last() else {
            return Ok(None);
        };

        let mut nodes: Vec<&Node> = self.root.iter().collect();
        for segment in parents {
            nodes = nodes
                .into_iter()
                .filter_map(Node::as_section)
                .filter(|s| segment_matches(segment, &s.name))
                .flat_map(|s| s.children.iter())
                .collect();
        }

        if *terminal == "*" {
            let lines: Vec<String> = nodes
                .iter()
                .filter_map(|n| n.as_keyword())
                .map(Keyword::line)
                .collect();
            return Ok((!lines.is_empty()).then_some(PathValue::Multiple(lines)));
        }

        let mut values: Vec<String> = nodes
            .iter()
            .filter_map(|n| n.as_keyword())
            .filter(|k| k.name.eq_ignore_ascii_case(terminal))
            .map(|k| k.value.clone())
            .collect();
        match values.len() {
            0 => {}
            1 => return Ok(values.pop().map(PathValue::Single)),
            _ => return Ok(Some(PathValue::Multiple(values))),
        }

        let sections: Vec<&Section> = nodes
            .iter()
            .filter_map(|n| n.as_section())
            .filter(|s| s.name.eq_ignore_ascii_case(terminal))
            .collect();
        if sections.is_empty() {
            return Ok(None);
        }
        Ok(Some(PathValue::Multiple(
            sections
                .iter()
                .flat_map(|s| s.keywords())
                .map(Keyword::line)
                .collect(),
        )))
    }

    /// 按类型读取关键字
    ///
    /// 路径不存在、非法或取值无法转换为 `kind` 时返回 `Ok(None)`；
    /// 多个记号或重复关键字返回 `KeywordValue::List`。
    /// 无取值的关键字作为逻辑值时为真。
    pub fn get_keyword_checked(
        &self,
        path: &str,
        kind: KeywordKind,
    ) -> Result<Option<KeywordValue>> {
        let value = match self.get_path(path) {
            Ok(Some(value)) => value,
            Ok(None) | Err(_) => return Ok(None),
        };

        let text = match value {
            PathValue::Multiple(values) => return Ok(Some(KeywordValue::List(values))),
            PathValue::Single(text) => text,
        };

        let tokens: Vec<&str> = text.split_whitespace().collect();
        let value = match (tokens.as_slice(), kind) {
            ([], KeywordKind::Boolean) => KeywordValue::Boolean(true),
            ([], KeywordKind::Text) => KeywordValue::Text(String::new()),
            ([], _) => {
                trace!("Keyword '{}' has no value to read as {:?}", path, kind);
                return Ok(None);
            }
            ([token], kind) => match cast_token(token, kind) {
                Ok(value) => value,
                Err(e) => {
                    trace!("Keyword '{}' skipped: {}", path, e);
                    return Ok(None);
                }
            },
            (tokens, _) => KeywordValue::List(tokens.iter().map(|t| t.to_string()).collect()),
        };
        Ok(Some(value))
    }

    /// 改写已存在的关键字，返回被替换的次数
    pub fn set_keyword(&mut self, path: &str, value: &str) -> Result<usize> {
        let segments = split_path(path)?;
        if segments.last() == Some(&"*") {
            return Err(QcioError::InvalidValue(format!(
                "Cannot assign to wildcard path '{}'",
                path
            )));
        }
        Ok(assign_keyword(&mut self.root, &segments, value.trim()))
    }

    /// `FORCE_EVAL/SUBSYS/CELL` 中的晶格向量 A, B, C（Å）
    ///
    /// 没有 A/B/C 时退回到 `ABC` + `ALPHA_BETA_GAMMA`（缺省 90°）。
    pub fn get_cell_vectors(&self) -> Result<[[f64; 3]; 3]> {
        const CELL: &str = "FORCE_EVAL/SUBSYS/CELL";

        let mut vectors = [[0.0; 3]; 3];
        let mut found = 0;
        for (vector, name) in vectors.iter_mut().zip(["A", "B", "C"]) {
            if let Some(text) = self.single_value(&format!("{}/{}", CELL, name))? {
                *vector = parse_vector(&text)?;
                found += 1;
            }
        }
        match found {
            3 => return Ok(vectors),
            0 => {}
            _ => {
                return Err(QcioError::InvalidValue(format!(
                    "{} defines only {} of the vectors A, B, C",
                    CELL, found
                )))
            }
        }

        let abc = self
            .single_value(&format!("{}/ABC", CELL))?
            .ok_or_else(|| QcioError::InvalidValue(format!("No cell vectors in {}", CELL)))?;
        let [a, b, c] = parse_vector(&abc)?;
        let [alpha, beta, gamma] = match self.single_value(&format!("{}/ALPHA_BETA_GAMMA", CELL))? {
            Some(angles) => parse_triple(&angles)?,
            None => [90.0; 3],
        };

        let h = geometry::abc_to_hmatrix(a, b, c, alpha, beta, gamma, true)?;
        Ok([0, 1, 2].map(|axis| geometry::lattice_vector(&h, axis)))
    }

    fn single_value(&self, path: &str) -> Result<Option<String>> {
        match self.get_path(path)? {
            None => Ok(None),
            Some(PathValue::Single(text)) => Ok(Some(text)),
            Some(PathValue::Multiple(_)) => Err(QcioError::InvalidValue(format!(
                "Keyword '{}' is defined more than once",
                path
            ))),
        }
    }

    /// 按选项序列化为行
    pub fn to_lines(&self, options: &WriteOptions) -> Vec<String> {
        let mut out = Vec::new();
        render_nodes(&self.root, 0, options, &mut out);
        out
    }

    /// 按选项序列化为文本
    pub fn render(&self, options: &WriteOptions) -> String {
        self.to_lines(options).join("\n")
    }

    /// 以缺省选项写出到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        parsers::write_file(path, &self.to_string())
    }
}

impl fmt::Display for Cp2kInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&WriteOptions::default()))
    }
}

impl FromStr for Cp2kInput {
    type Err = QcioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_content(s)
    }
}

impl HoldsUnitCell for Cp2kInput {
    fn get_h_matrix(&self) -> Result<HMatrix> {
        let [a, b, c] = self.get_cell_vectors()?;
        Ok(geometry::hmatrix_from_columns(a, b, c))
    }
}

// ─────────────────────────────────────────────────────────────
// 内部实现
// ─────────────────────────────────────────────────────────────

/// 以段落栈构建文档树
fn build_tree(lines: &[String]) -> Result<Vec<Node>> {
    let mut root = Vec::new();
    let mut stack: Vec<Section> = Vec::new();

    for (index, raw) in lines.iter().enumerate() {
        let lineno = index + 1;
        let line = raw.trim();

        let node = if line.is_empty() {
            Node::Blank
        } else if line.starts_with('#') || line.starts_with('!') {
            trace!("line {}: comment", lineno);
            Node::Comment(raw.clone())
        } else if let Some(caps) = END_RE.captures(line) {
            let mut section = stack.pop().ok_or_else(|| {
                QcioError::parse(FORMAT, lineno, "&END without an open section")
            })?;
            let name = caps.get(1).map_or("", |m| m.as_str());
            if !name.is_empty() {
                if !name.eq_ignore_ascii_case(&section.name) {
                    return Err(QcioError::parse(
                        FORMAT,
                        lineno,
                        format!(
                            "&END {} closes section &{} opened on line {}",
                            name, section.name, section.line
                        ),
                    ));
                }
                section.closed_with_name = true;
            }
            trace!("line {}: close &{}", lineno, section.name);
            Node::Section(section)
        } else if let Some(caps) = OPEN_RE.captures(line) {
            let name = caps[1].to_string();
            let parameter = caps[2].trim();
            trace!("line {}: open &{}", lineno, name);
            stack.push(Section {
                name,
                parameter: (!parameter.is_empty()).then(|| parameter.to_string()),
                children: Vec::new(),
                closed_with_name: false,
                line: lineno,
            });
            continue;
        } else {
            trace!("line {}: keyword", lineno);
            Node::Keyword(Keyword::from_line(line))
        };

        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => root.push(node),
        }
    }

    if let Some(section) = stack.last() {
        return Err(QcioError::parse(
            FORMAT,
            section.line,
            format!("Section &{} is never closed", section.name),
        ));
    }
    Ok(root)
}

/// 拆分查询路径，空路径或空段为 `InvalidValue`
fn split_path(path: &str) -> Result<Vec<&str>> {
    if path.trim().is_empty() {
        return Err(QcioError::InvalidValue("Empty keyword path".to_string()));
    }
    let segments: Vec<&str> = path.split('/').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(QcioError::InvalidValue(format!(
            "Malformed keyword path '{}'",
            path
        )));
    }
    Ok(segments)
}

fn assign_keyword(nodes: &mut [Node], segments: &[&str], value: &str) -> usize {
    match segments {
        [] => 0,
        [name] => nodes
            .iter_mut()
            .filter_map(|n| match n {
                Node::Keyword(k) if k.name.eq_ignore_ascii_case(name) => Some(k),
                _ => None,
            })
            .map(|k| k.value = value.to_string())
            .count(),
        [head, rest @ ..] => nodes
            .iter_mut()
            .filter_map(|n| match n {
                Node::Section(s) if segment_matches(head, &s.name) => Some(s),
                _ => None,
            })
            .map(|s| assign_keyword(&mut s.children, rest, value))
            .sum(),
    }
}

/// 三个浮点数，允许前置 `[angstrom]` / `[bohr]` 单位
fn parse_vector(text: &str) -> Result<[f64; 3]> {
    let mut tokens = text.split_whitespace().peekable();
    let mut factor = 1.0;
    if let Some(caps) = tokens.peek().and_then(|t| UNIT_RE.captures(*t)) {
        factor = match caps[1].to_ascii_lowercase().as_str() {
            "angstrom" => 1.0,
            "bohr" => BOHR_TO_ANGSTROM,
            unit => {
                return Err(QcioError::InvalidValue(format!(
                    "Unsupported length unit '{}'",
                    unit
                )))
            }
        };
        tokens.next();
    }
    let rest: Vec<&str> = tokens.collect();
    Ok(parse_triple(&rest.join(" "))?.map(|x| x * factor))
}

fn parse_triple(text: &str) -> Result<[f64; 3]> {
    let values = text
        .split_whitespace()
        .map(parse_float)
        .collect::<Result<Vec<f64>>>()?;
    match values.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(QcioError::InvalidValue(format!(
            "Expected three numbers, got '{}'",
            text
        ))),
    }
}

fn render_nodes(nodes: &[Node], depth: usize, options: &WriteOptions, out: &mut Vec<String>) {
    let indent = INDENT.repeat(depth);
    for node in nodes {
        match node {
            Node::Section(section) => {
                match &section.parameter {
                    Some(parameter) => out.push(format!("{}&{} {}", indent, section.name, parameter)),
                    None => out.push(format!("{}&{}", indent, section.name)),
                }
                render_nodes(&section.children, depth + 1, options, out);
                if options.close_sections || section.closed_with_name {
                    out.push(format!("{}&END {}", indent, section.name));
                } else {
                    out.push(format!("{}&END", indent));
                }
                out.push(String::new());
            }
            Node::Keyword(keyword) => out.push(format!("{}{}", indent, keyword.line())),
            Node::Comment(text) if options.keep_comments => {
                if options.indent_comments {
                    out.push(format!("{}{}", indent, text.trim()));
                } else {
                    out.push(text.clone());
                }
            }
            Node::Comment(_) => {}
            Node::Blank if options.keep_empty => out.push(String::new()),
            Node::Blank => {}
        }
    }
}
