//! The in-memory shapes loaders produce.
//!
//! Each variant is whatever the underlying parser natively hands back; no
//! conversion between formats happens here.

use indexmap::IndexMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Ordered sections of ordered keys. Keys outside any section live under `""`.
pub type IniDocument = IndexMap<String, IndexMap<String, String>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
    Table(Table),
    Workbook(Vec<Sheet>),
    Json(serde_json::Value),
    Yaml(serde_yaml::Value),
    Toml(toml::Table),
    Xml(XmlElement),
    Ini(IniDocument),
    /// Markdown rendered to HTML.
    Markup(String),
    /// Member listing of an archive; members are not extracted.
    Archive(Vec<ArchiveEntry>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub table: Table,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
    pub is_dir: bool,
}

impl Content {
    /// Short type tag, used when a value is too bulky to display.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "Text",
            Self::Bytes(_) => "Bytes",
            Self::Table(_) => "Table",
            Self::Workbook(_) => "Workbook",
            Self::Json(_) => "Json",
            Self::Yaml(_) => "Yaml",
            Self::Toml(_) => "Toml",
            Self::Xml(_) => "Xml",
            Self::Ini(_) => "Ini",
            Self::Markup(_) => "Markup",
            Self::Archive(_) => "Archive",
        }
    }

    /// Types never rendered inline, whatever their size.
    pub fn is_bulky(&self) -> bool {
        matches!(self, Self::Table(_) | Self::Workbook(_) | Self::Ini(_) | Self::Archive(_))
    }

    /// Whether the loaded value carries nothing worth keeping.
    ///
    /// Exactly one signal is consulted per variant: trimmed text for the
    /// textual variants, row count for tables, key count for containers,
    /// and for scalar documents `null`, a blank string or numeric zero.
    /// Booleans are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) | Self::Markup(s) => s.trim().is_empty(),
            Self::Bytes(b) => b.is_empty(),
            Self::Table(t) => t.rows.is_empty(),
            Self::Workbook(sheets) => sheets.iter().all(|s| s.table.rows.is_empty()),
            Self::Json(v) => json_is_empty(v),
            Self::Yaml(v) => yaml_is_empty(v),
            Self::Toml(t) => t.is_empty(),
            Self::Xml(root) => root.children.is_empty() && root.attributes.is_empty() && root.text.trim().is_empty(),
            Self::Ini(doc) => doc.values().all(IndexMap::is_empty),
            Self::Archive(entries) => entries.is_empty(),
        }
    }
}

fn json_is_empty(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => true,
        Value::Bool(_) => false,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn yaml_is_empty(value: &serde_yaml::Value) -> bool {
    use serde_yaml::Value;
    match value {
        Value::Null => true,
        Value::Bool(_) => false,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim().is_empty(),
        Value::Sequence(s) => s.is_empty(),
        Value::Mapping(m) => m.is_empty(),
        Value::Tagged(tagged) => yaml_is_empty(&tagged.value),
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if !self.headers.is_empty() {
            writeln!(f, "{}", self.headers.join(","))?;
        }
        for row in &self.rows {
            writeln!(f, "{}", row.join(","))?;
        }
        Ok(())
    }
}

impl Display for XmlElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "<{}", self.name)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}=\"{value}\"")?;
        }
        if self.text.is_empty() && self.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">{}", self.text)?;
        for child in &self.children {
            write!(f, "{child}")?;
        }
        write!(f, "</{}>", self.name)
    }
}

impl Display for Content {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Text(s) | Self::Markup(s) => f.write_str(s),
            Self::Bytes(bytes) => {
                f.write_str("b\"")?;
                for byte in bytes {
                    write!(f, "{}", std::ascii::escape_default(*byte))?;
                }
                f.write_str("\"")
            },
            Self::Table(table) => write!(f, "{table}"),
            Self::Workbook(sheets) => {
                for sheet in sheets {
                    write!(f, "[{}]\n{}", sheet.name, sheet.table)?;
                }
                Ok(())
            },
            Self::Json(value) => write!(f, "{value}"),
            Self::Yaml(value) => match serde_yaml::to_string(value) {
                Ok(text) => f.write_str(text.trim_end()),
                Err(_) => write!(f, "{value:?}"),
            },
            Self::Toml(table) => match toml::to_string(table) {
                Ok(text) => f.write_str(text.trim_end()),
                Err(_) => write!(f, "{table:?}"),
            },
            Self::Xml(root) => write!(f, "{root}"),
            Self::Ini(doc) => {
                for (section, keys) in doc {
                    if !section.is_empty() {
                        writeln!(f, "[{section}]")?;
                    }
                    for (key, value) in keys {
                        writeln!(f, "{key}={value}")?;
                    }
                }
                Ok(())
            },
            Self::Archive(entries) => {
                let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
                f.write_str(&names.join("\n"))
            },
        }
    }
}
