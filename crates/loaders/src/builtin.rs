//! Built-in loader families.

use crate::codec::Codec;
use crate::content::{ArchiveEntry, Content, IniDocument, Sheet, Table, XmlElement};
use crate::error::{ErrorKind, Result};
use crate::loader::Options;
use calamine::Reader as _;
use exn::ResultExt;
use mime_guess::mime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader as XmlReader;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

const TEXT_PARAMS: &[&str] = &["lossy"];
const CSV_PARAMS: &[&str] = &["delimiter", "has_headers", "flexible"];
const SPREADSHEET_PARAMS: &[&str] = &["sheet"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// The fallback: UTF-8 text when it decodes, bytes otherwise.
    Raw,
    /// Anything the mime table knows but no specific loader handles.
    Generic,
    Text,
    Csv { delimiter: u8 },
    Json,
    Yaml,
    Toml,
    Xml,
    Ini,
    Spreadsheet,
    Zip,
    Compressed(Codec),
    Markdown,
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Generic => "generic",
            Self::Text => "text",
            Self::Csv { .. } => "csv",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Xml => "xml",
            Self::Ini => "ini",
            Self::Spreadsheet => "spreadsheet",
            Self::Zip => "zip",
            Self::Compressed(_) => "compressed",
            Self::Markdown => "markdown",
        }
    }

    /// Option names this loader understands.
    pub fn params(&self) -> &'static [&'static str] {
        match self {
            Self::Raw | Self::Generic | Self::Text | Self::Markdown | Self::Compressed(_) => TEXT_PARAMS,
            Self::Csv { .. } => CSV_PARAMS,
            Self::Spreadsheet => SPREADSHEET_PARAMS,
            Self::Json | Self::Yaml | Self::Toml | Self::Xml | Self::Ini | Self::Zip => &[],
        }
    }

    /// `options` must already be narrowed to [`params`](Self::params).
    pub fn load(&self, path: &Path, options: &Options) -> Result<Content> {
        match self {
            Self::Raw => Ok(bytes_or_text(read(path)?)),
            Self::Generic => load_generic(path, lossy(options)?),
            Self::Text => Ok(Content::Text(read_text(path, lossy(options)?)?)),
            Self::Csv { delimiter } => load_csv(path, *delimiter, options),
            Self::Json => serde_json::from_reader(BufReader::new(open(path)?))
                .map(Content::Json)
                .or_raise(|| ErrorKind::Malformed("json")),
            Self::Yaml => serde_yaml::from_reader(BufReader::new(open(path)?))
                .map(Content::Yaml)
                .or_raise(|| ErrorKind::Malformed("yaml")),
            Self::Toml => read_text(path, false)?
                .parse::<toml::Table>()
                .map(Content::Toml)
                .or_raise(|| ErrorKind::Malformed("toml")),
            Self::Xml => parse_xml(&read_text(path, false)?).map(Content::Xml),
            Self::Ini => load_ini(path),
            Self::Spreadsheet => load_spreadsheet(path, options),
            Self::Zip => load_zip(path),
            Self::Compressed(codec) => {
                let decoded = codec.decode(BufReader::new(open(path)?))?;
                Ok(match lossy(options)? {
                    true => Content::Text(String::from_utf8_lossy(&decoded).into_owned()),
                    false => bytes_or_text(decoded),
                })
            },
            Self::Markdown => {
                let source = read_text(path, lossy(options)?)?;
                let mut html = String::with_capacity(source.len());
                pulldown_cmark::html::push_html(&mut html, pulldown_cmark::Parser::new(&source));
                Ok(Content::Markup(html))
            },
        }
    }
}

fn open(path: &Path) -> Result<File> {
    Ok(File::open(path).map_err(|e| ErrorKind::from_io(e, path))?)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path).map_err(|e| ErrorKind::from_io(e, path))?)
}

fn read_text(path: &Path, lossy: bool) -> Result<String> {
    let bytes = read(path)?;
    match lossy {
        true => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        false => String::from_utf8(bytes).or_raise(|| ErrorKind::Decode(path.to_path_buf())),
    }
}

fn bytes_or_text(bytes: Vec<u8>) -> Content {
    match String::from_utf8(bytes) {
        Ok(text) => Content::Text(text),
        Err(e) => Content::Bytes(e.into_bytes()),
    }
}

fn flag(options: &Options, key: &str, default: bool) -> Result<bool> {
    match options.get(key) {
        None => Ok(default),
        Some(value) => value
            .parse::<bool>()
            .or_raise(|| ErrorKind::Validation(format!("option `{key}` expects true/false, got `{value}`"))),
    }
}

fn lossy(options: &Options) -> Result<bool> {
    flag(options, "lossy", false)
}

fn is_textual(mime: &mime::Mime) -> bool {
    let subtype = mime.subtype();
    mime.type_() == mime::TEXT
        || subtype == mime::JSON
        || subtype == mime::XML
        || subtype == mime::JAVASCRIPT
        || matches!(mime.suffix(), Some(s) if s == mime::JSON || s == mime::XML)
}

fn load_generic(path: &Path, lossy: bool) -> Result<Content> {
    let textual = mime_guess::from_path(path).first().is_some_and(|m| is_textual(&m));
    match textual {
        true => Ok(Content::Text(read_text(path, lossy)?)),
        false => Ok(Content::Bytes(read(path)?)),
    }
}

fn load_csv(path: &Path, default_delimiter: u8, options: &Options) -> Result<Content> {
    let delimiter = match options.get("delimiter").map(String::as_bytes) {
        None => default_delimiter,
        Some([byte]) => *byte,
        Some(_) => exn::bail!(ErrorKind::Validation("option `delimiter` must be a single ASCII character".into())),
    };
    let has_headers = flag(options, "has_headers", true)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(flag(options, "flexible", false)?)
        .from_reader(open(path)?);
    let headers = match has_headers {
        true => reader.headers().or_raise(|| ErrorKind::Malformed("csv"))?.iter().map(str::to_owned).collect(),
        false => Vec::new(),
    };
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.or_raise(|| ErrorKind::Malformed("csv"))?;
        rows.push(record.iter().map(str::to_owned).collect());
    }
    Ok(Content::Table(Table { headers, rows }))
}

fn load_ini(path: &Path) -> Result<Content> {
    let parsed = ini::Ini::load_from_str(&read_text(path, false)?).or_raise(|| ErrorKind::Malformed("ini"))?;
    let mut doc = IniDocument::new();
    for (section, properties) in parsed.iter() {
        if section.is_none() && properties.is_empty() {
            continue;
        }
        let keys = doc.entry(section.unwrap_or_default().to_string()).or_default();
        for (key, value) in properties.iter() {
            keys.insert(key.to_string(), value.to_string());
        }
    }
    Ok(Content::Ini(doc))
}

/// Every sheet, or only the one named by the `sheet` option. The first row
/// of each sheet is taken as its header.
fn load_spreadsheet(path: &Path, options: &Options) -> Result<Content> {
    let mut workbook = calamine::open_workbook_auto(path).or_raise(|| ErrorKind::Malformed("spreadsheet"))?;
    let names = match options.get("sheet") {
        Some(name) => vec![name.clone()],
        None => workbook.sheet_names(),
    };
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook.worksheet_range(&name).or_raise(|| ErrorKind::Malformed("spreadsheet"))?;
        let mut rows = range.rows().map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<_>>());
        let headers = rows.next().unwrap_or_default();
        sheets.push(Sheet { name, table: Table { headers, rows: rows.collect() } });
    }
    Ok(Content::Workbook(sheets))
}

/// Lists members without extracting them.
fn load_zip(path: &Path) -> Result<Content> {
    let mut archive = zip::ZipArchive::new(BufReader::new(open(path)?)).or_raise(|| ErrorKind::Malformed("zip"))?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let member = archive.by_index_raw(index).or_raise(|| ErrorKind::Malformed("zip"))?;
        entries.push(ArchiveEntry {
            name: member.name().to_string(),
            size: member.size(),
            compressed_size: member.compressed_size(),
            is_dir: member.is_dir(),
        });
    }
    Ok(Content::Archive(entries))
}

fn element(start: &BytesStart<'_>) -> Result<XmlElement> {
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.or_raise(|| ErrorKind::Malformed("xml"))?;
        let value = attribute.unescape_value().or_raise(|| ErrorKind::Malformed("xml"))?;
        attributes.push((String::from_utf8_lossy(attribute.key.as_ref()).into_owned(), value.into_owned()));
    }
    Ok(XmlElement {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        attributes,
        ..XmlElement::default()
    })
}

/// Build the element tree for a document's root element.
pub(crate) fn parse_xml(source: &str) -> Result<XmlElement> {
    let mut reader = XmlReader::from_str(source);
    reader.config_mut().trim_text(true);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;
    loop {
        let event = reader.read_event().or_raise(|| ErrorKind::Malformed("xml"))?;
        let finished = match event {
            Event::Start(start) => {
                stack.push(element(&start)?);
                None
            },
            Event::Empty(start) => Some(element(&start)?),
            Event::End(_) => stack.pop(),
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape().or_raise(|| ErrorKind::Malformed("xml"))?);
                }
                None
            },
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
                None
            },
            Event::Eof => break,
            _ => None,
        };
        if let Some(done) = finished {
            match stack.last_mut() {
                Some(parent) => parent.children.push(done),
                None => root = Some(done),
            }
        }
    }
    if !stack.is_empty() {
        exn::bail!(ErrorKind::Malformed("xml"));
    }
    root.ok_or_else(|| exn::Exn::from(ErrorKind::Malformed("xml")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn fixture(dir: &tempfile::TempDir, name: &str, body: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_raw_text_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let text = fixture(&dir, "notes", b"plain words");
        let binary = fixture(&dir, "blob", &[0xff, 0xfe, 0x00]);
        assert_eq!(Builtin::Raw.load(&text, &Options::new()).unwrap(), Content::Text("plain words".into()));
        assert_eq!(Builtin::Raw.load(&binary, &Options::new()).unwrap(), Content::Bytes(vec![0xff, 0xfe, 0x00]));
    }

    #[test]
    fn test_text_rejects_invalid_utf8_unless_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "bad.txt", &[b'o', b'k', 0xff]);
        let err = Builtin::Text.load(&path, &Options::new()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Decode(_)));
        let lossy = Options::from([("lossy".to_string(), "true".to_string())]);
        assert_eq!(Builtin::Text.load(&path, &lossy).unwrap(), Content::Text("ok\u{FFFD}".into()));
    }

    #[test]
    fn test_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "people.csv", b"name,age\nada,36\ngrace,45\n");
        let Content::Table(table) = Builtin::Csv { delimiter: b',' }.load(&path, &Options::new()).unwrap() else {
            panic!("expected a table");
        };
        assert_eq!(table.headers, vec!["name", "age"]);
        assert_eq!(table.rows, vec![vec!["ada", "36"], vec!["grace", "45"]]);
    }

    #[test]
    fn test_csv_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "semi.csv", b"a;b\n1;2\n");
        let options = Options::from([
            ("delimiter".to_string(), ";".to_string()),
            ("has_headers".to_string(), "false".to_string()),
        ]);
        let Content::Table(table) = Builtin::Csv { delimiter: b',' }.load(&path, &options).unwrap() else {
            panic!("expected a table");
        };
        assert!(table.headers.is_empty());
        assert_eq!(table.rows.len(), 2);

        let bad = Options::from([("delimiter".to_string(), "::".to_string())]);
        let err = Builtin::Csv { delimiter: b',' }.load(&path, &bad).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
    }

    #[test]
    fn test_empty_csv_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "empty.csv", b"");
        let content = Builtin::Csv { delimiter: b',' }.load(&path, &Options::new()).unwrap();
        assert!(content.is_empty());
    }

    #[rstest]
    #[case(Builtin::Json, "doc.json", r#"{"a": [1, 2]}"#)]
    #[case(Builtin::Yaml, "doc.yaml", "a:\n  - 1\n  - 2\n")]
    #[case(Builtin::Toml, "doc.toml", "a = [1, 2]\n")]
    fn test_structured(#[case] loader: Builtin, #[case] name: &str, #[case] body: &str) {
        let dir = tempfile::tempdir().unwrap();
        let content = loader.load(&fixture(&dir, name, body.as_bytes()), &Options::new()).unwrap();
        assert!(!content.is_empty());
        assert_eq!(content.kind().to_lowercase(), loader.name());
    }

    #[rstest]
    #[case(Builtin::Json, "{not json")]
    #[case(Builtin::Toml, "a = = 1")]
    #[case(Builtin::Xml, "<open><unclosed></open>")]
    fn test_malformed(#[case] loader: Builtin, #[case] body: &str) {
        let dir = tempfile::tempdir().unwrap();
        let err = loader.load(&fixture(&dir, "bad", body.as_bytes()), &Options::new()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed(_)));
    }

    #[test]
    fn test_xml_tree() {
        let root = parse_xml(r#"<?xml version="1.0"?><library name="main"><book id="1">Dune</book><shelf/></library>"#)
            .unwrap();
        assert_eq!(root.name, "library");
        assert_eq!(root.attributes, vec![("name".to_string(), "main".to_string())]);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].text, "Dune");
        assert_eq!(root.children[1].name, "shelf");
    }

    #[test]
    fn test_xml_without_root() {
        let err = parse_xml("").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed("xml")));
    }

    #[test]
    fn test_ini_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "app.ini", b"top = 1\n[server]\nhost = localhost\nport = 8080\n");
        let Content::Ini(doc) = Builtin::Ini.load(&path, &Options::new()).unwrap() else {
            panic!("expected ini sections");
        };
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["", "server"]);
        assert_eq!(doc["server"]["port"], "8080");
    }

    #[test]
    fn test_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "readme.md", b"# Title\n");
        assert_eq!(Builtin::Markdown.load(&path, &Options::new()).unwrap(), Content::Markup("<h1>Title</h1>\n".into()));
    }

    #[test]
    fn test_compressed_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"inside").unwrap();
        let path = fixture(&dir, "log.gz", &encoder.finish().unwrap());
        assert_eq!(Builtin::Compressed(Codec::Gzip).load(&path, &Options::new()).unwrap(), Content::Text("inside".into()));
    }

    #[test]
    fn test_zip_listing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer.start_file("a.txt", zip::write::SimpleFileOptions::default()).unwrap();
        writer.write_all(b"alpha").unwrap();
        writer.add_directory("nested/", zip::write::SimpleFileOptions::default()).unwrap();
        writer.finish().unwrap();

        let Content::Archive(entries) = Builtin::Zip.load(&path, &Options::new()).unwrap() else {
            panic!("expected an archive listing");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].size, 5);
        assert!(entries[1].is_dir);
    }

    #[test]
    fn test_spreadsheet_rejects_non_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "sheet.xlsx", b"not a workbook");
        let err = Builtin::Spreadsheet.load(&path, &Options::new()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed("spreadsheet")));
    }

    #[test]
    fn test_generic_uses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let html = fixture(&dir, "page.html", b"<p>hi</p>");
        let png = fixture(&dir, "pixel.png", &[0x89, b'P', b'N', b'G']);
        assert_eq!(Builtin::Generic.load(&html, &Options::new()).unwrap(), Content::Text("<p>hi</p>".into()));
        assert!(matches!(Builtin::Generic.load(&png, &Options::new()).unwrap(), Content::Bytes(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Builtin::Json.load(&dir.path().join("gone.json"), &Options::new()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
