// Document I/O - read/write markdown rows with a YAML header block

use crate::error::{Result, TextDbError};
use std::path::Path;

/// Marker line opening and closing the header block.
pub const BOUNDARY: &str = "---";

/// A row file as found on disk, before any schema is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// File name without extension
    pub name: String,
    pub header: serde_yaml::Mapping,
    pub content: String,
}

/// Split a file into its header block and body.
///
/// The header exists only when the first line is the boundary marker and a later
/// line closes it. Without a header the whole (trimmed) text is the body.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let text = text.trim();
    let rest = match text.strip_prefix(BOUNDARY) {
        Some(rest) => rest,
        None => return (None, text),
    };
    let rest = match rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) {
        Some(rest) => rest,
        None => return (None, text),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == BOUNDARY {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }

    (None, text)
}

/// Parse a header block into a key/value mapping.
pub fn parse_header(header: &str) -> Result<serde_yaml::Mapping> {
    if header.trim().is_empty() {
        return Ok(serde_yaml::Mapping::new());
    }
    match serde_yaml::from_str::<serde_yaml::Value>(header)? {
        serde_yaml::Value::Mapping(m) => Ok(m),
        serde_yaml::Value::Null => Ok(serde_yaml::Mapping::new()),
        _ => Err(TextDbError::Other(
            "Row header must be a YAML mapping".into(),
        )),
    }
}

/// Parse the text of a row file
pub fn parse_document(name: &str, text: &str) -> Result<RawDocument> {
    let (header, body) = split_front_matter(text);
    let header = match header {
        Some(h) => parse_header(h)?,
        None => serde_yaml::Mapping::new(),
    };
    Ok(RawDocument {
        name: name.to_string(),
        header,
        content: body.to_string(),
    })
}

/// Read a row file. The row name is the file stem.
pub fn read_document(path: &Path) -> Result<RawDocument> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            TextDbError::Other(format!("Cannot derive row name from {}", path.display()))
        })?;
    let text = std::fs::read_to_string(path)?;
    parse_document(name, &text).map_err(|e| match e {
        TextDbError::Yaml(err) => TextDbError::Other(format!(
            "Invalid header in {}: {err}",
            path.display()
        )),
        other => other,
    })
}

/// Render a row as header block + boundary + body. Rows without columns are
/// written as bare body text.
pub fn render_document(header: &serde_yaml::Mapping, content: &str) -> Result<String> {
    if header.is_empty() {
        return Ok(content.to_string());
    }
    let yaml = serde_yaml::to_string(header)?;
    Ok(format!("{BOUNDARY}\n{yaml}{BOUNDARY}\n{content}"))
}

/// Write a row file, creating parent directories as needed.
pub fn write_document(path: &Path, header: &serde_yaml::Mapping, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_document(header, content)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_split_with_header() {
        let (header, body) = split_front_matter("---\ndone: true\n---\n# Title\nbody");
        assert_eq!(header, Some("done: true\n"));
        assert_eq!(body, "# Title\nbody");
    }

    #[test]
    fn test_split_without_header() {
        let (header, body) = split_front_matter("first line\nsecond line\n");
        assert_eq!(header, None);
        assert_eq!(body, "first line\nsecond line");
    }

    #[test]
    fn test_split_unterminated_header_is_body() {
        let (header, body) = split_front_matter("---\ndone: true\nno end");
        assert_eq!(header, None);
        assert_eq!(body, "---\ndone: true\nno end");
    }

    #[test]
    fn test_split_crlf() {
        let (header, body) = split_front_matter("---\r\nurl: x\r\n---\r\nhello");
        assert_eq!(header, Some("url: x\r\n"));
        assert_eq!(body, "hello");
    }

    #[test]
    fn test_parse_document() {
        let doc = parse_document("eat_dinner", "---\ndone: false\nscore: 2.0\n---\nyum").unwrap();
        assert_eq!(doc.name, "eat_dinner");
        assert_eq!(doc.header.len(), 2);
        assert_eq!(doc.header.get("done"), Some(&serde_yaml::Value::Bool(false)));
        assert_eq!(doc.content, "yum");
    }

    #[test]
    fn test_render_without_columns_is_plain_body() {
        let rendered = render_document(&serde_yaml::Mapping::new(), "just text").unwrap();
        assert_eq!(rendered, "just text");
    }

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes").join("first.md");

        let mut header = serde_yaml::Mapping::new();
        header.insert("pinned".into(), serde_yaml::Value::Bool(true));
        write_document(&path, &header, "hi there").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "---\npinned: true\n---\nhi there");

        let doc = read_document(&path).unwrap();
        assert_eq!(doc.name, "first");
        assert_eq!(doc.header, header);
        assert_eq!(doc.content, "hi there");
    }
}
