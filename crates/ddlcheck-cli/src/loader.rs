//! Reading scripts from disk

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use encoding_rs::WINDOWS_1251;
use miette::{IntoDiagnostic, Result, WrapErr};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

const DOCX_BODY: &str = "word/document.xml";

/// Load a script as text. `.docx` documents are reduced to their paragraphs.
pub fn load_script(path: &Path) -> Result<String> {
    let is_docx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));
    if is_docx {
        return load_docx(path);
    }

    let bytes = fs::read(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    Ok(decode(path, bytes))
}

/// UTF-8, or Windows-1251 when the file is not valid UTF-8
fn decode(path: &Path, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                file = %path.display(),
                "file is not valid UTF-8; decoding as Windows-1251"
            );
            let (text, _) = WINDOWS_1251.decode_without_bom_handling(e.as_bytes());
            text.into_owned()
        }
    }
}

fn load_docx(path: &Path) -> Result<String> {
    let file = File::open(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to open {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .into_diagnostic()
        .wrap_err_with(|| format!("{} is not a valid .docx document", path.display()))?;
    let mut body = archive
        .by_name(DOCX_BODY)
        .into_diagnostic()
        .wrap_err_with(|| format!("{} has no {}", path.display(), DOCX_BODY))?;

    let mut xml = String::new();
    body.read_to_string(&mut xml)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {} from {}", DOCX_BODY, path.display()))?;

    let text = docx_text(&xml)
        .into_diagnostic()
        .wrap_err_with(|| format!("Malformed {} in {}", DOCX_BODY, path.display()))?;
    debug!(file = %path.display(), lines = text.lines().count(), "extracted document text");
    Ok(text)
}

/// Paragraph text of a WordprocessingML body, one line per `w:p`.
///
/// Empty paragraphs still produce a line so line numbers match the document.
pub fn docx_text(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut run_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => current = Some(String::new()),
                b"w:r" => run_depth += 1,
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => paragraphs.extend(current.take()),
                b"w:r" => run_depth = run_depth.saturating_sub(1),
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Empty(e) => match (e.name().as_ref(), current.as_mut()) {
                (b"w:p", _) => paragraphs.push(String::new()),
                (b"w:tab", Some(text)) if run_depth > 0 => text.push('\t'),
                (b"w:br" | b"w:cr", Some(text)) if run_depth > 0 => text.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_text => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) if in_text => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn paragraph(text: &str) -> String {
        format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", text)
    }

    #[test]
    fn test_docx_text_joins_runs_and_paragraphs() {
        let xml = concat!(
            r#"<w:document><w:body>"#,
            r#"<w:p><w:pPr><w:pStyle w:val="Code"/><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>CREATE TABLE t (</w:t></w:r></w:p>"#,
            r#"<w:p w:rsidR="00AB"><w:r><w:tab/><w:t xml:space="preserve">id INT </w:t></w:r><w:r><w:t>CHECK (id &gt; 0)</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>);</w:t></w:r></w:p>"#,
            r#"</w:body></w:document>"#
        );
        assert_eq!(
            docx_text(xml).unwrap(),
            "CREATE TABLE t (\n\tid INT CHECK (id > 0)\n);"
        );
    }

    #[test]
    fn test_docx_empty_paragraphs_keep_their_lines() {
        let xml = format!(
            r#"<w:body>{}<w:p/><w:p w:rsidR="1"/>{}<w:p><w:pPr/></w:p>{}</w:body>"#,
            paragraph("a"),
            paragraph("b"),
            paragraph("c")
        );
        assert_eq!(docx_text(&xml).unwrap(), "a\n\n\nb\n\nc");
    }

    #[test]
    fn test_docx_character_references_and_breaks() {
        let xml = concat!(
            r#"<w:p><w:r><w:t>DEFAULT &#39;x&#39;&#160;&amp; &quot;y&quot;</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>a</w:t><w:br/><w:t>b</w:t></w:r></w:p>"#
        );
        assert_eq!(
            docx_text(xml).unwrap(),
            "DEFAULT 'x'\u{a0}& \"y\"\na\nb"
        );
    }

    #[test]
    fn test_docx_malformed_xml_is_an_error() {
        assert!(docx_text("<w:p><w:r><w:t>a</w:x></w:r></w:p>").is_err());
    }

    #[test]
    fn test_load_windows_1251_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cyrillic.sql");
        fs::write(
            &path,
            b"-- \xd2\xe0\xe1\xeb\xe8\xf6\xe0\nCREATE TABLE t (id INT);",
        )
        .unwrap();

        assert_eq!(
            load_script(&path).unwrap(),
            "-- Таблица\nCREATE TABLE t (id INT);"
        );
    }

    #[test]
    fn test_load_utf8_script_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("utf8.sql");
        fs::write(&path, "-- Таблица\nCREATE TABLE t (id INT);").unwrap();

        assert_eq!(
            load_script(&path).unwrap(),
            "-- Таблица\nCREATE TABLE t (id INT);"
        );
    }

    #[test]
    fn test_load_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.docx");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file(DOCX_BODY, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(b"<w:document><w:body><w:p><w:r><w:t>CREATE TABLE a (id INT);</w:t></w:r></w:p><w:p/></w:body></w:document>")
            .unwrap();
        writer.finish().unwrap();

        assert_eq!(load_script(&path).unwrap(), "CREATE TABLE a (id INT);\n");
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_script(&dir.path().join("missing.sql")).is_err());
    }
}
