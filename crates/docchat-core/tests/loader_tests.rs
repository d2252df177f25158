use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

use docchat_core::loader::DocumentLoader;
use docchat_core::types::Extraction;

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const SHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES: &str = concat!(
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" "#,
    r#"ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" "#,
    r#"ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
);
const WORKSHEET_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

fn write_zip(path: &Path, entries: &[(&str, String)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, body) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn write_docx(path: &Path, paragraphs: &[&str]) {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let ns = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
    let xml =
        format!(r#"{XML_DECL}<w:document xmlns:w="{ns}"><w:body>{body}</w:body></w:document>"#);
    write_zip(path, &[("word/document.xml", xml)]);
}

/// Cells are `(reference, value)`. Numbers are written as numeric cells,
/// everything else as inline strings.
fn sheet_xml(rows: &[(u32, &[(&str, &str)])]) -> String {
    let mut data = String::new();
    for (r, cells) in rows {
        data.push_str(&format!(r#"<row r="{r}">"#));
        for (at, value) in *cells {
            if value.parse::<f64>().is_ok() {
                data.push_str(&format!(r#"<c r="{at}"><v>{value}</v></c>"#));
            } else {
                data.push_str(&format!(
                    r#"<c r="{at}" t="inlineStr"><is><t>{value}</t></is></c>"#
                ));
            }
        }
        data.push_str("</row>");
    }
    format!(r#"{XML_DECL}<worksheet xmlns="{SHEET_NS}"><sheetData>{data}</sheetData></worksheet>"#)
}

fn write_xlsx(path: &Path, sheets: &[(&str, String)]) {
    let mut workbook = String::new();
    let mut rels = String::new();
    let mut overrides = String::new();
    let mut entries = Vec::new();
    for (i, (name, xml)) in sheets.iter().enumerate() {
        let n = i + 1;
        workbook.push_str(&format!(r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#));
        rels.push_str(&format!(r#"<Relationship Id="rId{n}" Type="{REL_NS}/worksheet" "#));
        rels.push_str(&format!(r#"Target="worksheets/sheet{n}.xml"/>"#));
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="{WORKSHEET_TYPE}"/>"#
        ));
        entries.push((format!("xl/worksheets/sheet{n}.xml"), xml.clone()));
    }
    let content_types = format!("{XML_DECL}{CONTENT_TYPES}{overrides}</Types>");
    let office_doc = format!(
        r#"<Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/>"#
    );
    let root_rels =
        format!(r#"{XML_DECL}<Relationships xmlns="{PKG_REL_NS}">{office_doc}</Relationships>"#);
    let workbook = format!(
        r#"{XML_DECL}<workbook xmlns="{SHEET_NS}" xmlns:r="{REL_NS}">{}</workbook>"#,
        format!("<sheets>{workbook}</sheets>")
    );
    let rels = format!(r#"{XML_DECL}<Relationships xmlns="{PKG_REL_NS}">{rels}</Relationships>"#);
    let mut all = vec![
        ("[Content_Types].xml", content_types),
        ("_rels/.rels", root_rels),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", rels),
    ];
    all.extend(entries.iter().map(|(name, xml)| (name.as_str(), xml.clone())));
    write_zip(path, &all);
}

/// A one-page PDF showing `line` in Helvetica, with a correct xref table.
fn write_pdf(path: &Path, line: &str) {
    let stream = format!("BT /F1 24 Tf 72 700 Td ({line}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{body}\nendobj\n", i + 1));
    }
    let xref_at = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        pdf.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    ));
    fs::write(path, pdf).unwrap();
}

#[test]
fn loads_plain_text_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "Short text\n").unwrap();

    let corpus = DocumentLoader::new().load_dir(tmp.path());

    assert_eq!(corpus.len(), 1);
    assert_eq!(corpus.files[0].file_name, "a.txt");
    assert_eq!(corpus.files[0].text(), "Short text\n");
}

#[test]
fn invalid_utf8_bytes_are_dropped() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("bad.txt"), b"caf\xff\xfe ok").unwrap();

    let corpus = DocumentLoader::new().load_dir(tmp.path());

    assert_eq!(corpus.files[0].text(), "caf ok");
}

#[test]
fn literal_replacement_character_is_kept() {
    let tmp = TempDir::new().unwrap();
    let mut bytes = "keep \u{FFFD} here".as_bytes().to_vec();
    bytes.extend_from_slice(b" \xc3");
    fs::write(tmp.path().join("mixed.txt"), bytes).unwrap();

    let corpus = DocumentLoader::new().load_dir(tmp.path());

    assert_eq!(corpus.files[0].text(), "keep \u{FFFD} here ");
}

#[test]
fn unsupported_extensions_are_skipped() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("notes.md"), "# heading").unwrap();
    fs::write(tmp.path().join("data.csv"), "a,b").unwrap();
    fs::write(tmp.path().join("keep.TXT"), "upper case suffix").unwrap();

    let corpus = DocumentLoader::new().load_dir(tmp.path());

    assert_eq!(corpus.len(), 1);
    assert_eq!(corpus.files[0].file_name, "keep.TXT");
}

#[test]
fn walks_nested_directories() {
    let tmp = TempDir::new().unwrap();
    let nested = tmp.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("deep.txt"), "deep").unwrap();
    fs::write(tmp.path().join("top.txt"), "top").unwrap();

    let corpus = DocumentLoader::new().load_dir(tmp.path());

    let mut names: Vec<_> = corpus.files.iter().map(|f| f.file_name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["deep.txt", "top.txt"]);
}

#[test]
fn docx_paragraphs_are_joined_with_newlines() {
    let tmp = TempDir::new().unwrap();
    let paragraphs = ["Quarterly report", "Revenue grew &amp; costs fell"];
    write_docx(&tmp.path().join("memo.docx"), &paragraphs);

    let corpus = DocumentLoader::new().load_dir(tmp.path());

    assert_eq!(corpus.files[0].text(), "Quarterly report\nRevenue grew & costs fell");
}

#[test]
fn xlsx_sheets_render_as_labelled_tables() {
    let tmp = TempDir::new().unwrap();
    // Row 3 is missing entirely and row 4 has only empty strings, so both drop out.
    let inventory = sheet_xml(&[
        (1, &[("A1", "item"), ("B1", "qty")]),
        (2, &[("A2", "seeds"), ("B2", "12")]),
        (4, &[("A4", ""), ("B4", "")]),
        (5, &[("A5", "tools"), ("B5", "4")]),
    ]);
    let header_only = sheet_xml(&[(1, &[("A1", "name"), ("B1", "note")])]);
    write_xlsx(
        &tmp.path().join("stock.xlsx"),
        &[("Inventory", inventory), ("Blank", sheet_xml(&[])), ("Draft", header_only)],
    );

    let corpus = DocumentLoader::new().load_dir(tmp.path());

    assert!(corpus.failures().is_empty(), "{:?}", corpus.failures());
    assert_eq!(
        corpus.files[0].text(),
        "Sheet: Inventory\n    item  qty\n0  seeds   12\n3  tools    4"
    );
}

#[test]
fn xlsx_without_data_rows_is_empty_text() {
    let tmp = TempDir::new().unwrap();
    let header_only = sheet_xml(&[(1, &[("A1", "name")])]);
    write_xlsx(&tmp.path().join("empty.xlsx"), &[("Draft", header_only)]);

    let corpus = DocumentLoader::new().load_dir(tmp.path());

    assert_eq!(corpus.files[0].extraction, Extraction::Text(String::new()));
}

#[test]
fn pdf_text_is_extracted() {
    let tmp = TempDir::new().unwrap();
    write_pdf(&tmp.path().join("plan.pdf"), "Homestead water plan");

    let corpus = DocumentLoader::new().load_dir(tmp.path());

    assert!(corpus.failures().is_empty(), "{:?}", corpus.failures());
    let text = corpus.files[0].text();
    assert!(text.contains("Homestead"), "extracted: {text:?}");
    assert!(text.contains("water"), "extracted: {text:?}");
}

#[test]
fn unreadable_files_degrade_to_empty_text() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("broken.docx"), "not a zip archive").unwrap();
    fs::write(tmp.path().join("broken.xlsx"), "not a workbook").unwrap();
    fs::write(tmp.path().join("broken.pdf"), "not a pdf").unwrap();
    fs::write(tmp.path().join("fine.txt"), "still here").unwrap();

    let corpus = DocumentLoader::new().load_dir(tmp.path());

    assert_eq!(corpus.len(), 4);
    assert_eq!(corpus.failures().len(), 3);
    for file in &corpus.files {
        if file.file_name == "fine.txt" {
            assert_eq!(file.extraction, Extraction::Text("still here".into()));
        } else {
            assert_eq!(file.text(), "");
            assert!(file.failure().is_some());
        }
    }
    let docs = corpus.documents();
    assert_eq!(docs.len(), 4);
    assert_eq!(docs.iter().filter(|d| d.text.is_empty()).count(), 3);
}

#[test]
fn empty_folder_yields_empty_corpus() {
    let tmp = TempDir::new().unwrap();
    let corpus = DocumentLoader::new().load_dir(tmp.path());
    assert!(corpus.is_empty());
    assert!(corpus.documents().is_empty());
}
