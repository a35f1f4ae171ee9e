mod common;

use common::{file_count, paragraph, pdf_pages, write_docx};
use docflip::{Backend, ErrorKind, Options, pdf_to_word, word_to_pdf};

fn builtin() -> Options {
    Options {
        backend: Backend::Builtin,
        soffice: None,
    }
}

const A4_LANDSCAPE: &str =
    r#"<w:sectPr><w:pgSz w:w="16838" w:h="11906" w:orient="landscape"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440"/></w:sectPr>"#;

#[test]
fn builtin_renderer_uses_first_section_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("memo.docx");
    write_docx(&source, &format!("{}{A4_LANDSCAPE}", paragraph("Quarterly numbers")));

    let output = word_to_pdf(&source, &builtin()).unwrap();
    assert_eq!(output, dir.path().join("memo.pdf"));

    let (pages, (width, height)) = pdf_pages(&output);
    assert_eq!(pages, 1);
    assert!((width - 841.9).abs() < 0.1, "width {width}");
    assert!((height - 595.3).abs() < 0.1, "height {height}");
}

#[test]
fn first_of_several_sections_decides_the_page_size() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("sections.docx");
    let body = format!(
        r#"<w:p><w:pPr><w:sectPr><w:pgSz w:w="8000" w:h="10000"/></w:sectPr></w:pPr><w:r><w:t>one</w:t></w:r></w:p>{}{A4_LANDSCAPE}"#,
        paragraph("two")
    );
    write_docx(&source, &body);

    let output = word_to_pdf(&source, &builtin()).unwrap();
    let (_, (width, height)) = pdf_pages(&output);
    assert_eq!((width, height), (400.0, 500.0));
}

#[test]
fn repeated_conversion_gets_a_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("memo.docx");
    write_docx(&source, &paragraph("hi"));

    let first = word_to_pdf(&source, &builtin()).unwrap();
    let second = word_to_pdf(&source, &builtin()).unwrap();
    assert_eq!(first, dir.path().join("memo.pdf"));
    assert_eq!(second, dir.path().join("memo_1.pdf"));
}

#[test]
fn long_documents_span_several_pages() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("long.docx");
    let body: String = (0..200).map(|i| paragraph(&format!("Line number {i}"))).collect();
    write_docx(&source, &body);

    let output = word_to_pdf(&source, &builtin()).unwrap();
    let (pages, (width, height)) = pdf_pages(&output);
    assert!(pages > 1, "expected several pages, got {pages}");
    assert_eq!((width, height), (612.0, 792.0));
}

#[test]
fn text_survives_a_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("trip.docx");
    let body: String = ["Dear reader,", "Totals are in.", "Regards"]
        .iter()
        .map(|t| paragraph(t))
        .collect();
    write_docx(&source, &body);

    let pdf = word_to_pdf(&source, &builtin()).unwrap();
    let docx = pdf_to_word(&pdf).unwrap();
    assert_eq!(docx, dir.path().join("trip_1.docx"));
    assert_eq!(
        common::docx_paragraphs(&docx),
        ["Dear reader,", "Totals are in.", "Regards"]
    );
}

#[test]
fn legacy_doc_needs_the_external_converter() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("old.doc");
    std::fs::write(&source, b"\xD0\xCF\x11\xE0").unwrap();

    let err = word_to_pdf(&source, &builtin()).unwrap_err();
    assert!(matches!(err, docflip::Error::UnsupportedFormat(_)));
    assert_eq!(file_count(dir.path()), 1);
}

#[test]
fn not_a_zip_is_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("fake.docx");
    std::fs::write(&source, "plain text, not a package\n".repeat(20)).unwrap();

    let err = word_to_pdf(&source, &builtin()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(file_count(dir.path()), 1);
}

#[test]
fn failed_external_conversion_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("memo.docx");
    write_docx(&source, &paragraph("hi"));
    let options = Options {
        backend: Backend::External,
        soffice: Some(dir.path().join("missing-soffice")),
    };

    let err = word_to_pdf(&source, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConverterFailure);
    assert!(!dir.path().join("memo.pdf").exists());
}
