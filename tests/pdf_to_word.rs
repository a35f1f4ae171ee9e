mod common;

use common::{docx_page_size, docx_paragraphs, file_count, pdf_bytes, raw_pdf_bytes, write_pdf};
use docflip::{ErrorKind, pdf_to_word};

#[test]
fn report_converts_twice_without_overwriting() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("report.pdf");
    write_pdf(&source, &[&["Hello", "World"]]);

    let first = pdf_to_word(&source).unwrap();
    assert_eq!(first, dir.path().join("report.docx"));
    assert_eq!(docx_paragraphs(&first), ["Hello", "World"]);

    let second = pdf_to_word(&source).unwrap();
    assert_eq!(second, dir.path().join("report_1.docx"));
    assert_eq!(docx_paragraphs(&second), ["Hello", "World"]);
    assert_eq!(file_count(dir.path()), 3);
}

#[test]
fn only_the_first_page_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("two.pdf");
    write_pdf(&source, &[&["first page"], &["second page", "more"]]);

    let output = pdf_to_word(&source).unwrap();
    assert_eq!(docx_paragraphs(&output), ["first page"]);
}

#[test]
fn page_size_is_carried_into_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("a4.pdf");
    std::fs::write(&source, pdf_bytes(&[&["A4"]], (595.0, 842.0))).unwrap();

    let output = pdf_to_word(&source).unwrap();
    assert_eq!(docx_page_size(&output), (11900, 16840));
}

#[test]
fn zero_page_pdf_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("empty.pdf");
    write_pdf(&source, &[]);

    let err = pdf_to_word(&source).unwrap_err();
    assert!(matches!(err, docflip::Error::NoPages), "{err}");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(file_count(dir.path()), 1);
}

#[test]
fn corrupt_pdf_is_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.pdf");
    std::fs::write(&source, b"this is not a pdf").unwrap();

    let err = pdf_to_word(&source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(!dir.path().join("broken.docx").exists());
}

#[test]
fn missing_file_is_a_read_failure() {
    let dir = tempfile::tempdir().unwrap();
    let err = pdf_to_word(&dir.path().join("absent.pdf")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadFailure);
    assert_eq!(file_count(dir.path()), 0);
}

#[test]
fn blank_page_gives_a_single_empty_paragraph() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("blank.pdf");
    write_pdf(&source, &[&[]]);

    let output = pdf_to_word(&source).unwrap();
    assert_eq!(docx_paragraphs(&output), [""]);
}

const TO_UNICODE: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0001> <4F60>
<0002> <597D>
endbfchar
1 beginbfrange
<0010> <0012> <0041>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end
";

#[test]
fn composite_fonts_are_read_through_their_tounicode_map() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("cjk.pdf");
    let content = b"BT /F2 12 Tf 72 700 Td <00010002> Tj 0 -20 Td <001000110012> Tj ET";
    std::fs::write(&source, raw_pdf_bytes(content, TO_UNICODE)).unwrap();

    let output = pdf_to_word(&source).unwrap();
    assert_eq!(docx_paragraphs(&output), ["\u{4F60}\u{597D}", "ABC"]);
}

#[test]
fn text_positioning_operators_and_encodings() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("ops.pdf");
    let content = b"BT /F1 12 Tf 1 0 0 1 72 700 Tm (Matrix) Tj
        0 -20 TD (Second) Tj
        2 0 (Quoted) \"
        /F3 12 Tf 0 -20 Td (AB) Tj
        /F1 12 Tf 0 -20 Td <FEFF00480069> Tj
        /F2 12 Tf 0 -20 Td <0001> Tj ET";
    std::fs::write(&source, raw_pdf_bytes(content, TO_UNICODE)).unwrap();

    let output = pdf_to_word(&source).unwrap();
    assert_eq!(
        docx_paragraphs(&output),
        ["Matrix", "Second", "Quoted", "\u{03B1}\u{03B2}", "Hi", "\u{4F60}"]
    );
}
