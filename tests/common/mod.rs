#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::Path;

use pdf_writer::{Content, Name, Pdf, Rect, Ref, Str};

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// A PDF whose pages each show the given lines, 20pt apart, in Helvetica.
pub fn pdf_bytes(pages: &[&[&str]], size: (f32, f32)) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let catalog_id = Ref::new(1);
    let tree_id = Ref::new(2);
    let font_id = Ref::new(3);
    let mut next = 4;
    let mut kids = Vec::new();

    for lines in pages {
        let page_id = Ref::new(next);
        let content_id = Ref::new(next + 1);
        next += 2;

        let mut content = Content::new();
        for (i, line) in lines.iter().enumerate() {
            content
                .begin_text()
                .set_font(Name(b"F1"), 12.0)
                .next_line(72.0, size.1 - 72.0 - 20.0 * i as f32)
                .show(Str(line.as_bytes()))
                .end_text();
        }
        pdf.stream(content_id, &content.finish());
        pdf.page(page_id)
            .media_box(Rect::new(0.0, 0.0, size.0, size.1))
            .parent(tree_id)
            .contents(content_id)
            .resources()
            .fonts()
            .pair(Name(b"F1"), font_id);
        kids.push(page_id);
    }

    pdf.catalog(catalog_id).pages(tree_id);
    pdf.pages(tree_id)
        .kids(kids.iter().copied())
        .count(kids.len() as i32);
    pdf.type1_font(font_id)
        .base_font(Name(b"Helvetica"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));
    pdf.finish()
}

/// A one-page Letter PDF with `content` as its content stream verbatim.
///
/// Fonts: `/F1` Helvetica, `/F2` a composite Identity-H font whose ToUnicode
/// map is `to_unicode`, `/F3` a simple font mapping 65 and 66 to alpha and
/// beta through `/Differences`.
pub fn raw_pdf_bytes(content: &[u8], to_unicode: &[u8]) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let catalog_id = Ref::new(1);
    let tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let content_id = Ref::new(4);
    let helvetica_id = Ref::new(5);
    let composite_id = Ref::new(6);
    let cid_font_id = Ref::new(7);
    let cmap_id = Ref::new(8);
    let symbolic_id = Ref::new(9);

    pdf.catalog(catalog_id).pages(tree_id);
    pdf.pages(tree_id).kids([page_id]).count(1);
    pdf.page(page_id)
        .media_box(Rect::new(0.0, 0.0, 612.0, 792.0))
        .parent(tree_id)
        .contents(content_id)
        .resources()
        .fonts()
        .pair(Name(b"F1"), helvetica_id)
        .pair(Name(b"F2"), composite_id)
        .pair(Name(b"F3"), symbolic_id);
    pdf.stream(content_id, content);

    pdf.type1_font(helvetica_id)
        .base_font(Name(b"Helvetica"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));
    {
        let mut font = pdf.indirect(composite_id).dict();
        font.pair(Name(b"Type"), Name(b"Font"));
        font.pair(Name(b"Subtype"), Name(b"Type0"));
        font.pair(Name(b"BaseFont"), Name(b"NotoSansCJK"));
        font.pair(Name(b"Encoding"), Name(b"Identity-H"));
        font.pair(Name(b"ToUnicode"), cmap_id);
        font.insert(Name(b"DescendantFonts")).array().item(cid_font_id);
    }
    {
        let mut cid_font = pdf.indirect(cid_font_id).dict();
        cid_font.pair(Name(b"Type"), Name(b"Font"));
        cid_font.pair(Name(b"Subtype"), Name(b"CIDFontType2"));
        cid_font.pair(Name(b"BaseFont"), Name(b"NotoSansCJK"));
    }
    pdf.stream(cmap_id, to_unicode);
    {
        let mut font = pdf.indirect(symbolic_id).dict();
        font.pair(Name(b"Type"), Name(b"Font"));
        font.pair(Name(b"Subtype"), Name(b"Type1"));
        font.pair(Name(b"BaseFont"), Name(b"Symbol"));
        let mut encoding = font.insert(Name(b"Encoding")).dict();
        encoding.pair(Name(b"Type"), Name(b"Encoding"));
        encoding
            .insert(Name(b"Differences"))
            .array()
            .item(65)
            .item(Name(b"alpha"))
            .item(Name(b"uni03B2"));
    }
    pdf.finish()
}

pub fn write_pdf(path: &Path, pages: &[&[&str]]) {
    std::fs::write(path, pdf_bytes(pages, (612.0, 792.0))).unwrap();
}

/// A minimal DOCX package with `body` as the content of `w:body`.
pub fn write_docx(path: &Path, body: &str) {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#).unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    write!(
        zip,
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="{WML_NS}"><w:body>{body}</w:body></w:document>"#
    )
    .unwrap();
    let bytes = zip.finish().unwrap().into_inner();
    std::fs::write(path, bytes).unwrap();
}

pub fn paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

fn document_xml(path: &Path) -> String {
    let file = std::fs::File::open(path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut xml = String::new();
    zip.by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    xml
}

/// Text of each body paragraph of a DOCX file, in order.
pub fn docx_paragraphs(path: &Path) -> Vec<String> {
    let xml = document_xml(path);
    let doc = roxmltree::Document::parse(&xml).unwrap();
    doc.descendants()
        .filter(|n| n.tag_name().name() == "p" && n.tag_name().namespace() == Some(WML_NS))
        .map(|p| {
            p.descendants()
                .filter(|n| n.tag_name().name() == "t")
                .filter_map(|n| n.text())
                .collect()
        })
        .collect()
}

/// `w:pgSz` width and height (twips) of a DOCX file.
pub fn docx_page_size(path: &Path) -> (u32, u32) {
    let xml = document_xml(path);
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let pg_sz = doc
        .descendants()
        .find(|n| n.tag_name().name() == "pgSz")
        .unwrap();
    let attr = |name: &str| pg_sz.attribute((WML_NS, name)).unwrap().parse().unwrap();
    (attr("w"), attr("h"))
}

fn number(obj: &lopdf::Object) -> f32 {
    match obj {
        lopdf::Object::Integer(i) => *i as f32,
        lopdf::Object::Real(r) => *r as f32,
        other => panic!("not a number: {other:?}"),
    }
}

/// Page count and first-page MediaBox size of a PDF file.
pub fn pdf_pages(path: &Path) -> (usize, (f32, f32)) {
    let doc = lopdf::Document::load(path).unwrap();
    let pages = doc.get_pages();
    let first = doc.get_dictionary(pages[&1]).unwrap();
    let media_box: Vec<f32> = first
        .get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(number)
        .collect();
    (
        pages.len(),
        (media_box[2] - media_box[0], media_box[3] - media_box[1]),
    )
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
