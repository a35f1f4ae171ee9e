//! Text and geometry of the first page of a PDF.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::cmap::ToUnicode;
use crate::error::Error;
use crate::fonts::winansi_to_char;
use crate::model::{LETTER, PageGeometry};

/// Baselines closer than this (in points) count as the same line.
const SAME_LINE_TOLERANCE: f32 = 1.0;

/// `TJ` adjustments below this (thousandths of an em) read as a word gap.
const WORD_GAP: f32 = -200.0;

pub struct FirstPage {
    pub text: String,
    pub geometry: PageGeometry,
}

/// Load a PDF and pull out the text and page size of its first page.
pub fn read_first_page(bytes: &[u8]) -> Result<FirstPage, Error> {
    let doc = Document::load_mem(bytes)?;
    let pages = doc.get_pages();
    let Some((&page_number, &page_id)) = pages.iter().next() else {
        return Err(Error::NoPages);
    };
    log::debug!("reading page {page_number} of {}", pages.len());

    let geometry = page_geometry(&doc, page_id).unwrap_or_else(|| {
        log::warn!("first page has no usable MediaBox, assuming Letter");
        LETTER
    });
    let content = doc.get_page_content(page_id)?;
    let operations = Content::decode(&content)?.operations;
    let fonts = page_fonts(&doc, page_id);

    Ok(FirstPage {
        text: extract_text(&operations, &fonts),
        geometry,
    })
}

/// Split extracted text into paragraph lines. Trailing line terminators are
/// dropped so a final newline does not produce an empty paragraph.
pub fn paragraph_lines(text: &str) -> Vec<String> {
    text.trim_end_matches(['\n', '\r'])
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look up a page attribute, following `/Parent` for inheritable ones.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// MediaBox of a page, inherited through the page tree, with `/Rotate` applied.
fn page_geometry(doc: &Document, page_id: ObjectId) -> Option<PageGeometry> {
    let rotated = inherited(doc, page_id, b"Rotate")
        .and_then(number)
        .is_some_and(|deg| (deg as i64).rem_euclid(180) == 90);

    let corners: Vec<f32> = inherited(doc, page_id, b"MediaBox")?
        .as_array()
        .ok()?
        .iter()
        .filter_map(|o| number(resolve(doc, o)))
        .collect();
    let [x0, y0, x1, y1] = corners[..] else {
        return None;
    };
    let (width, height) = ((x1 - x0).abs(), (y1 - y0).abs());
    Some(if rotated {
        PageGeometry { width: height, height: width }
    } else {
        PageGeometry { width, height }
    })
}

/// Bytes shown without a known font: UTF-16BE after a byte order mark, else WinAnsi.
fn decode_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(b"\xFE\xFF") {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().copied().map(winansi_to_char).collect()
    }
}

/// Unicode for the glyph names that show up in `/Differences` arrays.
fn glyph_char(name: &[u8]) -> Option<char> {
    const NAMED: &[(&str, char)] = &[
        ("space", ' '),
        ("exclam", '!'),
        ("quotedbl", '"'),
        ("numbersign", '#'),
        ("dollar", '$'),
        ("percent", '%'),
        ("ampersand", '&'),
        ("quotesingle", '\''),
        ("parenleft", '('),
        ("parenright", ')'),
        ("asterisk", '*'),
        ("plus", '+'),
        ("comma", ','),
        ("hyphen", '-'),
        ("period", '.'),
        ("slash", '/'),
        ("zero", '0'),
        ("one", '1'),
        ("two", '2'),
        ("three", '3'),
        ("four", '4'),
        ("five", '5'),
        ("six", '6'),
        ("seven", '7'),
        ("eight", '8'),
        ("nine", '9'),
        ("colon", ':'),
        ("semicolon", ';'),
        ("less", '<'),
        ("equal", '='),
        ("greater", '>'),
        ("question", '?'),
        ("at", '@'),
        ("underscore", '_'),
        ("quoteleft", '\u{2018}'),
        ("quoteright", '\u{2019}'),
        ("quotedblleft", '\u{201C}'),
        ("quotedblright", '\u{201D}'),
        ("endash", '\u{2013}'),
        ("emdash", '\u{2014}'),
        ("bullet", '\u{2022}'),
        ("ellipsis", '\u{2026}'),
        ("fi", '\u{FB01}'),
        ("fl", '\u{FB02}'),
        ("alpha", '\u{03B1}'),
        ("beta", '\u{03B2}'),
        ("gamma", '\u{03B3}'),
        ("delta", '\u{03B4}'),
        ("mu", '\u{03BC}'),
        ("pi", '\u{03C0}'),
    ];
    let name = std::str::from_utf8(name).ok()?;
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next())
        && c.is_ascii_alphabetic()
    {
        return Some(c);
    }
    if let Some(&(_, c)) = NAMED.iter().find(|(n, _)| *n == name) {
        return Some(c);
    }
    let hex = name
        .strip_prefix("uni")
        .filter(|h| h.len() == 4)
        .or_else(|| name.strip_prefix('u').filter(|h| (4..=6).contains(&h.len())))?;
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

/// How the bytes of shown strings turn into text for one font.
#[derive(Default)]
struct FontDecoder {
    /// Type0 fonts show multi-byte codes.
    composite: bool,
    /// Composite font with a predefined UCS-2/UTF-16 CMap.
    utf16: bool,
    to_unicode: Option<ToUnicode>,
    differences: HashMap<u8, char>,
}

impl FontDecoder {
    fn from_dict(doc: &Document, font: &Dictionary) -> FontDecoder {
        let composite = font
            .get(b"Subtype")
            .and_then(Object::as_name)
            .is_ok_and(|subtype| subtype == b"Type0");
        let encoding = font.get(b"Encoding").ok().map(|e| resolve(doc, e));
        let utf16 = composite
            && encoding
                .and_then(|e| e.as_name().ok())
                .is_some_and(|name| {
                    let name = String::from_utf8_lossy(name);
                    name.contains("UCS2") || name.contains("UTF16")
                });
        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|t| resolve(doc, t).as_stream().ok())
            .map(|stream| {
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                ToUnicode::parse(&data)
            });

        let mut differences = HashMap::new();
        let diffs = encoding
            .and_then(|e| e.as_dict().ok())
            .and_then(|e| e.get(b"Differences").ok())
            .and_then(|d| resolve(doc, d).as_array().ok());
        let mut code: i64 = 0;
        for item in diffs.into_iter().flatten() {
            match item {
                Object::Integer(start) => code = *start,
                Object::Name(name) => {
                    if let (Ok(byte), Some(c)) = (u8::try_from(code), glyph_char(name)) {
                        differences.insert(byte, c);
                    }
                    code += 1;
                }
                _ => {}
            }
        }

        FontDecoder {
            composite,
            utf16,
            to_unicode,
            differences,
        }
    }

    fn simple_char(&self, byte: u8) -> char {
        self.differences
            .get(&byte)
            .copied()
            .unwrap_or_else(|| winansi_to_char(byte))
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let code_len = if self.composite { 2 } else { 1 };
        if let Some(cmap) = &self.to_unicode {
            let mut text = String::new();
            for (len, code) in cmap.codes(bytes, code_len) {
                if let Some(mapped) = cmap.get(len, code) {
                    text.push_str(mapped);
                } else if !self.composite && len == 1 {
                    text.push(self.simple_char(code as u8));
                }
            }
            return text;
        }
        if self.utf16 {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            return String::from_utf16_lossy(&units);
        }
        if self.composite {
            // Glyph ids without a ToUnicode map carry no recoverable text.
            return String::new();
        }
        if self.differences.is_empty() {
            return decode_string(bytes);
        }
        bytes.iter().map(|&b| self.simple_char(b)).collect()
    }
}

/// Fonts of a page's resources, keyed by the resource name `Tf` selects.
fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontDecoder> {
    let Some(fonts) = inherited(doc, page_id, b"Resources")
        .and_then(|r| r.as_dict().ok())
        .and_then(|r| r.get(b"Font").ok())
        .and_then(|f| resolve(doc, f).as_dict().ok())
    else {
        return HashMap::new();
    };

    let mut decoders = HashMap::new();
    for (name, font) in fonts.iter() {
        let Ok(font) = resolve(doc, font).as_dict() else {
            continue;
        };
        let decoder = FontDecoder::from_dict(doc, font);
        if decoder.composite && decoder.to_unicode.is_none() && !decoder.utf16 {
            log::warn!(
                "font {} has no ToUnicode map; its text cannot be extracted",
                String::from_utf8_lossy(name)
            );
        }
        decoders.insert(name.clone(), decoder);
    }
    decoders
}

/// Tracks the text line matrix so shown strings can be grouped by baseline.
struct LineCollector<'a> {
    fonts: &'a HashMap<Vec<u8>, FontDecoder>,
    font: Option<&'a FontDecoder>,
    line_matrix: [f32; 6],
    leading: f32,
    last_baseline: Option<f32>,
    lines: Vec<String>,
    current: String,
}

impl<'a> LineCollector<'a> {
    fn new(fonts: &'a HashMap<Vec<u8>, FontDecoder>) -> Self {
        LineCollector {
            fonts,
            font: None,
            line_matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            leading: 0.0,
            last_baseline: None,
            lines: Vec::new(),
            current: String::new(),
        }
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        let [a, b, c, d, e, f] = self.line_matrix;
        self.line_matrix[4] = tx * a + ty * c + e;
        self.line_matrix[5] = tx * b + ty * d + f;
    }

    fn next_line(&mut self) {
        self.translate(0.0, -self.leading);
    }

    fn show(&mut self, bytes: &[u8]) {
        let baseline = self.line_matrix[5];
        if let Some(last) = self.last_baseline
            && (last - baseline).abs() > SAME_LINE_TOLERANCE
        {
            self.lines.push(std::mem::take(&mut self.current));
        }
        self.last_baseline = Some(baseline);
        let text = match self.font {
            Some(font) => font.decode(bytes),
            None => decode_string(bytes),
        };
        self.current.push_str(&text);
    }

    fn gap(&mut self) {
        if self.last_baseline.is_some() && !self.current.ends_with(' ') {
            self.current.push(' ');
        }
    }

    fn apply(&mut self, op: &Operation) {
        let nums: Vec<f32> = op.operands.iter().filter_map(number).collect();
        match op.operator.as_str() {
            "BT" => self.line_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    self.font = self.fonts.get(name);
                }
            }
            "Td" => {
                if let [tx, ty] = nums[..] {
                    self.translate(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty] = nums[..] {
                    self.leading = -ty;
                    self.translate(tx, ty);
                }
            }
            "Tm" => {
                if let Ok(m) = <[f32; 6]>::try_from(nums.as_slice()) {
                    self.line_matrix = m;
                }
            }
            "TL" => {
                if let [tl] = nums[..] {
                    self.leading = tl;
                }
            }
            "T*" => self.next_line(),
            "Tj" | "'" | "\"" => {
                if op.operator != "Tj" {
                    self.next_line();
                }
                if let Some(Object::String(bytes, _)) = op.operands.last() {
                    self.show(bytes);
                }
            }
            "TJ" => {
                let Some(Object::Array(items)) = op.operands.first() else {
                    return;
                };
                for item in items {
                    match item {
                        Object::String(bytes, _) => self.show(bytes),
                        other => {
                            if number(other).is_some_and(|n| n < WORD_GAP) {
                                self.gap();
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> String {
        if !self.current.is_empty() || self.lines.is_empty() {
            self.lines.push(self.current);
        }
        self.lines.join("\n")
    }
}

/// Interpret text-showing operators and return the page text, one line per baseline.
fn extract_text(operations: &[Operation], fonts: &HashMap<Vec<u8>, FontDecoder>) -> String {
    let mut collector = LineCollector::new(fonts);
    for op in operations {
        collector.apply(op);
    }
    collector.finish()
}
