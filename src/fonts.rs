use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use pdf_writer::types::FontFlags;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

/// Windows-1252 code points in 0x80..=0x9F that differ from Latin-1.
const WINANSI_HIGH: [(u8, char); 27] = [
    (0x80, '\u{20AC}'),
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'),
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'),
    (0x96, '\u{2013}'),
    (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'),
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

pub(crate) fn winansi_to_char(byte: u8) -> char {
    WINANSI_HIGH
        .iter()
        .find(|(b, _)| *b == byte)
        .map_or(byte as char, |(_, c)| *c)
}

fn char_to_winansi(c: char) -> Option<u8> {
    match c as u32 {
        0x20..=0x7E | 0xA0..=0xFF => Some(c as u8),
        _ => WINANSI_HIGH.iter().find(|(_, wc)| *wc == c).map(|(b, _)| *b),
    }
}

/// First character of `s` that no WinAnsi font can show. Line breaks and tabs
/// are layout, not glyphs, and never count.
pub(crate) fn first_unencodable(s: &str) -> Option<char> {
    s.chars()
        .find(|&c| !matches!(c, '\t' | '\n' | '\r') && char_to_winansi(c).is_none())
}

/// Encode text for a WinAnsi font. Tabs become spaces, characters outside
/// Windows-1252 become `?`.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| match c {
            '\t' => b' ',
            c => char_to_winansi(c).unwrap_or(b'?'),
        })
        .collect()
}

/// (lowercase family name, bold, italic) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool, bool), (PathBuf, u32)>;

static FONT_INDEX: OnceLock<FontLookup> = OnceLock::new();

fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Some(val) = std::env::var_os("DOCFLIP_FONTS") {
        dirs.extend(std::env::split_paths(&val).filter(|p| !p.as_os_str().is_empty()));
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        let windir = std::env::var_os("WINDIR").map_or_else(|| PathBuf::from("C:\\Windows"), PathBuf::from);
        dirs.push(windir.join("Fonts"));
    }

    dirs
}

fn family_name(face: &Face) -> Option<String> {
    // Name ID 1 keeps "Aptos Display" apart from "Aptos"; ID 16 would merge them.
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::FAMILY && name.is_unicode())
        .find_map(|name| name.to_string())
}

fn scan_font_dirs() -> FontLookup {
    let mut index = FontLookup::new();
    let mut stack = font_directories();
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.flatten().map(|e| e.path()) {
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            // CFF-flavoured .otf files cannot go into a FontFile2 stream.
            let is_collection = match ext.as_deref() {
                Some("ttf") => false,
                Some("ttc") => true,
                _ => continue,
            };
            let Ok(data) = std::fs::read(&path) else {
                continue;
            };
            let faces = if is_collection {
                ttf_parser::fonts_in_collection(&data).unwrap_or(1)
            } else {
                1
            };
            for face_index in 0..faces {
                let Ok(face) = Face::parse(&data, face_index) else {
                    continue;
                };
                if let Some(family) = family_name(&face) {
                    index
                        .entry((family.to_lowercase(), face.is_bold(), face.is_italic()))
                        .or_insert((path.clone(), face_index));
                }
            }
        }
    }
    log::debug!("indexed {} font faces", index.len());
    index
}

/// Font file for a family and style, falling back to the regular face.
fn find_font_file(family: &str, bold: bool, italic: bool) -> Option<(PathBuf, u32)> {
    let index = FONT_INDEX.get_or_init(scan_font_dirs);
    let key = family.to_lowercase();
    index
        .get(&(key.clone(), bold, italic))
        .or_else(|| index.get(&(key, false, false)))
        .cloned()
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi chars 32..=255.
fn helvetica_widths(bold: bool) -> Vec<f32> {
    let scale = if bold { 1.06 } else { 1.0 };
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,
            33..=47 => 333.0,
            48..=57 => 556.0,
            58..=64 => 333.0,
            73 | 74 => 278.0,
            77 => 833.0,
            65..=90 => 667.0,
            91..=96 => 333.0,
            102 | 105 | 106 | 108 | 116 => 278.0,
            109 | 119 => 833.0,
            97..=122 => 556.0,
            _ => 556.0,
        })
        .map(|w| w * scale)
        .collect()
}

fn helvetica_variant(bold: bool, italic: bool) -> &'static [u8] {
    match (bold, italic) {
        (false, false) => b"Helvetica",
        (true, false) => b"Helvetica-Bold",
        (false, true) => b"Helvetica-Oblique",
        (true, true) => b"Helvetica-BoldOblique",
    }
}

pub(crate) struct FontEntry {
    pub(crate) pdf_name: String,
    pub(crate) font_ref: Ref,
    widths_1000: Vec<f32>,
    /// Ascender and line height as fractions of the font size.
    pub(crate) ascender_ratio: f32,
    pub(crate) line_height_ratio: f32,
}

impl FontEntry {
    /// Advance width of WinAnsi-encoded `bytes` at `size` points.
    pub(crate) fn text_width(&self, bytes: &[u8], size: f32) -> f32 {
        let units: f32 = bytes
            .iter()
            .map(|&b| {
                b.checked_sub(32)
                    .and_then(|i| self.widths_1000.get(i as usize))
                    .copied()
                    .unwrap_or(0.0)
            })
            .sum();
        units * size / 1000.0
    }
}

struct Metrics {
    widths: Vec<f32>,
    ascender_ratio: f32,
    line_height_ratio: f32,
}

/// Embed a TrueType/OpenType face as a simple WinAnsi font.
fn embed_truetype(pdf: &mut Pdf, refs: [Ref; 3], family: &str, italic: bool, data: &[u8], face_index: u32) -> Option<Metrics> {
    let [font_ref, descriptor_ref, data_ref] = refs;
    let face = Face::parse(data, face_index).ok()?;
    let units = face.units_per_em() as f32;
    let scale = |v: f32| v / units * 1000.0;

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        scale(bb.x_min as f32),
        scale(bb.y_min as f32),
        scale(bb.x_max as f32),
        scale(bb.y_max as f32),
    );
    let widths: Vec<f32> = (32u8..=255u8)
        .map(|byte| {
            face.glyph_index(winansi_to_char(byte))
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map_or(0.0, |adv| scale(adv as f32))
        })
        .collect();

    let data_len = i32::try_from(data.len()).ok()?;
    pdf.stream(data_ref, data).pair(Name(b"Length1"), data_len);

    let ps_name = family.replace(' ', "");
    let mut flags = FontFlags::NON_SYMBOLIC;
    if italic {
        flags |= FontFlags::ITALIC;
    }
    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(flags)
        .bbox(bbox)
        .italic_angle(if italic { -12.0 } else { 0.0 })
        .ascent(scale(face.ascender() as f32))
        .descent(scale(face.descender() as f32))
        .cap_height(face.capital_height().map_or(700.0, |h| scale(h as f32)))
        .stem_v(80.0)
        .font_file2(data_ref);

    {
        let mut dict = pdf.indirect(font_ref).dict();
        dict.pair(Name(b"Type"), Name(b"Font"));
        dict.pair(Name(b"Subtype"), Name(b"TrueType"));
        dict.pair(Name(b"BaseFont"), Name(ps_name.as_bytes()));
        dict.pair(Name(b"Encoding"), Name(b"WinAnsiEncoding"));
        dict.pair(Name(b"FirstChar"), 32i32);
        dict.pair(Name(b"LastChar"), 255i32);
        dict.pair(Name(b"FontDescriptor"), descriptor_ref);
        dict.insert(Name(b"Widths")).array().items(widths.iter().copied());
    }

    let ascender = face.ascender() as f32;
    let descender = face.descender() as f32;
    Some(Metrics {
        widths,
        ascender_ratio: ascender / units,
        line_height_ratio: (ascender - descender + face.line_gap() as f32) / units,
    })
}

/// Fonts registered in one PDF, keyed by family and style.
pub(crate) struct FontBook {
    entries: Vec<FontEntry>,
    keys: HashMap<(String, bool, bool), usize>,
}

impl FontBook {
    pub(crate) fn new() -> Self {
        FontBook {
            entries: Vec::new(),
            keys: HashMap::new(),
        }
    }

    pub(crate) fn entries(&self) -> &[FontEntry] {
        &self.entries
    }

    pub(crate) fn get(&self, index: usize) -> &FontEntry {
        &self.entries[index]
    }

    /// Index of the font for `family`/`bold`/`italic`, embedding it on first use.
    pub(crate) fn register(
        &mut self,
        pdf: &mut Pdf,
        family: &str,
        bold: bool,
        italic: bool,
        alloc: &mut impl FnMut() -> Ref,
    ) -> usize {
        let family = family.split(';').next().unwrap_or(family).trim();
        let key = (family.to_lowercase(), bold, italic);
        if let Some(&index) = self.keys.get(&key) {
            return index;
        }

        let refs = [alloc(), alloc(), alloc()];
        let metrics = find_font_file(family, bold, italic)
            .and_then(|(path, face_index)| {
                let data = std::fs::read(&path).ok()?;
                embed_truetype(pdf, refs, family, italic, &data, face_index)
            })
            .unwrap_or_else(|| {
                log::warn!("font not found: {family} bold={bold} italic={italic}, using Helvetica");
                pdf.type1_font(refs[0])
                    .base_font(Name(helvetica_variant(bold, italic)))
                    .encoding_predefined(Name(b"WinAnsiEncoding"));
                Metrics {
                    widths: helvetica_widths(bold),
                    ascender_ratio: 0.718,
                    line_height_ratio: 1.15,
                }
            });

        let index = self.entries.len();
        self.entries.push(FontEntry {
            pdf_name: format!("F{}", index + 1),
            font_ref: refs[0],
            widths_1000: metrics.widths,
            ascender_ratio: metrics.ascender_ratio,
            line_height_ratio: metrics.line_height_ratio,
        });
        self.keys.insert(key, index);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winansi_maps_both_ways() {
        assert_eq!(winansi_to_char(0x93), '\u{201C}');
        assert_eq!(winansi_to_char(b'A'), 'A');
        assert_eq!(winansi_to_char(0xE9), '\u{e9}');
        assert_eq!(to_winansi_bytes("\u{201C}é\u{2022}"), [0x93, 0xE9, 0x95]);
    }

    #[test]
    fn unencodable_characters_become_question_marks() {
        assert_eq!(to_winansi_bytes("a\u{4E2D}\tb"), b"a? b");
        assert_eq!(first_unencodable("caf\u{e9}\t\u{2014}\n"), None);
        assert_eq!(first_unencodable("ok \u{4F60}\u{597D}"), Some('\u{4F60}'));
    }

    #[test]
    fn unknown_family_falls_back_to_helvetica() {
        let mut pdf = Pdf::new();
        let mut next = 10;
        let mut alloc = || {
            next += 1;
            Ref::new(next)
        };
        let mut book = FontBook::new();
        let regular = book.register(&mut pdf, "No Such Family 1234", false, false, &mut alloc);
        let again = book.register(&mut pdf, "no such family 1234", false, false, &mut alloc);
        let bold = book.register(&mut pdf, "No Such Family 1234", true, false, &mut alloc);
        assert_eq!(regular, again);
        assert_ne!(regular, bold);
        assert_eq!(book.get(regular).pdf_name, "F1");

        let width = book.get(regular).text_width(b"ab", 10.0);
        assert!((width - 11.12).abs() < 0.01);
    }
}
