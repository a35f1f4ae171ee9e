//! Reading WordprocessingML packages into the layout model.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use crate::error::Error;
use crate::model::{Alignment, Document, LETTER, Margins, PageGeometry, Paragraph, Run};

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

type Node<'a> = roxmltree::Node<'a, 'a>;

struct LevelDef {
    num_fmt: String,
    lvl_text: String,
    start: u32,
    indent_left: f32,
    indent_hanging: f32,
}

#[derive(Default)]
struct Numbering {
    abstract_nums: HashMap<String, HashMap<u8, LevelDef>>,
    num_to_abstract: HashMap<String, String>,
}

struct ThemeFonts {
    major: String,
    minor: String,
}

struct Defaults {
    font_size: f32,
    font_name: String,
    space_after: f32,
    line_spacing: f32,
}

struct ParagraphStyle {
    based_on: Option<String>,
    font_size: Option<f32>,
    font_name: Option<String>,
    bold: Option<bool>,
    italic: Option<bool>,
    color: Option<[u8; 3]>,
    space_before: Option<f32>,
    space_after: Option<f32>,
    alignment: Option<Alignment>,
    contextual_spacing: Option<bool>,
}

struct Styles {
    defaults: Defaults,
    paragraph: HashMap<String, ParagraphStyle>,
}

impl Styles {
    /// Walk the `basedOn` chain until `pick` yields a value.
    fn lookup<T>(&self, style_id: Option<&str>, pick: impl Fn(&ParagraphStyle) -> Option<T>) -> Option<T> {
        let mut id = style_id;
        for _ in 0..16 {
            let style = self.paragraph.get(id?)?;
            if let Some(v) = pick(style) {
                return Some(v);
            }
            id = style.based_on.as_deref();
        }
        None
    }
}

fn twips_to_pts(twips: f32) -> f32 {
    twips / 20.0
}

fn is_wml(node: Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

fn wml<'a>(node: Node<'a>, name: &str) -> Option<Node<'a>> {
    node.children().find(|n| is_wml(*n, name))
}

fn wml_val<'a>(node: Node<'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

fn twips_attr(node: Node, attr: &str) -> Option<f32> {
    node.attribute((WML_NS, attr))
        .and_then(|v| v.parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(twips_to_pts)
}

/// Toggle properties such as `<w:b/>` or `<w:b w:val="0"/>`.
fn toggle(node: Node, name: &str) -> Option<bool> {
    let el = wml(node, name)?;
    Some(!matches!(
        el.attribute((WML_NS, "val")),
        Some("0" | "false" | "off")
    ))
}

fn half_points(node: Node) -> Option<f32> {
    wml_val(node, "sz")
        .and_then(|v| v.parse::<f32>().ok())
        .filter(|hp| hp.is_finite() && *hp > 0.0)
        .map(|hp| hp / 2.0)
}

fn parse_hex_color(val: &str) -> Option<[u8; 3]> {
    if val.len() != 6 || !val.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let [_, r, g, b] = u32::from_str_radix(val, 16).ok()?.to_be_bytes();
    Some([r, g, b])
}

fn parse_alignment(val: &str) -> Alignment {
    match val {
        "center" => Alignment::Center,
        "right" | "end" => Alignment::Right,
        "both" | "distribute" => Alignment::Justify,
        _ => Alignment::Left,
    }
}

fn read_part<R: Read + Seek>(zip: &mut zip::ZipArchive<R>, name: &str) -> Option<String> {
    let mut file = zip.by_name(name).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}

fn parse_theme<R: Read + Seek>(zip: &mut zip::ZipArchive<R>) -> ThemeFonts {
    let mut fonts = ThemeFonts {
        major: String::from("Aptos Display"),
        minor: String::from("Aptos"),
    };
    let Some(name) = zip
        .file_names()
        .find(|n| n.starts_with("word/theme/") && n.ends_with(".xml"))
        .map(str::to_string)
    else {
        return fonts;
    };
    let Some(content) = read_part(zip, &name) else {
        return fonts;
    };
    let Ok(xml) = roxmltree::Document::parse(&content) else {
        log::warn!("unreadable theme part {name}");
        return fonts;
    };

    for node in xml.descendants() {
        if node.tag_name().namespace() != Some(DML_NS) {
            continue;
        }
        let typeface = node
            .children()
            .find(|n| n.tag_name().name() == "latin")
            .and_then(|n| n.attribute("typeface"))
            .filter(|tf| !tf.is_empty());
        match (node.tag_name().name(), typeface) {
            ("majorFont", Some(tf)) => fonts.major = tf.to_string(),
            ("minorFont", Some(tf)) => fonts.minor = tf.to_string(),
            _ => {}
        }
    }
    fonts
}

fn resolve_font(rfonts: Node, theme: &ThemeFonts) -> Option<String> {
    if let Some(f) = rfonts.attribute((WML_NS, "ascii")) {
        return Some(f.to_string());
    }
    match rfonts.attribute((WML_NS, "asciiTheme")) {
        Some("majorHAnsi" | "majorAscii") => Some(theme.major.clone()),
        Some("minorHAnsi" | "minorAscii") => Some(theme.minor.clone()),
        _ => None,
    }
}

fn parse_styles<R: Read + Seek>(zip: &mut zip::ZipArchive<R>, theme: &ThemeFonts) -> Styles {
    let mut styles = Styles {
        defaults: Defaults {
            font_size: 12.0,
            font_name: theme.minor.clone(),
            space_after: 0.0,
            line_spacing: 1.0,
        },
        paragraph: HashMap::new(),
    };

    let Some(content) = read_part(zip, "word/styles.xml") else {
        return styles;
    };
    let Ok(xml) = roxmltree::Document::parse(&content) else {
        log::warn!("unreadable word/styles.xml, using defaults");
        return styles;
    };
    let root = xml.root_element();

    if let Some(doc_defaults) = wml(root, "docDefaults") {
        if let Some(rpr) = wml(doc_defaults, "rPrDefault").and_then(|n| wml(n, "rPr")) {
            if let Some(size) = half_points(rpr) {
                styles.defaults.font_size = size;
            }
            if let Some(name) = wml(rpr, "rFonts").and_then(|n| resolve_font(n, theme)) {
                styles.defaults.font_name = name;
            }
        }
        let spacing = wml(doc_defaults, "pPrDefault")
            .and_then(|n| wml(n, "pPr"))
            .and_then(|n| wml(n, "spacing"));
        if let Some(spacing) = spacing {
            if let Some(after) = twips_attr(spacing, "after") {
                styles.defaults.space_after = after;
            }
            if let Some(line) = line_factor(spacing) {
                styles.defaults.line_spacing = line;
            }
        }
    }

    for node in root.children().filter(|n| is_wml(*n, "style")) {
        if node.attribute((WML_NS, "type")) != Some("paragraph") {
            continue;
        }
        let Some(style_id) = node.attribute((WML_NS, "styleId")) else {
            continue;
        };
        let ppr = wml(node, "pPr");
        let rpr = wml(node, "rPr");
        let spacing = ppr.and_then(|n| wml(n, "spacing"));

        styles.paragraph.insert(
            style_id.to_string(),
            ParagraphStyle {
                based_on: wml_val(node, "basedOn").map(str::to_string),
                font_size: rpr.and_then(half_points),
                font_name: rpr
                    .and_then(|n| wml(n, "rFonts"))
                    .and_then(|n| resolve_font(n, theme)),
                bold: rpr.and_then(|n| toggle(n, "b")),
                italic: rpr.and_then(|n| toggle(n, "i")),
                color: rpr.and_then(|n| wml_val(n, "color")).and_then(parse_hex_color),
                space_before: spacing.and_then(|n| twips_attr(n, "before")),
                space_after: spacing.and_then(|n| twips_attr(n, "after")),
                alignment: ppr.and_then(|n| wml_val(n, "jc")).map(parse_alignment),
                contextual_spacing: ppr.and_then(|n| toggle(n, "contextualSpacing")),
            },
        );
    }

    styles
}

/// Auto line spacing as a multiple of single spacing.
fn line_factor(spacing: Node) -> Option<f32> {
    let rule = spacing.attribute((WML_NS, "lineRule")).unwrap_or("auto");
    if rule != "auto" {
        return None;
    }
    spacing
        .attribute((WML_NS, "line"))
        .and_then(|v| v.parse::<f32>().ok())
        .filter(|line| line.is_finite() && *line > 0.0)
        .map(|line| line / 240.0)
}

fn parse_numbering<R: Read + Seek>(zip: &mut zip::ZipArchive<R>) -> Numbering {
    let mut numbering = Numbering::default();
    let Some(content) = read_part(zip, "word/numbering.xml") else {
        return numbering;
    };
    let Ok(xml) = roxmltree::Document::parse(&content) else {
        log::warn!("unreadable word/numbering.xml, lists lose their labels");
        return numbering;
    };

    for node in xml.root_element().children() {
        if is_wml(node, "abstractNum") {
            let Some(abs_id) = node.attribute((WML_NS, "abstractNumId")) else {
                continue;
            };
            let mut levels = HashMap::new();
            for lvl in node.children().filter(|n| is_wml(*n, "lvl")) {
                let Some(ilvl) = lvl
                    .attribute((WML_NS, "ilvl"))
                    .and_then(|v| v.parse::<u8>().ok())
                else {
                    continue;
                };
                let ind = wml(lvl, "pPr").and_then(|n| wml(n, "ind"));
                levels.insert(
                    ilvl,
                    LevelDef {
                        num_fmt: wml_val(lvl, "numFmt").unwrap_or("bullet").to_string(),
                        lvl_text: wml_val(lvl, "lvlText").unwrap_or("").to_string(),
                        start: wml_val(lvl, "start")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(1),
                        indent_left: ind.and_then(|n| twips_attr(n, "left")).unwrap_or(0.0),
                        indent_hanging: ind.and_then(|n| twips_attr(n, "hanging")).unwrap_or(0.0),
                    },
                );
            }
            numbering.abstract_nums.insert(abs_id.to_string(), levels);
        } else if is_wml(node, "num") {
            let (Some(num_id), Some(abs_id)) = (
                node.attribute((WML_NS, "numId")),
                wml_val(node, "abstractNumId"),
            ) else {
                continue;
            };
            numbering
                .num_to_abstract
                .insert(num_id.to_string(), abs_id.to_string());
        }
    }
    numbering
}

fn roman(mut n: u32) -> String {
    const NUMERALS: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    if n == 0 || n >= 4000 {
        return n.to_string();
    }
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// Word's letter numbering: a..z, then aa..zz, and so on.
fn letters(n: u32, first: u8) -> String {
    let n = n.max(1) - 1;
    let letter = char::from(first + (n % 26) as u8);
    letter.to_string().repeat((n / 26 + 1) as usize)
}

fn format_number(n: u32, num_fmt: &str) -> String {
    match num_fmt {
        "lowerLetter" => letters(n, b'a'),
        "upperLetter" => letters(n, b'A'),
        "lowerRoman" => roman(n).to_lowercase(),
        "upperRoman" => roman(n),
        "decimalZero" => format!("{n:02}"),
        _ => n.to_string(),
    }
}

/// Counters for numbered lists, keyed by (numId, level).
type ListCounters = HashMap<(String, u8), u32>;

fn list_info(num_pr: Node, numbering: &Numbering, counters: &mut ListCounters) -> Option<(f32, f32, String)> {
    let num_id = wml_val(num_pr, "numId")?;
    let ilvl = wml_val(num_pr, "ilvl")
        .and_then(|v| v.parse::<u8>().ok())
        .unwrap_or(0);
    let levels = numbering
        .num_to_abstract
        .get(num_id)
        .and_then(|abs| numbering.abstract_nums.get(abs))?;
    let def = levels.get(&ilvl)?;

    // Starting a level restarts every deeper level of the same list.
    counters.retain(|(id, lvl), _| id.as_str() != num_id || *lvl <= ilvl);
    counters
        .entry((num_id.to_string(), ilvl))
        .and_modify(|c| *c += 1)
        .or_insert(def.start);

    let label = match def.num_fmt.as_str() {
        "bullet" => "\u{2022}".to_string(),
        "none" => String::new(),
        _ => {
            // `%k` in the level text is the current number of level k-1.
            let mut label = def.lvl_text.clone();
            for k in 0..=ilvl {
                let placeholder = format!("%{}", k + 1);
                if !label.contains(&placeholder) {
                    continue;
                }
                let level = levels.get(&k);
                let value = counters
                    .get(&(num_id.to_string(), k))
                    .copied()
                    .or(level.map(|l| l.start))
                    .unwrap_or(1);
                let num_fmt = level.map_or("decimal", |l| l.num_fmt.as_str());
                label = label.replace(&placeholder, &format_number(value, num_fmt));
            }
            label
        }
    };
    Some((def.indent_left, def.indent_hanging, label))
}

struct Context {
    theme: ThemeFonts,
    styles: Styles,
    numbering: Numbering,
    counters: ListCounters,
}

impl Context {
    fn paragraph(&mut self, node: Node) -> Paragraph {
        let ppr = wml(node, "pPr");
        let style_id = ppr.and_then(|n| wml_val(n, "pStyle")).map(str::to_string);
        let sid = style_id.as_deref();
        let inline_spacing = ppr.and_then(|n| wml(n, "spacing"));

        let space_before = inline_spacing
            .and_then(|n| twips_attr(n, "before"))
            .or_else(|| self.styles.lookup(sid, |s| s.space_before))
            .unwrap_or(0.0);
        let space_after = inline_spacing
            .and_then(|n| twips_attr(n, "after"))
            .or_else(|| self.styles.lookup(sid, |s| s.space_after))
            .unwrap_or(self.styles.defaults.space_after);
        let alignment = ppr
            .and_then(|n| wml_val(n, "jc"))
            .map(parse_alignment)
            .or_else(|| self.styles.lookup(sid, |s| s.alignment))
            .unwrap_or(Alignment::Left);
        let contextual_spacing = ppr
            .and_then(|n| toggle(n, "contextualSpacing"))
            .or_else(|| self.styles.lookup(sid, |s| s.contextual_spacing))
            .unwrap_or(false);
        let line_spacing = inline_spacing.and_then(line_factor);

        let (mut indent_left, mut indent_hanging, list_label) = ppr
            .and_then(|n| wml(n, "numPr"))
            .and_then(|n| list_info(n, &self.numbering, &mut self.counters))
            .unwrap_or((0.0, 0.0, String::new()));
        if let Some(ind) = ppr.and_then(|n| wml(n, "ind")) {
            if let Some(v) = twips_attr(ind, "left").or_else(|| twips_attr(ind, "start")) {
                indent_left = v;
            }
            if let Some(v) = twips_attr(ind, "hanging") {
                indent_hanging = v;
            }
        }

        let base = Run {
            text: String::new(),
            font_size: self
                .styles
                .lookup(sid, |s| s.font_size)
                .unwrap_or(self.styles.defaults.font_size),
            font_name: self
                .styles
                .lookup(sid, |s| s.font_name.clone())
                .unwrap_or_else(|| self.styles.defaults.font_name.clone()),
            bold: self.styles.lookup(sid, |s| s.bold).unwrap_or(false),
            italic: self.styles.lookup(sid, |s| s.italic).unwrap_or(false),
            color: self.styles.lookup(sid, |s| s.color),
        };

        let mut runs = Vec::new();
        self.collect_runs(node, &base, &mut runs);

        Paragraph {
            runs,
            space_before,
            space_after,
            alignment,
            indent_left,
            indent_hanging,
            list_label,
            contextual_spacing,
            style_id,
            line_spacing,
        }
    }

    /// Runs may sit directly in the paragraph or inside hyperlinks, smart tags
    /// and inserted-text wrappers.
    fn collect_runs(&self, parent: Node, base: &Run, runs: &mut Vec<Run>) {
        for child in parent.children() {
            if is_wml(child, "r") {
                if let Some(run) = self.run(child, base) {
                    runs.push(run);
                }
            } else if ["hyperlink", "ins", "smartTag", "fldSimple", "sdt", "sdtContent"]
                .iter()
                .any(|name| is_wml(child, name))
            {
                self.collect_runs(child, base, runs);
            }
        }
    }

    fn run(&self, node: Node, base: &Run) -> Option<Run> {
        let rpr = wml(node, "rPr");
        let mut text = String::new();
        for child in node.children() {
            if is_wml(child, "t") {
                text.push_str(child.text().unwrap_or(""));
            } else if is_wml(child, "tab") {
                text.push('\t');
            } else if is_wml(child, "br") || is_wml(child, "cr") {
                text.push('\n');
            }
        }
        if text.is_empty() {
            return None;
        }
        Some(Run {
            text,
            font_size: rpr.and_then(half_points).unwrap_or(base.font_size),
            font_name: rpr
                .and_then(|n| wml(n, "rFonts"))
                .and_then(|n| resolve_font(n, &self.theme))
                .unwrap_or_else(|| base.font_name.clone()),
            bold: rpr.and_then(|n| toggle(n, "b")).unwrap_or(base.bold),
            italic: rpr.and_then(|n| toggle(n, "i")).unwrap_or(base.italic),
            color: rpr
                .and_then(|n| wml_val(n, "color"))
                .and_then(parse_hex_color)
                .or(base.color),
        })
    }

    fn blocks(&mut self, parent: Node, out: &mut Vec<Paragraph>) {
        for node in parent.children() {
            if is_wml(node, "p") {
                out.push(self.paragraph(node));
            } else if is_wml(node, "tbl") {
                // Tables are flattened: each cell's paragraphs in reading order.
                for row in node.children().filter(|n| is_wml(*n, "tr")) {
                    for cell in row.children().filter(|n| is_wml(*n, "tc")) {
                        self.blocks(cell, out);
                    }
                }
            } else if is_wml(node, "sdt") {
                if let Some(content) = wml(node, "sdtContent") {
                    self.blocks(content, out);
                }
            }
        }
    }
}

/// Section properties of the first section: the first paragraph-level
/// `w:sectPr`, or the body's own when the document has a single section.
fn first_section(body: Node) -> Option<Node> {
    body.children()
        .filter(|n| is_wml(*n, "p"))
        .find_map(|p| wml(p, "pPr").and_then(|ppr| wml(ppr, "sectPr")))
        .or_else(|| wml(body, "sectPr"))
}

fn section_layout(sect: Option<Node>) -> (PageGeometry, Margins) {
    let pg_sz = sect.and_then(|s| wml(s, "pgSz"));
    let pg_mar = sect.and_then(|s| wml(s, "pgMar"));
    let mut page = PageGeometry {
        width: pg_sz.and_then(|n| twips_attr(n, "w")).unwrap_or(LETTER.width),
        height: pg_sz.and_then(|n| twips_attr(n, "h")).unwrap_or(LETTER.height),
    };
    if pg_sz.and_then(|n| n.attribute((WML_NS, "orient"))) == Some("landscape") && page.width < page.height {
        std::mem::swap(&mut page.width, &mut page.height);
    }
    let fallback = Margins::default();
    let margins = Margins {
        top: pg_mar.and_then(|n| twips_attr(n, "top")).map_or(fallback.top, f32::abs),
        bottom: pg_mar.and_then(|n| twips_attr(n, "bottom")).map_or(fallback.bottom, f32::abs),
        left: pg_mar.and_then(|n| twips_attr(n, "left")).unwrap_or(fallback.left),
        right: pg_mar.and_then(|n| twips_attr(n, "right")).unwrap_or(fallback.right),
    };
    (page, margins)
}

pub fn parse(path: &Path) -> Result<Document, Error> {
    let file = std::fs::File::open(path)?;
    parse_reader(file)
}

pub fn parse_reader<R: Read + Seek>(reader: R) -> Result<Document, Error> {
    let mut zip = zip::ZipArchive::new(reader)?;

    let theme = parse_theme(&mut zip);
    let styles = parse_styles(&mut zip, &theme);
    let numbering = parse_numbering(&mut zip);

    let content = read_part(&mut zip, "word/document.xml")
        .ok_or_else(|| Error::InvalidDocx("missing word/document.xml".into()))?;
    let xml = roxmltree::Document::parse(&content)?;
    let body = wml(xml.root_element(), "body")
        .ok_or_else(|| Error::InvalidDocx("missing w:body".into()))?;

    let (page, margins) = section_layout(first_section(body));
    log::debug!("first section: {}x{}pt", page.width, page.height);

    let line_spacing = styles.defaults.line_spacing;
    let mut ctx = Context {
        theme,
        styles,
        numbering,
        counters: ListCounters::new(),
    };
    let mut paragraphs = Vec::new();
    ctx.blocks(body, &mut paragraphs);

    Ok(Document {
        page,
        margins,
        line_spacing,
        paragraphs,
    })
}
