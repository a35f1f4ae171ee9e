use pdf_writer::{Content, Name, Pdf, Rect, Ref, Str};

use crate::error::Error;
use crate::fonts::{FontBook, first_unencodable, to_winansi_bytes};
use crate::model::{Alignment, Document, Paragraph};

/// Size used for the line height of paragraphs without runs.
const EMPTY_PARAGRAPH_SIZE: f32 = 11.0;

/// A stretch of text in one font, size and colour.
#[derive(Clone, Debug)]
struct Piece {
    font: usize,
    size: f32,
    color: [u8; 3],
    bytes: Vec<u8>,
    width: f32,
    space: bool,
}

enum Token {
    Piece(Piece),
    Break,
}

#[derive(Default)]
struct Line {
    pieces: Vec<Piece>,
    width: f32,
    /// Ended by an explicit break or the end of the paragraph.
    hard_end: bool,
}

impl Line {
    fn trim_trailing_spaces(&mut self) {
        while self.pieces.last().is_some_and(|p| p.space) {
            if let Some(p) = self.pieces.pop() {
                self.width -= p.width;
            }
        }
    }

    fn spaces(&self) -> usize {
        self.pieces
            .iter()
            .map(|p| p.bytes.iter().filter(|&&b| b == b' ').count())
            .sum()
    }
}

/// Greedy line breaking. `first_width` applies to the first line only.
fn wrap(tokens: Vec<Token>, first_width: f32, width: f32) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line = Line::default();
    let avail = |lines: &Vec<Line>| if lines.is_empty() { first_width } else { width };

    for token in tokens {
        let piece = match token {
            Token::Break => {
                line.hard_end = true;
                lines.push(std::mem::take(&mut line));
                continue;
            }
            Token::Piece(piece) => piece,
        };
        if piece.space {
            // Soft-wrapped lines do not start with whitespace.
            let wrapped = !lines.is_empty() && lines.last().is_some_and(|l: &Line| !l.hard_end);
            if line.pieces.is_empty() && wrapped {
                continue;
            }
        } else if line.width + piece.width > avail(&lines) && line.pieces.iter().any(|p| !p.space) {
            line.trim_trailing_spaces();
            lines.push(std::mem::take(&mut line));
        }
        line.width += piece.width;
        line.pieces.push(piece);
    }
    line.trim_trailing_spaces();
    line.hard_end = true;
    lines.push(line);
    lines
}

struct PageOut {
    content: Content,
    /// Whether anything was placed on the page yet.
    used: bool,
}

struct Layout<'a> {
    doc: &'a Document,
    pdf: Pdf,
    fonts: FontBook,
    next_ref: i32,
    pages: Vec<PageOut>,
    cursor_y: f32,
}

impl Layout<'_> {
    fn alloc(&mut self) -> Ref {
        self.next_ref += 1;
        Ref::new(self.next_ref)
    }

    fn top(&self) -> f32 {
        self.doc.page.height - self.doc.margins.top
    }

    fn new_page(&mut self) {
        self.pages.push(PageOut {
            content: Content::new(),
            used: false,
        });
        self.cursor_y = self.top();
    }

    fn tokens(&mut self, para: &Paragraph) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut next = self.next_ref;
        let mut alloc = || {
            next += 1;
            Ref::new(next)
        };
        for run in &para.runs {
            let font = self
                .fonts
                .register(&mut self.pdf, &run.font_name, run.bold, run.italic, &mut alloc);
            let entry = self.fonts.get(font);
            let color = run.color.unwrap_or([0, 0, 0]);
            for (i, segment) in run.text.split('\n').enumerate() {
                if i > 0 {
                    tokens.push(Token::Break);
                }
                let mut word = String::new();
                let push = |word: &mut String, space: bool, tokens: &mut Vec<Token>| {
                    if word.is_empty() {
                        return;
                    }
                    let bytes = to_winansi_bytes(word);
                    let width = entry.text_width(&bytes, run.font_size);
                    tokens.push(Token::Piece(Piece {
                        font,
                        size: run.font_size,
                        color,
                        bytes,
                        width,
                        space,
                    }));
                    word.clear();
                };
                let mut in_space = false;
                for c in segment.chars() {
                    let is_space = c == ' ' || c == '\t';
                    if is_space != in_space {
                        push(&mut word, in_space, &mut tokens);
                        in_space = is_space;
                    }
                    word.push(c);
                }
                push(&mut word, in_space, &mut tokens);
            }
        }
        self.next_ref = next;
        tokens
    }

    fn line_metrics(&self, line: &Line, fallback_size: f32, spacing: f32) -> (f32, f32) {
        let (ascent, height) = line.pieces.iter().fold((0.0f32, 0.0f32), |(a, h), p| {
            let entry = self.fonts.get(p.font);
            (
                a.max(p.size * entry.ascender_ratio),
                h.max(p.size * entry.line_height_ratio),
            )
        });
        if height == 0.0 {
            (fallback_size * 0.75, fallback_size * 1.15 * spacing)
        } else {
            (ascent, height * spacing)
        }
    }

    fn paragraph(&mut self, para: &Paragraph, gap: f32) {
        let doc = self.doc;
        let column_left = doc.margins.left;
        let column_width = doc.page.width - doc.margins.left - doc.margins.right;

        let has_label = !para.list_label.is_empty();
        let text_left = column_left + para.indent_left;
        let first_left = if has_label {
            text_left
        } else {
            text_left - para.indent_hanging
        };
        let right = column_left + column_width;

        let tokens = self.tokens(para);
        let lines = wrap(tokens, right - first_left, right - text_left);
        let spacing = para.line_spacing.unwrap_or(doc.line_spacing);
        let fallback_size = para.runs.first().map_or(EMPTY_PARAGRAPH_SIZE, |r| r.font_size);

        self.cursor_y -= gap;
        for (i, line) in lines.iter().enumerate() {
            let (ascent, height) = self.line_metrics(line, fallback_size, spacing);
            let page_used = self.pages.last().is_some_and(|p| p.used);
            if self.cursor_y - height < doc.margins.bottom && page_used {
                self.new_page();
            }
            let baseline = self.cursor_y - ascent;
            let left = if i == 0 { first_left } else { text_left };
            let avail = right - left;

            let mut x = match para.alignment {
                Alignment::Left | Alignment::Justify => left,
                Alignment::Center => left + (avail - line.width).max(0.0) / 2.0,
                Alignment::Right => left + (avail - line.width).max(0.0),
            };
            let word_spacing = match (para.alignment, line.hard_end, line.spaces()) {
                (Alignment::Justify, false, n) if n > 0 => (avail - line.width).max(0.0) / n as f32,
                _ => 0.0,
            };

            if i == 0 && has_label {
                self.emit_label(para, baseline);
            }
            for piece in &line.pieces {
                self.emit(piece, x, baseline, word_spacing);
                x += piece.width + word_spacing * piece.bytes.iter().filter(|&&b| b == b' ').count() as f32;
            }
            if let Some(page) = self.pages.last_mut() {
                page.used = true;
            }
            self.cursor_y -= height;
        }
    }

    fn emit_label(&mut self, para: &Paragraph, baseline: f32) {
        let Some(run) = para.runs.first() else {
            return;
        };
        let mut next = self.next_ref;
        let mut alloc = || {
            next += 1;
            Ref::new(next)
        };
        let font = self
            .fonts
            .register(&mut self.pdf, &run.font_name, run.bold, run.italic, &mut alloc);
        self.next_ref = next;
        let bytes = to_winansi_bytes(&para.list_label);
        let label = Piece {
            font,
            size: run.font_size,
            color: run.color.unwrap_or([0, 0, 0]),
            width: self.fonts.get(font).text_width(&bytes, run.font_size),
            bytes,
            space: false,
        };
        let x = self.doc.margins.left + para.indent_left - para.indent_hanging;
        self.emit(&label, x, baseline, 0.0);
    }

    fn emit(&mut self, piece: &Piece, x: f32, y: f32, word_spacing: f32) {
        let name = self.fonts.get(piece.font).pdf_name.clone();
        let [r, g, b] = piece.color.map(|c| c as f32 / 255.0);
        let Some(page) = self.pages.last_mut() else {
            return;
        };
        page.content
            .begin_text()
            .set_font(Name(name.as_bytes()), piece.size)
            .set_fill_rgb(r, g, b)
            .set_word_spacing(word_spacing)
            .next_line(x, y)
            .show(Str(piece.bytes.as_slice()))
            .end_text();
    }
}

/// Lay out the document on as many pages as it needs and serialize the PDF.
pub fn render(doc: &Document) -> Result<Vec<u8>, Error> {
    let page = doc.page;
    if !(page.width > 0.0 && page.height > 0.0) {
        return Err(Error::InvalidDocx(format!(
            "invalid page size {}x{}",
            page.width, page.height
        )));
    }
    if page.width - doc.margins.left - doc.margins.right <= 0.0
        || page.height - doc.margins.top - doc.margins.bottom <= 0.0
    {
        return Err(Error::InvalidDocx("margins leave no room for text".into()));
    }
    let texts = doc
        .paragraphs
        .iter()
        .flat_map(|p| p.runs.iter().map(|r| r.text.as_str()).chain([p.list_label.as_str()]));
    for text in texts {
        if let Some(c) = first_unencodable(text) {
            return Err(Error::UnsupportedFormat(format!(
                "U+{:04X} is outside Windows-1252; the builtin renderer cannot show it, use LibreOffice",
                c as u32
            )));
        }
    }

    let catalog_id = Ref::new(1);
    let pages_id = Ref::new(2);
    let mut layout = Layout {
        doc,
        pdf: Pdf::new(),
        fonts: FontBook::new(),
        next_ref: 2,
        pages: Vec::new(),
        cursor_y: 0.0,
    };
    layout.new_page();

    let mut prev: Option<&Paragraph> = None;
    for para in &doc.paragraphs {
        let collapse = para.contextual_spacing
            && prev.is_some_and(|p| p.style_id == para.style_id);
        let gap = match prev {
            None => para.space_before,
            Some(_) if collapse => 0.0,
            Some(p) => p.space_after + para.space_before,
        };
        layout.paragraph(para, gap);
        prev = Some(para);
    }

    let page_refs: Vec<(Ref, Ref)> = (0..layout.pages.len())
        .map(|_| (layout.alloc(), layout.alloc()))
        .collect();
    log::debug!("rendered {} page(s)", page_refs.len());

    let Layout {
        mut pdf,
        fonts,
        pages,
        ..
    } = layout;

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_refs.iter().map(|(page_id, _)| *page_id))
        .count(page_refs.len() as i32);

    for (out, (page_id, content_id)) in pages.into_iter().zip(&page_refs) {
        pdf.stream(*content_id, &out.content.finish());

        let mut page_writer = pdf.page(*page_id);
        page_writer
            .media_box(Rect::new(0.0, 0.0, page.width, page.height))
            .parent(pages_id)
            .contents(*content_id);
        let mut resources = page_writer.resources();
        let mut font_dict = resources.fonts();
        for entry in fonts.entries() {
            font_dict.pair(Name(entry.pdf_name.as_bytes()), entry.font_ref);
        }
    }

    Ok(pdf.finish())
}
