use std::path::Path;

/// File formats a drop can be converted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Pdf,
    Doc,
    Docx,
}

impl Format {
    /// Tag a path by its extension, ignoring case. `None` for anything else.
    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Format::Pdf),
            "doc" => Some(Format::Doc),
            "docx" => Some(Format::Docx),
            _ => None,
        }
    }

    /// Extension of the file this format converts into.
    pub fn target_extension(self) -> &'static str {
        match self {
            Format::Pdf => "docx",
            Format::Doc | Format::Docx => "pdf",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Format::Pdf => Direction::PdfToWord,
            Format::Doc | Format::Docx => Direction::WordToPdf,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    PdfToWord,
    WordToPdf,
}
