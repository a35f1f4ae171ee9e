mod cmap;
mod config;
mod docx;
mod docx_writer;
mod error;
mod fonts;
mod format;
mod frontend;
mod model;
mod naming;
mod pdf;
mod pdf_text;
mod soffice;

pub use config::{Backend, Options};
pub use error::{Error, ErrorKind};
pub use format::{Direction, Format};
pub use frontend::{Frontend, Level, Outcome, StatusMessage, UNSUPPORTED_NOTICE, handle_drop, run};

use std::path::{Path, PathBuf};

use config::Engine;

fn ensure_file(path: &Path) -> Result<(), Error> {
    if std::fs::metadata(path)?.is_file() {
        Ok(())
    } else {
        Err(Error::Read(std::io::Error::other(format!(
            "{} is not a regular file",
            path.display()
        ))))
    }
}

/// Write the text of the PDF's first page to a new DOCX next to it, one
/// paragraph per line. Returns the path written.
pub fn pdf_to_word(source: &Path) -> Result<PathBuf, Error> {
    ensure_file(source)?;
    let bytes = std::fs::read(source)?;
    let page = pdf_text::read_first_page(&bytes)?;
    let lines = pdf_text::paragraph_lines(&page.text);
    log::debug!("{} line(s) on the first page", lines.len());
    let docx = docx_writer::build(&lines, page.geometry)?;
    naming::write_new(source, Format::Pdf.target_extension(), &docx)
}

/// Convert a Word document to a new PDF next to it. Returns the path written.
pub fn word_to_pdf(source: &Path, options: &Options) -> Result<PathBuf, Error> {
    ensure_file(source)?;
    let format = Format::from_path(source);
    let ext = Format::Docx.target_extension();
    let engine = options.engine().ok_or(Error::ConverterNotFound)?;
    log::debug!("converting {} with {engine:?}", source.display());

    match engine {
        Engine::Builtin => {
            if format != Some(Format::Docx) {
                return Err(Error::UnsupportedFormat(
                    "the builtin renderer reads DOCX only; legacy .doc needs LibreOffice".into(),
                ));
            }
            let doc = docx::parse(source)?;
            let bytes = pdf::render(&doc)?;
            naming::write_new(source, ext, &bytes)
        }
        Engine::External(program) => {
            let (output, file) = naming::claim(source, ext)?;
            drop(file);
            match soffice::Soffice::new(program).convert(source, &output) {
                Ok(()) => Ok(output),
                Err(e) => {
                    naming::discard(&output);
                    Err(e)
                }
            }
        }
    }
}
