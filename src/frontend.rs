//! Drop handling, independent of whatever shows the result to the user.

use std::path::{Path, PathBuf};

use crate::config::Options;
use crate::error::Error;
use crate::format::{Direction, Format};

pub const UNSUPPORTED_NOTICE: &str = "only Word or PDF files can be converted";

#[derive(Debug)]
pub enum Outcome {
    Converted {
        source: PathBuf,
        output: PathBuf,
        direction: Direction,
    },
    Unsupported {
        source: PathBuf,
    },
    Failed {
        source: PathBuf,
        error: Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: Level,
    pub text: String,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Converted { .. })
    }

    pub fn status(&self) -> StatusMessage {
        match self {
            Outcome::Converted { source, output, .. } => StatusMessage {
                level: Level::Info,
                text: format!("converted {} to {}", file_name(source), file_name(output)),
            },
            Outcome::Unsupported { .. } => StatusMessage {
                level: Level::Warning,
                text: UNSUPPORTED_NOTICE.to_string(),
            },
            Outcome::Failed { source, error } => StatusMessage {
                level: Level::Error,
                text: format!("{}: {} ({})", file_name(source), error, error.kind()),
            },
        }
    }
}

/// Whatever presents outcomes to the user: a window, a terminal, a test.
pub trait Frontend {
    fn report(&mut self, outcome: &Outcome);
}

/// Convert one dropped file. Never panics on conversion failure; every error
/// comes back as [`Outcome::Failed`].
pub fn handle_drop(path: &Path, options: &Options) -> Outcome {
    let source = path.to_path_buf();
    let Some(format) = Format::from_path(path) else {
        log::debug!("ignoring {}: unsupported extension", path.display());
        return Outcome::Unsupported { source };
    };

    let direction = format.direction();
    let result = match direction {
        Direction::PdfToWord => crate::pdf_to_word(path),
        Direction::WordToPdf => crate::word_to_pdf(path, options),
    };
    match result {
        Ok(output) => {
            log::info!("{} -> {}", path.display(), output.display());
            Outcome::Converted {
                source,
                output,
                direction,
            }
        }
        Err(error) => {
            log::error!("converting {} failed: {error}", path.display());
            Outcome::Failed { source, error }
        }
    }
}

/// Handle each drop in turn and report it. Returns how many did not convert.
pub fn run<'a>(
    paths: impl IntoIterator<Item = &'a Path>,
    options: &Options,
    frontend: &mut impl Frontend,
) -> usize {
    let mut unconverted = 0;
    for path in paths {
        let outcome = handle_drop(path, options);
        if !outcome.is_success() {
            unconverted += 1;
        }
        frontend.report(&outcome);
    }
    unconverted
}
