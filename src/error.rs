use std::fmt;
use std::path::PathBuf;

/// Broad failure category shown to the user next to the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    ReadFailure,
    WriteFailure,
    ConverterFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::ReadFailure => "read failure",
            ErrorKind::WriteFailure => "write failure",
            ErrorKind::ConverterFailure => "converter failure",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub enum Error {
    UnsupportedFormat(String),
    InvalidDocx(String),
    InvalidPdf(lopdf::Error),
    NoPages,
    Zip(zip::result::ZipError),
    Xml(roxmltree::Error),
    Read(std::io::Error),
    Write(PathBuf, std::io::Error),
    Render(String),
    ConverterNotFound,
    ConverterFailed(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedFormat(_)
            | Error::InvalidDocx(_)
            | Error::InvalidPdf(_)
            | Error::NoPages
            | Error::Zip(_)
            | Error::Xml(_) => ErrorKind::InvalidInput,
            Error::Read(_) => ErrorKind::ReadFailure,
            Error::Write(..) | Error::Render(_) => ErrorKind::WriteFailure,
            Error::ConverterNotFound | Error::ConverterFailed(_) => ErrorKind::ConverterFailure,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedFormat(reason) => write!(f, "unsupported format: {reason}"),
            Error::InvalidDocx(reason) => write!(f, "not a valid DOCX file: {reason}"),
            Error::InvalidPdf(e) => write!(f, "not a valid PDF file: {e}"),
            Error::NoPages => write!(f, "PDF has no pages"),
            Error::Zip(e) => write!(f, "ZIP error: {e}"),
            Error::Xml(e) => write!(f, "XML error: {e}"),
            Error::Read(e) => write!(f, "cannot read input: {e}"),
            Error::Write(path, e) => write!(f, "cannot write {}: {e}", path.display()),
            Error::Render(e) => write!(f, "PDF rendering failed: {e}"),
            Error::ConverterNotFound => {
                write!(f, "no document converter found (install LibreOffice or set DOCFLIP_SOFFICE)")
            }
            Error::ConverterFailed(e) => write!(f, "document converter failed: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidPdf(e) => Some(e),
            Error::Zip(e) => Some(e),
            Error::Xml(e) => Some(e),
            Error::Read(e) | Error::Write(_, e) => Some(e),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Error::Read(io),
            other => Error::Zip(other),
        }
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::Xml(e)
    }
}

impl From<lopdf::Error> for Error {
    fn from(e: lopdf::Error) -> Self {
        Error::InvalidPdf(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Read(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_failure_has_a_category() {
        assert_eq!(Error::NoPages.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            Error::Read(std::io::Error::other("gone")).kind(),
            ErrorKind::ReadFailure
        );
        assert_eq!(
            Error::Write(PathBuf::from("x.pdf"), std::io::Error::other("full")).kind(),
            ErrorKind::WriteFailure
        );
        assert_eq!(Error::ConverterNotFound.kind(), ErrorKind::ConverterFailure);
    }

    #[test]
    fn io_inside_zip_is_a_read_failure() {
        let err: Error = zip::result::ZipError::Io(std::io::Error::other("eof")).into();
        assert_eq!(err.kind(), ErrorKind::ReadFailure);
    }
}
