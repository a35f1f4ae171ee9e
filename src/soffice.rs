//! Whole-document conversion through a headless LibreOffice process.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::Error;

const PROGRAM_NAMES: &[&str] = if cfg!(windows) {
    &["soffice.exe", "libreoffice.exe"]
} else {
    &["soffice", "libreoffice"]
};

fn well_known_locations() -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        vec!["/Applications/LibreOffice.app/Contents/MacOS/soffice".into()]
    } else if cfg!(windows) {
        vec![
            "C:\\Program Files\\LibreOffice\\program\\soffice.exe".into(),
            "C:\\Program Files (x86)\\LibreOffice\\program\\soffice.exe".into(),
        ]
    } else {
        Vec::new()
    }
}

/// Find a converter executable on `PATH` or in the usual install locations.
pub fn locate() -> Option<PathBuf> {
    locate_in(std::env::var_os("PATH").as_deref())
}

fn locate_in(path_var: Option<&OsStr>) -> Option<PathBuf> {
    let path_dirs = path_var
        .map(|p| std::env::split_paths(p).collect::<Vec<_>>())
        .unwrap_or_default();
    path_dirs
        .iter()
        .flat_map(|dir| PROGRAM_NAMES.iter().map(move |name| dir.join(name)))
        .chain(well_known_locations())
        .find(|candidate| candidate.is_file())
}

pub struct Soffice {
    program: PathBuf,
}

impl Soffice {
    pub fn new(program: PathBuf) -> Self {
        Soffice { program }
    }

    /// Convert `source` to PDF and place the result at `output`, replacing
    /// whatever is there.
    pub fn convert(&self, source: &Path, output: &Path) -> Result<(), Error> {
        let workdir = tempfile::Builder::new()
            .prefix("docflip-")
            .tempdir()
            .map_err(|e| Error::Write(std::env::temp_dir(), e))?;

        log::debug!(
            "running {} on {}",
            self.program.display(),
            source.display()
        );
        let result = Command::new(&self.program)
            .args(["--headless", "--norestore", "--convert-to", "pdf", "--outdir"])
            .arg(workdir.path())
            .arg(source)
            .output();
        let out = match result {
            Ok(out) => out,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::ConverterNotFound),
            Err(e) => {
                return Err(Error::ConverterFailed(format!(
                    "cannot run {}: {e}",
                    self.program.display()
                )));
            }
        };
        if !out.status.success() {
            return Err(Error::ConverterFailed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let mut name = source.file_stem().unwrap_or(OsStr::new("output")).to_os_string();
        name.push(".pdf");
        let produced = workdir.path().join(name);
        if !produced.is_file() {
            return Err(Error::ConverterFailed(format!(
                "converter reported success but wrote no PDF: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        // The temporary directory may live on another filesystem.
        if std::fs::rename(&produced, output).is_err() {
            std::fs::copy(&produced, output).map_err(|e| Error::Write(output.to_path_buf(), e))?;
        }
        Ok(())
    }
}
