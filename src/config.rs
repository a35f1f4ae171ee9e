use std::path::PathBuf;

/// How Word documents are turned into PDF.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Backend {
    /// External converter when one is installed, builtin renderer otherwise.
    #[default]
    Auto,
    /// Always run the external converter (LibreOffice).
    External,
    /// Always use the builtin renderer (DOCX only).
    Builtin,
}

#[derive(Clone, Debug, Default)]
pub struct Options {
    pub backend: Backend,
    /// Converter executable; searched on `PATH` when unset.
    pub soffice: Option<PathBuf>,
}

/// The backend a conversion will actually use.
#[derive(Debug, PartialEq)]
pub(crate) enum Engine {
    External(PathBuf),
    Builtin,
}

impl Options {
    pub(crate) fn engine(&self) -> Option<Engine> {
        self.resolve(crate::soffice::locate)
    }

    /// Pick the engine, asking `locate` for a converter only when none is configured.
    fn resolve(&self, locate: impl FnOnce() -> Option<PathBuf>) -> Option<Engine> {
        let external = || self.soffice.clone().or_else(locate).map(Engine::External);
        match self.backend {
            Backend::Builtin => Some(Engine::Builtin),
            Backend::External => external(),
            Backend::Auto => Some(external().unwrap_or(Engine::Builtin)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_never_needs_a_converter() {
        let options = Options {
            backend: Backend::Builtin,
            soffice: Some(PathBuf::from("/opt/lo/soffice")),
        };
        assert_eq!(options.engine(), Some(Engine::Builtin));
    }

    #[test]
    fn configured_converter_wins() {
        let program = PathBuf::from("/opt/lo/soffice");
        for backend in [Backend::Auto, Backend::External] {
            let options = Options {
                backend,
                soffice: Some(program.clone()),
            };
            assert_eq!(options.engine(), Some(Engine::External(program.clone())));
        }
    }

    #[test]
    fn auto_falls_back_to_builtin_without_a_converter() {
        let auto = Options::default();
        assert_eq!(auto.resolve(|| None), Some(Engine::Builtin));

        let found = PathBuf::from("/usr/bin/soffice");
        assert_eq!(
            auto.resolve(|| Some(found.clone())),
            Some(Engine::External(found))
        );
    }

    #[test]
    fn external_without_a_converter_has_no_engine() {
        let options = Options {
            backend: Backend::External,
            soffice: None,
        };
        assert_eq!(options.resolve(|| None), None);
    }
}
