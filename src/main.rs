use clap::Parser;
use docflip::{Backend, Frontend, Level, Options, Outcome};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "docflip",
    about = "Convert PDF files to Word documents and Word documents to PDF"
)]
struct Args {
    /// Files to convert (.pdf, .doc or .docx); each is handled like a single drop
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// How Word documents are converted to PDF
    #[arg(long, value_enum, env = "DOCFLIP_BACKEND", default_value_t = Backend::Auto)]
    backend: Backend,
    /// LibreOffice executable (searched on PATH when not given)
    #[arg(long, env = "DOCFLIP_SOFFICE")]
    soffice: Option<PathBuf>,
}

/// Prints one status line per dropped file.
struct Console;

impl Frontend for Console {
    fn report(&mut self, outcome: &Outcome) {
        let status = outcome.status();
        match status.level {
            Level::Info => println!("{}", status.text),
            Level::Warning => println!("{}: {}", source_name(outcome), status.text),
            Level::Error => eprintln!("Error: {}", status.text),
        }
    }
}

fn source_name(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Converted { source, .. }
        | Outcome::Unsupported { source }
        | Outcome::Failed { source, .. } => source.display().to_string(),
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let options = Options {
        backend: args.backend,
        soffice: args.soffice,
    };

    let unconverted = docflip::run(args.files.iter().map(PathBuf::as_path), &options, &mut Console);
    if unconverted > 0 {
        std::process::exit(1);
    }
}
