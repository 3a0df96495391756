use mts_core::{CompileConfig, FsLoader, compile, lint_deck, parse_document};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Compile a source file and print the resolved presentation as JSON.
/// Lint findings go to stderr.
fn main() -> ExitCode {
    env_logger::init();

    let Some(path) = env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: dump_presentation <file.md>");
        return ExitCode::FAILURE;
    };
    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let root = path.parent().unwrap_or(Path::new("."));
    let loader = FsLoader::new(root);
    let config = CompileConfig::default();

    if let Ok(deck) = parse_document(&source, &config, Some(&loader)) {
        for diag in lint_deck(&deck) {
            eprintln!("[{}] {:?}: {}", diag.rule, diag.severity, diag.message);
        }
    }

    match compile(&source, &config, Some(&loader)) {
        Ok(presentation) => match serde_json::to_string_pretty(&presentation) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        },
        Err(errors) => {
            for err in errors {
                eprintln!("{}: {err}", path.display());
            }
            ExitCode::FAILURE
        }
    }
}
