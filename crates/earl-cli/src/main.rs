//! `earl <source.earl> [imports...]`: runs a file and exits 0/1. With no
//! arguments, drops into an interactive REPL. Mirrors the teacher's
//! `bin/ouros-repl.rs` dual-mode `main`.

use std::path::PathBuf;
use std::process::ExitCode;

use earl::{Interpreter, StdPrint};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1) {
        None => match earl::run_repl() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("earl: {e}");
                ExitCode::FAILURE
            }
        },
        Some(source_path) => run_file(source_path, &args[2..]),
    }
}

fn run_file(source_path: &str, import_roots: &[String]) -> ExitCode {
    let path = PathBuf::from(source_path);
    let src = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("earl: cannot read `{source_path}`: {e}");
            return ExitCode::FAILURE;
        }
    };
    let base_dir = path.parent().map(PathBuf::from).unwrap_or_default();
    let roots = import_roots.iter().map(PathBuf::from).collect();
    let mut interp = Interpreter::new(base_dir).with_import_roots(roots);
    let mut out = StdPrint;
    match interp.run_source(&src, &mut out) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("earl: {e}");
            ExitCode::FAILURE
        }
    }
}
