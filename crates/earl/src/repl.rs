//! Interactive REPL loop (A7), grounded on the teacher's
//! `bin/ouros-repl.rs`: read a line, evaluate it against a persistent
//! `Interpreter`, print the result of a bare expression, repeat.

use std::io::{self, BufRead, Write};

use crate::engine::Interpreter;
use crate::io::StdPrint;
use crate::value::Value;

pub fn run_repl() -> io::Result<()> {
    let mut interp = Interpreter::new(std::env::current_dir().unwrap_or_default());
    let mut out = StdPrint;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!(">>> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match interp.run_source(trimmed, &mut out) {
            Ok(Value::Void) => {}
            Ok(v) => println!("{v}"),
            Err(e) => eprintln!("{e}"),
        }
    }
    Ok(())
}
