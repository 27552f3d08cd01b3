//! Top-level interpreter: lexer → parser → [`Context`] wiring, the crate's
//! primary entry point (mirroring the teacher's `Runner`/`ReplSession`).

use std::path::PathBuf;

use crate::ast::Program;
use crate::context::Context;
use crate::error::EarlResult;
use crate::io::PrintWriter;
use crate::lexer::Lexer;
use crate::parser::Parser;

pub struct Interpreter {
    pub ctx: Context,
    /// Directory imports are resolved relative to (A6).
    pub base_dir: PathBuf,
    /// Additional search roots checked (in order, after `base_dir`) when an
    /// `import` isn't found relative to the importing file — the CLI's
    /// trailing `[imports...]` positional arguments (`spec.md` §6).
    pub import_roots: Vec<PathBuf>,
}

impl Interpreter {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            ctx: Context::new(),
            base_dir,
            import_roots: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_import_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.import_roots = roots;
        self
    }

    pub fn parse(src: &str) -> EarlResult<Program> {
        let tokens = Lexer::new(src).tokenize()?;
        Parser::new(tokens).parse_program()
    }

    /// Runs every top-level statement in `src` against this interpreter's
    /// persistent `Context`, writing `print`/`assert` output through `out`.
    /// Returns the value of the last bare expression statement, if any —
    /// used by the REPL (A7) to print results.
    pub fn run_source(&mut self, src: &str, out: &mut dyn PrintWriter) -> EarlResult<crate::value::Value> {
        let program = Self::parse(src)?;
        self.run_program(&program, out)
    }

    pub fn run_program(&mut self, program: &Program, out: &mut dyn PrintWriter) -> EarlResult<crate::value::Value> {
        let mut last = crate::value::Value::Void;
        for stmt in &program.stmts {
            if let crate::ast::Stmt::Expr(expr) = stmt {
                last = self.eval_expr(expr, out)?;
            } else {
                self.exec_stmt(stmt, out)?;
                last = crate::value::Value::Void;
            }
        }
        Ok(last)
    }
}
