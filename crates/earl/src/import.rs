//! Import resolution (A6): `import "path";` reads a sibling `.earl` file,
//! evaluates it into a fresh child [`Context`], and attaches that context
//! via `push_child_context` so `Mod::name` lookups (`ModuleAccess`) can
//! reach it. Evaluation is not a new error boundary: a failure inside the
//! imported file surfaces as the same kind of [`EarlError`] it would have
//! produced running at its own top level. A file is only usable as an
//! import if it declares exactly one `module` statement; zero or more than
//! one is `Fatal`.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use crate::ast::Stmt;
use crate::context::Context;
use crate::engine::Interpreter;
use crate::error::{EarlError, EarlResult};
use crate::io::NoPrint;
use crate::token::SourceLoc;

impl Interpreter {
    pub fn exec_import(&mut self, path: &str, alias: Option<&str>, loc: SourceLoc) -> EarlResult<()> {
        let file_path = self.resolve_import_path(path).ok_or_else(|| {
            EarlError::runtime(format!("cannot find import `{path}` under {} or any search root", self.base_dir.display()))
                .with_loc(loc)
        })?;
        let src = std::fs::read_to_string(&file_path).map_err(|e| {
            EarlError::runtime(format!("cannot read import `{path}` ({}): {e}", file_path.display())).with_loc(loc)
        })?;
        let program = Interpreter::parse(&src)?;

        let child_base_dir = file_path.parent().map(PathBuf::from).unwrap_or_else(|| self.base_dir.clone());
        let mut child = Interpreter {
            ctx: Context::new(),
            base_dir: child_base_dir,
            import_roots: self.import_roots.clone(),
        };
        let mut discard = NoPrint;
        for stmt in &program.stmts {
            child.exec_stmt(stmt, &mut discard)?;
        }

        let mut module_names = program.stmts.iter().filter_map(|s| match s {
            Stmt::Module { name, .. } => Some(name.clone()),
            _ => None,
        });
        let declared_name = match (module_names.next(), module_names.next()) {
            (None, _) => {
                return Err(EarlError::fatal(format!(
                    "`{}` has no `module` statement; a file is only usable as an import if it declares one",
                    file_path.display()
                ))
                .with_loc(loc));
            }
            (Some(_), Some(_)) => {
                return Err(EarlError::fatal("files are only limited to one module").with_loc(loc));
            }
            (Some(name), None) => name,
        };
        let module_name = alias.map(str::to_string).unwrap_or(declared_name);

        self.ctx.push_child_context(module_name, Rc::new(RefCell::new(child.ctx)));
        Ok(())
    }

    /// Checks `base_dir` first, then each `imports...` root given on the
    /// CLI (`spec.md` §6), in order, returning the first candidate that
    /// exists on disk.
    fn resolve_import_path(&self, path: &str) -> Option<PathBuf> {
        std::iter::once(&self.base_dir).chain(self.import_roots.iter()).find_map(|root| {
            let mut p = root.join(path);
            if p.extension().is_none() {
                p.set_extension("earl");
            }
            p.is_file().then_some(p)
        })
    }
}
