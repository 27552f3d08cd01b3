//! Statement execution (C5).
//!
//! `exec_block` pushes a fresh scope frame per `{ ... }`, matching the
//! original's "new_scope_context"/"drop_scope_context" around block entry
//! and exit. Non-local control flow (`return`/`break`/`continue`) is
//! propagated upward as a [`Signal`] rather than unwound with Rust
//! exceptions, since every level in between (nested blocks, `if`, loops)
//! needs a chance to run its own scope cleanup first.

use crate::ast::{Attrs, Expr, MutOp, Stmt};
use crate::engine::Interpreter;
use crate::error::{EarlError, EarlResult};
use crate::function::{ClassDef, FunctionDef};
use crate::io::PrintWriter;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Signal {
    Normal,
    Return(Value),
    Break,
    Continue,
}

impl Interpreter {
    pub fn exec_block(&mut self, stmts: &[Stmt], out: &mut dyn PrintWriter) -> EarlResult<Signal> {
        self.ctx.push_scope();
        let result = self.exec_stmts(stmts, out);
        self.ctx.pop_scope();
        result
    }

    fn exec_stmts(&mut self, stmts: &[Stmt], out: &mut dyn PrintWriter) -> EarlResult<Signal> {
        for stmt in stmts {
            match self.exec_stmt(stmt, out)? {
                Signal::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Signal::Normal)
    }

    pub fn exec_stmt(&mut self, stmt: &Stmt, out: &mut dyn PrintWriter) -> EarlResult<Signal> {
        match stmt {
            Stmt::Let { name, attrs, value, loc } => {
                let v = self.eval_expr(value, out)?;
                self.ctx
                    .register_variable(name.clone(), v, *attrs)
                    .map_err(|e| e.with_loc(*loc))?;
                Ok(Signal::Normal)
            }
            Stmt::Assign { target, op, value, loc } => {
                let rhs = self.eval_expr(value, out)?;
                self.exec_assign(target, *op, rhs, *loc, out)?;
                Ok(Signal::Normal)
            }
            Stmt::Block(stmts) => self.exec_block(stmts, out),
            Stmt::If { cond, then_branch, else_branch, loc } => {
                let c = self.eval_expr(cond, out)?.truthy().map_err(|e| e.with_loc(*loc))?;
                if c {
                    self.exec_block(then_branch, out)
                } else if let Some(else_branch) = else_branch {
                    self.exec_block(else_branch, out)
                } else {
                    Ok(Signal::Normal)
                }
            }
            Stmt::While { cond, body, loc } => {
                loop {
                    let c = self.eval_expr(cond, out)?.truthy().map_err(|e| e.with_loc(*loc))?;
                    if !c {
                        break;
                    }
                    match self.exec_block(body, out)? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Normal => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                }
                Ok(Signal::Normal)
            }
            Stmt::Foreach { binding, iterable, body, loc } => {
                let iter_val = self.eval_expr(iterable, out)?;
                let items: Vec<Value> = match &iter_val {
                    Value::List(l) => l.borrow().clone(),
                    Value::Str(s) => s.borrow().value().chars().map(Value::Char).collect(),
                    other => return Err(EarlError::types(format!("cannot iterate over {}", other.type_name())).with_loc(*loc)),
                };
                for item in items {
                    self.ctx.push_scope();
                    let bind_result = self.ctx.register_variable(
                        binding.clone(),
                        item,
                        Attrs { is_mut: true, ..Attrs::default() },
                    );
                    if let Err(e) = bind_result {
                        self.ctx.pop_scope();
                        return Err(e.with_loc(*loc));
                    }
                    let signal = self.exec_stmts(body, out);
                    self.ctx.pop_scope();
                    match signal? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Normal => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                }
                Ok(Signal::Normal)
            }
            Stmt::Def { name, attrs, params, body, loc } => {
                self.ctx
                    .register_function(FunctionDef {
                        name: name.clone(),
                        attrs: *attrs,
                        params: params.clone(),
                        body: body.clone(),
                    })
                    .map_err(|e| e.with_loc(*loc))?;
                Ok(Signal::Normal)
            }
            Stmt::Class { name, ctor_params, members, loc } => {
                self.ctx
                    .register_class(ClassDef {
                        name: name.clone(),
                        ctor_params: ctor_params.clone(),
                        members: members.clone(),
                    })
                    .map_err(|e| e.with_loc(*loc))?;
                Ok(Signal::Normal)
            }
            Stmt::Import { path, alias, loc } => {
                self.exec_import(path, alias.as_deref(), *loc)?;
                Ok(Signal::Normal)
            }
            Stmt::Module { .. } => {
                // A marker consumed by the importer (A6); evaluates to nothing on its own.
                Ok(Signal::Normal)
            }
            Stmt::Return { value, .. } => {
                let v = match value {
                    Some(expr) => self.eval_expr(expr, out)?,
                    None => Value::Void,
                };
                Ok(Signal::Return(v))
            }
            Stmt::Break(_) => Ok(Signal::Break),
            Stmt::Continue(_) => Ok(Signal::Continue),
            Stmt::Expr(expr) => {
                self.eval_expr(expr, out)?;
                Ok(Signal::Normal)
            }
        }
    }

    fn exec_assign(
        &mut self,
        target: &Expr,
        op: MutOp,
        rhs: Value,
        loc: crate::token::SourceLoc,
        out: &mut dyn PrintWriter,
    ) -> EarlResult<()> {
        match target {
            Expr::Ident(name, _) => {
                let binding = self.ctx.get_registered_variable(name).map_err(|e| e.with_loc(loc))?;
                if !binding.is_mutable() {
                    return Err(EarlError::types(format!("`{name}` is not mutable")).with_loc(loc));
                }
                let new_value = self.combine(&binding.value, op, rhs, loc)?;
                if is_aliasing(&binding.value) {
                    binding.value.mutate(&new_value).map_err(|e| e.with_loc(loc))
                } else {
                    self.ctx
                        .mutate_variable(name, |b| b.value = new_value)
                        .map_err(|e| e.with_loc(loc))
                }
            }
            Expr::Index { base, index, .. } => {
                let base_val = self.eval_expr(base, out)?;
                let Value::Int(idx) = self.eval_expr(index, out)? else {
                    return Err(EarlError::types("index must be an int").with_loc(loc));
                };
                let current = base_val.nth(idx).map_err(|e| e.with_loc(loc))?;
                let new_value = self.combine(&current, op, rhs, loc)?;
                base_val.assign_index(idx, new_value).map_err(|e| e.with_loc(loc))
            }
            Expr::Member { base, name, .. } => {
                let base_val = self.eval_expr(base, out)?;
                let Value::ClassInstance(inst) = &base_val else {
                    return Err(EarlError::types(format!("cannot assign a field on {}", base_val.type_name())).with_loc(loc));
                };
                let current = {
                    let fields = inst.borrow();
                    let binding = fields
                        .fields
                        .borrow()
                        .get(name)
                        .cloned()
                        .ok_or_else(|| EarlError::undeclared(format!("field `{name}` is not declared")))
                        .map_err(|e| e.with_loc(loc))?;
                    if !binding.is_mutable() {
                        return Err(EarlError::types(format!("field `{name}` is not mutable")).with_loc(loc));
                    }
                    binding.value
                };
                let new_value = self.combine(&current, op, rhs, loc)?;
                if is_aliasing(&current) {
                    current.mutate(&new_value).map_err(|e| e.with_loc(loc))
                } else {
                    let fields = inst.borrow();
                    let mut guard = fields.fields.borrow_mut();
                    let binding = guard.get_mut(name).expect("checked above");
                    binding.value = new_value;
                    Ok(())
                }
            }
            other => Err(EarlError::types(format!("{other:?} is not assignable")).with_loc(loc)),
        }
    }

    fn combine(&self, current: &Value, op: MutOp, rhs: Value, loc: crate::token::SourceLoc) -> EarlResult<Value> {
        use crate::ast::BinOp;
        match op {
            MutOp::Assign => Ok(rhs),
            MutOp::AddAssign => current.binop(BinOp::Add, &rhs).map_err(|e| e.with_loc(loc)),
            MutOp::SubAssign => current.binop(BinOp::Sub, &rhs).map_err(|e| e.with_loc(loc)),
            MutOp::MulAssign => current.binop(BinOp::Mul, &rhs).map_err(|e| e.with_loc(loc)),
            MutOp::DivAssign => current.binop(BinOp::Div, &rhs).map_err(|e| e.with_loc(loc)),
            MutOp::ModAssign => current.binop(BinOp::Mod, &rhs).map_err(|e| e.with_loc(loc)),
        }
    }

}

/// `Str`/`List` are heap-shared handles (`spec.md` §3): assignment must
/// write through the existing `Rc<RefCell<_>>` via [`Value::mutate`] so
/// other aliases of that same handle observe the change, rather than
/// rebinding the variable to point at a new handle. Every other
/// (value-copied) variant rebinds the owning `Binding`/field slot directly
/// instead.
fn is_aliasing(value: &Value) -> bool {
    matches!(value, Value::Str(_) | Value::List(_))
}
