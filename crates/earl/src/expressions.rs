//! Expression evaluation (C4).
//!
//! Function-call resolution order on a bare identifier callee, per
//! `spec.md` §4.4: free intrinsic → registered class (constructor sugar) →
//! registered function → variable holding a closure or function reference.

use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::ast::{BinOp, Expr, Param, Stmt, UnaryOp};
use crate::engine::Interpreter;
use crate::error::{EarlError, EarlResult};
use crate::function::ClassDef;
use crate::intrinsics;
use crate::io::PrintWriter;
use crate::scope::ScopeMap;
use crate::token::SourceLoc;
use crate::value::{ClassInstanceData, ClosureData, FunctionRef, Value};

impl Interpreter {
    pub fn eval_expr(&mut self, expr: &Expr, out: &mut dyn PrintWriter) -> EarlResult<Value> {
        match expr {
            Expr::Int(v, _) => Ok(Value::Int(*v)),
            Expr::Str(s, _) => Ok(Value::str_from(s.clone())),
            Expr::Char(c, _) => Ok(Value::Char(*c)),
            Expr::Bool(b, _) => Ok(Value::Bool(*b)),
            Expr::NoneLit(_) => Ok(Value::OptionVal(None)),
            Expr::SomeLit(inner, _) => {
                let v = self.eval_expr(inner, out)?;
                Ok(Value::OptionVal(Some(Box::new(v))))
            }
            Expr::Ident(name, loc) => self
                .ctx
                .get_registered_variable(name)
                .map(|b| b.value)
                .or_else(|_| {
                    if self.ctx.function_is_registered(name) {
                        Ok(Value::FunctionRef(FunctionRef { name: name.clone() }))
                    } else {
                        Err(EarlError::undeclared(format!("`{name}` is not declared")))
                    }
                })
                .map_err(|e| e.with_loc(*loc)),
            Expr::ListLit(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, out)?);
                }
                Ok(Value::list_from(values))
            }
            Expr::ClosureLit { params, body, loc } => {
                let _ = loc;
                let captured = self.ctx.current_scope_handle();
                Ok(Value::Closure(Rc::new(ClosureData {
                    params: params.clone(),
                    body: body.clone(),
                    captured,
                    is_world: self.ctx.current_is_world(),
                })))
            }
            Expr::Unary { op, operand, loc } => {
                let v = self.eval_expr(operand, out)?;
                match (op, &v) {
                    (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    _ => Err(EarlError::types(format!("unary operator not defined for {}", v.type_name())).with_loc(*loc)),
                }
            }
            Expr::Binary { op, lhs, rhs, loc } => {
                let l = self.eval_expr(lhs, out)?;
                // Short-circuit evaluation for `&&`/`||` on bool operands.
                if matches!(op, BinOp::And | BinOp::Or) {
                    if let Value::Bool(lb) = l {
                        if (*op == BinOp::And && !lb) || (*op == BinOp::Or && lb) {
                            return Ok(Value::Bool(lb));
                        }
                    }
                }
                let r = self.eval_expr(rhs, out)?;
                l.binop(*op, &r).map_err(|e| e.with_loc(*loc))
            }
            Expr::Index { base, index, loc } => {
                let base_val = self.eval_expr(base, out)?;
                let idx_val = self.eval_expr(index, out)?;
                let Value::Int(idx) = idx_val else {
                    return Err(EarlError::types("index must be an int").with_loc(*loc));
                };
                base_val.nth(idx).map_err(|e| e.with_loc(*loc))
            }
            Expr::Member { base, name, loc } => {
                let base_val = self.eval_expr(base, out)?;
                match &base_val {
                    Value::ClassInstance(inst) => inst
                        .borrow()
                        .fields
                        .borrow()
                        .get(name)
                        .map(|b| b.value.clone())
                        .ok_or_else(|| EarlError::undeclared(format!("field `{name}` is not declared")).with_loc(*loc)),
                    other => Err(EarlError::types(format!("{} has no member `{name}`", other.type_name())).with_loc(*loc)),
                }
            }
            Expr::ModuleAccess { module, name, loc } => {
                let handle = self
                    .ctx
                    .get_registered_module(module)
                    .ok_or_else(|| EarlError::undeclared(format!("module `{module}` is not declared")).with_loc(*loc))?;
                handle
                    .context
                    .borrow()
                    .get_registered_variable(name)
                    .map(|b| b.value)
                    .map_err(|e| e.with_loc(*loc))
            }
            Expr::ClassInit { class_name, args, loc } => {
                let values = self.eval_args(args, out)?;
                self.instantiate_class(class_name, &values, *loc, out)
            }
            Expr::Call { callee, args, loc } => self.eval_call(callee, args, *loc, out),
        }
    }

    /// Call-argument vectors are almost always small (spec.md's own
    /// examples never pass more than a handful); `SmallVec` keeps that
    /// common case off the heap the way the teacher's `ArgValues` does
    /// for its call frames.
    fn eval_args(&mut self, args: &[Expr], out: &mut dyn PrintWriter) -> EarlResult<SmallVec<[Value; 4]>> {
        args.iter().map(|a| self.eval_expr(a, out)).collect()
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], loc: SourceLoc, out: &mut dyn PrintWriter) -> EarlResult<Value> {
        match callee {
            Expr::Ident(name, _) => {
                let values = self.eval_args(args, out)?;
                self.resolve_call(name, &values, loc, out)
            }
            Expr::Member { base, name, .. } => {
                let receiver = self.eval_expr(base, out)?;
                let values = self.eval_args(args, out)?;
                self.call_member_with_trampoline(&receiver, name, &values, loc, out)
            }
            Expr::ModuleAccess { module, name, .. } => {
                let handle = self
                    .ctx
                    .get_registered_module(module)
                    .ok_or_else(|| EarlError::undeclared(format!("module `{module}` is not declared")).with_loc(loc))?;
                let def = handle
                    .context
                    .borrow()
                    .get_registered_function(name)
                    .ok_or_else(|| EarlError::undeclared(format!("`{module}::{name}` is not declared")).with_loc(loc))?;
                let values = self.eval_args(args, out)?;
                self.call_function_def(&def, &values, loc, out)
            }
            other => {
                let callee_val = self.eval_expr(other, out)?;
                let values = self.eval_args(args, out)?;
                match callee_val {
                    Value::Closure(c) => self.call_closure(&c, &values, loc, out),
                    Value::FunctionRef(f) => self.call_function(&f.name, &values, loc, out),
                    other => Err(EarlError::types(format!("{} is not callable", other.type_name())).with_loc(loc)),
                }
            }
        }
    }

    /// `intrinsics::call_member` needs to call back into the evaluator for
    /// `filter`/`foreach` on `str`/`list`, but cannot borrow `self` directly
    /// while `self` is itself mid-call; `this` is a raw pointer used only
    /// synchronously within this function's call to `call_member`.
    fn call_member_with_trampoline(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[Value],
        loc: SourceLoc,
        out: &mut dyn PrintWriter,
    ) -> EarlResult<Value> {
        // Try class-instance methods first (no re-entrant closure needed).
        if let Value::ClassInstance(inst) = receiver {
            let method = inst.borrow().fields.borrow().get(name).map(|b| b.value.clone());
            if let Some(Value::Closure(c)) = method {
                return self.call_closure(&c, args, loc, out);
            }
        }
        // `str`/`list` intrinsics may invoke a closure argument; thread a
        // callback through that re-enters `call_closure`/`call_function`.
        let this = self as *mut Interpreter;
        let out_ptr = out as *mut dyn PrintWriter;
        let mut caller = move |f: &Value, call_args: &[Value]| -> EarlResult<Value> {
            // SAFETY: `intrinsics::call_member` is called synchronously below
            // and only invokes `caller` while `this`/`out_ptr` are uniquely
            // borrowed by this very function call — no alias escapes this scope.
            let interp = unsafe { &mut *this };
            let out = unsafe { &mut *out_ptr };
            match f {
                Value::Closure(c) => interp.call_closure(c, call_args, loc, out),
                Value::FunctionRef(fr) => interp.call_function(&fr.name, call_args, loc, out),
                other => Err(EarlError::types(format!("{} is not callable", other.type_name())).with_loc(loc)),
            }
        };
        match intrinsics::call_member(receiver, name, args, &mut caller) {
            Some(r) => r.map_err(|e| e.with_loc(loc)),
            None => Err(EarlError::undeclared(format!("`{name}` is not defined on {}", receiver.type_name())).with_loc(loc)),
        }
    }

    fn resolve_call(&mut self, name: &str, args: &[Value], loc: SourceLoc, out: &mut dyn PrintWriter) -> EarlResult<Value> {
        if let Some(r) = intrinsics::call_free(name, args, out) {
            return r.map_err(|e| e.with_loc(loc));
        }
        if self.ctx.class_is_registered(name) {
            return self.instantiate_class(name, args, loc, out);
        }
        if self.ctx.function_is_registered(name) {
            return self.call_function(name, args, loc, out);
        }
        if let Ok(binding) = self.ctx.get_registered_variable(name) {
            return match binding.value {
                Value::Closure(c) => self.call_closure(&c, args, loc, out),
                Value::FunctionRef(f) => self.call_function(&f.name, args, loc, out),
                other => Err(EarlError::types(format!("`{name}` ({}) is not callable", other.type_name())).with_loc(loc)),
            };
        }
        Err(EarlError::undeclared(format!("`{name}` is not declared")).with_loc(loc))
    }

    pub fn call_function(&mut self, name: &str, args: &[Value], loc: SourceLoc, out: &mut dyn PrintWriter) -> EarlResult<Value> {
        let def = self
            .ctx
            .get_registered_function(name)
            .ok_or_else(|| EarlError::undeclared(format!("`{name}` is not declared")).with_loc(loc))?;
        self.call_function_def(&def, args, loc, out)
    }

    fn call_function_def(
        &mut self,
        def: &crate::function::FunctionDef,
        args: &[Value],
        loc: SourceLoc,
        out: &mut dyn PrintWriter,
    ) -> EarlResult<Value> {
        if def.params.len() != args.len() {
            return Err(EarlError::runtime(format!(
                "`{}` expects {} argument(s), got {}",
                def.name,
                def.params.len(),
                args.len()
            ))
            .with_loc(loc));
        }
        self.ctx.set_function(def.name.clone(), def.is_world()).map_err(|e| e.with_loc(loc))?;
        if let Err(e) = self.bind_params(&def.params, args) {
            self.ctx.unset_function();
            return Err(e.with_loc(loc));
        }
        let result = self.exec_block(&def.body, out);
        self.ctx.unset_function();
        Self::signal_to_value(result)
    }

    pub fn call_closure(
        &mut self,
        closure: &Rc<ClosureData>,
        args: &[Value],
        loc: SourceLoc,
        out: &mut dyn PrintWriter,
    ) -> EarlResult<Value> {
        if closure.params.len() != args.len() {
            return Err(EarlError::runtime(format!(
                "closure expects {} argument(s), got {}",
                closure.params.len(),
                args.len()
            ))
            .with_loc(loc));
        }
        self.ctx
            .set_closure(closure.is_world, Rc::clone(&closure.captured))
            .map_err(|e| e.with_loc(loc))?;
        if let Err(e) = self.bind_params(&closure.params, args) {
            self.ctx.unset_function();
            return Err(e.with_loc(loc));
        }
        let result = self.exec_block(&closure.body, out);
        self.ctx.unset_function();
        Self::signal_to_value(result)
    }

    fn bind_params(&mut self, params: &[Param], args: &[Value]) -> EarlResult<()> {
        for (p, v) in params.iter().zip(args) {
            let stored = if p.attrs.is_ref { v.clone() } else { v.copy() };
            self.ctx.register_variable(p.name.clone(), stored, p.attrs)?;
        }
        Ok(())
    }

    fn signal_to_value(result: EarlResult<crate::run::Signal>) -> EarlResult<Value> {
        match result? {
            crate::run::Signal::Return(v) => Ok(v),
            _ => Ok(Value::Void),
        }
    }

    pub fn instantiate_class(
        &mut self,
        name: &str,
        args: &[Value],
        loc: SourceLoc,
        out: &mut dyn PrintWriter,
    ) -> EarlResult<Value> {
        let def: Rc<ClassDef> = self
            .ctx
            .get_registered_class(name)
            .ok_or_else(|| EarlError::undeclared(format!("`{name}` is not declared")).with_loc(loc))?;
        if def.ctor_params.len() != args.len() {
            return Err(EarlError::runtime(format!(
                "`{name}` constructor expects {} argument(s), got {}",
                def.ctor_params.len(),
                args.len()
            ))
            .with_loc(loc));
        }
        self.ctx.clear_tmp_scope();
        for (p, v) in def.ctor_params.iter().zip(args) {
            self.ctx
                .add_to_tmp_scope(p.name.clone(), v.copy(), p.attrs)
                .map_err(|e| e.with_loc(loc))?;
        }
        let fields = Rc::new(RefCell::new(ScopeMap::new()));
        self.ctx
            .push_scope_frame_with(format!("<{name} ctor>"), Rc::clone(&fields))
            .map_err(|e| e.with_loc(loc))?;
        let result = self.eval_class_members(&def.members, out);
        self.ctx.unset_function();
        self.ctx.clear_tmp_scope();
        result?;
        Ok(Value::ClassInstance(Rc::new(RefCell::new(ClassInstanceData {
            class_name: name.to_string(),
            fields,
        }))))
    }

    fn eval_class_members(&mut self, members: &[Stmt], out: &mut dyn PrintWriter) -> EarlResult<()> {
        for member in members {
            match member {
                Stmt::Let { name, attrs, value, loc } => {
                    let v = self.eval_expr(value, out)?;
                    self.ctx.register_variable(name.clone(), v, *attrs).map_err(|e| e.with_loc(*loc))?;
                }
                Stmt::Def { name, attrs, params, body, loc } => {
                    let captured = self.ctx.current_scope_handle();
                    let closure = Value::Closure(Rc::new(ClosureData {
                        params: params.clone(),
                        body: body.clone(),
                        captured,
                        is_world: attrs.is_world,
                    }));
                    self.ctx
                        .register_variable(name.clone(), closure, crate::ast::Attrs::default())
                        .map_err(|e| e.with_loc(*loc))?;
                }
                other => {
                    return Err(EarlError::fatal(format!(
                        "class body may only contain `let`/`def`, found {other:?}"
                    )))
                }
            }
        }
        Ok(())
    }
}
