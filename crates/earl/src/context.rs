//! `Context` (C3): the registries and scope stacks an evaluation walks.
//!
//! Grounded directly on the original's `Ctx` (`ctx.hpp`/`ctx.cpp`): a global
//! variable scope, a global function/class registry, an activation stack of
//! per-call local scopes, a "tmp scope" used while a class constructor's
//! arguments are being bound into a fresh instance, and a list of child
//! contexts attached by `import`. Scope stacks are held behind
//! `Rc<RefCell<ScopeMap>>` rather than plain `ScopeMap` so a closure literal
//! can capture its defining scope "by handle" (`spec.md` §3/§9): later
//! mutations through either the closure or the original scope are visible
//! to both, the same aliasing `Str`/`List` get from their own `Rc<RefCell<_>>`.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::ast::Attrs;
use crate::error::{EarlError, EarlResult};
use crate::function::{ClassDef, FunctionDef};
use crate::resource::MAX_RECURSION_DEPTH;
use crate::scope::{Binding, ScopeMap};
use crate::value::{ModuleHandle, Value};

struct CallFrame {
    name: String,
    is_world: bool,
    scopes: Rc<RefCell<ScopeMap>>,
    /// Set only for closure calls: the scope stack that was live at the
    /// closure's creation site, searched after the call's own locals and
    /// before (for `world` closures) the global fallback.
    captured: Option<Rc<RefCell<ScopeMap>>>,
}

pub struct Context {
    globals: Rc<RefCell<ScopeMap>>,
    functions: AHashMap<String, Rc<FunctionDef>>,
    classes: AHashMap<String, Rc<ClassDef>>,
    call_stack: Vec<CallFrame>,
    tmp_scope: ScopeMap,
    children: Vec<(String, Rc<RefCell<Context>>)>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            globals: Rc::new(RefCell::new(ScopeMap::new())),
            functions: AHashMap::new(),
            classes: AHashMap::new(),
            call_stack: Vec::new(),
            tmp_scope: ScopeMap::new(),
            children: Vec::new(),
        }
    }

    // -- variables --------------------------------------------------------

    fn active_scopes(&self) -> Rc<RefCell<ScopeMap>> {
        match self.call_stack.last() {
            Some(frame) => Rc::clone(&frame.scopes),
            None => Rc::clone(&self.globals),
        }
    }

    pub fn register_variable(&mut self, name: impl Into<String>, value: Value, attrs: Attrs) -> EarlResult<()> {
        self.active_scopes().borrow_mut().add(name, Binding::new(value, attrs))
    }

    pub fn unregister_variable(&mut self, name: &str) -> bool {
        self.active_scopes().borrow_mut().remove(name)
    }

    pub fn variable_is_registered(&self, name: &str) -> bool {
        self.get_registered_variable(name).is_ok()
    }

    /// Resolution order per invariant (ii): tmp scope first; then, inside a
    /// `world` call, the global scope and the call's own locals (own-frame
    /// scope, then a closure's captured scope) are *both* consulted and a
    /// hit in both is a cross-collision `Redeclared`, not a silent
    /// shadowing choice; inside a non-`world` call, locals only — globals
    /// are not visible; at top level (no active call), globals only.
    /// Closures have no direct counterpart in the original resolution order
    /// (it predates closures); a closure's captured scope is treated as
    /// part of "local" alongside the call's own frame.
    pub fn get_registered_variable(&self, name: &str) -> EarlResult<Binding> {
        if let Some(binding) = self.tmp_scope.get(name) {
            return Ok(binding.clone());
        }
        let not_declared = || EarlError::undeclared(format!("`{name}` is not declared"));
        match self.call_stack.last() {
            None => self.globals.borrow().get(name).cloned().ok_or_else(not_declared),
            Some(frame) => {
                let local = self.local_binding(frame, name);
                if frame.is_world {
                    let global = self.globals.borrow().get(name).cloned();
                    match (global, local) {
                        (Some(_), Some(_)) => Err(EarlError::redeclared(format!(
                            "`{name}` exists in both global and local scope"
                        ))),
                        (Some(g), None) => Ok(g),
                        (None, Some(l)) => Ok(l),
                        (None, None) => Err(not_declared()),
                    }
                } else {
                    local.ok_or_else(not_declared)
                }
            }
        }
    }

    fn local_binding(&self, frame: &CallFrame, name: &str) -> Option<Binding> {
        frame
            .scopes
            .borrow()
            .get(name)
            .cloned()
            .or_else(|| frame.captured.as_ref().and_then(|c| c.borrow().get(name).cloned()))
    }

    /// Applies `f` to the binding named `name`, wherever it's found by the
    /// same resolution order as [`Self::get_registered_variable`].
    pub fn mutate_variable<R>(&mut self, name: &str, f: impl FnOnce(&mut Binding) -> R) -> EarlResult<R> {
        if self.tmp_scope.contains(name) {
            let binding = self.tmp_scope.get_mut(name).expect("just checked contains");
            return Ok(f(binding));
        }
        let not_declared = || EarlError::undeclared(format!("`{name}` is not declared"));
        let (is_world, frame_scopes, captured) = match self.call_stack.last() {
            None => (false, None, None),
            Some(frame) => (frame.is_world, Some(Rc::clone(&frame.scopes)), frame.captured.clone()),
        };
        let Some(frame_scopes) = frame_scopes else {
            let mut guard = self.globals.borrow_mut();
            let binding = guard.get_mut(name).ok_or_else(not_declared)?;
            return Ok(f(binding));
        };
        let in_local = frame_scopes.borrow().contains(name)
            || captured.as_ref().is_some_and(|c| c.borrow().contains(name));
        let in_global = is_world && self.globals.borrow().contains(name);
        if in_local && in_global {
            return Err(EarlError::redeclared(format!("`{name}` exists in both global and local scope")));
        }
        if in_global {
            let mut guard = self.globals.borrow_mut();
            let binding = guard.get_mut(name).expect("just checked contains");
            return Ok(f(binding));
        }
        if frame_scopes.borrow().contains(name) {
            let mut guard = frame_scopes.borrow_mut();
            let binding = guard.get_mut(name).expect("just checked contains");
            return Ok(f(binding));
        }
        if let Some(captured) = &captured {
            if captured.borrow().contains(name) {
                let mut guard = captured.borrow_mut();
                let binding = guard.get_mut(name).expect("just checked contains");
                return Ok(f(binding));
            }
        }
        Err(not_declared())
    }

    pub fn push_scope(&mut self) {
        self.active_scopes().borrow_mut().push();
    }

    pub fn pop_scope(&mut self) {
        self.active_scopes().borrow_mut().pop();
    }

    // -- activation stack / recursion guard --------------------------------

    pub fn set_function(&mut self, name: impl Into<String>, is_world: bool) -> EarlResult<()> {
        self.push_frame(name, is_world, Rc::new(RefCell::new(ScopeMap::new())), None)
    }

    pub fn set_closure(&mut self, is_world: bool, captured: Rc<RefCell<ScopeMap>>) -> EarlResult<()> {
        self.push_frame("<closure>", is_world, Rc::new(RefCell::new(ScopeMap::new())), Some(captured))
    }

    /// Pushes an activation whose *own* scope is `scopes` itself, rather
    /// than a fresh frame — used while evaluating a class body so `let`
    /// field declarations land directly in the instance's field scope
    /// instead of a throwaway frame.
    pub fn push_scope_frame_with(&mut self, name: impl Into<String>, scopes: Rc<RefCell<ScopeMap>>) -> EarlResult<()> {
        self.push_frame(name, false, scopes, None)
    }

    fn push_frame(
        &mut self,
        name: impl Into<String>,
        is_world: bool,
        scopes: Rc<RefCell<ScopeMap>>,
        captured: Option<Rc<RefCell<ScopeMap>>>,
    ) -> EarlResult<()> {
        if self.call_stack.len() >= MAX_RECURSION_DEPTH {
            return Err(EarlError::fatal("recursion depth exceeded"));
        }
        self.call_stack.push(CallFrame {
            name: name.into(),
            is_world,
            scopes,
            captured,
        });
        Ok(())
    }

    pub fn unset_function(&mut self) {
        self.call_stack.pop();
    }

    pub fn in_function(&self) -> bool {
        !self.call_stack.is_empty()
    }

    pub fn get_curfunc(&self) -> Option<&str> {
        self.call_stack.last().map(|f| f.name.as_str())
    }

    /// The scope stack a closure literal created *right now* should
    /// capture: a live handle to the innermost active scope (own locals if
    /// inside a call, else globals) — the same handle `active_scopes` hands
    /// to every other operation, so later mutations through either the
    /// closure or the defining scope are visible to both.
    pub fn current_scope_handle(&self) -> Rc<RefCell<ScopeMap>> {
        self.active_scopes()
    }

    pub fn current_is_world(&self) -> bool {
        self.call_stack.last().map(|f| f.is_world).unwrap_or(true)
    }

    // -- function registry --------------------------------------------------

    pub fn register_function(&mut self, def: FunctionDef) -> EarlResult<()> {
        if self.functions.contains_key(&def.name) || self.classes.contains_key(&def.name) {
            return Err(EarlError::redeclared(format!("`{}` is already declared", def.name)));
        }
        self.functions.insert(def.name.clone(), Rc::new(def));
        Ok(())
    }

    pub fn function_is_registered(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn get_registered_function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions.get(name).cloned()
    }

    // -- class registry -------------------------------------------------------

    pub fn register_class(&mut self, def: ClassDef) -> EarlResult<()> {
        if self.functions.contains_key(&def.name) || self.classes.contains_key(&def.name) {
            return Err(EarlError::redeclared(format!("`{}` is already declared", def.name)));
        }
        self.classes.insert(def.name.clone(), Rc::new(def));
        Ok(())
    }

    pub fn class_is_registered(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn get_registered_class(&self, name: &str) -> Option<Rc<ClassDef>> {
        self.classes.get(name).cloned()
    }

    // -- tmp scope (class construction) --------------------------------------

    pub fn add_to_tmp_scope(&mut self, name: impl Into<String>, value: Value, attrs: Attrs) -> EarlResult<()> {
        self.tmp_scope.add(name, Binding::new(value, attrs))
    }

    pub fn var_in_tmp_scope(&self, name: &str) -> bool {
        self.tmp_scope.contains(name)
    }

    pub fn get_var_from_tmp_scope(&self, name: &str) -> Option<Value> {
        self.tmp_scope.get(name).map(|b| b.value.clone())
    }

    pub fn clear_tmp_scope(&mut self) {
        self.tmp_scope = ScopeMap::new();
    }

    // -- child contexts (import) ----------------------------------------------

    pub fn push_child_context(&mut self, name: impl Into<String>, ctx: Rc<RefCell<Context>>) {
        self.children.push((name.into(), ctx));
    }

    pub fn get_registered_module(&self, name: &str) -> Option<ModuleHandle> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(n, ctx)| ModuleHandle {
                name: n.clone(),
                context: Rc::clone(ctx),
            })
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutattrs() -> Attrs {
        Attrs { is_mut: true, ..Attrs::default() }
    }

    #[test]
    fn top_level_variable_is_visible_without_a_call() {
        let mut ctx = Context::new();
        ctx.register_variable("x", Value::Int(1), mutattrs()).unwrap();
        assert!(ctx.variable_is_registered("x"));
    }

    #[test]
    fn plain_function_call_does_not_see_globals() {
        let mut ctx = Context::new();
        ctx.register_variable("g", Value::Int(1), mutattrs()).unwrap();
        ctx.set_function("f", false).unwrap();
        assert!(ctx.get_registered_variable("g").is_err());
        ctx.unset_function();
        assert!(ctx.get_registered_variable("g").is_ok());
    }

    #[test]
    fn world_function_call_falls_back_to_globals() {
        let mut ctx = Context::new();
        ctx.register_variable("g", Value::Int(1), mutattrs()).unwrap();
        ctx.set_function("f", true).unwrap();
        assert!(ctx.get_registered_variable("g").is_ok());
    }

    #[test]
    fn redeclaring_function_as_class_name_errors() {
        let mut ctx = Context::new();
        ctx.register_function(FunctionDef {
            name: "Foo".into(),
            attrs: Attrs::default(),
            params: vec![],
            body: vec![],
        })
        .unwrap();
        let err = ctx
            .register_class(ClassDef {
                name: "Foo".into(),
                ctor_params: vec![],
                members: vec![],
            })
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Redeclared);
    }

    #[test]
    fn recursion_guard_trips_past_max_depth() {
        let mut ctx = Context::new();
        for i in 0..MAX_RECURSION_DEPTH {
            ctx.set_function(format!("f{i}"), false).unwrap();
        }
        assert!(ctx.set_function("one_too_many", false).is_err());
    }

    #[test]
    fn closure_call_sees_live_captured_scope_but_not_globals_unless_world() {
        let mut ctx = Context::new();
        ctx.register_variable("outer", Value::Int(7), mutattrs()).unwrap();
        let captured = ctx.current_scope_handle();
        ctx.register_variable("g", Value::Int(1), mutattrs()).unwrap();
        ctx.set_closure(false, Rc::clone(&captured)).unwrap();
        assert_eq!(ctx.get_registered_variable("outer").unwrap().value.to_display_string(), "7");
        assert!(ctx.get_registered_variable("g").is_err());
        ctx.mutate_variable("outer", |b| b.value = Value::Int(8)).unwrap();
        ctx.unset_function();
        assert_eq!(ctx.get_registered_variable("outer").unwrap().value.to_display_string(), "8");
    }
}
