//! Lexical scope stack (C2): a stack of hash-map frames, pushed on block
//! entry and popped on block exit, grounded on the original's
//! `Ctx::push_scope`/`pop_scope` and the per-frame `unordered_map` it walks
//! innermost-first in `get_registered_variable`.

use ahash::AHashMap;

use crate::ast::Attrs;
use crate::error::{EarlError, EarlResult};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub attrs: Attrs,
}

impl Binding {
    pub fn new(value: Value, attrs: Attrs) -> Self {
        Self { value, attrs }
    }

    pub fn is_mutable(&self) -> bool {
        self.attrs.is_mut && !self.attrs.is_const
    }
}

/// A stack of name→binding frames. Frame 0 is the outermost (function-body
/// or top-level) frame; later frames are nested blocks.
#[derive(Debug, Clone, Default)]
pub struct ScopeMap {
    frames: Vec<AHashMap<String, Binding>>,
}

impl ScopeMap {
    pub fn new() -> Self {
        Self { frames: vec![AHashMap::new()] }
    }

    pub fn push(&mut self) {
        self.frames.push(AHashMap::new());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
        if self.frames.is_empty() {
            self.frames.push(AHashMap::new());
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Declares `name` in the innermost frame. Re-declaring a name already
    /// present in that *same* frame is an error; shadowing a name from an
    /// outer frame is allowed.
    pub fn add(&mut self, name: impl Into<String>, binding: Binding) -> EarlResult<()> {
        let name = name.into();
        let frame = self.frames.last_mut().expect("at least one frame");
        if frame.contains_key(&name) {
            return Err(EarlError::redeclared(format!("`{name}` is already declared in this scope")));
        }
        frame.insert(name, binding);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        for frame in self.frames.iter_mut().rev() {
            if frame.remove(name).is_some() {
                return true;
            }
        }
        false
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.frames.iter_mut().rev().find_map(|frame| frame.get_mut(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame.contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Attrs {
        Attrs { is_mut: true, ..Attrs::default() }
    }

    #[test]
    fn shadowing_in_nested_scope_is_allowed() {
        let mut s = ScopeMap::new();
        s.add("x", Binding::new(Value::Int(1), attrs())).unwrap();
        s.push();
        s.add("x", Binding::new(Value::Int(2), attrs())).unwrap();
        assert_eq!(s.get("x").unwrap().value.to_display_string(), "2");
        s.pop();
        assert_eq!(s.get("x").unwrap().value.to_display_string(), "1");
    }

    #[test]
    fn redeclaring_in_same_frame_errors() {
        let mut s = ScopeMap::new();
        s.add("x", Binding::new(Value::Int(1), attrs())).unwrap();
        let err = s.add("x", Binding::new(Value::Int(2), attrs())).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Redeclared);
    }

    #[test]
    fn pop_never_empties_the_stack() {
        let mut s = ScopeMap::new();
        s.pop();
        s.push();
        s.pop();
        s.pop();
        s.add("x", Binding::new(Value::Int(1), attrs())).unwrap();
        assert!(s.contains("x"));
    }
}
