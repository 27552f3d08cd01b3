//! The runtime value model (C1).
//!
//! `Int`, `Bool`, `Char`, `Void`, `FunctionRef` and `OptionVal` are plain
//! inline values: assigning or passing them copies. `Str`, `List`, `Closure`
//! and `ClassInstance` are `Rc<RefCell<..>>` handles: assigning or passing
//! them aliases, exactly as `spec.md` §3 requires and as the teacher crate's
//! `value.rs` separates "immediate" values from heap-`Ref(HeapId)` values —
//! here realized with `Rc`/`RefCell` instead of a manual arena, since `Rc`
//! already gives us the refcounting the teacher's arena exists to provide.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{Param, Stmt};
use crate::error::{EarlError, EarlResult};
use crate::scope::ScopeMap;

/// One character slot inside a [`StrData`]. A slot starts life as a plain
/// `Byte`; the first time it is indexed (`s[i]`) it is promoted to a
/// `Handle`, a shared `Rc<RefCell<char>>` that both the index expression's
/// result and the string alias. This collapses the original interpreter's
/// parallel `m_value`/`m_chars` vectors (kept in sync by convention) into a
/// single vector whose invariant — "every element is either unpromoted or
/// promoted, never both" — is enforced by the type itself.
#[derive(Debug, Clone)]
pub enum StrSlot {
    Byte(char),
    Handle(Rc<RefCell<char>>),
}

impl StrSlot {
    pub fn get(&self) -> char {
        match self {
            StrSlot::Byte(c) => *c,
            StrSlot::Handle(h) => *h.borrow(),
        }
    }

    pub fn promote(&mut self) -> Rc<RefCell<char>> {
        if let StrSlot::Byte(c) = self {
            *self = StrSlot::Handle(Rc::new(RefCell::new(*c)));
        }
        match self {
            StrSlot::Handle(h) => Rc::clone(h),
            StrSlot::Byte(_) => unreachable!("just promoted"),
        }
    }
}

#[derive(Debug, Default)]
pub struct StrData {
    pub slots: Vec<StrSlot>,
}

impl StrData {
    pub fn from_str(s: &str) -> Self {
        Self {
            slots: s.chars().map(StrSlot::Byte).collect(),
        }
    }

    pub fn value(&self) -> String {
        self.slots.iter().map(StrSlot::get).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A closure value: a function literal bound to the scope stack that was
/// live at its creation site (`spec.md` §3 "captures its defining scope by
/// handle"). `globals` is the fallback chain used only by closures created
/// from a `@world` function or from top-level code, satisfying the
/// identifier-resolution order of invariant (ii).
#[derive(Debug)]
pub struct ClosureData {
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub captured: Rc<RefCell<ScopeMap>>,
    pub is_world: bool,
}

#[derive(Debug)]
pub struct ClassInstanceData {
    pub class_name: String,
    pub fields: Rc<RefCell<ScopeMap>>,
}

/// A reference to a top-level or world function, resolved by name at call
/// time through the owning `Context`'s function registry rather than
/// captured eagerly — matches the original's late-bound function lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ModuleHandle {
    pub name: String,
    pub context: Rc<RefCell<crate::context::Context>>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Void,
    Int(i64),
    Bool(bool),
    Char(char),
    Str(Rc<RefCell<StrData>>),
    List(Rc<RefCell<Vec<Value>>>),
    Closure(Rc<ClosureData>),
    ClassInstance(Rc<RefCell<ClassInstanceData>>),
    FunctionRef(FunctionRef),
    Module(ModuleHandle),
    OptionVal(Option<Box<Value>>),
}

impl Value {
    pub fn str_from(s: impl Into<String>) -> Value {
        Value::Str(Rc::new(RefCell::new(StrData::from_str(&s.into()))))
    }

    pub fn list_from(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Closure(_) => "closure",
            Value::ClassInstance(_) => "class",
            Value::FunctionRef(_) => "function",
            Value::Module(_) => "module",
            Value::OptionVal(_) => "option",
        }
    }

    /// Deep structural copy, used where `spec.md` §3 calls for "a fresh,
    /// independent value" (e.g. `list.append` of a literal, class field
    /// initialization) as opposed to ordinary assignment, which aliases.
    pub fn copy(&self) -> Value {
        match self {
            Value::Str(s) => Value::Str(Rc::new(RefCell::new(StrData::from_str(&s.borrow().value())))),
            Value::List(l) => Value::list_from(l.borrow().iter().map(Value::copy).collect()),
            other => other.clone(),
        }
    }

    pub fn truthy(&self) -> EarlResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EarlError::types(format!(
                "expected bool in boolean context, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Value::Void => "void".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Char(c) => c.to_string(),
            Value::Str(s) => s.borrow().value(),
            Value::List(l) => {
                let items: Vec<String> = l.borrow().iter().map(Value::to_display_string).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Closure(_) => "<closure>".to_string(),
            Value::ClassInstance(c) => format!("<{} instance>", c.borrow().class_name),
            Value::FunctionRef(f) => format!("<function {}>", f.name),
            Value::Module(m) => format!("<module {}>", m.name),
            Value::OptionVal(Some(v)) => format!("Some({})", v.to_display_string()),
            Value::OptionVal(None) => "None".to_string(),
        }
    }

    pub fn equals(&self, other: &Value) -> EarlResult<bool> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Char(a), Value::Char(b)) => Ok(a == b),
            (Value::Str(a), Value::Str(b)) => Ok(a.borrow().value() == b.borrow().value()),
            (Value::Void, Value::Void) => Ok(true),
            (Value::OptionVal(a), Value::OptionVal(b)) => match (a, b) {
                (None, None) => Ok(true),
                (Some(x), Some(y)) => x.equals(y),
                _ => Ok(false),
            },
            (Value::Int(_), Value::OptionVal(_)) | (Value::OptionVal(_), Value::Int(_)) => Ok(false),
            (a, b) => Err(EarlError::types(format!(
                "cannot compare {} and {} for equality",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    /// Binary arithmetic/comparison/logical operators, `spec.md` §4.1.
    ///
    /// Grounded on the original's `Int::binop`/`Str::binop`: `Int` supports
    /// the full arithmetic and comparison set plus C-style `||` (but not
    /// `&&`, which the original never implements and which this rewrite
    /// does not add, since it is not required to resolve any Open
    /// Question); `Str` supports only `+`, `==`, `!=`.
    pub fn binop(&self, op: crate::ast::BinOp, other: &Value) -> EarlResult<Value> {
        use crate::ast::BinOp as B;
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => match op {
                B::Add => Ok(Value::Int(a + b)),
                B::Sub => Ok(Value::Int(a - b)),
                B::Mul => Ok(Value::Int(a * b)),
                B::Div => {
                    if *b == 0 {
                        Err(EarlError::runtime("division by zero"))
                    } else {
                        Ok(Value::Int(a / b))
                    }
                }
                B::Mod => {
                    if *b == 0 {
                        Err(EarlError::runtime("modulo by zero"))
                    } else {
                        Ok(Value::Int(a % b))
                    }
                }
                B::Lt => Ok(Value::Bool(a < b)),
                B::Gt => Ok(Value::Bool(a > b)),
                B::Le => Ok(Value::Bool(a <= b)),
                B::Ge => Ok(Value::Bool(a >= b)),
                B::Eq => Ok(Value::Bool(a == b)),
                B::Ne => Ok(Value::Bool(a != b)),
                B::Or => Ok(Value::Bool(*a != 0 || *b != 0)),
                B::And => Err(EarlError::todo("`&&` is not implemented for int")),
            },
            (Value::Bool(a), Value::Bool(b)) => match op {
                B::And => Ok(Value::Bool(*a && *b)),
                B::Or => Ok(Value::Bool(*a || *b)),
                B::Eq => Ok(Value::Bool(a == b)),
                B::Ne => Ok(Value::Bool(a != b)),
                _ => Err(EarlError::types(format!("operator not defined for bool {op:?}"))),
            },
            (Value::Str(a), Value::Str(b)) => match op {
                B::Add => Ok(Value::str_from(format!("{}{}", a.borrow().value(), b.borrow().value()))),
                B::Eq => Ok(Value::Bool(a.borrow().value() == b.borrow().value())),
                B::Ne => Ok(Value::Bool(a.borrow().value() != b.borrow().value())),
                _ => Err(EarlError::types(format!("operator not defined for str {op:?}"))),
            },
            (Value::Int(_), Value::OptionVal(_)) | (Value::OptionVal(_), Value::Int(_)) => match op {
                B::Eq => Ok(Value::Bool(false)),
                B::Ne => Ok(Value::Bool(true)),
                _ => Err(EarlError::types(format!("operator not defined between int and option {op:?}"))),
            },
            (a, b) => Err(EarlError::types(format!(
                "operator {op:?} not defined between {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    /// Indexed read, `spec.md` §4.1. For `Str` this promotes the targeted
    /// slot and returns a `Char` holding the same handle; for `List` it
    /// returns a clone of the stored element (aliasing if that element is
    /// itself heap-backed, value-copying if it is a primitive — exactly the
    /// semantics of ordinary `Value::clone`).
    pub fn nth(&self, index: i64) -> EarlResult<Value> {
        match self {
            Value::Str(s) => {
                let mut data = s.borrow_mut();
                let len = data.len();
                let idx = check_index(index, len)?;
                let handle = data.slots[idx].promote();
                Ok(Value::Char(*handle.borrow()))
            }
            Value::List(l) => {
                let items = l.borrow();
                let idx = check_index(index, items.len())?;
                Ok(items[idx].clone())
            }
            other => Err(EarlError::types(format!("cannot index into {}", other.type_name()))),
        }
    }

    /// Indexed write-back, `spec.md` §4.1. `Str` assignment requires a
    /// single-`Char` value and mutates the promoted slot in place, so any
    /// previously-taken alias observes the change. `List` assignment simply
    /// replaces the stored element (`spec.md` §3: primitives are
    /// value-copied on assignment, so a plain slot overwrite is correct —
    /// the original's `nth`-then-mutate approach only works for its
    /// reference-counted primitive wrappers and does not translate here).
    pub fn assign_index(&self, index: i64, value: Value) -> EarlResult<()> {
        match self {
            Value::Str(s) => {
                let mut data = s.borrow_mut();
                let len = data.len();
                let idx = check_index(index, len)?;
                let c = match &value {
                    Value::Char(c) => *c,
                    Value::Str(rhs) if rhs.borrow().len() == 1 => rhs.borrow().slots[0].get(),
                    _ => {
                        return Err(EarlError::types(format!(
                            "cannot assign {} into a str slot, expected char or single-character str",
                            value.type_name()
                        )))
                    }
                };
                match &data.slots[idx] {
                    StrSlot::Byte(_) => data.slots[idx] = StrSlot::Byte(c),
                    StrSlot::Handle(h) => *h.borrow_mut() = c,
                }
                Ok(())
            }
            Value::List(l) => {
                let mut items = l.borrow_mut();
                let idx = check_index(index, items.len())?;
                items[idx] = value;
                Ok(())
            }
            other => Err(EarlError::types(format!("cannot index-assign into {}", other.type_name()))),
        }
    }

    /// `mut`, `spec.md` §4.1: reassigns this value's referent in place.
    /// `Str ← Str` aliases both handles' underlying data (reconstructed into
    /// plain bytes, losing any prior slot promotions, matching the
    /// original's `Str::mutate`). `Str ← Char` is the single-character
    /// fallback the original spells out explicitly. `List ← List` aliases
    /// similarly. Any other combination requires matching variants.
    pub fn mutate(&self, other: &Value) -> EarlResult<()> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => {
                *a.borrow_mut() = StrData::from_str(&b.borrow().value());
                Ok(())
            }
            (Value::Str(a), Value::Char(c)) => {
                *a.borrow_mut() = StrData::from_str(&c.to_string());
                Ok(())
            }
            (Value::List(a), Value::List(b)) => {
                *a.borrow_mut() = b.borrow().clone();
                Ok(())
            }
            (a, b) if std::mem::discriminant(a) == std::mem::discriminant(b) => Ok(()),
            (a, b) => Err(EarlError::types(format!(
                "cannot mutate {} with {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }
}

fn check_index(index: i64, len: usize) -> EarlResult<usize> {
    if index < 0 || index as usize >= len {
        Err(EarlError::runtime(format!(
            "index {index} out of bounds for length {len}"
        )))
    } else {
        Ok(index as usize)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    #[test]
    fn str_index_promotes_and_aliases() {
        let s = Value::str_from("cat");
        let c = s.nth(0).unwrap();
        let Value::Char(c0) = c else { panic!("expected char") };
        assert_eq!(c0, 'c');
        s.assign_index(0, Value::Char('b')).unwrap();
        assert_eq!(s.to_display_string(), "bat");
    }

    #[test]
    fn str_index_assign_accepts_single_char_str() {
        let s = Value::str_from("hello");
        s.assign_index(0, Value::str_from("H")).unwrap();
        assert_eq!(s.to_display_string(), "Hello");
    }

    #[test]
    fn list_nth_out_of_bounds_is_runtime_error() {
        let l = Value::list_from(vec![Value::Int(1), Value::Int(2)]);
        let err = l.nth(2).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Runtime);
    }

    #[test]
    fn list_nth_negative_is_runtime_error() {
        let l = Value::list_from(vec![Value::Int(1)]);
        assert!(l.nth(-1).is_err());
    }

    #[test]
    fn int_or_without_and() {
        assert_eq!(
            Value::Int(0).binop(BinOp::Or, &Value::Int(5)).unwrap().to_display_string(),
            "true"
        );
        assert!(Value::Int(0).binop(BinOp::And, &Value::Int(5)).is_err());
    }

    #[test]
    fn str_mutate_aliases_both_sides() {
        let a = Value::str_from("x");
        let b = a.clone();
        a.mutate(&Value::str_from("y")).unwrap();
        assert_eq!(b.to_display_string(), "y");
    }

    #[test]
    fn int_and_option_compare_false_without_a_type_error() {
        let none = Value::OptionVal(None);
        assert!(!Value::Int(1).equals(&none).unwrap());
        assert!(!none.equals(&Value::Int(1)).unwrap());
        assert_eq!(Value::Int(1).binop(BinOp::Eq, &none).unwrap().to_display_string(), "false");
        assert_eq!(Value::Int(1).binop(BinOp::Ne, &none).unwrap().to_display_string(), "true");
    }

    #[test]
    fn division_by_zero_is_runtime_error() {
        let err = Value::Int(1).binop(BinOp::Div, &Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Runtime);
    }

    #[test]
    fn copy_produces_independent_list() {
        let a = Value::list_from(vec![Value::Int(1)]);
        let b = a.copy();
        a.assign_index(0, Value::Int(99)).unwrap();
        assert_eq!(b.nth(0).unwrap().to_display_string(), "1");
    }
}
