//! Built-in free functions and per-type member functions (C6).
//!
//! Grounded on the original's `Str`/`List` member functions
//! (`primitives/str.cpp`, `primitives/list.cpp`) and on the teacher's
//! `builtins/` split of one handler per builtin (`builtins/print.rs`).
//! `filter`/`foreach`, on both `str` and `list`, take a closure argument and
//! so need a way to call back into the evaluator; that's threaded through
//! as `call` rather than intrinsics depending on `expressions` directly.

use crate::error::{EarlError, EarlResult};
use crate::io::PrintWriter;
use crate::value::{StrSlot, Value};

pub type ClosureCaller<'a> = dyn FnMut(&Value, &[Value]) -> EarlResult<Value> + 'a;

/// Free (non-member) intrinsics: `print`, `assert`, `len`, `type`, `input`,
/// `open`, `exit`, `panic`, `unimplemented`. Returns `None` if `name` isn't a
/// free intrinsic, so the caller can fall through to function/class/variable
/// resolution.
pub fn call_free(name: &str, args: &[Value], out: &mut dyn PrintWriter) -> Option<EarlResult<Value>> {
    Some(match name {
        "print" => {
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    out.write_str(" ");
                }
                out.write_str(&a.to_display_string());
            }
            out.write_str("\n");
            Ok(Value::Void)
        }
        "assert" => {
            let Some(first) = args.first() else {
                return Some(Err(EarlError::runtime("assert requires at least one argument")));
            };
            match first.truthy() {
                Ok(true) => Ok(Value::Void),
                Ok(false) => {
                    let msg = args
                        .get(1)
                        .map(Value::to_display_string)
                        .unwrap_or_else(|| "assertion failure".to_string());
                    Err(EarlError::runtime(msg))
                }
                Err(e) => Err(e),
            }
        }
        "len" => match args.first() {
            Some(Value::Str(s)) => Ok(Value::Int(s.borrow().len() as i64)),
            Some(Value::List(l)) => Ok(Value::Int(l.borrow().len() as i64)),
            Some(other) => Err(EarlError::types(format!("`len` is not defined for {}", other.type_name()))),
            None => Err(EarlError::runtime("len requires one argument")),
        },
        "type" => match args.first() {
            Some(v) => Ok(Value::str_from(v.type_name())),
            None => Err(EarlError::runtime("type requires one argument")),
        },
        "input" => {
            if let Some(prompt) = args.first() {
                out.write_str(&prompt.to_display_string());
            }
            let mut line = String::new();
            match std::io::stdin().read_line(&mut line) {
                Ok(_) => Ok(Value::str_from(line.trim_end_matches(['\n', '\r']).to_string())),
                Err(e) => Err(EarlError::runtime(format!("input failed: {e}"))),
            }
        }
        "open" => match args.first() {
            Some(Value::Str(path)) => match std::fs::read_to_string(path.borrow().value()) {
                Ok(contents) => Ok(Value::str_from(contents)),
                Err(e) => Err(EarlError::runtime(format!("open failed: {e}"))),
            },
            _ => Err(EarlError::types("open requires a str path argument")),
        },
        "exit" => {
            let code = match args.first() {
                Some(Value::Int(i)) => *i as i32,
                _ => 0,
            };
            std::process::exit(code);
        }
        "panic" => {
            let msg = args.first().map(Value::to_display_string).unwrap_or_default();
            Err(EarlError::fatal(msg))
        }
        "unimplemented" => Err(EarlError::todo("unimplemented")),
        _ => return None,
    })
}

/// Member intrinsics dispatched on a receiver value, e.g. `xs.append(1)`.
pub fn call_member(
    receiver: &Value,
    name: &str,
    args: &[Value],
    call: &mut ClosureCaller<'_>,
) -> Option<EarlResult<Value>> {
    match receiver {
        Value::Str(_) => call_str_member(receiver, name, args, call),
        Value::List(_) => call_list_member(receiver, name, args, call),
        _ => None,
    }
}

fn call_str_member(
    receiver: &Value,
    name: &str,
    args: &[Value],
    call: &mut ClosureCaller<'_>,
) -> Option<EarlResult<Value>> {
    let Value::Str(s) = receiver else { return None };
    Some(match name {
        "nth" => match args.first() {
            Some(Value::Int(i)) => receiver.nth(*i),
            _ => Err(EarlError::types("str.nth requires an int index")),
        },
        "split" => match args.first() {
            Some(Value::Str(sep)) => {
                let sep = sep.borrow().value();
                let parts: Vec<Value> = if sep.is_empty() {
                    s.borrow().value().chars().map(|c| Value::str_from(c.to_string())).collect()
                } else {
                    s.borrow().value().split(&sep).map(Value::str_from).collect()
                };
                Ok(Value::list_from(parts))
            }
            _ => Err(EarlError::types("str.split requires a str separator")),
        },
        "substr" => match (args.first(), args.get(1)) {
            (Some(Value::Int(start)), Some(Value::Int(end))) => {
                let value = s.borrow().value();
                let chars: Vec<char> = value.chars().collect();
                let (start, end) = (*start, *end);
                if start < 0 || end < start || end as usize > chars.len() {
                    Err(EarlError::runtime(format!(
                        "substr({start}, {end}) out of bounds for length {}",
                        chars.len()
                    )))
                } else {
                    Ok(Value::str_from(chars[start as usize..end as usize].iter().collect::<String>()))
                }
            }
            _ => Err(EarlError::types("str.substr requires two int arguments")),
        },
        "rev" => {
            let reversed: String = s.borrow().value().chars().rev().collect();
            Ok(Value::str_from(reversed))
        }
        "pop" => {
            let mut data = s.borrow_mut();
            match data.slots.pop() {
                Some(slot) => Ok(Value::Char(slot.get())),
                None => Err(EarlError::runtime("pop on empty str")),
            }
        }
        "back" => match s.borrow().slots.last() {
            Some(slot) => Ok(Value::Char(slot.get())),
            None => Err(EarlError::runtime("back on empty str")),
        },
        "append" => {
            let mut data = s.borrow_mut();
            for a in args {
                match a {
                    Value::Char(c) => data.slots.push(StrSlot::Byte(*c)),
                    Value::Str(other) => {
                        for c in other.borrow().value().chars() {
                            data.slots.push(StrSlot::Byte(c));
                        }
                    }
                    other => return Some(Err(EarlError::types(format!("cannot append {} to str", other.type_name())))),
                }
            }
            Ok(Value::Void)
        }
        "contains" => match args.first() {
            Some(Value::Str(needle)) => Ok(Value::Bool(s.borrow().value().contains(&needle.borrow().value()))),
            Some(Value::Char(c)) => Ok(Value::Bool(s.borrow().value().contains(*c))),
            _ => Err(EarlError::types("str.contains requires a str or char argument")),
        },
        "trim" => Ok(Value::str_from(s.borrow().value().trim().to_string())),
        "filter" => {
            let pred = args.first()?;
            let mut kept = Vec::new();
            for c in s.borrow().value().chars() {
                match call(pred, &[Value::Char(c)]) {
                    Ok(v) => match v.truthy() {
                        Ok(true) => kept.push(c),
                        Ok(false) => {}
                        Err(e) => return Some(Err(e)),
                    },
                    Err(e) => return Some(Err(e)),
                }
            }
            Ok(Value::str_from(kept.into_iter().collect::<String>()))
        }
        "foreach" => {
            let f = args.first()?;
            for c in s.borrow().value().chars() {
                if let Err(e) = call(f, &[Value::Char(c)]) {
                    return Some(Err(e));
                }
            }
            Ok(Value::Void)
        }
        _ => return None,
    })
}

fn call_list_member(
    receiver: &Value,
    name: &str,
    args: &[Value],
    call: &mut ClosureCaller<'_>,
) -> Option<EarlResult<Value>> {
    let Value::List(l) = receiver else { return None };
    Some(match name {
        "rev" => {
            l.borrow_mut().reverse();
            Ok(Value::Void)
        }
        "pop" => match l.borrow_mut().pop() {
            Some(v) => Ok(v),
            None => Err(EarlError::runtime("pop on empty list")),
        },
        "back" => match l.borrow().last() {
            Some(v) => Ok(v.clone()),
            None => Err(EarlError::runtime("back on empty list")),
        },
        "append" => {
            l.borrow_mut().extend(args.iter().map(Value::copy));
            Ok(Value::Void)
        }
        "filter" => {
            let pred = args.first()?;
            let items = l.borrow().clone();
            let mut kept = Vec::new();
            for item in items {
                match call(pred, std::slice::from_ref(&item)) {
                    Ok(v) => match v.truthy() {
                        Ok(true) => kept.push(item),
                        Ok(false) => {}
                        Err(e) => return Some(Err(e)),
                    },
                    Err(e) => return Some(Err(e)),
                }
            }
            Ok(Value::list_from(kept))
        }
        "foreach" => {
            let f = args.first()?;
            let items = l.borrow().clone();
            for item in items {
                if let Err(e) = call(f, std::slice::from_ref(&item)) {
                    return Some(Err(e));
                }
            }
            Ok(Value::Void)
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::NoPrint;

    #[test]
    fn len_works_on_str_and_list() {
        assert_eq!(
            call_free("len", &[Value::str_from("abc")], &mut NoPrint)
                .unwrap()
                .unwrap()
                .to_display_string(),
            "3"
        );
        assert_eq!(
            call_free("len", &[Value::list_from(vec![Value::Int(1), Value::Int(2)])], &mut NoPrint)
                .unwrap()
                .unwrap()
                .to_display_string(),
            "2"
        );
    }

    #[test]
    fn open_reads_file_contents_into_a_str() {
        let path = std::env::temp_dir().join(format!("earl_open_test_{}.txt", std::process::id()));
        std::fs::write(&path, "contents").unwrap();
        let result = call_free("open", &[Value::str_from(path.to_string_lossy().into_owned())], &mut NoPrint)
            .unwrap()
            .unwrap();
        assert_eq!(result.to_display_string(), "contents");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn open_on_missing_file_is_runtime_error() {
        let path = std::env::temp_dir().join(format!("earl_open_missing_{}.txt", std::process::id()));
        let err = call_free("open", &[Value::str_from(path.to_string_lossy().into_owned())], &mut NoPrint)
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Runtime);
    }

    #[test]
    fn assert_false_is_runtime_error() {
        let err = call_free("assert", &[Value::Bool(false)], &mut NoPrint).unwrap().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Runtime);
    }

    #[test]
    fn str_append_extends_slots() {
        let s = Value::str_from("ab");
        call_member(&s, "append", &[Value::Char('c')], &mut |_, _| unreachable!())
            .unwrap()
            .unwrap();
        assert_eq!(s.to_display_string(), "abc");
    }

    #[test]
    fn list_filter_calls_back_into_evaluator() {
        let l = Value::list_from(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let mut caller = |_: &Value, args: &[Value]| -> EarlResult<Value> {
            let Value::Int(i) = args[0] else { unreachable!() };
            Ok(Value::Bool(i % 2 == 0))
        };
        let result = call_member(&l, "filter", &[Value::Bool(true)], &mut caller).unwrap().unwrap();
        assert_eq!(result.to_display_string(), "[2]");
    }

    #[test]
    fn unknown_member_returns_none() {
        assert!(call_member(&Value::Int(1), "foo", &[], &mut |_, _| unreachable!()).is_none());
    }
}
