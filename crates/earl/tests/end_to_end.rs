//! End-to-end program scenarios, run through the public `Interpreter` API
//! exactly as the CLI/REPL (A7) would. Output is captured with
//! `CollectStringPrint` rather than touching real stdout.

use std::io::Write as _;
use std::path::PathBuf;

use earl::{CollectStringPrint, ErrorKind, Interpreter, Value};
use pretty_assertions::assert_eq;

fn run(src: &str) -> (String, earl::EarlResult<Value>) {
    let mut interp = Interpreter::new(PathBuf::from("."));
    let mut out = CollectStringPrint::new();
    let result = interp.run_source(src, &mut out);
    (out.into_output(), result)
}

fn run_in(dir: &std::path::Path, src: &str) -> (String, earl::EarlResult<Value>) {
    let mut interp = Interpreter::new(dir.to_path_buf());
    let mut out = CollectStringPrint::new();
    let result = interp.run_source(src, &mut out);
    (out.into_output(), result)
}

fn run_with_roots(base_dir: &std::path::Path, roots: Vec<PathBuf>, src: &str) -> (String, earl::EarlResult<Value>) {
    let mut interp = Interpreter::new(base_dir.to_path_buf()).with_import_roots(roots);
    let mut out = CollectStringPrint::new();
    let result = interp.run_source(src, &mut out);
    (out.into_output(), result)
}

#[test]
fn s1_arithmetic_and_print() {
    let (out, result) = run("let x = 1 + 2; print(x);");
    assert_eq!(out, "3\n");
    result.unwrap();
}

#[test]
fn s2_str_index_assign_with_string_literal() {
    let (out, result) = run(r#"let s = "hello"; s[0] = "H"; print(s);"#);
    assert_eq!(out, "Hello\n");
    result.unwrap();
}

#[test]
fn s3_recursive_function_call() {
    let (out, result) = run("def f(n) { if n <= 1 { return 1; } return n * f(n-1); } print(f(5));");
    assert_eq!(out, "120\n");
    result.unwrap();
}

#[test]
fn s4_list_rev_mutates_in_place() {
    let (out, result) = run("let xs = [1,2,3]; xs.rev(); print(xs);");
    assert_eq!(out, "[3, 2, 1]\n");
    result.unwrap();
}

#[test]
fn s5_redeclaration_in_same_scope_errors() {
    let (_, result) = run("let x = 1; let x = 2;");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Redeclared);
}

#[test]
fn assigning_to_an_immutable_binding_is_a_type_error() {
    let (_, result) = run("let x = 1; x = 2;");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Types);
}

#[test]
fn assigning_to_an_immutable_field_is_a_type_error() {
    let (_, result) = run(
        r#"
        class Box() {
            let value = 1;
            def bad() { value = 2; }
        }
        let b = new Box();
        b.bad();
        "#,
    );
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Types);
}

#[test]
fn s6_list_index_out_of_range_is_runtime_error() {
    let (_, result) = run("let xs = [1,2]; print(xs[5]);");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.message.contains("out of range") || err.message.contains("out of bounds"), "{}", err.message);
}

#[test]
fn s7_failed_assert_is_runtime_error_with_default_message() {
    let (_, result) = run("assert(1 == 2);");
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.message, "assertion failure");
}

#[test]
fn world_function_reads_and_writes_globals() {
    let (out, result) = run(
        r#"
        @mut let total = 0;
        @world def bump() { total = total + 1; }
        bump();
        bump();
        print(total);
        "#,
    );
    assert_eq!(out, "2\n");
    result.unwrap();
}

#[test]
fn plain_function_does_not_see_globals() {
    let (_, result) = run(
        r#"
        let total = 0;
        def bump() { total = total + 1; }
        bump();
        "#,
    );
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Undeclared);
}

#[test]
fn class_instance_method_mutates_its_own_field() {
    let (out, result) = run(
        r#"
        class Counter() {
            @mut let count = 0;
            def bump() { count = count + 1; }
            def get() { return count; }
        }
        let c = new Counter();
        c.bump();
        c.bump();
        c.bump();
        print(c.get());
        "#,
    );
    assert_eq!(out, "3\n");
    result.unwrap();
}

#[test]
fn closure_captures_defining_scope_by_live_handle() {
    let (out, result) = run(
        r#"
        def make_counter() {
            @mut let n = 0;
            let step = def() { n = n + 1; return n; };
            return step;
        }
        let counter = make_counter();
        print(counter());
        print(counter());
        print(counter());
        "#,
    );
    assert_eq!(out, "1\n2\n3\n");
    result.unwrap();
}

#[test]
fn foreach_over_list_and_string() {
    let (out, result) = run(
        r#"
        @mut let total = 0;
        foreach x in [1, 2, 3] { total += x; }
        print(total);
        foreach c in "abc" { print(c); }
        "#,
    );
    assert_eq!(out, "6\nabc\n");
    result.unwrap();
}

#[test]
fn while_loop_with_break_and_continue() {
    let (out, result) = run(
        r#"
        @mut let i = 0;
        while true {
            i += 1;
            if i == 2 { continue; }
            if i > 4 { break; }
            print(i);
        }
        "#,
    );
    assert_eq!(out, "1\n3\n4\n");
    result.unwrap();
}

#[test]
fn import_exposes_module_member_access() {
    let dir = std::env::temp_dir().join(format!("earl_e2e_import_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let mod_path = dir.join("greeting.earl");
    let mut f = std::fs::File::create(&mod_path).unwrap();
    writeln!(f, "module greeting;").unwrap();
    writeln!(f, r#"let value = "hi";"#).unwrap();
    drop(f);

    let (out, result) = run_in(
        &dir,
        r#"
        import "greeting";
        print(greeting::value);
        "#,
    );
    assert_eq!(out, "hi\n");
    result.unwrap();

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn import_falls_back_to_extra_search_root() {
    let root = std::env::temp_dir().join(format!("earl_e2e_import_root_{}", std::process::id()));
    let base_dir = root.join("project");
    let lib_dir = root.join("lib");
    std::fs::create_dir_all(&base_dir).unwrap();
    std::fs::create_dir_all(&lib_dir).unwrap();
    let mut f = std::fs::File::create(lib_dir.join("math_utils.earl")).unwrap();
    writeln!(f, "module math_utils;").unwrap();
    writeln!(f, "let answer = 42;").unwrap();
    drop(f);

    let (out, result) = run_with_roots(
        &base_dir,
        vec![lib_dir.clone()],
        r#"
        import "math_utils";
        print(math_utils::answer);
        "#,
    );
    assert_eq!(out, "42\n");
    result.unwrap();

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn import_of_file_with_no_module_statement_is_fatal() {
    let dir = std::env::temp_dir().join(format!("earl_e2e_import_nomod_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let mut f = std::fs::File::create(dir.join("bare.earl")).unwrap();
    writeln!(f, "let value = 1;").unwrap();
    drop(f);

    let (_, result) = run_in(&dir, r#"import "bare";"#);
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Fatal);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn import_of_file_with_two_module_statements_is_fatal() {
    let dir = std::env::temp_dir().join(format!("earl_e2e_import_twomod_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let mut f = std::fs::File::create(dir.join("double.earl")).unwrap();
    writeln!(f, "module double;").unwrap();
    writeln!(f, "module double_again;").unwrap();
    drop(f);

    let (_, result) = run_in(&dir, r#"import "double";"#);
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Fatal);

    std::fs::remove_dir_all(&dir).ok();
}
