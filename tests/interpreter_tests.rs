use std::path::PathBuf;

use windlang::interpreter::Evaluator;
use windlang::lexer::Lexer;
use windlang::parser::Parser;
use windlang::value::{RuntimeError, Value};

const FILE_NAME: &str = "main-test.wind";

fn eval_at(input: &str, file_path: &str) -> Result<Value, RuntimeError> {
    let mut parser = Parser::new(Lexer::new(input), file_path);
    let program = parser.parse_program();
    let errors = parser.report_errors();
    if !errors.is_empty() {
        panic!("parsing failed: {}", errors.join("; "));
    }

    Evaluator::new(file_path).run(&program)
}

fn eval(input: &str) -> Result<Value, RuntimeError> {
    eval_at(input, FILE_NAME)
}

fn eval_ok(input: &str) -> Value {
    eval(input).unwrap_or_else(|e| panic!("evaluation failed: {e}\ninput: {input}"))
}

fn eval_err(input: &str) -> RuntimeError {
    match eval(input) {
        Ok(value) => panic!("expected error, got {value:?}\ninput: {input}"),
        Err(error) => error,
    }
}

fn assert_integer(input: &str, expected: i64) {
    match eval_ok(input) {
        Value::Integer(value) => assert_eq!(value, expected, "input: {input}"),
        other => panic!("expected integer, got {other:?}\ninput: {input}"),
    }
}

fn assert_float(input: &str, expected: f64) {
    match eval_ok(input) {
        Value::Float(value) => assert_eq!(value, expected, "input: {input}"),
        other => panic!("expected float, got {other:?}\ninput: {input}"),
    }
}

fn assert_boolean(input: &str, expected: bool) {
    match eval_ok(input) {
        Value::Boolean(value) => assert_eq!(value, expected, "input: {input}"),
        other => panic!("expected boolean, got {other:?}\ninput: {input}"),
    }
}

#[test]
fn integer_arithmetic() {
    let cases = [
        ("5 + 5;", 10),
        ("5 - 5;", 0),
        ("5 * 5;", 25),
        ("5 / 5;", 1),
        ("4 % 2;", 0),
        ("-5;", -5),
        ("2 * -3;", -6),
    ];
    for (input, expected) in cases {
        assert_integer(input, expected);
    }
}

#[test]
fn float_arithmetic_and_promotion() {
    let cases = [
        ("5.0 + 5.0;", 10.0),
        ("5.5 - 5.5;", 0.0),
        ("5.5 * 5.5;", 30.25),
        ("5.8 / 5.8;", 1.0),
        ("4.0 % 2.0;", 0.0),
        ("5.5 - 5;", 0.5),
        ("5.5 * 5;", 27.5),
        ("4.0 % 2;", 0.0),
        ("-5.0;", -5.0),
    ];
    for (input, expected) in cases {
        assert_float(input, expected);
    }
}

#[test]
fn boolean_infix_expressions() {
    let cases = [
        ("true", true),
        ("false", false),
        ("1 < 2", true),
        ("1 > 2", false),
        ("1 < 1", false),
        ("1 >= 1", true),
        ("2 <= 1", false),
        ("1 == 1", true),
        ("1 != 1", false),
        ("1 == 2", false),
        ("1 != 2", true),
        ("3.1 > 3.0", true),
        ("3.1 > 3", true),
        ("3 < 3.1", true),
        ("true == true", true),
        ("false == false", true),
        ("true == false", false),
        ("true != false", true),
    ];
    for (input, expected) in cases {
        assert_boolean(input, expected);
    }
}

#[test]
fn mixed_numeric_equality_promotes() {
    assert_boolean("3 == 3.0", true);
    assert_boolean("3 != 3.0", false);
    assert_boolean("3 == 3.5", false);
}

#[test]
fn bang_operator_uses_truthiness() {
    let cases = [
        ("!true", false),
        ("!false", true),
        ("!5", false),
        ("!!true", true),
        ("!!5", true),
        ("!nil", true),
        ("!0", false),
        ("!\"\"", false),
    ];
    for (input, expected) in cases {
        assert_boolean(input, expected);
    }
}

#[test]
fn logic_operators_evaluate_both_operands() {
    assert_boolean("true && false", false);
    assert_boolean("false || true", true);
    assert_boolean("nil || false", false);
    assert_boolean("1 && 2", true);

    // No short-circuit: the right operand's side effect happens even when
    // the left operand already decides the result.
    assert_integer("let a = [1, 2]; false && append(a, 3); len(a);", 3);
}

#[test]
fn string_operations() {
    match eval_ok("\"Hello\" + \" \" + \"World!\";") {
        Value::String(value) => assert_eq!(value.as_str(), "Hello World!"),
        other => panic!("expected string, got {other:?}"),
    }
    assert_boolean("\"a\" == \"a\"", true);
    assert_boolean("\"a\" != \"b\"", true);

    let error = eval_err("\"a\" - \"b\";");
    assert!(error.message.contains("unknown operator"), "{error}");
}

#[test]
fn if_expressions() {
    assert_integer("if (true) { 10 }", 10);
    assert_integer("if (1) { 10 }", 10);
    assert_integer("if (1 < 2) { 10 }", 10);
    assert_integer("if (1 > 2) { 10 } else { 20 }", 20);
    assert_integer("if (1 < 2) { 10 } else { 20 }", 10);
    assert!(matches!(eval_ok("if (false) { 1 }"), Value::Nil));
}

#[test]
fn let_statements_and_scoping() {
    let cases = [
        ("let a = 5; a;", 5),
        ("let a = 5 * 5; a;", 25),
        ("let a = 5; let b = a; b;", 5),
        ("let a = 5; let b = a; let c = a + b + 5; c;", 15),
        ("let a = 1; { let a = 2; } a;", 1),
        ("let a = 1; { a = 2; } a;", 2),
    ];
    for (input, expected) in cases {
        assert_integer(input, expected);
    }
}

#[test]
fn constants_reject_assignment() {
    assert_integer("const k = 2; k;", 2);

    let error = eval_err("const k = 2; k = 3;");
    assert_eq!(error.message, "cannot assign to a constant variable k");
    assert_eq!(error.to_string(), "[file main-test.wind:1] cannot assign to a constant variable k");

    // Assignment from a nested scope walks up to the constant and fails too.
    let error = eval_err("const k = 2; { k = 3; }");
    assert_eq!(error.message, "cannot assign to a constant variable k");

    let error = eval_err("const k = 2; k++;");
    assert_eq!(error.message, "cannot assign to a constant variable k");
}

#[test]
fn assignment_requires_a_binding() {
    let error = eval_err("missing = 1;");
    assert_eq!(error.message, "identifier not found: missing");
}

#[test]
fn functions_and_calls() {
    let cases = [
        ("let double = fn(x) { x * 2; }; double(5);", 10),
        ("let add = fn(x, y) { x + y; }; add(5, 5);", 10),
        ("let add = fn(x, y) { x + y; }; add(5 + 5, add(5, 5));", 20),
        ("fn(x) { x; }(5)", 5),
        ("fn(x) { return x; }(5)", 5),
        ("fn add(a, b) { return a + b; } add(2, 3);", 5),
    ];
    for (input, expected) in cases {
        assert_integer(input, expected);
    }
}

#[test]
fn call_arity_is_exact() {
    let error = eval_err("let f = fn(a, b) { a; }; f(1);");
    assert_eq!(error.message, "expected 2 arg(s) got 1");

    let error = eval_err("let f = 1; f();");
    assert_eq!(error.message, "not a function: 1");
}

#[test]
fn closures_capture_their_environment() {
    assert_integer(
        "let newAdder = fn(x) { fn(y) { x + y }; }; let addTwo = newAdder(2); addTwo(2);",
        4,
    );
    assert_integer(
        "let mk = fn(x) { fn(y) { return x + y; } }; let add3 = mk(3); add3(4);",
        7,
    );
}

#[test]
fn recursion() {
    assert_integer(
        "fn fact(n) { if (n <= 1) { return 1; } return n * fact(n - 1); } fact(6);",
        720,
    );
}

#[test]
fn return_exits_the_enclosing_function() {
    assert_integer(
        "fn f() { let i = 0; while (true) { i = i + 1; if (i == 3) { return i; } } } f();",
        3,
    );
    assert_integer("fn f() { for (let i = 0; i < 10; i++) { return 99; } } f();", 99);
}

#[test]
fn while_and_for_loops() {
    assert_integer("let s = 0; let i = 0; while (i < 5) { s = s + i; i = i + 1; } s;", 10);
    assert_integer(
        "let s = 0; for (let i = 1; i <= 10; i = i + 1) { s = s + i; } s;",
        55,
    );
    assert_integer("let n = 0; for (let i = 0; i < 3; i++) { let local = 1; n = n + local; } n;", 3);
}

#[test]
fn loop_body_declarations_do_not_leak() {
    // The body scope is cleared every iteration, so redeclaration is fine
    // and nothing survives the loop.
    let error = eval_err("for (let i = 0; i < 3; i++) { let x = i; } x;");
    assert_eq!(error.message, "identifier not found: x");

    let error = eval_err("for (let i = 0; i < 3; i++) { } i;");
    assert_eq!(error.message, "identifier not found: i");
}

#[test]
fn postfix_mutates_the_binding() {
    assert_integer("let a = 1; a++;", 2);
    assert_integer("let a = 1; a++; a;", 2);
    assert_integer("let a = 1; a--;", 0);

    let error = eval_err("let a = 1.5; a++;");
    assert!(error.message.starts_with("unknown operator: ++"), "{error}");

    let error = eval_err("5++;");
    assert_eq!(error.message, "postfix expression must be identifier");
}

#[test]
fn arrays() {
    match eval_ok("[1, 2.5, true, \"x\"];") {
        Value::Array(elements) => assert_eq!(elements.borrow().len(), 4),
        other => panic!("expected array, got {other:?}"),
    }

    assert_integer("[1, 2, 3][0];", 1);
    assert_integer("let a = [1, 2, 3]; a[1] + a[2];", 5);
    assert!(matches!(eval_ok("[1, 2, 3][5];"), Value::Nil));
    assert!(matches!(eval_ok("[1, 2, 3][-1];"), Value::Nil));

    assert_integer("let a = [1, 2, 3]; a[1] = 9; a[1];", 9);
    let error = eval_err("let a = [1]; a[5] = 0;");
    assert_eq!(error.message, "index 5 out of bounds");

    assert_integer("[1, 5, true, fn() { return 7; }][3]();", 7);
}

#[test]
fn array_identity_equality() {
    assert_boolean("let a = [1]; let b = [1]; a == b;", false);
    assert_boolean("let a = [1]; let b = a; a == b;", true);
}

#[test]
fn array_methods() {
    assert_integer("[1, 2, 3].len();", 3);
    assert_integer("let a = [1]; a.push(5); a[1];", 5);
    assert_integer("let a = [1, 2]; a.pop();", 2);
    assert_integer("let a = [1, 2]; a.pop(); a.len();", 1);

    match eval_ok("[1, 2].join(\"-\");") {
        Value::String(value) => assert_eq!(value.as_str(), "1-2"),
        other => panic!("expected string, got {other:?}"),
    }

    assert_integer("[1, 2, 3].map(fn(x) { return x * 2; })[2];", 6);
    assert_integer("[1, 2, 3, 4].filter(fn(x) { return x % 2 == 0; }).len();", 2);
    assert_integer("[1, 2, 3].reduce(fn(acc, x) { return acc + x; }, 0);", 6);
    assert_boolean("[1, 2, 3].contains(fn(x) { return x == 2; });", true);
    assert_integer("let a = [1, 2, 3]; a.removeAt(1); a[1];", 3);

    let error = eval_err("[1].removeAt(9);");
    assert_eq!(error.message, "index 9 out of bounds");

    let error = eval_err("[1].nonsense();");
    assert_eq!(error.message, "unknown method: nonsense");
}

#[test]
fn hashes() {
    let cases = [
        ("let x = { \"foo\": 1, \"bar\": 2 }; x[\"foo\"];", 1),
        ("let x = { \"foo\": 1, \"bar\": 2 }; x.bar;", 2),
        ("let x = { \"foo\": fn() { return 1; } }; x[\"foo\"]();", 1),
        ("let x = { \"foo\": fn() { return 1; } }; x.foo();", 1),
        ("let x = { \"foo\": 1 }; x.foo++; x.foo;", 2),
        ("let x = { \"foo\": 1 }; x[\"foo\"]++; x[\"foo\"];", 2),
        ("let x = { \"foo\": { \"bar\": 1 } }; x.foo.bar;", 1),
        ("let x = { \"foo\": { \"bar\": 1 } }; x.foo.bar = 2; x.foo.bar;", 2),
        (
            "let x = { \"foo\": { \"bar\": fn() { return { \"baz\": 1 }; } } }; x.foo.bar().baz;",
            1,
        ),
        ("let h = { 1: \"one\", true: \"yes\" }; if (h[true] == \"yes\") { 1 } else { 0 }", 1),
        ("let h = { \"a\": 1, \"b\": 2 }; h.a = h.a + h.b; h[\"a\"];", 3),
    ];
    for (input, expected) in cases {
        assert_integer(input, expected);
    }

    assert!(matches!(eval_ok("let h = { \"a\": 1 }; h[\"missing\"];"), Value::Nil));

    let error = eval_err("let h = { \"a\": 1 }; h[[1]];");
    assert!(error.message.starts_with("unusable as hash key"), "{error}");
}

#[test]
fn hash_methods_fall_back_after_entries() {
    assert_integer("let h = { \"a\": 1, \"b\": 2 }; h.len();", 2);
    assert_boolean("let h = { \"a\": 1 }; h.contains(\"a\");", true);
    assert_boolean("let h = { \"a\": 1 }; h.contains(\"z\");", false);

    // An entry named like a method shadows the method.
    assert_integer("let h = { \"len\": 42 }; h.len;", 42);

    assert_integer("let h = { \"a\": 1 }; let c = h.clone(); c.a;", 1);
    assert_boolean("let h = { \"a\": 1 }; h.clone() == h;", false);
}

#[test]
fn hash_literal_binds_this() {
    assert_integer(
        "let h = { \"val\": 10, \"get\": fn() { return this.val; } }; h.get();",
        10,
    );
    assert_integer(
        "let h = { \"n\": 2, \"double\": fn() { return this.n * 2; } }; h.double();",
        4,
    );
}

#[test]
fn string_indexing_and_methods() {
    match eval_ok("\"hello\"[1];") {
        Value::String(value) => assert_eq!(value.as_str(), "e"),
        other => panic!("expected string, got {other:?}"),
    }
    assert!(matches!(eval_ok("\"hi\"[9];"), Value::Nil));

    assert_integer("\"hello\".len();", 5);
    match eval_ok("\" hi \".trim();") {
        Value::String(value) => assert_eq!(value.as_str(), "hi"),
        other => panic!("expected string, got {other:?}"),
    }
    match eval_ok("\"abc\".charAt(1);") {
        Value::String(value) => assert_eq!(value.as_str(), "b"),
        other => panic!("expected string, got {other:?}"),
    }
    assert_boolean("\"hello\".contains(\"ell\");", true);
    assert_integer("\"hello\".indexOf(\"llo\");", 2);
    assert_integer("\"a,b,c\".split(\",\").len();", 3);
    match eval_ok("\"ab\".toUpperCase();") {
        Value::String(value) => assert_eq!(value.as_str(), "AB"),
        other => panic!("expected string, got {other:?}"),
    }
    match eval_ok("\"a-b\".replaceAll(\"-\", \"+\");") {
        Value::String(value) => assert_eq!(value.as_str(), "a+b"),
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn builtins() {
    assert_integer("len(\"hello\");", 5);
    assert_integer("len([1, 2, 3]);", 3);
    let error = eval_err("len(1);");
    assert_eq!(error.message, "argument to `len` not supported");
    let error = eval_err("len();");
    assert_eq!(error.message, "wrong number of arguments. got=0, want=1");

    match eval_ok("string(42);") {
        Value::String(value) => assert_eq!(value.as_str(), "42"),
        other => panic!("expected string, got {other:?}"),
    }
    match eval_ok("string(2.5);") {
        Value::String(value) => assert_eq!(value.as_str(), "2.5"),
        other => panic!("expected string, got {other:?}"),
    }

    assert_integer("let a = [1]; append(a, 2); a[1];", 2);
    assert_boolean("let a = [1]; append(a, 2) == a;", true);
    assert_integer("let a = [1, 2, 3]; remove(a, 1); a[1];", 3);

    assert_boolean("let a = [1]; clone(a) == a;", false);
    assert_integer("let a = [1]; let b = clone(a); b[0] = 9; a[0];", 1);

    let error = eval_err("append(1, 2);");
    assert!(error.message.contains("must be array"), "{error}");
}

#[test]
fn builtins_can_be_shadowed() {
    assert_integer("let len = 3; len;", 3);
}

#[test]
fn division_by_zero_errors() {
    let error = eval_err("1 / 0;");
    assert_eq!(error.message, "division by zero");
    let error = eval_err("1 % 0;");
    assert_eq!(error.message, "division by zero");
}

#[test]
fn unknown_identifier_errors() {
    let error = eval_err("foobar;");
    assert_eq!(error.message, "identifier not found: foobar");
    assert_eq!(error.to_string(), "[file main-test.wind:1] identifier not found: foobar");
}

#[test]
fn type_mismatch_errors() {
    let error = eval_err("5 + true;");
    assert_eq!(error.message, "unknown operator: 5 + true");
    let error = eval_err("-true;");
    assert_eq!(error.message, "unknown operator: -true");
}

#[test]
fn errors_carry_the_failing_line() {
    let error = eval_err("let a = 1;\nlet b = 2;\nmissing;");
    assert_eq!(error.location, Some((FILE_NAME.to_string(), 3)));
}

#[test]
fn top_level_return_unwraps() {
    assert_integer("return 5;", 5);
}

fn write_script(dir: &std::path::Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, source).expect("writing test script");
    path
}

fn temp_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("windlang-eval-{}-{test}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("creating test dir");
    dir
}

#[test]
fn include_exposes_file_bindings() {
    let dir = temp_dir("include");
    write_script(&dir, "lib.wind", "let three = 3; fn triple(x) { return x * 3; }");
    let main = write_script(&dir, "main.wind", "include \"./lib.wind\"; triple(three);");

    let mut parser = Parser::new(
        Lexer::new(&std::fs::read_to_string(&main).unwrap()),
        main.to_string_lossy().as_ref(),
    );
    let program = parser.parse_program();
    assert!(parser.report_errors().is_empty());

    let result = Evaluator::new(main.to_string_lossy().as_ref())
        .run(&program)
        .expect("include evaluation");
    assert!(matches!(result, Value::Integer(9)));
}

#[test]
fn include_alias_and_memoisation() {
    let dir = temp_dir("alias");
    write_script(&dir, "lib.wind", "let marker = [1];");
    let main = write_script(
        &dir,
        "main.wind",
        "include \"./lib.wind\" as a; include \"./lib.wind\" as b; a.marker == b.marker;",
    );

    let source = std::fs::read_to_string(&main).unwrap();
    let mut parser = Parser::new(Lexer::new(&source), main.to_string_lossy().as_ref());
    let program = parser.parse_program();
    assert!(parser.report_errors().is_empty());

    // Both aliases see the same environment, so the array is one object:
    // the file was evaluated at most once.
    let result = Evaluator::new(main.to_string_lossy().as_ref())
        .run(&program)
        .expect("aliased include evaluation");
    assert!(matches!(result, Value::Boolean(true)));
}

#[test]
fn missing_include_is_a_runtime_error() {
    let error = eval_err("include \"./does-not-exist.wind\";");
    assert!(error.message.contains("could not read include"), "{error}");
}

#[test]
fn math_stdlib() {
    assert_float("include \"math\" as m; m.abs(-2.5);", 2.5);
    assert_float("include \"math\" as m; m[\"floor\"](3.7);", 3.0);
    assert_float("include \"math\" as m; m.sqrt(9.0);", 3.0);
    assert_boolean("include \"math\" as m; m.pi > 3.1 && m.pi < 3.2;", true);

    // Unaliased include makes the names visible directly.
    assert_float("include \"math\"; ceil(1.2);", 2.0);

    let error = eval_err("include \"math\" as m; m.abs(1);");
    assert!(error.message.contains("must be float"), "{error}");

    let error = eval_err("include \"math\" as m; m.nope;");
    assert_eq!(error.message, "identifier not found: nope");
}
