//! End-to-end scenarios through the `wind` binary: real files, both CLI
//! verbs, captured stdout, and exit codes.

use std::path::PathBuf;
use std::process::{Command, Output};

fn temp_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("windlang-e2e-{}-{test}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("creating test dir");
    dir
}

fn run_verb(verb: &str, test: &str, source: &str) -> Output {
    let dir = temp_dir(test);
    let script = dir.join("main.wind");
    std::fs::write(&script, source).expect("writing test script");

    Command::new(env!("CARGO_BIN_EXE_wind"))
        .arg(verb)
        .arg(&script)
        .output()
        .expect("running the wind binary")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn assert_run(source: &str, test: &str, expected_stdout: &str) {
    let output = run_verb("run", test, source);
    assert_eq!(stdout_of(&output), expected_stdout, "source: {source}");
    assert!(output.status.success(), "source: {source}");
}

fn assert_vm(source: &str, test: &str, expected_stdout: &str) {
    let output = run_verb("vm", test, source);
    assert_eq!(stdout_of(&output), expected_stdout, "source: {source}");
    assert!(output.status.success(), "source: {source}");
}

#[test]
fn scenario_sum_loop() {
    let source = "let s=0; for(let i=1;i<=10;i=i+1){ s=s+i; } echo s;";
    assert_run(source, "sum-run", "55\n");
    assert_vm(source, "sum-vm", "55\n");
}

#[test]
fn scenario_factorial() {
    let source = "fn fact(n){ if(n<=1){ return 1; } return n*fact(n-1); } echo fact(6);";
    assert_run(source, "fact-run", "720\n");
    assert_vm(source, "fact-vm", "720\n");
}

#[test]
fn scenario_closure() {
    let source = "let mk = fn(x){ fn(y){ return x+y; } }; let add3 = mk(3); echo add3(4);";
    assert_run(source, "closure-run", "7\n");
}

#[test]
fn scenario_hash_field_update() {
    let source = "let h = {\"a\":1,\"b\":2}; h.a = h.a + h.b; echo h[\"a\"];";
    assert_run(source, "hash-run", "3\n");
}

#[test]
fn scenario_array_assignment_and_bounds() {
    let source = "let a=[1,2,3]; a[1] = 9; echo a[0]; echo a[1]; echo a[5];";
    assert_run(source, "array-run", "1\n9\nnil\n");
}

#[test]
fn scenario_constant_assignment_fails_at_runtime() {
    let source = "const k = 2; k = 3;";
    let output = run_verb("run", "const-run", source);

    let stdout = stdout_of(&output);
    assert!(
        stdout.contains("cannot assign to a constant variable k"),
        "stdout: {stdout}"
    );
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn parse_errors_are_reported_with_location_and_exit_1() {
    let output = run_verb("run", "parse-error", "let = ;");

    let stdout = stdout_of(&output);
    assert!(stdout.contains("[file "), "stdout: {stdout}");
    assert!(stdout.contains(":1]:"), "stdout: {stdout}");
    assert_eq!(output.status.code(), Some(1));

    // The vm verb gates on parse errors the same way.
    let output = run_verb("vm", "parse-error-vm", "let = ;");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn runtime_errors_carry_file_and_line() {
    let output = run_verb("run", "runtime-error", "let a = 1;\nmissing;");

    let stdout = stdout_of(&output);
    assert!(
        stdout.contains(":2] identifier not found: missing"),
        "stdout: {stdout}"
    );
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn vm_rejects_unsupported_constructs_with_a_compile_error() {
    let output = run_verb("vm", "vm-unsupported", "let h = { \"a\": 1 };");

    let stdout = stdout_of(&output);
    assert!(stdout.contains("not supported by the vm backend"), "stdout: {stdout}");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn vm_debug_flag_prints_a_disassembly() {
    let dir = temp_dir("vm-debug");
    let script = dir.join("main.wind");
    std::fs::write(&script, "echo 1 + 2;").expect("writing test script");

    let output = Command::new(env!("CARGO_BIN_EXE_wind"))
        .arg("vm")
        .arg(&script)
        .arg("--debug")
        .output()
        .expect("running the wind binary");

    let stdout = stdout_of(&output);
    assert!(stdout.contains("const 0"), "stdout: {stdout}");
    assert!(stdout.contains("add"), "stdout: {stdout}");
    assert!(stdout.ends_with("3\n"), "stdout: {stdout}");
}

#[test]
fn includes_work_end_to_end() {
    let dir = temp_dir("include");
    std::fs::write(
        dir.join("lib.wind"),
        "fn add2(x) { return x + 2; }\nlet base = 40;\n",
    )
    .expect("writing lib");

    let script = dir.join("main.wind");
    std::fs::write(&script, "include \"./lib.wind\";\necho add2(base);\n").expect("writing main");

    let output = Command::new(env!("CARGO_BIN_EXE_wind"))
        .arg("run")
        .arg(&script)
        .output()
        .expect("running the wind binary");

    assert_eq!(stdout_of(&output), "42\n");
    assert!(output.status.success());
}

#[test]
fn aliased_include_end_to_end() {
    let dir = temp_dir("alias");
    std::fs::write(dir.join("geometry.wind"), "fn area(w, h) { return w * h; }\n")
        .expect("writing lib");

    let script = dir.join("main.wind");
    std::fs::write(
        &script,
        "include \"./geometry.wind\" as geo;\necho geo.area(6, 7);\n",
    )
    .expect("writing main");

    let output = Command::new(env!("CARGO_BIN_EXE_wind"))
        .arg("run")
        .arg(&script)
        .output()
        .expect("running the wind binary");

    assert_eq!(stdout_of(&output), "42\n");
    assert!(output.status.success());
}

#[test]
fn math_stdlib_end_to_end() {
    assert_run(
        "include \"math\" as m; echo m.abs(-1.5);",
        "math-lib",
        "1.5\n",
    );
}

#[test]
fn echo_and_println_formatting() {
    assert_run("echo [1, 2 + 3];", "echo-array", "[1, 5]\n");
    assert_run("println(1, \"two\", 3.5);", "println", "1 two 3.5\n");
    assert_run("print(\"a\", \"b\");", "print", "a b");
    assert_run("echo nil;", "echo-nil", "nil\n");
}
