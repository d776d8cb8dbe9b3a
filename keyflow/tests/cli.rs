//! CLI tests for the `keyflow` binary.
//!
//! Spawns the binary against a scaffolded project and checks exit codes and
//! printed output.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use keyflow::exit_codes;
use keyflow::io::init::{InitOptions, ProjectPaths, init_project};

fn keyflow(root: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_keyflow"))
        .current_dir(root)
        .args(args)
        .env("USER", "tester")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn keyflow");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("keyflow output")
}

fn project() -> (tempfile::TempDir, ProjectPaths) {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = init_project(temp.path(), &InitOptions { force: false }).expect("init");
    (temp, paths)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let (temp, _) = project();
    let output = keyflow(temp.path(), &["init"], "");
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let output = keyflow(temp.path(), &["init", "--force"], "");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn check_reports_ok_problems_and_missing_documents() {
    let (temp, paths) = project();

    let output = keyflow(temp.path(), &["check", "/main"], "");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "/main: ok\n");

    fs::write(
        paths.documents_dir.join("broken.json"),
        r#"{"main": {"go": "link(.Nowhere)", "both": {"function": "f", "link": "x"}}}"#,
    )
    .expect("write broken");
    let output = keyflow(temp.path(), &["check", "/broken"], "");
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let printed = stdout(&output);
    assert!(printed.contains("/broken: main.go: link '.Nowhere' names missing block 'Nowhere'"));
    assert!(printed.contains("/broken: main.both:"));

    let output = keyflow(temp.path(), &["check", "/missing"], "");
    assert_eq!(output.status.code(), Some(exit_codes::NOT_FOUND));
}

#[test]
fn link_prints_the_resolved_target() {
    let (temp, paths) = project();
    let app = paths.documents_dir.join("app");
    fs::create_dir_all(&app).expect("mkdir");
    fs::write(app.join("siblingDoc.json"), r#"{"Entry": {"k": "v"}}"#).expect("write");
    fs::write(app.join("admin.json"), r#"{"main": {"k": "v"}}"#).expect("write");

    let output = keyflow(
        temp.path(),
        &["link", "../siblingDoc.Entry", "--from", "/app/docs/current.Start"],
        "",
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "/app/siblingDoc.Entry\n");

    let output = keyflow(
        temp.path(),
        &["link", "./admin?admin", "--from", "/app/home.main"],
        "",
    );
    assert_eq!(output.status.code(), Some(exit_codes::FORBIDDEN));

    let output = keyflow(
        temp.path(),
        &["link", "./nothing", "--from", "/app/home.main"],
        "",
    );
    assert_eq!(output.status.code(), Some(exit_codes::NOT_FOUND));
}

#[test]
fn run_walks_the_demo_until_input_ends() {
    let (temp, _) = project();
    let session_file = temp.path().join("session.json");
    let session_arg = session_file.to_str().expect("utf8 path");

    let output = keyflow(
        temp.path(),
        &["run", "/main", "--session", session_arg],
        "1\n",
    );
    assert_eq!(output.status.code(), Some(exit_codes::ABORTED));
    let printed = stdout(&output);
    assert!(printed.contains("Welcome to keyflow, tester."));
    assert!(printed.contains("1. Greet"));
    assert!(printed.contains("hello from keyflow"));

    let saved = fs::read_to_string(&session_file).expect("session saved");
    assert!(saved.contains("\"current_path\": \"/main\""));
}
