use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

struct TempHome(PathBuf);

impl TempHome {
    fn new(label: &str) -> Self {
        let dir = std::env::temp_dir()
            .join(format!("forksh_startup_{label}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp home");
        TempHome(dir)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempHome {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Feed `input` verbatim; no trailing `exit` is added. Write errors are
/// ignored since startup failures exit before reading stdin.
fn run_raw(args: &[&str], input: &str, home: &Path) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_forksh"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .current_dir(home)
        .env("HOME", home)
        .spawn()
        .expect("spawn forksh");

    if let Some(stdin) = child.stdin.as_mut() {
        let _ = stdin.write_all(input.as_bytes());
    }

    child.wait_with_output().expect("wait output")
}

#[test]
fn version_flag() {
    let home = TempHome::new("version");
    let output = run_raw(&["--version"], "", home.path());
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert_eq!(stdout.trim(), format!("forksh {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_flag() {
    let home = TempHome::new("help");
    let output = run_raw(&["-h"], "", home.path());
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Usage:"), "stdout was: {stdout}");
    assert!(stdout.contains("--config"), "stdout was: {stdout}");
}

#[test]
fn unknown_flag_fails() {
    let home = TempHome::new("bad_flag");
    let output = run_raw(&["--bogus"], "", home.path());
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("Unknown option: --bogus"), "stderr was: {stderr}");
}

#[test]
fn missing_explicit_config_is_fatal() {
    let home = TempHome::new("missing_config");
    let output = run_raw(&["--config", "nope.conf"], "exit\n", home.path());
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr.contains("forksh: fatal: cannot read nope.conf: "),
        "stderr was: {stderr}"
    );
}

#[test]
fn malformed_config_names_the_line() {
    let home = TempHome::new("bad_config");
    std::fs::write(home.path().join(".forksh_config"), "prompt = x\nwhat\n").unwrap();

    let output = run_raw(&[], "exit\n", home.path());
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains(".forksh_config:2:"), "stderr was: {stderr}");
}

#[test]
fn configured_prompt_is_used() {
    let home = TempHome::new("prompt");
    std::fs::write(home.path().join(".forksh_config"), "prompt = \"custom$ \"\n").unwrap();

    let output = run_raw(&[], "exit\n", home.path());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("custom$ "), "stdout was: {stdout}");
}

#[test]
fn no_welcome_when_stdin_is_piped() {
    let home = TempHome::new("welcome");
    let output = run_raw(&[], "exit\n", home.path());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Welcome to forksh"), "stdout was: {stdout}");
    assert!(stdout.starts_with("forksh> "), "stdout was: {stdout}");
}

#[test]
fn exit_aliases_stop_the_loop() {
    for (index, alias) in ["exit", "quit", "$Q"].into_iter().enumerate() {
        let home = TempHome::new(&format!("alias_{index}"));
        let input = format!("false\n{alias}\necho NOT_REACHED\n");
        let output = run_raw(&[], &input, home.path());
        let stdout = String::from_utf8_lossy(&output.stdout);

        assert_eq!(output.status.code(), Some(0), "alias {alias}");
        assert!(!stdout.contains("NOT_REACHED"), "alias {alias}: {stdout}");
    }
}

#[test]
fn end_of_input_says_goodbye_with_last_status() {
    let home = TempHome::new("eof");
    let output = run_raw(&[], "false\n", home.path());
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("Goodbye!"), "stdout was: {stdout}");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn missing_program_status_survives_to_exit() {
    let home = TempHome::new("eof_127");
    let output = run_raw(&[], "forksh-no-such-program\n", home.path());
    assert_eq!(output.status.code(), Some(127));
}

#[test]
fn cd_changes_directory_for_children() {
    let home = TempHome::new("cd");
    std::fs::create_dir_all(home.path().join("sub")).unwrap();

    let output = run_raw(&[], "cd sub\npwd\ncd\npwd\n", home.path());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let sub = home.path().join("sub").canonicalize().unwrap();
    let root = home.path().canonicalize().unwrap();

    assert!(stdout.contains(&format!("{}\n", sub.display())), "stdout was: {stdout}");
    assert!(stdout.contains(&format!("{}\n", root.display())), "stdout was: {stdout}");
}

#[test]
fn cd_to_missing_directory_is_reported() {
    let home = TempHome::new("cd_missing");
    let output = run_raw(&[], "cd no_such_dir\necho NEXT\n", home.path());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(stderr.contains("cd: no_such_dir:"), "stderr was: {stderr}");
    assert!(stdout.contains("NEXT"), "stdout was: {stdout}");
}

#[test]
fn export_reaches_children() {
    let home = TempHome::new("export");
    let input = "export FORKSH_TEST_VAR=hello\nprintenv FORKSH_TEST_VAR\n";
    let output = run_raw(&[], input, home.path());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello\n"), "stdout was: {stdout}");
}

#[test]
fn export_without_assignment_is_usage_error() {
    let home = TempHome::new("export_bad");
    let output = run_raw(&[], "export JUSTNAME\n", home.path());
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(stderr.contains("usage: export KEY=VALUE"), "stderr was: {stderr}");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn help_builtin_lists_commands() {
    let home = TempHome::new("help_builtin");
    let output = run_raw(&[], "help\n", home.path());
    let stdout = String::from_utf8_lossy(&output.stdout);

    for name in ["cd", "export", "history", "jobs", "fg", "bg", "exit"] {
        assert!(stdout.contains(name), "missing {name} in: {stdout}");
    }
}
