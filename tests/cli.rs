//! 服务器命令行测试

use std::io::Write;

use assert_cmd::Command;
use tempfile::NamedTempFile;

fn server() -> Command {
    let mut cmd = Command::cargo_bin("translator-server").unwrap();
    cmd.env_remove("TRANSLATOR_CONFIG");
    cmd
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_help() {
    let output = server().arg("--help").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("--check-config"));
    assert!(stdout.contains("--port"));
}

#[test]
fn test_env_docs() {
    let output = server().arg("--env-docs").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("TRANSLATOR_TRANSLATION_CAPACITY"));
    assert!(stdout.contains("TRANSLATOR_CACHE_BACKEND"));
}

#[test]
fn test_check_config_accepts_valid_file() {
    let file = config_file(
        r#"
[api]
port = 9090

[cache]
backend = "memory"
"#,
    );

    let output = server()
        .args(["--check-config", "--config"])
        .arg(file.path())
        .args(["--bind", "0.0.0.0"])
        .output()
        .unwrap();

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(output.status.success(), "stdout: {}", stdout);
    assert!(stdout.contains("0.0.0.0:9090/api/v0"));
    assert!(stdout.contains("memory"));
}

#[test]
fn test_check_config_rejects_invalid_file() {
    let file = config_file(
        r#"
[admission]
translation_capacity = 0
"#,
    );

    let output = server()
        .args(["--check-config", "--config"])
        .arg(file.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("配置无效"));
}
