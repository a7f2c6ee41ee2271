use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

fn write_config(dir: &Path, file_name: &str, body: &str) -> PathBuf {
    let config_path = dir.join(file_name);
    fs::write(&config_path, body).expect("write config");
    config_path
}

fn write_valid_config(dir: &Path, file_name: &str) -> PathBuf {
    let data_dir = dir.join("data");
    write_config(
        dir,
        file_name,
        &format!(
            r#"
name = "checkind-cli-test"
env = "dev"
pid = "{pid}"

[bind.http]
ip = "127.0.0.1"
port = 39110

[storage]
backend = "sqlite"
sqlite_path = "{sqlite}"

[[directory.gateways]]
network_id = "net1"
logical_id = "gw1"
hardware_id = "hw1"

[observability.log]
output = "console"
"#,
            sqlite = data_dir.display(),
            pid = dir.join("checkind.pid").display()
        ),
    )
}

fn run_checkind(args: &[&str], current_dir: Option<&Path>) -> Output {
    let mut cmd = Command::new(PathBuf::from(env!("CARGO_BIN_EXE_checkind")));
    cmd.args(args);
    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }
    cmd.output().expect("run checkind command")
}

#[test]
fn test_command_accepts_explicit_valid_config() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config_path = write_valid_config(temp.path(), "valid.toml");
    let output = run_checkind(&["test", config_path.to_str().expect("utf8 path")], None);

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_command_finds_default_config_in_current_directory() {
    let temp = tempfile::tempdir().expect("temp dir");
    write_valid_config(temp.path(), "config.toml");
    let output = run_checkind(&["test"], Some(temp.path()));

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_command_fails_for_missing_custom_config_path() {
    let temp = tempfile::tempdir().expect("temp dir");
    let missing_path = temp.path().join("missing.toml");
    let output = run_checkind(&["test", missing_path.to_str().expect("utf8 path")], None);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "command should fail");
    assert!(
        stderr.contains("Config file not found"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn test_command_fails_for_invalid_toml() {
    let temp = tempfile::tempdir().expect("temp dir");
    let bad_path = write_config(temp.path(), "bad.toml", "name = \"broken\"\nenv = [\n");
    let output = run_checkind(&["test", bad_path.to_str().expect("utf8 path")], None);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "command should fail");
    assert!(stderr.contains("配置解析失败"), "unexpected stderr: {stderr}");
}

#[test]
fn test_command_fails_for_validation_errors() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config_path = write_config(
        temp.path(),
        "invalid.toml",
        r#"
name = "checkind-cli-invalid"
env = "staging"

[reporter]
interval_secs = 0
"#,
    );
    let output = run_checkind(&["test", config_path.to_str().expect("utf8 path")], None);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "command should fail");
    assert!(stderr.contains("staging"), "unexpected stderr: {stderr}");
    assert!(
        stderr.contains("reporter.interval_secs"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn test_command_succeeds_with_warning_only_config() {
    let temp = tempfile::tempdir().expect("temp dir");
    // prod + 内存存储 + 控制台日志：只产生警告
    let config_path = write_config(
        temp.path(),
        "warning.toml",
        r#"
name = "checkind-cli-warning"
env = "prod"

[storage]
backend = "memory"
"#,
    );
    let output = run_checkind(&["test", config_path.to_str().expect("utf8 path")], None);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(
        output.status.success(),
        "warning-only config should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("Warning:"), "unexpected stdout: {stdout}");
}

#[test]
fn run_mode_fails_when_no_default_config_exists() {
    let temp = tempfile::tempdir().expect("temp dir");
    let output = run_checkind(&[], Some(temp.path()));
    let stderr = String::from_utf8_lossy(&output.stderr);

    // /etc/checkind/config.toml 存在时此测试不适用
    if Path::new("/etc/checkind/config.toml").exists() {
        return;
    }
    assert!(!output.status.success(), "run mode should fail");
    assert!(
        stderr.contains("No configuration file found"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn run_mode_fails_for_validation_errors() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config_path = write_config(
        temp.path(),
        "run-invalid.toml",
        r#"
name = ""
env = "dev"
"#,
    );
    let output = run_checkind(
        &["--config", config_path.to_str().expect("utf8 path")],
        None,
    );
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "run mode should fail");
    assert!(
        stderr.contains("Instance name cannot be empty"),
        "unexpected stderr: {stderr}"
    );
}
