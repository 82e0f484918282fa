//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Get path to the vaultburn binary
fn vaultburn_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove deps/
    path.push("vaultburn");
    path
}

/// Writes a config file that keeps the activity log inside `dir`.
fn write_config(dir: &Path) -> PathBuf {
    let config = dir.join("config.toml");
    fs::write(
        &config,
        format!(
            "passes = 2\nlog_file = '{}'\n",
            dir.join("activity.log").display()
        ),
    )
    .unwrap();
    config
}

/// Run vaultburn with `stdin` piped in
fn run_vaultburn(config: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(vaultburn_bin())
        .arg("--config")
        .arg(config)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    {
        let input = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        let _ = input.write_all(stdin.as_bytes());
    }
    child.stdin.take();

    child.wait_with_output().unwrap()
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Encrypts `file` and returns the printed key and output path.
fn encrypt(config: &Path, file: &Path) -> (String, PathBuf) {
    let result = run_vaultburn(config, &["encrypt", "--quiet", path_str(file)], "");
    assert!(
        result.status.success(),
        "encrypt failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    let stdout = String::from_utf8(result.stdout).unwrap();
    let (key, output) = stdout.trim_end().split_once('\t').unwrap();
    (key.to_string(), PathBuf::from(output))
}

fn flip_one_bit(key: &str) -> String {
    // Changing the first character flips bits of the first key byte while
    // keeping the text a well-formed key.
    let mut chars: Vec<char> = key.chars().collect();
    chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
    chars.into_iter().collect()
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let secrets = temp_dir.path().join("secrets.txt");
    fs::write(&secrets, "hello world").unwrap();

    let (key, encrypted) = encrypt(&config, &secrets);
    assert_eq!(key.len(), 44);
    assert_eq!(encrypted, temp_dir.path().join("secrets.txt.encrypted"));
    assert!(fs::read_to_string(&encrypted).unwrap().starts_with("vaultburn1:"));

    let decrypted = temp_dir.path().join("decrypted.txt");
    let result = run_vaultburn(
        &config,
        &[
            "decrypt",
            path_str(&encrypted),
            "-o",
            path_str(&decrypted),
            "--key-stdin",
        ],
        &format!("{}\n", key),
    );
    assert!(
        result.status.success(),
        "decrypt failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert_eq!(fs::read_to_string(&decrypted).unwrap(), "hello world");
}

#[test]
fn test_decrypt_with_key_argument_to_default_path() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let secrets = temp_dir.path().join("secrets.txt");
    fs::write(&secrets, "hello world").unwrap();

    let (key, encrypted) = encrypt(&config, &secrets);
    fs::remove_file(&secrets).unwrap();

    let result = run_vaultburn(
        &config,
        &["decrypt", path_str(&encrypted), "--key", &key],
        "",
    );
    assert!(result.status.success());
    assert_eq!(fs::read_to_string(&secrets).unwrap(), "hello world");
}

#[test]
fn test_decrypt_with_flipped_key_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let secrets = temp_dir.path().join("secrets.txt");
    fs::write(&secrets, "hello world").unwrap();

    let (key, encrypted) = encrypt(&config, &secrets);
    let decrypted = temp_dir.path().join("decrypted.txt");
    let result = run_vaultburn(
        &config,
        &[
            "decrypt",
            path_str(&encrypted),
            "-o",
            path_str(&decrypted),
            "--key",
            &flip_one_bit(&key),
        ],
        "",
    );

    assert_eq!(result.status.code(), Some(1));
    assert!(!decrypted.exists());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("authentication failed"), "{}", stderr);
}

#[test]
fn test_malformed_key_rejected_before_reading_input() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let missing = temp_dir.path().join("missing.encrypted");

    let result = run_vaultburn(
        &config,
        &["decrypt", path_str(&missing), "--key", "too-short"],
        "",
    );

    assert_eq!(result.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("key"), "{}", stderr);
    assert!(!stderr.contains("missing.encrypted"), "{}", stderr);
}

#[test]
fn test_encrypt_refuses_existing_output() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let secrets = temp_dir.path().join("secrets.txt");
    let existing = temp_dir.path().join("secrets.txt.encrypted");
    fs::write(&secrets, "hello world").unwrap();
    fs::write(&existing, "precious").unwrap();

    let result = run_vaultburn(&config, &["encrypt", "--quiet", path_str(&secrets)], "");
    assert_eq!(result.status.code(), Some(1));
    assert!(result.stdout.is_empty());
    assert_eq!(fs::read_to_string(&existing).unwrap(), "precious");

    let result = run_vaultburn(
        &config,
        &["encrypt", "--quiet", "--force", path_str(&secrets)],
        "",
    );
    assert!(result.status.success());
}

#[test]
fn test_encrypt_shred_original() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let secrets = temp_dir.path().join("secrets.txt");
    fs::write(&secrets, "hello world").unwrap();

    let result = run_vaultburn(
        &config,
        &["encrypt", "--quiet", "--shred-original", path_str(&secrets)],
        "",
    );
    assert!(result.status.success());
    assert!(!secrets.exists());
    assert!(temp_dir.path().join("secrets.txt.encrypted").exists());
}

#[test]
#[cfg(unix)]
fn test_encrypt_shred_original_failure_still_prints_key() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let real = temp_dir.path().join("real.txt");
    let link = temp_dir.path().join("link.txt");
    fs::write(&real, "hello world").unwrap();
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let result = run_vaultburn(
        &config,
        &["encrypt", "--quiet", "--shred-original", path_str(&link)],
        "",
    );
    assert_eq!(result.status.code(), Some(2));
    let stdout = String::from_utf8(result.stdout).unwrap();
    let (key, output) = stdout.trim_end().split_once('\t').unwrap();
    assert_eq!(key.len(), 44);
    assert!(Path::new(output).exists());
    assert!(String::from_utf8_lossy(&result.stderr).contains("failed to shred the original"));
}

#[test]
fn test_shred_files() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let a = temp_dir.path().join("a.txt");
    let b = temp_dir.path().join("b.txt");
    fs::write(&a, "aaaa").unwrap();
    fs::write(&b, "bbbb").unwrap();

    let result = run_vaultburn(
        &config,
        &["shred", "--yes", "--quiet", path_str(&a), path_str(&b)],
        "",
    );
    assert!(
        result.status.success(),
        "shred failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert!(!a.exists());
    assert!(!b.exists());
}

#[test]
fn test_shred_prompt_declined() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let a = temp_dir.path().join("a.txt");
    fs::write(&a, "aaaa").unwrap();

    let result = run_vaultburn(&config, &["shred", path_str(&a)], "n\n");
    assert_eq!(result.status.code(), Some(1));
    assert!(a.exists());
    assert!(String::from_utf8_lossy(&result.stderr).contains("permanently destroyed"));
}

#[test]
fn test_shred_prompt_accepted() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let a = temp_dir.path().join("a.txt");
    fs::write(&a, "aaaa").unwrap();

    let result = run_vaultburn(&config, &["shred", "--quiet", path_str(&a)], "yes\n");
    assert!(result.status.success());
    assert!(!a.exists());
}

#[test]
fn test_shred_partial_failure_exit_code() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let a = temp_dir.path().join("a.txt");
    let missing = temp_dir.path().join("missing.txt");
    fs::write(&a, "aaaa").unwrap();

    let result = run_vaultburn(
        &config,
        &["shred", "-y", "-q", path_str(&a), path_str(&missing)],
        "",
    );
    assert_eq!(result.status.code(), Some(2));
    assert!(!a.exists());
    assert!(String::from_utf8_lossy(&result.stderr).contains("missing.txt"));
}

#[test]
fn test_shred_nothing_succeeded_exit_code() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let missing = temp_dir.path().join("missing.txt");

    let result = run_vaultburn(&config, &["shred", "-y", "-q", path_str(&missing)], "");
    assert_eq!(result.status.code(), Some(1));
}

#[test]
fn test_shred_zero_passes_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let a = temp_dir.path().join("a.txt");
    fs::write(&a, "aaaa").unwrap();

    let result = run_vaultburn(
        &config,
        &["shred", "-y", "--passes", "0", path_str(&a)],
        "",
    );
    assert_eq!(result.status.code(), Some(1));
    assert!(a.exists());
}

#[test]
fn test_shred_directory() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let dir = temp_dir.path().join("victims");
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("top.txt"), "top").unwrap();
    fs::write(dir.join("nested").join("deep.txt"), "deep").unwrap();

    let result = run_vaultburn(&config, &["shred", "-y", "-q", path_str(&dir)], "");
    assert!(result.status.success());
    assert!(!dir.join("top.txt").exists());
    assert!(dir.join("nested").join("deep.txt").exists());

    let result = run_vaultburn(&config, &["shred", "-y", "-q", "-r", path_str(&dir)], "");
    assert!(result.status.success());
    assert!(!dir.join("nested").join("deep.txt").exists());
}

#[test]
#[cfg(unix)]
fn test_shred_refuses_symlink() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let target = temp_dir.path().join("target.txt");
    let link = temp_dir.path().join("link.txt");
    fs::write(&target, "do not touch").unwrap();
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let result = run_vaultburn(&config, &["shred", "-y", "-q", path_str(&link)], "");
    assert_eq!(result.status.code(), Some(1));
    assert_eq!(fs::read_to_string(&target).unwrap(), "do not touch");
    assert!(fs::symlink_metadata(&link).is_ok());
}

#[test]
fn test_log_lists_activity() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(temp_dir.path());
    let a = temp_dir.path().join("a.txt");
    fs::write(&a, "aaaa").unwrap();

    let (key, _) = encrypt(&config, &a);
    let result = run_vaultburn(&config, &["shred", "-y", "-q", path_str(&a)], "");
    assert!(result.status.success());

    let result = run_vaultburn(&config, &["log"], "");
    assert!(result.status.success());
    let stdout = String::from_utf8(result.stdout).unwrap();
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "{}", stdout);
    assert!(lines[0].contains(" - INFO - encrypt "));
    assert!(lines[1].contains(" - INFO - shred "));
    assert!(!stdout.contains(&key));

    let result = run_vaultburn(&config, &["log", "--tail", "1"], "");
    let stdout = String::from_utf8(result.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
}

#[test]
fn test_invalid_config_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config.toml");
    fs::write(&config, "passes = \"many\"\n").unwrap();

    let result = run_vaultburn(&config, &["log"], "");
    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("config"));
}
