use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn kbh_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_kbh"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(files_dir.join("empty.md"), "   \n\n").unwrap();
    fs::write(files_dir.join("notes.txt"), "deployment notes").unwrap();
    fs::write(
        root.join("history.json"),
        r#"[{"role": "user", "content": "hi"}]"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/kbh.sqlite"

[chunking]
max_chars = 200

[server]
bind = "127.0.0.1:7332"
"#,
        root.display()
    );

    let config_path = config_dir.join("kbh.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_kbh(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = kbh_binary();
    let output = Command::new(&binary)
        .env("KBH_AUTH_SECRET", "cli-test-secret")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kbh binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn init_with_user(config_path: &Path) {
    let (_, stderr, ok) = run_kbh(config_path, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    let (_, stderr, ok) = run_kbh(config_path, &["user", "add", "alice@example.com"]);
    assert!(ok, "user add failed: {}", stderr);
}

#[test]
fn test_init_is_idempotent() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, ok) = run_kbh(&config_path, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully"));
    assert!(tmp.path().join("data/kbh.sqlite").exists());

    let (_, stderr, ok) = run_kbh(&config_path, &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_user_add_prints_token() {
    let (_tmp, config_path) = setup_test_env();
    run_kbh(&config_path, &["init"]);

    let (stdout, stderr, ok) = run_kbh(&config_path, &["user", "add", "alice@example.com"]);
    assert!(ok, "user add failed: {}", stderr);
    assert!(stdout.contains("user 1 created: alice@example.com"));
    let token = stdout
        .lines()
        .find_map(|l| l.strip_prefix("token: "))
        .expect("token line");
    assert!(token.starts_with("1."));

    // Emails are unique.
    let (_, _, ok) = run_kbh(&config_path, &["user", "add", "alice@example.com"]);
    assert!(!ok);
}

#[test]
fn test_kb_create_and_list() {
    let (_tmp, config_path) = setup_test_env();
    init_with_user(&config_path);

    let (stdout, stderr, ok) = run_kbh(&config_path, &["kb", "create", "handbook", "--user", "1"]);
    assert!(ok, "kb create failed: {}", stderr);
    assert!(stdout.contains("knowledge base 1 created: handbook"));

    let (stdout, _, ok) = run_kbh(&config_path, &["kb", "list", "--user", "1"]);
    assert!(ok);
    assert!(stdout.contains("handbook"));

    let (_, _, ok) = run_kbh(&config_path, &["kb", "create", "  ", "--user", "1"]);
    assert!(!ok);
}

#[test]
fn test_upload_empty_markdown_and_list_files() {
    let (tmp, config_path) = setup_test_env();
    init_with_user(&config_path);
    run_kbh(&config_path, &["kb", "create", "handbook", "--user", "1"]);

    // Whitespace-only file: stored with zero chunks, embedder never called.
    let path = tmp.path().join("files/empty.md");
    let (stdout, stderr, ok) = run_kbh(
        &config_path,
        &["upload", "1", path.to_str().unwrap(), "--user", "1"],
    );
    assert!(ok, "upload failed: {}", stderr);
    assert!(stdout.contains("uploaded empty.md as empty-md (0 chunks)"));

    let (stdout, _, ok) = run_kbh(&config_path, &["files", "1", "--user", "1"]);
    assert!(ok);
    assert!(stdout.contains("empty-md  empty.md"));
}

#[test]
fn test_upload_with_disabled_embeddings_fails() {
    let (tmp, config_path) = setup_test_env();
    init_with_user(&config_path);
    run_kbh(&config_path, &["kb", "create", "handbook", "--user", "1"]);

    let path = tmp.path().join("files/notes.txt");
    let (_, stderr, ok) = run_kbh(
        &config_path,
        &["upload", "1", path.to_str().unwrap(), "--user", "1"],
    );
    assert!(!ok);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);

    let (stdout, _, _) = run_kbh(&config_path, &["files", "1", "--user", "1"]);
    assert!(stdout.contains("No files."));
}

#[test]
fn test_foreign_kb_is_forbidden() {
    let (_tmp, config_path) = setup_test_env();
    init_with_user(&config_path);
    run_kbh(&config_path, &["user", "add", "bob@example.com"]);
    run_kbh(&config_path, &["kb", "create", "handbook", "--user", "1"]);

    let (_, stderr, ok) = run_kbh(&config_path, &["files", "1", "--user", "2"]);
    assert!(!ok);
    assert!(stderr.contains("forbidden"), "stderr: {}", stderr);

    let (_, stderr, ok) = run_kbh(&config_path, &["files", "99", "--user", "1"]);
    assert!(!ok);
    assert!(stderr.contains("not found"), "stderr: {}", stderr);
}

#[test]
fn test_ask_with_disabled_providers_fails() {
    let (tmp, config_path) = setup_test_env();
    init_with_user(&config_path);
    run_kbh(&config_path, &["kb", "create", "handbook", "--user", "1"]);

    let (_, stderr, ok) = run_kbh(
        &config_path,
        &["ask", "1", "What is in the handbook?", "--user", "1"],
    );
    assert!(!ok);
    assert!(stderr.contains("embedding"), "stderr: {}", stderr);

    // With history the rewrite runs first and fails on the disabled chat provider.
    let history = tmp.path().join("history.json");
    let (_, stderr, ok) = run_kbh(
        &config_path,
        &[
            "ask",
            "1",
            "and then?",
            "--user",
            "1",
            "--history",
            history.to_str().unwrap(),
        ],
    );
    assert!(!ok);
    assert!(stderr.contains("rewrite"), "stderr: {}", stderr);
}
