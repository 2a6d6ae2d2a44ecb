use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const ENV_OVERRIDES: &[&str] = &[
    "COUCHBASE_URL",
    "COUCHBASE_USERNAME",
    "COUCHBASE_PASSWORD",
    "COUCHBASE_BUCKET",
    "CSYNC_STORE",
    "CSYNC_SQLITE_PATH",
    "CSYNC_EMBEDDINGS",
    "CSYNC_EMBEDDING_PROVIDER",
    "CSYNC_SOURCE_DIR",
    "CSYNC_DEST_DIR",
    "CSYNC_STRATEGY",
    "CSYNC_FAIL_FAST",
    "OPENAI_API_KEY",
    "RUST_LOG",
];

fn csync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("csync");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let drafts = root.join("drafts");
    fs::create_dir_all(&drafts).unwrap();
    fs::write(
        drafts.join("alpha.md"),
        "---\ntitle: Hello World\ndate: 2024-01-15\ntags: [rust]\n---\nAlpha body about Rust.\n",
    )
    .unwrap();
    fs::write(
        drafts.join("beta.mdx"),
        "---\ntitle: Second  Post\ndate: 2024-02-01\n---\nBeta body.\n",
    )
    .unwrap();
    fs::write(drafts.join("notes.txt"), "not a post").unwrap();

    let config_content = format!(
        r#"[store]
backend = "sqlite"
path = "{root}/data/content.sqlite"

[source]
source_dir = "{root}/drafts"
dest_dir = "{root}/published"
"#,
        root = root.display()
    );

    let config_path = root.join("csync.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_csync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = csync_binary();
    let mut cmd = Command::new(&binary);
    for var in ENV_OVERRIDES {
        cmd.env_remove(var);
    }
    let output = cmd
        .current_dir(config_path.parent().unwrap())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run csync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csync(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/content.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_csync(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_csync(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_sync_imports_and_moves_drafts() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csync(&config_path, &["sync"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("discovered: 2 files"));
    assert!(stdout.contains("upserted documents: 2"));
    assert!(stdout.contains("moved: 2"));
    assert!(stdout.trim_end().ends_with("ok"));

    let published = tmp.path().join("published");
    assert!(published.join("alpha.md").exists());
    assert!(published.join("beta.mdx").exists());
    assert!(!tmp.path().join("drafts/alpha.md").exists());
    assert!(tmp.path().join("drafts/notes.txt").exists());
}

#[test]
fn test_get_returns_stored_record() {
    let (_tmp, config_path) = setup_test_env();
    run_csync(&config_path, &["sync"]);

    let (stdout, stderr, success) =
        run_csync(&config_path, &["get", "blog_hello-world_1705276800000"]);
    assert!(success, "get failed: stdout={}, stderr={}", stdout, stderr);
    let record: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(record["type"], "blogPost");
    assert_eq!(record["title"], "Hello World");
    assert_eq!(record["content"], "Alpha body about Rust.\n");
    assert_eq!(record["tags"][0], "rust");

    // Whitespace runs collapse to a single dash.
    let (_, _, success) = run_csync(&config_path, &["get", "blog_second-post_1706745600000"]);
    assert!(success);
}

#[test]
fn test_get_missing_key_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_csync(&config_path, &["init"]);

    let (_, stderr, success) = run_csync(&config_path, &["get", "blog_nope_0"]);
    assert!(!success);
    assert!(stderr.contains("record not found"));
}

#[test]
fn test_sync_reports_bad_post_and_exits_nonzero() {
    let (tmp, config_path) = setup_test_env();
    fs::write(
        tmp.path().join("drafts/broken.md"),
        "---\ntitle: No Date\n---\nBody.\n",
    )
    .unwrap();

    let (stdout, _, success) = run_csync(&config_path, &["sync"]);
    assert!(!success, "a failed document must give a nonzero exit");
    assert!(stdout.contains("upserted documents: 2"));
    assert!(stdout.contains("failed: 1"));
    assert!(stdout.contains("broken.md [validation]"));
    assert!(tmp.path().join("drafts/broken.md").exists());
}

#[test]
fn test_sync_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csync(&config_path, &["sync", "--dry-run"]);
    assert!(success, "dry-run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("would upsert: 2"));
    assert!(stdout.contains("blog_hello-world_1705276800000"));
    assert!(tmp.path().join("drafts/alpha.md").exists());
    assert!(!tmp.path().join("published").exists());
}

#[test]
fn test_sync_json_summary() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csync(&config_path, &["sync", "--json"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["store"], "sqlite");
    assert_eq!(report["succeeded"], 2);
    assert_eq!(report["moved"], 2);
    assert_eq!(report["aborted"], false);
    assert!(report["failures"].as_array().unwrap().is_empty());
}

#[test]
fn test_sync_empty_drafts_is_an_error() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("drafts/alpha.md")).unwrap();
    fs::remove_file(tmp.path().join("drafts/beta.mdx")).unwrap();

    let (_, stderr, success) = run_csync(&config_path, &["sync"]);
    assert!(!success);
    assert!(stderr.contains("No Markdown files found"));
}

#[test]
fn test_rerun_after_restoring_drafts_converges() {
    let (tmp, config_path) = setup_test_env();
    let (_, _, success) = run_csync(&config_path, &["sync"]);
    assert!(success);

    // Put a draft back while its published copy still exists.
    fs::write(
        tmp.path().join("drafts/alpha.md"),
        "---\ntitle: Hello World\ndate: 2024-01-15\n---\nEdited body.\n",
    )
    .unwrap();

    let (stdout, _, success) = run_csync(&config_path, &["sync"]);
    assert!(!success, "relocation conflict is reported");
    assert!(stdout.contains("alpha.md (blog_hello-world_1705276800000) [relocation]"));
    assert!(tmp.path().join("drafts/alpha.md").exists());

    let (stdout, _, _) = run_csync(&config_path, &["get", "blog_hello-world_1705276800000"]);
    let record: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(record["content"], "Edited body.\n");
}

#[test]
fn test_missing_explicit_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_csync(&tmp.path().join("absent.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("error:"));
}
