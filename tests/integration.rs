use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn study_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("study");
    path
}

fn write_corpus(root: &Path) {
    let lesson_dir = root.join("lessons/2024-q1/lesson-01");
    fs::create_dir_all(&lesson_dir).unwrap();
    fs::write(
        lesson_dir.join("lesson.json"),
        r#"{
  "lesson": {
    "id": "2024-q1-01",
    "lesson_number": 1,
    "title": "Creation",
    "daily_sections": [
      { "day": "Sunday", "date": "2024-01-07", "title": "In the Beginning",
        "content": ["God created the heavens and the earth.", "Light was the first gift."],
        "quotes": [{ "text": "Let there be light." }] },
      { "day": "Monday", "title": "Only Quotes", "content": [],
        "quotes": ["A quote alone is not indexed."] },
      { "day": "Tuesday", "title": "Rest",
        "content": ["The seventh day was blessed and set apart for rest."] }
    ]
  }
}"#,
    )
    .unwrap();

    let books_dir = root.join("books");
    fs::create_dir_all(&books_dir).unwrap();
    fs::write(
        books_dir.join("steps.json"),
        r#"{
  "title": "Steps Forward",
  "author": "A. Writer",
  "sections": [
    { "section_number": 1, "section_title": "Believing", "page_start": 9, "page_end": 20,
      "items": [
        { "title": "Faith Endures", "page": 9, "content": "Faith endures.",
          "book-section-id": "steps-1-1" },
        { "title": "Gardens", "page": 12,
          "content": ["Seeds grow slowly in a quiet garden.", "Water them daily."],
          "book-section-id": "steps-1-2" }
      ] }
  ]
}"#,
    )
    .unwrap();
    fs::write(
        books_dir.join("notes.json"),
        r#"{ "content": "Rivers carry water from the mountains to the sea." }"#,
    )
    .unwrap();
}

fn write_config(root: &Path, provider: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[corpus]
lessons_dir = "{root}/lessons"
books_dir = "{root}/books"

[index]
index_path = "{root}/out/lesson_index.bin"
metadata_path = "{root}/out/lesson_index_meta.json"

[embedding]
provider = "{provider}"
dims = 256

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display(),
        provider = provider
    );

    let config_path = config_dir.join("study.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let config_path = write_config(tmp.path(), "hashing");
    (tmp, config_path)
}

fn run_study(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = study_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("STUDY_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run study binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn result_lines(stdout: &str) -> Vec<&str> {
    stdout
        .lines()
        .filter(|l| l.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .collect()
}

#[test]
fn test_build_reports_counts() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_study(&config_path, &["build"]);
    assert!(success, "build failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("lessons scanned: 1"));
    assert!(stdout.contains("books scanned: 2"));
    assert!(stdout.contains("chunks: 5"));
    assert!(stdout.contains("dims: 256"));
    assert!(tmp.path().join("out/lesson_index.bin").exists());
    assert!(tmp.path().join("out/lesson_index_meta.json").exists());
}

#[test]
fn test_metadata_artifact_shape() {
    let (tmp, config_path) = setup_test_env();
    let (_, _, success) = run_study(&config_path, &["build"]);
    assert!(success);

    let raw = fs::read_to_string(tmp.path().join("out/lesson_index_meta.json")).unwrap();
    let rows: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(rows.len(), 5);

    assert_eq!(rows[0]["type"], "lesson-section");
    assert_eq!(rows[0]["day_index"], 1);
    assert_eq!(rows[0]["quote"], "Let there be light.");
    assert_eq!(rows[1]["day_index"], 3);

    let book = rows
        .iter()
        .find(|r| r["type"] == "book-section" && r["page_number"] == 9)
        .unwrap();
    assert_eq!(book["book-section-id"], "steps-1-1");
    assert_eq!(book["text"], "Faith endures.");

    assert!(rows.iter().any(|r| r["type"] == "json-flat" && r["file_name"] == "notes"));
}

#[test]
fn test_search_ranks_matching_passage_first() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_study(&config_path, &["build"]);
    assert!(success);

    let (stdout, stderr, success) = run_study(&config_path, &["search", "faith", "--top-k", "3"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);

    let lines = result_lines(&stdout);
    assert_eq!(lines.len(), 3, "stdout={}", stdout);
    assert!(lines[0].contains("Faith Endures"), "stdout={}", stdout);
    assert!(stdout.contains("excerpt: \"Faith endures.\""));
}

#[test]
fn test_search_type_filter() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_study(&config_path, &["build"]);
    assert!(success);

    let (stdout, _, success) = run_study(
        &config_path,
        &["search", "rest", "--top-k", "5", "--type", "lesson"],
    );
    assert!(success);
    let lines = result_lines(&stdout);
    assert_eq!(lines.len(), 2, "stdout={}", stdout);
    assert!(lines.iter().all(|l| l.contains("lesson-section")));
}

#[test]
fn test_search_reads_current_source_text() {
    let (tmp, config_path) = setup_test_env();
    let (_, _, success) = run_study(&config_path, &["build"]);
    assert!(success);

    let book = tmp.path().join("books/steps.json");
    let edited = fs::read_to_string(&book)
        .unwrap()
        .replace("\"Faith endures.\"", "\"Faith endures all things.\"");
    fs::write(&book, edited).unwrap();

    let (stdout, _, success) = run_study(&config_path, &["search", "faith", "--top-k", "1"]);
    assert!(success);
    assert!(stdout.contains("Faith endures all things."), "stdout={}", stdout);
}

#[test]
fn test_search_top_k_out_of_range() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_study(&config_path, &["build"]);
    assert!(success);

    let (_, stderr, success) = run_study(&config_path, &["search", "faith", "--top-k", "21"]);
    assert!(!success);
    assert!(stderr.contains("--top-k must be between 1 and 20"));
}

#[test]
fn test_search_without_index_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_study(&config_path, &["search", "faith"]);
    assert!(!success);
    assert!(stderr.contains("Index not loaded"), "stderr={}", stderr);
}

#[test]
fn test_status_before_and_after_build() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_study(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("loaded: false"));
    assert!(stdout.contains("chunks: 0"));

    let (_, _, success) = run_study(&config_path, &["build"]);
    assert!(success);

    let (stdout, _, success) = run_study(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("loaded: true"));
    assert!(stdout.contains("chunks: 5"));
    assert!(stdout.contains("dims: 256"));
}

#[test]
fn test_empty_corpus_does_not_overwrite_index() {
    let (tmp, config_path) = setup_test_env();
    let (_, _, success) = run_study(&config_path, &["build"]);
    assert!(success);
    let before = fs::read(tmp.path().join("out/lesson_index.bin")).unwrap();

    fs::remove_dir_all(tmp.path().join("lessons")).unwrap();
    fs::remove_dir_all(tmp.path().join("books")).unwrap();

    let (stdout, _, success) = run_study(&config_path, &["build"]);
    assert!(success);
    assert!(stdout.contains("no chunks found"));
    assert_eq!(fs::read(tmp.path().join("out/lesson_index.bin")).unwrap(), before);

    let (stdout, _, _) = run_study(&config_path, &["status"]);
    assert!(stdout.contains("chunks: 5"));
}

#[test]
fn test_build_with_disabled_provider_fails() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path());
    let config_path = write_config(tmp.path(), "disabled");

    let (_, stderr, success) = run_study(&config_path, &["build"]);
    assert!(!success);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path(), "word2vec");

    let (_, stderr, success) = run_study(&config_path, &["status"]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"), "stderr={}", stderr);
}
