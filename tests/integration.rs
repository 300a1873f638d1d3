use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lexi_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lexi");
    path
}

const CIVIL_CODE: &str = "\
第一编 总则
第六章 民事法律行为
第143条 具备下列条件的民事法律行为有效：行为人具有相应的民事行为能力；意思表示真实；不违反法律、行政法规的强制性规定，不违背公序良俗。
第148条 一方以欺诈手段使对方在违背真实意思的情况下实施的民事法律行为，受欺诈方有权请求人民法院或者仲裁机构予以撤销。
第二编 物权
第205条 本编调整因物的归属和利用产生的民事关系。
";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    // Statute document
    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(docs_dir.join("minfadian.txt"), CIVIL_CODE).unwrap();

    // Subject taxonomy
    let taxonomy_dir = root.join("taxonomies");
    fs::create_dir_all(&taxonomy_dir).unwrap();
    fs::write(
        taxonomy_dir.join("民法.toml"),
        r#"subject = "民法"
version = "2024.1"

[[concepts]]
concept = "诚实信用原则"
category = "基本原则"
patterns = ["诚信原则", "诚实信用"]

[[concepts]]
concept = "欺诈"
category = "民事法律行为"
patterns = ["欺诈手段", "欺骗"]

[[concepts]]
concept = "可撤销民事法律行为"
category = "民事法律行为"
patterns = ["予以撤销", "有权请求撤销"]
"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/lexi.sqlite"

[segmentation]
max_tokens = 512
min_tokens = 24

[retrieval]
top_k = 10
max_top_k = 50

[extraction]
taxonomy_dir = "{root}/taxonomies"
max_points = 8
"#,
        root = root.display()
    );

    let config_path = config_dir.join("lexi.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_lexi(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lexi_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lexi binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn doc_path(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("docs/minfadian.txt")
        .display()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lexi(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_lexi(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_lexi(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_statute() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path);

    run_lexi(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_lexi(&config_path, &["ingest", &doc, "--law", "民法典"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("segments written: 3"));
    assert!(stdout.contains("new: 3"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_idempotent_replaces_in_place() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path);

    run_lexi(&config_path, &["init"]);
    let (_, _, success) = run_lexi(&config_path, &["ingest", &doc, "--law", "民法典"]);
    assert!(success, "First ingest failed");

    let (stdout, stderr, success) =
        run_lexi(&config_path, &["ingest", &doc, "--law", "民法典"]);
    assert!(
        success,
        "Second ingest failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("segments written: 3"));
    assert!(stdout.contains("new: 0"));
    assert!(stdout.contains("unchanged: 3"));
}

#[test]
fn test_ingest_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path);

    run_lexi(&config_path, &["init"]);
    let (stdout, _, success) = run_lexi(
        &config_path,
        &["ingest", &doc, "--law", "民法典", "--dry-run"],
    );
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("segments parsed: 3"));

    let (stdout, _, success) = run_lexi(&config_path, &["remove", "民法典"]);
    assert!(success);
    assert!(stdout.contains("No segments found"));
}

#[test]
fn test_ingest_with_subject_annotates_concepts() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path);

    run_lexi(&config_path, &["init"]);
    let (stdout, stderr, success) = run_lexi(
        &config_path,
        &["ingest", &doc, "--law", "民法典", "--subject", "民法"],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("segments written: 3"));
}

#[test]
fn test_ingest_malformed_document_aborts() {
    let (tmp, config_path) = setup_test_env();
    let bad = tmp.path().join("docs/bad.txt");
    fs::write(&bad, "第一章 总则\n（一）没有条的项。\n").unwrap();

    run_lexi(&config_path, &["init"]);
    let (_, stderr, success) = run_lexi(
        &config_path,
        &["ingest", bad.to_str().unwrap(), "--law", "残缺法"],
    );
    assert!(!success, "malformed document must abort ingestion");
    assert!(stderr.contains("validation"), "stderr: {}", stderr);

    // Nothing was written.
    let (stdout, _, success) = run_lexi(&config_path, &["remove", "残缺法"]);
    assert!(success);
    assert!(stdout.contains("No segments found"));
}

#[test]
fn test_remove_law() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path);

    run_lexi(&config_path, &["init"]);
    run_lexi(&config_path, &["ingest", &doc, "--law", "民法典"]);

    let (stdout, _, success) = run_lexi(&config_path, &["remove", "民法典"]);
    assert!(success);
    assert!(stdout.contains("segments removed: 3"));

    let (stdout, _, success) = run_lexi(&config_path, &["remove", "民法典"]);
    assert!(success);
    assert!(stdout.contains("No segments found"));
}

#[test]
fn test_search_requires_embedding_provider() {
    let (_tmp, config_path) = setup_test_env();

    run_lexi(&config_path, &["init"]);
    let (_, stderr, success) = run_lexi(&config_path, &["search", "欺诈"]);
    assert!(!success);
    assert!(stderr.contains("requires embeddings"), "stderr: {}", stderr);
}

#[test]
fn test_generations_empty() {
    let (_tmp, config_path) = setup_test_env();

    run_lexi(&config_path, &["init"]);
    let (stdout, _, success) = run_lexi(&config_path, &["generations"]);
    assert!(success);
    assert!(stdout.contains("No generations"));
}

#[test]
fn test_extract_returns_knowledge_points() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_lexi(
        &config_path,
        &[
            "extract",
            "--text",
            "本案的核心是诚实信用原则在合同履行中的适用。",
            "--subject",
            "民法",
        ],
    );
    assert!(success, "extract failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("诚实信用原则"));
    assert!(stdout.contains("\"confidence\": 1.0"));
    assert!(stdout.contains("\"category\""));

    // Exactly one point for exactly one mentioned concept.
    let concept_count = stdout.matches("\"concept\"").count();
    assert_eq!(concept_count, 1);
}

#[test]
fn test_extract_is_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    let args = [
        "extract",
        "--text",
        "一方以欺骗手段订立的合同，受欺诈方有权请求撤销；诚实信用原则贯穿始终。",
        "--subject",
        "民法",
    ];
    let (first, _, success1) = run_lexi(&config_path, &args);
    let (second, _, success2) = run_lexi(&config_path, &args);
    assert!(success1 && success2);
    assert_eq!(first, second);
}

#[test]
fn test_extract_unknown_subject_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_lexi(
        &config_path,
        &["extract", "--text", "内容", "--subject", "天文学"],
    );
    assert!(!success);
    assert!(stderr.contains("taxonomy"), "stderr: {}", stderr);
}
