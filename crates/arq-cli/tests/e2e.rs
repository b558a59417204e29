//! End-to-end tests for the ARQ CLI.
//!
//! Tests invoke the `arq` binary as a subprocess and verify JSON output.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn arq() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_arq"));
    cmd.env_remove("ARQ_STORE_ROOT")
        .env_remove("ARQ_WORKBOOK")
        .env_remove("ARQ_LOG");
    cmd
}

fn arq_in(dir: &Path) -> Command {
    let mut cmd = arq();
    cmd.current_dir(dir);
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    arq_in(dir).args(args).output().unwrap()
}

fn run_ok(dir: &Path, args: &[&str]) -> serde_json::Value {
    let output = run(dir, args);
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn write_sheet(dir: &Path, name: &str, sheet: &serde_json::Value) -> String {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_vec(sheet).unwrap()).unwrap();
    path.to_string_lossy().into_owned()
}

/// Initialized archive with RH / CONTRATO options and two storage spaces.
fn init_archive() -> TempDir {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["init"]);
    assert!(
        output.status.success(),
        "init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let selectboxes = serde_json::json!({
        "columns": ["Departamentos", "Sigla Departamento", "Tipos de Documento", "Sigla Documento"],
        "rows": [["RH", "RH", "CONTRATO", "CT"]]
    });
    let retention = serde_json::json!({
        "columns": ["ORIGEM DOCUMENTO SUBMISSÃO", "Retenção"],
        "rows": [["RH", "5 anos"]]
    });
    let spaces = serde_json::json!({
        "columns": ["Arquivo", "Estantes", "Prateleiras"],
        "rows": [["1", "5", "4"], ["2", "5", "4"]]
    });
    for (sheet, file, value) in [
        ("Selectboxes", "selectboxes.json", &selectboxes),
        ("Retencao", "retencao.json", &retention),
        ("Espacos", "espacos.json", &spaces),
    ] {
        let path = write_sheet(dir.path(), file, value);
        let output = run(dir.path(), &["options", "set", sheet, &path, "--responsible", "Admin"]);
        assert!(
            output.status.success(),
            "options set {sheet} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    dir
}

fn add_box(dir: &Path, label: &str) -> serde_json::Value {
    run_ok(
        dir,
        &[
            "add",
            "--category",
            "RH",
            "--document-type",
            "CONTRATO",
            "--origin",
            "RH",
            "--location",
            "1",
            "--shelf",
            "1",
            "--rack",
            "2",
            "--box",
            label,
            "--contents",
            "Contratos de trabalho",
            "--requester",
            "Ana",
            "--responsible",
            "Maria",
        ],
    )
}

// === Init ===

#[test]
fn e2e_init_creates_config_and_workbook() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["init"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Initialized ARQ workbook"));
    assert!(dir.path().join("arq.toml").exists());
    assert!(dir.path().join("arquivo.json").exists());

    let again = run(dir.path(), &["init"]);
    assert!(again.status.success());
    assert!(String::from_utf8_lossy(&again.stdout).contains("already exists"));
}

#[test]
fn e2e_workbook_env_override() {
    let dir = init_archive();
    let output = arq_in(dir.path())
        .env("ARQ_WORKBOOK", "outro.json")
        .args(["options", "set", "Espacos", "espacos.json", "--responsible", "Admin"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(dir.path().join("outro.json").exists());
}

// === Register ===

#[test]
fn e2e_add_assigns_sequential_ids() {
    let dir = init_archive();

    let preview = run(dir.path(), &["preview-id", "--category", "RH", "--document-type", "CONTRATO"]);
    assert_eq!(String::from_utf8_lossy(&preview.stdout).trim(), "RHCT00A");

    let first = add_box(dir.path(), "12");
    assert_eq!(first["id"], "RHCT00A");
    assert_eq!(first["status"], "ARCHIVED");
    assert_eq!(first["retention_period"], "5 anos");
    assert_eq!(first["archive_responsible"], "Maria");
    assert!(first["disposal_date"].as_str().is_some());

    let second = add_box(dir.path(), "13");
    assert_eq!(second["id"], "RHCT00B");
}

#[test]
fn e2e_add_rejects_blank_required_field() {
    let dir = init_archive();
    let output = run(
        dir.path(),
        &[
            "add", "--category", "RH", "--document-type", "CONTRATO", "--origin", "RH",
            "--location", "1", "--shelf", "1", "--rack", "2", "--box", "12",
            "--contents", " ", "--requester", "Ana", "--responsible", "Maria",
        ],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("contents"));

    let list = run_ok(dir.path(), &["list"]);
    assert_eq!(list.as_array().unwrap().len(), 0);
}

// === Lifecycle ===

#[test]
fn e2e_retrieve_twice_fails() {
    let dir = init_archive();
    add_box(dir.path(), "12");

    let retrieved = run_ok(
        dir.path(),
        &["retrieve", "RHCT00A", "--responsible", "Bia", "--date", "2025-03-01", "--note", "parcial"],
    );
    assert_eq!(retrieved["status"], "RETRIEVED");
    assert_eq!(retrieved["retrieval_date"], "2025-03-01");
    assert_eq!(retrieved["retrieval_note"], "parcial");

    let again = run(dir.path(), &["retrieve", "RHCT00A", "--responsible", "Bia"]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("already retrieved"));

    let returned = run_ok(dir.path(), &["return", "rhct00a", "--responsible", "Caio"]);
    assert_eq!(returned["status"], "ARCHIVED");
    assert_eq!(returned["retrieval_responsible"], "");
}

#[test]
fn e2e_move_skips_retrieved_boxes() {
    let dir = init_archive();
    add_box(dir.path(), "12");
    add_box(dir.path(), "13");
    run_ok(dir.path(), &["retrieve", "RHCT00B", "--responsible", "Bia"]);

    let outcome = run_ok(
        dir.path(),
        &[
            "move", "RHCT00A,RHCT00B", "XXXX00A", "--location", "2", "--shelf", "3",
            "--rack", "1", "--responsible", "Maria",
        ],
    );
    assert_eq!(outcome["moved"], serde_json::json!(["RHCT00A"]));
    assert_eq!(outcome["ineligible"], serde_json::json!(["RHCT00B"]));
    assert_eq!(outcome["missing"], serde_json::json!(["XXXX00A"]));

    assert_eq!(run_ok(dir.path(), &["show", "RHCT00A"])["location"], "2");
    assert_eq!(run_ok(dir.path(), &["show", "RHCT00B"])["location"], "1");
}

#[test]
fn e2e_move_rejects_shelf_out_of_range() {
    let dir = init_archive();
    add_box(dir.path(), "12");
    let output = run(
        dir.path(),
        &["move", "RHCT00A", "--location", "2", "--shelf", "9", "--rack", "1", "--responsible", "Maria"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("out of range"));
}

#[test]
fn e2e_edit_and_history() {
    let dir = init_archive();
    add_box(dir.path(), "12");

    let edited = run_ok(
        dir.path(),
        &["edit", "RHCT00A", "--set", "tag=T-7", "--set", "book=L2", "--responsible", "Maria"],
    );
    assert_eq!(edited["tag"], "T-7");
    assert_eq!(edited["book"], "L2");

    let bad = run(dir.path(), &["edit", "RHCT00A", "--set", "status=X", "--responsible", "Maria"]);
    assert!(!bad.status.success());

    let history = run_ok(dir.path(), &["history", "--id", "RHCT00A"]);
    let events: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    assert_eq!(events, vec!["EDITED", "ARCHIVED"]);

    let options_events = run_ok(dir.path(), &["history", "--event", "OPTIONS_UPDATED"]);
    assert_eq!(options_events.as_array().unwrap().len(), 3);
}

// === Output ===

#[test]
fn e2e_list_formats() {
    let dir = init_archive();
    add_box(dir.path(), "12");

    let table = run(dir.path(), &["list", "--format", "table"]);
    let text = String::from_utf8_lossy(&table.stdout);
    assert!(text.starts_with("ID"));
    assert!(text.contains("RHCT00A"));

    let markdown = run(dir.path(), &["list", "--format", "markdown", "--status", "retrieved"]);
    assert_eq!(String::from_utf8_lossy(&markdown.stdout), "*No results*\n");
}

#[test]
fn e2e_options_show() {
    let dir = init_archive();
    let shown = run_ok(dir.path(), &["options", "show", "espacos"]);
    assert_eq!(shown["Espaços"]["rows"].as_array().unwrap().len(), 2);
    assert!(shown.get("Selectboxes").is_none());
}

#[test]
fn e2e_completions() {
    let output = arq().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("arq"));
}
