use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tempfile::TempDir;

use kbrag::config::{Config, CorpusMode};
use kbrag::extract::ExtractorRegistry;
use kbrag::ingest::run_ingest;
use kbrag::retriever::{
    Answer, Retriever, EMPTY_CORPUS_MESSAGE, EMPTY_QUERY_MESSAGE, NO_MATCH_MESSAGE,
};

fn kb_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_kb"))
}

fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// Knowledge base with one file per supported text format plus noise.
fn setup_knowledge_base() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let kb = tmp.path().join("knowledge_base");
    fs::create_dir_all(kb.join("rh")).unwrap();

    fs::write(
        kb.join("ferias.txt"),
        "A política de férias garante trinta dias corridos de descanso por ano trabalhado.",
    )
    .unwrap();
    fs::write(
        kb.join("rh/reembolso.md"),
        "# Reembolso\n\nDespesas de viagem são reembolsadas em até dez dias úteis mediante nota fiscal.",
    )
    .unwrap();
    fs::write(
        kb.join("contatos.json"),
        r#"{"suporte": {"email": "suporte@empresa.com", "ramal": 4321}}"#,
    )
    .unwrap();
    fs::write(
        kb.join("equipamentos.csv"),
        "item,setor\nnotebook,financeiro\nimpressora,recepção\n",
    )
    .unwrap();
    fs::write(
        kb.join("seguranca.docx"),
        docx_bytes(&["Normas de segurança", "Crachá obrigatório nas dependências"]),
    )
    .unwrap();
    fs::write(kb.join("logo.png"), [0x89u8, b'P', b'N', b'G']).unwrap();
    fs::write(kb.join("vazio.txt"), "\n\n").unwrap();

    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("kb.toml");
    fs::write(
        &config_path,
        format!(
            r#"[knowledge]
root = "{}"

[server]
bind = "127.0.0.1:0"
"#,
            kb.display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn config_from(config_path: &Path) -> Config {
    kbrag::config::load_config(config_path).unwrap()
}

fn registry() -> Arc<ExtractorRegistry> {
    Arc::new(ExtractorRegistry::with_defaults(None))
}

fn run_kb(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(kb_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .expect("failed to run kb binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

// ============ Library ============

#[test]
fn test_ingest_all_formats() {
    let (_tmp, config_path) = setup_knowledge_base();
    let config = config_from(&config_path);

    let report = run_ingest(&config, &registry(), false).unwrap();
    assert_eq!(report.files_seen, 7);
    assert_eq!(report.files_chunked, 5);
    assert_eq!(report.files_unsupported, 1);
    assert_eq!(report.files_empty, 1);
    assert_eq!(report.files_failed, 0);

    let base = config.knowledge.output_path();
    let mut names: Vec<String> = fs::read_dir(&base)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "contatos_part1.txt",
            "equipamentos_part1.txt",
            "ferias_part1.txt",
            "reembolso_part1.txt",
            "seguranca_part1.txt",
        ]
    );
    assert_eq!(
        fs::read_to_string(base.join("equipamentos_part1.txt")).unwrap(),
        "notebook financeiro\nimpressora recepção"
    );
    assert_eq!(
        fs::read_to_string(base.join("seguranca_part1.txt")).unwrap(),
        "Normas de segurança\nCrachá obrigatório nas dependências"
    );
    assert!(fs::read_to_string(base.join("contatos_part1.txt"))
        .unwrap()
        .contains("\"ramal\": 4321"));
}

#[test]
fn test_reingest_keeps_files_byte_identical() {
    let (_tmp, config_path) = setup_knowledge_base();
    let config = config_from(&config_path);

    run_ingest(&config, &registry(), false).unwrap();
    let chunk = config.knowledge.output_path().join("ferias_part1.txt");
    let first = fs::read(&chunk).unwrap();
    let modified = fs::metadata(&chunk).unwrap().modified().unwrap();

    let report = run_ingest(&config, &registry(), false).unwrap();
    assert_eq!(report.chunks_written, 0);
    assert_eq!(report.chunks_unchanged, 5);
    assert_eq!(fs::read(&chunk).unwrap(), first);
    assert_eq!(fs::metadata(&chunk).unwrap().modified().unwrap(), modified);
}

#[test]
fn test_chunk_counts_for_long_documents() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("exato.txt"), "x".repeat(1500)).unwrap();
    fs::write(tmp.path().join("sobra.txt"), "y".repeat(1501)).unwrap();
    let config = Config::with_root(tmp.path());

    let report = run_ingest(&config, &registry(), false).unwrap();
    assert_eq!(report.chunks_written, 7);

    let base = config.knowledge.output_path();
    for n in 1..=3 {
        let text = fs::read_to_string(base.join(format!("exato_part{}.txt", n))).unwrap();
        assert_eq!(text.chars().count(), 500);
    }
    assert!(!base.join("exato_part4.txt").exists());
    assert_eq!(fs::read_to_string(base.join("sobra_part4.txt")).unwrap(), "y");
}

#[test]
fn test_ingest_then_answer_from_chunks() {
    let (_tmp, config_path) = setup_knowledge_base();
    let config = config_from(&config_path);
    run_ingest(&config, &registry(), false).unwrap();

    let retriever = Retriever::from_config(&config, registry());
    let answer = retriever.answer("Como funciona o reembolso de viagem?").unwrap();
    match &answer {
        Answer::Match { id, score, excerpt } => {
            assert_eq!(id, "reembolso_part1.txt");
            assert!(*score > 0.1);
            assert!(excerpt.starts_with("# Reembolso"));
        }
        other => panic!("expected match, got {:?}", other),
    }
    assert!(answer.to_string().starts_with("[reembolso_part1.txt] # Reembolso"));

    let answer = retriever.answer("receita de bolo de cenoura").unwrap();
    assert_eq!(answer.to_string(), NO_MATCH_MESSAGE);
}

#[test]
fn test_answer_sees_new_chunks_without_restart() {
    let (tmp, config_path) = setup_knowledge_base();
    let config = config_from(&config_path);
    let retriever = Retriever::from_config(&config, registry());

    assert_eq!(retriever.answer("crachá").unwrap(), Answer::EmptyCorpus);

    run_ingest(&config, &registry(), false).unwrap();
    assert!(retriever.answer("crachá").unwrap().is_match());

    fs::write(
        tmp.path().join("knowledge_base/estacionamento.txt"),
        "Vagas de estacionamento são sorteadas mensalmente.",
    )
    .unwrap();
    run_ingest(&config, &registry(), false).unwrap();
    let answer = retriever.answer("estacionamento").unwrap();
    assert!(matches!(answer, Answer::Match { ref id, .. } if id == "estacionamento_part1.txt"));
}

#[test]
fn test_documents_mode_reads_sources_directly() {
    let (_tmp, config_path) = setup_knowledge_base();
    let mut config = config_from(&config_path);
    config.retrieval.corpus = CorpusMode::Documents;

    let retriever = Retriever::from_config(&config, registry());
    let answer = retriever.answer("reembolso nota fiscal").unwrap();
    assert!(matches!(answer, Answer::Match { ref id, .. } if id == "rh/reembolso.md"));
}

// ============ Binary ============

#[test]
fn test_cli_empty_query() {
    let (_tmp, config_path) = setup_knowledge_base();
    let (stdout, _, success) = run_kb(&config_path, &["ask", "   "]);
    assert!(success);
    assert_eq!(stdout.trim(), EMPTY_QUERY_MESSAGE);
}

#[test]
fn test_cli_empty_knowledge_base() {
    let (_tmp, config_path) = setup_knowledge_base();
    let (stdout, _, success) = run_kb(&config_path, &["ask", "férias"]);
    assert!(success);
    assert_eq!(stdout.trim(), EMPTY_CORPUS_MESSAGE);
}

#[test]
fn test_cli_ingest_then_ask() {
    let (_tmp, config_path) = setup_knowledge_base();

    let (stdout, _, success) = run_kb(&config_path, &["ingest"]);
    assert!(success, "ingest failed");
    assert!(stdout.contains("files chunked: 5"));
    assert!(stdout.contains("chunks written: 5"));

    let (stdout, _, success) = run_kb(&config_path, &["ask", "política de férias"]);
    assert!(success);
    assert!(
        stdout.starts_with("[ferias_part1.txt] A política de férias"),
        "unexpected answer: {}",
        stdout
    );
    assert!(stdout.trim_end().ends_with("..."));

    let (stdout, _, success) = run_kb(&config_path, &["ask", "--json", "política de férias"]);
    assert!(success);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["status"], "match");
    assert_eq!(json["id"], "ferias_part1.txt");
}

#[test]
fn test_cli_ingest_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_knowledge_base();
    let (stdout, _, success) = run_kb(&config_path, &["ingest", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("estimated chunks: 5"));
    assert!(!tmp.path().join("knowledge_base/base").exists());
}

#[test]
fn test_cli_chat_loop() {
    let (_tmp, config_path) = setup_knowledge_base();
    run_kb(&config_path, &["ingest"]);

    let mut child = Command::new(kb_binary())
        .arg("--config")
        .arg(&config_path)
        .arg("chat")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all("crachá obrigatório\n\nsair\n".as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Chatbot: [seguranca_part1.txt] Normas de segurança"));
    assert!(stdout.contains(&format!("Chatbot: {}", EMPTY_QUERY_MESSAGE)));
    assert!(stdout.contains("Encerrando o programa. Até logo!"));
}

#[test]
fn test_cli_chat_ends_on_eof() {
    let (_tmp, config_path) = setup_knowledge_base();
    run_kb(&config_path, &["ingest"]);

    let mut child = Command::new(kb_binary())
        .arg("--config")
        .arg(&config_path)
        .arg("chat")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    // Dropping stdin after the last line closes it.
    child
        .stdin
        .take()
        .unwrap()
        .write_all("crachá obrigatório\ncrachá obrigatório".as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert_eq!(stdout.matches("Chatbot: [seguranca_part1.txt]").count(), 2);
    assert!(stdout.contains("Encerrando o programa. Até logo!"));
}

#[test]
fn test_cli_invalid_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("kb.toml");
    fs::write(&config_path, "[chunking]\nchunk_size = 0\n").unwrap();
    let (_, stderr, success) = run_kb(&config_path, &["ask", "x"]);
    assert!(!success);
    assert!(stderr.contains("chunk_size"));
}
