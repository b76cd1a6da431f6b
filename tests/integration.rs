/// Integration tests: drive the compiled `xml-overlay` binary end to end.
///
/// `CARGO_BIN_EXE_xml-overlay` is set by Cargo during `cargo test` and points at
/// the binary for the current profile. Every test builds its own config and XML
/// file inside a temp directory.
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, SystemTime};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_xml-overlay"))
}

fn write_config(dir: &Path, xml_path: &Path, extra: &str) -> PathBuf {
    let config = dir.join("config.json");
    let body = format!(
        r#"{{
            "xml_path": {xml},
            "xml_config": {{
                "root_node": "root",
                "target_node": "DatabaseName",
                "xpath": ".//DatabaseName"
            }}{extra}
        }}"#,
        xml = serde_json::to_string(&xml_path.to_string_lossy()).unwrap(),
    );
    std::fs::write(&config, body).unwrap();
    config
}

/// Run `xml-overlay --once` and assert it exits successfully. Returns stdout.
fn run_once(args: &[&str]) -> String {
    let out = Command::new(binary())
        .args(args)
        .arg("--once")
        .output()
        .expect("failed to invoke xml-overlay binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        out.status.success(),
        "command {:?} failed with status {:?}\nstdout: {}\nstderr: {}",
        args,
        out.status,
        stdout,
        stderr
    );
    stdout
}

/// Kills the child on drop so a failing assertion never leaks a process.
struct Running {
    child: Child,
    lines: mpsc::Receiver<String>,
}

impl Running {
    fn spawn(args: &[&str]) -> Self {
        let mut child = Command::new(binary())
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn xml-overlay");
        let stdout = child.stdout.take().unwrap();
        let (tx, lines) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self { child, lines }
    }

    fn next_line(&self) -> String {
        self.lines
            .recv_timeout(Duration::from_secs(10))
            .expect("no output from xml-overlay within 10s")
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

// ---------------------------------------------------------------------------
// One-shot mode
// ---------------------------------------------------------------------------

#[test]
fn test_once_prints_target_value() {
    let dir = tempfile::tempdir().unwrap();
    let xml = dir.path().join("db.xml");
    std::fs::write(
        &xml,
        "<root><Connection><DatabaseName>Inventory</DatabaseName></Connection></root>",
    )
    .unwrap();
    let config = write_config(dir.path(), &xml, "");

    let stdout = run_once(&["--config", config.to_str().unwrap(), "--format", "lines"]);
    assert_eq!(stdout.trim(), "Inventory");
}

#[test]
fn test_once_json_reports_missing_node() {
    let dir = tempfile::tempdir().unwrap();
    let xml = dir.path().join("db.xml");
    std::fs::write(&xml, "<root><Server>alpha</Server></root>").unwrap();
    let config = write_config(dir.path(), &xml, "");

    let stdout = run_once(&["--config", config.to_str().unwrap(), "--format", "json"]);
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(value["status"], "error");
    assert_eq!(value["text"], "Error: DatabaseName not found in XML");
}

#[test]
fn test_once_missing_xml_file_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &dir.path().join("absent.xml"), "");

    let stdout = run_once(&["--config", config.to_str().unwrap(), "--format", "lines"]);
    assert!(stdout.starts_with("Error reading XML: "), "stdout: {stdout}");
}

#[test]
fn test_once_missing_config_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");

    let stdout = run_once(&["--config", missing.to_str().unwrap(), "--format", "lines"]);
    assert!(stdout.starts_with("Error loading config: "), "stdout: {stdout}");
}

#[test]
fn test_once_toml_config() {
    let dir = tempfile::tempdir().unwrap();
    let xml = dir.path().join("settings.xml");
    std::fs::write(
        &xml,
        r#"<Settings><Db role="replica">r1</Db><Db role="primary">p1</Db></Settings>"#,
    )
    .unwrap();
    let config = dir.path().join("overlay.toml");
    std::fs::write(
        &config,
        format!(
            "xml_path = {}\n\n[xml_config]\nroot_node = \"Settings\"\ntarget_node = \"Db\"\nxpath = \"Db[@role='primary']\"\n",
            serde_json::to_string(&xml.to_string_lossy()).unwrap()
        ),
    )
    .unwrap();

    let stdout = run_once(&["--config", config.to_str().unwrap(), "--format", "lines"]);
    assert_eq!(stdout.trim(), "p1");
}

#[test]
fn test_once_reads_latin1_file() {
    let dir = tempfile::tempdir().unwrap();
    let xml = dir.path().join("db.xml");
    std::fs::write(
        &xml,
        b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<root><DatabaseName>M\xFCnchen</DatabaseName></root>",
    )
    .unwrap();
    let config = write_config(dir.path(), &xml, "");

    let stdout = run_once(&["--config", config.to_str().unwrap(), "--format", "json"]);
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(value["text"], "M\u{fc}nchen");
}

// ---------------------------------------------------------------------------
// Watch mode
// ---------------------------------------------------------------------------

#[test]
fn test_rewrite_updates_value_without_restart() {
    let dir = tempfile::tempdir().unwrap();
    let xml = dir.path().join("db.xml");
    std::fs::write(&xml, "<root><DatabaseName>Before</DatabaseName></root>").unwrap();
    let config = write_config(dir.path(), &xml, r#", "poll_interval_ms": 50"#);

    let running = Running::spawn(&["--config", config.to_str().unwrap(), "--format", "lines"]);
    assert_eq!(running.next_line(), "Before");

    // Save the way editors do: temp file, then rename over the original.
    let tmp = dir.path().join("db.xml.tmp");
    std::fs::write(&tmp, "<root><DatabaseName>After</DatabaseName></root>").unwrap();
    // Guarantee a distinct mtime on filesystems with coarse timestamps.
    std::fs::File::options()
        .write(true)
        .open(&tmp)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(2))
        .unwrap();
    std::fs::rename(&tmp, &xml).unwrap();

    assert_eq!(running.next_line(), "After");
}

#[test]
fn test_created_file_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let xml = dir.path().join("late.xml");
    let config = write_config(dir.path(), &xml, r#", "poll_interval_ms": 50"#);

    let running = Running::spawn(&["--config", config.to_str().unwrap(), "--format", "json"]);
    let first: serde_json::Value = serde_json::from_str(&running.next_line()).unwrap();
    assert_eq!(first["status"], "error");

    let tmp = dir.path().join("late.xml.tmp");
    std::fs::write(&tmp, "<root><DatabaseName>Created</DatabaseName></root>").unwrap();
    std::fs::rename(&tmp, &xml).unwrap();
    let second: serde_json::Value = serde_json::from_str(&running.next_line()).unwrap();
    assert_eq!(second["status"], "ok");
    assert_eq!(second["text"], "Created");
}
