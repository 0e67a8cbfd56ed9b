//! Exit status of the binary.

use std::process::{Command, Stdio};

fn table_mailer() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_table-mailer"));
    for (key, _) in std::env::vars() {
        if key.starts_with("REPORT_") {
            cmd.env_remove(key);
        }
    }
    cmd.env("RUST_LOG", "off").stdin(Stdio::null());
    cmd
}

#[test]
fn failed_delivery_still_exits_cleanly() {
    // No SMTP credentials: the demo batch is built, delivery fails before connecting.
    let output = table_mailer()
        .env("REPORT_TEST_MODE", "1")
        .env("REPORT_TO", "team@test.com")
        .env("REPORT_FROM", "reports@test.com")
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Delivery failed"));
}

#[test]
fn malformed_payload_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload.json");
    std::fs::write(&path, "{not json").unwrap();

    let output = table_mailer().arg(&path).output().unwrap();
    assert!(!output.status.success());
}
