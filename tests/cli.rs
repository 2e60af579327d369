use std::process::{Command, Output};

use assert_fs::prelude::*;
use predicates::prelude::*;

const SERVICE: &str = r#"
import requests


class OrderService:
    """Loads and settles orders."""

    def settle(self, order_id: int) -> bool:
        order = self.load(order_id)
        return charge(order)

    def load(self, order_id):
        return requests.get(f"/api/orders/{order_id}")


def charge(order, retries=3):
    print(order)
    return True
"#;

fn codecanvas(dir: &assert_fs::TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_codecanvas"))
        .args(args)
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("OPENAI_API_KEY")
        .output()
        .expect("failed to run codecanvas")
}

#[test]
fn structural_writes_canvas_next_to_source() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("service.py").write_str(SERVICE).unwrap();

    let output = codecanvas(&temp, &["structural", "service.py"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let canvas = temp.child("service.canvas");
    canvas.assert(predicate::path::exists());
    canvas.assert(predicate::str::contains("\"nodes\"").and(predicate::str::contains("\"edges\"")));
    canvas.assert(predicate::str::contains("OrderService"));
    canvas.assert(predicate::str::contains("GET /api/orders/{order_id}"));
    temp.child("service.canvas.tmp").assert(predicate::path::missing());
}

#[test]
fn structural_stdout_compact() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("service.py").write_str(SERVICE).unwrap();

    let output = codecanvas(&temp, &["structural", "service.py", "--stdout", "--compact", "--no-docstrings"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim().lines().count(), 1);
    assert!(predicate::str::starts_with("{\"nodes\":[").eval(stdout.trim()));
    assert!(!stdout.contains("Loads and settles orders"));
    temp.child("service.canvas").assert(predicate::path::missing());
}

#[test]
fn flow_dry_run_prints_context_without_network() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("service.py").write_str(SERVICE).unwrap();

    let output = codecanvas(&temp, &["flow", "service.py", "-e", "OrderService.settle", "--dry-run"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(predicate::str::contains("### METHOD: OrderService.settle").eval(&stdout));
    assert!(predicate::str::contains("### FUNCTION: charge").eval(&stdout));
    assert!(predicate::str::contains("tokens").eval(&stdout));
    temp.child("service_OrderService_settle_flow.canvas").assert(predicate::path::missing());
}

#[test]
fn flow_without_api_key_fails_cleanly() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("service.py").write_str(SERVICE).unwrap();

    let output = codecanvas(&temp, &["flow", "service.py", "-e", "charge"]);
    assert!(!output.status.success());
    assert!(predicate::str::contains("API key").eval(&String::from_utf8_lossy(&output.stderr)));
    temp.child("service_charge_flow.canvas").assert(predicate::path::missing());
}

#[test]
fn unknown_entrypoint_exits_nonzero() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("service.py").write_str(SERVICE).unwrap();

    let output = codecanvas(&temp, &["structural", "service.py", "-e", "missing"]);
    assert!(!output.status.success());
    assert!(predicate::str::contains("Entrypoint not found").eval(&String::from_utf8_lossy(&output.stderr)));
    temp.child("service.canvas").assert(predicate::path::missing());
}

#[test]
fn invalid_config_is_reported() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("service.py").write_str(SERVICE).unwrap();
    temp.child("codecanvas.toml").write_str("[layout]\nrow_height = 50\nmax_height = 260\n").unwrap();

    let output = codecanvas(&temp, &["structural", "service.py"]);
    assert!(!output.status.success());
    assert!(predicate::str::contains("Configuration error").eval(&String::from_utf8_lossy(&output.stderr)));
}
