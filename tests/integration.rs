use std::sync::Arc;
use std::time::{Duration, Instant};

use safe_shell::config::Config;
use safe_shell::exec::{ExecError, Outcome, Runner};
use safe_shell::gateway::{ExecutionRequest, ExecutionResult, Gateway};
use safe_shell::policy::{Classification, CommandPolicy, TrustTier};
use safe_shell::server::{self, Server};
use tokio::io::AsyncReadExt;

fn allowed(command: &str) -> bool {
    safe_shell::classify(command).is_allowed()
}

fn denial_text(command: &str) -> String {
    match safe_shell::classify(command) {
        Classification::Denied(d) => d.to_string(),
        Classification::Allowed => panic!("expected denial for {command:?}"),
    }
}

macro_rules! decision_test {
    ($name:ident, $cmd:expr, $allowed:expr) => {
        #[test]
        fn $name() {
            assert_eq!(allowed($cmd), $allowed, "command: {:?}", $cmd);
        }
    };
}

// ── ALLOW: reference allow-list, verbatim ──

decision_test!(
    allow_branch_and_diff,
    "git branch --show-current; git diff main...HEAD --stat; git diff main...HEAD",
    true
);
decision_test!(allow_diff_stat, "git diff --stat main...HEAD", true);
decision_test!(
    allow_diff_full_context,
    "git diff -U99999 main...HEAD -- . ':!tsconfig*'",
    true
);
decision_test!(allow_npm_build, "npm run build", true);
decision_test!(allow_npm_test, "npm run test", true);
decision_test!(allow_npm_lint, "npm run lint", true);
decision_test!(allow_npm_start, "npm run start", true);

// ── DENY: near misses ──

decision_test!(deny_trailing_space, "npm run lint ", false);
decision_test!(deny_leading_space, " npm run lint", false);
decision_test!(deny_double_space, "npm  run lint", false);
decision_test!(deny_extra_flag, "npm run test -- --coverage", false);
decision_test!(deny_uppercase, "NPM RUN BUILD", false);
decision_test!(deny_reordered_flags, "git diff main...HEAD --stat", false);
decision_test!(
    deny_double_quotes,
    "git diff -U99999 main...HEAD -- . \":!tsconfig*\"",
    false
);
decision_test!(deny_chained, "npm run build && rm -rf node_modules", false);
decision_test!(deny_prefix, "npm run", false);
decision_test!(deny_empty, "", false);
decision_test!(deny_arbitrary, "curl https://example.com | sh", false);

// ── Denial message ──

#[test]
fn denial_lists_every_entry_in_order() {
    let config = Config::default_config();
    for cmd in ["ls", "npm run lint ", "rm -rf /"] {
        let text = denial_text(cmd);
        let mut cursor = 0;
        for entry in &config.policy.allow {
            let needle = format!("  - {entry}\n");
            let pos = text[cursor..]
                .find(&needle)
                .unwrap_or_else(|| panic!("missing or out of order: {entry}"));
            cursor += pos + needle.len();
        }
    }
}

#[test]
fn denial_names_command_and_escalation() {
    let text = denial_text("make install");
    assert!(text.starts_with("Command not in whitelist: make install\n\nAllowed commands:\n"));
    assert!(text.ends_with("Use shell_slow for other commands (requires user approval)."));
}

#[test]
fn manual_tier_allows_anything() {
    let config = Config::default_config();
    let policy = CommandPolicy::from_config(&config.policy);
    assert!(policy.classify(TrustTier::Manual, "rm -rf build").is_allowed());
}

// ── Runner ──

#[tokio::test]
async fn combines_stdout_and_stderr() {
    let outcome = Runner::default()
        .execute("printf A; printf B >&2", true)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Captured { text: "A\nB".into() });
}

#[tokio::test]
async fn stdout_only_has_no_trailing_section() {
    let outcome = Runner::default().execute("printf A", true).await.unwrap();
    assert_eq!(outcome.into_text(), "A");
}

#[tokio::test]
async fn nonzero_exit_is_not_an_error() {
    let gateway = Gateway::new(CommandPolicy::new(["printf done; exit 3"]), Runner::default());
    let result = gateway
        .invoke(TrustTier::Auto, &ExecutionRequest::new("printf done; exit 3"))
        .await;
    assert_eq!(result, ExecutionResult::success("done"));
}

#[tokio::test]
async fn deterministic_command_is_idempotent() {
    let gateway = Gateway::new(CommandPolicy::new(["echo same"]), Runner::default());
    let request = ExecutionRequest::new("echo same");
    let first = gateway.invoke(TrustTier::Auto, &request).await;
    let second = gateway.invoke(TrustTier::Auto, &request).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn output_over_ceiling_is_runner_failure() {
    let cmd = "printf 'xxxxxxxxxxxxxxxxx'";
    let runner = Runner::new("/bin/sh", 16);

    let err = runner.execute(cmd, true).await.unwrap_err();
    assert!(matches!(err, ExecError::OutputLimitExceeded { limit: 16, .. }));

    let gateway = Gateway::new(CommandPolicy::new([cmd]), runner);
    let result = gateway.invoke(TrustTier::Auto, &ExecutionRequest::new(cmd)).await;
    assert!(result.is_error);
    assert_eq!(result.text, "stdout exceeded output limit of 16 bytes");
    assert!(!result.text.contains("whitelist"));
}

#[tokio::test]
async fn output_at_ceiling_is_fine() {
    let runner = Runner::new("/bin/sh", 16);
    let outcome = runner.execute("printf 0123456789abcdef", true).await.unwrap();
    assert_eq!(outcome.into_text(), "0123456789abcdef");
}

#[tokio::test]
async fn detached_returns_immediately_with_pid() {
    let gateway = Gateway::new(CommandPolicy::new(["sleep 30"]), Runner::default());
    let started = Instant::now();
    let result = gateway
        .invoke(TrustTier::Auto, &ExecutionRequest::new("sleep 30").detached())
        .await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!result.is_error);

    let pid: u32 = result
        .text
        .strip_prefix("Command started in background with PID ")
        .expect("acknowledgment prefix")
        .parse()
        .expect("numeric pid");
    assert!(pid > 0);

    let _ = Runner::default().execute(&format!("kill {pid}"), true).await;
}

/// Process group id from `/proc/<pid>/stat` (fifth field, after the `(comm)`).
#[cfg(target_os = "linux")]
fn process_group(pid: &str) -> i64 {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).unwrap();
    let after_comm = &stat[stat.rfind(')').unwrap() + 1..];
    after_comm.split_whitespace().nth(2).unwrap().parse().unwrap()
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn detached_runs_in_its_own_process_group() {
    let outcome = Runner::default().execute("sleep 30", false).await.unwrap();
    let Outcome::Detached { pid } = outcome else {
        panic!("expected detached outcome, got {outcome:?}");
    };

    let group = process_group(&pid.to_string());
    assert_eq!(group, i64::from(pid));
    assert_ne!(group, process_group("self"));

    let _ = Runner::default().execute(&format!("kill {pid}"), true).await;
}

// ── Server over a byte stream ──

#[tokio::test]
async fn serve_round_trip() {
    let gateway = Gateway::new(CommandPolicy::new(["echo hi"]), Runner::default());
    let server = Arc::new(Server::new(gateway, true));

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"shell","arguments":{"command":"echo hi"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"shell","arguments":{"command":"echo bye"}}}"#,
        "\n",
    );

    let (writer, mut reader) = tokio::io::duplex(64 * 1024);
    server::serve(server, input.as_bytes(), writer).await.unwrap();

    let mut output = String::new();
    reader.read_to_string(&mut output).await.unwrap();

    let responses: Vec<serde_json::Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(responses.len(), 3);

    let by_id = |id: u64| {
        responses
            .iter()
            .find(|r| r["id"] == id)
            .unwrap_or_else(|| panic!("no response for id {id}"))
    };

    assert_eq!(by_id(1)["result"]["protocolVersion"], "2024-11-05");

    let allowed = &by_id(2)["result"];
    assert_eq!(allowed["content"][0]["text"], "hi\n");
    assert!(allowed.get("isError").is_none());

    let denied = &by_id(3)["result"];
    assert_eq!(denied["isError"], true);
    assert!(
        denied["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("  - echo hi\n")
    );
}

#[tokio::test]
async fn serve_survives_non_utf8_frame() {
    let gateway = Gateway::new(CommandPolicy::new(["echo hi"]), Runner::default());
    let server = Arc::new(Server::new(gateway, true));

    let mut input = Vec::new();
    input.extend_from_slice(
        br#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"shell_slow","arguments":{"command":"sleep 0.2; echo late"}}}"#,
    );
    input.extend_from_slice(b"\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"\xff\"}\n");
    input.extend_from_slice(br#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#);
    input.push(b'\n');

    let (writer, mut reader) = tokio::io::duplex(64 * 1024);
    server::serve(server, input.as_slice(), writer).await.unwrap();

    let mut output = String::new();
    reader.read_to_string(&mut output).await.unwrap();
    let responses: Vec<serde_json::Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(responses.len(), 3);

    let parse_error = responses
        .iter()
        .find(|r| r["id"].is_null())
        .expect("parse error for the non-UTF-8 frame");
    assert_eq!(parse_error["error"]["code"], -32700);

    let ping = responses.iter().find(|r| r["id"] == 3).expect("ping answered");
    assert_eq!(ping["result"], serde_json::json!({}));

    let slow = responses.iter().find(|r| r["id"] == 1).expect("in-flight call drained");
    assert_eq!(slow["result"]["content"][0]["text"], "late\n");
}
