mod common;

use std::fs;
use std::process::{Child, Command as StdCommand, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use assert_cmd::Command;

const MIB: f64 = 1024.0 * 1024.0;

fn trafficburn() -> Command {
    Command::new(env!("CARGO_BIN_EXE_trafficburn"))
}

/// Polls `child` for up to ten seconds, killing it and failing the test if it
/// is still running.
fn wait_for_exit(mut child: Child, after: &str) -> Output {
    let deadline = Instant::now() + Duration::from_secs(10);
    while child.try_wait().expect("try_wait").is_none() {
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("run did not stop after {after}");
        }
        thread::sleep(Duration::from_millis(50));
    }
    child.wait_with_output().expect("output")
}

#[test]
fn zero_rate_is_a_config_error() {
    trafficburn()
        .args(["--rate", "0", "--stop-file", ""])
        .assert()
        .code(2);
}

#[test]
fn negative_hours_is_a_config_error() {
    trafficburn()
        .args(["--hours", "-1", "--stop-file", ""])
        .assert()
        .code(2);
}

#[test]
fn empty_urls_file_exits_before_any_traffic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let urls = dir.path().join("urls.txt");
    fs::write(&urls, "# nothing\n\n").expect("write urls");

    let output = trafficburn()
        .arg("--urls-file")
        .arg(&urls)
        .args(["--stop-file", ""])
        .assert()
        .code(2)
        .get_output()
        .clone();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("[start]"));
    assert!(!stdout.contains("[done]"));
}

#[test]
fn deadline_ends_run_before_source_is_drained() {
    let dir = tempfile::tempdir().expect("tempdir");
    let urls = dir.path().join("urls.txt");
    fs::write(&urls, format!("{}\n", common::serve(5 * 1024 * 1024))).expect("write urls");

    let hours = format!("{}", 2.0 / 3600.0);
    let started = Instant::now();
    let output = trafficburn()
        .args(["--hours", &hours, "--rate", "1", "--json", "--stop-file", ""])
        .arg("--urls-file")
        .arg(&urls)
        .timeout(Duration::from_secs(20))
        .assert()
        .success()
        .get_output()
        .clone();
    assert!(started.elapsed() < Duration::from_secs(6));

    let done = common::done_event(&output.stdout);
    assert_eq!(done["reason"], "deadline");
    let elapsed = done["elapsed_secs"].as_f64().expect("elapsed");
    let bytes = done["bytes_total"].as_f64().expect("bytes");
    assert!((1.9..4.0).contains(&elapsed), "elapsed {elapsed}");

    // 1.5s of burst plus one 64 KB chunk of slack on top of the steady rate
    let ceiling = MIB * elapsed + 1.5 * MIB + 64.0 * 1024.0;
    assert!(bytes <= ceiling, "{bytes} bytes over {elapsed}s");
    assert!(bytes >= MIB, "only {bytes} bytes");
}

#[test]
fn stop_file_ends_long_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let urls = dir.path().join("urls.txt");
    let stop_file = dir.path().join("stop.flag");
    fs::write(&urls, format!("{}\n", common::serve(5 * 1024 * 1024))).expect("write urls");

    let mut child = StdCommand::new(env!("CARGO_BIN_EXE_trafficburn"))
        .args(["--hours", "1", "--rate", "1", "--json"])
        .arg("--urls-file")
        .arg(&urls)
        .arg("--stop-file")
        .arg(&stop_file)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn");

    thread::sleep(Duration::from_millis(500));
    fs::write(&stop_file, b"").expect("create stop file");

    let output = wait_for_exit(child, "the stop file appeared");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"event\":\"stop\""));
    let done = common::done_event(&output.stdout);
    assert_eq!(done["reason"], "stop_file");
    let elapsed = done["elapsed_secs"].as_f64().expect("elapsed");
    assert!(elapsed < 2.0, "stopped after {elapsed}s");
}

#[cfg(unix)]
fn signal_ends_long_run(signal: &str) {
    let urls_dir = tempfile::tempdir().expect("tempdir");
    let urls = urls_dir.path().join("urls.txt");
    fs::write(&urls, format!("{}\n", common::serve(50 * 1024 * 1024))).expect("write urls");

    let child = StdCommand::new(env!("CARGO_BIN_EXE_trafficburn"))
        .args(["--hours", "1", "--rate", "1", "--json", "--stop-file", ""])
        .arg("--urls-file")
        .arg(&urls)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn");

    thread::sleep(Duration::from_millis(700));
    let status = StdCommand::new("kill")
        .args([signal, &child.id().to_string()])
        .status()
        .expect("run kill");
    assert!(status.success());

    let output = wait_for_exit(child, &format!("kill {signal}"));
    assert!(output.status.success(), "exit status {:?}", output.status);

    let done = common::done_event(&output.stdout);
    assert_eq!(done["reason"], "signal");
    assert!(done["bytes_total"].as_u64().expect("bytes") > 0);
    let elapsed = done["elapsed_secs"].as_f64().expect("elapsed");
    assert!(elapsed < 3.0, "stopped after {elapsed}s");
}

#[cfg(unix)]
#[test]
fn sigterm_ends_run_with_summary() {
    signal_ends_long_run("-TERM");
}

#[cfg(unix)]
#[test]
fn sigint_ends_run_with_summary() {
    signal_ends_long_run("-INT");
}
