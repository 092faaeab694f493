use std::io::Write;
use std::process::{Child, ChildStdin, Command, Output, Stdio};
use std::str;
use std::thread;
use std::time::{Duration, Instant};

fn run_loadwatch(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_loadwatch"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute loadwatch");

    child
        .stdin
        .take()
        .expect("stdin was not captured")
        .write_all(stdin.as_bytes())
        .expect("Failed to feed events");

    child.wait_with_output().expect("Failed to wait for loadwatch")
}

fn spawn_loadwatch(args: &[&str]) -> (Child, ChildStdin) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_loadwatch"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute loadwatch");
    let stdin = child.stdin.take().expect("stdin was not captured");
    (child, stdin)
}

/// Wait for `child` to exit on its own, killing it after `deadline`
fn wait_within(mut child: Child, deadline: Duration) -> Output {
    let started = Instant::now();
    while child.try_wait().expect("Failed to poll loadwatch").is_none() {
        if started.elapsed() > deadline {
            child.kill().ok();
            let output = child.wait_with_output().expect("Failed to wait for loadwatch");
            panic!(
                "loadwatch still running after {:?}\nSTDERR: {}",
                deadline,
                str::from_utf8(&output.stderr).unwrap_or("")
            );
        }
        thread::sleep(Duration::from_millis(50));
    }
    child.wait_with_output().expect("Failed to wait for loadwatch")
}

fn summary_line(output: &Output) -> serde_json::Value {
    let stdout = str::from_utf8(&output.stdout).unwrap_or("");
    let line = stdout
        .lines()
        .rev()
        .find(|l| l.starts_with('{'))
        .unwrap_or_else(|| panic!("no JSON summary in stdout: {}", stdout));
    serde_json::from_str(line).expect("summary is not valid JSON")
}

#[test]
fn test_ci_replay_reports_sessions() {
    let events = "\
s1,0,StartTestOnMachine,host1
s1,0,StreamProgressKiloBytes,0
s1,2,StreamProgressKiloBytes,200
s1,2,StreamProgressSeconds,2
s2,1,ApiRequest,host2
host1,1,CPUUsage,55.5
s3,1,ApiRequest,host1
s3,2,ApiError,critical
s4,2,StreamProgressPercent,10
";
    let output = run_loadwatch(&["--stdin", "--ci", "--steady", "30s"], events);

    assert!(
        output.status.success(),
        "Command failed with status: {:?}\nSTDERR: {}",
        output.status.code(),
        str::from_utf8(&output.stderr).unwrap_or("")
    );

    let summary = summary_line(&output);
    assert_eq!(summary["sessionCount"], 2);
    assert_eq!(summary["establishedCount"], 1);
}

#[test]
fn test_ci_replay_with_summary_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary.json");
    let events = "s1,0,StreamProgressSeconds,10\ns2,0,StreamProgressSeconds,45\ns1,1,StreamProgressSeconds,40\n";

    let output = run_loadwatch(
        &[
            "--stdin",
            "--ci",
            "--steady",
            "30s",
            "--summary",
            path.to_str().unwrap(),
        ],
        events,
    );
    assert!(output.status.success());

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, summary_line(&output));
    assert_eq!(written["establishedCount"], 2);
}

#[test]
fn test_rejects_invalid_duration() {
    let output = run_loadwatch(&["--stdin", "--ci", "--timeout", "1d"], "");
    assert_eq!(output.status.code(), Some(1));
    let stderr = str::from_utf8(&output.stderr).unwrap_or("");
    assert!(stderr.contains("Invalid duration '1d'"), "stderr: {}", stderr);
}

#[test]
fn test_interactive_replay_prints_report() {
    let events = "s1,0,ApiRequest,host1\ns1,2,ApiRequest,host1\n";
    let output = run_loadwatch(&["--stdin"], events);
    assert!(output.status.success());

    let stdout = str::from_utf8(&output.stdout).unwrap_or("");
    assert!(stdout.contains("Load Test Results"));
    assert!(stdout.contains("Requests:         2"));
}

#[test]
fn test_ci_hard_timeout_fails_run() {
    let (child, mut stdin) =
        spawn_loadwatch(&["--stdin", "--ci", "--timeout", "1s", "--steady", "30s"]);
    stdin
        .write_all(b"s1,0,StreamProgressSeconds,5\n")
        .expect("Failed to feed events");
    stdin.flush().expect("Failed to feed events");

    // stdin stays open, so only the watchdog can end the run
    let output = wait_within(child, Duration::from_secs(10));
    drop(stdin);

    assert_eq!(
        output.status.code(),
        Some(1),
        "STDERR: {}",
        str::from_utf8(&output.stderr).unwrap_or("")
    );
    let summary = summary_line(&output);
    assert_eq!(summary["sessionCount"], 1);
    assert_eq!(summary["establishedCount"], 1);
}

#[test]
fn test_ci_steady_state_ends_busy_stream() {
    let (child, mut stdin) =
        spawn_loadwatch(&["--stdin", "--ci", "--timeout", "20s", "--steady", "30s"]);

    let feeder = thread::spawn(move || {
        for i in 0u64.. {
            let line = format!("s1,{},StreamProgressSeconds,40\n", i);
            if stdin.write_all(line.as_bytes()).and_then(|_| stdin.flush()).is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }
    });

    let output = wait_within(child, Duration::from_secs(10));
    feeder.join().expect("feeder panicked");

    assert!(
        output.status.success(),
        "Command failed with status: {:?}\nSTDERR: {}",
        output.status.code(),
        str::from_utf8(&output.stderr).unwrap_or("")
    );
    let summary = summary_line(&output);
    assert_eq!(summary["sessionCount"], 1);
    assert_eq!(summary["establishedCount"], 1);
}
