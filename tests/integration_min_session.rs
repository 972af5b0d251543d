// Integration tests that drive the compiled binary.
//
// Notes:
// - The PTY test needs a pseudo terminal (expectrl) and is ignored by default.
// - Run it manually via: `cargo test --test integration_min_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

#[test]
fn list_modes_prints_catalog() {
    let output = assert_cmd::Command::cargo_bin("footwork")
        .unwrap()
        .args(["--list-modes", "--no-save"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("full-court"));
    assert!(stdout.contains("random-1-3-6"));
}

#[test]
fn unknown_mode_is_a_usage_error() {
    let output = assert_cmd::Command::cargo_bin("footwork")
        .unwrap()
        .args(["--mode", "upside-down", "--no-save"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown mode"));
}

#[test]
#[ignore]
fn short_session_runs_and_exits() -> Result<(), Box<dyn std::error::Error>> {
    let bin = assert_cmd::cargo::cargo_bin("footwork");
    let cmd = format!("{} --no-save --cadence 1 --time-limit 0 --seed 3", bin.display());

    let mut p = spawn(cmd)?;

    // Give the app a moment to initialize the terminal/alternate screen
    std::thread::sleep(Duration::from_millis(200));

    // start, let a couple of positions come up, stop
    p.send(" ")?;
    std::thread::sleep(Duration::from_millis(2500));
    p.send(" ")?;
    std::thread::sleep(Duration::from_millis(200));

    p.send("\x1b")?; // ESC
    p.expect(Eof)?;
    Ok(())
}
