use std::process::Command;

fn run(fixture: &str) -> (String, String, bool) {
    let path = format!("tests/fixtures/{fixture}");
    let output = Command::new(env!("CARGO_BIN_EXE_rewear-ledger"))
        .arg(&path)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn valid_commands() {
    let (stdout, stderr, success) = run("valid.csv");

    assert!(success);
    assert!(stderr.is_empty());

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "account,balance,version,disabled");
    // Account 1: +25 referral bonus, +5 listing award, +10 swap credit.
    assert_eq!(lines[1], "1,40,3,false");
    // Account 2: +30 admin grant.
    assert_eq!(lines[2], "2,30,1,false");
}

#[test]
fn errors_warn_but_do_not_block() {
    let (stdout, stderr, success) = run("with_errors.csv");

    assert!(success);
    assert!(stderr.contains("unrecognized op"));
    assert!(stderr.contains("missing points"));

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "account,balance,version,disabled");
    assert_eq!(lines[1], "1,75,1,false");
}
