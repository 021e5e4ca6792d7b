//! Integration tests of the `eodb` binary: output format and exit codes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

const OKAY: i32 = 0;
const NOT_FOUND: i32 = 1;
const ERROR: i32 = 2;
const FATAL: i32 = 3;

struct Run {
    stdout: String,
    stderr: String,
    code: i32,
}

/// Run eodb with given args against `database`
fn run_eodb(database: &Path, args: &[&str]) -> Run {
    let output = Command::new(env!("CARGO_BIN_EXE_eodb"))
        .arg("--database")
        .arg(database)
        .arg("--quiet")
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run eodb");

    Run {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        code: output.status.code().unwrap_or(-1),
    }
}

/// Temp dir with an OPL input file and a not yet created database path
fn fixture(opl: &str) -> (TempDir, PathBuf, PathBuf) {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.opl");
    fs::write(&input, opl).unwrap();
    let database = dir.path().join("test.eodb");
    (dir, input, database)
}

fn create(database: &Path, input: &Path, args: &[&str]) {
    let mut all = vec!["create", input.to_str().unwrap()];
    all.extend_from_slice(args);
    let run = run_eodb(database, &all);
    assert_eq!(run.code, OKAY, "create failed: {}", run.stderr);
}

#[test]
fn test_point_scenario() {
    let (_dir, input, database) = fixture("n5 x1.0 y2.0\n");
    create(&database, &input, &["-l", "dense"]);

    let run = run_eodb(&database, &["lookup", "-i", "locations", "5"]);
    assert_eq!(run.code, OKAY);
    assert_eq!(run.stdout, "5 (1.0000000,2.0000000)\n");

    let run = run_eodb(&database, &["locations", "lookup", "6"]);
    assert_eq!(run.code, NOT_FOUND);
    assert_eq!(run.stdout, "6 not found\n");
}

#[test]
fn test_line_scenario() {
    let (_dir, input, database) = fixture("n1 x0 y0\nn2 x1 y1\nn3 x2 y2\nw10 Nn1,n2,n3\n");
    create(&database, &input, &["-m", "sorted"]);

    let run = run_eodb(&database, &["lookup", "-m", "n2w", "1"]);
    assert_eq!(run.code, OKAY);
    assert_eq!(run.stdout, "1 10\n");

    let run = run_eodb(&database, &["lookup", "-m", "node2way", "99"]);
    assert_eq!(run.code, NOT_FOUND);
    assert_eq!(run.stdout, "99 not found\n");

    let run = run_eodb(&database, &["dump", "-m", "n2w"]);
    assert_eq!(run.code, OKAY);
    assert_eq!(run.stdout, "1 10\n2 10\n3 10\n");
}

#[test]
fn test_update_scenario() {
    let (dir, input, database) = fixture("n1 x0 y0\nw10 Nn1\n");
    create(&database, &input, &["-i", "dense"]);
    let length = fs::metadata(database.join("data.osr")).unwrap().len();

    let update = dir.path().join("update.opl");
    fs::write(&update, "n7 x3 y4\n").unwrap();
    let run = run_eodb(&database, &["update", update.to_str().unwrap()]);
    assert_eq!(run.code, OKAY, "{}", run.stderr);

    let run = run_eodb(&database, &["lookup", "-i", "n", "7"]);
    assert_eq!(run.code, OKAY);
    assert_eq!(run.stdout, format!("7 {}\n", length));

    let run = run_eodb(&database, &["export", "-O", &length.to_string(), "-f", "opl"]);
    assert_eq!(run.code, OKAY);
    assert_eq!(run.stdout, "n7 v0 dV T x3.0000000 y4.0000000\n");
}

#[test]
fn test_locations_rebuild_and_dump() {
    let (_dir, input, database) = fixture("n2 x1 y1\nn1 x0 y0\nn3\n");
    create(&database, &input, &[]);

    let run = run_eodb(&database, &["locations", "create", "-t", "dense"]);
    assert_eq!(run.code, OKAY, "{}", run.stderr);

    let run = run_eodb(&database, &["locations", "dump"]);
    assert_eq!(run.code, OKAY);
    assert_eq!(run.stdout, "1 (0.0000000,0.0000000)\n2 (1.0000000,1.0000000)\n");
}

#[test]
fn test_convert_then_create() {
    let (dir, input, database) = fixture("n1 x0 y0\nn2 x1 y1\n");
    let output = dir.path().join("out.osr");
    let output_arg = output.to_str().unwrap();

    let run = run_eodb(&database, &["convert", input.to_str().unwrap(), "-o", output_arg]);
    assert_eq!(run.code, OKAY, "{}", run.stderr);

    let run = run_eodb(&database, &["convert", input.to_str().unwrap(), "-o", output_arg]);
    assert_eq!(run.code, FATAL);

    let run = run_eodb(
        &database,
        &["convert", input.to_str().unwrap(), "-o", output_arg, "--overwrite", "--append"],
    );
    assert_eq!(run.code, FATAL);

    create(&database, &output, &[]);
    let run = run_eodb(&database, &["dump", "-i", "n"]);
    assert_eq!(run.stdout.lines().count(), 2);
}

#[test]
fn test_convert_osr_to_opl_and_back() {
    let (dir, input, database) = fixture("n1 x0 y0\nn2\nw10 Nn1,n2\n");
    let osr = dir.path().join("first.osr");
    let opl = dir.path().join("text.opl");
    let again = dir.path().join("second.osr");

    for (from, to) in [(&input, &osr), (&osr, &opl), (&opl, &again)] {
        let run = run_eodb(&database, &["convert", from.to_str().unwrap(), "-o", to.to_str().unwrap()]);
        assert_eq!(run.code, OKAY, "{}", run.stderr);
    }

    assert_eq!(
        fs::read_to_string(&opl).unwrap(),
        "n1 v0 dV T x0.0000000 y0.0000000\nn2 v0 dV T x y\nw10 v0 dV T Nn1,n2\n"
    );
    assert_eq!(fs::read(&osr).unwrap(), fs::read(&again).unwrap());

    // Explicit format wins over the extension
    let forced = dir.path().join("forced.txt");
    let run = run_eodb(
        &database,
        &["convert", osr.to_str().unwrap(), "-o", forced.to_str().unwrap(), "-f", "osr"],
    );
    assert_eq!(run.code, OKAY, "{}", run.stderr);
    assert_eq!(fs::read(&forced).unwrap(), fs::read(&osr).unwrap());

    let run = run_eodb(&database, &["convert", osr.to_str().unwrap(), "-o", opl.to_str().unwrap()]);
    assert_eq!(run.code, FATAL);
    let run = run_eodb(
        &database,
        &["convert", osr.to_str().unwrap(), "-o", opl.to_str().unwrap(), "--overwrite"],
    );
    assert_eq!(run.code, OKAY, "{}", run.stderr);
}

#[test]
fn test_stats() {
    let (_dir, input, database) = fixture("n1 x0 y0\n");
    create(&database, &input, &[]);

    let run = run_eodb(&database, &["stats"]);
    assert_eq!(run.code, OKAY);
    assert!(run.stdout.contains("Database Statistics"));
    assert!(run.stdout.contains("data.osr"));
}

#[test]
fn test_error_exit_codes() {
    let (_dir, input, database) = fixture("n1 x0 y0\nn2 x1 y1\n");

    // No database yet
    let run = run_eodb(&database, &["lookup", "-i", "n", "1"]);
    assert_eq!(run.code, FATAL);
    assert!(run.stderr.contains("Error"), "{}", run.stderr);

    create(&database, &input, &[]);

    // Database already exists
    let run = run_eodb(&database, &["create", input.to_str().unwrap()]);
    assert_eq!(run.code, FATAL);

    // Usage errors
    assert_eq!(run_eodb(&database, &["create", "-i", "btree", "x.opl"]).code, FATAL);
    assert_eq!(run_eodb(&database, &["lookup", "-i", "n", "-m", "n2w", "1"]).code, FATAL);
    assert_eq!(run_eodb(&database, &["lookup", "-i", "n"]).code, FATAL);

    // Not a record boundary
    let run = run_eodb(&database, &["export", "-O", "3"]);
    assert_eq!(run.code, ERROR);
}

#[test]
fn test_update_rejects_mixed_signs() {
    let (dir, input, database) = fixture("n1 x0 y0\n");
    create(&database, &input, &["-i", "dense_file_array"]);

    let update = dir.path().join("update.opl");
    fs::write(&update, "n-5 x0 y0\nn6 x0 y0\n").unwrap();
    let run = run_eodb(&database, &["update", update.to_str().unwrap()]);
    assert_eq!(run.code, ERROR);
}
