use std::process::Command;

use chrono::{SecondsFormat, Utc};

/// Short hash of the checked out commit, when built from a git work tree.
fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

fn main() {
    // Reported by /health/version
    let revision = git_revision().unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=GIT_HASH={}", revision);
    println!(
        "cargo:rustc-env=BUILD_TIME={}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    // Messages in src/proto are written by hand against this schema
    println!("cargo:rerun-if-changed=proto/drugstore.proto");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
