//! Build script for hyaway-prefs
//!
//! Exposes the short git revision and build profile to the CLI, which logs
//! them at startup.

use std::process::Command;

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn main() {
    let revision = git_revision().unwrap_or_else(|| "unknown".to_string());
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let built_on = chrono::Utc::now().format("%Y-%m-%d").to_string();

    println!("cargo:rustc-env=HYAWAY_GIT_REVISION={}", revision);
    println!("cargo:rustc-env=HYAWAY_BUILD_PROFILE={}", profile);
    println!("cargo:rustc-env=HYAWAY_BUILD_DATE={}", built_on);
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=build.rs");
}
