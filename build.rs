use std::{fs, process::Command, time::SystemTime};

fn main() {
    let now = SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    println!("cargo:rustc-env=BUILD_TIME={}", now);
    println!("cargo:rerun-if-changed=.git/HEAD");

    let branch = git(&["rev-parse", "--abbrev-ref", "HEAD"]).or_else(branch_from_head);
    let commit = git(&["rev-parse", "HEAD"]);
    let short = commit.as_deref().map(|c| c.chars().take(7).collect::<String>());

    println!(
        "cargo:rustc-env=GIT_BRANCH={}",
        branch.unwrap_or_else(|| "unknown".into())
    );
    println!(
        "cargo:rustc-env=GIT_COMMIT={}",
        commit.unwrap_or_else(|| "unknown".into())
    );
    println!(
        "cargo:rustc-env=GIT_COMMIT_SHORT={}",
        short.unwrap_or_else(|| "unknown".into())
    );
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let out = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!out.is_empty()).then_some(out)
}

// No git binary in some build containers.
fn branch_from_head() -> Option<String> {
    let head = fs::read_to_string(".git/HEAD").ok()?;
    head.strip_prefix("ref: ")
        .and_then(|r| r.trim().rsplit('/').next())
        .map(str::to_string)
}
