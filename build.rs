use std::path::Path;
use std::process::Command;

const UNKNOWN: &str = "unknown";

/// Commit of the tree being built, from `RELINK_GIT_COMMIT` (container and CI builds) or git.
fn commit_hash() -> String {
    if let Ok(hash) = std::env::var("RELINK_GIT_COMMIT") {
        let hash = hash.trim();
        if !hash.is_empty() {
            return hash.to_owned();
        }
    }

    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_owned())
        .filter(|hash| !hash.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_owned())
}

fn main() {
    let hash = commit_hash();
    let short: String = if hash == UNKNOWN {
        hash.clone()
    } else {
        hash.chars().take(7).collect()
    };

    println!("cargo:rustc-env=GIT_COMMIT_HASH={hash}");
    println!("cargo:rustc-env=GIT_COMMIT_SHORT={short}");
    println!("cargo:rerun-if-env-changed=RELINK_GIT_COMMIT");

    if Path::new(".git/HEAD").exists() {
        println!("cargo:rerun-if-changed=.git/HEAD");
        println!("cargo:rerun-if-changed=.git/refs/heads");
    }
}
