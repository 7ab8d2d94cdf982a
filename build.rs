use std::process::Command;

/// Run git and return trimmed stdout, or `None` when git is missing, the
/// working copy is not a repo, or the command fails (e.g. no tag at HEAD).
fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    // Rebuild the version stamp when HEAD moves or tags change.
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    // Empty when building outside a git checkout (crates.io, tarballs).
    let hash = git_output(&["rev-parse", "--short", "HEAD"]).unwrap_or_default();
    let on_tag = git_output(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();

    println!("cargo:rustc-env=GIT_HASH={hash}");
    println!("cargo:rustc-env=ON_RELEASE_TAG={on_tag}");
}
