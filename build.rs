//! Build script: embeds the jsh version string at compile time.

use std::process::Command;

fn main() {
    // Prefer JSH_VERSION if set (release builds), otherwise git describe.
    if let Ok(version) = std::env::var("JSH_VERSION") {
        println!("cargo:rustc-env=JSH_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !version.is_empty() {
            println!("cargo:rustc-env=JSH_VERSION={version}");
        }
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=JSH_VERSION");
}
