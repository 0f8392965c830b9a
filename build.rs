//! Build script embedding version metadata.

use std::process::Command;

fn main() {
    // A release pipeline may pin BOOTCONF_VERSION; local builds use git describe.
    if let Ok(version) = std::env::var("BOOTCONF_VERSION") {
        println!("cargo:rustc-env=BOOTCONF_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !version.is_empty() {
            println!("cargo:rustc-env=BOOTCONF_VERSION={version}");
        }
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=BOOTCONF_VERSION");
}
