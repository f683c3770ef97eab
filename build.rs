use std::env;
use std::process::Command;

/// `git describe` output, or "unknown" outside a checkout
fn git_revision() -> String {
    Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=10"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|rev| rev.trim().to_owned())
        .filter(|rev| !rev.is_empty())
        .unwrap_or_else(|| "unknown".to_owned())
}

fn main() {
    let profile = match env::var("PROFILE").as_deref() {
        Ok("release") => "release",
        _ => "development",
    };
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_owned());

    println!("cargo:rustc-env=PIXELCRYPT_VERSION={}", env!("CARGO_PKG_VERSION"));
    println!("cargo:rustc-env=PIXELCRYPT_GIT_HASH={}", git_revision());
    println!("cargo:rustc-env=PIXELCRYPT_PROFILE={}", profile);
    println!("cargo:rustc-env=PIXELCRYPT_TARGET={}", target);

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=PROFILE");
}
