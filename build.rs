use std::env;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Short commit hash; `GJ_GIT_SHA` wins so packagers can pin it.
fn git_sha() -> String {
    if let Ok(sha) = env::var("GJ_GIT_SHA") {
        let sha = sha.trim();
        if !sha.is_empty() {
            return sha.to_string();
        }
    }

    let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=10", "HEAD"])
        .output()
    else {
        return "unknown".to_string();
    };
    if !output.status.success() {
        return "unknown".to_string();
    }
    match String::from_utf8(output.stdout) {
        Ok(sha) if !sha.trim().is_empty() => sha.trim().to_string(),
        _ => "unknown".to_string(),
    }
}

/// Seconds since the epoch, honouring reproducible builds.
fn build_timestamp() -> u64 {
    env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or(0)
        })
}

fn main() {
    for path in [".git/HEAD", ".git/refs/heads"] {
        println!("cargo:rerun-if-changed={path}");
    }
    for var in ["GJ_GIT_SHA", "SOURCE_DATE_EPOCH"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    println!("cargo:rustc-env=GJ_GIT_SHA={}", git_sha());
    println!("cargo:rustc-env=GJ_BUILD_TS={}", build_timestamp());
}
