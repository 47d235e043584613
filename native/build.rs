// Build script for the keychain crate
// Links the Apple frameworks and records build metadata

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=BUILD_TARGET");

    let target = env::var("TARGET").unwrap_or_default();

    if target.contains("apple") {
        println!("cargo:rustc-link-lib=framework=Security");
        println!("cargo:rustc-link-lib=framework=CoreFoundation");
    } else {
        println!("cargo:warning=no system keychain on {}; only the in-memory backend is available", target);
    }

    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", chrono::Utc::now().timestamp());
    println!("cargo:rustc-env=BUILD_TARGET={}", target);
}
