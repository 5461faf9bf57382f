//! Build Script for Relay Datasource
//!
//! Emits the `coverage` cfg when building under an instrumented toolchain.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CARGO_LLVM_COV");
    println!("cargo:rerun-if-env-changed=LLVM_PROFILE_FILE");
    println!("cargo:rerun-if-env-changed=RUSTFLAGS");

    let instrumented = env::var("CARGO_LLVM_COV").is_ok()
        || env::var("LLVM_PROFILE_FILE").is_ok()
        || env::var("RUSTFLAGS").is_ok_and(|f| f.contains("instrument-coverage"));

    if instrumented {
        println!("cargo:rustc-cfg=coverage");
    }
}
