//! Build script for wakegate
//!
//! Emits build-time metadata consumed by the `version` subcommand.

use vergen::EmitBuilder;

fn main() {
    if let Err(error) = EmitBuilder::builder()
        .all_build()
        .all_cargo()
        .all_rustc()
        .emit()
    {
        eprintln!("Failed to generate build info: {}", error);
        std::process::exit(1);
    }
}
