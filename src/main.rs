//
// main.rs
// Dicom-Albums-rs
//
// Binary entry point that hands off execution to the CLI layer; any error exits non-zero.
//
// Thales Matheus Mendonça Santos - October 2026

use dicom_albums::cli;

fn main() -> anyhow::Result<()> {
    // Delegate all argument parsing and dispatching to the CLI module.
    cli::run()
}
