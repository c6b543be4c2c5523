//! Renders `vastbench.1` from the command-line definition.
//!
//! The page lands in `OUT_DIR` next to the compiled binary's build artefacts,
//! where release tooling collects it alongside the executable.

use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

const MAN_PAGE: &str = "vastbench.1";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cargo = std::io::stdout();
    for watched in ["build.rs", "src/cli/mod.rs"] {
        writeln!(cargo, "cargo:rerun-if-changed={watched}")?;
    }

    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or("OUT_DIR is only set when cargo runs the build script")?;

    let mut page = BufWriter::new(File::create(out_dir.join(MAN_PAGE))?);
    Man::new(cli::Cli::command()).render(&mut page)?;
    page.flush()?;

    Ok(())
}
