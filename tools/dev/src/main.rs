mod build;
mod dis;
mod run;
mod test;
mod util;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::Shell;

/// Tools for kestrel development and compilation.
#[derive(Parser)]
#[command(name = "Kestrel Build Tool", version)]
struct Opts {
    #[command(subcommand)]
    sub_command: SubCommand,
}

#[derive(Subcommand)]
enum SubCommand {
    /// Build the kernel image
    Build(build::Build),
    /// Run with QEMU
    Run(run::Run),
    /// Run the host-side kernel tests
    Test(test::Test),
    /// Disassemble executables under ./target/_out
    #[command(name = "dis")]
    Disassemble(dis::Disassemble),
}

fn main() -> Result<()> {
    let shell = Shell::new()?;
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .context("tools/dev is not inside the workspace")?;
    let _p = shell.push_dir(root);
    match Opts::parse().sub_command {
        SubCommand::Build(t) => t.run(&shell, false),
        SubCommand::Run(t) => t.run(&shell),
        SubCommand::Test(t) => t.run(&shell),
        SubCommand::Disassemble(t) => t.run(&shell),
    }
}
