use anyhow::Result;
use clap::Args;
use xshell::Shell;

use crate::util::{ShellExt, KERNEL, OUT_DIR};

#[derive(Args)]
pub struct Disassemble {
    /// Binary name to disassemble.
    #[arg(default_value = KERNEL)]
    file: String,
}

impl Disassemble {
    pub fn run(&self, shell: &Shell) -> Result<()> {
        let bin = format!("{}/{}", OUT_DIR, self.file);
        shell.disassemble(&bin, &format!("{}.s", bin))
    }
}
