use anyhow::Result;
use clap::Args;
use xshell::Shell;

use crate::util::{CargoFlags, ShellExt, KERNEL};

#[derive(Args)]
pub struct Build {
    #[command(flatten)]
    pub cargo: CargoFlags,
}

impl Build {
    pub fn run(&self, shell: &Shell, qemu: bool) -> Result<()> {
        let cargo = if qemu {
            self.cargo.with_feature("qemu")
        } else {
            self.cargo.clone()
        };
        shell.build_package(KERNEL, &cargo)
    }
}
