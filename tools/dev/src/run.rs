use anyhow::Result;
use clap::Args;
use xshell::{cmd, Shell};

use crate::{
    build::Build,
    util::{CargoFlags, KERNEL, OUT_DIR},
};

#[derive(Args)]
pub struct Run {
    #[command(flatten)]
    pub cargo: CargoFlags,
    /// Extra arguments passed to QEMU.
    #[arg(last = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Run {
    pub fn run(&self, shell: &Shell) -> Result<()> {
        let build = Build {
            cargo: self.cargo.clone(),
        };
        build.run(shell, true)?;
        let kernel = format!("{}/{}", OUT_DIR, KERNEL);
        let args = &self.args;
        cmd!(
            shell,
            "qemu-system-aarch64 -M virt -cpu cortex-a53 -m 256M -nographic -semihosting -kernel {kernel} {args...}"
        )
        .run()?;
        Ok(())
    }
}
