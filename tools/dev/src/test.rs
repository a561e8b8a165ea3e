use anyhow::Result;
use clap::Args;
use xshell::{cmd, Shell};

/// Crates whose tests run on the host against the scripted board.
const HOST_TESTED: &[&str] = &["kestrel", "syscall"];

#[derive(Args)]
pub struct Test {
    #[arg(long)]
    release: bool,
    /// Arguments passed to the test harness.
    #[arg(last = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Test {
    pub fn run(&self, shell: &Shell) -> Result<()> {
        let packages = HOST_TESTED.iter().flat_map(|p| ["--package", p]);
        let release = self.release.then_some("--release");
        let args = &self.args;
        cmd!(shell, "cargo test {packages...} {release...} -- {args...}").run()?;
        Ok(())
    }
}
