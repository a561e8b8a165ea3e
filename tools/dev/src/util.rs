use anyhow::Result;
use clap::{Args, ValueEnum};
use xshell::{cmd, Shell};

/// Build outputs are collected here.
pub const OUT_DIR: &str = "./target/_out";
/// The bootable kernel binary.
pub const KERNEL: &str = "kestrel-aarch64";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Arch {
    #[value(name = "aarch64")]
    AArch64,
}

#[derive(Args, Clone)]
pub struct CargoFlags {
    /// Target architecture.
    #[arg(long, value_enum, default_value = "aarch64")]
    pub arch: Arch,
    /// Comma-separated features of the board crate.
    #[arg(long)]
    pub features: Option<String>,
    #[arg(long)]
    pub release: bool,
}

impl CargoFlags {
    pub fn kernel_target(&self) -> &'static str {
        match self.arch {
            Arch::AArch64 => "aarch64-unknown-none",
        }
    }

    pub fn profile(&self) -> &'static str {
        if self.release {
            "release"
        } else {
            "debug"
        }
    }

    pub fn with_feature(&self, feature: &str) -> Self {
        let features = match &self.features {
            Some(features) => format!("{},{}", features, feature),
            None => feature.to_owned(),
        };
        Self {
            features: Some(features),
            ..self.clone()
        }
    }
}

pub trait ShellExt {
    /// Build `package` for the kernel target and copy the binary into [`OUT_DIR`].
    fn build_package(&self, package: &str, cargo: &CargoFlags) -> Result<()>;
    fn disassemble(&self, bin: &str, out: &str) -> Result<()>;
}

impl ShellExt for Shell {
    fn build_package(&self, package: &str, cargo: &CargoFlags) -> Result<()> {
        let target = cargo.kernel_target();
        let features = cargo.features.iter().flat_map(|f| ["--features", f.as_str()]);
        let release = cargo.release.then_some("--release");
        cmd!(
            self,
            "cargo build --package {package} --target {target} {features...} {release...}"
        )
        .run()?;
        self.create_dir(OUT_DIR)?;
        self.copy_file(
            format!("./target/{}/{}/{}", target, cargo.profile(), package),
            OUT_DIR,
        )?;
        Ok(())
    }

    fn disassemble(&self, bin: &str, out: &str) -> Result<()> {
        let dissam = cmd!(self, "llvm-objdump --section-headers --source -d {bin}")
            .ignore_stderr()
            .read()?;
        self.write_file(out, dissam)?;
        Ok(())
    }
}
