//! # Checks run before doing any work
//!
//! The checks run in a fixed order and the first failure ends the run:
//! privileges, then writability of the drop-in directory, the image
//! directory and the menu file, then presence of the generator and the
//! boot support files.

use std::path::PathBuf;

use anyhow::{anyhow, ensure, Context, Result};
use camino::Utf8Path;
use fn_error_context::context;

use crate::config::RunConfig;
use crate::exit::Failure;

/// Queries about the host environment.
pub(crate) trait Probe {
    /// Whether we run with root privileges.
    fn is_privileged(&self) -> bool;
    /// Whether the given path can be written.
    fn is_writable(&self, path: &Utf8Path) -> bool;
    /// Whether the given path exists.
    fn exists(&self, path: &Utf8Path) -> bool;
    /// Find a program like a shell would.
    fn find_program(&self, name: &str) -> Option<PathBuf>;
}

/// The real system.
#[derive(Debug, Default)]
pub(crate) struct HostProbe;

impl Probe for HostProbe {
    fn is_privileged(&self) -> bool {
        rustix::process::geteuid().is_root()
    }

    fn is_writable(&self, path: &Utf8Path) -> bool {
        rustix::fs::access(path.as_std_path(), rustix::fs::Access::WRITE_OK).is_ok()
    }

    fn exists(&self, path: &Utf8Path) -> bool {
        path.as_std_path().try_exists().unwrap_or(false)
    }

    fn find_program(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }
}

fn require_writable(probe: &impl Probe, path: &Utf8Path) -> Result<()> {
    ensure!(probe.is_writable(path), "{path} is not writable");
    Ok(())
}

/// Verify the host is ready.
#[context("Preflight checks")]
pub(crate) fn check(probe: &impl Probe, config: &RunConfig) -> Result<()> {
    if !probe.is_privileged() {
        return Err(anyhow!("must be run as root").context(Failure::NotPrivileged));
    }
    require_writable(probe, &config.dropin_dir).context(Failure::DropInDirNotWritable)?;
    require_writable(probe, &config.image_dir).context(Failure::ImageDirNotWritable)?;
    // A menu file which doesn't exist yet just needs a writable parent
    let menu_target = if probe.exists(&config.menu_file) {
        config.menu_file.as_path()
    } else {
        config.menu_file_dir()
    };
    require_writable(probe, menu_target).context(Failure::MenuFileNotWritable)?;
    let generator = probe
        .find_program(&config.generator)
        .ok_or_else(|| anyhow!("{} not found in PATH", config.generator))
        .context(Failure::GeneratorMissing)?;
    tracing::debug!("Using generator {}", generator.display());
    if !probe.exists(&config.boot_support_dir) {
        return Err(anyhow!("{} not found", config.boot_support_dir)
            .context(Failure::BootSupportMissing));
    }
    Ok(())
}
