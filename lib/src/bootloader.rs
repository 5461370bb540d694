//! Regenerating the bootloader configuration.

use std::process::Command;

use anyhow::{Context, Result};
use fn_error_context::context;
use ukimenu_utils::CommandRunExt;

use crate::config::RunConfig;
use crate::exit::Failure;

/// Run the bootloader configuration regenerator, which picks up the menu file.
///
/// This must only be called after the menu file has been written and made
/// executable.
#[context("Updating bootloader configuration")]
pub(crate) fn update(config: &RunConfig) -> Result<()> {
    Command::new(&config.updater)
        .run()
        .context(Failure::BootloaderUpdateFailed)?;
    println!("Updated bootloader configuration");
    Ok(())
}
