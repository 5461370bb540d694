//! # The GRUB menu fragment
//!
//! `grub-mkconfig` executes every executable file in `/etc/grub.d` and
//! concatenates their output. Ours is a tiny shell script which prints
//! itself from the third line on; everything after the two line header
//! is literal GRUB configuration: one submenu with a `chainloader` entry
//! per image.

use std::fmt::Write;
use std::os::unix::fs::PermissionsExt;

use anyhow::{Context, Result};
use cap_std_ext::cap_std;
use cap_std_ext::cap_std::fs::{Dir, Permissions};
use fn_error_context::context;

use crate::config::RunConfig;
use crate::exit::Failure;
use crate::images::{list_images, open_image_dir};

/// The first two lines of every menu file we write.
pub(crate) const HEADER: &str = "#!/bin/sh\nexec tail -n +3 $0\n";
/// grub-mkconfig only runs executable fragments.
const MENU_FILE_MODE: u32 = 0o755;

const DEFAULT_TITLE: &str = "Unified kernel images";
/// The first partition of the first disk; not detected.
const DEFAULT_BOOT_DEVICE: &str = "(hd0,1)";
const DEFAULT_ESP_SUBDIR: &str = "/EFI/Linux/";

/// How the menu entries locate the images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MenuSettings {
    /// Label of the submenu
    pub(crate) title: String,
    /// GRUB device name of the EFI system partition
    pub(crate) boot_device: String,
    /// Directory of the images on that partition
    pub(crate) esp_subdir: String,
}

impl Default for MenuSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.into(),
            boot_device: DEFAULT_BOOT_DEVICE.into(),
            esp_subdir: DEFAULT_ESP_SUBDIR.into(),
        }
    }
}

impl MenuSettings {
    /// The path GRUB chain-loads for the given image.
    fn chainload_path(&self, name: &str) -> String {
        let subdir = self.esp_subdir.trim_matches('/');
        if subdir.is_empty() {
            format!("{}/{name}", self.boot_device)
        } else {
            format!("{}/{subdir}/{name}", self.boot_device)
        }
    }
}

/// Whether `buf` looks like a menu file we generated.
///
/// The header alone is not enough: it's the same one the stock `40_custom`
/// starts with.
fn is_generated(buf: &[u8]) -> bool {
    buf.strip_prefix(HEADER.as_bytes())
        .map_or(false, |rest| rest.starts_with(b"submenu "))
}

/// Quote a word for GRUB, which follows shell rules here.
fn grub_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Quote only if needed, so the common case stays readable.
fn grub_quote_if_needed(s: &str) -> String {
    if s.chars()
        .all(|c| c.is_ascii_alphanumeric() || "()/,._-+=:".contains(c))
    {
        s.to_owned()
    } else {
        grub_quote(s)
    }
}

/// Render the complete menu file for the given image names.
pub(crate) fn render<'a>(
    names: impl IntoIterator<Item = &'a str>,
    settings: &MenuSettings,
) -> Result<String, std::fmt::Error> {
    let mut r = String::from(HEADER);
    writeln!(r, "submenu {} {{", grub_quote(&settings.title))?;
    for name in names {
        writeln!(r, "\tmenuentry {} {{", grub_quote(name))?;
        writeln!(
            r,
            "\t\tchainloader {}",
            grub_quote_if_needed(&settings.chainload_path(name))
        )?;
        writeln!(r, "\t}}")?;
    }
    writeln!(r, "}}")?;
    Ok(r)
}

/// Write `contents` to `name` in `dir`, unless the file exists and
/// was not written by us.
fn write_menu_file(dir: &Dir, name: &str, contents: &str, force: bool) -> Result<()> {
    let existing = match dir.read(name) {
        Ok(buf) => Some(buf),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Reading {name}"))
                .context(Failure::MenuFileCreateFailed)
        }
    };
    if let Some(existing) = existing {
        if !is_generated(&existing) {
            if !force {
                return Err(anyhow::anyhow!(
                    "{name} was not generated by this tool; use --force to overwrite it"
                )
                .context(Failure::MenuFileForeign));
            }
            tracing::warn!("Overwriting {name}");
        }
    }
    dir.write(name, contents)
        .with_context(|| format!("Writing {name}"))
        .context(Failure::MenuFileCreateFailed)?;
    dir.set_permissions(
        name,
        Permissions::from_std(std::fs::Permissions::from_mode(MENU_FILE_MODE)),
    )
    .with_context(|| format!("Setting mode of {name}"))
    .context(Failure::MenuFileActivateFailed)?;
    Ok(())
}

/// Regenerate the menu file from the images currently present.
#[context("Updating {}", config.menu_file)]
pub(crate) fn update_menu_file(config: &RunConfig) -> Result<()> {
    let images = open_image_dir(&config.image_dir)
        .and_then(|d| list_images(&d))
        .context(Failure::MenuRenderFailed)?;
    let contents = render(images.iter().map(|i| i.name.as_str()), &config.menu)
        .context(Failure::MenuRenderFailed)?;
    let dir = Dir::open_ambient_dir(config.menu_file_dir(), cap_std::ambient_authority())
        .with_context(|| format!("Opening {}", config.menu_file_dir()))
        .context(Failure::MenuFileCreateFailed)?;
    write_menu_file(&dir, config.menu_file_name(), &contents, config.force)?;
    println!(
        "Wrote {} with {} boot entries",
        config.menu_file,
        images.len()
    );
    Ok(())
}
