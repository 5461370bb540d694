//! # Configuration
//!
//! Settings come from TOML fragments in `ukimenu/` below the systemd
//! conventional configuration directories (e.g. `/etc/ukimenu/10-local.toml`),
//! overridden by command line arguments. The result is a [`RunConfig`] which
//! is built once and only read afterwards.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fn_error_context::context;
use serde::{Deserialize, Serialize};

use crate::cli::Opt;
use crate::exit::Failure;
use crate::menu::MenuSettings;

/// Directories scanned for configuration fragments, lowest priority first.
const SYSTEMD_CONVENTIONAL_BASES: &[&str] = &["/usr/lib", "/usr/local/lib", "/etc", "/run"];
/// Subdirectory of each base holding our fragments.
const CONFIG_SUBDIR: &str = "ukimenu";

/// Where dracut puts images by default.
pub(crate) const DEFAULT_IMAGE_DIR: &str = "/boot/efi/EFI/Linux";
pub(crate) const DEFAULT_MENU_FILE: &str = "/etc/grub.d/42_ukimenu";
pub(crate) const DEFAULT_DROPIN_DIR: &str = "/etc/grub.d";
pub(crate) const DEFAULT_GENERATOR: &str = "dracut";
pub(crate) const DEFAULT_UPDATER: &str = "update-grub";
/// The systemd EFI stub, which dracut needs for `--uefi`, lives here.
pub(crate) const DEFAULT_BOOT_SUPPORT_DIR: &str = "/usr/lib/systemd/boot/efi";
/// Number of images kept when pruning.
pub(crate) const DEFAULT_KEEP: usize = 3;

/// The toplevel of a configuration fragment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub(crate) struct ConfigurationToplevel {
    pub(crate) ukimenu: Option<Configuration>,
}

/// The serialized `[ukimenu]` section
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Configuration {
    /// Directory holding the generated images
    pub(crate) image_dir: Option<Utf8PathBuf>,
    /// Path of the generated menu fragment
    pub(crate) menu_file: Option<Utf8PathBuf>,
    /// The bootloader's drop-in directory
    pub(crate) dropin_dir: Option<Utf8PathBuf>,
    /// Image generator program
    pub(crate) generator: Option<String>,
    /// Bootloader configuration regenerator program
    pub(crate) updater: Option<String>,
    /// Directory which must exist for the generator to produce EFI images
    pub(crate) boot_support_dir: Option<Utf8PathBuf>,
    /// GRUB device holding the EFI system partition, e.g. `(hd0,1)`
    pub(crate) boot_device: Option<String>,
    /// Location of the images relative to the root of the EFI system partition
    pub(crate) esp_subdir: Option<String>,
    /// Label of the generated submenu
    pub(crate) submenu_title: Option<String>,
    /// Number of images kept when pruning
    pub(crate) keep: Option<usize>,
}

impl Configuration {
    /// Apply any values in other, overriding any existing values in `self`.
    fn merge(&mut self, other: Self) {
        fn mergeopt<T>(s: &mut Option<T>, o: Option<T>) {
            if let Some(o) = o {
                *s = Some(o);
            }
        }
        mergeopt(&mut self.image_dir, other.image_dir);
        mergeopt(&mut self.menu_file, other.menu_file);
        mergeopt(&mut self.dropin_dir, other.dropin_dir);
        mergeopt(&mut self.generator, other.generator);
        mergeopt(&mut self.updater, other.updater);
        mergeopt(&mut self.boot_support_dir, other.boot_support_dir);
        mergeopt(&mut self.boot_device, other.boot_device);
        mergeopt(&mut self.esp_subdir, other.esp_subdir);
        mergeopt(&mut self.submenu_title, other.submenu_title);
        mergeopt(&mut self.keep, other.keep);
    }
}

/// Load the configuration, merging all fragments found in the
/// standard locations.
pub(crate) fn load_config() -> Result<Configuration> {
    load_config_from(SYSTEMD_CONVENTIONAL_BASES)
}

#[context("Loading configuration")]
pub(crate) fn load_config_from(bases: &[impl AsRef<Path>]) -> Result<Configuration> {
    let fragments = liboverdrop::scan(bases, CONFIG_SUBDIR, &["toml"], true);
    let mut config = Configuration::default();
    for (_name, path) in fragments {
        let buf = std::fs::read_to_string(&path).with_context(|| format!("Reading {path:?}"))?;
        let mut unused = std::collections::BTreeSet::new();
        let de = toml::Deserializer::new(&buf);
        let c: ConfigurationToplevel = serde_ignored::deserialize(de, |path| {
            unused.insert(path.to_string());
        })
        .with_context(|| format!("Parsing {path:?}"))
        .context(Failure::Usage)?;
        for key in unused {
            tracing::warn!("{path:?}: Unknown key {key}");
        }
        if let Some(c) = c.ukimenu {
            tracing::debug!("Merging config from {path:?}: {c:?}");
            config.merge(c);
        }
    }
    Ok(config)
}

/// Everything a single run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunConfig {
    pub(crate) menu_file: Utf8PathBuf,
    pub(crate) image_dir: Utf8PathBuf,
    pub(crate) kernel_version: String,
    /// Joined with single spaces; empty if none were given.
    pub(crate) kernel_args: String,
    pub(crate) force: bool,
    pub(crate) verbose: bool,
    pub(crate) dropin_dir: Utf8PathBuf,
    pub(crate) generator: String,
    pub(crate) updater: String,
    pub(crate) boot_support_dir: Utf8PathBuf,
    pub(crate) keep: usize,
    pub(crate) menu: MenuSettings,
}

impl RunConfig {
    /// Overlay the command line on the loaded configuration.
    pub(crate) fn new(config: Configuration, opt: &Opt) -> Result<Self> {
        Self::new_impl(config, opt).context(Failure::Usage)
    }

    fn new_impl(config: Configuration, opt: &Opt) -> Result<Self> {
        let kernel_version = match opt.kernel_version.as_ref() {
            Some(v) => v.clone(),
            None => running_kernel_release()?,
        };
        let defaults = MenuSettings::default();
        let r = Self {
            menu_file: opt
                .menufile_location
                .clone()
                .or(config.menu_file)
                .unwrap_or_else(|| DEFAULT_MENU_FILE.into()),
            image_dir: opt
                .uki_location
                .clone()
                .or(config.image_dir)
                .unwrap_or_else(|| DEFAULT_IMAGE_DIR.into()),
            kernel_version,
            kernel_args: opt
                .kernel_args
                .as_deref()
                .map(|a| a.join(" "))
                .unwrap_or_default(),
            force: opt.force,
            verbose: opt.verbose,
            dropin_dir: config
                .dropin_dir
                .unwrap_or_else(|| DEFAULT_DROPIN_DIR.into()),
            generator: config
                .generator
                .unwrap_or_else(|| DEFAULT_GENERATOR.into()),
            updater: config.updater.unwrap_or_else(|| DEFAULT_UPDATER.into()),
            boot_support_dir: config
                .boot_support_dir
                .unwrap_or_else(|| DEFAULT_BOOT_SUPPORT_DIR.into()),
            keep: config.keep.unwrap_or(DEFAULT_KEEP),
            menu: MenuSettings {
                title: config.submenu_title.unwrap_or(defaults.title),
                boot_device: config.boot_device.unwrap_or(defaults.boot_device),
                esp_subdir: config.esp_subdir.unwrap_or(defaults.esp_subdir),
            },
        };
        r.validate()?;
        Ok(r)
    }

    fn validate(&self) -> Result<()> {
        require_absolute("menu file", &self.menu_file)?;
        require_absolute("image directory", &self.image_dir)?;
        require_absolute("drop-in directory", &self.dropin_dir)?;
        // The header runs `exec tail -n +3 $0` unquoted
        if self.menu_file.as_str().chars().any(char::is_whitespace) {
            anyhow::bail!("menu file {:?} must not contain whitespace", self.menu_file);
        }
        if self.menu_file.file_name().is_none() {
            anyhow::bail!("menu file {} does not name a file", self.menu_file);
        }
        if self.kernel_version.is_empty() || self.kernel_version.contains('/') {
            anyhow::bail!("invalid kernel version {:?}", self.kernel_version);
        }
        if self.keep == 0 {
            anyhow::bail!("keep must be at least 1");
        }
        Ok(())
    }

    /// The menu file name, relative to its parent directory.
    pub(crate) fn menu_file_name(&self) -> &str {
        // Checked in validate()
        self.menu_file.file_name().unwrap_or_default()
    }

    /// The directory containing the menu file.
    pub(crate) fn menu_file_dir(&self) -> &Utf8Path {
        self.menu_file.parent().unwrap_or(Utf8Path::new("/"))
    }
}

fn require_absolute(what: &str, p: &Utf8Path) -> Result<()> {
    if p.as_str().is_empty() {
        anyhow::bail!("{what} must not be empty");
    }
    if !p.is_absolute() {
        anyhow::bail!("{what} must be an absolute path: {p}");
    }
    Ok(())
}

/// The release of the running kernel, as `uname -r` prints it.
fn running_kernel_release() -> Result<String> {
    let uts = rustix::system::uname();
    uts.release()
        .to_str()
        .map(ToOwned::to_owned)
        .map_err(|_| anyhow!("Kernel release is not UTF-8: {:?}", uts.release()))
}
