//! # Command line interface
//!
//! Command line tool to build a unified kernel image and expose all
//! images through a GRUB submenu.

use std::ffi::OsString;

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;

use crate::config::{load_config, RunConfig};
use crate::preflight::{HostProbe, Probe};

/// Build a unified kernel image for a kernel and add all images
/// to a GRUB submenu.
#[derive(Debug, Parser, PartialEq, Eq)]
#[clap(name = "ukimenu", version)]
#[clap(rename_all = "kebab-case")]
pub(crate) struct Opt {
    /// Overwrite the menu file even if it was not generated by ukimenu.
    #[clap(long, short = 'f')]
    pub(crate) force: bool,

    /// Delete all but the newest images, then exit.
    #[clap(long, short = 'p')]
    pub(crate) purge: bool,

    /// Directory holding the images.
    #[clap(long, short = 'l', value_name = "DIR")]
    pub(crate) uki_location: Option<Utf8PathBuf>,

    /// Path of the generated GRUB menu fragment.
    #[clap(long, short = 'm', value_name = "PATH")]
    pub(crate) menufile_location: Option<Utf8PathBuf>,

    /// Kernel release to build an image for; defaults to the running kernel.
    #[clap(long, short = 'k', value_name = "VERSION")]
    pub(crate) kernel_version: Option<String>,

    /// Kernel command line embedded in the image; takes all following
    /// arguments up to the next option.
    #[clap(long, num_args = 0.., value_name = "ARG")]
    pub(crate) kernel_args: Option<Vec<String>>,

    /// Show debug output, including the output of external commands.
    #[clap(long, short = 'v')]
    pub(crate) verbose: bool,
}

/// Parse the provided arguments and execute.
/// Calls [`clap::Error::exit`] on failure, printing the error message and aborting the program.
pub fn run_from_iter<I>(args: I) -> Result<()>
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
{
    let opt = Opt::parse_from(args);
    ukimenu_utils::initialize_tracing(opt.verbose);
    tracing::trace!("starting");
    run_from_opt(opt)
}

/// Internal (non-generic/monomorphized) primary CLI entrypoint
fn run_from_opt(opt: Opt) -> Result<()> {
    let config = RunConfig::new(load_config()?, &opt)?;
    tracing::debug!("Resolved configuration: {config:?}");
    if opt.purge {
        purge(&config);
        return Ok(());
    }
    run_pipeline(&HostProbe, &config)
}

/// Pruning is cleanup; nothing it runs into fails the run.
fn purge(config: &RunConfig) {
    if let Err(e) = crate::prune::prune(config) {
        tracing::warn!("{e:#}");
    }
}

/// Build the image, regenerate the menu file and update the bootloader.
fn run_pipeline(probe: &impl Probe, config: &RunConfig) -> Result<()> {
    crate::preflight::check(probe, config)?;
    crate::generate::generate(config)?;
    crate::menu::update_menu_file(config)?;
    crate::bootloader::update(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::{exit_code, failure, Failure};
    use crate::generate::tests::config_with_tools;
    use crate::images::tests::create_image;
    use crate::preflight::tests::FakeProbe;
    use camino::Utf8Path;
    use clap::error::ErrorKind;
    use std::os::unix::fs::PermissionsExt;

    fn parse(args: &[&str]) -> Result<Opt, clap::Error> {
        Opt::try_parse_from(std::iter::once("ukimenu").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_long() -> Result<()> {
        let o = parse(&[
            "--kernel-version",
            "6.9.1",
            "--kernel-args",
            "quiet",
            "splash",
            "--force",
        ])?;
        assert_eq!(o.kernel_version.as_deref(), Some("6.9.1"));
        assert_eq!(o.kernel_args.unwrap(), ["quiet", "splash"]);
        assert!(o.force);
        assert!(!o.purge);
        assert!(!o.verbose);
        Ok(())
    }

    #[test]
    fn test_parse_short() -> Result<()> {
        let o = parse(&[
            "-f",
            "-v",
            "-l",
            "/efi/EFI/Linux",
            "-m",
            "/etc/grub.d/41_uki",
            "-k",
            "6.1",
        ])?;
        assert_eq!(
            o,
            Opt {
                force: true,
                purge: false,
                uki_location: Some("/efi/EFI/Linux".into()),
                menufile_location: Some("/etc/grub.d/41_uki".into()),
                kernel_version: Some("6.1".into()),
                kernel_args: None,
                verbose: true,
            }
        );
        assert!(parse(&["-p"])?.purge);
        Ok(())
    }

    #[test]
    fn test_parse_kernel_args() -> Result<()> {
        // Values stop at the next option
        let o = parse(&["--kernel-args", "root=/dev/sda2", "ro", "-v", "-k", "6.1"])?;
        assert_eq!(o.kernel_args.unwrap(), ["root=/dev/sda2", "ro"]);
        assert!(o.verbose);
        assert_eq!(o.kernel_version.as_deref(), Some("6.1"));
        // No values at all is an empty command line
        let o = parse(&["--kernel-args"])?;
        assert_eq!(o.kernel_args.unwrap(), Vec::<String>::new());
        Ok(())
    }

    #[test]
    fn test_parse_invalid() {
        let e = parse(&["--bogus"]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::UnknownArgument);
        assert_eq!(e.exit_code(), 2);
        let e = parse(&["--purge", "--bogus"]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::UnknownArgument);
        // Missing value
        let e = parse(&["-k"]).unwrap_err();
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn test_parse_help() {
        let e = parse(&["--help"]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::DisplayHelp);
        assert_eq!(e.exit_code(), 0);
        let e = parse(&["--version"]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::DisplayVersion);
        assert_eq!(e.exit_code(), 0);
    }

    struct Fixture {
        td: tempfile::TempDir,
        images: Utf8PathBuf,
        menu_file: Utf8PathBuf,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            let td = tempfile::tempdir()?;
            let root = Utf8Path::from_path(td.path()).unwrap().to_owned();
            let images = root.join("images");
            std::fs::create_dir(&images)?;
            for (i, name) in ["linux-6.1.efi", "linux-6.9.1.efi"].iter().enumerate() {
                create_image(images.as_std_path(), name, i as u64 * 100)?;
            }
            Ok(Self {
                td,
                images,
                menu_file: root.join("42_ukimenu"),
            })
        }

        fn config(&self, generator: &str, updater: &str) -> RunConfig {
            let mut c = config_with_tools(
                &[
                    "-k",
                    "6.9.1",
                    "-l",
                    self.images.as_str(),
                    "-m",
                    self.menu_file.as_str(),
                ],
                generator,
                updater,
            );
            c.dropin_dir = Utf8Path::from_path(self.td.path()).unwrap().to_owned();
            c
        }
    }

    #[test]
    fn test_pipeline() -> Result<()> {
        let fixture = Fixture::new()?;
        let config = fixture.config("true", "true");
        run_pipeline(&FakeProbe::ready(&config), &config)?;
        let menu = std::fs::read_to_string(&fixture.menu_file)?;
        assert!(menu.contains("menuentry 'linux-6.1.efi' {"));
        assert!(menu.contains("chainloader (hd0,1)/EFI/Linux/linux-6.9.1.efi"));
        let mode = std::fs::metadata(&fixture.menu_file)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        Ok(())
    }

    #[test]
    fn test_pipeline_preflight_failure() -> Result<()> {
        let fixture = Fixture::new()?;
        let config = fixture.config("true", "true");
        let mut probe = FakeProbe::ready(&config);
        probe.unprivileged = true;
        let e = run_pipeline(&probe, &config).unwrap_err();
        assert_eq!(exit_code(&e), 3);
        assert!(!fixture.menu_file.exists());
        Ok(())
    }

    #[test]
    fn test_pipeline_generator_failure() -> Result<()> {
        let fixture = Fixture::new()?;
        let config = fixture.config("false", "true");
        let e = run_pipeline(&FakeProbe::ready(&config), &config).unwrap_err();
        assert_eq!(failure(&e), Some(Failure::GeneratorFailed));
        assert_eq!(exit_code(&e), 9);
        assert!(!fixture.menu_file.exists());
        Ok(())
    }

    #[test]
    fn test_pipeline_updater_failure() -> Result<()> {
        let fixture = Fixture::new()?;
        let config = fixture.config("true", "false");
        let e = run_pipeline(&FakeProbe::ready(&config), &config).unwrap_err();
        assert_eq!(failure(&e), Some(Failure::BootloaderUpdateFailed));
        assert_eq!(exit_code(&e), 13);
        // The menu file is written before the updater runs
        assert!(fixture.menu_file.exists());
        Ok(())
    }

    #[test]
    fn test_pipeline_render_failure() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut config = fixture.config("true", "true");
        config.image_dir = fixture.images.join("missing");
        let e = run_pipeline(&FakeProbe::ready(&config), &config).unwrap_err();
        assert_eq!(failure(&e), Some(Failure::MenuRenderFailed));
        assert_eq!(exit_code(&e), 10);
        assert!(!fixture.menu_file.exists());
        Ok(())
    }

    #[test]
    fn test_pipeline_foreign_menu_file() -> Result<()> {
        let fixture = Fixture::new()?;
        std::fs::write(&fixture.menu_file, "#!/bin/sh\necho hello\n")?;
        let mut config = fixture.config("true", "true");
        let probe = FakeProbe::ready(&config);
        let e = run_pipeline(&probe, &config).unwrap_err();
        assert_eq!(exit_code(&e), 14);
        config.force = true;
        run_pipeline(&probe, &config)?;
        assert!(std::fs::read_to_string(&fixture.menu_file)?.contains("submenu "));
        Ok(())
    }

    #[test]
    fn test_purge() -> Result<()> {
        let fixture = Fixture::new()?;
        for (i, name) in ["a.efi", "b.efi", "c.efi"].iter().enumerate() {
            create_image(fixture.images.as_std_path(), name, 1000 + i as u64)?;
        }
        // The generator doesn't exist, proving it is not run
        let config = fixture.config("/nonexistent/dracut", "/nonexistent/update-grub");
        purge(&config);
        let mut names = std::fs::read_dir(&fixture.images)?
            .map(|e| -> Result<String> { Ok(e?.file_name().to_string_lossy().into_owned()) })
            .collect::<Result<Vec<_>>>()?;
        names.sort();
        assert_eq!(names, ["a.efi", "b.efi", "c.efi"]);
        assert!(!fixture.menu_file.exists());

        // Missing image directory
        let mut config = config;
        config.image_dir = fixture.images.join("nonexistent");
        purge(&config);
        Ok(())
    }
}
