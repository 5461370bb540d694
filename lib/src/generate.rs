//! Building an image with the external generator (dracut).

use std::process::Command;

use anyhow::{Context, Result};
use fn_error_context::context;
use ukimenu_utils::CommandRunExt;

use crate::config::RunConfig;
use crate::exit::Failure;

/// Kernel modules are installed in a subdirectory per kernel release.
const MODULES_ROOT: &str = "/lib/modules";

/// The module directory for the given kernel release.
pub(crate) fn module_dir(kernel_version: &str) -> String {
    format!("{MODULES_ROOT}/{kernel_version}/")
}

/// Build the generator invocation.
pub(crate) fn generator_command(config: &RunConfig) -> Command {
    let mut cmd = Command::new(&config.generator);
    // Always overwrite; the image name is derived from the kernel version.
    cmd.args(["--uefi", "--force", "--kver"])
        .arg(&config.kernel_version)
        .arg("--kmoddir")
        .arg(module_dir(&config.kernel_version));
    if config.verbose {
        cmd.arg("--verbose");
    }
    // A bare trailing word would be taken as dracut's output image path
    if !config.kernel_args.is_empty() {
        cmd.args(["--kernel-cmdline", config.kernel_args.as_str()]);
    }
    cmd
}

/// Generate the image for the configured kernel version.
#[context("Generating image for kernel {}", config.kernel_version)]
pub(crate) fn generate(config: &RunConfig) -> Result<()> {
    println!("Generating image for kernel {}", config.kernel_version);
    generator_command(config)
        .run()
        .context(Failure::GeneratorFailed)?;
    println!("Generated image for kernel {}", config.kernel_version);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cli::Opt;
    use crate::config::Configuration;
    use crate::exit::failure;
    use clap::Parser;

    /// A configuration for the given arguments, with the external programs replaced.
    pub(crate) fn config_with_tools(args: &[&str], generator: &str, updater: &str) -> RunConfig {
        let opt =
            Opt::try_parse_from(std::iter::once("ukimenu").chain(args.iter().copied())).unwrap();
        let config = Configuration {
            generator: Some(generator.into()),
            updater: Some(updater.into()),
            ..Default::default()
        };
        RunConfig::new(config, &opt).unwrap()
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_generator_command() {
        let c = config_with_tools(&["-k", "6.9.1"], "dracut", "true");
        let cmd = generator_command(&c);
        assert_eq!(cmd.get_program(), "dracut");
        assert_eq!(
            args_of(&cmd),
            ["--uefi", "--force", "--kver", "6.9.1", "--kmoddir", "/lib/modules/6.9.1/"]
        );

        let c = config_with_tools(
            &["-k", "6.9.1", "--kernel-args", "quiet", "splash", "-v"],
            "/usr/bin/dracut",
            "true",
        );
        let cmd = generator_command(&c);
        assert_eq!(cmd.get_program(), "/usr/bin/dracut");
        assert_eq!(
            args_of(&cmd),
            [
                "--uefi",
                "--force",
                "--kver",
                "6.9.1",
                "--kmoddir",
                "/lib/modules/6.9.1/",
                "--verbose",
                "--kernel-cmdline",
                "quiet splash"
            ]
        );
    }

    #[test]
    fn test_generate() {
        let c = config_with_tools(&["-k", "6.9.1"], "true", "true");
        generate(&c).unwrap();

        let c = config_with_tools(&["-k", "6.9.1"], "false", "true");
        let e = generate(&c).unwrap_err();
        assert_eq!(failure(&e), Some(Failure::GeneratorFailed));
        assert!(format!("{e:#}").contains("exited with code 1"));

        let c = config_with_tools(&["-k", "6.9.1"], "/nonexistent/dracut", "true");
        let e = generate(&c).unwrap_err();
        assert_eq!(failure(&e), Some(Failure::GeneratorFailed));
    }
}
