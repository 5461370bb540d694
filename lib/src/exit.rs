//! # Fatal conditions and process exit codes
//!
//! Every step that can end the run attaches a [`Failure`] to its error as
//! [`anyhow`] context. The binary recovers it with [`exit_code`] and exits
//! with the matching code; errors without one are internal errors.

/// Exit code for an error that carries no [`Failure`].
pub const EXIT_INTERNAL: i32 = 1;

/// A fatal condition, each with a distinct exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    /// Invalid command line or configuration value.
    #[error("invalid usage")]
    Usage,
    /// Not running with root privileges.
    #[error("insufficient privileges")]
    NotPrivileged,
    /// The bootloader drop-in directory cannot be written.
    #[error("bootloader drop-in directory not writable")]
    DropInDirNotWritable,
    /// The image directory cannot be written.
    #[error("image directory not writable")]
    ImageDirNotWritable,
    /// The menu file cannot be written.
    #[error("menu file not writable")]
    MenuFileNotWritable,
    /// The image generator is not on `PATH`.
    #[error("image generator not found")]
    GeneratorMissing,
    /// The boot manager support files are not installed.
    #[error("boot support files missing")]
    BootSupportMissing,
    /// The image generator failed.
    #[error("image generation failed")]
    GeneratorFailed,
    /// The menu could not be rendered.
    #[error("rendering boot menu failed")]
    MenuRenderFailed,
    /// The menu file could not be created or written.
    #[error("writing menu file failed")]
    MenuFileCreateFailed,
    /// The menu file could not be made executable.
    #[error("activating menu file failed")]
    MenuFileActivateFailed,
    /// The bootloader configuration regenerator failed.
    #[error("bootloader configuration update failed")]
    BootloaderUpdateFailed,
    /// The menu file exists but was not generated by us.
    #[error("refusing to overwrite menu file")]
    MenuFileForeign,
}

impl Failure {
    /// The process exit code for this condition.
    pub const fn exit_code(self) -> i32 {
        match self {
            Failure::Usage => 2,
            Failure::NotPrivileged => 3,
            Failure::DropInDirNotWritable => 4,
            Failure::ImageDirNotWritable => 5,
            Failure::MenuFileNotWritable => 6,
            Failure::GeneratorMissing => 7,
            Failure::BootSupportMissing => 8,
            Failure::GeneratorFailed => 9,
            Failure::MenuRenderFailed => 10,
            Failure::MenuFileCreateFailed => 11,
            Failure::MenuFileActivateFailed => 12,
            Failure::BootloaderUpdateFailed => 13,
            Failure::MenuFileForeign => 14,
        }
    }
}

/// Find the [`Failure`] attached anywhere in `err`.
pub fn failure(err: &anyhow::Error) -> Option<Failure> {
    err.downcast_ref::<Failure>().copied()
}

/// Map an error to the process exit code.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    failure(err).map_or(EXIT_INTERNAL, Failure::exit_code)
}
