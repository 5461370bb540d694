//! # Unified kernel image menu tool
//!
//! This crate drives an external image generator (dracut) to build a
//! unified kernel image for a kernel release, then writes a GRUB drop-in
//! fragment offering every image in a submenu and has the bootloader
//! configuration regenerated.

// See https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![forbid(unused_must_use)]
#![deny(unsafe_code)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]

pub mod cli;
pub mod exit;

mod bootloader;
pub(crate) mod config;
mod generate;
mod images;
mod menu;
mod preflight;
mod prune;
