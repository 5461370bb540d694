//! # Removing old images
//!
//! Keeps the newest images by modification time and deletes the rest.
//! This is opportunistic cleanup: a file that can't be removed is
//! reported and skipped.

use anyhow::Result;
use cap_std_ext::cap_std::fs::Dir;
use fn_error_context::context;

use crate::config::RunConfig;
use crate::images::{list_images, open_image_dir_optional};

/// Outcome of pruning an image directory.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Pruned {
    /// Retained images, newest first
    pub(crate) kept: Vec<String>,
    pub(crate) removed: Vec<String>,
    /// Images which should have been removed, but couldn't be
    pub(crate) failed: Vec<String>,
}

/// Prune the configured image directory.
#[context("Pruning images in {}", config.image_dir)]
pub(crate) fn prune(config: &RunConfig) -> Result<Pruned> {
    let Some(dir) = open_image_dir_optional(&config.image_dir)? else {
        println!("No image directory {}; nothing to prune", config.image_dir);
        return Ok(Pruned::default());
    };
    let r = prune_dir(&dir, config.keep)?;
    for name in r.removed.iter() {
        println!("Removed {}/{name}", config.image_dir);
    }
    println!(
        "Kept {} image(s), removed {}{}",
        r.kept.len(),
        r.removed.len(),
        if r.failed.is_empty() {
            String::new()
        } else {
            format!(", failed to remove {}", r.failed.len())
        }
    );
    Ok(r)
}

/// Keep the `keep` most recently modified images in `dir` and delete the rest.
pub(crate) fn prune_dir(dir: &Dir, keep: usize) -> Result<Pruned> {
    let mut images = list_images(dir)?;
    // Newest first; ties are broken by name so the result is stable
    images.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| b.name.cmp(&a.name))
    });
    let stale = images.split_off(keep.min(images.len()));
    let mut r = Pruned {
        kept: images.into_iter().map(|i| i.name).collect(),
        ..Default::default()
    };
    for image in stale {
        match dir.remove_file(&image.name) {
            Ok(()) => {
                tracing::debug!("Removed {}", image.name);
                r.removed.push(image.name);
            }
            Err(e) => {
                tracing::warn!("Failed to remove {}: {e}", image.name);
                r.failed.push(image.name);
            }
        }
    }
    Ok(r)
}
