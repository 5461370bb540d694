//! Enumerating the generated images in the image directory.

use std::time::SystemTime;

use anyhow::{Context, Result};
use camino::Utf8Path;
use cap_std_ext::cap_std;
use cap_std_ext::cap_std::fs::Dir;
use cap_std_ext::dirext::CapStdExtDirExt;
use fn_error_context::context;

/// Suffix of the image files we manage.
pub(crate) const IMAGE_SUFFIX: &str = ".efi";

/// A generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageFile {
    /// File name, relative to the image directory
    pub(crate) name: String,
    pub(crate) modified: SystemTime,
}

/// Open the image directory.
pub(crate) fn open_image_dir(path: &Utf8Path) -> Result<Dir> {
    Dir::open_ambient_dir(path, cap_std::ambient_authority())
        .with_context(|| format!("Opening {path}"))
}

/// Open the image directory, returning `None` if it does not exist.
pub(crate) fn open_image_dir_optional(path: &Utf8Path) -> Result<Option<Dir>> {
    // The root, or a path ending in `..`
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return open_image_dir(path).map(Some);
    };
    let parent = match Dir::open_ambient_dir(parent, cap_std::ambient_authority()) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Opening {parent}")),
    };
    parent
        .open_dir_optional(name)
        .with_context(|| format!("Opening {path}"))
}

/// Return the regular files ending in [`IMAGE_SUFFIX`], sorted by name.
///
/// Directories, symbolic links and anything else are skipped, as are
/// names which are not valid UTF-8.
#[context("Listing images")]
pub(crate) fn list_images(dir: &Dir) -> Result<Vec<ImageFile>> {
    let mut r = Vec::new();
    for entry in dir.entries()? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            tracing::warn!("Ignoring non UTF-8 filename {name:?}");
            continue;
        };
        if !name.ends_with(IMAGE_SUFFIX) {
            tracing::trace!("Ignoring {name}");
            continue;
        }
        if !entry.file_type()?.is_file() {
            tracing::debug!("Ignoring non-regular file {name}");
            continue;
        }
        let modified = entry
            .metadata()?
            .modified()
            .with_context(|| format!("Querying mtime of {name}"))?
            .into_std();
        r.push(ImageFile {
            name: name.to_owned(),
            modified,
        });
    }
    r.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(r)
}
