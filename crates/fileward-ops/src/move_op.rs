//! Moving a single item, with a copy fallback across filesystems.

use std::fs;
use std::io;
use std::path::Path;

/// Move `source` to `dest`.
///
/// Uses a rename when both live on the same filesystem. Across filesystems the
/// item is copied recursively (keeping file modification times) and the source
/// removed afterwards. The caller is responsible for checking that `dest` is
/// free.
pub fn move_item(source: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                source = %source.display(),
                dest = %dest.display(),
                "rename crosses devices, copying instead"
            );
            copy_then_remove(source, dest)
        }
        Err(e) => Err(e),
    }
}

/// Copy `source` to `dest`, then delete `source`.
fn copy_then_remove(source: &Path, dest: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(source)?;

    if metadata.is_dir() {
        if let Err(e) = copy_dir_recursive(source, dest) {
            let _ = fs::remove_dir_all(dest);
            return Err(e);
        }
        fs::remove_dir_all(source)
    } else {
        if let Err(e) = copy_entry(source, dest, &metadata) {
            let _ = fs::remove_file(dest);
            return Err(e);
        }
        fs::remove_file(source)
    }
}

/// Recursively copy a directory.
fn copy_dir_recursive(source: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir(dest)?;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());
        let metadata = fs::symlink_metadata(&path)?;

        if metadata.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            copy_entry(&path, &dest_path, &metadata)?;
        }
    }

    Ok(())
}

/// Copy a file or symlink, preserving the modification time of files.
fn copy_entry(source: &Path, dest: &Path, metadata: &fs::Metadata) -> io::Result<()> {
    #[cfg(unix)]
    if metadata.file_type().is_symlink() {
        let target = fs::read_link(source)?;
        return std::os::unix::fs::symlink(target, dest);
    }

    fs::copy(source, dest)?;
    let modified = metadata.modified()?;
    fs::File::options()
        .write(true)
        .open(dest)?
        .set_modified(modified)
}
