//! Installing downloaded dependencies into the cache directory.
//!
//! Layout: every dependency owns `<cache_dir>/<name>/`. Single binaries land
//! directly in it; with `move_all` the whole extracted archive tree is moved
//! there and the binary is found inside it.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use fp_core::{DependencySpec, Error, PostProcess, Result};
use walkdir::WalkDir;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];

/// Directory owned by `spec` inside the cache.
pub(crate) fn install_dir(cache_dir: &Path, spec: &DependencySpec) -> PathBuf {
    cache_dir.join(&spec.name)
}

/// Look for a previously installed, executable copy of `spec` in the cache.
pub(crate) fn find_cached(cache_dir: &Path, spec: &DependencySpec) -> Option<PathBuf> {
    let dir = install_dir(cache_dir, spec);
    if !dir.is_dir() {
        return None;
    }
    find_binary(&dir, &spec.binary_file_name()).filter(|p| is_executable(p))
}

/// Unpack `bytes` according to the spec's post-process action and move the
/// result into the cache. Returns the installed binary path.
pub(crate) fn install(cache_dir: &Path, spec: &DependencySpec, bytes: &[u8]) -> Result<PathBuf> {
    let fail = |message: String| Error::dependency_missing(&spec.name, message);

    fs::create_dir_all(cache_dir)
        .map_err(|e| fail(format!("cannot create cache dir {}: {e}", cache_dir.display())))?;

    // Staging inside the cache keeps the final rename on one filesystem.
    let staging = tempfile::Builder::new()
        .prefix(".install-")
        .tempdir_in(cache_dir)
        .map_err(|e| fail(format!("cannot create staging dir: {e}")))?;

    let file_name = spec.binary_file_name();
    let action = spec.post_process.unwrap_or(PostProcess::StoreBinary);

    let staged_binary = match action {
        PostProcess::Unzip => {
            extract_zip(bytes, staging.path()).map_err(|e| fail(format!("unzip failed: {e}")))?;
            locate(staging.path(), &file_name).map_err(fail)?
        }
        PostProcess::Untar => {
            extract_tar(bytes, staging.path()).map_err(|e| fail(format!("untar failed: {e}")))?;
            locate(staging.path(), &file_name).map_err(fail)?
        }
        PostProcess::StoreBinary => {
            let path = staging.path().join(&file_name);
            fs::write(&path, bytes).map_err(|e| fail(format!("cannot write binary: {e}")))?;
            path
        }
        PostProcess::StoreText => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| fail(format!("downloaded text is not UTF-8: {e}")))?;
            let path = staging.path().join(&file_name);
            fs::write(&path, text).map_err(|e| fail(format!("cannot write text: {e}")))?;
            path
        }
    };

    let dest_dir = install_dir(cache_dir, spec);
    if dest_dir.exists() {
        fs::remove_dir_all(&dest_dir)
            .map_err(|e| fail(format!("cannot clear {}: {e}", dest_dir.display())))?;
    }
    fs::create_dir_all(&dest_dir)
        .map_err(|e| fail(format!("cannot create {}: {e}", dest_dir.display())))?;

    let installed = if spec.move_all && action.is_archive() {
        move_tree(staging.path(), &dest_dir)
            .map_err(|e| fail(format!("cannot move extracted tree: {e}")))?;
        let relative = staged_binary
            .strip_prefix(staging.path())
            .map_err(|e| fail(format!("binary outside staging dir: {e}")))?;
        dest_dir.join(relative)
    } else {
        let target = dest_dir.join(&file_name);
        fs::rename(&staged_binary, &target)
            .map_err(|e| fail(format!("cannot move binary into cache: {e}")))?;
        target
    };

    set_executable(&installed)
        .map_err(|e| fail(format!("cannot mark {} executable: {e}", installed.display())))?;

    staging
        .close()
        .map_err(|e| fail(format!("cannot remove staging dir: {e}")))?;

    tracing::info!("Installed {} to {}", spec.name, installed.display());
    Ok(installed)
}

fn extract_zip(bytes: &[u8], dest: &Path) -> std::result::Result<(), String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    archive.extract(dest).map_err(|e| e.to_string())
}

fn extract_tar(bytes: &[u8], dest: &Path) -> std::result::Result<(), String> {
    let reader: Box<dyn Read + '_> = if bytes.starts_with(GZIP_MAGIC) {
        Box::new(flate2::read::GzDecoder::new(bytes))
    } else if bytes.starts_with(XZ_MAGIC) {
        Box::new(xz2::read::XzDecoder::new(bytes))
    } else {
        Box::new(bytes)
    };
    tar::Archive::new(reader)
        .unpack(dest)
        .map_err(|e| e.to_string())
}

fn locate(root: &Path, file_name: &str) -> std::result::Result<PathBuf, String> {
    find_binary(root, file_name)
        .ok_or_else(|| format!("archive does not contain a file named '{file_name}'"))
}

/// Shallowest regular file named `file_name` under `root`.
pub(crate) fn find_binary(root: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
}

fn move_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        fs::rename(entry.path(), to.join(entry.file_name()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Whether `path` is a regular file the current user may execute.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Whether `path` is a regular file the current user may execute.
#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}
