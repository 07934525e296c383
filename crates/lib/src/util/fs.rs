use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Remove a directory tree if it exists and create it empty.
pub fn recreate_dir(path: &Path) -> io::Result<()> {
  match std::fs::remove_dir_all(path) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }
  std::fs::create_dir_all(path)
}

/// Recursively collect regular files under `root` whose extension is `ext`.
///
/// Unreadable entries are skipped. Results are sorted for stable ordering.
pub fn find_files_with_ext(root: &Path, ext: &str) -> Vec<PathBuf> {
  let mut found: Vec<PathBuf> = WalkDir::new(root)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|e| e.file_type().is_file())
    .filter(|e| e.path().extension().is_some_and(|x| x == ext))
    .map(|e| e.into_path())
    .collect();
  found.sort();
  found
}

/// Mark a file executable for everyone (0755). No-op on Windows.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> io::Result<()> {
  Ok(())
}
