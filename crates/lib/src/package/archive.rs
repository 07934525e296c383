use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::Builder;
use tempfile::NamedTempFile;

/// Write `source_dir` as a gzip-compressed tarball at `archive_path`.
///
/// Entries are stored under `root_name/`. The archive is written to a sibling
/// temporary file and renamed into place, so a failed run never leaves a
/// truncated archive behind. Returns the archive size in bytes.
pub fn write_tar_gz(source_dir: &Path, root_name: &str, archive_path: &Path) -> io::Result<u64> {
  let parent = archive_path.parent().unwrap_or_else(|| Path::new("."));
  std::fs::create_dir_all(parent)?;
  let temp = NamedTempFile::new_in(parent)?;

  {
    let encoder = GzEncoder::new(BufWriter::new(temp.as_file()), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(true);
    builder.append_dir_all(root_name, source_dir)?;
    let mut writer = builder.into_inner()?.finish()?;
    writer.flush()?;
  }

  let file = temp.persist(archive_path).map_err(|e| e.error)?;
  Ok(file.metadata()?.len())
}

/// List entry paths in a `.tar.gz`, for inspection and tests.
pub fn list_entries(archive_path: &Path) -> io::Result<Vec<String>> {
  let decoder = flate2::read::GzDecoder::new(io::BufReader::new(File::open(archive_path)?));
  let mut archive = tar::Archive::new(decoder);
  let mut names = Vec::new();
  for entry in archive.entries()? {
    let entry = entry?;
    names.push(entry.path()?.to_string_lossy().into_owned());
  }
  names.sort();
  Ok(names)
}
