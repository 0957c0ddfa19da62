//! Build context packaging.
//!
//! Entries are walked in file name order and written with deterministic
//! headers, so the same tree always yields the same bytes.

use std::io;
use std::path::Path;

use tar::{Builder, HeaderMode};
use walkdir::WalkDir;

/// Pack every regular file under `dir` into an uncompressed tar stream.
///
/// Paths in the archive are relative to `dir`. Executable bits survive; other
/// metadata (owner, timestamps) is normalized.
pub fn pack_dir(dir: &Path) -> io::Result<Vec<u8>> {
  let mut archive = Builder::new(Vec::new());
  archive.mode(HeaderMode::Deterministic);

  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry?;
    if !entry.file_type().is_file() {
      continue;
    }

    let rel_path = entry.path().strip_prefix(dir).unwrap_or(entry.path());
    archive.append_path_with_name(entry.path(), rel_path)?;
  }

  archive.into_inner()
}
