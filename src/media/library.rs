//! Local music library rooted at one directory.
//!
//! Confinement is lexical: `..` components are resolved without touching the
//! filesystem and the result must stay under the root.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::error::ErrorKind;

const DEFAULT_EXTENSION: &str = "mp3";

#[derive(Error, Debug)]
pub enum LibraryError {
  #[error("{0:?} is outside the library")]
  OutsideLibrary(PathBuf),
  #[error("{0:?} does not exist")]
  NotFound(PathBuf),
  #[error("Invalid file name {0:?}")]
  InvalidName(String),
  #[error("{0:?} already exists")]
  AlreadyExists(PathBuf),
  #[error("Library I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl LibraryError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      LibraryError::OutsideLibrary(_) | LibraryError::InvalidName(_) => ErrorKind::InvalidPath,
      LibraryError::NotFound(_) => ErrorKind::InvalidPath,
      LibraryError::AlreadyExists(_) => ErrorKind::Conflict,
      LibraryError::Io(_) => ErrorKind::Io,
    }
  }
}

/// Resolve `.` and `..` without consulting the filesystem.
fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        out.pop();
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

#[derive(Debug, Clone)]
pub struct Library {
  root: PathBuf,
}

impl Library {
  pub fn new(root: impl AsRef<Path>) -> Self {
    Self {
      root: normalize(root.as_ref()),
    }
  }

  /// Map `path` (absolute, or relative to the root) into the library.
  pub fn confine(&self, path: &Path) -> Result<PathBuf, LibraryError> {
    let joined = if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.root.join(path)
    };
    let normalized = normalize(&joined);
    if normalized.starts_with(&self.root) && normalized != self.root {
      Ok(normalized)
    } else {
      log::warn!("Rejected path outside library: {:?}", path);
      Err(LibraryError::OutsideLibrary(path.to_path_buf()))
    }
  }

  /// Confined path of an existing file.
  pub fn existing_file(&self, path: &Path) -> Result<PathBuf, LibraryError> {
    let confined = self.confine(path)?;
    if confined.is_file() {
      Ok(confined)
    } else {
      Err(LibraryError::NotFound(confined))
    }
  }

  /// Target path for saving a new file called `file_name`.
  ///
  /// The name must be a plain file name. Without an extension `.mp3` is added.
  pub fn save_target(&self, file_name: &str) -> Result<PathBuf, LibraryError> {
    let name = file_name.trim();
    let plain = !name.is_empty()
      && !name.starts_with('.')
      && !name.contains(['/', '\\', '\0'])
      && Path::new(name).file_name().is_some_and(|n| n == name);
    if !plain {
      return Err(LibraryError::InvalidName(file_name.to_string()));
    }

    let mut target = self.confine(Path::new(name))?;
    if target.extension().is_none() {
      target.set_extension(DEFAULT_EXTENSION);
    }
    if target.exists() {
      return Err(LibraryError::AlreadyExists(target));
    }
    Ok(target)
  }

  /// Delete a file from the library and return its confined path.
  pub fn delete(&self, path: &Path) -> Result<PathBuf, LibraryError> {
    let confined = self.existing_file(path)?;
    std::fs::remove_file(&confined)?;
    log::info!("Deleted {:?} from library", confined);
    Ok(confined)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_traversal_is_rejected() {
    let library = Library::new("/home/user/Music");
    assert!(matches!(
      library.confine(Path::new("../../etc/passwd")),
      Err(LibraryError::OutsideLibrary(_))
    ));
    assert!(library.confine(Path::new("/etc/passwd")).is_err());
    assert!(library.confine(Path::new("a/../../Music2/x.mp3")).is_err());
    assert!(library.confine(Path::new("")).is_err());
  }

  #[test]
  fn test_confine_accepts_paths_inside() {
    let library = Library::new("/home/user/Music");
    assert_eq!(
      library.confine(Path::new("jazz/./a.mp3")).unwrap(),
      PathBuf::from("/home/user/Music/jazz/a.mp3")
    );
    assert_eq!(
      library.confine(Path::new("/home/user/Music/jazz/../b.mp3")).unwrap(),
      PathBuf::from("/home/user/Music/b.mp3")
    );
  }

  #[test]
  fn test_save_target_validation() {
    let dir = tempfile::tempdir().unwrap();
    let library = Library::new(dir.path());
    std::fs::write(dir.path().join("Taken.mp3"), b"x").unwrap();

    assert_eq!(
      library.save_target("Artist - Song").unwrap(),
      library.root.join("Artist - Song.mp3")
    );
    assert!(matches!(
      library.save_target("Taken"),
      Err(LibraryError::AlreadyExists(_))
    ));
    assert!(matches!(
      library.save_target("../escape"),
      Err(LibraryError::InvalidName(_))
    ));
    assert!(matches!(library.save_target(".."), Err(LibraryError::InvalidName(_))));
    assert!(matches!(library.save_target(" "), Err(LibraryError::InvalidName(_))));
  }

  #[test]
  fn test_delete() {
    let dir = tempfile::tempdir().unwrap();
    let library = Library::new(dir.path());
    std::fs::write(dir.path().join("a.mp3"), b"x").unwrap();

    let deleted = library.delete(Path::new("a.mp3")).unwrap();
    assert!(!deleted.exists());
    assert!(matches!(
      library.delete(Path::new("a.mp3")),
      Err(LibraryError::NotFound(_))
    ));
  }
}
