//! Uploaded recipient lists and their cleanup

use std::io;
use std::path::{Path, PathBuf};

/// A recipient list stored on disk for one campaign
///
/// The stored file usually has a generated name; `original_name` is the
/// name it was uploaded under and decides how it is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
	pub path: PathBuf,
	pub original_name: String,
}

impl UploadedFile {
	pub fn new(path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			original_name: original_name.into(),
		}
	}

	/// Copy `source` into `uploads_dir` under a unique name
	///
	/// The source is left untouched; the campaign owns and removes the copy.
	pub fn stage(source: &Path, uploads_dir: &Path) -> io::Result<Self> {
		let original_name = source
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.ok_or_else(|| {
				io::Error::new(
					io::ErrorKind::InvalidInput,
					format!("{} is not a file path", source.display()),
				)
			})?;

		std::fs::create_dir_all(uploads_dir)?;
		let path = uploads_dir.join(uuid::Uuid::new_v4().simple().to_string());
		std::fs::copy(source, &path)?;

		tracing::debug!(
			source = %source.display(),
			staged = %path.display(),
			"staged upload"
		);
		Ok(Self {
			path,
			original_name,
		})
	}
}

/// Removes an upload exactly once
///
/// Call [`UploadGuard::remove`] when processing ends; if the guard is dropped
/// first (panic, cancelled future) the file is removed on drop instead.
#[derive(Debug)]
pub struct UploadGuard {
	path: Option<PathBuf>,
}

impl UploadGuard {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: Some(path.into()),
		}
	}

	/// Delete the file; later calls do nothing
	///
	/// Failures are logged, never returned: a leftover upload must not turn a
	/// finished campaign into an error.
	pub fn remove(&mut self) {
		let Some(path) = self.path.take() else {
			return;
		};

		match std::fs::remove_file(&path) {
			Ok(()) => tracing::debug!(path = %path.display(), "removed upload"),
			Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove upload"),
		}
	}

	pub fn is_removed(&self) -> bool {
		self.path.is_none()
	}
}

impl Drop for UploadGuard {
	fn drop(&mut self) {
		self.remove();
	}
}
