//! Destination-path fallback chain.

use std::path::{Path, PathBuf};

use photo_relay_core::DEFAULT_APP_DIR;
use tracing::debug;

/// Which step of the fallback chain produced a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLocation {
    /// `<external storage>/DCIM/<app dir>`.
    ExternalDcim,
    /// `<pictures dir>/<app dir>`.
    Pictures,
    /// Bare file name in the process working directory.
    WorkingDirectory,
}

/// Resolved photo destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Full target path.
    pub path: PathBuf,
    /// Chain step that produced it.
    pub location: StorageLocation,
}

/// First-available policy over the storage roots known at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoPathPolicy {
    app_dir: String,
    external_storage: Option<PathBuf>,
    pictures_dir: Option<PathBuf>,
    working_dir: PathBuf,
}

impl PhotoPathPolicy {
    /// Builds a policy from explicit roots.
    pub fn new(
        app_dir: impl Into<String>,
        external_storage: Option<PathBuf>,
        pictures_dir: Option<PathBuf>,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            app_dir: app_dir.into(),
            external_storage,
            pictures_dir,
            working_dir,
        }
    }

    /// Discovers roots from the running platform.
    ///
    /// External storage comes from `EXTERNAL_STORAGE` (set on Android), the
    /// pictures directory from the user's XDG/known-folder configuration.
    pub fn discover(app_dir: Option<&str>) -> Self {
        let external_storage = std::env::var_os("EXTERNAL_STORAGE")
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty());
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self::new(
            app_dir.unwrap_or(DEFAULT_APP_DIR),
            external_storage,
            dirs::picture_dir(),
            working_dir,
        )
    }

    /// Returns the target for `file_name`, creating the directory it lives in.
    ///
    /// Each candidate directory is tried in order; the working directory is the
    /// last resort and is used without further checks.
    pub fn resolve(&self, file_name: &str) -> ResolvedPath {
        let candidates = [
            (
                StorageLocation::ExternalDcim,
                self.external_storage
                    .as_ref()
                    .map(|root| root.join("DCIM").join(&self.app_dir)),
            ),
            (
                StorageLocation::Pictures,
                self.pictures_dir
                    .as_ref()
                    .map(|root| root.join(&self.app_dir)),
            ),
        ];

        for (location, directory) in candidates {
            let Some(directory) = directory else {
                debug!(stage = "capture", action = "path_probe", ?location, "root unavailable");
                continue;
            };
            match prepare_directory(&directory) {
                Ok(()) => {
                    return ResolvedPath {
                        path: directory.join(file_name),
                        location,
                    };
                }
                Err(error) => {
                    debug!(
                        stage = "capture",
                        action = "path_probe",
                        ?location,
                        directory = %directory.display(),
                        %error,
                        "skipping storage root"
                    );
                }
            }
        }

        ResolvedPath {
            path: self.working_dir.join(file_name),
            location: StorageLocation::WorkingDirectory,
        }
    }
}

fn prepare_directory(directory: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(directory)?;
    if !directory.is_dir() {
        return Err(std::io::Error::other("not a directory"));
    }
    Ok(())
}
