use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::application::ports::plugin_installer::{
    InstalledPackage, PluginInstallError, PluginInstaller,
};

static FOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"));

/// Commit suffix of a GitHub source zipball root: `{owner}-{repo}-{sha}`.
static ZIPBALL_SHA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{7,40}$").expect("valid regex"));

const EXTRACT_DIR: &str = "archive";

/// Unpacks release archives into the WordPress plugins directory.
pub struct FilesystemPluginInstaller {
    root: PathBuf,
}

impl FilesystemPluginInstaller {
    pub fn new(configured_dir: &str) -> anyhow::Result<Self> {
        Ok(Self {
            root: resolve_root(configured_dir)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_valid_folder(name: &str) -> bool {
        FOLDER_RE.is_match(name) && !name.contains("..")
    }

    fn install_blocking(
        root: &Path,
        archive: &[u8],
        fallback_folder: &str,
        zipball_prefix: Option<&str>,
    ) -> Result<InstalledPackage, PluginInstallError> {
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(root)
            .map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))?;
        let extracted = staging.path().join(EXTRACT_DIR);
        std::fs::create_dir_all(&extracted)
            .map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))?;
        extract_archive(archive, &extracted)?;

        let (source_dir, folder_name) = normalize_root(&extracted, fallback_folder, zipball_prefix)?;
        if !Self::is_valid_folder(&folder_name) {
            return Err(PluginInstallError::InvalidPackage(anyhow::anyhow!(
                "unusable plugin folder name {folder_name:?}"
            )));
        }

        let dest = root.join(&folder_name);
        if dest.exists() {
            std::fs::remove_dir_all(&dest)
                .map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))?;
        }
        std::fs::rename(&source_dir, &dest)
            .map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))?;
        Ok(InstalledPackage { folder_name })
    }
}

pub(crate) fn resolve_root(configured_dir: &str) -> anyhow::Result<PathBuf> {
    let configured = configured_dir.trim();
    let path = if configured.is_empty() {
        PathBuf::from("./wp-content/plugins")
    } else {
        PathBuf::from(configured)
    };
    if !path.exists() {
        std::fs::create_dir_all(&path)?;
    }
    Ok(path.canonicalize().unwrap_or(path))
}

fn is_junk_entry(name: &str) -> bool {
    name == "__MACOSX" || name.starts_with('.')
}

fn is_zipball_root(name: &str, prefix: &str) -> bool {
    name.len() > prefix.len()
        && name.is_char_boundary(prefix.len())
        && name[..prefix.len()].eq_ignore_ascii_case(prefix)
        && ZIPBALL_SHA_RE.is_match(&name[prefix.len()..])
}

/// Picks the directory that becomes the plugin folder. A single top-level
/// directory is used as-is unless it is the zipball root of the repository
/// being installed; anything else is wrapped in `fallback_folder`.
fn normalize_root(
    extracted: &Path,
    fallback_folder: &str,
    zipball_prefix: Option<&str>,
) -> Result<(PathBuf, String), PluginInstallError> {
    let mut entries = Vec::new();
    let read = std::fs::read_dir(extracted)
        .map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))?;
    for entry in read {
        let entry = entry.map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_junk_entry(&name) {
            entries.push((entry.path(), name));
        }
    }

    match entries.as_slice() {
        [] => Err(PluginInstallError::EmptyPackage),
        [(path, name)] if path.is_dir() => {
            let folder = if zipball_prefix.is_some_and(|p| is_zipball_root(name, p)) {
                fallback_folder.to_string()
            } else {
                name.clone()
            };
            Ok((path.clone(), folder))
        }
        _ => Ok((extracted.to_path_buf(), fallback_folder.to_string())),
    }
}

fn extract_archive(archive: &[u8], dest_root: &Path) -> Result<(), PluginInstallError> {
    let reader = std::io::Cursor::new(archive);
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|e| PluginInstallError::InvalidPackage(anyhow::anyhow!(e)))?;

    let dest_root = dest_root
        .canonicalize()
        .map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| PluginInstallError::InvalidPackage(anyhow::anyhow!(e)))?;
        let Some(rel_path) = file.enclosed_name().map(|p| p.to_path_buf()) else {
            tracing::warn!(entry = file.name(), "plugin_archive_entry_skipped");
            continue;
        };

        if let Some(mode) = file.unix_mode() {
            if (mode & 0o170000) == 0o120000 {
                continue;
            }
        }

        let outpath = dest_root.join(&rel_path);
        if !outpath.starts_with(&dest_root) {
            continue;
        }

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))?;
            }
            let mut outfile = std::fs::File::create(&outpath)
                .map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))?;
            std::io::copy(&mut file, &mut outfile)
                .map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))?;
        }
    }

    Ok(())
}

#[async_trait]
impl PluginInstaller for FilesystemPluginInstaller {
    async fn install(
        &self,
        archive: &[u8],
        fallback_folder: &str,
        zipball_prefix: Option<&str>,
    ) -> Result<InstalledPackage, PluginInstallError> {
        let root = self.root.clone();
        let archive = archive.to_vec();
        let fallback = fallback_folder.to_string();
        let prefix = zipball_prefix.map(str::to_string);
        let installed = tokio::task::spawn_blocking(move || {
            FilesystemPluginInstaller::install_blocking(
                &root,
                &archive,
                &fallback,
                prefix.as_deref(),
            )
        })
        .await
        .map_err(|e| PluginInstallError::Storage(anyhow::anyhow!(e)))??;
        tracing::debug!(folder = installed.folder_name.as_str(), "plugin_package_extracted");
        Ok(installed)
    }
}
