//! Discovery of the files a full deploy uploads.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ShipConfig;
use crate::error::{Result, UploadError};

use super::task::{object_key, ObjectAcl, UploadTask};

/// Key segment under which child templates are stored.
pub const TEMPLATES_SEGMENT: &str = "cfn-templates";

/// Key segment under which the code package is stored.
pub const CODE_SEGMENT: &str = "code";

/// Key segment under which static assets are stored.
pub const PUBLIC_SEGMENT: &str = "public";

/// Every file uploaded before the stack mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    /// Child templates.
    pub templates: Vec<UploadTask>,
    /// Code package.
    pub code: Option<UploadTask>,
    /// Static assets, sorted by key.
    pub assets: Vec<UploadTask>,
}

impl ArtifactSet {
    /// Collects the artifacts described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the code package is missing or a directory cannot
    /// be walked.
    pub fn from_config(config: &ShipConfig) -> Result<Self> {
        let prefix = config.storage.prefix.as_str();

        let templates = discover_templates(
            &config.stack.template_dir,
            &config.child_template_prefix(),
            prefix,
        )?;

        let package = &config.code.package;
        if !package.is_file() {
            return Err(UploadError::Read {
                path: package.clone(),
                message: String::from("code package not found"),
            }
            .into());
        }
        let code = Some(code_task(package, prefix));

        let assets = discover_assets(
            &config.assets.root,
            &config.assets.folders,
            prefix,
            &config.asset_cache_control(),
        )?;

        Ok(Self {
            templates,
            code,
            assets,
        })
    }

    /// Returns the number of files in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len() + usize::from(self.code.is_some()) + self.assets.len()
    }

    /// Returns true if there is nothing to upload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds the task for the code package.
#[must_use]
pub fn code_task(package: &Path, prefix: &str) -> UploadTask {
    let file_name = package
        .file_name()
        .map_or_else(|| String::from("code.zip"), |n| n.to_string_lossy().to_string());

    UploadTask::new(package, object_key(&[prefix, CODE_SEGMENT, &file_name]))
}

/// Lists the child templates in `dir` whose file name starts with `name_prefix`.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn discover_templates(dir: &Path, name_prefix: &str, prefix: &str) -> Result<Vec<UploadTask>> {
    if !dir.is_dir() {
        warn!("Template directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut tasks = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(dir, &e))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if name.starts_with(name_prefix) {
            tasks.push(UploadTask::new(
                entry.path(),
                object_key(&[prefix, TEMPLATES_SEGMENT, &name]),
            ));
        }
    }

    debug!("Found {} child templates in {}", tasks.len(), dir.display());
    Ok(tasks)
}

/// Lists every file under `root/<folder>` for each folder.
///
/// Keys are `<prefix>/public/<folder>/<relative path>`. Missing folders are
/// skipped.
///
/// # Errors
///
/// Returns an error if a folder cannot be walked.
pub fn discover_assets(
    root: &Path,
    folders: &[String],
    prefix: &str,
    cache_control: &str,
) -> Result<Vec<UploadTask>> {
    let mut tasks = Vec::new();

    for folder in folders {
        let base = root.join(folder);
        if !base.is_dir() {
            debug!("Asset folder {} does not exist, skipping", base.display());
            continue;
        }

        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry.map_err(|e| walk_error(&base, &e))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = relative_key(&base, entry.path());
            tasks.push(
                UploadTask::new(
                    entry.path(),
                    object_key(&[prefix, PUBLIC_SEGMENT, folder, &relative]),
                )
                .with_acl(ObjectAcl::PublicRead)
                .with_cache_control(cache_control),
            );
        }
    }

    tasks.sort_by(|a, b| a.remote_key.cmp(&b.remote_key));
    tasks.dedup_by(|a, b| a.remote_key == b.remote_key);

    debug!("Found {} asset files", tasks.len());
    Ok(tasks)
}

/// Returns `path` relative to `base` with `/` separators.
fn relative_key(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk_error(dir: &Path, err: &walkdir::Error) -> UploadError {
    UploadError::Read {
        path: err
            .path()
            .map_or_else(|| dir.to_path_buf(), PathBuf::from),
        message: err.to_string(),
    }
}
