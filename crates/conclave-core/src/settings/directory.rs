//! Project working directory setup.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

const CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// How to obtain the project directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorySetup {
    /// New empty directory under the projects root
    Create {
        /// Directory name; sanitized
        name: String,
    },
    /// `git clone` under the projects root
    Clone {
        /// Repository URL
        repo_url: String,
        /// Directory name; derived from the URL when absent
        name: Option<String>,
    },
    /// Directory that already exists
    Existing {
        /// Absolute or `~`-relative path
        path: String,
    },
}

/// Expand `~` and make the path absolute
pub fn resolve_directory(path: &str) -> Result<PathBuf> {
    let expanded = match path.strip_prefix('~') {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| Error::Configuration("home directory not found".to_string()))?;
            home.join(rest.trim_start_matches('/'))
        }
        None => PathBuf::from(path),
    };
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(std::env::current_dir()?.join(expanded))
    }
}

/// Lowercase, keep `[a-z0-9_-]`, collapse dashes
#[must_use]
pub fn sanitize_dir_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "project".to_string()
    } else {
        trimmed.to_string()
    }
}

fn unique_child(root: &Path, base: &str) -> PathBuf {
    let mut candidate = root.join(base);
    let mut counter = 1;
    while candidate.exists() {
        counter += 1;
        candidate = root.join(format!("{base}-{counter}"));
    }
    candidate
}

fn repo_dir_name(repo_url: &str) -> String {
    repo_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|s| s.trim_end_matches(".git"))
        .filter(|s| !s.is_empty())
        .unwrap_or("repo")
        .to_string()
}

/// Create, clone or validate the project directory and return its path
pub async fn prepare_directory(projects_root: Option<&Path>, setup: &DirectorySetup) -> Result<PathBuf> {
    let root = || {
        projects_root.ok_or_else(|| {
            Error::Configuration("projects root directory is not configured".to_string())
        })
    };

    match setup {
        DirectorySetup::Create { name } => {
            let root = root()?;
            let path = unique_child(root, &sanitize_dir_name(name));
            tokio::fs::create_dir_all(&path).await?;
            info!(path = %path.display(), "Created project directory");
            Ok(path)
        }
        DirectorySetup::Clone { repo_url, name } => {
            let root = root()?;
            tokio::fs::create_dir_all(root).await?;
            let dir_name = name
                .as_deref()
                .map(sanitize_dir_name)
                .unwrap_or_else(|| repo_dir_name(repo_url));
            let path = unique_child(root, &dir_name);

            info!(repo_url = %repo_url, path = %path.display(), "Cloning repository");
            let output = tokio::time::timeout(
                CLONE_TIMEOUT,
                Command::new("git")
                    .arg("clone")
                    .arg(repo_url)
                    .arg(&path)
                    .current_dir(root)
                    .output(),
            )
            .await
            .map_err(|_| Error::Vcs(format!("git clone timed out after {}s", CLONE_TIMEOUT.as_secs())))??;

            if !output.status.success() {
                return Err(Error::Vcs(
                    String::from_utf8_lossy(&output.stderr).trim().to_string(),
                ));
            }
            Ok(path)
        }
        DirectorySetup::Existing { path } => {
            let resolved = resolve_directory(path)?;
            let meta = tokio::fs::metadata(&resolved).await.map_err(|_| {
                Error::NotFound(format!("directory {}", resolved.display()))
            })?;
            if !meta.is_dir() {
                return Err(Error::InvalidData(format!(
                    "not a directory: {}",
                    resolved.display()
                )));
            }
            Ok(resolved)
        }
    }
}
