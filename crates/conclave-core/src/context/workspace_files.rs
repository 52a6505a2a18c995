use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory holding the workspace documents
pub const WORKSPACE_DIR: &str = ".conclave";
/// Project overview document
pub const PROJECT_FILE: &str = "PROJECT.md";
/// Conventions document
pub const CONVENTIONS_FILE: &str = "CONVENTIONS.md";

/// The two hand-editable documents under `.conclave/`
#[derive(Debug, Clone)]
pub struct WorkspaceFiles {
    dir: PathBuf,
    project_md: Option<String>,
    conventions_md: Option<String>,
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl WorkspaceFiles {
    /// Read whatever documents exist under `project_root/.conclave`
    pub async fn load(project_root: &Path) -> Result<Self> {
        let dir = project_root.join(WORKSPACE_DIR);
        let project_md = read_optional(&dir.join(PROJECT_FILE)).await?;
        let conventions_md = read_optional(&dir.join(CONVENTIONS_FILE)).await?;
        Ok(Self {
            dir,
            project_md,
            conventions_md,
        })
    }

    /// Both documents as one prompt block
    #[must_use]
    pub fn context(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(project) = &self.project_md {
            parts.push(format!("### Project\n{project}"));
        }
        if let Some(conventions) = &self.conventions_md {
            parts.push(format!("### Conventions\n{conventions}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// PROJECT.md content
    #[must_use]
    pub fn project_md(&self) -> Option<&str> {
        self.project_md.as_deref()
    }

    /// CONVENTIONS.md content
    #[must_use]
    pub fn conventions_md(&self) -> Option<&str> {
        self.conventions_md.as_deref()
    }

    async fn write(&self, file: &str, content: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(file), content).await?;
        info!(file = %file, "Saved workspace file");
        Ok(())
    }

    /// Overwrite PROJECT.md
    pub async fn save_project_md(&mut self, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        self.write(PROJECT_FILE, &content).await?;
        self.project_md = Some(content);
        Ok(())
    }

    /// Overwrite CONVENTIONS.md
    pub async fn save_conventions_md(&mut self, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        self.write(CONVENTIONS_FILE, &content).await?;
        self.conventions_md = Some(content);
        Ok(())
    }
}
