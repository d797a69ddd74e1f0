// JSON-file mailbox: the shared `commands/*.json` records
//
// Writes go to a temporary sibling first and are renamed over the target,
// so readers never observe a half-written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::Result;
use super::mailbox::Mailbox;

#[derive(Debug, Clone)]
pub struct FileMailbox {
    path: PathBuf,
}

impl FileMailbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Temporary sibling, unique per process so two writers never share one
    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "record".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
    }
}

impl Mailbox for FileMailbox {
    async fn write(&self, record: &[u8]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let staging = self.staging_path();
        tokio::fs::write(&staging, record).await?;
        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            // Leave no stray staging file behind on a failed replace
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        debug!("Wrote {} bytes to {}", record.len(), self.path.display());
        Ok(())
    }

    async fn read(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let mailbox = FileMailbox::new("commands/current_command.json");
        let staging = mailbox.staging_path();
        assert_eq!(staging.parent(), Some(Path::new("commands")));
        let name = staging.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".current_command.json."));
        assert!(name.ends_with(".tmp"));
    }
}
