use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Append-only capture of raw inbound frames, one per line, readable by
/// the replay driver.
#[derive(Debug, Clone)]
pub struct FrameDump {
    path: PathBuf,
}

impl FrameDump {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, frame: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{frame}\n").as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_creates_parent_and_keeps_order() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let dump = FrameDump::new(dir.path().join("captures").join("data_dump.txt"));

        dump.append(r#"0{"sid":"abc"}"#).await?;
        dump.append("40").await?;

        let contents = tokio::fs::read_to_string(dump.path()).await?;
        assert_eq!(contents, "0{\"sid\":\"abc\"}\n40\n");
        Ok(())
    }
}
