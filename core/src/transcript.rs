// Plain-text transcripts for turns that produced no audio

use crate::util::create_artifact;
use crate::Result;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `chat_<timestamp>.txt` holding one exchange.
    pub async fn write(&self, user_text: &str, assistant_text: &str) -> Result<PathBuf> {
        let (path, file) = create_artifact(&self.dir, "chat", "txt")?;
        let body = format!("User: {user_text}\nAssistant: {assistant_text}\n");
        let mut file = tokio::fs::File::from_std(file);
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;
        debug!(target = "orchestrator", path = %path.display(), "Transcript saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path().join("out")).unwrap();
        let path = writer.write("Hello", "Hi there").await.unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body, "User: Hello\nAssistant: Hi there\n");
        assert!(path.extension().is_some_and(|e| e == "txt"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_keep_every_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let writer = std::sync::Arc::new(TranscriptWriter::new(dir.path()).unwrap());

        let mut handles = Vec::new();
        for i in 0..64 {
            let writer = std::sync::Arc::clone(&writer);
            handles.push(tokio::spawn(async move {
                writer.write(&format!("question {i}"), "answer").await.unwrap()
            }));
        }
        let mut paths = std::collections::HashSet::new();
        for h in handles {
            paths.insert(h.await.unwrap());
        }

        assert_eq!(paths.len(), 64);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 64);
        for path in &paths {
            let body = std::fs::read_to_string(path).unwrap();
            assert!(body.starts_with("User: question "));
        }
    }
}
