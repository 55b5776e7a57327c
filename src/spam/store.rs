use super::SpamTraining;
use crate::guidelines::write_atomically;
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;

/// Persistence for the ham/spam corpus pair.
#[async_trait]
pub trait SpamTrainingStore: Send + Sync {
    /// Two empty corpora when nothing was saved yet.
    async fn load(&self) -> anyhow::Result<SpamTraining>;

    async fn save(&self, training: &SpamTraining) -> anyhow::Result<()>;
}

/// Both corpora in a single JSON document, replaced atomically.
pub struct JsonTrainingStore {
    path: PathBuf,
}

impl JsonTrainingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SpamTrainingStore for JsonTrainingStore {
    async fn load(&self) -> anyhow::Result<SpamTraining> {
        if !tokio::fs::try_exists(&self.path).await? {
            log::info!("No spam training at {}", self.path.display());
            return Ok(SpamTraining::default());
        }
        let content = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let training = serde_json::from_slice(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(training)
    }

    async fn save(&self, training: &SpamTraining) -> anyhow::Result<()> {
        let content = serde_json::to_vec(training)?;
        write_atomically(&self.path, &content).await?;
        log::info!("Saved spam training to {}", self.path.display());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTrainingStore {
    training: Mutex<Option<SpamTraining>>,
}

impl MemoryTrainingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Option<SpamTraining> {
        self.training.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpamTrainingStore for MemoryTrainingStore {
    async fn load(&self) -> anyhow::Result<SpamTraining> {
        Ok(self.saved().unwrap_or_default())
    }

    async fn save(&self, training: &SpamTraining) -> anyhow::Result<()> {
        *self.training.lock().unwrap() = Some(training.clone());
        Ok(())
    }
}
