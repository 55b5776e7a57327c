//! Sender guideline storage
//!
//! A sender without a stored guideline requires manual screening. Lookups never fail;
//! writes are durable before they return.

use crate::types::{Guideline, Sender};
use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

#[async_trait]
pub trait GuidelineStore: Send + Sync {
    async fn get(&self, sender: &Sender) -> Guideline;

    async fn set(&self, sender: &Sender, guideline: Guideline) -> anyhow::Result<()>;
}

/// Guidelines kept in a JSON document, rewritten on every change.
pub struct JsonGuidelineStore {
    path: PathBuf,
    memory: RwLock<HashMap<Sender, Guideline>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonGuidelineStore {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let memory = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read guidelines from {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse guidelines in {}", path.display()))?
        } else {
            log::info!(
                "No guidelines at {}, starting with an empty store",
                path.display()
            );
            HashMap::new()
        };

        Ok(Self {
            path,
            memory: RwLock::new(memory),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn len(&self) -> usize {
        self.memory.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Replaces `path` with `content` through a sibling temporary file, so readers never
/// observe a partially written document.
pub(crate) async fn write_atomically(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, content)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl GuidelineStore for JsonGuidelineStore {
    async fn get(&self, sender: &Sender) -> Guideline {
        self.memory
            .read()
            .unwrap()
            .get(sender)
            .cloned()
            .unwrap_or_default()
    }

    async fn set(&self, sender: &Sender, guideline: Guideline) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut updated = self.memory.read().unwrap().clone();
        updated.insert(sender.clone(), guideline);
        let content = serde_json::to_vec_pretty(&updated)?;
        // Readers only see the guideline once it is on disk
        write_atomically(&self.path, &content).await?;
        *self.memory.write().unwrap() = updated;
        Ok(())
    }
}

/// In-memory guidelines, counting writes.
#[derive(Default)]
pub struct MemoryGuidelineStore {
    memory: RwLock<HashMap<Sender, Guideline>>,
    writes: AtomicUsize,
}

impl MemoryGuidelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a guideline without counting it as a write.
    pub fn with_guideline(self, sender: &str, guideline: Guideline) -> Self {
        self.memory
            .write()
            .unwrap()
            .insert(Sender::new(sender), guideline);
        self
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn guideline_of(&self, sender: &str) -> Guideline {
        self.memory
            .read()
            .unwrap()
            .get(&Sender::new(sender))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl GuidelineStore for MemoryGuidelineStore {
    async fn get(&self, sender: &Sender) -> Guideline {
        self.memory
            .read()
            .unwrap()
            .get(sender)
            .cloned()
            .unwrap_or_default()
    }

    async fn set(&self, sender: &Sender, guideline: Guideline) -> anyhow::Result<()> {
        self.memory
            .write()
            .unwrap()
            .insert(sender.clone(), guideline);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
