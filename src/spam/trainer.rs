use super::classifier::SpamDetector;
use super::store::SpamTrainingStore;
use super::{SpamTraining, TrainingDataset};
use crate::config::{Folders, SpamConfig};
use crate::mailbox::Mailbox;
use crate::types::{Folder, Mail, MailContent, MailId};
use anyhow::Context;
use std::sync::Arc;

/// Mail fetched per content request while training.
pub const TRAINING_CHUNK_SIZE: usize = 25;

/// Where each corpus is trained from.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSources {
    pub ham: Vec<Folder>,
    pub spam: Vec<Folder>,
    pub max_dataset_size: Option<usize>,
}

impl TrainingSources {
    pub fn from_config(spam: &SpamConfig, folders: &Folders) -> Self {
        let mut ham = vec![spam.reference_folder.clone()];
        for entry in folders.iter().filter(|e| e.is_training_source()) {
            if !ham.contains(&entry.folder) {
                ham.push(entry.folder.clone());
            }
        }
        Self {
            ham,
            spam: vec![spam.spam_folder.clone()],
            max_dataset_size: spam.max_dataset_size,
        }
    }
}

/// One row of a folder check.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderCheck {
    pub id: MailId,
    pub subject: String,
    pub is_spam: bool,
}

pub struct SpamTrainer {
    mailbox: Arc<dyn Mailbox>,
    store: Arc<dyn SpamTrainingStore>,
    detector: Arc<SpamDetector>,
    sources: TrainingSources,
}

impl SpamTrainer {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        store: Arc<dyn SpamTrainingStore>,
        detector: Arc<SpamDetector>,
        sources: TrainingSources,
    ) -> Self {
        Self {
            mailbox,
            store,
            detector,
            sources,
        }
    }

    /// Rebuilds both corpora from their folders, persists them and hands them to the
    /// detector.
    pub async fn train(&self) -> anyhow::Result<SpamTraining> {
        log::info!("Training spam detector");
        self.mailbox
            .connect()
            .await
            .context("Failed to connect to mailbox")?;
        let result = self.build().await;
        if let Err(e) = self.mailbox.disconnect().await {
            log::warn!("Failed to disconnect from mailbox after training: {e}");
        }
        let training = result?;

        self.store
            .save(&training)
            .await
            .context("Failed to save spam training")?;
        self.detector.update(training.clone());
        log::info!("Done training spam detector");
        Ok(training)
    }

    async fn build(&self) -> anyhow::Result<SpamTraining> {
        let spam = self.train_corpus("spam", &self.sources.spam).await?;
        let ham = self.train_corpus("ham", &self.sources.ham).await?;
        Ok(SpamTraining { ham, spam })
    }

    fn cap_reached(&self, dataset: &TrainingDataset) -> bool {
        self.sources
            .max_dataset_size
            .is_some_and(|max| dataset.dataset_size >= max)
    }

    async fn train_corpus(
        &self,
        name: &str,
        folders: &[Folder],
    ) -> anyhow::Result<TrainingDataset> {
        let mut dataset = TrainingDataset::default();

        for folder in folders {
            let mut mails = self
                .mailbox
                .list_mail(folder)
                .await
                .with_context(|| format!("Failed to list {name} training folder {folder}"))?;
            // Newest mail first
            mails.reverse();

            for (index, chunk) in mails.chunks(TRAINING_CHUNK_SIZE).enumerate() {
                if self.cap_reached(&dataset) {
                    log::info!(
                        "{name} corpus reached {} messages, stopping",
                        dataset.dataset_size
                    );
                    return Ok(dataset);
                }

                let start = index * TRAINING_CHUNK_SIZE;
                log::debug!(
                    "Processing {name} chunk {start} to {} of {} in {folder}",
                    start + chunk.len(),
                    mails.len()
                );
                match self.fetch_chunk(folder, chunk).await {
                    Ok(contents) => {
                        for content in contents {
                            if self.cap_reached(&dataset) {
                                break;
                            }
                            dataset.add_message(&self.detector.tokenize(&content.text()));
                        }
                    }
                    Err(e) => log::error!(
                        "Skipping {name} chunk {start} to {} in {folder}: {e:#}",
                        start + chunk.len()
                    ),
                }
            }
        }

        log::info!(
            "{name} corpus: {} messages, {} chains",
            dataset.dataset_size,
            dataset.chain_weights.len()
        );
        Ok(dataset)
    }

    async fn fetch_chunk(&self, folder: &str, chunk: &[Mail]) -> anyhow::Result<Vec<MailContent>> {
        let ids: Vec<MailId> = chunk.iter().map(|mail| mail.id.clone()).collect();
        let contents = self.mailbox.fetch_content(folder, &ids).await?;
        Ok(contents)
    }

    /// Classifies every mail in `folder` with the current corpora.
    pub async fn check_folder(&self, folder: &str) -> anyhow::Result<Vec<FolderCheck>> {
        self.mailbox
            .connect()
            .await
            .context("Failed to connect to mailbox")?;
        let result = self.classify_folder(folder).await;
        if let Err(e) = self.mailbox.disconnect().await {
            log::warn!("Failed to disconnect from mailbox after folder check: {e}");
        }
        result
    }

    async fn classify_folder(&self, folder: &str) -> anyhow::Result<Vec<FolderCheck>> {
        let mails = self
            .mailbox
            .list_mail(folder)
            .await
            .with_context(|| format!("Failed to list {folder}"))?;
        let mut rows = Vec::with_capacity(mails.len());

        for (index, chunk) in mails.chunks(TRAINING_CHUNK_SIZE).enumerate() {
            match self.fetch_chunk(folder, chunk).await {
                Ok(contents) => rows.extend(contents.into_iter().map(|content| FolderCheck {
                    is_spam: self.detector.analyze(&content).is_spam,
                    id: content.id,
                    subject: content.subject,
                })),
                Err(e) => log::error!(
                    "Skipping chunk {} in {folder}: {e:#}",
                    index * TRAINING_CHUNK_SIZE
                ),
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, FolderConfig};
    use crate::mailbox::MemoryMailbox;
    use crate::spam::store::MemoryTrainingStore;
    use crate::types::FolderAlias;

    fn sources(max: Option<usize>) -> TrainingSources {
        TrainingSources {
            ham: vec![".Reference".to_string()],
            spam: vec![".Junk".to_string()],
            max_dataset_size: max,
        }
    }

    fn setup(max: Option<usize>) -> (Arc<MemoryMailbox>, Arc<MemoryTrainingStore>, SpamTrainer) {
        let mailbox = Arc::new(MemoryMailbox::new());
        for i in 0..30 {
            mailbox.add_mail(
                ".Reference",
                "colleague@work.example",
                &format!("Project status report number {i}"),
                "Please review the attached planning document before the meeting",
            );
        }
        for i in 0..3 {
            mailbox.add_mail(
                ".Junk",
                "promo@spam.example",
                &format!("Cheap replica watches offer {i}"),
                "Huge discounts buy today limited offer",
            );
        }
        mailbox.add_mail(".Junk", "promo@spam.example", "!!!", "$$$");

        let store = Arc::new(MemoryTrainingStore::new());
        let detector = Arc::new(SpamDetector::new(SpamTraining::default()));
        let trainer = SpamTrainer::new(mailbox.clone(), store.clone(), detector, sources(max));
        (mailbox, store, trainer)
    }

    #[tokio::test]
    async fn test_train_builds_and_saves_both_corpora() {
        let (mailbox, store, trainer) = setup(None);
        let training = trainer.train().await.unwrap();

        assert_eq!(training.ham.dataset_size, 30);
        // The message without tokens does not count
        assert_eq!(training.spam.dataset_size, 3);
        assert_eq!(store.saved().unwrap(), training);
        assert_eq!(trainer.detector.dataset_sizes(), (30, 3));
        assert_eq!(mailbox.connects(), 1);
        assert_eq!(mailbox.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_dataset_cap_stops_early() {
        let (_mailbox, _store, trainer) = setup(Some(10));
        let training = trainer.train().await.unwrap();
        assert_eq!(training.ham.dataset_size, 10);
        assert_eq!(training.spam.dataset_size, 3);
    }

    #[tokio::test]
    async fn test_failed_listing_aborts_and_disconnects() {
        let (mailbox, store, trainer) = setup(None);
        mailbox.fail_folder(".Junk");
        assert!(trainer.train().await.is_err());
        assert!(store.saved().is_none());
        assert!(!mailbox.is_connected());
    }

    #[tokio::test]
    async fn test_failed_chunk_is_skipped() {
        let (mailbox, store, trainer) = setup(None);
        mailbox.connect().await.unwrap();
        let newest = mailbox.list_mail(".Reference").await.unwrap().pop().unwrap();
        mailbox.disconnect().await.unwrap();
        mailbox.fail_fetch_of(&newest.id);

        let training = trainer.train().await.unwrap();

        // The first chunk of 25 holds the newest mail; the remaining 5 still train
        assert_eq!(training.ham.dataset_size, 5);
        assert_eq!(training.spam.dataset_size, 3);
        assert_eq!(store.saved().unwrap(), training);
        assert!(!mailbox.is_connected());
    }

    #[tokio::test]
    async fn test_check_folder_after_training() {
        let (_mailbox, _store, trainer) = setup(None);
        trainer.train().await.unwrap();

        let rows = trainer.check_folder(".Junk").await.unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|row| row.is_spam));
    }

    #[test]
    fn test_sources_from_config() {
        let mut config = Config::default();
        config
            .folders
            .push(FolderConfig::new("Archive", ".Reference").with_use_for_training(true));
        config
            .folders
            .push(FolderConfig::new("Friends", ".Friends").with_use_for_training(true));
        let folders = config.folders().unwrap();
        let sources = TrainingSources::from_config(config.spam.as_ref().unwrap(), &folders);

        assert_eq!(sources.ham, vec![".Reference", ".Friends"]);
        assert_eq!(sources.spam, vec![".Junk"]);
        assert_eq!(sources.max_dataset_size, Some(2000));
        assert!(folders.get(&FolderAlias::from("Friends")).is_some());
    }
}
