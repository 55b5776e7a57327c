//! Mail reconciliation
//!
//! One run snapshots every configured folder, learns sender guidelines from mail a
//! human placed in screening folders, stores the learned guidelines, and then moves
//! every mail to the folder its sender's guideline points at. Learning always
//! completes before the first move so that a guideline learned in a run is honoured by
//! the same run.

use crate::config::Folders;
use crate::guidelines::GuidelineStore;
use crate::mailbox::Mailbox;
use crate::spam::SpamClassifier;
use crate::types::{Folder, FolderAlias, Guideline, GuidelineChange, Mail, Sender};
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

type Snapshot = HashMap<Folder, Vec<Mail>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreeningReport {
    pub mails_seen: usize,
    pub guideline_changes: usize,
    pub moved: usize,
    pub failed_moves: usize,
    pub classified: usize,
}

/// Routes unknown senders' mail to a spam folder when the classifier says so.
pub struct SpamRouting {
    pub classifier: Arc<dyn SpamClassifier>,
    pub spam_folder: Folder,
}

pub struct Screener {
    folders: Folders,
    mailbox: Arc<dyn Mailbox>,
    guidelines: Arc<dyn GuidelineStore>,
    spam: Option<SpamRouting>,
}

impl Screener {
    pub fn new(
        folders: Folders,
        mailbox: Arc<dyn Mailbox>,
        guidelines: Arc<dyn GuidelineStore>,
    ) -> Self {
        Self {
            folders,
            mailbox,
            guidelines,
            spam: None,
        }
    }

    pub fn with_spam_routing(
        mut self,
        classifier: Arc<dyn SpamClassifier>,
        spam_folder: impl Into<Folder>,
    ) -> Self {
        self.spam = Some(SpamRouting {
            classifier,
            spam_folder: spam_folder.into(),
        });
        self
    }

    pub fn folders(&self) -> &Folders {
        &self.folders
    }

    /// Runs one full reconciliation. The mailbox is disconnected on every path once
    /// connected; failures are logged here and returned to the caller.
    pub async fn screen_mail(&self) -> anyhow::Result<ScreeningReport> {
        log::info!("Started screening");
        if let Err(e) = self.mailbox.connect().await {
            log::error!("Screening failed, cannot connect to mailbox: {e}");
            return Err(anyhow::Error::new(e).context("Failed to connect to mailbox"));
        }

        let result = self.reconcile().await;

        if let Err(e) = self.mailbox.disconnect().await {
            log::warn!("Failed to disconnect from mailbox: {e}");
        }

        match &result {
            Ok(report) => log::info!(
                "Screening complete: {} mails, {} guideline changes, {} moved, {} failed moves, {} classified",
                report.mails_seen,
                report.guideline_changes,
                report.moved,
                report.failed_moves,
                report.classified
            ),
            Err(e) => log::error!("Screening failed: {e:#}"),
        }
        result
    }

    async fn reconcile(&self) -> anyhow::Result<ScreeningReport> {
        let mut report = ScreeningReport::default();

        let snapshot = self.fetch().await?;
        report.mails_seen = snapshot.values().map(Vec::len).sum();

        let changes = self.learn(&snapshot).await?;
        self.persist(&changes).await?;
        report.guideline_changes = changes.len();

        self.move_all(&snapshot, &mut report).await?;
        Ok(report)
    }

    /// Folders to snapshot: every alias' primary and screening folder, then the intake.
    fn fetch_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::new();
        let candidates = self
            .folders
            .iter()
            .flat_map(|entry| [entry.folder.as_str(), entry.screening_folder()])
            .chain(std::iter::once(self.folders.intake_folder()));
        for folder in candidates {
            if !order.contains(&folder) {
                order.push(folder);
            }
        }
        order
    }

    /// Folders whose mail gets routed: every alias' screening folder, then the intake.
    fn move_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::new();
        let candidates = self
            .folders
            .iter()
            .map(|entry| entry.screening_folder())
            .chain(std::iter::once(self.folders.intake_folder()));
        for folder in candidates {
            if !order.contains(&folder) {
                order.push(folder);
            }
        }
        order
    }

    // The session holds one open folder at a time, so listing stays sequential
    async fn fetch(&self) -> anyhow::Result<Snapshot> {
        let mut snapshot = Snapshot::new();
        for folder in self.fetch_order() {
            let mails = self
                .mailbox
                .list_mail(folder)
                .await
                .with_context(|| format!("Failed to list mail in {folder}"))?;
            log::debug!("{} mails in {folder}", mails.len());
            snapshot.insert(folder.to_string(), mails);
        }
        Ok(snapshot)
    }

    async fn learn(&self, snapshot: &Snapshot) -> anyhow::Result<Vec<GuidelineChange>> {
        let intake = self.folders.intake_folder();
        let mut lookups = JoinSet::new();
        let mut spawned = 0usize;

        for entry in self.folders.iter() {
            // Manual screening is the default placement, not a taught preference
            if entry.alias == FolderAlias::ForScreening {
                continue;
            }
            let folder = entry.screening_folder();
            if folder == intake {
                continue;
            }
            let Some(mails) = snapshot.get(folder) else {
                continue;
            };

            let taught = Guideline::TargetFolder(entry.alias.clone());
            for mail in mails {
                if mail.sender.is_empty() {
                    log::warn!(
                        "Mail {} in {folder} has no sender, not learning from it",
                        mail.id
                    );
                    continue;
                }
                let guidelines = Arc::clone(&self.guidelines);
                let sender = mail.sender.clone();
                let taught = taught.clone();
                let position = spawned;
                spawned += 1;
                lookups.spawn(async move {
                    let current = guidelines.get(&sender).await;
                    let change = (current != taught).then_some(GuidelineChange {
                        sender,
                        new_guideline: taught,
                    });
                    (position, change)
                });
            }
        }

        let mut observed = Vec::new();
        while let Some(joined) = lookups.join_next().await {
            let (position, change) = joined.context("Guideline lookup task failed")?;
            if let Some(change) = change {
                observed.push((position, change));
            }
        }
        observed.sort_by_key(|(position, _)| *position);

        Ok(Self::merge_changes(observed.into_iter().map(|(_, change)| change)))
    }

    /// One change per sender; the last observation in configuration order wins.
    fn merge_changes(observed: impl Iterator<Item = GuidelineChange>) -> Vec<GuidelineChange> {
        let mut changes: Vec<GuidelineChange> = Vec::new();
        let mut index: HashMap<Sender, usize> = HashMap::new();
        for change in observed {
            match index.get(&change.sender) {
                Some(&existing) => {
                    if changes[existing].new_guideline != change.new_guideline {
                        log::warn!(
                            "Sender {} was placed in conflicting folders, keeping {}",
                            change.sender,
                            change.new_guideline
                        );
                    }
                    changes[existing] = change;
                }
                None => {
                    index.insert(change.sender.clone(), changes.len());
                    changes.push(change);
                }
            }
        }
        changes
    }

    async fn persist(&self, changes: &[GuidelineChange]) -> anyhow::Result<()> {
        for change in changes {
            log::info!(
                "Learned guideline {} for {}",
                change.new_guideline,
                change.sender
            );
            self.guidelines
                .set(&change.sender, change.new_guideline.clone())
                .await
                .with_context(|| format!("Failed to store guideline for {}", change.sender))?;
        }
        Ok(())
    }

    async fn move_all(
        &self,
        snapshot: &Snapshot,
        report: &mut ScreeningReport,
    ) -> anyhow::Result<()> {
        for folder in self.move_order() {
            let Some(mails) = snapshot.get(folder) else {
                continue;
            };
            for mail in mails {
                let destination = self.destination(folder, mail, report).await?;
                if destination == folder {
                    continue;
                }
                match self.mailbox.move_mail(&mail.id, folder, &destination).await {
                    Ok(()) => {
                        log::info!(
                            "Moved mail {} from {} ({folder}) to {destination}",
                            mail.id,
                            mail.sender
                        );
                        report.moved += 1;
                    }
                    Err(e) if e.is_move_conflict() => {
                        log::warn!(
                            "Skipped mail {} from {} ({folder} to {destination}): {e}",
                            mail.id,
                            mail.sender
                        );
                        report.failed_moves += 1;
                    }
                    Err(e) => {
                        log::error!(
                            "Failed to move mail {} from {} ({folder} to {destination}): {e}",
                            mail.id,
                            mail.sender
                        );
                        report.failed_moves += 1;
                    }
                }
            }
        }
        Ok(())
    }

    async fn destination(
        &self,
        folder: &str,
        mail: &Mail,
        report: &mut ScreeningReport,
    ) -> anyhow::Result<Folder> {
        let guideline = if mail.sender.is_empty() {
            Guideline::RequiresManualScreening
        } else {
            self.guidelines.get(&mail.sender).await
        };

        if let Guideline::TargetFolder(alias) = &guideline {
            match self.folders.get(alias) {
                Some(entry) => return Ok(entry.folder.clone()),
                None => log::warn!(
                    "Guideline of {} names unconfigured alias {alias}, screening manually",
                    mail.sender
                ),
            }
        }
        self.screening_destination(folder, mail, report).await
    }

    async fn screening_destination(
        &self,
        folder: &str,
        mail: &Mail,
        report: &mut ScreeningReport,
    ) -> anyhow::Result<Folder> {
        let manual = self.folders.for_screening().folder.clone();
        let Some(spam) = &self.spam else {
            return Ok(manual);
        };
        let scans = self
            .folders
            .owner_of(folder)
            .map_or(true, |entry| entry.scans_for_spam());
        if !scans {
            return Ok(manual);
        }

        let content = self
            .mailbox
            .fetch_content(folder, std::slice::from_ref(&mail.id))
            .await
            .with_context(|| {
                format!(
                    "Failed to fetch mail {} from {} in {folder} for classification",
                    mail.id, mail.sender
                )
            })?
            .into_iter()
            .next()
            .with_context(|| format!("Mail {} is missing from {folder}", mail.id))?;

        report.classified += 1;
        if spam.classifier.is_spam(&content) {
            log::info!(
                "Mail {} from {} ({:?}) classified as spam",
                mail.id,
                mail.sender,
                content.subject
            );
            Ok(spam.spam_folder.clone())
        } else {
            Ok(manual)
        }
    }
}
