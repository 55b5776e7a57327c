use crate::types::{Folder, FolderAlias};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mailbox: MailboxConfig,
    pub storage_folder: PathBuf,
    #[serde(default = "default_screening_interval")]
    pub screening_interval_seconds: u64,
    pub folders: Vec<FolderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spam: Option<SpamConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Root of a Maildir++ tree.
    pub maildir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderConfig {
    pub alias: FolderAlias,
    pub folder: Folder,
    // Folders without a separate staging area screen in the folder itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screening_folder: Option<Folder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_for_spam: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_for_training: Option<bool>,
}

impl FolderConfig {
    pub fn new(alias: impl Into<FolderAlias>, folder: &str) -> Self {
        Self {
            alias: alias.into(),
            folder: folder.to_string(),
            screening_folder: None,
            scan_for_spam: None,
            use_for_training: None,
        }
    }

    pub fn with_screening_folder(mut self, screening_folder: &str) -> Self {
        self.screening_folder = Some(screening_folder.to_string());
        self
    }

    pub fn with_scan_for_spam(mut self, scan: bool) -> Self {
        self.scan_for_spam = Some(scan);
        self
    }

    pub fn with_use_for_training(mut self, use_for_training: bool) -> Self {
        self.use_for_training = Some(use_for_training);
        self
    }

    pub fn screening_folder(&self) -> &str {
        self.screening_folder.as_deref().unwrap_or(&self.folder)
    }

    pub fn has_separate_screening_folder(&self) -> bool {
        self.screening_folder() != self.folder
    }

    pub fn scans_for_spam(&self) -> bool {
        self.scan_for_spam.unwrap_or(true)
    }

    pub fn is_training_source(&self) -> bool {
        self.use_for_training.unwrap_or(false)
    }

    fn contains(&self, folder: &str) -> bool {
        self.folder == folder || self.screening_folder() == folder
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamConfig {
    pub reference_folder: Folder,
    pub spam_folder: Folder,
    #[serde(default = "default_training_interval")]
    pub training_interval_hours: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dataset_size: Option<usize>,
}

fn default_screening_interval() -> u64 {
    20
}

fn default_training_interval() -> u64 {
    24
}

/// Validated folder layout. Both reserved aliases are guaranteed to be present.
#[derive(Debug, Clone)]
pub struct Folders {
    entries: Vec<FolderConfig>,
    inbox: usize,
    for_screening: usize,
}

impl Folders {
    pub fn new(entries: Vec<FolderConfig>) -> anyhow::Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.alias.clone()) {
                bail!("Folder alias '{}' is configured more than once", entry.alias);
            }
            if entry.alias.name().trim().is_empty() {
                bail!("Folder alias must not be empty");
            }
            if entry.folder.trim().is_empty() {
                bail!("Alias '{}' has an empty folder", entry.alias);
            }
            if entry.screening_folder().trim().is_empty() {
                bail!("Alias '{}' has an empty screening folder", entry.alias);
            }
        }

        let position = |alias: &FolderAlias| entries.iter().position(|e| &e.alias == alias);
        let inbox = position(&FolderAlias::Inbox)
            .context("Reserved folder alias 'Inbox' is not configured")?;
        let for_screening = position(&FolderAlias::ForScreening)
            .context("Reserved folder alias 'ForScreening' is not configured")?;

        Ok(Self {
            entries,
            inbox,
            for_screening,
        })
    }

    /// All aliases in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &FolderConfig> {
        self.entries.iter()
    }

    pub fn get(&self, alias: &FolderAlias) -> Option<&FolderConfig> {
        self.entries.iter().find(|e| &e.alias == alias)
    }

    pub fn inbox(&self) -> &FolderConfig {
        &self.entries[self.inbox]
    }

    pub fn for_screening(&self) -> &FolderConfig {
        &self.entries[self.for_screening]
    }

    /// The intake folder.
    pub fn intake_folder(&self) -> &str {
        &self.inbox().folder
    }

    /// Alias owning `folder` as its primary or screening folder, if any.
    pub fn owner_of(&self, folder: &str) -> Option<&FolderConfig> {
        self.entries.iter().find(|e| e.contains(folder))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mailbox: MailboxConfig {
                maildir: PathBuf::from("/home/user/Maildir"),
            },
            storage_folder: PathBuf::from("/var/lib/screenr"),
            screening_interval_seconds: default_screening_interval(),
            folders: vec![
                FolderConfig::new(FolderAlias::Inbox, "INBOX"),
                FolderConfig::new(FolderAlias::ForScreening, ".ForScreening")
                    .with_scan_for_spam(false),
                FolderConfig::new("Newsletter", ".Newsletter")
                    .with_screening_folder(".Screening.Newsletter"),
                FolderConfig::new("Reference", ".Reference")
                    .with_screening_folder(".Screening.Reference")
                    .with_use_for_training(true),
                FolderConfig::new("Rejected", ".Rejected")
                    .with_screening_folder(".Screening.Rejected"),
            ],
            spam: Some(SpamConfig {
                reference_folder: ".Reference".to_string(),
                spam_folder: ".Junk".to_string(),
                training_interval_hours: default_training_interval(),
                max_dataset_size: Some(2000),
            }),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {path}"))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {path}"))?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn folders(&self) -> anyhow::Result<Folders> {
        Folders::new(self.folders.clone())
    }

    pub fn guidelines_path(&self) -> PathBuf {
        self.storage_folder.join("senders.json")
    }

    pub fn training_path(&self) -> PathBuf {
        self.storage_folder.join("spam-training.json")
    }

    pub fn maildir(&self) -> &Path {
        &self.mailbox.maildir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
mailbox:
  maildir: /tmp/Maildir
storage_folder: /tmp/screenr
folders:
  - { alias: Inbox, folder: INBOX }
  - { alias: ForScreening, folder: .ForScreening, scan_for_spam: false }
  - { alias: Newsletter, folder: .Newsletter, screening_folder: .Screening.Newsletter }
spam:
  reference_folder: .Reference
  spam_folder: .Junk
"#;

    #[test]
    fn test_parse_sample_config() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.screening_interval_seconds, 20);
        assert_eq!(config.folders.len(), 3);

        let spam = config.spam.as_ref().unwrap();
        assert_eq!(spam.training_interval_hours, 24);
        assert_eq!(spam.max_dataset_size, None);

        let folders = config.folders().unwrap();
        assert_eq!(folders.intake_folder(), "INBOX");
        assert!(!folders.for_screening().scans_for_spam());

        let newsletter = folders.get(&FolderAlias::from("Newsletter")).unwrap();
        assert_eq!(newsletter.screening_folder(), ".Screening.Newsletter");
        assert!(newsletter.has_separate_screening_folder());
        assert!(!folders.inbox().has_separate_screening_folder());
    }

    #[test]
    fn test_missing_reserved_alias_is_rejected() {
        let result = Folders::new(vec![FolderConfig::new(FolderAlias::Inbox, "INBOX")]);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("ForScreening"), "{err}");
    }

    #[test]
    fn test_duplicate_alias_is_rejected() {
        let result = Folders::new(vec![
            FolderConfig::new(FolderAlias::Inbox, "INBOX"),
            FolderConfig::new(FolderAlias::ForScreening, ".ForScreening"),
            FolderConfig::new("Newsletter", ".Newsletter"),
            FolderConfig::new("Newsletter", ".News"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_folder_is_rejected() {
        let result = Folders::new(vec![
            FolderConfig::new(FolderAlias::Inbox, "INBOX"),
            FolderConfig::new(FolderAlias::ForScreening, "  "),
        ]);
        assert!(result.is_err());

        let result = Folders::new(vec![
            FolderConfig::new(FolderAlias::Inbox, "INBOX").with_screening_folder(""),
            FolderConfig::new(FolderAlias::ForScreening, ".ForScreening"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_owner_of_folder() {
        let folders = Config::default().folders().unwrap();
        assert_eq!(
            folders.owner_of(".Screening.Newsletter").unwrap().alias,
            FolderAlias::from("Newsletter")
        );
        assert_eq!(folders.owner_of("INBOX").unwrap().alias, FolderAlias::Inbox);
        assert!(folders.owner_of(".Junk").is_none());
    }

    #[test]
    fn test_default_config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.folders, config.folders);
        assert!(parsed.folders().is_ok());
    }
}
