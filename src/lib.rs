pub mod config;
pub mod error;
pub mod guidelines;
pub mod language;
pub mod mailbox;
pub mod normalization;
pub mod scheduler;
pub mod screener;
pub mod spam;
pub mod types;

pub use config::{Config, FolderConfig, Folders, SpamConfig};
pub use error::MailboxError;
pub use guidelines::{GuidelineStore, JsonGuidelineStore, MemoryGuidelineStore};
pub use mailbox::{Mailbox, MaildirMailbox, MemoryMailbox};
pub use scheduler::Scheduler;
pub use screener::{Screener, ScreeningReport};
pub use spam::{SpamClassifier, SpamDetector, SpamTrainer};
pub use types::{FolderAlias, Guideline, GuidelineChange, Mail, MailContent, Sender};
