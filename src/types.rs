use serde::{Deserialize, Serialize};
use std::fmt;

pub type MailId = String;
pub type Folder = String;

/// Normalized sender address. Guidelines are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sender(String);

impl Sender {
    pub fn new(address: &str) -> Self {
        Sender(address.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Symbolic folder name used in configuration and guidelines.
///
/// `Inbox` is the intake folder and `ForScreening` the manual-screening bucket. Every
/// other alias is user defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FolderAlias {
    Inbox,
    ForScreening,
    Named(String),
}

impl FolderAlias {
    pub fn name(&self) -> &str {
        match self {
            FolderAlias::Inbox => "Inbox",
            FolderAlias::ForScreening => "ForScreening",
            FolderAlias::Named(name) => name,
        }
    }
}

impl From<String> for FolderAlias {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Inbox" => FolderAlias::Inbox,
            "ForScreening" => FolderAlias::ForScreening,
            _ => FolderAlias::Named(name),
        }
    }
}

impl From<&str> for FolderAlias {
    fn from(name: &str) -> Self {
        FolderAlias::from(name.to_string())
    }
}

impl From<FolderAlias> for String {
    fn from(alias: FolderAlias) -> Self {
        alias.name().to_string()
    }
}

impl fmt::Display for FolderAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Routing decision stored per sender.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Guideline {
    #[default]
    RequiresManualScreening,
    TargetFolder(FolderAlias),
}

impl fmt::Display for Guideline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guideline::RequiresManualScreening => f.write_str("RequiresManualScreening"),
            Guideline::TargetFolder(alias) => write!(f, "TargetFolder({alias})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub id: MailId,
    pub sender: Sender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailContent {
    pub id: MailId,
    pub subject: String,
    pub body: String,
}

impl MailContent {
    /// Text the classifier sees: subject and body separated by a space.
    pub fn text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }
}

/// A guideline write computed during the learn phase and applied in the persist phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidelineChange {
    pub sender: Sender,
    pub new_guideline: Guideline,
}
