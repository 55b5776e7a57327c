//! Mailbox session abstraction
//!
//! A mailbox is a stateful, single-connection session: callers must issue one
//! operation at a time and must `connect` before anything else.

use crate::error::MailboxError;
use crate::types::{Mail, MailContent, MailId};
use async_trait::async_trait;

pub mod maildir;
pub mod memory;

pub use maildir::MaildirMailbox;
pub use memory::MemoryMailbox;

pub type Result<T> = std::result::Result<T, MailboxError>;

#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Mail currently in `folder`, oldest first.
    async fn list_mail(&self, folder: &str) -> Result<Vec<Mail>>;

    async fn fetch_content(&self, folder: &str, ids: &[MailId]) -> Result<Vec<MailContent>>;

    /// Fails with `MailNotFound` when the id is gone from `from`, and with
    /// `DuplicateMail` when `to` already holds it.
    async fn move_mail(&self, id: &MailId, from: &str, to: &str) -> Result<()>;
}
