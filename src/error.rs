use thiserror::Error;

/// Errors reported by mailbox adapters.
#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("mailbox session is not connected")]
    NotConnected,

    #[error("folder not found: {0}")]
    FolderNotFound(String),

    #[error("mail {id} not found in {folder}")]
    MailNotFound { id: String, folder: String },

    #[error("mail {id} already exists in {folder}")]
    DuplicateMail { id: String, folder: String },

    #[error("cannot parse mail {id}: {reason}")]
    Parse { id: String, reason: String },

    #[error("mailbox transport failure: {0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MailboxError {
    /// True for the failures a move can report about its source or destination id.
    pub fn is_move_conflict(&self) -> bool {
        matches!(
            self,
            MailboxError::MailNotFound { .. } | MailboxError::DuplicateMail { .. }
        )
    }
}
