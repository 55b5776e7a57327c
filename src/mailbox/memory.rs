use super::{Mailbox, Result};
use crate::error::MailboxError;
use crate::types::{Mail, MailContent, MailId, Sender};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredMail {
    uid: u64,
    sender: Sender,
    subject: String,
    body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub id: MailId,
    pub from: String,
    pub to: String,
}

#[derive(Default)]
struct State {
    connected: bool,
    next_uid: u64,
    folders: BTreeMap<String, Vec<StoredMail>>,
    moves: Vec<MoveRecord>,
    connects: usize,
    disconnects: usize,
    failing_moves: HashSet<MailId>,
    failing_folders: HashSet<String>,
    failing_fetches: HashSet<MailId>,
}

/// In-process mailbox behaving like an IMAP session: ids are UIDs, a move assigns a
/// new UID in the destination, and every call needs an open session.
#[derive(Default)]
pub struct MemoryMailbox {
    state: Mutex<State>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_folder(&self, folder: &str) {
        let mut state = self.state.lock().unwrap();
        state.folders.entry(folder.to_string()).or_default();
    }

    /// Appends a mail to `folder` (creating it) and returns its id.
    pub fn add_mail(&self, folder: &str, sender: &str, subject: &str, body: &str) -> MailId {
        let mut state = self.state.lock().unwrap();
        state.next_uid += 1;
        let uid = state.next_uid;
        state
            .folders
            .entry(folder.to_string())
            .or_default()
            .push(StoredMail {
                uid,
                sender: Sender::new(sender),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        uid.to_string()
    }

    /// Senders of the mail currently in `folder`, oldest first.
    pub fn senders_in(&self, folder: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .folders
            .get(folder)
            .map(|mails| mails.iter().map(|m| m.sender.to_string()).collect())
            .unwrap_or_default()
    }

    pub fn moves(&self) -> Vec<MoveRecord> {
        self.state.lock().unwrap().moves.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    /// Makes every move of mail `id` fail.
    pub fn fail_moves_of(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_moves
            .insert(id.to_string());
    }

    /// Makes listing and fetching in `folder` fail with a transport error.
    pub fn fail_folder(&self, folder: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_folders
            .insert(folder.to_string());
    }

    /// Makes every content fetch that includes mail `id` fail, leaving listing intact.
    pub fn fail_fetch_of(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_fetches
            .insert(id.to_string());
    }

    fn open<'a>(state: &'a State, folder: &str) -> Result<&'a Vec<StoredMail>> {
        if !state.connected {
            return Err(MailboxError::NotConnected);
        }
        if state.failing_folders.contains(folder) {
            return Err(MailboxError::Transport(format!("cannot open {folder}")));
        }
        state
            .folders
            .get(folder)
            .ok_or_else(|| MailboxError::FolderNotFound(folder.to_string()))
    }
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    async fn connect(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.connected = true;
        state.connects += 1;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.disconnects += 1;
        Ok(())
    }

    async fn list_mail(&self, folder: &str) -> Result<Vec<Mail>> {
        let state = self.state.lock().unwrap();
        let mails = Self::open(&state, folder)?;
        Ok(mails
            .iter()
            .map(|m| Mail {
                id: m.uid.to_string(),
                sender: m.sender.clone(),
            })
            .collect())
    }

    async fn fetch_content(&self, folder: &str, ids: &[MailId]) -> Result<Vec<MailContent>> {
        let state = self.state.lock().unwrap();
        let mails = Self::open(&state, folder)?;
        if let Some(id) = ids.iter().find(|id| state.failing_fetches.contains(*id)) {
            return Err(MailboxError::Transport(format!("fetch of {id} refused")));
        }
        ids.iter()
            .map(|id| {
                mails
                    .iter()
                    .find(|m| &m.uid.to_string() == id)
                    .map(|m| MailContent {
                        id: id.clone(),
                        subject: m.subject.clone(),
                        body: m.body.clone(),
                    })
                    .ok_or_else(|| MailboxError::MailNotFound {
                        id: id.clone(),
                        folder: folder.to_string(),
                    })
            })
            .collect()
    }

    async fn move_mail(&self, id: &MailId, from: &str, to: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::open(&state, from)?;
        if !state.folders.contains_key(to) {
            return Err(MailboxError::FolderNotFound(to.to_string()));
        }
        if state.failing_moves.contains(id) {
            return Err(MailboxError::Transport(format!("move of {id} refused")));
        }

        let Some(source) = state.folders.get_mut(from) else {
            return Err(MailboxError::FolderNotFound(from.to_string()));
        };
        let position = source
            .iter()
            .position(|m| &m.uid.to_string() == id)
            .ok_or_else(|| MailboxError::MailNotFound {
                id: id.clone(),
                folder: from.to_string(),
            })?;
        let mut mail = source.remove(position);

        state.next_uid += 1;
        mail.uid = state.next_uid;
        state.folders.entry(to.to_string()).or_default().push(mail);
        state.moves.push(MoveRecord {
            id: id.clone(),
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }
}
