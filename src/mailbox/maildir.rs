use super::{Mailbox, Result};
use crate::error::MailboxError;
use crate::types::{Mail, MailContent, MailId, Sender};
use async_trait::async_trait;
use mail_parser::MessageParser;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static MAIL_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.").unwrap());

/// File based mailbox over a Maildir++ tree.
///
/// `INBOX` maps to `<root>/cur`, every other folder to `<root>/<folder>/cur`. A mail id
/// is the message file name, which a Maildir move leaves unchanged.
pub struct MaildirMailbox {
    root: PathBuf,
}

impl MaildirMailbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn folder_path(&self, folder: &str) -> PathBuf {
        if folder.eq_ignore_ascii_case("inbox") {
            self.root.join("cur")
        } else {
            self.root.join(folder).join("cur")
        }
    }

    fn mail_number(file_name: &str) -> Option<u64> {
        MAIL_NUMBER
            .captures(file_name)
            .and_then(|caps| caps[1].parse().ok())
    }

    async fn read_mail(path: &Path, id: &str, folder: &str) -> Result<Vec<u8>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MailboxError::MailNotFound {
                    id: id.to_string(),
                    folder: folder.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn parse_sender(raw: &[u8]) -> Sender {
        MessageParser::default()
            .parse_headers(raw)
            .and_then(|message| {
                message
                    .from()
                    .and_then(|from| from.first())
                    .and_then(|addr| addr.address())
                    .map(Sender::new)
            })
            .unwrap_or_else(|| Sender::new(""))
    }
}

#[async_trait]
impl Mailbox for MaildirMailbox {
    async fn connect(&self) -> Result<()> {
        if !tokio::fs::try_exists(&self.root).await? {
            return Err(MailboxError::FolderNotFound(
                self.root.display().to_string(),
            ));
        }
        log::debug!("Opened maildir {}", self.root.display());
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn list_mail(&self, folder: &str) -> Result<Vec<Mail>> {
        log::debug!("Listing mail in {folder}");
        let path = self.folder_path(folder);
        let mut entries = match tokio::fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MailboxError::FolderNotFound(folder.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut numbered = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(number) = Self::mail_number(&file_name) else {
                continue;
            };
            let raw = match tokio::fs::read(entry.path()).await {
                Ok(raw) => raw,
                // Renamed by a mail client since the directory was read
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    log::debug!("Mail {file_name} left {folder} while listing, skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let sender = Self::parse_sender(&raw);
            if sender.is_empty() {
                log::warn!("Cannot parse sender of mail {file_name} in {folder}");
            }
            numbered.push((
                number,
                Mail {
                    id: file_name,
                    sender,
                },
            ));
        }

        numbered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(numbered.into_iter().map(|(_, mail)| mail).collect())
    }

    async fn fetch_content(&self, folder: &str, ids: &[MailId]) -> Result<Vec<MailContent>> {
        let path = self.folder_path(folder);
        let mut contents = Vec::with_capacity(ids.len());
        for id in ids {
            let raw = Self::read_mail(&path.join(id), id, folder).await?;
            let message =
                MessageParser::default()
                    .parse(&raw)
                    .ok_or_else(|| MailboxError::Parse {
                        id: id.clone(),
                        reason: "not an RFC 5322 message".to_string(),
                    })?;
            contents.push(MailContent {
                id: id.clone(),
                subject: message.subject().unwrap_or_default().to_string(),
                body: message
                    .body_text(0)
                    .map(|body| body.into_owned())
                    .unwrap_or_default(),
            });
        }
        Ok(contents)
    }

    async fn move_mail(&self, id: &MailId, from: &str, to: &str) -> Result<()> {
        log::info!("Moving mail {id} from {from} to {to}");
        let source = self.folder_path(from).join(id);
        let target_dir = self.folder_path(to);
        let target = target_dir.join(id);

        if !tokio::fs::try_exists(&source).await? {
            return Err(MailboxError::MailNotFound {
                id: id.clone(),
                folder: from.to_string(),
            });
        }
        if tokio::fs::try_exists(&target).await? {
            return Err(MailboxError::DuplicateMail {
                id: id.clone(),
                folder: to.to_string(),
            });
        }
        if !tokio::fs::try_exists(&target_dir).await? {
            return Err(MailboxError::FolderNotFound(to.to_string()));
        }

        tokio::fs::rename(&source, &target).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_mail(root: &Path, folder: &str, file: &str, from: &str, subject: &str) {
        let dir = if folder == "INBOX" {
            root.join("cur")
        } else {
            root.join(folder).join("cur")
        };
        std::fs::create_dir_all(&dir).unwrap();
        let raw = format!(
            "From: {from}\r\nTo: me@example.com\r\nSubject: {subject}\r\n\r\nBody of {subject}\r\n"
        );
        std::fs::write(dir.join(file), raw).unwrap();
    }

    fn setup() -> (TempDir, MaildirMailbox) {
        let dir = TempDir::new().unwrap();
        write_mail(dir.path(), "INBOX", "20.host:2,S", "Bob <Bob@Example.com>", "second");
        write_mail(dir.path(), "INBOX", "3.host:2,S", "alice@example.com", "first");
        std::fs::write(dir.path().join("cur").join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir_all(dir.path().join(".Newsletter").join("cur")).unwrap();
        let mailbox = MaildirMailbox::new(dir.path());
        (dir, mailbox)
    }

    #[tokio::test]
    async fn test_list_mail_orders_by_number() {
        let (_dir, mailbox) = setup();
        mailbox.connect().await.unwrap();

        let mails = mailbox.list_mail("INBOX").await.unwrap();
        assert_eq!(mails.len(), 2);
        assert_eq!(mails[0].id, "3.host:2,S");
        assert_eq!(mails[0].sender.as_str(), "alice@example.com");
        assert_eq!(mails[1].sender.as_str(), "bob@example.com");
    }

    #[tokio::test]
    async fn test_fetch_content() {
        let (_dir, mailbox) = setup();
        let contents = mailbox
            .fetch_content("inbox", &["3.host:2,S".to_string()])
            .await
            .unwrap();
        assert_eq!(contents[0].subject, "first");
        assert!(contents[0].body.contains("Body of first"));
    }

    #[tokio::test]
    async fn test_move_mail() {
        let (_dir, mailbox) = setup();
        let id = "3.host:2,S".to_string();
        mailbox.move_mail(&id, "INBOX", ".Newsletter").await.unwrap();

        assert_eq!(mailbox.list_mail("INBOX").await.unwrap().len(), 1);
        let moved = mailbox.list_mail(".Newsletter").await.unwrap();
        assert_eq!(moved[0].id, id);
    }

    #[tokio::test]
    async fn test_move_missing_mail_fails() {
        let (_dir, mailbox) = setup();
        let err = mailbox
            .move_mail(&"99.host".to_string(), "INBOX", ".Newsletter")
            .await
            .unwrap_err();
        assert!(matches!(err, MailboxError::MailNotFound { .. }));
        assert!(err.is_move_conflict());
    }

    #[tokio::test]
    async fn test_move_onto_existing_mail_fails() {
        let (dir, mailbox) = setup();
        write_mail(dir.path(), ".Newsletter", "3.host:2,S", "x@example.com", "dup");
        let err = mailbox
            .move_mail(&"3.host:2,S".to_string(), "INBOX", ".Newsletter")
            .await
            .unwrap_err();
        assert!(matches!(err, MailboxError::DuplicateMail { .. }));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_vanished_mail_is_skipped() {
        let (dir, mailbox) = setup();
        std::os::unix::fs::symlink(
            dir.path().join("gone"),
            dir.path().join("cur").join("7.host:2,S"),
        )
        .unwrap();

        let mails = mailbox.list_mail("INBOX").await.unwrap();
        let ids: Vec<_> = mails.iter().map(|mail| mail.id.as_str()).collect();
        assert_eq!(ids, vec!["3.host:2,S", "20.host:2,S"]);
    }

    #[tokio::test]
    async fn test_missing_folder() {
        let (_dir, mailbox) = setup();
        let err = mailbox.list_mail(".Nope").await.unwrap_err();
        assert!(matches!(err, MailboxError::FolderNotFound(_)));
    }

    #[tokio::test]
    async fn test_connect_requires_root() {
        let mailbox = MaildirMailbox::new("/definitely/not/a/maildir");
        assert!(mailbox.connect().await.is_err());
    }
}
