use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Lines, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::auth::repo_types::Credential;
use crate::error::{MalformedRecord, StoreError};
use crate::source::{CredentialIter, CredentialSource};

/// Line-oriented `username, hash` file kept from before the users table.
///
/// Appends take no lock; only one writer may touch the file at a time.
#[derive(Debug, Clone)]
pub struct LegacyFileStore {
    path: PathBuf,
}

impl LegacyFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan every non-blank line. Malformed lines are reported as
    /// [`StoreError::Malformed`] and the scan continues. A missing file is an
    /// empty store.
    pub fn entries(&self) -> Result<LegacyEntries, StoreError> {
        let lines = match File::open(&self.path) {
            Ok(file) => Some(BufReader::new(file).lines()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(LegacyEntries { lines, line_no: 0 })
    }

    /// Well-formed records only; malformed lines are skipped silently.
    pub fn read_all(&self) -> Result<impl Iterator<Item = Result<Credential, StoreError>>, StoreError> {
        Ok(self
            .entries()?
            .filter(|entry| !matches!(entry, Err(StoreError::Malformed(_)))))
    }

    /// First record for `username`, if any.
    pub fn find(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        for entry in self.read_all()? {
            let credential = entry?;
            if credential.username == username {
                return Ok(Some(credential));
            }
        }
        Ok(None)
    }

    pub fn exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.find(username)?.is_some())
    }

    /// Add one line. Does not check for an existing username.
    ///
    /// Values that would not read back unchanged (a comma or line break in
    /// the username, a line break in the hash, surrounding whitespace) are
    /// refused with [`StoreError::Unrepresentable`].
    pub fn append(&self, username: &str, password_hash: &str) -> Result<(), StoreError> {
        check_field(username, "username", &[',', '\n', '\r'])?;
        check_field(password_hash, "password hash", &['\n', '\r'])?;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        // hand-edited files may lack the final newline
        let len = file.metadata()?.len();
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }

        writeln!(file, "{username}, {password_hash}")?;
        debug!(path = %self.path.display(), %username, "legacy credential appended");
        Ok(())
    }
}

fn check_field(value: &str, what: &str, forbidden: &[char]) -> Result<(), StoreError> {
    if value.is_empty() || value.trim() != value || value.contains(forbidden) {
        return Err(StoreError::Unrepresentable(format!(
            "{what} {value:?} cannot be stored in the legacy file"
        )));
    }
    Ok(())
}

/// Lazy iterator returned by [`LegacyFileStore::entries`].
pub struct LegacyEntries {
    lines: Option<Lines<BufReader<File>>>,
    line_no: usize,
}

impl Iterator for LegacyEntries {
    type Item = Result<Credential, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.as_mut()?.next()?;
            self.line_no += 1;
            match line {
                Ok(text) if text.trim().is_empty() => continue,
                Ok(text) => {
                    return Some(parse_line(&text, self.line_no).map_err(StoreError::Malformed))
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    return Some(Err(StoreError::Malformed(MalformedRecord {
                        line: self.line_no,
                        reason: "not valid UTF-8",
                    })))
                }
                Err(e) => {
                    self.lines = None;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Split on the first comma only: PHC hashes contain commas themselves.
fn parse_line(text: &str, line: usize) -> Result<Credential, MalformedRecord> {
    let (username, hash) = text.split_once(',').ok_or(MalformedRecord {
        line,
        reason: "missing comma separator",
    })?;
    let (username, hash) = (username.trim(), hash.trim());
    if username.is_empty() {
        return Err(MalformedRecord { line, reason: "empty username" });
    }
    if hash.is_empty() {
        return Err(MalformedRecord { line, reason: "empty password hash" });
    }
    Ok(Credential {
        username: username.to_string(),
        password_hash: hash.to_string(),
    })
}

#[async_trait]
impl CredentialSource for LegacyFileStore {
    fn name(&self) -> &'static str {
        "legacy credential file"
    }

    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        self.find(username)
    }

    async fn credentials(&self) -> Result<CredentialIter, StoreError> {
        Ok(Box::new(self.entries()?))
    }

    async fn insert_credential_if_absent(
        &self,
        credential: &Credential,
        _role: &str,
    ) -> Result<bool, StoreError> {
        if self.exists(&credential.username)? {
            return Ok(false);
        }
        self.append(&credential.username, &credential.password_hash)?;
        Ok(true)
    }
}
