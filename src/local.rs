//! Filesystem backend: a local directory plays the remote root.

use std::path::{Path, PathBuf};

use crate::{
    credentials::Credentials,
    error::{Error, ErrorKind, Result},
    fs::{DirEntry, Metadata, ReadDir},
    stream::{ConnectionStream, LastError, INVALID_FILE_SIZE},
    utils::{self, Mask},
};

#[derive(Debug)]
struct Session {
    root: PathBuf,
    cwd: String,
}

impl Session {
    /// Maps a remote path onto the root; `..` never climbs out of it.
    fn path(&self, path: &str) -> PathBuf {
        let resolved = utils::resolve(&self.cwd, path);
        self.root.join(resolved.trim_start_matches('/'))
    }
}

/// [`ConnectionStream`] over a local directory.
///
/// The credentials' host is the root directory, optionally written as a
/// `file://` URL. User, password and port are ignored.
#[derive(Debug, Default)]
pub struct LocalStream {
    session: Option<Session>,
    last_error: LastError,
}

impl LocalStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or_else(Error::not_connected)
    }

    fn path(&self, path: &str) -> Result<PathBuf> {
        Ok(self.session()?.path(path))
    }

    async fn open(credentials: &Credentials) -> Result<Session> {
        let host = credentials.host();
        let root = Path::new(host.strip_prefix("file://").unwrap_or(host));
        if host.trim().is_empty() {
            return Err(Error::new(ErrorKind::NetworkUnreachable, "empty root path"));
        }

        let metadata = tokio::fs::metadata(root).await?;
        if !metadata.is_dir() {
            return Err(Error::new(
                ErrorKind::NetworkUnreachable,
                format!("'{}' is not a directory", root.display()),
            ));
        }

        Ok(Session {
            root: tokio::fs::canonicalize(root).await?,
            cwd: "/".to_owned(),
        })
    }

    async fn find(&self, pattern: &str) -> Result<ReadDir> {
        let (dir, mask) = utils::split_pattern(pattern);
        let dir = self.path(dir.unwrap_or("."))?;
        let mask = Mask::new(mask)?;

        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ReadDir::default())
            }
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !mask.matches(&name) {
                continue;
            }
            let metadata = entry.metadata().await.ok().map(|m| Metadata::from(&m));
            entries.push(DirEntry::new(name, metadata));
        }
        entries.sort_by(|a, b| a.file_name().cmp(b.file_name()));

        Ok(entries.into_iter().collect())
    }

    async fn try_upload(&self, local_path: &str, remote_name: &str) -> Result<()> {
        let remote = self.path(utils::target_name(remote_name, local_path))?;
        if tokio::fs::metadata(&remote).await.is_ok_and(|m| m.is_dir()) {
            return Err(Error::conflict(format!("'{remote_name}' is a directory")));
        }
        let copied = tokio::fs::copy(local_path, &remote).await?;
        trace!("upload {local_path} -> {} ({copied} bytes)", remote.display());
        Ok(())
    }

    async fn try_download(&self, remote_path: &str, local_name: &str) -> Result<()> {
        let remote = self.path(remote_path)?;
        let local = utils::target_name(local_name, remote_path);
        let copied = tokio::fs::copy(&remote, local).await?;
        trace!("download {} -> {local} ({copied} bytes)", remote.display());
        Ok(())
    }

    async fn try_change_dir(&mut self, path: &str) -> Result<()> {
        let target = self.path(path)?;
        if !tokio::fs::metadata(&target).await?.is_dir() {
            return Err(Error::not_found(path));
        }

        let session = self.session.as_mut().ok_or_else(Error::not_connected)?;
        session.cwd = utils::resolve(&session.cwd, path);
        Ok(())
    }

    async fn try_rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        let from = self.path(old_name)?;
        let to = self.path(new_name)?;
        if tokio::fs::try_exists(&to).await? {
            return Err(Error::conflict(format!("'{new_name}' already exists")));
        }
        tokio::fs::rename(from, to).await?;
        Ok(())
    }

    async fn try_file_size(&self, filename: &str) -> Result<i64> {
        let metadata = tokio::fs::metadata(self.path(filename)?).await?;
        if metadata.is_dir() {
            return Err(Error::conflict(format!("'{filename}' is a directory")));
        }
        i64::try_from(metadata.len()).map_err(|_| Error::new(ErrorKind::Unknown, "size out of range"))
    }
}

#[async_trait]
impl ConnectionStream for LocalStream {
    async fn connect(&mut self, credentials: &Credentials) -> bool {
        let result = Self::open(credentials).await;
        match self.last_error.record("connect", result) {
            Some(session) => {
                debug!("local session rooted at {}", session.root.display());
                self.session = Some(session);
                true
            }
            None => {
                self.session = None;
                false
            }
        }
    }

    async fn disconnect(&mut self) -> bool {
        if let Some(session) = self.session.take() {
            debug!("local session at {} closed", session.root.display());
        }
        self.last_error.clear();
        true
    }

    async fn upload(&mut self, local_path: &str, remote_name: &str) -> bool {
        let result = self.try_upload(local_path, remote_name).await;
        self.last_error.succeeded("upload", result)
    }

    async fn download(&mut self, remote_path: &str, local_name: &str) -> bool {
        let result = self.try_download(remote_path, local_name).await;
        self.last_error.succeeded("download", result)
    }

    async fn change_dir(&mut self, path: &str) -> bool {
        let result = self.try_change_dir(path).await;
        self.last_error.succeeded("change_dir", result)
    }

    async fn make_dir(&mut self, path: &str) -> bool {
        let result = match self.path(path) {
            Ok(dir) => tokio::fs::create_dir(dir).await.map_err(Error::from),
            Err(err) => Err(err),
        };
        self.last_error.succeeded("make_dir", result)
    }

    async fn remove_dir(&mut self, path: &str) -> bool {
        let result = match self.path(path) {
            Ok(dir) => tokio::fs::remove_dir(dir).await.map_err(Error::from),
            Err(err) => Err(err),
        };
        self.last_error.succeeded("remove_dir", result)
    }

    async fn current_dir(&mut self) -> String {
        let result = self.session().map(|session| session.cwd.clone());
        self.last_error
            .record("current_dir", result)
            .unwrap_or_default()
    }

    async fn search_dir(&mut self, pattern: &str) -> Vec<String> {
        let result = self.find(pattern).await;
        self.last_error
            .record("search_dir", result)
            .map(|entries| entries.map(DirEntry::into_file_name).collect())
            .unwrap_or_default()
    }

    async fn remove(&mut self, filename: &str) -> bool {
        let result = match self.path(filename) {
            Ok(file) => tokio::fs::remove_file(file).await.map_err(Error::from),
            Err(err) => Err(err),
        };
        self.last_error.succeeded("remove", result)
    }

    async fn rename(&mut self, old_name: &str, new_name: &str) -> bool {
        let result = self.try_rename(old_name, new_name).await;
        self.last_error.succeeded("rename", result)
    }

    async fn exists(&mut self, filename: &str) -> bool {
        let result = self
            .find(filename)
            .await
            .map(|mut entries| utils::names_entry(filename) && entries.next().is_some());
        self.last_error.record("exists", result).unwrap_or(false)
    }

    async fn file_size(&mut self, filename: &str) -> i64 {
        let result = self.try_file_size(filename).await;
        self.last_error
            .record("file_size", result)
            .unwrap_or(INVALID_FILE_SIZE)
    }

    async fn file_data(&mut self, filename: &str) -> Option<DirEntry> {
        let result = self.find(filename).await.and_then(|mut entries| {
            entries
                .next()
                .filter(|_| utils::names_entry(filename))
                .ok_or_else(|| Error::not_found(filename))
        });
        self.last_error.record("file_data", result)
    }

    async fn command(&mut self, command: &str) -> bool {
        let result: Result<()> = self.session().and_then(|_| {
            Err(Error::new(
                ErrorKind::CommandRejected,
                format!("'{command}' cannot run against a local directory"),
            ))
        });
        self.last_error.succeeded("command", result)
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn last_error(&self) -> Option<&Error> {
        self.last_error.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;

    #[tokio::test]
    async fn test_conformance() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let credentials = Credentials::new(root.path().to_string_lossy());
        conformance::run_all(LocalStream::new, credentials).await
    }

    #[tokio::test]
    async fn test_parent_paths_stay_inside_root() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        std::fs::write(root.path().join("inside.txt"), b"x")?;

        let mut stream = LocalStream::new();
        assert!(stream.connect(&Credentials::new(root.path().to_string_lossy())).await);
        assert!(stream.change_dir("../../..").await);
        assert_eq!(stream.current_dir().await, "/");
        assert!(stream.exists("../inside.txt").await);
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_requires_directory() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let file = root.path().join("plain.txt");
        std::fs::write(&file, b"x")?;

        let mut stream = LocalStream::new();
        assert!(!stream.connect(&Credentials::new(file.to_string_lossy())).await);
        assert!(!stream.is_connected());
        assert!(!stream.connect(&Credentials::new(root.path().join("missing").to_string_lossy())).await);
        assert_eq!(
            stream.last_error().map(Error::kind),
            Some(ErrorKind::PathNotFound)
        );

        let url = format!("file://{}", root.path().display());
        assert!(stream.connect(&Credentials::new(url)).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_file_data_reports_metadata() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        std::fs::write(root.path().join("data.bin"), [0u8; 42])?;

        let mut stream = LocalStream::new();
        assert!(stream.connect(&Credentials::new(root.path().to_string_lossy())).await);

        let entry = stream.file_data("data.bin").await.expect("entry");
        let metadata = entry.metadata().expect("metadata");
        assert!(metadata.is_regular());
        assert_eq!(metadata.len(), 42);
        assert!(!stream.command("NOOP").await);
        Ok(())
    }
}
