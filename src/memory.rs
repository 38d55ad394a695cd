//! In-memory backend.
//!
//! [`MemoryFs`] is a shared tree that outlives individual sessions, so a
//! reconnecting [`MemoryStream`] sees what an earlier one left behind.
//! Transfers read and write real local files.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    config::Config,
    credentials::Credentials,
    error::{Error, ErrorKind, Result},
    fs::{DirEntry, Metadata, ReadDir},
    stream::{ConnectionStream, LastError, INVALID_FILE_SIZE},
    utils::{self, Mask},
};

#[derive(Debug, Clone)]
enum Node {
    Dir { modified: DateTime<Utc> },
    File { data: Bytes, modified: DateTime<Utc> },
}

impl Node {
    fn metadata(&self) -> Metadata {
        match self {
            Self::Dir { modified } => Metadata::directory(Some(*modified)),
            Self::File { data, modified } => Metadata::regular(data.len() as u64, Some(*modified)),
        }
    }
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    accounts: HashMap<String, String>,
}

impl Tree {
    fn dir(&self, path: &str) -> Result<()> {
        match self.nodes.get(path) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(Node::File { .. }) => Err(Error::conflict(format!("'{path}' is a file"))),
            None => Err(Error::not_found(path)),
        }
    }

    fn children<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = (&'a str, &'a Node)> + 'a {
        let prefix = if dir == "/" {
            "/".to_owned()
        } else {
            format!("{dir}/")
        };

        let skip = prefix.len();

        self.nodes
            .range(prefix.clone()..)
            .take_while(move |(path, _)| path.starts_with(&prefix))
            .filter_map(move |(path, node)| {
                let name = &path[skip..];
                (!name.is_empty() && !name.contains('/')).then_some((name, node))
            })
    }
}

/// Cloneable handle to an in-memory file tree rooted at `/`.
///
/// Paths given to its methods are absolute; [`MemoryStream`] resolves
/// relative ones against its working directory first.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    tree: Arc<Mutex<Tree>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_owned(),
            Node::Dir {
                modified: Utc::now(),
            },
        );

        Self {
            tree: Arc::new(Mutex::new(Tree {
                nodes,
                accounts: HashMap::new(),
            })),
        }
    }

    /// Restricts logins to the registered accounts. Without any account
    /// every user name is accepted.
    #[must_use]
    pub fn with_account<U: Into<String>, P: Into<String>>(self, user: U, password: P) -> Self {
        let _ = self
            .tree()
            .accounts
            .insert(user.into(), password.into());
        self
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn authenticate(&self, user: &str, password: &str) -> Result<()> {
        let tree = self.tree();
        if tree.accounts.is_empty() || tree.accounts.get(user).is_some_and(|p| p == password) {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::AuthRejected,
                format!("login incorrect for '{user}'"),
            ))
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.tree().dir(path).is_ok()
    }

    pub fn make_dir(&self, path: &str) -> Result<()> {
        let mut tree = self.tree();
        if tree.nodes.contains_key(path) {
            return Err(Error::conflict(format!("'{path}' already exists")));
        }
        tree.dir(utils::parent(path))?;

        tree.nodes.insert(
            path.to_owned(),
            Node::Dir {
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn remove_dir(&self, path: &str) -> Result<()> {
        let mut tree = self.tree();
        tree.dir(path)?;
        if path == "/" {
            return Err(Error::conflict("cannot remove the root directory"));
        }
        if tree.children(path).next().is_some() {
            return Err(Error::conflict(format!("'{path}' is not empty")));
        }

        tree.nodes.remove(path);
        Ok(())
    }

    pub fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let mut tree = self.tree();
        if let Some(Node::Dir { .. }) = tree.nodes.get(path) {
            return Err(Error::conflict(format!("'{path}' is a directory")));
        }
        tree.dir(utils::parent(path))?;

        tree.nodes.insert(
            path.to_owned(),
            Node::File {
                data,
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn read(&self, path: &str) -> Result<Bytes> {
        match self.tree().nodes.get(path) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(Node::Dir { .. }) => Err(Error::conflict(format!("'{path}' is a directory"))),
            None => Err(Error::not_found(path)),
        }
    }

    pub fn remove_file(&self, path: &str) -> Result<()> {
        let mut tree = self.tree();
        match tree.nodes.get(path) {
            Some(Node::File { .. }) => {
                tree.nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(Error::conflict(format!("'{path}' is a directory"))),
            None => Err(Error::not_found(path)),
        }
    }

    /// Moves a file or a whole directory subtree.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut tree = self.tree();
        if !tree.nodes.contains_key(from) || from == "/" {
            return Err(Error::not_found(from));
        }
        if tree.nodes.contains_key(to) {
            return Err(Error::conflict(format!("'{to}' already exists")));
        }
        if to.starts_with(&format!("{from}/")) {
            return Err(Error::conflict(format!("cannot move '{from}' into itself")));
        }
        tree.dir(utils::parent(to))?;

        let prefix = format!("{from}/");
        let moved: Vec<String> = tree
            .nodes
            .keys()
            .filter(|path| *path == from || path.starts_with(&prefix))
            .cloned()
            .collect();

        for path in moved {
            if let Some(node) = tree.nodes.remove(&path) {
                let renamed = format!("{to}{}", &path[from.len()..]);
                tree.nodes.insert(renamed, node);
            }
        }
        Ok(())
    }

    pub fn metadata(&self, path: &str) -> Result<Metadata> {
        self.tree()
            .nodes
            .get(path)
            .map(Node::metadata)
            .ok_or_else(|| Error::not_found(path))
    }

    /// Lists a directory in name order.
    pub fn read_dir(&self, path: &str) -> Result<ReadDir> {
        let tree = self.tree();
        tree.dir(path)?;

        Ok(tree
            .children(path)
            .map(|(name, node)| DirEntry::new(name, Some(node.metadata())))
            .collect())
    }
}

/// [`ConnectionStream`] over a [`MemoryFs`].
#[derive(Debug)]
pub struct MemoryStream {
    fs: MemoryFs,
    cwd: Option<String>,
    last_error: LastError,
}

impl MemoryStream {
    pub fn new(fs: MemoryFs) -> Self {
        Self {
            fs,
            cwd: None,
            last_error: LastError::default(),
        }
    }

    pub const fn fs(&self) -> &MemoryFs {
        &self.fs
    }

    fn cwd(&self) -> Result<&str> {
        self.cwd.as_deref().ok_or_else(Error::not_connected)
    }

    fn resolve(&self, path: &str) -> Result<String> {
        Ok(utils::resolve(self.cwd()?, path))
    }

    fn find(&self, pattern: &str) -> Result<ReadDir> {
        let (dir, mask) = utils::split_pattern(pattern);
        let dir = self.resolve(dir.unwrap_or("."))?;
        let mask = Mask::new(mask)?;

        match self.fs.read_dir(&dir) {
            Ok(entries) => Ok(entries.filter(|e| mask.matches(e.file_name())).collect()),
            Err(err) if err.kind() == ErrorKind::PathNotFound => Ok(ReadDir::default()),
            Err(err) => Err(err),
        }
    }

    async fn try_upload(&self, local_path: &str, remote_name: &str) -> Result<()> {
        let remote = self.resolve(utils::target_name(remote_name, local_path))?;
        let data = tokio::fs::read(local_path).await?;
        trace!("upload {local_path} -> {remote} ({} bytes)", data.len());
        self.fs.write(&remote, Bytes::from(data))
    }

    async fn try_download(&self, remote_path: &str, local_name: &str) -> Result<()> {
        let remote = self.resolve(remote_path)?;
        let data = self.fs.read(&remote)?;
        let local = utils::target_name(local_name, remote_path);
        trace!("download {remote} -> {local} ({} bytes)", data.len());
        tokio::fs::write(local, &data).await?;
        Ok(())
    }

    fn try_change_dir(&mut self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        self.fs.read_dir(&target)?;
        self.cwd = Some(target);
        Ok(())
    }

    fn try_command(&self, command: &str) -> Result<()> {
        self.cwd()?;
        if command.trim().eq_ignore_ascii_case("NOOP") {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::CommandRejected,
                format!("'{command}' is not supported"),
            )
            .with_code(502))
        }
    }
}

#[async_trait]
impl ConnectionStream for MemoryStream {
    async fn connect(&mut self, credentials: &Credentials) -> bool {
        let config = Config::default();
        let result = credentials.validate().and_then(|()| {
            let (user, password) = credentials.login(&config);
            self.fs.authenticate(user, password)
        });

        if self.last_error.succeeded("connect", result) {
            debug!("memory session opened for {:?}", credentials.user());
            self.cwd = Some("/".to_owned());
            true
        } else {
            self.cwd = None;
            false
        }
    }

    async fn disconnect(&mut self) -> bool {
        if self.cwd.take().is_some() {
            debug!("memory session closed");
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
        let result = self.try_change_dir(path);
        self.last_error.succeeded("change_dir", result)
    }

    async fn make_dir(&mut self, path: &str) -> bool {
        let result = self.resolve(path).and_then(|dir| self.fs.make_dir(&dir));
        self.last_error.succeeded("make_dir", result)
    }

    async fn remove_dir(&mut self, path: &str) -> bool {
        let result = self.resolve(path).and_then(|dir| self.fs.remove_dir(&dir));
        self.last_error.succeeded("remove_dir", result)
    }

    async fn current_dir(&mut self) -> String {
        let result = self.cwd().map(str::to_owned);
        self.last_error
            .record("current_dir", result)
            .unwrap_or_default()
    }

    async fn search_dir(&mut self, pattern: &str) -> Vec<String> {
        let result = self.find(pattern);
        self.last_error
            .record("search_dir", result)
            .map(|entries| entries.map(DirEntry::into_file_name).collect())
            .unwrap_or_default()
    }

    async fn remove(&mut self, filename: &str) -> bool {
        let result = self.resolve(filename).and_then(|path| self.fs.remove_file(&path));
        self.last_error.succeeded("remove", result)
    }

    async fn rename(&mut self, old_name: &str, new_name: &str) -> bool {
        let result = self.resolve(old_name).and_then(|from| {
            let to = self.resolve(new_name)?;
            self.fs.rename(&from, &to)
        });
        self.last_error.succeeded("rename", result)
    }

    async fn exists(&mut self, filename: &str) -> bool {
        let result = self
            .find(filename)
            .map(|mut entries| utils::names_entry(filename) && entries.next().is_some());
        self.last_error.record("exists", result).unwrap_or(false)
    }

    async fn file_size(&mut self, filename: &str) -> i64 {
        let result = self.resolve(filename).and_then(|path| {
            let metadata = self.fs.metadata(&path)?;
            if metadata.is_dir() {
                return Err(Error::conflict(format!("'{path}' is a directory")));
            }
            i64::try_from(metadata.len())
                .map_err(|_| Error::new(ErrorKind::Unknown, "size out of range"))
        });
        self.last_error
            .record("file_size", result)
            .unwrap_or(INVALID_FILE_SIZE)
    }

    async fn file_data(&mut self, filename: &str) -> Option<DirEntry> {
        let result = self.find(filename).and_then(|mut entries| {
            entries
                .next()
                .filter(|_| utils::names_entry(filename))
                .ok_or_else(|| Error::not_found(filename))
        });
        self.last_error.record("file_data", result)
    }

    async fn command(&mut self, command: &str) -> bool {
        let result = self.try_command(command);
        self.last_error.succeeded("command", result)
    }

    fn is_connected(&self) -> bool {
        self.cwd.is_some()
    }

    fn last_error(&self) -> Option<&Error> {
        self.last_error.get()
    }
}
