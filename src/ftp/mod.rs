//! FTP backend.
//!
//! The client library is blocking, so each connected [`FtpStream`] owns a
//! worker thread holding the session. Operations are shipped to it and
//! awaited; at most one runs at a time.

mod error;
mod session;
mod worker;

pub use error::{classify, reply_error};
pub use session::{parse_list_line, Connector, FtpSession, TcpConnector, DEFAULT_PORT};

use std::{fs::File, sync::Arc};

use worker::Worker;

use crate::{
    config::Config,
    credentials::Credentials,
    error::{Error, ErrorKind, Result},
    fs::{DirEntry, ReadDir},
    stream::{ConnectionStream, LastError, INVALID_FILE_SIZE},
    utils::{self, Mask},
};

/// [`ConnectionStream`] speaking FTP.
pub struct FtpStream {
    connector: Arc<dyn Connector>,
    config: Config,
    worker: Option<Worker>,
    last_error: LastError,
}

impl Default for FtpStream {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl FtpStream {
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, Arc::new(TcpConnector))
    }

    /// Uses `connector` to open sessions instead of plain TCP.
    pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            config,
            worker: None,
            last_error: LastError::default(),
        }
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    async fn open(&mut self, credentials: &Credentials) -> Result<()> {
        if let Some(previous) = self.worker.take() {
            debug!("reconnecting, closing the previous session");
            if let Err(err) = previous.shutdown().await {
                warn!("closing previous session: {err}");
            }
        }

        credentials.validate()?;

        let worker = Worker::start(
            self.connector.clone(),
            credentials.clone(),
            self.config.clone(),
        )
        .await?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Runs `f` against the live session, for FTP commands outside the
    /// stream contract. `None` when disconnected or when `f` fails; the
    /// failure is kept in [`last_error`](ConnectionStream::last_error).
    pub async fn with_session<T, F>(&mut self, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn FtpSession) -> Result<T> + Send + 'static,
    {
        let result = self.call(f).await;
        self.last_error.record("with_session", result)
    }

    async fn call<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn FtpSession) -> Result<T> + Send + 'static,
    {
        let worker = self.worker.as_ref().ok_or_else(Error::not_connected)?;
        let result = worker.call(op).await;

        let closed = worker.is_closed();
        if closed {
            warn!("FTP session ended unexpectedly");
            self.worker = None;
        }
        result
    }

    async fn find(&mut self, pattern: &str) -> Result<ReadDir> {
        let (dir, mask) = utils::split_pattern(pattern);
        let mask = Mask::new(mask)?;
        let dir = dir.map(str::to_owned);

        let names = self
            .call(move |session| match session.names(dir.as_deref()) {
                Ok(names) => Ok(names),
                // 450/550 on NLST: nothing to list
                Err(err) if err.kind() == ErrorKind::PathNotFound => Ok(Vec::new()),
                Err(err) => Err(err),
            })
            .await?;

        Ok(names
            .iter()
            .map(|name| utils::base_name(name))
            .filter(|name| mask.matches(name))
            .map(|name| DirEntry::new(name, None))
            .collect())
    }

    async fn stat(&mut self, filename: &str) -> Result<DirEntry> {
        let (dir, mask) = utils::split_pattern(filename);
        let mask = Mask::new(mask)?;
        let dir = dir.map(str::to_owned);

        let entries = self
            .call(move |session| match session.entries(dir.as_deref()) {
                Ok(entries) => Ok(entries),
                Err(err) if err.kind() == ErrorKind::PathNotFound => Ok(Vec::new()),
                Err(err) => Err(err),
            })
            .await?;

        entries
            .into_iter()
            .filter(|entry| mask.matches(entry.file_name()))
            .collect::<ReadDir>()
            .next()
            .filter(|_| utils::names_entry(filename))
            .ok_or_else(|| Error::not_found(filename))
    }
}

#[async_trait]
impl ConnectionStream for FtpStream {
    async fn connect(&mut self, credentials: &Credentials) -> bool {
        debug!(
            "connect {}:{} as {:?}",
            credentials.host(),
            credentials.port_or(DEFAULT_PORT),
            credentials.user()
        );
        let result = self.open(credentials).await;
        self.last_error.succeeded("connect", result)
    }

    async fn disconnect(&mut self) -> bool {
        let result = match self.worker.take() {
            Some(worker) => worker.shutdown().await,
            None => Ok(()),
        };
        self.last_error.succeeded("disconnect", result)
    }

    async fn upload(&mut self, local_path: &str, remote_name: &str) -> bool {
        let local = local_path.to_owned();
        let remote = utils::target_name(remote_name, local_path).to_owned();

        let result = self
            .call(move |session| {
                let mut file = File::open(&local)?;
                let sent = session.put(&remote, &mut file)?;
                trace!("upload {local} -> {remote} ({sent} bytes)");
                Ok(())
            })
            .await;
        self.last_error.succeeded("upload", result)
    }

    async fn download(&mut self, remote_path: &str, local_name: &str) -> bool {
        let remote = remote_path.to_owned();
        let local = utils::target_name(local_name, remote_path).to_owned();

        let result = self
            .call(move |session| {
                let data = session.get(&remote)?;
                std::fs::write(&local, &data)?;
                trace!("download {remote} -> {local} ({} bytes)", data.len());
                Ok(())
            })
            .await;
        self.last_error.succeeded("download", result)
    }

    async fn change_dir(&mut self, path: &str) -> bool {
        let path = path.to_owned();
        let result = self.call(move |session| session.change_dir(&path)).await;
        self.last_error.succeeded("change_dir", result)
    }

    async fn make_dir(&mut self, path: &str) -> bool {
        let path = path.to_owned();
        let result = self.call(move |session| session.make_dir(&path)).await;
        self.last_error.succeeded("make_dir", result)
    }

    async fn remove_dir(&mut self, path: &str) -> bool {
        let path = path.to_owned();
        let result = self.call(move |session| session.remove_dir(&path)).await;
        self.last_error.succeeded("remove_dir", result)
    }

    async fn current_dir(&mut self) -> String {
        let result = self.call(|session| session.current_dir()).await;
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
        let filename = filename.to_owned();
        let result = self.call(move |session| session.delete(&filename)).await;
        self.last_error.succeeded("remove", result)
    }

    async fn rename(&mut self, old_name: &str, new_name: &str) -> bool {
        let (from, to) = (old_name.to_owned(), new_name.to_owned());
        let result = self.call(move |session| session.rename(&from, &to)).await;
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
        let filename = filename.to_owned();
        let result = self
            .call(move |session| session.size(&filename))
            .await
            .and_then(|size| {
                i64::try_from(size)
                    .map_err(|_| Error::new(ErrorKind::Unknown, "size out of range"))
            });
        self.last_error
            .record("file_size", result)
            .unwrap_or(INVALID_FILE_SIZE)
    }

    async fn file_data(&mut self, filename: &str) -> Option<DirEntry> {
        let result = self.stat(filename).await;
        self.last_error.record("file_data", result)
    }

    async fn command(&mut self, command: &str) -> bool {
        let command = command.to_owned();
        let result = self
            .call(move |session| {
                let code = session.quote(&command)?;
                trace!("{command}: {code}");
                Ok(())
            })
            .await;
        self.last_error.succeeded("command", result)
    }

    fn is_connected(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_closed())
    }

    fn last_error(&self) -> Option<&Error> {
        self.last_error.get()
    }
}
