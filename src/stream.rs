use crate::{
    credentials::Credentials,
    error::{Error, Result},
    fs::DirEntry,
};

/// Returned by [`ConnectionStream::file_size`] when the size is unknown.
pub const INVALID_FILE_SIZE: i64 = -1;

/// A logical session to a remote (or local) tree of files.
///
/// Streams start disconnected. [`connect`](Self::connect) is the only way
/// in, [`disconnect`](Self::disconnect) or dropping the stream the only way
/// out. Every other operation fails without side effects while disconnected.
///
/// Operations never return errors. They report success as a `bool` (or a
/// sentinel value) and keep the reason of the most recent failure in
/// [`last_error`](Self::last_error). A successful call clears it.
///
/// A stream is driven by one caller at a time; each call resolves only when
/// the operation has completed on the transport.
#[async_trait]
pub trait ConnectionStream: Send {
    /// Opens a session. Re-running it while connected renegotiates.
    async fn connect(&mut self, credentials: &Credentials) -> bool;

    /// Closes the session. Returns `true` when already disconnected.
    ///
    /// The stream is disconnected afterwards even if releasing the session
    /// failed; that failure is reported as `false`.
    async fn disconnect(&mut self) -> bool;

    /// Copies a local file up. An empty `remote_name` reuses the local base name.
    async fn upload(&mut self, local_path: &str, remote_name: &str) -> bool;

    /// Copies a remote file down. An empty `local_name` reuses the remote base name.
    async fn download(&mut self, remote_path: &str, local_name: &str) -> bool;

    async fn change_dir(&mut self, path: &str) -> bool;

    async fn make_dir(&mut self, path: &str) -> bool;

    async fn remove_dir(&mut self, path: &str) -> bool;

    /// Current working directory, or an empty string on failure.
    async fn current_dir(&mut self) -> String;

    /// Names matching a wildcard pattern such as `*.txt`, in listing order.
    ///
    /// No matches, a bad pattern or a missing session all yield an empty list.
    async fn search_dir(&mut self, pattern: &str) -> Vec<String>;

    async fn remove(&mut self, filename: &str) -> bool;

    async fn rename(&mut self, old_name: &str, new_name: &str) -> bool;

    /// Whether a single-entry search for `filename` finds anything.
    async fn exists(&mut self, filename: &str) -> bool;

    /// Size in bytes, or [`INVALID_FILE_SIZE`].
    async fn file_size(&mut self, filename: &str) -> i64;

    /// The first entry matching `filename`, with whatever metadata the
    /// backend can report.
    async fn file_data(&mut self, filename: &str) -> Option<DirEntry>;

    /// Hands a backend-specific raw command to the transport.
    async fn command(&mut self, command: &str) -> bool;

    fn is_connected(&self) -> bool;

    fn last_error(&self) -> Option<&Error>;

    /// Code of the last failure, `0` if the last call succeeded.
    fn last_error_code(&self) -> u32 {
        self.last_error().map_or(0, Error::code)
    }
}

/// Lets callers hold a `Box<dyn ConnectionStream>` without naming the backend.
#[async_trait]
impl<S: ConnectionStream + ?Sized> ConnectionStream for Box<S> {
    async fn connect(&mut self, credentials: &Credentials) -> bool {
        (**self).connect(credentials).await
    }

    async fn disconnect(&mut self) -> bool {
        (**self).disconnect().await
    }

    async fn upload(&mut self, local_path: &str, remote_name: &str) -> bool {
        (**self).upload(local_path, remote_name).await
    }

    async fn download(&mut self, remote_path: &str, local_name: &str) -> bool {
        (**self).download(remote_path, local_name).await
    }

    async fn change_dir(&mut self, path: &str) -> bool {
        (**self).change_dir(path).await
    }

    async fn make_dir(&mut self, path: &str) -> bool {
        (**self).make_dir(path).await
    }

    async fn remove_dir(&mut self, path: &str) -> bool {
        (**self).remove_dir(path).await
    }

    async fn current_dir(&mut self) -> String {
        (**self).current_dir().await
    }

    async fn search_dir(&mut self, pattern: &str) -> Vec<String> {
        (**self).search_dir(pattern).await
    }

    async fn remove(&mut self, filename: &str) -> bool {
        (**self).remove(filename).await
    }

    async fn rename(&mut self, old_name: &str, new_name: &str) -> bool {
        (**self).rename(old_name, new_name).await
    }

    async fn exists(&mut self, filename: &str) -> bool {
        (**self).exists(filename).await
    }

    async fn file_size(&mut self, filename: &str) -> i64 {
        (**self).file_size(filename).await
    }

    async fn file_data(&mut self, filename: &str) -> Option<DirEntry> {
        (**self).file_data(filename).await
    }

    async fn command(&mut self, command: &str) -> bool {
        (**self).command(command).await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn last_error(&self) -> Option<&Error> {
        (**self).last_error()
    }

    fn last_error_code(&self) -> u32 {
        (**self).last_error_code()
    }
}

/// The side channel behind [`ConnectionStream::last_error`].
#[derive(Debug, Default)]
pub struct LastError(Option<Error>);

impl LastError {
    pub const fn get(&self) -> Option<&Error> {
        self.0.as_ref()
    }

    /// Stores the outcome of `op`: clears the slot on success, keeps the
    /// error on failure.
    pub fn record<T>(&mut self, op: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.0 = None;
                Some(value)
            }
            Err(err) => {
                debug!("{op} failed: {err}");
                self.0 = Some(err);
                None
            }
        }
    }

    /// [`record`](Self::record) for operations reporting a plain `bool`.
    pub fn succeeded(&mut self, op: &str, result: Result<()>) -> bool {
        self.record(op, result).is_some()
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }
}
