use std::{sync::Arc, thread};

use tokio::sync::{mpsc, oneshot};

use super::session::{Connector, FtpSession};
use crate::{
    config::Config,
    credentials::Credentials,
    error::{Error, ErrorKind, Result},
};

type Job = Box<dyn FnOnce(&mut dyn FtpSession) + Send>;

enum Message {
    Run(Job),
    Quit(oneshot::Sender<Result<()>>),
}

/// Handle to a thread owning one blocking FTP session.
///
/// Calls are queued to the thread and awaited through a oneshot reply.
/// Dropping the handle closes the queue; the thread then quits the session
/// and exits.
pub(crate) struct Worker {
    tx: mpsc::UnboundedSender<Message>,
}

impl Worker {
    /// Spawns the thread and waits until the session is logged in.
    pub async fn start(
        connector: Arc<dyn Connector>,
        credentials: Credentials,
        config: Config,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let _ = thread::Builder::new()
            .name(format!("ftp-{}", credentials.host()))
            .spawn(move || serve(connector.as_ref(), &credentials, &config, rx, ready_tx))?;

        ready_rx
            .await
            .map_err(|_| Error::new(ErrorKind::Unknown, "session worker exited during connect"))??;

        Ok(Self { tx })
    }

    pub async fn call<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn FtpSession) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |session| {
            let _ = reply_tx.send(op(session));
        });

        self.tx.send(Message::Run(job)).map_err(|_| lost())?;
        reply_rx.await.map_err(|_| lost())?
    }

    /// Quits the session and stops the thread.
    pub async fn shutdown(self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(Message::Quit(reply_tx)).map_err(|_| lost())?;
        reply_rx.await.map_err(|_| lost())?
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

fn lost() -> Error {
    Error::new(ErrorKind::NetworkUnreachable, "FTP session worker is gone")
}

fn serve(
    connector: &dyn Connector,
    credentials: &Credentials,
    config: &Config,
    mut rx: mpsc::UnboundedReceiver<Message>,
    ready: oneshot::Sender<Result<()>>,
) {
    let mut session = match connector.connect(credentials, config) {
        Ok(session) => session,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    while let Some(message) = rx.blocking_recv() {
        match message {
            Message::Run(job) => job(session.as_mut()),
            Message::Quit(reply) => {
                let _ = reply.send(session.quit());
                debug!("FTP session to {} closed", credentials.host());
                return;
            }
        }
    }

    if let Err(err) = session.quit() {
        warn!("closing dropped FTP session to {}: {err}", credentials.host());
    }
    debug!("dropped FTP session to {} released", credentials.host());
}
