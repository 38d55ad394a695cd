use std::{io::Read, net::ToSocketAddrs};

use suppaftp::{list::File, types::FileType as TransferType, FtpStream as Client, Mode, Status};

use super::error::reply_error;
use crate::{
    config::Config,
    credentials::Credentials,
    error::{Error, ErrorKind, Result},
    fs::{DirEntry, FileType, Metadata},
    utils,
};

pub const DEFAULT_PORT: u16 = 21;

/// Blocking FTP commands used by [`FtpStream`](super::FtpStream).
///
/// Paths are passed to the server as given; it resolves them against its
/// own working directory.
pub trait FtpSession {
    /// `STOR`, returning the number of bytes sent.
    fn put(&mut self, remote: &str, reader: &mut dyn Read) -> Result<u64>;

    /// `RETR` into memory.
    fn get(&mut self, remote: &str) -> Result<Vec<u8>>;

    fn make_dir(&mut self, path: &str) -> Result<()>;

    fn remove_dir(&mut self, path: &str) -> Result<()>;

    fn change_dir(&mut self, path: &str) -> Result<()>;

    fn current_dir(&mut self) -> Result<String>;

    fn delete(&mut self, path: &str) -> Result<()>;

    fn rename(&mut self, from: &str, to: &str) -> Result<()>;

    fn size(&mut self, path: &str) -> Result<u64>;

    /// `NLST`: bare names, in server order.
    fn names(&mut self, dir: Option<&str>) -> Result<Vec<String>>;

    /// `LIST`: entries with whatever metadata the listing carries.
    fn entries(&mut self, dir: Option<&str>) -> Result<Vec<DirEntry>>;

    /// Sends a raw command and returns the positive reply code.
    fn quote(&mut self, command: &str) -> Result<u32>;

    fn quit(&mut self) -> Result<()>;
}

/// Opens logged-in sessions.
///
/// Runs on the session's worker thread, so the session itself never
/// crosses threads.
pub trait Connector: Send + Sync {
    fn connect(&self, credentials: &Credentials, config: &Config) -> Result<Box<dyn FtpSession>>;
}

/// Plain FTP over TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&self, credentials: &Credentials, config: &Config) -> Result<Box<dyn FtpSession>> {
        credentials.validate()?;

        let host = credentials.host();
        let port = credentials.port_or(DEFAULT_PORT);
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| {
                Error::new(
                    ErrorKind::NetworkUnreachable,
                    format!("cannot resolve {host}: {e}"),
                )
            })?
            .next()
            .ok_or_else(|| {
                Error::new(ErrorKind::NetworkUnreachable, format!("no address for {host}"))
            })?;

        debug!("connecting to {addr}");
        let mut client = Client::connect_timeout(addr, config.timeout())?;
        client.set_mode(if config.passive {
            Mode::Passive
        } else {
            Mode::Active
        });

        let (user, password) = credentials.login(config);
        client.login(user, password)?;
        client.transfer_type(TransferType::Binary)?;

        if config.utf8 {
            if let Err(err) = client.custom_command("OPTS UTF8 ON", &[Status::CommandOk]) {
                trace!("server refused UTF-8 names: {err}");
            }
        }

        debug!("logged in to {host}:{port} as {user}");
        Ok(Box::new(client))
    }
}

/// Parses one `LIST` line; unparseable lines are skipped by callers.
pub fn parse_list_line(line: &str) -> Option<DirEntry> {
    let file = line.parse::<File>().ok()?;
    let file_type = if file.is_directory() {
        FileType::DIR
    } else if file.is_symlink() {
        FileType::LNK
    } else {
        FileType::REG
    };

    let metadata = Metadata {
        size: Some(file.size() as u64),
        file_type,
        permissions: None,
        modified: Some(utils::datetime(file.modified())),
    };
    Some(DirEntry::new(file.name(), Some(metadata)))
}

/// Outcome of a raw command's first reply.
///
/// A preliminary `1xx` reply means the command opened a data transfer whose
/// completion reply would be left unread, so it is refused.
pub fn accept_reply(command: &str, code: u32) -> Result<u32> {
    match code {
        100..=199 => Err(Error::new(
            ErrorKind::CommandRejected,
            format!("'{command}' needs a data connection"),
        )
        .with_code(code)),
        200..=399 => Ok(code),
        _ => Err(reply_error(code, format!("'{command}' refused"))),
    }
}

impl FtpSession for Client {
    fn put(&mut self, remote: &str, mut reader: &mut dyn Read) -> Result<u64> {
        Ok(self.put_file(remote, &mut reader)?)
    }

    fn get(&mut self, remote: &str) -> Result<Vec<u8>> {
        Ok(self.retr_as_buffer(remote)?.into_inner())
    }

    fn make_dir(&mut self, path: &str) -> Result<()> {
        Ok(self.mkdir(path)?)
    }

    fn remove_dir(&mut self, path: &str) -> Result<()> {
        Ok(self.rmdir(path)?)
    }

    fn change_dir(&mut self, path: &str) -> Result<()> {
        Ok(self.cwd(path)?)
    }

    fn current_dir(&mut self) -> Result<String> {
        Ok(self.pwd()?)
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        Ok(self.rm(path)?)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        Ok(Client::rename(self, from, to)?)
    }

    fn size(&mut self, path: &str) -> Result<u64> {
        Ok(Client::size(self, path)? as u64)
    }

    fn names(&mut self, dir: Option<&str>) -> Result<Vec<String>> {
        Ok(self.nlst(dir)?)
    }

    fn entries(&mut self, dir: Option<&str>) -> Result<Vec<DirEntry>> {
        let lines = self.list(dir)?;
        Ok(lines.iter().filter_map(|line| parse_list_line(line)).collect())
    }

    fn quote(&mut self, command: &str) -> Result<u32> {
        // with nothing expected, every reply comes back as unexpected
        match self.custom_command(command, &[]) {
            Ok(response) => accept_reply(command, response.status.code()),
            Err(suppaftp::FtpError::UnexpectedResponse(response))
                if response.status.code() < 400 =>
            {
                accept_reply(command, response.status.code())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn quit(&mut self) -> Result<()> {
        Ok(Client::quit(self)?)
    }
}
