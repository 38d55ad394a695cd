#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate async_trait;

mod config;
mod credentials;
mod error;
/// Directory entries and their metadata
pub mod fs;
/// FTP transport
pub mod ftp;
/// Local directory backend
pub mod local;
/// In-memory backend
pub mod memory;
mod stream;
mod utils;

#[cfg(test)]
mod conformance;

pub use config::Config;
pub use credentials::Credentials;
pub use error::{Error, ErrorKind, Result};
pub use ftp::FtpStream;
pub use local::LocalStream;
pub use memory::{MemoryFs, MemoryStream};
pub use stream::{ConnectionStream, LastError, INVALID_FILE_SIZE};
