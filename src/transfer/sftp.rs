//! SFTP sessions over SSH with password authentication

use super::{RemoteSession, SessionConnector};
use crate::config::EndpointConfig;
use crate::error::TransferError;
use std::io::Write;
use std::net::TcpStream;
use std::path::Path;

const DIRECTORY_MODE: i32 = 0o755;

/// Opens SSH connections to the configured endpoint
pub struct SftpConnector {
    endpoint: EndpointConfig,
}

impl SftpConnector {
    /// Connector for `endpoint`
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self { endpoint }
    }
}

impl SessionConnector for SftpConnector {
    fn open(&self) -> Result<Box<dyn RemoteSession>, TransferError> {
        let connect_error = |reason: String| TransferError::Connect {
            host: self.endpoint.address(),
            reason,
        };

        let tcp = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port))
            .map_err(|e| connect_error(e.to_string()))?;

        let mut session = ssh2::Session::new().map_err(|e| connect_error(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| connect_error(format!("SSH handshake failed: {}", e)))?;

        tracing::debug!(endpoint = %self.endpoint.address(), "SSH session established");

        Ok(Box::new(SftpSession {
            session,
            sftp: None,
            endpoint: self.endpoint.clone(),
            closed: false,
        }))
    }

    fn describe(&self) -> String {
        format!("sftp://{}", self.endpoint.address())
    }
}

struct SftpSession {
    session: ssh2::Session,
    sftp: Option<ssh2::Sftp>,
    endpoint: EndpointConfig,
    closed: bool,
}

/// Remote path for `name`: the configured prefix followed by the name
///
/// The prefix is used verbatim; config validation requires it to end with `/`.
fn remote_path(directory: &str, name: &str) -> String {
    format!("{}{}", directory, name)
}

impl SftpSession {
    fn remote_path(&self, name: &str) -> String {
        remote_path(&self.endpoint.remote_relative_destination_directory, name)
    }

    fn channel(&self) -> Result<&ssh2::Sftp, TransferError> {
        self.sftp
            .as_ref()
            .ok_or_else(|| TransferError::Authentication {
                user: self.endpoint.access_key.clone(),
                reason: "SFTP channel not open; authenticate first".to_string(),
            })
    }
}

impl RemoteSession for SftpSession {
    fn authenticate(&mut self) -> Result<(), TransferError> {
        let user = self.endpoint.access_key.clone();

        self.session
            .userauth_password(&user, &self.endpoint.secret_key)
            .map_err(|e| TransferError::Authentication {
                user: user.clone(),
                reason: e.to_string(),
            })?;

        let sftp = self
            .session
            .sftp()
            .map_err(|e| TransferError::Authentication {
                user,
                reason: format!("cannot open SFTP channel: {}", e),
            })?;
        self.sftp = Some(sftp);
        Ok(())
    }

    fn navigate(&mut self) -> Result<(), TransferError> {
        let directory = &self.endpoint.remote_relative_destination_directory;
        if directory.is_empty() {
            return Ok(());
        }

        self.channel()?
            .stat(Path::new(directory))
            .map(|_| ())
            .map_err(|e| TransferError::Navigate {
                path: directory.clone(),
                reason: e.to_string(),
            })
    }

    fn make_directory(&mut self, path: &str) -> Result<(), TransferError> {
        let remote = self.remote_path(path);
        self.channel()?
            .mkdir(Path::new(&remote), DIRECTORY_MODE)
            .map_err(|e| TransferError::MakeDirectory {
                path: remote.clone(),
                reason: e.to_string(),
            })
    }

    fn store(&mut self, path: &str, bytes: &[u8]) -> Result<(), TransferError> {
        let remote = self.remote_path(path);
        let store_error = |reason: String| TransferError::Store {
            file_name: remote.clone(),
            reason,
        };

        let mut file = self
            .channel()?
            .create(Path::new(&remote))
            .map_err(|e| store_error(e.to_string()))?;
        file.write_all(bytes)
            .map_err(|e| store_error(e.to_string()))?;
        file.flush().map_err(|e| store_error(e.to_string()))?;

        tracing::debug!(path = %remote, bytes = bytes.len(), "SFTP file stored");
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.sftp = None;

        if let Err(e) = self.session.disconnect(None, "export done", None) {
            tracing::debug!(endpoint = %self.endpoint.address(), error = %e, "SSH disconnect failed");
        }
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        self.close();
    }
}
