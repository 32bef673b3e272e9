//! FTP sessions (password login, passive mode, binary transfers)

use super::{RemoteSession, SessionConnector};
use crate::config::EndpointConfig;
use crate::error::TransferError;
use suppaftp::types::FileType;
use suppaftp::{FtpStream, Mode};

/// Opens FTP control connections to the configured endpoint
pub struct FtpConnector {
    endpoint: EndpointConfig,
}

impl FtpConnector {
    /// Connector for `endpoint`
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self { endpoint }
    }
}

impl SessionConnector for FtpConnector {
    fn open(&self) -> Result<Box<dyn RemoteSession>, TransferError> {
        let stream = FtpStream::connect((self.endpoint.host.as_str(), self.endpoint.port))
            .map_err(|e| TransferError::Connect {
                host: self.endpoint.address(),
                reason: e.to_string(),
            })?;

        tracing::debug!(endpoint = %self.endpoint.address(), "FTP connection opened");

        Ok(Box::new(FtpSession {
            stream: Some(stream),
            endpoint: self.endpoint.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!("ftp://{}", self.endpoint.address())
    }
}

struct FtpSession {
    stream: Option<FtpStream>,
    endpoint: EndpointConfig,
}

impl FtpSession {
    fn stream(&mut self) -> Result<&mut FtpStream, TransferError> {
        self.stream.as_mut().ok_or_else(|| TransferError::Connect {
            host: self.endpoint.address(),
            reason: "session already closed".to_string(),
        })
    }
}

impl RemoteSession for FtpSession {
    fn authenticate(&mut self) -> Result<(), TransferError> {
        let user = self.endpoint.access_key.clone();
        let password = self.endpoint.secret_key.clone();

        self.stream()?
            .login(&user, &password)
            .map_err(|e| TransferError::Authentication {
                user,
                reason: e.to_string(),
            })
    }

    fn navigate(&mut self) -> Result<(), TransferError> {
        let directory = self.endpoint.remote_relative_destination_directory.clone();
        let stream = self.stream()?;

        // relative to the login directory
        if !directory.is_empty() {
            stream.cwd(&directory).map_err(|e| TransferError::Navigate {
                path: directory.clone(),
                reason: e.to_string(),
            })?;
        }

        stream.set_mode(Mode::Passive);
        // ASCII is the protocol default and corrupts archives
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| TransferError::Navigate {
                path: directory,
                reason: format!("cannot switch to binary mode: {}", e),
            })
    }

    fn make_directory(&mut self, path: &str) -> Result<(), TransferError> {
        self.stream()?
            .mkdir(path)
            .map_err(|e| TransferError::MakeDirectory {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    fn store(&mut self, path: &str, bytes: &[u8]) -> Result<(), TransferError> {
        let mut reader = std::io::Cursor::new(bytes);
        let written = self
            .stream()?
            .put_file(path, &mut reader)
            .map_err(|e| TransferError::Store {
                file_name: path.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(path = %path, bytes = written, "FTP file stored");
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take()
            && let Err(e) = stream.quit()
        {
            tracing::debug!(endpoint = %self.endpoint.address(), error = %e, "FTP quit failed");
        }
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        self.close();
    }
}
