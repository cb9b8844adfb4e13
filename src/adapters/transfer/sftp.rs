//! SFTP backend on libssh2
//!
//! Every operation opens its own session and closes it afterwards, so a
//! dropped connection never outlives the call that saw it.

use crate::adapters::transfer::traits::{remote_join, TransferGateway};
use crate::config::SftpConfig;
use crate::domain::{BatchfeedError, Result};
use secrecy::ExposeSecret;
use ssh2::{CheckResult, KnownHostFileKind, Session, Sftp};
use std::fs::File;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

fn transport(context: impl std::fmt::Display, e: impl std::fmt::Display) -> BatchfeedError {
    BatchfeedError::Transport(format!("{context}: {e}"))
}

pub struct SftpTransferGateway {
    config: SftpConfig,
}

impl SftpTransferGateway {
    pub fn new(config: SftpConfig) -> Self {
        Self { config }
    }

    fn connect(&self) -> Result<(Session, Sftp)> {
        let cfg = &self.config;
        let timeout = Duration::from_secs(cfg.timeout_seconds);
        let endpoint = format!("{}:{}", cfg.host, cfg.port);

        let addr = (cfg.host.as_str(), cfg.port)
            .to_socket_addrs()
            .map_err(|e| transport(format!("Resolving {endpoint}"), e))?
            .next()
            .ok_or_else(|| BatchfeedError::Transport(format!("No address for {endpoint}")))?;
        let tcp = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| transport(format!("Connecting to {endpoint}"), e))?;

        let mut session = Session::new().map_err(|e| transport("Creating SSH session", e))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        session
            .handshake()
            .map_err(|e| transport(format!("SSH handshake with {endpoint}"), e))?;

        if let Some(known_hosts) = &cfg.known_hosts_path {
            self.verify_host_key(&session, known_hosts)?;
        }

        if let Some(key_path) = &cfg.private_key_path {
            let passphrase = cfg
                .private_key_passphrase
                .as_ref()
                .map(|p| p.expose_secret().as_str().to_string());
            session
                .userauth_pubkey_file(&cfg.username, None, key_path, passphrase.as_deref())
                .map_err(|e| transport(format!("Key authentication as {}", cfg.username), e))?;
        } else if let Some(password) = &cfg.password {
            session
                .userauth_password(&cfg.username, password.expose_secret().as_str())
                .map_err(|e| transport(format!("Password authentication as {}", cfg.username), e))?;
        }

        if !session.authenticated() {
            return Err(BatchfeedError::Transport(format!(
                "Not authenticated to {endpoint} as {}",
                cfg.username
            )));
        }

        let sftp = session
            .sftp()
            .map_err(|e| transport("Opening SFTP channel", e))?;
        Ok((session, sftp))
    }

    fn verify_host_key(&self, session: &Session, known_hosts: &Path) -> Result<()> {
        let cfg = &self.config;
        let mut hosts = session
            .known_hosts()
            .map_err(|e| transport("Loading known hosts", e))?;
        hosts
            .read_file(known_hosts, KnownHostFileKind::OpenSSH)
            .map_err(|e| transport(format!("Reading {}", known_hosts.display()), e))?;

        let (key, _) = session
            .host_key()
            .ok_or_else(|| BatchfeedError::Transport("Server sent no host key".to_string()))?;

        match hosts.check_port(&cfg.host, cfg.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::Mismatch => Err(BatchfeedError::Transport(format!(
                "Host key for {} does not match known_hosts",
                cfg.host
            ))),
            CheckResult::NotFound => Err(BatchfeedError::Transport(format!(
                "Host {} is not listed in {}",
                cfg.host,
                known_hosts.display()
            ))),
            CheckResult::Failure => Err(BatchfeedError::Transport(format!(
                "Host key check for {} failed",
                cfg.host
            ))),
        }
    }
}

fn ensure_remote_dir(sftp: &Sftp, remote_dir: &str) -> Result<()> {
    let absolute = remote_dir.starts_with('/');
    let mut current = String::new();
    for part in remote_dir.split('/').filter(|p| !p.is_empty()) {
        if absolute || !current.is_empty() {
            current.push('/');
        }
        current.push_str(part);

        let path = Path::new(&current);
        if sftp.stat(path).is_err() {
            sftp.mkdir(path, 0o755)
                .map_err(|e| transport(format!("Creating remote directory {current}"), e))?;
        }
    }
    Ok(())
}

impl TransferGateway for SftpTransferGateway {
    fn upload(&self, local_file: &Path, remote_dir: &str) -> Result<String> {
        let file_name = local_file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                BatchfeedError::Validation(format!("No file name in {}", local_file.display()))
            })?;
        let remote = remote_join(remote_dir, file_name);

        let (_session, sftp) = self.connect()?;
        ensure_remote_dir(&sftp, remote_dir)?;

        let mut source = File::open(local_file)?;
        let mut target = sftp
            .create(Path::new(&remote))
            .map_err(|e| transport(format!("Creating {remote}"), e))?;
        io::copy(&mut source, &mut target)
            .map_err(|e| transport(format!("Uploading {remote}"), e))?;

        tracing::info!(host = %self.config.host, remote = %remote, "Uploaded over SFTP");
        Ok(remote)
    }

    fn download(&self, remote_file: &str, local_file: &Path) -> Result<()> {
        let (_session, sftp) = self.connect()?;
        let mut source = sftp
            .open(Path::new(remote_file))
            .map_err(|e| transport(format!("Opening {remote_file}"), e))?;

        if let Some(parent) = local_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut target = File::create(local_file)?;
        io::copy(&mut source, &mut target)
            .map_err(|e| transport(format!("Downloading {remote_file}"), e))?;
        Ok(())
    }

    fn list(&self, remote_dir: &str) -> Result<Vec<String>> {
        let (_session, sftp) = self.connect()?;
        let entries = sftp
            .readdir(Path::new(remote_dir))
            .map_err(|e| transport(format!("Listing {remote_dir}"), e))?;

        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|(_, stat)| stat.is_file())
            .filter_map(|(path, _)| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    fn delete(&self, remote_file: &str) -> Result<()> {
        let (_session, sftp) = self.connect()?;
        sftp.unlink(Path::new(remote_file))
            .map_err(|e| transport(format!("Deleting {remote_file}"), e))
    }

    fn name(&self) -> &'static str {
        "sftp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_host_is_transport_error() {
        let gateway = SftpTransferGateway::new(SftpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "batch".to_string(),
            password: Some(crate::config::secret_string("pw".to_string())),
            private_key_path: None,
            private_key_passphrase: None,
            known_hosts_path: None,
            timeout_seconds: 1,
        });
        let err = gateway.list("/inbox").unwrap_err();
        assert!(err.is_transport());
    }
}
