//! Managed file-transfer backends
//!
//! - [`sftp`] - SSH file transfer with password or key authentication
//! - [`local`] - a local directory tree standing in for the remote
//! - [`disabled`] - log-only uploads for non-production use

pub mod disabled;
pub mod factory;
pub mod local;
pub mod sftp;
pub mod traits;

pub use disabled::DisabledTransferGateway;
pub use factory::create_gateway;
pub use local::LocalTransferGateway;
pub use sftp::SftpTransferGateway;
pub use traits::{remote_join, TransferGateway};
