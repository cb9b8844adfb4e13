//! Keygen command implementation
//!
//! Writes `<name>.pub.asc` (hand to the vendor, or list under
//! `encryption.recipient_public_keys`) and `<name>.sec.asc` (the keyring for
//! `encryption.secret_keyring`).

use crate::config::load_config;
use crate::core::codec::envelope::{KdfParams, SecretKey};
use clap::Args;
use std::fs;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Arguments for the keygen command
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Directory the key files are written to
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Base name of the key files
    #[arg(long, default_value = "batchfeed")]
    pub name: String,

    /// Environment variable holding the passphrase for the secret key
    #[arg(long, default_value = "BATCHFEED_KEY_PASSPHRASE")]
    pub passphrase_env: String,

    /// Overwrite existing key files
    #[arg(long)]
    pub force: bool,
}

impl KeygenArgs {
    /// Execute the keygen command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let passphrase = match std::env::var(&self.passphrase_env) {
            Ok(p) if !p.is_empty() => Zeroizing::new(p),
            _ => {
                println!("❌ Set {} to the passphrase for the new key", self.passphrase_env);
                return Ok(2);
            }
        };

        // Cost parameters from the config when there is one
        let kdf: KdfParams = load_config(config_path)
            .map(|c| c.encryption.kdf.into())
            .unwrap_or_default();

        let public_path = self.out_dir.join(format!("{}.pub.asc", self.name));
        let secret_path = self.out_dir.join(format!("{}.sec.asc", self.name));
        for path in [&public_path, &secret_path] {
            if path.exists() && !self.force {
                println!("❌ Key file already exists: {}", path.display());
                println!("   Use --force to overwrite");
                return Ok(2);
            }
        }

        let key = SecretKey::generate();
        let armored_secret = match key.to_armored(passphrase.as_bytes(), kdf) {
            Ok(text) => text,
            Err(e) => {
                println!("❌ Failed to protect the secret key");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        fs::create_dir_all(&self.out_dir)?;
        fs::write(&public_path, key.public_key().to_armored())?;
        fs::write(&secret_path, armored_secret)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&secret_path, fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!(key_id = %key.key_id(), "Keypair generated");
        println!("✅ Keypair generated (key id {})", key.key_id());
        println!("   Public key: {}", public_path.display());
        println!("   Secret key: {}", secret_path.display());
        Ok(0)
    }
}
