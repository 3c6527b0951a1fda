//! Optional encrypted backup of `config.ini` to a remote endpoint. Hybrid
//! encryption: a fresh AES-256 key (CBC, PKCS#7 padding, random IV)
//! encrypts the config; the AES key is itself wrapped with the server's
//! RSA-OAEP(SHA-256) public key. Grounded on
//! `original_source/video_grouper/api_integrations/cloud_sync.py`, with
//! the configured `public_key_pem` used in place of the original's
//! self-generated throwaway key pair — a payload the server can't actually
//! decrypt isn't a sync, so this deviates from the original's demo
//! shortcut and uses a real server key per spec.md's wire contract.

use std::collections::HashMap;
use std::path::Path;

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use ini::Ini;
use rand::rngs::OsRng;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use serde::Serialize;
use sha2::Sha256;
use tracing::{info, warn};

use crate::config::CloudSyncConfig;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

#[derive(Serialize)]
struct EncryptedData {
    encrypted_data: String,
    encrypted_key: String,
    iv: String,
    algorithm: &'static str,
}

#[derive(Serialize)]
struct SyncPayload {
    username: String,
    encrypted_data: EncryptedData,
}

/// Reads `config_path`, encrypts it, and POSTs it to `cfg.endpoint_url`.
/// A missing public key, malformed key, or request failure is logged and
/// treated as "try again next cycle" rather than a hard error — cloud sync
/// is a best-effort convenience, not load-bearing for the pipeline.
pub async fn sync_once(cfg: &CloudSyncConfig, config_path: &Path) -> bool {
    if !cfg.enabled {
        return true;
    }
    let Some(endpoint_url) = cfg.endpoint_url.as_deref() else {
        warn!("cloud sync enabled but endpoint_url is not set; skipping");
        return false;
    };
    let Some(public_key_pem) = cfg.public_key_pem.as_deref() else {
        warn!("cloud sync enabled but public_key_pem is not set; skipping");
        return false;
    };

    let config_dict = match read_config_as_map(config_path) {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, "cloud sync could not read config.ini; skipping");
            return false;
        }
    };

    let encrypted = match encrypt_config(&config_dict, public_key_pem) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "cloud sync encryption failed; skipping");
            return false;
        }
    };

    let payload = SyncPayload {
        username: cfg.username.clone(),
        encrypted_data: encrypted,
    };

    let client = reqwest::Client::new();
    let result = client
        .post(endpoint_url)
        .basic_auth(&cfg.username, Some(&cfg.password))
        .json(&payload)
        .send()
        .await;

    match result {
        Ok(resp) if resp.status().is_success() => {
            info!("configuration successfully synced to cloud");
            true
        }
        Ok(resp) => {
            warn!(status = %resp.status(), "cloud sync upload rejected");
            false
        }
        Err(e) => {
            warn!(error = %e, "cloud sync request failed");
            false
        }
    }
}

fn read_config_as_map(config_path: &Path) -> Result<HashMap<String, HashMap<String, String>>, String> {
    let ini = Ini::load_from_file(config_path).map_err(|e| e.to_string())?;
    let mut out = HashMap::new();
    for (name, props) in ini.iter() {
        let Some(name) = name else { continue };
        let section: HashMap<String, String> = props.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect();
        out.insert(name.to_owned(), section);
    }
    Ok(out)
}

fn encrypt_config(
    config: &HashMap<String, HashMap<String, String>>,
    public_key_pem: &str,
) -> Result<EncryptedData, String> {
    let data_bytes = serde_json::to_vec(config).map_err(|e| e.to_string())?;

    let mut aes_key = [0u8; 32];
    let mut iv = [0u8; 16];
    rand::Rng::fill(&mut rand::thread_rng(), &mut aes_key);
    rand::Rng::fill(&mut rand::thread_rng(), &mut iv);

    let encrypted_data = Aes256CbcEnc::new(&aes_key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(&data_bytes);

    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem).map_err(|e| e.to_string())?;
    let encrypted_key = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &aes_key)
        .map_err(|e| e.to_string())?;

    let engine = base64::engine::general_purpose::STANDARD;
    Ok(EncryptedData {
        encrypted_data: engine.encode(encrypted_data),
        encrypted_key: engine.encode(encrypted_key),
        iv: engine.encode(iv),
        algorithm: "AES-256-CBC+RSA-OAEP",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
    use rsa::RsaPrivateKey;

    fn test_keypair_pem() -> String {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let _ = private_key.to_pkcs8_pem(Default::default()).unwrap();
        public_key.to_public_key_pem(Default::default()).unwrap()
    }

    #[test]
    fn encrypt_config_produces_base64_fields_of_expected_shape() {
        let pem = test_keypair_pem();
        let mut section = HashMap::new();
        section.insert("device_ip".to_owned(), "10.0.0.5".to_owned());
        let mut config = HashMap::new();
        config.insert("CAMERA".to_owned(), section);

        let encrypted = encrypt_config(&config, &pem).unwrap();
        assert_eq!(encrypted.algorithm, "AES-256-CBC+RSA-OAEP");
        let engine = base64::engine::general_purpose::STANDARD;
        assert!(engine.decode(&encrypted.encrypted_data).is_ok());
        assert!(engine.decode(&encrypted.encrypted_key).is_ok());
        assert_eq!(engine.decode(&encrypted.iv).unwrap().len(), 16);
    }

    #[test]
    fn encrypt_config_rejects_malformed_public_key() {
        let mut config = HashMap::new();
        config.insert("A".to_owned(), HashMap::new());
        assert!(encrypt_config(&config, "not a pem key").is_err());
    }
}
