use crate::{KeyStore, FINGERPRINT_LEN};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Everything known about the license file we substitute into the target,
/// plus the operator's flags. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct LicenseContext {
    path: PathBuf,
    fingerprint: [u8; FINGERPRINT_LEN],
    size: u64,
    keys: KeyStore,
    launch_mode: bool,
    skip_hwid: bool,
}

impl LicenseContext {
    pub fn new(path: PathBuf, fingerprint: [u8; FINGERPRINT_LEN], size: u64, keys: KeyStore) -> Self {
        Self {
            path,
            fingerprint,
            size,
            keys,
            launch_mode: false,
            skip_hwid: false,
        }
    }

    /// Load the license file and its matching key file
    pub fn load(
        license: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
    ) -> Result<Self, super::Error> {
        let license = license.as_ref();
        let bad_license = || super::Error::License(license.display().to_string());

        let path = std::path::absolute(license).map_err(|_| bad_license())?;
        let mut file = File::open(&path).map_err(|_| bad_license())?;
        let mut fingerprint = [0; FINGERPRINT_LEN];
        file.read_exact(&mut fingerprint)
            .map_err(|_| bad_license())?;
        let size = file.metadata()?.len();

        let key_file = File::open(key_file).map_err(|_| super::Error::KeyFile("cannot open"))?;
        let keys = KeyStore::read(&mut BufReader::new(key_file))?;

        log::debug!("license fingerprint {}", hex::encode(fingerprint));
        Ok(Self::new(path, fingerprint, size, keys))
    }

    /// Launch mode only bypasses the RSA check and lets the target run, so it
    /// never searches for a hardware id.
    pub fn launch_mode(mut self, launch_mode: bool) -> Self {
        self.launch_mode = launch_mode;
        self.skip_hwid |= launch_mode;
        self
    }

    pub fn skip_hwid(mut self, skip_hwid: bool) -> Self {
        self.skip_hwid = skip_hwid || self.launch_mode;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute path in the NT object namespace form the target opens files by
    pub fn nt_path(&self) -> String {
        format!(r"\??\{}", self.path.display())
    }

    pub fn fingerprint(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.fingerprint
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn is_launch_mode(&self) -> bool {
        self.launch_mode
    }

    pub fn is_skip_hwid(&self) -> bool {
        self.skip_hwid
    }

    /// Whether the run should end once secrets are recovered instead of
    /// waiting for the target to report its hardware id
    pub fn exits_early(&self) -> bool {
        self.skip_hwid && !self.launch_mode
    }

    /// Number of block decryptions preceding the signature check, one per
    /// started RSA block
    pub fn decrypt_calls(&self) -> u64 {
        self.size.div_ceil(super::RSA_BLOCK_SIZE)
    }
}
