mod alnum;
mod error;
mod ext;
mod hwid;
mod keys;
mod license;
mod password;
pub mod pattern;
mod process;
mod secret;
pub mod stage;
pub mod tea;

pub use {
    alnum::*, error::*, ext::*, hwid::*, keys::*, license::*, password::*, process::*, secret::*,
};

/// Size of one RSA block inside the protected license file
pub const RSA_BLOCK_SIZE: u64 = 0x80;

/// Length of the alphanumeric password embedded in a main hash
pub const PASSWORD_LEN: usize = 32;

/// Number of leading license file bytes used to recognise its in-memory copies
pub const FINGERPRINT_LEN: usize = 8;
