use crate::{alnum, tea, PASSWORD_LEN};
use byteorder::{ReadBytesExt, LE};
use std::io;

/// Length of a main hash string
pub const MAIN_HASH_LEN: usize = 104;

/// Stand-in for terms the target never checks
const FILLER: u32 = u32::from_le_bytes(*b"aaaa");

/// The values derived from a main hash, assembled stage by stage.
///
/// Each recovered field has exactly one stage writing it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveredSecret {
    /// Never checked by the target, only structurally required
    pub hash_1: u32,
    pub hash_2: u32,
    pub hash_3: Option<u16>,
    pub tea_key: Option<[u32; 4]>,
    pub password: Option<[u8; PASSWORD_LEN]>,
    pub hwid_key: u32,
}

fn fill<T: std::fmt::Debug>(slot: &mut Option<T>, value: T, name: &str) {
    match slot {
        Some(existing) => log::warn!("{name} already recovered as {existing:x?}, ignoring {value:x?}"),
        None => *slot = Some(value),
    }
}

impl RecoveredSecret {
    pub fn set_hash_3(&mut self, hash_3: u16) {
        fill(&mut self.hash_3, hash_3, "hash_3");
    }

    pub fn set_tea_key(&mut self, key: [u32; 4]) {
        fill(&mut self.tea_key, key, "TEA key");
    }

    pub fn set_password(&mut self, password: [u8; PASSWORD_LEN]) {
        fill(&mut self.password, password, "password");
    }

    pub fn password_str(&self) -> Option<&str> {
        self.password
            .as_ref()
            .and_then(|p| std::str::from_utf8(p).ok())
    }
}

/// Binary layout of a main hash. Every derived value is stored as two
/// alphanumeric terms that add up to it.
#[derive(Clone, PartialEq, Eq)]
pub struct MainHash {
    pub unused_1: [u32; 2],
    pub hash_1: [u32; 2],
    pub hash_2: [u32; 2],
    pub hash_3: [u16; 2],
    /// `tea_key[0][i] + tea_key[1][i]` gives key word `i`
    pub tea_key: [[u32; 4]; 2],
    pub unused_2: [u32; 2],
    pub password: [u8; PASSWORD_LEN],
    pub hwid_key: u32,
}

/// Alphanumeric terms for one key half, falling back to the equivalent twin
/// when a word has a byte no two alphanumerics add up to
fn split_key_half(half: [u32; 2]) -> Result<[(u32, u32); 2], super::Error> {
    let split = |half: [u32; 2]| -> Result<[(u32, u32); 2], super::Error> {
        Ok([alnum::split_sum32(half[0])?, alnum::split_sum32(half[1])?])
    };
    split(half).or_else(|err| {
        let twin = tea::twin(half);
        log::debug!("key half {half:08x?} not representable ({err}), trying {twin:08x?}");
        split(twin).map_err(|_| err)
    })
}

impl MainHash {
    /// Build a main hash producing the recovered values. It generally differs
    /// from the one originally used to protect the program; unchecked terms
    /// are filler.
    pub fn synthesize(secret: &RecoveredSecret) -> Result<Self, super::Error> {
        let hash_3 = secret.hash_3.ok_or(super::Error::Incomplete("hash_3"))?;
        let key = secret.tea_key.ok_or(super::Error::Incomplete("TEA key"))?;
        let password = secret.password.ok_or(super::Error::Incomplete("password"))?;

        let (h3a, h3b) = alnum::split_sum16(hash_3)?;
        let mut tea_key = [[0; 4]; 2];
        for half in 0..2 {
            let terms = split_key_half([key[2 * half], key[2 * half + 1]])?;
            for (i, (a, b)) in terms.into_iter().enumerate() {
                tea_key[0][2 * half + i] = a;
                tea_key[1][2 * half + i] = b;
            }
        }
        Ok(Self {
            unused_1: [FILLER; 2],
            hash_1: [FILLER; 2],
            hash_2: [FILLER; 2],
            hash_3: [h3a, h3b],
            tea_key,
            unused_2: [FILLER; 2],
            password,
            hwid_key: FILLER,
        })
    }

    /// Values the target derives from this main hash
    pub fn derive(&self) -> RecoveredSecret {
        let sum = |pair: [u32; 2]| pair[0].wrapping_add(pair[1]);
        let mut tea_key = [0; 4];
        for (i, word) in tea_key.iter_mut().enumerate() {
            *word = sum([self.tea_key[0][i], self.tea_key[1][i]]);
        }
        RecoveredSecret {
            hash_1: sum(self.hash_1),
            hash_2: sum(self.hash_2),
            hash_3: Some(self.hash_3[0].wrapping_add(self.hash_3[1])),
            tea_key: Some(tea_key),
            password: Some(self.password),
            hwid_key: self.hwid_key,
        }
    }

    pub fn read<R: io::Read>(reader: &mut R) -> Result<Self, super::Error> {
        let mut pair = || -> Result<[u32; 2], super::Error> {
            Ok([reader.read_u32::<LE>()?, reader.read_u32::<LE>()?])
        };
        let unused_1 = pair()?;
        let hash_1 = pair()?;
        let hash_2 = pair()?;
        let hash_3 = [reader.read_u16::<LE>()?, reader.read_u16::<LE>()?];
        let mut tea_key = [[0; 4]; 2];
        for terms in &mut tea_key {
            reader.read_u32_into::<LE>(terms)?;
        }
        let unused_2 = [reader.read_u32::<LE>()?, reader.read_u32::<LE>()?];
        let mut password = [0; PASSWORD_LEN];
        reader.read_exact(&mut password)?;
        if !alnum::is_alphanumeric(&password) {
            return Err(super::Error::Password);
        }
        let hwid_key = reader.read_u32::<LE>()?;
        Ok(Self {
            unused_1,
            hash_1,
            hash_2,
            hash_3,
            tea_key,
            unused_2,
            password,
            hwid_key,
        })
    }

    pub fn write<W: io::Write>(&self, writer: &mut W) -> Result<(), super::Error> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MAIN_HASH_LEN);
        for word in self.unused_1.iter().chain(&self.hash_1).chain(&self.hash_2) {
            buf.extend_from_slice(&word.to_le_bytes());
        }
        for half in self.hash_3 {
            buf.extend_from_slice(&half.to_le_bytes());
        }
        for word in self.tea_key.iter().flatten().chain(&self.unused_2) {
            buf.extend_from_slice(&word.to_le_bytes());
        }
        buf.extend_from_slice(&self.password);
        buf.extend_from_slice(&self.hwid_key.to_le_bytes());
        buf
    }
}

impl std::str::FromStr for MainHash {
    type Err = super::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end_matches(['\0', '\r', '\n']);
        if s.len() != MAIN_HASH_LEN {
            return Err(super::Error::MainHashLength {
                expected: MAIN_HASH_LEN,
                got: s.len(),
            });
        }
        Self::read(&mut s.as_bytes())
    }
}

impl std::fmt::Display for MainHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

impl std::fmt::Debug for MainHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MainHash({self})")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_layout_offsets() {
        let mut secret = RecoveredSecret::default();
        secret.set_hash_3(0x9494);
        secret.set_tea_key([0x6060_6060; 4]);
        secret.set_password(*b"0123456789abcdefghijABCDEFGHIJkl");
        let bytes = MainHash::synthesize(&secret).unwrap().to_bytes();

        assert_eq!(bytes.len(), MAIN_HASH_LEN);
        assert_eq!(&bytes[..24], &[b'a'; 24]);
        assert_eq!(&bytes[24..28], b"SSAA");
        assert_eq!(&bytes[28..60], &[b'0'; 32]);
        assert_eq!(&bytes[60..68], &[b'a'; 8]);
        assert_eq!(&bytes[68..100], b"0123456789abcdefghijABCDEFGHIJkl");
        assert_eq!(&bytes[100..], b"aaaa");
    }

    #[test]
    fn test_write_matches_bytes() {
        let mut secret = RecoveredSecret::default();
        secret.set_hash_3(0xa0c5);
        secret.set_tea_key([0x7f7e_7d7c, 0x6162_6364, 0x9999_9999, 0xe4e4_e4e4]);
        secret.set_password(*b"ZYXWVUTSRQPONMLKJIHGFEDCBA987654");
        let main_hash = MainHash::synthesize(&secret).unwrap();

        let mut written = vec![];
        main_hash.write(&mut written).unwrap();
        assert_eq!(written, main_hash.to_bytes());
        assert_eq!(MainHash::read(&mut written.as_slice()).unwrap(), main_hash);
    }

    #[test]
    fn test_fill_once() {
        let mut secret = RecoveredSecret::default();
        secret.set_hash_3(1);
        secret.set_hash_3(2);
        assert_eq!(secret.hash_3, Some(1));
    }
}
