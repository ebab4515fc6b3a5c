use crate::ext::{ReadExt, WriteExt};
use byteorder::{ByteOrder, ReadBytesExt, WriteBytesExt, LE};
use std::io;

/// Size of a 32-bit multiprecision integer record: used, alloc, sign, digit pointer
pub const MP_INT_SIZE: usize = 16;

/// Upper bound on digits accepted when reading a record back out of the target
const MAX_DIGITS: u32 = 0x400;

/// RSA public key as arbitrary-precision digit sequences, least significant
/// digit first.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub modulus: Vec<u32>,
    pub exponent: Vec<u32>,
}

impl PublicKey {
    /// Lay out `digits` as a record whose digit array lives at `digits_at`
    pub fn mp_int_image(digits: &[u32], digits_at: u32) -> [u8; MP_INT_SIZE] {
        let used = digits.len() as u32;
        let mut image = [0; MP_INT_SIZE];
        LE::write_u32_into(&[used, used, 0, digits_at], &mut image);
        image
    }

    /// Read the digits of a record living in target memory
    pub fn read_mp_int<P: crate::Process + ?Sized>(
        process: &P,
        address: u32,
    ) -> Result<Vec<u32>, super::Error> {
        use crate::ProcessExt;
        let used = process.read_u32(address)?;
        if used > MAX_DIGITS {
            return Err(super::Error::DigitCount { address, used });
        }
        let digits_at = process.read_u32(address.wrapping_add(12))?;
        let bytes = process.read_len(digits_at, used as usize * 4)?;
        let mut digits = vec![0; used as usize];
        (&bytes[..]).read_u32_into::<LE>(&mut digits)?;
        Ok(digits)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("modulus_digits", &self.modulus.len())
            .field("exponent_digits", &self.exponent.len())
            .finish()
    }
}

/// Target addresses of a key's records once placed into the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedKey {
    pub modulus: u32,
    pub exponent: u32,
}

/// The two public keys matching our license file.
///
/// `first` verifies the signature, `second` decrypts the license blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    pub first: PublicKey,
    pub second: PublicKey,
}

impl KeyStore {
    /// Key file layout: four digit counts (modulus 1, exponent 1, modulus 2,
    /// exponent 2) followed by the digit arrays in the same order
    pub fn read<R: io::Read>(reader: &mut R) -> Result<Self, super::Error> {
        let mut head = [0; 4];
        reader
            .read_exact(&mut head)
            .map_err(|_| super::Error::KeyFile("missing header"))?;
        if head.contains(&0) {
            return Err(super::Error::KeyFile("zero digit count"));
        }
        let mut digits = |len: u8| {
            reader
                .read_digits(len as usize)
                .map_err(|_| super::Error::KeyFile("truncated digits"))
        };
        let first = PublicKey {
            modulus: digits(head[0])?,
            exponent: digits(head[1])?,
        };
        let second = PublicKey {
            modulus: digits(head[2])?,
            exponent: digits(head[3])?,
        };
        Ok(Self { first, second })
    }

    pub fn write<W: io::Write>(&self, writer: &mut W) -> Result<(), super::Error> {
        let keys = [&self.first, &self.second];
        for key in keys {
            for digits in [&key.modulus, &key.exponent] {
                let len = u8::try_from(digits.len())
                    .ok()
                    .filter(|len| *len != 0)
                    .ok_or(super::Error::KeyFile("digit count out of range"))?;
                writer.write_u8(len)?;
            }
        }
        for key in keys {
            writer.write_digits(&key.modulus)?;
            writer.write_digits(&key.exponent)?;
        }
        Ok(())
    }
}

/// Place both records of `key` into the target
pub fn place_key<P: crate::Process + ?Sized>(
    process: &mut P,
    key: &PublicKey,
) -> Result<PlacedKey, super::Error> {
    let mut place = |digits: &[u32]| -> Result<u32, super::Error> {
        let mut bytes = Vec::with_capacity(digits.len() * 4);
        bytes.write_digits(digits)?;
        let digits_at = process.place(&bytes)?;
        process.place(&PublicKey::mp_int_image(digits, digits_at))
    };
    Ok(PlacedKey {
        modulus: place(&key.modulus)?,
        exponent: place(&key.exponent)?,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mp_int_image() {
        let image = PublicKey::mp_int_image(&[1, 2, 3], 0x0040_1000);
        assert_eq!(
            image,
            [3, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0x00, 0x10, 0x40, 0x00]
        );
    }

    #[test]
    fn test_read_rejects_zero_count() {
        let bytes = [1u8, 0, 1, 1, 0, 0, 0, 0];
        assert!(matches!(
            KeyStore::read(&mut &bytes[..]),
            Err(crate::Error::KeyFile(_))
        ));
    }
}
