//! Splitting a value into two alphanumeric terms that add up to it.
//!
//! Values in a main hash are stored as sums of two alphanumeric strings. Each
//! byte of the sum is split independently; every pair of alphanumeric bytes
//! adds to at most 0xf4 so no carry ever crosses into the next byte.

/// Smallest byte two alphanumeric characters can sum to ('0' + '0')
pub const MIN_SUM_BYTE: u8 = 0x60;

/// Largest byte two alphanumeric characters can sum to ('z' + 'z')
pub const MAX_SUM_BYTE: u8 = 0xf4;

// One fixed pair per reachable sum, indexed by `sum - MIN_SUM_BYTE`
#[rustfmt::skip]
const PAIRS: [[u8; 2]; 149] = [
    *b"00", *b"10", *b"20", *b"30", *b"40", *b"50", *b"60", *b"70", *b"80", *b"90",
    *b"91", *b"92", *b"93", *b"94", *b"95", *b"96", *b"97", *b"A0", *b"B0", *b"C0",
    *b"D0", *b"E0", *b"F0", *b"G0", *b"H0", *b"I0", *b"J0", *b"K0", *b"L0", *b"M0",
    *b"N0", *b"O0", *b"P0", *b"Q0", *b"R0", *b"S0", *b"T0", *b"U0", *b"V0", *b"W0",
    *b"X0", *b"Y0", *b"Z0", *b"Z1", *b"Z2", *b"Z3", *b"Z4", *b"Z5", *b"Z6", *b"Z7",
    *b"Z8", *b"Z9", *b"SA", *b"TA", *b"UA", *b"VA", *b"WA", *b"XA", *b"YA", *b"ZA",
    *b"ZB", *b"ZC", *b"ZD", *b"ZE", *b"ZF", *b"ZG", *b"ZH", *b"ZI", *b"ZJ", *b"ZK",
    *b"ZL", *b"ZM", *b"ZN", *b"ZO", *b"ZP", *b"ZQ", *b"ZR", *b"ZS", *b"ZT", *b"ZU",
    *b"ZV", *b"ZW", *b"ZX", *b"ZY", *b"ZZ", *b"Ta", *b"Ua", *b"Va", *b"Wa", *b"Xa",
    *b"Ya", *b"Za", *b"Zb", *b"Zc", *b"Zd", *b"Ze", *b"Zf", *b"Zg", *b"Zh", *b"Zi",
    *b"Zj", *b"Zk", *b"Zl", *b"Zm", *b"Zn", *b"Zo", *b"Zp", *b"Zq", *b"Zr", *b"Zs",
    *b"Zt", *b"Zu", *b"Zv", *b"Zw", *b"Zx", *b"Zy", *b"Zz", *b"ta", *b"ua", *b"va",
    *b"wa", *b"xa", *b"ya", *b"za", *b"zb", *b"zc", *b"zd", *b"ze", *b"zf", *b"zg",
    *b"zh", *b"zi", *b"zj", *b"zk", *b"zl", *b"zm", *b"zn", *b"zo", *b"zp", *b"zq",
    *b"zr", *b"zs", *b"zt", *b"zu", *b"zv", *b"zw", *b"zx", *b"zy", *b"zz",
];

/// Split a single sum byte into two alphanumeric bytes
pub fn split_sum_byte(sum: u8) -> Result<(u8, u8), super::Error> {
    if !(MIN_SUM_BYTE..=MAX_SUM_BYTE).contains(&sum) {
        return Err(super::Error::SumByte(sum));
    }
    let [a, b] = PAIRS[(sum - MIN_SUM_BYTE) as usize];
    Ok((a, b))
}

/// Split every byte of `sum` into the matching positions of `a` and `b`
pub fn split_sum(sum: &[u8], a: &mut [u8], b: &mut [u8]) -> Result<(), super::Error> {
    if a.len() < sum.len() || b.len() < sum.len() {
        return Err(super::Error::TermLength(sum.len()));
    }
    for (i, &byte) in sum.iter().enumerate() {
        (a[i], b[i]) = split_sum_byte(byte)?;
    }
    Ok(())
}

/// Two alphanumeric 16-bit terms (little-endian) that add up to `sum`
pub fn split_sum16(sum: u16) -> Result<(u16, u16), super::Error> {
    let (mut a, mut b) = ([0; 2], [0; 2]);
    split_sum(&sum.to_le_bytes(), &mut a, &mut b)?;
    Ok((u16::from_le_bytes(a), u16::from_le_bytes(b)))
}

/// Two alphanumeric 32-bit terms (little-endian) that add up to `sum`
pub fn split_sum32(sum: u32) -> Result<(u32, u32), super::Error> {
    let (mut a, mut b) = ([0; 4], [0; 4]);
    split_sum(&sum.to_le_bytes(), &mut a, &mut b)?;
    Ok((u32::from_le_bytes(a), u32::from_le_bytes(b)))
}

/// Whether every byte is an ASCII letter or digit
pub fn is_alphanumeric(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_alphanumeric)
}
