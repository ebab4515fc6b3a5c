//! Password layer of the license format.
//!
//! A 32 character password seeds two 32-bit shift registers which are xor-ed
//! over the license buffer one dword at a time.

/// Seed constant of the password schedule. The protected program reads it
/// while decrypting, which is how its password routine gets located.
pub const PASSWORD_SEED: u32 = 0x41363233;

fn schedule(key: &[u8], mut shift: u32) -> u32 {
    // every key byte plus the terminating null is folded in
    for &ch in key.iter().chain(std::iter::once(&0)) {
        shift ^= (ch as u32) << 8;
        let mut counter = 0u16;
        loop {
            shift = (shift ^ (counter & 0xff) as u32).wrapping_add(0x7034616b);
            shift = shift.rotate_right(shift & 0xff);
            shift ^= 0x8372a5a7;
            counter = counter.wrapping_sub(1);
            if counter == 0 {
                break;
            }
        }
    }
    shift
}

fn registers(key: &[u8]) -> (u32, u32) {
    let first = key.first().copied().unwrap_or(0) as u32;
    let shift_b = schedule(key, PASSWORD_SEED ^ first);
    let shift_a = schedule(key, shift_b ^ (first << 8));
    (shift_a, shift_b)
}

/// Encrypt a single leading dword, enough to check a candidate password
/// against the target's own result
pub fn password_encrypt(value: u32, key: &[u8]) -> u32 {
    value ^ registers(key).0
}

/// Encrypt a run of dwords in place. The cipher is a keystream xor, so the
/// same call decrypts.
pub fn password_encrypt_words(words: &mut [u32], key: &[u8]) {
    let (mut shift_a, mut shift_b) = registers(key);
    for word in words {
        *word ^= shift_a;
        shift_b = shift_b.rotate_left(shift_a & 0xff);
        shift_a ^= shift_b;
        shift_a = shift_a.rotate_right((shift_b >> 8) & 0xff);
        shift_b = shift_b.wrapping_add(shift_a);
    }
}
