//! The TEA variant used by the license scheme and the differential key solver.
//!
//! Every half-round of decryption has the shape
//!
//! ```text
//! b' = b - ((a << 4) + (key2 ^ a) + ((a >> 5) ^ sum) + key3)
//! ```
//!
//! The key words never appear on their own, but each `a >> 5` observed during
//! decryption is both the output of one half-round and the input of the next.
//! Collecting those gives `(key2 ^ a) + key3` for a range of `a` values, which
//! is enough to solve the key bit by bit.
//!
//! Names follow the (key2, key3) half; the (key0, key1) half is solved with the
//! same code.

/// Round constant step
pub const DELTA: u32 = 0x9e3779b9;

/// Rounds run over the license's leading block during validation
pub const ANALYSIS_ROUNDS: usize = 12;

/// Rounds used when encrypting whole license bodies
pub const LICENSE_ROUNDS: usize = 32;

/// Key bits recoverable through bit differences. Bit 31 only ever shifts
/// `(key2 ^ a) + key3` by a constant, so it is never observable.
const SOLVABLE_BITS: usize = 31;

const SOLVABLE_MASK: u32 = 0x7fff_ffff;

/// Round constants used by decryption, first round first
pub fn round_sums(rounds: usize) -> impl Iterator<Item = u32> {
    (1..=rounds as u32).rev().map(|i| DELTA.wrapping_mul(i))
}

fn mix(a: u32, sum: u32, k_xor: u32, k_add: u32) -> u32 {
    (a << 4)
        .wrapping_add(k_xor ^ a)
        .wrapping_add((a >> 5) ^ sum)
        .wrapping_add(k_add)
}

pub fn encrypt(block: &mut [u32; 2], key: &[u32; 4], rounds: usize) {
    let [mut a, mut b] = *block;
    let mut sum = 0u32;
    for _ in 0..rounds {
        sum = sum.wrapping_add(DELTA);
        a = a.wrapping_add(mix(b, sum, key[0], key[1]));
        b = b.wrapping_add(mix(a, sum, key[2], key[3]));
    }
    *block = [a, b];
}

pub fn decrypt(block: &mut [u32; 2], key: &[u32; 4], rounds: usize) {
    decrypt_traced(block, key, rounds, |_| {})
}

/// Decrypt while reporting every value that goes through the `>> 5` shift, in
/// execution order. These are exactly the values an observer of the shift
/// instruction sees.
pub fn decrypt_traced(
    block: &mut [u32; 2],
    key: &[u32; 4],
    rounds: usize,
    mut on_shift: impl FnMut(u32),
) {
    let [mut a, mut b] = *block;
    for sum in round_sums(rounds) {
        on_shift(a);
        b = b.wrapping_sub(mix(a, sum, key[2], key[3]));
        on_shift(b);
        a = a.wrapping_sub(mix(b, sum, key[0], key[1]));
    }
    *block = [a, b];
}

/// Encrypt a license body in place, 8 bytes at a time. A trailing partial
/// block is left untouched.
pub fn encrypt_blocks(buf: &mut [u8], key: &[u32; 4]) {
    use byteorder::{ByteOrder, LE};
    for chunk in buf.chunks_exact_mut(8) {
        let mut block = [LE::read_u32(&chunk[..4]), LE::read_u32(&chunk[4..])];
        encrypt(&mut block, key, LICENSE_ROUNDS);
        LE::write_u32_into(&block, chunk);
    }
}

/// One observed decryption half-round.
///
/// The difference term `(key2 ^ a) + key3` is derived once on construction;
/// the observation is immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfRound {
    pub a: u32,
    pub b: u32,
    pub sum: u32,
    pub b_prime: u32,
    diff_term: u32,
}

impl HalfRound {
    pub fn new(a: u32, b: u32, sum: u32, b_prime: u32) -> Self {
        // (key2 ^ a) + key3 = b - b' - (a << 4) - ((a >> 5) ^ sum)
        let diff_term = b
            .wrapping_sub(b_prime)
            .wrapping_sub(a << 4)
            .wrapping_sub((a >> 5) ^ sum);
        Self {
            a,
            b,
            sum,
            b_prime,
            diff_term,
        }
    }

    pub fn diff_term(&self) -> u32 {
        self.diff_term
    }

    pub fn key3_from_key2(&self, key2: u32) -> u32 {
        self.diff_term.wrapping_sub(key2 ^ self.a)
    }

    /// Whether `[key2, key3]` reproduces this half-round's output
    pub fn verify(&self, key: [u32; 2]) -> bool {
        self.b.wrapping_sub(mix(self.a, self.sum, key[0], key[1])) == self.b_prime
    }
}

/// For each solvable key bit, one observation whose `a` has that bit set and
/// one whose `a` has it clear.
#[derive(Debug)]
pub struct BitIndex {
    ones: [usize; SOLVABLE_BITS],
    zeros: [usize; SOLVABLE_BITS],
    ones_mask: u32,
    zeros_mask: u32,
}

impl BitIndex {
    pub fn new(observations: &[HalfRound]) -> Self {
        let mut index = Self {
            ones: [0; SOLVABLE_BITS],
            zeros: [0; SOLVABLE_BITS],
            ones_mask: 0,
            zeros_mask: 0,
        };
        for (i, obs) in observations.iter().enumerate() {
            for bit in 0..SOLVABLE_BITS {
                let flag = 1 << bit;
                if obs.a & flag != 0 {
                    if index.ones_mask & flag == 0 {
                        index.ones[bit] = i;
                        index.ones_mask |= flag;
                    }
                } else if index.zeros_mask & flag == 0 {
                    index.zeros[bit] = i;
                    index.zeros_mask |= flag;
                }
            }
            if index.solvable() == SOLVABLE_MASK {
                break;
            }
        }
        index
    }

    /// Bits with observations of both polarities
    pub fn solvable(&self) -> u32 {
        self.ones_mask & self.zeros_mask
    }

    /// Indices of the (zero, one) observations for a solvable bit
    pub fn pair(&self, bit: usize) -> Option<(usize, usize)> {
        (bit < SOLVABLE_BITS && self.solvable() & (1 << bit) != 0)
            .then(|| (self.zeros[bit], self.ones[bit]))
    }
}

/// The other key with identical behaviour: flipping bit 31 of both words
/// leaves `(key2 ^ a) + key3` unchanged for every `a`.
pub fn twin(key: [u32; 2]) -> [u32; 2] {
    [key[0] ^ 0x8000_0000, key[1] ^ 0x8000_0000]
}

/// Recover `[key2, key3]` from the observations of one key half.
///
/// Bits with observations of both polarities are solved directly; the
/// remaining bits are enumerated in ascending order and each candidate is
/// checked against every observation. Of the two twins the one with bit 31
/// of `key2` clear is returned.
pub fn solve(observations: &[HalfRound]) -> Result<[u32; 2], super::Error> {
    let first = observations.first().ok_or(super::Error::NoKeyFound)?;
    let index = BitIndex::new(observations);
    let solvable = index.solvable();

    let mut known = 0u32;
    for bit in 0..SOLVABLE_BITS {
        let Some((zero, one)) = index.pair(bit) else {
            continue;
        };
        let (a0, a1) = (observations[zero].a, observations[one].a);
        // c = (key2 ^ a0) - (key2 ^ a1), the key3 terms cancel
        let c = observations[zero]
            .diff_term()
            .wrapping_sub(observations[one].diff_term());
        // a0[n] = 0 and a1[n] = 1, so the borrow out of bit n is !key2[n]:
        // c[n+1] = a0[n+1] ^ a1[n+1] ^ !key2[n]
        let np1 = bit + 1;
        let k = !((a0 >> np1) ^ (a1 >> np1) ^ (c >> np1)) & 1;
        known |= k << bit;
    }
    log::trace!("fast-solved bits {solvable:#010x}, key2 partial {known:#010x}");

    let unknown = !solvable;
    let mut submask = 0u32;
    loop {
        let key2 = known | submask;
        let key3 = first.key3_from_key2(key2);
        if observations.iter().all(|o| o.key3_from_key2(key2) == key3) {
            return Ok([key2, key3]);
        }
        if submask == unknown {
            return Err(super::Error::NoKeyFound);
        }
        // next subset of `unknown` in ascending order
        submask = submask.wrapping_sub(unknown) & unknown;
    }
}
