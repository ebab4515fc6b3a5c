//! Byte-level predicates for the handful of x86 instruction forms the stages
//! look for.
//!
//! These only recognise the specific encodings below, not x86 in general.
//! The forms stay stable across protected builds even though the code around
//! them is virtualized differently every time.
//!
//! ModR/M: `mod` in bits 7..6, `reg` in 5..3, `r/m` in 2..0.

use crate::Reg;

/// Bytes to fetch from the target to test any of the predicates
pub const MAX_PATTERN_LEN: usize = 5;

/// Length of `cmp word ptr [reg1], reg2` without SIB or displacement
pub const WORD_CMP_LEN: u32 = 3;

const MODRM_MOD: u8 = 0b1100_0000;
const RM_SIB: u8 = 0b100;
const RM_DISP32: u8 = 0b101;

/// `call rel32` (E8 xx xx xx xx)
pub fn is_near_call(code: &[u8]) -> bool {
    code.len() >= 5 && code[0] == 0xe8
}

/// Destination of a `call rel32` located at `address`
pub fn near_call_target(address: u32, code: &[u8]) -> Option<u32> {
    is_near_call(code).then(|| {
        let rel = u32::from_le_bytes([code[1], code[2], code[3], code[4]]);
        address.wrapping_add(5).wrapping_add(rel)
    })
}

/// `cmp word ptr [reg1], reg2` (66 39 /r) with a plain register operand:
/// mod 00, no SIB, no disp32, and neither register esp nor ebp
pub fn is_word_reg_cmp(code: &[u8]) -> bool {
    let [0x66, 0x39, modrm, ..] = code else {
        return false;
    };
    let rm = modrm & 0b111;
    modrm & MODRM_MOD == 0
        && rm != RM_SIB
        && rm != RM_DISP32
        && !Reg::from_modrm(modrm >> 3).is_stack_frame()
}

/// Operand registers of a matching [`is_word_reg_cmp`]: (memory base, compared)
pub fn word_reg_cmp_operands(code: &[u8]) -> Option<(Reg, Reg)> {
    is_word_reg_cmp(code).then(|| (Reg::from_modrm(code[2]), Reg::from_modrm(code[2] >> 3)))
}

/// `shr dword ptr [reg], cl` (D3 /5 with mod 00)
pub fn is_shr_dword(code: &[u8]) -> bool {
    matches!(code, [0xd3, modrm, ..] if modrm >> 3 == 5)
}
