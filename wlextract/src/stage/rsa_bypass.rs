//! Stage 1: substitute our public keys into the target's RSA routine.
//!
//! The RSA code is linked in unvirtualized, so the path from the first read
//! of the encrypted license to the exponentiation primitive is stable enough
//! to follow by stack layout: the import routine's return address leads back
//! into the exponentiation wrapper, and the call following the second read
//! of a local key pointer is the primitive itself.

use super::{Payload, Session, Transition};
use crate::{pattern, place_key, Context, Error, PlacedKey, Process, ProcessExt, PublicKey, Reg};

/// Return address into the exponentiation wrapper, relative to esp on the
/// read of the encrypted license
const RETURN_ADDRESS: u32 = 8;
/// Destination of the decrypted license, relative to esp back in the wrapper
const DECRYPTED_BUFFER: u32 = 0x8c;
/// Local key pointer slot, relative to ebp in the wrapper
const KEY_SLOT: u32 = 0x1c;
/// Exponent and modulus arguments, relative to esp on entry to the primitive
const EXPONENT_ARG: u32 = 8;
const MODULUS_ARG: u32 = 0xc;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
    #[default]
    Inactive,
    FindBufferRead,
    ReturnToWrapper,
    CountSlotReads,
    FindExptmodCall,
    HookExptmod,
    Finish,
    Detached,
}

#[derive(Debug, Default)]
pub struct RsaBypass {
    phase: Phase,
    encrypted: u32,
    decrypted: u32,
    calls_before_verify: u64,
    return_address: u32,
    key_slot: u32,
    slot_reads: u32,
    exptmod: u32,
    calls: u64,
    /// (decryption key, signature key) once placed into the target
    placed: Option<(PlacedKey, PlacedKey)>,
    logged_stored: bool,
}

impl RsaBypass {
    pub(super) fn init(&mut self, session: &Session, payload: Payload) -> Result<(), Error> {
        self.encrypted = payload.address()?;
        self.calls_before_verify = session.license.decrypt_calls();
        log::info!("Searching for mp_exptmod...");
        self.phase = Phase::FindBufferRead;
        Ok(())
    }

    /// Address of the license copy the search starts from
    pub fn encrypted_buffer(&self) -> u32 {
        self.encrypted
    }

    /// Destination of the RSA decrypted license, once found
    pub fn decrypted_buffer(&self) -> Option<u32> {
        (self.decrypted != 0).then_some(self.decrypted)
    }

    /// Entry point of the exponentiation primitive, once found
    pub fn exptmod(&self) -> Option<u32> {
        (self.exptmod != 0).then_some(self.exptmod)
    }

    pub(super) fn on_read<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        access: super::Access,
        context: &Context,
    ) -> Result<Transition, Error> {
        match self.phase {
            Phase::FindBufferRead if access.ea == self.encrypted => {
                log::info!(
                    "License copy read at: {:#x} (inside mp_read_unsigned_bin)",
                    access.address
                );
                let esp = context.get(Reg::Esp);
                self.return_address = process.read_u32(esp.wrapping_add(RETURN_ADDRESS))?;
                log::info!("Return to rsa_exptmod: {:#x}", self.return_address);
                self.phase = Phase::ReturnToWrapper;
            }
            Phase::CountSlotReads if access.ea == self.key_slot => {
                log::debug!("[ebp+{KEY_SLOT:#x}] read at {:#x}", access.address);
                self.slot_reads += 1;
                // the call after the second read is the primitive
                if self.slot_reads > 1 {
                    self.phase = Phase::FindExptmodCall;
                }
            }
            _ => {}
        }
        Ok(Transition::Stay)
    }

    pub(super) fn on_instruction<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        session: &Session,
        address: u32,
        context: &Context,
    ) -> Result<Transition, Error> {
        match self.phase {
            Phase::ReturnToWrapper if address == self.return_address => {
                log::info!("Back in rsa_exptmod at {address:#x}");
                let esp = context.get(Reg::Esp);
                self.decrypted = process.read_u32(esp.wrapping_add(DECRYPTED_BUFFER))?;
                log::info!("Rsa decrypted license destination: {:#x}", self.decrypted);
                self.key_slot = context.get(Reg::Ebp).wrapping_add(KEY_SLOT);
                self.phase = Phase::CountSlotReads;
            }
            Phase::FindExptmodCall => {
                let Ok(code) = process.read_len(address, pattern::MAX_PATTERN_LEN) else {
                    return Ok(Transition::Stay);
                };
                if let Some(target) = pattern::near_call_target(address, &code) {
                    log::info!("Found mp_exptmod: {target:#x}");
                    self.exptmod = target;
                    self.phase = Phase::HookExptmod;
                }
            }
            Phase::HookExptmod if address == self.exptmod => {
                self.swap_keys(process, session, context)?;
            }
            Phase::Finish if session.license.is_launch_mode() => {
                // let the target run on its own from here
                process.remove_instrumentation();
                self.phase = Phase::Detached;
                return Ok(Transition::Detach);
            }
            Phase::Finish => {
                self.phase = Phase::Inactive;
                return Ok(Transition::Advance(Payload::Address(self.decrypted)));
            }
            _ => {}
        }
        Ok(Transition::Stay)
    }

    /// On entry to the primitive: the license is decrypted block by block with
    /// the second key, then the signature is checked with the first
    fn swap_keys<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        session: &Session,
        context: &Context,
    ) -> Result<(), Error> {
        let keys = session.license.keys();
        let (decrypt, verify) = match self.placed {
            Some(placed) => placed,
            None => {
                let placed = (
                    place_key(process, &keys.second)?,
                    place_key(process, &keys.first)?,
                );
                self.placed = Some(placed);
                placed
            }
        };

        let esp = context.get(Reg::Esp);
        let exponent_arg = esp.wrapping_add(EXPONENT_ARG);
        let modulus_arg = esp.wrapping_add(MODULUS_ARG);

        let key = if self.calls < self.calls_before_verify {
            if !self.logged_stored {
                log::info!("Swapping rsa_public_key2");
                log_stored_key(&*process, exponent_arg, modulus_arg);
                self.logged_stored = true;
            }
            decrypt
        } else {
            log::info!("Swapping rsa_public_key1");
            log_stored_key(&*process, exponent_arg, modulus_arg);
            self.phase = Phase::Finish;
            verify
        };
        process.write_u32(exponent_arg, key.exponent)?;
        process.write_u32(modulus_arg, key.modulus)?;
        self.calls += 1;
        Ok(())
    }
}

/// Log the digits of the key the target was about to use
fn log_stored_key<P: Process + ?Sized>(process: &P, exponent_arg: u32, modulus_arg: u32) {
    let digits = |arg: u32| {
        process
            .read_u32(arg)
            .and_then(|mp| PublicKey::read_mp_int(process, mp))
    };
    match (digits(exponent_arg), digits(modulus_arg)) {
        (Ok(exponent), Ok(modulus)) => {
            log::info!("Stored exp (mp_int digits): {exponent:x?}");
            log::info!("Stored mod (mp_int digits): {modulus:x?}");
        }
        (Err(err), _) | (_, Err(err)) => log::debug!("stored key unreadable: {err}"),
    }
}
