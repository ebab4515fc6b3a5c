//! Stage 3: find the license password.
//!
//! The password routine is located through its seed constant. Somewhere in
//! it a pointer to the password gets written; every 4-byte write is checked
//! for pointing at 32 alphanumeric characters. The first hit is taken and
//! then checked by re-encrypting the license's first dword with it.

use super::{Access, Payload, Session, Transition};
use crate::{
    is_alphanumeric, password_encrypt, Error, Process, ProcessExt, PASSWORD_LEN,
    PASSWORD_SEED,
};

/// The last dword of the buffer the target decrypts with the password
const LAST_DWORD: u32 = 0x2c;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
    #[default]
    Inactive,
    FindRoutine,
    FindPassword,
    Verify,
    Finish,
}

#[derive(Debug, Default)]
pub struct PasswordDiscovery {
    phase: Phase,
    decrypted: u32,
    /// First dword of the license before password decryption
    leading: u32,
}

impl PasswordDiscovery {
    pub(super) fn init<P: Process + ?Sized>(
        &mut self,
        process: &P,
        payload: Payload,
    ) -> Result<(), Error> {
        self.decrypted = payload.address()?;
        self.leading = process.read_u32(self.decrypted)?;
        log::info!("Searching for password decrypt routine...");
        self.phase = Phase::FindRoutine;
        Ok(())
    }

    pub(super) fn on_instruction(&mut self) -> Transition {
        if self.phase != Phase::Finish {
            return Transition::Stay;
        }
        self.phase = Phase::Inactive;
        Transition::Advance(Payload::Address(self.decrypted))
    }

    pub(super) fn on_read<P: Process + ?Sized>(&mut self, process: &P, access: Access) -> Transition {
        if self.phase == Phase::FindRoutine
            && access.size == 1
            && process.read_u32(access.ea).ok() == Some(PASSWORD_SEED)
        {
            log::info!("Password decrypt routine found near {:#x}", access.address);
            log::info!("Searching for password...");
            self.phase = Phase::FindPassword;
        }
        Transition::Stay
    }

    pub(super) fn on_write<P: Process + ?Sized>(
        &mut self,
        process: &P,
        session: &mut Session,
        access: Access,
    ) -> Result<Transition, Error> {
        if access.size != 4 {
            return Ok(Transition::Stay);
        }
        match self.phase {
            Phase::FindPassword => {
                if let Some(password) = pointed_password(process, access.ea) {
                    log::info!("Password found: {}", String::from_utf8_lossy(&password));
                    session.secret.set_password(password);
                    self.phase = Phase::Verify;
                }
            }
            Phase::Verify if access.ea == self.decrypted.wrapping_add(LAST_DWORD) => {
                let Some(password) = session.secret.password else {
                    return Err(Error::Incomplete("password"));
                };
                let decrypted = process.read_u32(self.decrypted)?;
                let valid = password_encrypt(self.leading, &password) == decrypted;
                if valid {
                    log::info!("Verifying password... valid");
                } else {
                    log::warn!("Verifying password... invalid");
                }
                session.password_valid = Some(valid);
                self.phase = Phase::Finish;
            }
            _ => {}
        }
        Ok(Transition::Stay)
    }
}

/// The password a pointer stored at `slot` refers to, if it looks like one
fn pointed_password<P: Process + ?Sized>(process: &P, slot: u32) -> Option<[u8; PASSWORD_LEN]> {
    let pointer = process.read_u32(slot).ok()?;
    let mut password = [0; PASSWORD_LEN];
    process.read(pointer, &mut password).ok()?;
    is_alphanumeric(&password).then_some(password)
}
