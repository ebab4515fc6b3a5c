//! Stage 2: recover hash_3 by catching the comparison against our license's
//! value, and force that comparison to pass.

use super::{Access, Payload, Session, Transition};
use crate::{pattern, Context, Error, Process, ProcessExt, Reg};

/// Offset of hash_3 within the decrypted license
const HASH_3_OFFSET: u32 = 0x33;

/// Flags after a `cmp` of two equal values: ZF, IF, ID and the reserved bit
pub const EQUAL_FLAGS: u32 = 0x200242;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
    #[default]
    Inactive,
    FindRead,
    FindCompare,
    Finish,
}

#[derive(Debug, Default)]
pub struct HashDiscovery {
    phase: Phase,
    decrypted: u32,
    /// hash_3 as stored in our license
    ours: u16,
}

impl HashDiscovery {
    pub(super) fn init<P: Process + ?Sized>(
        &mut self,
        process: &P,
        payload: Payload,
    ) -> Result<(), Error> {
        self.decrypted = payload.address()?;
        self.ours = process.read_u16(self.decrypted.wrapping_add(HASH_3_OFFSET))?;
        log::debug!("license hash_3 {:#06x}", self.ours);
        log::info!("Searching for hash_3 comparison...");
        self.phase = Phase::FindRead;
        Ok(())
    }

    pub fn decrypted_buffer(&self) -> u32 {
        self.decrypted
    }

    /// The value is pushed around a lot before it gets compared; its first
    /// read only narrows down where to start looking.
    pub(super) fn on_read(&mut self, access: Access) -> Transition {
        if self.phase == Phase::FindRead
            && access.ea == self.decrypted.wrapping_add(HASH_3_OFFSET)
            && access.size == 2
        {
            log::info!("hash_3 read by {:#x}", access.address);
            self.phase = Phase::FindCompare;
        }
        Transition::Stay
    }

    pub(super) fn on_instruction<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        session: &mut Session,
        address: u32,
        context: &mut Context,
    ) -> Result<Transition, Error> {
        match self.phase {
            Phase::FindCompare => {
                self.find_compare(process, session, address, context);
                Ok(Transition::Stay)
            }
            Phase::Finish => {
                self.phase = Phase::Inactive;
                Ok(Transition::Advance(Payload::Address(self.decrypted)))
            }
            _ => Ok(Transition::Stay),
        }
    }

    fn find_compare<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        session: &mut Session,
        address: u32,
        context: &mut Context,
    ) {
        let Some((memory, general)) = process
            .read_len(address, pattern::WORD_CMP_LEN as usize)
            .ok()
            .and_then(|code| pattern::word_reg_cmp_operands(&code))
        else {
            return;
        };
        let Ok(memory_value) = process.read_u16(context.get(memory)) else {
            return;
        };
        let register_value = context.get(general) as u16;

        // the registers involved vary between builds, so whichever side is not
        // ours holds the real value
        let hash_3 = if memory_value == self.ours {
            register_value
        } else if register_value == self.ours {
            memory_value
        } else {
            return;
        };
        log::info!("Found hash_3: {hash_3:#06x}");
        session.secret.set_hash_3(hash_3);

        log::info!("Bypassing check");
        context.set(Reg::Eflags, EQUAL_FLAGS);
        context.set(Reg::Eip, address.wrapping_add(pattern::WORD_CMP_LEN));
        process.execute_at(context);
        self.phase = Phase::Finish;
    }
}
