//! Stage 4: recover the TEA key from the decryption of the license's leading
//! block.
//!
//! Decryption alternates between the (key2, key3) and the (key0, key1)
//! half-round. Every value that goes through `shr dword ptr [reg], cl` with
//! `cl == 5` is the output of one half-round and the `a` input of the next, so
//! watching that instruction fills two sets of observations, one per key half.
//! The output of the very last half-round is never captured.

use super::{Access, Payload, Session, Transition};
use crate::tea::{self, HalfRound};
use crate::{pattern, Context, Error, Process, ProcessExt, Reg};

/// Completed observations over both sets: every half-round but the last
const OBSERVATIONS: usize = tea::ANALYSIS_ROUNDS * 2 - 1;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
    #[default]
    Inactive,
    Collect,
    Solve,
    Finish,
}

#[derive(Debug, Default, Clone, Copy)]
struct Intermediate {
    a: u32,
    b: u32,
    sum: u32,
    b_prime: u32,
}

impl Intermediate {
    fn with_sum(sum: u32) -> Self {
        Self {
            sum,
            ..Default::default()
        }
    }

    fn observation(&self) -> HalfRound {
        HalfRound::new(self.a, self.b, self.sum, self.b_prime)
    }
}

#[derive(Debug, Default)]
pub struct KeyRecovery {
    phase: Phase,
    /// `[0]` holds the (key2, key3) half-rounds, `[1]` the (key0, key1) ones
    sets: [Vec<Intermediate>; 2],
    logging: bool,
    /// `collected % 2` selects the set, `collected / 2` the entry within it
    collected: usize,
}

impl KeyRecovery {
    pub(super) fn init<P: Process + ?Sized>(
        &mut self,
        process: &P,
        payload: Payload,
    ) -> Result<(), Error> {
        let decrypted = payload.address()?;
        let sums: Vec<u32> = tea::round_sums(tea::ANALYSIS_ROUNDS).collect();
        self.sets = [
            sums.iter().copied().map(Intermediate::with_sum).collect(),
            sums[..sums.len() - 1]
                .iter()
                .copied()
                .map(Intermediate::with_sum)
                .collect(),
        ];
        self.sets[0][0].a = process.read_u32(decrypted)?;
        self.sets[0][0].b = process.read_u32(decrypted.wrapping_add(4))?;
        self.logging = false;
        self.collected = 0;

        log::info!("Searching for TEA decryption routine...");
        self.phase = Phase::Collect;
        Ok(())
    }

    /// Number of half-round outputs captured so far
    pub fn collected(&self) -> usize {
        self.collected
    }

    pub(super) fn on_read<P: Process + ?Sized>(
        &mut self,
        process: &P,
        access: Access,
        context: &Context,
    ) -> Transition {
        if self.phase != Phase::Collect
            || access.size != 4
            || context.get(Reg::Ecx) & 0xff != 5
        {
            return Transition::Stay;
        }
        let is_shift = process
            .read_len(access.address, 2)
            .is_ok_and(|code| pattern::is_shr_dword(&code));
        if !is_shift {
            return Transition::Stay;
        }
        if let Ok(value) = process.read_u32(access.ea) {
            self.record(access.address, value);
        }
        Transition::Stay
    }

    fn record(&mut self, address: u32, value: u32) {
        if !self.logging {
            // the license's own first word is the first to get shifted
            if value == self.sets[0][0].a {
                log::info!("TEA decryption routine found near {address:#x}");
                log::info!("Collecting intermediate values...");
                self.logging = true;
            }
            return;
        }

        let (set, i) = (self.collected % 2, self.collected / 2);
        self.sets[set][i].b_prime = value;
        let next_b = self.sets[set][i].a;
        log::trace!("half-round {} b' = {value:#010x}", self.collected);

        self.collected += 1;
        if self.collected >= OBSERVATIONS {
            self.phase = Phase::Solve;
            return;
        }
        let (set, i) = (self.collected % 2, self.collected / 2);
        self.sets[set][i].a = value;
        self.sets[set][i].b = next_b;
    }

    pub(super) fn on_instruction<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        session: &mut Session,
    ) -> Result<Transition, Error> {
        match self.phase {
            Phase::Solve => {
                self.solve(process, session);
                self.phase = Phase::Finish;
                Ok(Transition::Stay)
            }
            Phase::Finish => {
                self.phase = Phase::Inactive;
                Ok(Transition::Advance(Payload::Empty))
            }
            _ => Ok(Transition::Stay),
        }
    }

    fn solve<P: Process + ?Sized>(&self, process: &mut P, session: &mut Session) {
        let observations =
            |set: &[Intermediate]| set.iter().map(Intermediate::observation).collect::<Vec<_>>();
        let key = tea::solve(&observations(&self.sets[1])).and_then(|low| {
            let high = tea::solve(&observations(&self.sets[0]))?;
            Ok([low[0], low[1], high[0], high[1]])
        });
        match key {
            Ok(key) => {
                log::info!("TEA key found: {key:08x?}");
                session.secret.set_tea_key(key);
            }
            Err(err) => {
                log::error!("Unable to find TEA key: {err}");
                if session.license.exits_early() {
                    process.exit(-1);
                }
            }
        }
    }
}
