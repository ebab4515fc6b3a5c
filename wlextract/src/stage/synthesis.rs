//! Stage 5: turn the recovered values into a main hash.

use super::Session;
use crate::{Error, MainHash, Process};

#[derive(Debug, Default)]
pub struct Synthesis {
    done: bool,
}

impl Synthesis {
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub(super) fn init<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        session: &mut Session,
    ) -> Result<(), Error> {
        let synthesized = MainHash::synthesize(&session.secret);
        self.done = true;
        let code = match synthesized {
            Ok(main_hash) => {
                log::info!("main_hash (not unique): {main_hash}");
                session.main_hash = Some(main_hash);
                0
            }
            Err(err) => {
                log::error!("Cannot generate main_hash: {err}");
                -1
            }
        };
        // nothing left to wait for unless a hardware id may still show up
        if session.license.exits_early() {
            process.exit(code);
        }
        Ok(())
    }
}
