#![allow(dead_code)]
use std::collections::HashMap;
use wlextract::{Context, Error, Process};

/// Base of the region [`MockProcess::place`] hands out
pub const PLACE_BASE: u32 = 0x7000_0000;

/// In-memory stand-in for an instrumented target: sparse byte memory and a
/// record of every side effect requested.
#[derive(Debug, Default)]
pub struct MockProcess {
    memory: HashMap<u32, u8>,
    next_place: u32,
    pub placed: Vec<(u32, usize)>,
    pub redirects: Vec<Context>,
    pub exits: Vec<i32>,
    pub removed: bool,
}

impl MockProcess {
    pub fn new() -> Self {
        Self {
            next_place: PLACE_BASE,
            ..Default::default()
        }
    }

    pub fn poke(&mut self, address: u32, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.memory.insert(address.wrapping_add(i as u32), *b);
        }
    }

    pub fn poke_u16(&mut self, address: u32, value: u16) {
        self.poke(address, &value.to_le_bytes());
    }

    pub fn poke_u32(&mut self, address: u32, value: u32) {
        self.poke(address, &value.to_le_bytes());
    }

    pub fn peek_u32(&self, address: u32) -> u32 {
        let mut buf = [0; 4];
        self.read(address, &mut buf).unwrap();
        u32::from_le_bytes(buf)
    }
}

impl Process for MockProcess {
    fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), Error> {
        for (i, b) in buf.iter_mut().enumerate() {
            let at = address.wrapping_add(i as u32);
            *b = *self.memory.get(&at).ok_or(Error::Memory(at))?;
        }
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        self.poke(address, data);
        Ok(())
    }

    fn place(&mut self, data: &[u8]) -> Result<u32, Error> {
        let address = self.next_place;
        self.poke(address, data);
        self.placed.push((address, data.len()));
        // keep placements 16-byte aligned
        self.next_place += (data.len() as u32 + 15) & !15;
        Ok(address)
    }

    fn execute_at(&mut self, context: &Context) {
        self.redirects.push(context.clone());
    }

    fn remove_instrumentation(&mut self) {
        self.removed = true;
    }

    fn exit(&mut self, code: i32) {
        self.exits.push(code);
    }
}
