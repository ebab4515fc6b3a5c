//! The boundary between the analysis core and the instrumentation engine.
//!
//! The engine reports instructions and memory accesses of the target together
//! with a snapshot of its registers, and performs the side effects the core
//! asks for. The core never dereferences target addresses itself.

/// General purpose registers in ModR/M encoding order, followed by the flags
/// and instruction pointer.
#[repr(u8)]
#[derive(
    Clone, Copy, PartialEq, Eq, Debug, strum::Display, strum::FromRepr, strum::EnumIter,
)]
pub enum Reg {
    Eax,
    Ecx,
    Edx,
    Ebx,
    Esp,
    Ebp,
    Esi,
    Edi,
    Eflags,
    Eip,
}

impl Reg {
    /// Decode the 3 bit register field of a ModR/M byte
    pub fn from_modrm(bits: u8) -> Self {
        // masked to 0..=7, always a general purpose register
        Reg::from_repr(bits & 7).unwrap_or(Reg::Eax)
    }

    pub fn is_stack_frame(self) -> bool {
        matches!(self, Reg::Esp | Reg::Ebp)
    }
}

/// Register snapshot handed over with every event.
///
/// Writes only take effect once the context is passed back through
/// [`Process::execute_at`].
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Context {
    regs: [u32; 10],
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reg: Reg) -> u32 {
        self.regs[reg as usize]
    }

    pub fn set(&mut self, reg: Reg, value: u32) {
        self.regs[reg as usize] = value;
    }

    pub fn with(mut self, reg: Reg, value: u32) -> Self {
        self.set(reg, value);
        self
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for reg in <Reg as strum::IntoEnumIterator>::iter() {
            map.entry(&reg, &format_args!("{:08x}", self.get(reg)));
        }
        map.finish()
    }
}

/// Capabilities the instrumentation engine provides on the target process.
pub trait Process {
    /// Copy target memory into `buf`, failing if any byte is inaccessible
    fn read(&self, address: u32, buf: &mut [u8]) -> Result<(), super::Error>;

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), super::Error>;

    /// Place `data` somewhere in the target's address space and return where
    fn place(&mut self, data: &[u8]) -> Result<u32, super::Error>;

    /// Resume execution with `context` as soon as the current callback returns
    fn execute_at(&mut self, context: &Context);

    /// Strip all instrumentation and let the target run natively
    fn remove_instrumentation(&mut self);

    /// Terminate the target, ending the analysis run
    fn exit(&mut self, code: i32);
}
