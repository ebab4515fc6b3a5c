#[derive(thiserror::Error)]
pub enum Error {
    // std errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // configuration errors
    #[error("Unable to load license file: {0}")]
    License(String),

    #[error("Unable to load RSA file: {0}")]
    KeyFile(&'static str),

    // solve failures
    #[error("invalid sum byte {0:#04x}, expected 0x60..=0xf4")]
    SumByte(u8),

    #[error("alphanumeric terms shorter than the {0} byte sum")]
    TermLength(usize),

    #[error("no TEA key found")]
    NoKeyFound,

    // target interaction
    #[error("unable to access target memory at {0:#x}")]
    Memory(u32),

    #[error("mp_int at {address:#x} claims {used} digits")]
    DigitCount { address: u32, used: u32 },

    // secret model
    #[error("recovered secret is missing {0}")]
    Incomplete(&'static str),

    #[error("main hash must be {expected} bytes, got {got}")]
    MainHashLength { expected: usize, got: usize },

    #[error("main hash password is not alphanumeric")]
    Password,

    #[error("no stage after stage {0}")]
    NoNextStage(usize),

    #[error("stage requires a buffer address")]
    MissingAddress,

    // offline tooling
    #[error("expected 4 TEA key words, got {0}")]
    TeaKeyLength(usize),

    #[error("no HWID found")]
    NoHwid,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}
