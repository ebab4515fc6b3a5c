//! The staged analysis of a running target.
//!
//! Each stage watches the events the instrumentation engine reports, walks
//! through its own phases and, once its goal is reached, hands a [`Payload`]
//! on to the next stage. [`StageManager`] owns the stages and everything they
//! share, and routes each event to the one stage that is active.

mod hash;
mod key_recovery;
mod password;
mod rsa_bypass;
mod synthesis;

pub use hash::{HashDiscovery, EQUAL_FLAGS};
pub use key_recovery::KeyRecovery;
pub use password::PasswordDiscovery;
pub use rsa_bypass::RsaBypass;
pub use synthesis::Synthesis;

use crate::{Context, Error, LicenseContext, MainHash, Process, RecoveredSecret};

/// What a finished stage hands to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// A buffer located in target memory
    Address(u32),
    Empty,
}

impl Payload {
    fn address(self) -> Result<u32, Error> {
        match self {
            Payload::Address(address) => Ok(address),
            Payload::Empty => Err(Error::MissingAddress),
        }
    }
}

/// A memory access reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// Instruction performing the access
    pub address: u32,
    /// Effective address accessed
    pub ea: u32,
    pub size: u32,
}

impl Access {
    pub fn new(address: u32, ea: u32, size: u32) -> Self {
        Self { address, ea, size }
    }
}

/// What a stage asks of the manager after handling an event
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Transition {
    Stay,
    Advance(Payload),
    /// Stop forwarding events altogether
    Detach,
}

/// State shared by all stages of one run
#[derive(Debug)]
pub struct Session {
    pub license: LicenseContext,
    pub secret: RecoveredSecret,
    /// Outcome of checking the recovered password against the target's own
    /// decryption, once performed
    pub password_valid: Option<bool>,
    pub main_hash: Option<MainHash>,
    pub hwids: Vec<String>,
    pub debugger_warnings: usize,
}

impl Session {
    pub fn new(license: LicenseContext) -> Self {
        Self {
            license,
            secret: RecoveredSecret::default(),
            password_valid: None,
            main_hash: None,
            hwids: Vec::new(),
            debugger_warnings: 0,
        }
    }
}

#[derive(Debug, strum::IntoStaticStr)]
pub enum Stage {
    RsaBypass(RsaBypass),
    HashDiscovery(HashDiscovery),
    PasswordDiscovery(PasswordDiscovery),
    KeyRecovery(KeyRecovery),
    Synthesis(Synthesis),
}

impl Stage {
    /// All stages in the order they run
    pub fn pipeline() -> Vec<Stage> {
        vec![
            Stage::RsaBypass(RsaBypass::default()),
            Stage::HashDiscovery(HashDiscovery::default()),
            Stage::PasswordDiscovery(PasswordDiscovery::default()),
            Stage::KeyRecovery(KeyRecovery::default()),
            Stage::Synthesis(Synthesis::default()),
        ]
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }

    fn init<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        session: &mut Session,
        payload: Payload,
    ) -> Result<(), Error> {
        match self {
            Stage::RsaBypass(stage) => stage.init(session, payload),
            Stage::HashDiscovery(stage) => stage.init(&*process, payload),
            Stage::PasswordDiscovery(stage) => stage.init(&*process, payload),
            Stage::KeyRecovery(stage) => stage.init(&*process, payload),
            Stage::Synthesis(stage) => stage.init(process, session),
        }
    }

    fn on_instruction<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        session: &mut Session,
        address: u32,
        context: &mut Context,
    ) -> Result<Transition, Error> {
        match self {
            Stage::RsaBypass(stage) => stage.on_instruction(process, session, address, context),
            Stage::HashDiscovery(stage) => {
                stage.on_instruction(process, session, address, context)
            }
            Stage::PasswordDiscovery(stage) => Ok(stage.on_instruction()),
            Stage::KeyRecovery(stage) => stage.on_instruction(process, session),
            Stage::Synthesis(_) => Ok(Transition::Stay),
        }
    }

    fn on_read<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        access: Access,
        context: &Context,
    ) -> Result<Transition, Error> {
        match self {
            Stage::RsaBypass(stage) => stage.on_read(process, access, context),
            Stage::HashDiscovery(stage) => Ok(stage.on_read(access)),
            Stage::PasswordDiscovery(stage) => Ok(stage.on_read(&*process, access)),
            Stage::KeyRecovery(stage) => Ok(stage.on_read(&*process, access, context)),
            Stage::Synthesis(_) => Ok(Transition::Stay),
        }
    }

    fn on_write<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        session: &mut Session,
        access: Access,
    ) -> Result<Transition, Error> {
        match self {
            Stage::PasswordDiscovery(stage) => stage.on_write(&*process, session, access),
            _ => Ok(Transition::Stay),
        }
    }
}

/// Routes engine events to the active stage and moves the pipeline along.
///
/// Stage numbers start at 1; 0 means no stage has been started yet.
#[derive(Debug)]
pub struct StageManager {
    stages: Vec<Stage>,
    current: usize,
    thread: Option<u32>,
    attached: bool,
    session: Session,
}

impl StageManager {
    pub fn new(license: LicenseContext) -> Self {
        Self {
            stages: Vec::new(),
            current: 0,
            thread: None,
            attached: true,
            session: Session::new(license),
        }
    }

    /// Load the pipeline and pin it to the target's main thread. Only the first
    /// call has any effect.
    pub fn init(&mut self, main_thread: u32) {
        if self.stages.is_empty() {
            log::debug!("main thread {main_thread:#x}");
            self.thread = Some(main_thread);
            self.stages = Stage::pipeline();
        }
    }

    /// Start the next stage with `payload`. Past the last stage nothing changes
    /// and [`Error::NoNextStage`] is returned.
    pub fn advance<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        payload: Payload,
    ) -> Result<(), Error> {
        let Some(stage) = self.stages.get_mut(self.current) else {
            return Err(Error::NoNextStage(self.current));
        };
        self.current += 1;
        log::info!("Stage {} -- {}", self.current, stage.name());
        stage.init(process, &mut self.session, payload)
    }

    /// Number of the active stage, 0 before the first [`advance`](Self::advance)
    pub fn active(&self) -> usize {
        self.current
    }

    pub fn active_stage(&self) -> Option<&Stage> {
        self.current.checked_sub(1).and_then(|i| self.stages.get(i))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn attached(&self) -> bool {
        self.attached
    }

    /// Stop analysing; every later event is ignored
    pub fn detach(&mut self) {
        log::info!("detaching from target");
        self.attached = false;
    }

    fn accepts(&self, thread: u32) -> bool {
        self.attached && self.thread == Some(thread) && self.current > 0
    }

    fn apply<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        transition: Transition,
    ) -> Result<(), Error> {
        match transition {
            Transition::Stay => Ok(()),
            Transition::Advance(payload) => self.advance(process, payload),
            Transition::Detach => {
                self.detach();
                Ok(())
            }
        }
    }

    pub fn on_instruction<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        thread: u32,
        address: u32,
        context: &mut Context,
    ) -> Result<(), Error> {
        if !self.accepts(thread) {
            return Ok(());
        }
        let stage = &mut self.stages[self.current - 1];
        let transition = stage.on_instruction(process, &mut self.session, address, context)?;
        self.apply(process, transition)
    }

    pub fn on_read<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        thread: u32,
        access: Access,
        context: &Context,
    ) -> Result<(), Error> {
        if !self.accepts(thread) {
            return Ok(());
        }
        let stage = &mut self.stages[self.current - 1];
        let transition = stage.on_read(process, access, context)?;
        self.apply(process, transition)
    }

    pub fn on_write<P: Process + ?Sized>(
        &mut self,
        process: &mut P,
        thread: u32,
        access: Access,
    ) -> Result<(), Error> {
        if !self.accepts(thread) {
            return Ok(());
        }
        let stage = &mut self.stages[self.current - 1];
        let transition = stage.on_write(process, &mut self.session, access)?;
        self.apply(process, transition)
    }

    /// Inspect a message box the target is about to show
    pub fn on_message(&mut self, caption: &str, text: &str) {
        if crate::mentions_debugger(caption) || crate::mentions_debugger(text) {
            self.session.debugger_warnings += 1;
            log::warn!(
                "target appears to be complaining about a debugger; close common debuggers \
                 and monitoring tools before retrying"
            );
        }
        self.scan_hwid(caption);
        self.scan_hwid(text);
    }

    /// Inspect text the target places on the clipboard
    pub fn on_clipboard(&mut self, text: &str) {
        self.scan_hwid(text);
    }

    fn scan_hwid(&mut self, text: &str) {
        if self.session.license.is_skip_hwid() {
            return;
        }
        if let Some(hwid) = crate::find_hwid(text) {
            log::info!("Potential HWID: {hwid}");
            if !self.session.hwids.iter().any(|h| h == hwid) {
                self.session.hwids.push(hwid.to_string());
            }
        }
    }
}
