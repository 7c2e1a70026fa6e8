use crate::absorbance::{DiscreteAbsCfg, DiscreteAbsData};
use crate::config::SessionConfig;
use crate::constants::{CMD_CLOSE, CMD_GET_DATA, CMD_INIT, CMD_OPEN, CMD_STATUS, STATUS_RESPONSE_SIZE};
use crate::error::ClarioError;
use crate::fluorescence::{FlCfg, FlData};
use crate::frame::{FrameCodec, Transport};
use crate::run::RunCfg;
use crate::status::Status;
use bytes::Bytes;
use strum_macros::Display;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Where a session stands in the init / run / read cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    /// Nothing exchanged yet, or the link failed and framing may be lost
    Disconnected,
    Ready,
    /// A run command was accepted and the reader has not reported idle yet
    Busy,
    /// Plate carrier closed
    Closed,
}

/// Remembers the last status frame so only changes are acted on
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<[u8; STATUS_RESPONSE_SIZE]>,
}

impl ChangeDetector {
    /// True when `status` differs from the previously observed frame
    pub fn changed(&mut self, status: &Status) -> bool {
        let changed = self.last.as_ref() != Some(&status.raw);
        self.last = Some(status.raw);
        changed
    }
}

/// A session with a CLARIOstar plate reader.
///
/// The protocol is strictly request/response, so every operation takes
/// `&mut self`. Share a session between tasks behind a single
/// `tokio::sync::Mutex` held for whole operations.
pub struct Clario<T> {
    codec: FrameCodec<T>,
    config: SessionConfig,
    state: SessionState,
}

impl<T: Transport> Clario<T> {
    pub fn new(io: T) -> Self {
        Self::with_config(io, SessionConfig::default())
    }

    pub fn with_config(io: T, config: SessionConfig) -> Self {
        Self {
            codec: FrameCodec::with_timeout(io, config.read_timeout),
            config,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn into_inner(self) -> T {
        self.codec.into_inner()
    }

    /// Send one command and return the reply payload
    async fn command(&mut self, payload: &[u8]) -> Result<Bytes, ClarioError> {
        match self.codec.transact(payload).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if matches!(e, ClarioError::Frame(_) | ClarioError::Io(_)) {
                    self.state = SessionState::Disconnected;
                }
                Err(e)
            }
        }
    }

    /// Run initialization: moves the plate under the optics and checks that one is loaded.
    ///
    /// Does not wait for the reader to finish.
    pub async fn setup(&mut self) -> Result<(), ClarioError> {
        info!("Initializing plate reader");
        self.command(CMD_INIT).await?;
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Move the plate carrier out and wait until the reader is idle
    pub async fn open(&mut self) -> Result<(), ClarioError> {
        info!("Opening plate carrier");
        self.command(CMD_OPEN).await?;
        self.wait_for_ready().await?;
        Ok(())
    }

    /// Pull the plate carrier in and wait until the reader is idle
    pub async fn close(&mut self) -> Result<(), ClarioError> {
        info!("Closing plate carrier");
        self.command(CMD_CLOSE).await?;
        self.wait_for_ready().await?;
        self.state = SessionState::Closed;
        Ok(())
    }

    /// Query and decode the status once
    pub async fn get_status(&mut self) -> Result<Status, ClarioError> {
        let reply = self.command(CMD_STATUS).await?;
        Ok(Status::decode(&reply)?)
    }

    /// Block until a changed status frame comes back without the busy flag.
    ///
    /// Only frames that differ from the previous one are inspected. There is
    /// no overall deadline; wrap the call in `tokio::time::timeout` to bound it.
    pub async fn wait_for_ready(&mut self) -> Result<Status, ClarioError> {
        let mut detector = ChangeDetector::default();
        loop {
            sleep(self.config.poll_interval).await;
            let status = self.get_status().await?;
            if !detector.changed(&status) {
                continue;
            }
            if status.is_busy() {
                debug!("Reader busy: {}", status);
                continue;
            }
            debug!("Reader ready: {}", status);
            self.state = SessionState::Ready;
            return Ok(status);
        }
    }

    /// Poll the status forever, reporting every change to `on_change`.
    ///
    /// Failed queries are logged and polling carries on. Meant for watching
    /// the reader while poking at it, so cancel it from outside.
    pub async fn watch_status<F>(&mut self, mut on_change: F)
    where
        F: FnMut(&Status),
    {
        let mut detector = ChangeDetector::default();
        loop {
            sleep(self.config.poll_interval).await;
            match self.get_status().await {
                Ok(status) => {
                    if detector.changed(&status) {
                        on_change(&status);
                    }
                }
                Err(e) => warn!("Status query failed: {}", e),
            }
        }
    }

    /// init, wait, run command, wait, fetch data
    async fn run_command(&mut self, command: &[u8]) -> Result<Bytes, ClarioError> {
        self.setup().await?;
        self.wait_for_ready().await?;

        info!("Starting run ({} byte command)", command.len());
        self.command(command).await?;
        self.state = SessionState::Busy;
        self.wait_for_ready().await?;

        info!("Run finished, fetching data");
        self.command(CMD_GET_DATA).await
    }

    /// Run a discrete absorbance assay, blocking until the data is read
    pub async fn run_discrete_absorbance(
        &mut self,
        run: &RunCfg,
        cfg: &DiscreteAbsCfg,
    ) -> Result<DiscreteAbsData, ClarioError> {
        let command = cfg.encode(run)?;
        let reply = self.run_command(&command).await?;
        Ok(DiscreteAbsData::decode(&reply)?)
    }

    /// Run an endpoint fluorescence read, blocking until the data is read
    pub async fn run_fluorescence(&mut self, run: &RunCfg, cfg: &FlCfg) -> Result<FlData, ClarioError> {
        let command = cfg.encode(run)?;
        let reply = self.run_command(&command).await?;
        Ok(FlData::decode(&reply)?)
    }
}

#[cfg(feature = "serial")]
impl Clario<tokio_serial::SerialStream> {
    /// Open the reader's serial port and start a session on it
    pub fn open_serial(serial: &crate::config::SerialConfig, config: SessionConfig) -> Result<Self, ClarioError> {
        let port = crate::serial::open_port(serial)?;
        Ok(Self::with_config(port, config))
    }
}
