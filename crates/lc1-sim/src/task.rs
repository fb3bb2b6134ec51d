//! Simulated controller task
//!
//! This module runs an [`Lc1Simulator`] against a byte stream. The task uses a
//! select! loop to:
//! - Tick the state machine and queue each telemetry frame
//! - Read command bytes and queue replies
//! - Apply manual overrides and shutdown requests from a channel
//!
//! Queued frames are written by a separate writer task so a slow transport
//! never delays the tick cadence. Status snapshots are published on a watch
//! channel after every change.

use std::io::{self, ErrorKind};
use std::time::Duration;

use lc1_protocol::{Encode, BAUD_RATE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::simulator::{Lc1Simulator, ManualOverride, SimStatus};

/// Commands that can be sent to a simulator task
#[derive(Debug, Clone)]
pub enum SimCommand {
    /// Apply a manual override
    Override(ManualOverride),
    /// Shutdown the simulator task
    Shutdown,
}

/// Run the simulator task until shutdown or a transport fault
pub async fn run_simulator_task<S>(
    stream: S,
    mut sim: Lc1Simulator,
    mut cmd_rx: mpsc::Receiver<SimCommand>,
    status_tx: watch::Sender<SimStatus>,
) -> Result<(), SimError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, write_half) = tokio::io::split(stream);
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let mut writer = tokio::spawn(run_writer(write_half, queue_rx).in_current_span());
    let mut writer_done = false;

    let mut ticker = interval(sim.config().tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buf = [0u8; 64];

    info!("Simulator starting");
    status_tx.send_replace(sim.status());

    let result = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = sim.tick().encode();
                let _ = queue_tx.send(frame);
                status_tx.send_replace(sim.status());
            }

            result = reader.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Simulator stream closed");
                        break Ok(());
                    }
                    Ok(n) => {
                        debug!("Serial Read {:02X?}", &buf[..n]);
                        // Several command bytes may arrive together
                        for reply in buf[..n].iter().filter_map(|&b| sim.reply_to(b)) {
                            let _ = queue_tx.send(reply.encode());
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
                    Err(e) if peer_closed(&e) => {
                        debug!("Simulator stream closed: {}", e);
                        break Ok(());
                    }
                    Err(e) => {
                        warn!("Simulator read error: {}", e);
                        break Err(e.into());
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SimCommand::Override(command)) => {
                        sim.apply(command);
                        status_tx.send_replace(sim.status());
                    }
                    Some(SimCommand::Shutdown) => {
                        info!("Shutdown requested for simulator");
                        break Ok(());
                    }
                    None => {
                        debug!("Command channel closed for simulator");
                        break Ok(());
                    }
                }
            }

            joined = &mut writer => {
                writer_done = true;
                break writer_result(joined);
            }
        }
    };

    // Let the writer drain whatever is queued, then stop
    drop(queue_tx);
    if !writer_done {
        let drained = writer_result(writer.await);
        if result.is_ok() {
            drained?;
        }
    }

    info!("Simulator task ended");
    result
}

/// Drain the transmit queue into the transport
async fn run_writer<W>(
    mut writer: WriteHalf<W>,
    mut queue_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) -> io::Result<()>
where
    W: AsyncRead + AsyncWrite,
{
    while let Some(frame) = queue_rx.recv().await {
        writer.write_all(&frame).await?;
        writer.flush().await?;
        debug!("Serial Write {:02X?}", frame);
    }
    Ok(())
}

/// The host went away; the simulated device simply stops
fn peer_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof
    )
}

fn writer_result(joined: Result<io::Result<()>, JoinError>) -> Result<(), SimError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if peer_closed(&e) => {
            debug!("Simulator stream closed: {}", e);
            Ok(())
        }
        Ok(Err(e)) => {
            warn!("Simulator write error: {}", e);
            Err(e.into())
        }
        Err(e) => {
            warn!("Simulator writer failed: {}", e);
            Err(SimError::Stopped)
        }
    }
}

/// Control surface of a running simulator
pub struct SimulatorHandle {
    cmd_tx: mpsc::Sender<SimCommand>,
    status_rx: watch::Receiver<SimStatus>,
    task: JoinHandle<Result<(), SimError>>,
}

impl SimulatorHandle {
    /// Open a serial port and run a simulator on it
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(port_name: &str, config: SimConfig) -> Result<Self, SimError> {
        let baud_rate = if config.baud_rate == 0 {
            BAUD_RATE
        } else {
            config.baud_rate
        };
        let stream = tokio_serial::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_millis(100))
            .open_native_async()?;

        info!("Simulating on {} at {} baud", port_name, baud_rate);
        Ok(Self::spawn(stream, config))
    }

    /// Run a simulator on any byte stream
    pub fn spawn<S>(stream: S, config: SimConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let span = info_span!("lc1_sim", name = %config.name);
        let sim = Lc1Simulator::new(config);
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = watch::channel(sim.status());
        let task = tokio::spawn(run_simulator_task(stream, sim, cmd_rx, status_tx).instrument(span));

        Self {
            cmd_tx,
            status_rx,
            task,
        }
    }

    /// Pin the heater duty until [`Self::set_auto`]
    pub async fn set_manual_heater(&self, duty: f64) -> Result<(), SimError> {
        self.send(SimCommand::Override(ManualOverride::Heater(duty)))
            .await
    }

    /// Pin the O2 fraction until [`Self::set_auto`]
    pub async fn set_manual_o2(&self, o2: f64) -> Result<(), SimError> {
        self.send(SimCommand::Override(ManualOverride::O2(o2))).await
    }

    /// Resume the automatic cycle from `Init`
    pub async fn set_auto(&self) -> Result<(), SimError> {
        self.send(SimCommand::Override(ManualOverride::Auto)).await
    }

    /// Latest published status
    pub fn status(&self) -> SimStatus {
        *self.status_rx.borrow()
    }

    /// Receiver that is notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<SimStatus> {
        self.status_rx.clone()
    }

    /// Returns false once the simulator task has stopped
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the simulator and wait for queued frames to be written
    pub async fn shutdown(self) -> Result<(), SimError> {
        let _ = self.cmd_tx.send(SimCommand::Shutdown).await;
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Simulator task failed: {}", e);
                Err(SimError::Stopped)
            }
        }
    }

    async fn send(&self, command: SimCommand) -> Result<(), SimError> {
        self.cmd_tx
            .send(command)
            .await
            .map_err(|_| SimError::Stopped)
    }
}
