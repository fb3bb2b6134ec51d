//! Async link to a controller
//!
//! [`Lc1Link`] owns a spawned I/O task that reads the transport, splits the
//! stream into frames, and routes each decoded message: telemetry to the
//! [`DeviceMonitor`], replies to the [`Correlator`]. Frames are handled
//! strictly in arrival order. The same task writes the command bytes that
//! callers queue through the correlator.
//!
//! The link is generic over its transport so tests and the hardware-free
//! demo can use `tokio::io::duplex()` in place of a serial port.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use lc1_protocol::{interpret, Command, FrameDemux, Message};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::LinkConfig;
use crate::correlator::{Correlator, Reply};
use crate::device::{DeviceMonitor, DeviceStatus};
use crate::error::LinkError;

/// Identification read from the controller at connect time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Reply payload to the identify command
    pub id: Vec<u8>,
    /// Reply payload to the version command
    pub version: Vec<u8>,
}

/// A running link to one controller
pub struct Lc1Link {
    config: LinkConfig,
    correlator: Arc<Correlator>,
    monitor: Arc<DeviceMonitor>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), LinkError>>,
}

impl Lc1Link {
    /// Open a serial port and start the link on it
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(port_name: &str, config: LinkConfig) -> Result<Self, LinkError> {
        let stream = tokio_serial::new(port_name, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_millis(100))
            .open_native_async()?;

        info!("Opened {} at {} baud", port_name, config.baud_rate);
        Ok(Self::spawn(stream, config))
    }

    /// Start the link on any byte stream
    pub fn spawn<T>(io: T, config: LinkConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (data_tx, data_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let correlator = Arc::new(Correlator::new(data_tx));
        let monitor = Arc::new(DeviceMonitor::new());

        let connection = LinkConnection {
            io,
            demux: FrameDemux::new(),
            correlator: correlator.clone(),
            monitor: monitor.clone(),
            read_poll: config.read_poll(),
        };
        let span = info_span!("lc1_link", name = %config.name);
        let task = tokio::spawn(connection.run(shutdown_rx, data_rx).instrument(span));

        Self {
            config,
            correlator,
            monitor,
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }

    /// Display name of this link
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration the link was started with
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Send a command and wait for its reply, using the configured timeout
    pub async fn request(&self, command: Command) -> Result<Reply, LinkError> {
        self.correlator
            .send_and_wait(command, self.config.request_timeout())
            .await
    }

    /// Ask the controller for its identification
    pub async fn request_id(&self) -> Result<Reply, LinkError> {
        self.request(Command::RequestId).await
    }

    /// Ask the controller for its firmware version
    pub async fn request_version(&self) -> Result<Reply, LinkError> {
        self.request(Command::RequestVersion).await
    }

    /// Read identification and version, one after the other
    pub async fn identify(&self) -> Result<DeviceInfo, LinkError> {
        let id = self.request_id().await?.payload;
        let version = self.request_version().await?.payload;
        info!(
            "Connected to {} ({:02X?}), version {}",
            String::from_utf8_lossy(&id),
            id,
            String::from_utf8_lossy(&version)
        );
        Ok(DeviceInfo { id, version })
    }

    /// Snapshot of the device mode and readings
    pub fn status(&self) -> DeviceStatus {
        self.monitor.snapshot()
    }

    /// One-line status, prefixed with the link name
    pub fn status_line(&self) -> String {
        format!("{} {}", self.config.name, self.status())
    }

    /// Returns false once the I/O task has stopped
    pub fn is_connected(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the I/O task and wait for it
    ///
    /// Returns the transport error that ended the task, if one did.
    pub async fn shutdown(mut self) -> Result<(), LinkError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Link task for {} failed: {}", self.config.name, e);
                Err(LinkError::Disconnected)
            }
        }
    }
}

/// A closed peer reads as EOF or fails writes; both mean `Disconnected`
fn transport_fault(e: std::io::Error) -> LinkError {
    match e.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::UnexpectedEof => LinkError::Disconnected,
        _ => LinkError::IoError(e),
    }
}

/// State owned by the link I/O task
struct LinkConnection<T> {
    io: T,
    demux: FrameDemux,
    correlator: Arc<Correlator>,
    monitor: Arc<DeviceMonitor>,
    read_poll: Duration,
}

impl<T> LinkConnection<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Run until shutdown, link drop, or a transport fault
    async fn run(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
        mut data_rx: mpsc::Receiver<Vec<u8>>,
    ) -> Result<(), LinkError> {
        info!("Link connection starting");

        let mut buffer = vec![0u8; 256];

        let result = loop {
            tokio::select! {
                // Also fires when the Lc1Link is dropped
                _ = &mut shutdown_rx => {
                    break Ok(());
                }

                Some(data) = data_rx.recv() => {
                    debug!("Serial Write {:02X?}", data);
                    if let Err(e) = self.write(&data).await {
                        warn!("Write error: {}", e);
                        break Err(transport_fault(e));
                    }
                }

                result = tokio::time::timeout(self.read_poll, self.io.read(&mut buffer)) => {
                    match result {
                        Ok(Ok(0)) => {
                            info!("Transport closed by peer");
                            break Err(LinkError::Disconnected);
                        }
                        Ok(Ok(n)) => self.on_rx_data(&buffer[..n]),
                        Ok(Err(e)) => {
                            // Serial ports report an idle line this way
                            if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut {
                                continue;
                            }
                            warn!("Read error: {}", e);
                            break Err(transport_fault(e));
                        }
                        Err(_) => {} // Poll interval elapsed
                    }
                }
            }
        };

        // Refuse new commands first, then fail the one still waiting
        drop(data_rx);
        self.correlator.close();
        info!("Link connection shutting down");
        result
    }

    async fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.io.write_all(data).await?;
        self.io.flush().await
    }

    fn on_rx_data(&mut self, data: &[u8]) {
        debug!("Serial Read {:02X?}", data);
        for frame in self.demux.feed(data) {
            debug!("RX Message {:?}", frame);
            match interpret(&frame) {
                Some(Message::Telemetry { value1, value2, .. }) => {
                    self.monitor.on_telemetry(value1, value2);
                }
                Some(Message::Reply { device_id, payload }) => {
                    self.correlator.deliver(device_id, payload);
                }
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use lc1_protocol::{Encode, HEATER_MARKER};
    use tokio::io::DuplexStream;

    use super::*;
    use crate::device::DeviceMode;

    fn test_link() -> (Lc1Link, DuplexStream) {
        let (device, driver) = tokio::io::duplex(1024);
        let config = LinkConfig {
            name: "Test".to_string(),
            request_timeout_ms: 500,
            read_poll_ms: 10,
            ..Default::default()
        };
        (Lc1Link::spawn(driver, config), device)
    }

    async fn wait_for_mode(link: &Lc1Link, mode: DeviceMode) -> DeviceStatus {
        for _ in 0..100 {
            let status = link.status();
            if status.mode == mode {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("mode never became {:?}", mode);
    }

    #[tokio::test]
    async fn test_telemetry_updates_status() {
        let (link, mut device) = test_link();

        let mut stream = Message::heater(0.5).encode();
        stream.extend(Message::lambda_o2(1.0, 0.0).encode());
        stream.push(0xB2); // closes the second frame
        device.write_all(&stream).await.unwrap();

        let status = wait_for_mode(&link, DeviceMode::LambdaMeasure).await;
        assert_eq!(status.lambda, Some(1.0));
        assert_eq!(status.heater, None);
        assert_eq!(link.status_line(), "Test lambdameasure 1.00");

        link.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_reply_between_telemetry() {
        let (link, mut device) = test_link();

        let request = async { link.request_id().await };
        let responder = async {
            let mut cmd = [0u8; 1];
            device.read_exact(&mut cmd).await.unwrap();
            assert_eq!(cmd[0], 0xF3);

            let reply = Message::Reply {
                device_id: 0x85,
                payload: vec![0x01, 0x73, 0x11],
            };
            let mut stream = Message::heater(0.1).encode();
            stream.extend(reply.encode());
            stream.extend(Message::heater(0.2).encode());
            device.write_all(&stream).await.unwrap();
        };

        let (reply, ()) = tokio::join!(request, responder);
        let reply = reply.unwrap();
        assert_eq!(reply.command, Command::RequestId);
        assert_eq!(reply.payload, vec![0x01, 0x73, 0x11]);

        let status = wait_for_mode(&link, DeviceMode::Heating).await;
        assert!(status.heater.is_some());

        link.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_times_out_without_reply() {
        let (link, _device) = test_link();

        let result = link.request_version().await;
        assert!(matches!(
            result,
            Err(LinkError::RequestTimeout {
                command: Command::RequestVersion,
                ..
            })
        ));
        assert!(link.is_connected());
        link.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_is_disconnected_every_time() {
        // A queued command races the EOF; either path must end the same way
        for _ in 0..32 {
            let (link, device) = test_link();
            drop(device);

            let result = link.request_id().await;
            assert!(matches!(result, Err(LinkError::Disconnected)));
            assert!(matches!(
                link.shutdown().await,
                Err(LinkError::Disconnected)
            ));
        }
    }

    #[test]
    fn test_transport_fault_classification() {
        let broken = std::io::Error::from(ErrorKind::BrokenPipe);
        assert!(matches!(transport_fault(broken), LinkError::Disconnected));

        let reset = std::io::Error::from(ErrorKind::ConnectionReset);
        assert!(matches!(transport_fault(reset), LinkError::Disconnected));

        let other = std::io::Error::from(ErrorKind::PermissionDenied);
        assert!(matches!(transport_fault(other), LinkError::IoError(_)));
    }

    #[tokio::test]
    async fn test_heater_marker_roundtrips_through_link() {
        let (link, mut device) = test_link();

        let frame = Message::Telemetry {
            device_id: 0x82,
            value1: HEATER_MARKER,
            value2: 24.3,
        };
        let mut stream = frame.encode();
        stream.push(0xB2);
        device.write_all(&stream).await.unwrap();

        let status = wait_for_mode(&link, DeviceMode::Heating).await;
        assert!((status.heater.unwrap() - 0.243).abs() < 1e-9);

        link.shutdown().await.unwrap();
    }
}
