use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialPortBuilderExt;

use domain::DriverError;

/// Byte stream a protocol driver talks over
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Opens the transport when the driver initializes
#[async_trait]
pub trait TransportOpener: Send {
    async fn open(&mut self) -> Result<Box<dyn Transport>, DriverError>;

    /// Human-readable endpoint, for logs
    fn describe(&self) -> String;
}

/// UART endpoint. Framing is fixed at 8N1, the only format the MH-Z19 speaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
        }
    }
}

/// Opens a serial port with `tokio-serial`
pub struct SerialOpener {
    config: SerialConfig,
}

impl SerialOpener {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportOpener for SerialOpener {
    async fn open(&mut self) -> Result<Box<dyn Transport>, DriverError> {
        // Windows needs the \\.\ prefix for COM10 and above
        let port_name = if cfg!(target_os = "windows")
            && !self.config.port.to_uppercase().starts_with(r"\\.\")
        {
            format!(r"\\.\{}", self.config.port)
        } else {
            self.config.port.clone()
        };

        tracing::debug!(
            port = %port_name,
            baud_rate = self.config.baud_rate,
            "Opening serial port"
        );

        let stream = tokio_serial::new(&port_name, self.config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .open_native_async()
            .map_err(|e| {
                DriverError::Transport(format!("Failed to open serial port {}: {}", port_name, e))
            })?;

        tracing::debug!(port = %self.config.port, "Serial port opened successfully");
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("serial:{}@{}", self.config.port, self.config.baud_rate)
    }
}

/// Hands over an already-open stream, once. Used for simulators and tests.
pub struct PreparedTransport {
    label: String,
    stream: Option<Box<dyn Transport>>,
}

impl PreparedTransport {
    pub fn new(label: impl Into<String>, stream: impl Transport + 'static) -> Self {
        Self {
            label: label.into(),
            stream: Some(Box::new(stream)),
        }
    }
}

#[async_trait]
impl TransportOpener for PreparedTransport {
    async fn open(&mut self) -> Result<Box<dyn Transport>, DriverError> {
        self.stream
            .take()
            .ok_or_else(|| DriverError::Transport(format!("{} was already opened", self.label)))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
