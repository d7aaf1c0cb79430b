// src/device/serial.rs
//! Serial-port device and discovery implementations

use super::{Device, DeviceDiscovery};
use crate::error::{GpsError, Result};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio_serial::{SerialPortBuilderExt, SerialPortType, SerialStream};
use tracing::{debug, info};

pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// A GPS receiver attached to a serial port.
pub struct SerialDevice {
    port_name: String,
    baud_rate: u32,
    stream: Option<SerialStream>,
}

impl SerialDevice {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            stream: None,
        }
    }
}

#[async_trait]
impl Device for SerialDevice {
    fn name(&self) -> &str {
        &self.port_name
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        info!(port = %self.port_name, baud = self.baud_rate, "opening serial port");
        let stream = tokio_serial::new(&self.port_name, self.baud_rate)
            .open_native_async()
            .map_err(|e| {
                GpsError::Connection(format!(
                    "failed to open serial port {}: {}",
                    self.port_name, e
                ))
            })?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.stream.take().is_some() {
            debug!(port = %self.port_name, "serial port closed");
        }
        Ok(())
    }

    async fn reset(&mut self) {
        self.stream = None;
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| GpsError::Connection("serial port is not open".to_string()))?;
        let n = stream.read(buf).await?;
        if n == 0 {
            // A serial stream never legitimately returns EOF; the adapter
            // was unplugged.
            return Err(GpsError::Connection(format!(
                "serial port {} returned end of stream",
                self.port_name
            )));
        }
        Ok(n)
    }
}

/// Finds GPS receivers by scanning the host's serial ports, preferring USB
/// adapters over built-in ports.
pub struct SerialDiscovery {
    baud_rate: u32,
}

impl SerialDiscovery {
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }
}

impl Default for SerialDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE)
    }
}

#[async_trait]
impl DeviceDiscovery for SerialDiscovery {
    async fn any_available_device(&self) -> Option<Box<dyn Device>> {
        let ports = match tokio_serial::available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                debug!("failed to list serial ports: {}", e);
                return None;
            }
        };
        if ports.is_empty() {
            return None;
        }

        let chosen = ports
            .iter()
            .find(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
            .or_else(|| ports.first())?;
        info!(port = %chosen.port_name, "discovered serial GPS candidate");
        Some(Box::new(SerialDevice::new(
            chosen.port_name.clone(),
            self.baud_rate,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unopened_device_rejects_reads() {
        let mut device = SerialDevice::new("/dev/ttyUSB99", DEFAULT_BAUD_RATE);
        assert!(!device.is_open());
        let mut buf = [0u8; 16];
        assert!(device.read(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut device = SerialDevice::new("/dev/ttyUSB99", DEFAULT_BAUD_RATE);
        assert!(device.close().await.is_ok());
        assert!(device.close().await.is_ok());
    }
}
