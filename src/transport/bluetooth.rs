//! Bluetooth RFCOMM transport (Linux).

use std::io::{self, Read, Write};
use std::time::Duration;

use mark_core::{Error, Transport};

use super::rfcomm::RfcommSocket;

/// RFCOMM link settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BluetoothConfig {
    pub channel: u8,
    /// Receive timeout.
    pub timeout: Duration,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            channel: 1,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Parse `AA:BB:CC:DD:EE:FF` into bytes, most significant first.
pub fn parse_address(address: &str) -> Option<[u8; 6]> {
    let mut out = [0u8; 6];
    let mut parts = address.split(':');
    for byte in &mut out {
        let part = parts.next()?;
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    parts.next().is_none().then_some(out)
}

/// A board behind an RFCOMM stream socket.
pub struct BluetoothTransport {
    address: String,
    socket: Option<RfcommSocket>,
}

impl BluetoothTransport {
    /// Connect to `address` on the configured channel.
    pub fn connect(address: &str, config: &BluetoothConfig) -> mark_core::Result<Self> {
        let connect_error = |source: io::Error| Error::Connect {
            target: address.to_string(),
            source,
        };
        let bdaddr = parse_address(address).ok_or_else(|| {
            connect_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "malformed Bluetooth address",
            ))
        })?;
        let socket =
            RfcommSocket::connect(bdaddr, config.channel, config.timeout).map_err(connect_error)?;
        log::debug!("{address} connected on channel {}", config.channel);
        Ok(Self {
            address: address.to_string(),
            socket: Some(socket),
        })
    }

    fn socket(&mut self) -> io::Result<&mut RfcommSocket> {
        self.socket
            .as_mut()
            .ok_or_else(|| io::ErrorKind::NotConnected.into())
    }
}

impl Transport for BluetoothTransport {
    fn identity(&self) -> &str {
        &self.address
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        self.socket()?.pending()
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.socket()?.read(buf) {
            Ok(n) => Ok(n),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let socket = self.socket()?;
        socket.write_all(bytes)?;
        socket.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        if self.socket.take().is_some() {
            log::debug!("{} closed", self.address);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("00:1A:7d:da:71:13"),
            Some([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x13])
        );
        assert_eq!(parse_address("00:1A:7D:DA:71"), None);
        assert_eq!(parse_address("00:1A:7D:DA:71:13:00"), None);
        assert_eq!(parse_address("0:1A:7D:DA:71:13"), None);
        assert_eq!(parse_address("zz:1A:7D:DA:71:13"), None);
        assert_eq!(parse_address("+1:1A:7D:DA:71:13"), None);
        assert_eq!(parse_address("00:1A:7D:DA:71:-1"), None);
        assert_eq!(parse_address(" 1:1A:7D:DA:71:13"), None);
    }

    #[test]
    fn test_malformed_address_is_connect_error() {
        let err = BluetoothTransport::connect("not-an-address", &BluetoothConfig::default()).err();
        assert!(matches!(err, Some(Error::Connect { .. })));
    }
}
