//! Byte transport trait.

use std::io;

/// A byte source/sink connected to one board.
///
/// This trait abstracts the physical link, allowing serial ports and
/// Bluetooth RFCOMM sockets to be used interchangeably. Framing and the pin
/// model never depend on which one is in use.
///
/// Reads may block up to the transport's own timeout; callers that must not
/// block check [`Transport::bytes_available`] first.
pub trait Transport: Send {
    /// Device path or Bluetooth address.
    fn identity(&self) -> &str;

    /// Check if the link is open.
    fn is_connected(&self) -> bool;

    /// Number of bytes that can be read without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read one byte. `Ok(None)` means the read timed out.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Read up to `buf.len()` bytes, stopping at the first timeout.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.read_byte()? {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    /// Write every byte of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Close the link. Closing twice is not an error.
    fn close(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn identity(&self) -> &str {
        (**self).identity()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}
