//! In-memory transport for tests.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::transport::Transport;

#[derive(Debug)]
struct Loopback {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    connected: bool,
    fail_writes: bool,
    fail_reads: bool,
    closes: usize,
}

/// A transport whose inbound bytes are fed by the test and whose outbound
/// bytes are recorded.
///
/// Clones share the same buffers, so a test keeps one clone while the board
/// owns the other.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    identity: Arc<str>,
    inner: Arc<Mutex<Loopback>>,
}

impl LoopbackTransport {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: Arc::from(identity),
            inner: Arc::new(Mutex::new(Loopback {
                inbound: VecDeque::new(),
                written: Vec::new(),
                connected: true,
                fail_writes: false,
                fail_reads: false,
                closes: 0,
            })),
        }
    }

    /// Queue bytes for the board to read.
    pub fn feed(&self, bytes: &[u8]) {
        self.inner.lock().inbound.extend(bytes);
    }

    /// Bytes queued but not yet read.
    pub fn pending(&self) -> usize {
        self.inner.lock().inbound.len()
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().written.clone()
    }

    /// Everything written since the last call.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.lock().written)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    /// Number of `close` calls.
    pub fn close_count(&self) -> usize {
        self.inner.lock().closes
    }
}

impl Transport for LoopbackTransport {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let inner = self.inner.lock();
        if inner.fail_reads {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        Ok(inner.inbound.len())
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut inner = self.inner.lock();
        if inner.fail_reads {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        Ok(inner.inbound.pop_front())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if inner.fail_writes {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        inner.written.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.connected = false;
        inner.closes += 1;
        Ok(())
    }
}
