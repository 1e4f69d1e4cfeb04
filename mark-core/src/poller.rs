//! Background loop that drains the transport into the dispatcher.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::PollerConfig;
use crate::error::Result;

/// Something the poller can drive one byte at a time.
pub trait Pump: Send + Sync + 'static {
    /// Bytes readable without blocking.
    fn bytes_available(&self) -> Result<usize>;

    /// Process one byte. Returns `true` when it completed a message.
    fn iterate(&self) -> Result<bool>;

    /// Drop a partially received message.
    fn discard_partial(&self);

    /// Count a transport error.
    fn record_error(&self);

    /// Whether the pump is shut down for good.
    fn is_closed(&self) -> bool;
}

/// Handle to a running poller thread.
///
/// Stopping is cooperative: the loop checks the flag before every byte, so
/// an in-flight read finishes first. Any partial message is discarded when
/// the loop exits.
pub struct Poller {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Spawn a named poller thread for `pump`.
    pub fn spawn<P: Pump>(pump: Arc<P>, config: PollerConfig, name: String) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || run(&*pump, &flag, config))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Ask the loop to exit. Safe to call from any thread, any number of times.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait for it to exit.
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("poller thread panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<P: Pump + ?Sized>(pump: &P, stop: &AtomicBool, config: PollerConfig) {
    log::debug!("poller started");
    while !stop.load(Ordering::Acquire) && !pump.is_closed() {
        let step = pump.bytes_available().and_then(|n| {
            if n == 0 {
                thread::sleep(config.idle_sleep);
                Ok(false)
            } else {
                pump.iterate()
            }
        });
        if let Err(err) = step {
            if pump.is_closed() {
                break;
            }
            pump.record_error();
            log::warn!("poller: {err}");
            thread::sleep(config.error_backoff);
        }
    }
    pump.discard_partial();
    log::debug!("poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct MockPump {
        bytes: Mutex<VecDeque<Result<u8, ()>>>,
        seen: Mutex<Vec<u8>>,
        errors: Mutex<u32>,
        discards: Mutex<u32>,
    }

    impl Pump for MockPump {
        fn bytes_available(&self) -> Result<usize> {
            Ok(self.bytes.lock().len())
        }

        fn iterate(&self) -> Result<bool> {
            match self.bytes.lock().pop_front() {
                Some(Ok(b)) => {
                    self.seen.lock().push(b);
                    Ok(true)
                }
                Some(Err(())) => Err(Error::Transport(io::ErrorKind::BrokenPipe.into())),
                None => Ok(false),
            }
        }

        fn discard_partial(&self) {
            *self.discards.lock() += 1;
        }

        fn record_error(&self) {
            *self.errors.lock() += 1;
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    fn fast() -> PollerConfig {
        PollerConfig {
            idle_sleep: Duration::from_millis(1),
            error_backoff: Duration::from_millis(1),
        }
    }

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_drains_in_order() {
        let pump = Arc::new(MockPump::default());
        pump.bytes.lock().extend([Ok(1), Ok(2), Ok(3)]);
        let poller = Poller::spawn(Arc::clone(&pump), fast(), "test-poller".into()).unwrap();
        assert!(wait_until(|| pump.seen.lock().len() == 3));
        poller.join();
        assert_eq!(*pump.seen.lock(), vec![1, 2, 3]);
        assert_eq!(*pump.discards.lock(), 1);
    }

    #[test]
    fn test_errors_counted_and_loop_continues() {
        let pump = Arc::new(MockPump::default());
        pump.bytes.lock().extend([Ok(1), Err(()), Ok(2)]);
        let poller = Poller::spawn(Arc::clone(&pump), fast(), "test-poller".into()).unwrap();
        assert!(wait_until(|| pump.seen.lock().len() == 2));
        poller.join();
        assert_eq!(*pump.errors.lock(), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let pump = Arc::new(MockPump::default());
        let poller = Poller::spawn(Arc::clone(&pump), fast(), "test-poller".into()).unwrap();
        assert!(poller.is_running());
        poller.stop();
        poller.stop();
        assert!(wait_until(|| !poller.is_running()));
        drop(poller);
        assert_eq!(*pump.discards.lock(), 1);
    }
}
