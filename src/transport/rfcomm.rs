//! Safe wrapper over a Linux RFCOMM stream socket.
//!
//! All `unsafe` code of the Bluetooth transport lives here. Callers only see
//! [`RfcommSocket`], which owns its descriptor and closes it on drop.

use std::fs::File;
use std::io::{self, Read, Write};
use std::time::Duration;

/// A connected RFCOMM stream.
#[derive(Debug)]
pub struct RfcommSocket {
    stream: File,
}

impl RfcommSocket {
    /// Connect to `address` (most significant byte first) on `channel`.
    ///
    /// Reads block for at most `timeout`.
    pub fn connect(address: [u8; 6], channel: u8, timeout: Duration) -> io::Result<Self> {
        sys::connect(address, channel, timeout).map(|stream| Self { stream })
    }

    /// Bytes waiting in the receive queue.
    pub fn pending(&self) -> io::Result<usize> {
        sys::pending(&self.stream)
    }
}

impl Read for RfcommSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for RfcommSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::fs::File;
    use std::io;
    use std::mem;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::time::Duration;

    const BTPROTO_RFCOMM: libc::c_int = 3;

    /// `struct sockaddr_rc` from `<bluetooth/rfcomm.h>`.
    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) struct SockaddrRc {
        pub(super) rc_family: libc::sa_family_t,
        pub(super) rc_bdaddr: [u8; 6],
        pub(super) rc_channel: u8,
    }

    impl SockaddrRc {
        /// `bdaddr_t` stores the address little-endian.
        pub(super) fn new(address: [u8; 6], channel: u8) -> Self {
            let mut rc_bdaddr = address;
            rc_bdaddr.reverse();
            Self {
                rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
                rc_bdaddr,
                rc_channel: channel,
            }
        }
    }

    fn check(rc: libc::c_int) -> io::Result<libc::c_int> {
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(rc)
        }
    }

    pub(super) fn connect(address: [u8; 6], channel: u8, timeout: Duration) -> io::Result<File> {
        // SAFETY: socket(2) takes no pointers.
        let fd = check(unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
                BTPROTO_RFCOMM,
            )
        })?;
        // SAFETY: `fd` was just returned by socket(2) and has no other owner.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let addr = SockaddrRc::new(address, channel);
        // SAFETY: `addr` is a live sockaddr_rc and the length is its size.
        check(unsafe {
            libc::connect(
                fd.as_raw_fd(),
                &addr as *const SockaddrRc as *const libc::sockaddr,
                mem::size_of::<SockaddrRc>() as libc::socklen_t,
            )
        })?;

        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        // SAFETY: `tv` is a live timeval and the length is its size.
        check(unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const libc::timeval as *const libc::c_void,
                mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        })?;
        Ok(File::from(fd))
    }

    pub(super) fn pending(socket: &File) -> io::Result<usize> {
        let mut n: libc::c_int = 0;
        // SAFETY: FIONREAD writes one c_int through the pointer, and `n`
        // outlives the call.
        check(unsafe { libc::ioctl(socket.as_raw_fd(), libc::FIONREAD, &mut n as *mut libc::c_int) })?;
        Ok(n.max(0) as usize)
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::fs::File;
    use std::io;
    use std::time::Duration;

    fn unsupported() -> io::Error {
        io::Error::new(io::ErrorKind::Unsupported, "RFCOMM sockets need Linux")
    }

    pub(super) fn connect(_address: [u8; 6], _channel: u8, _timeout: Duration) -> io::Result<File> {
        Err(unsupported())
    }

    pub(super) fn pending(_socket: &File) -> io::Result<usize> {
        Err(unsupported())
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::sys::SockaddrRc;
    use std::mem;

    #[test]
    fn test_sockaddr_rc_layout() {
        // Matches the C struct: u16 family, 6-byte bdaddr, u8 channel, padded
        assert_eq!(mem::size_of::<SockaddrRc>(), 10);
        assert_eq!(mem::align_of::<SockaddrRc>(), 2);
        assert_eq!(mem::offset_of!(SockaddrRc, rc_family), 0);
        assert_eq!(mem::offset_of!(SockaddrRc, rc_bdaddr), 2);
        assert_eq!(mem::offset_of!(SockaddrRc, rc_channel), 8);
    }

    #[test]
    fn test_sockaddr_rc_address_is_little_endian() {
        let addr = SockaddrRc::new([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x13], 1);
        assert_eq!(addr.rc_family, libc::AF_BLUETOOTH as libc::sa_family_t);
        assert_eq!(addr.rc_bdaddr, [0x13, 0x71, 0xDA, 0x7D, 0x1A, 0x00]);
        assert_eq!(addr.rc_channel, 1);
    }
}
