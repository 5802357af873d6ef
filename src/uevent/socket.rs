//! Netlink `NETLINK_KOBJECT_UEVENT` socket handling ([`SocketDrain`] in the
//! design doc). `nix`'s safe socket wrappers don't cover arbitrary netlink
//! protocols or multicast groups, so this reaches into raw `libc` the same
//! way the crate's own `nix::libc` re-export is used elsewhere for
//! low-level constants the safe API doesn't expose.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use crate::constants::{NETLINK_RCVBUF_TARGET, UEVENT_MSG_LEN};
use crate::error::DeviceManagerError;

/// The kernel multicast group hotplug uevents are broadcast on.
const KOBJECT_UEVENT_GROUP: u32 = 1;

pub struct UeventSocket {
    fd: OwnedFd,
}

impl UeventSocket {
    /// Opens and binds the netlink socket, non-blocking and close-on-exec,
    /// with as large a receive buffer as the kernel will grant.
    pub fn open() -> Result<Self, DeviceManagerError> {
        // SAFETY: a plain syscall with no pointers beyond the ones we build
        // below; the flags are validated by the kernel.
        let raw = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
                libc::NETLINK_KOBJECT_UEVENT,
            )
        };
        if raw < 0 {
            return Err(DeviceManagerError::SocketSetup(nix::Error::last()));
        }
        // SAFETY: raw is a valid, just-created, owned fd.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // Best effort: ask for a 1MiB receive buffer, falling back to
        // whatever the kernel's default sysctl allows.
        let target = NETLINK_RCVBUF_TARGET as libc::c_int;
        unsafe {
            let _ = libc::setsockopt(
                fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVBUFFORCE,
                &target as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
        }

        let mut addr: libc::sockaddr_nl = unsafe { std::mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
        addr.nl_pid = 0;
        addr.nl_groups = KOBJECT_UEVENT_GROUP;

        let ret = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(DeviceManagerError::SocketSetup(nix::Error::last()));
        }

        Ok(UeventSocket { fd })
    }

    /// Receives one datagram into a buffer whose last two bytes are left
    /// zero, per the [`crate::uevent::parse`] sentinel convention. Returns
    /// `Ok(None)` on `EAGAIN` (nothing pending) and drops messages that fill
    /// the buffer (presumed overflow).
    pub fn recv_one(&self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; UEVENT_MSG_LEN + 2];
        let n = unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                UEVENT_MSG_LEN,
                0,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EWOULDBLOCK) => Ok(None),
                _ => Err(err),
            };
        }
        let n = n as usize;
        if n >= UEVENT_MSG_LEN {
            log::warn!("uevent datagram filled the receive buffer, discarding");
            return Ok(None);
        }
        buf.truncate(n + 2);
        buf[n] = 0;
        buf[n + 1] = 0;
        Ok(Some(buf))
    }

    /// Drains every pending datagram, invoking `handler` for each one.
    /// Used both by the main loop (after a poll readiness notification) and
    /// by coldboot (to keep the socket from overrunning between writes).
    pub fn drain(&self, mut handler: impl FnMut(&[u8])) -> io::Result<()> {
        while let Some(msg) = self.recv_one()? {
            handler(&msg);
        }
        Ok(())
    }
}

impl AsRawFd for UeventSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
