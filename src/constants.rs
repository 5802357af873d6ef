//! Embedding-time constants. Each one can be overridden from the CLI (see
//! [`crate::cli`]) so the binary can run against a scratch directory during
//! development instead of the real `/dev` and `/sys`.

/// Default root group id, restored after every `setegid` swap in
/// [`crate::device_node`].
pub const ROOT_GID: u32 = 0;

pub const SYSFS_PREFIX: &str = "/sys";

#[cfg(target_arch = "x86")]
pub const FIRMWARE_DIR1: &str = "/system/lib/firmware";
#[cfg(not(target_arch = "x86"))]
pub const FIRMWARE_DIR1: &str = "/etc/firmware";

pub const FIRMWARE_DIR2: &str = "/vendor/firmware";
pub const FIRMWARE_DIR3: &str = "/firmware/image";

pub const MODULES_ALIAS: &str = "/system/lib/modules/modules.alias";
pub const MODULES_BLKLST: &str = "/system/etc/modules.blacklist";

/// Sentinel checked by the firmware loader while it retries a missing file.
pub const BOOTING_SENTINEL: &str = "/dev/.booting";

/// Sentinel written after the first successful coldboot; its presence skips
/// coldboot on subsequent boots.
pub const COLDBOOT_DONE_DEFAULT: &str = "/dev/.coldboot_done";

/// Boot property consulted by the GPT by-name rule.
pub const INSTALL_ID_PROPERTY: &str = "ro.boot.install_id";

/// Page size used for firmware copy chunking.
pub const FIRMWARE_COPY_CHUNK: usize = 4096;

/// Netlink receive buffer the socket asks the kernel for before falling back.
pub const NETLINK_RCVBUF_TARGET: usize = 1024 * 1024;

/// Max size of one uevent datagram; datagrams that fill this are presumed
/// truncated/overflowed and dropped.
pub const UEVENT_MSG_LEN: usize = 1024;
