//! Creates `/dev` nodes and symlinks, runs the SELinux labeling hook, and
//! publishes the opaque `ctl.dev_added`/`ctl.dev_removed` properties.
//! Grounded on `init/devices.c`'s `make_device`/`make_link`/`handle_device`.

use std::os::unix::fs::symlink;
use std::path::Path;

use nix::sys::stat::{makedev, mknod, Mode, SFlag};
use nix::unistd::{chown, setegid, Gid, Uid};

use crate::constants::ROOT_GID;

/// Publishes the two opaque properties the original communicates device
/// lifecycle through. `ctl.dev_added`/`ctl.dev_removed` are consumed by the
/// property service, an external collaborator; this default just logs, so
/// the crate runs without one attached.
pub trait PropertySink {
    fn publish(&self, name: &str, value: &str);
}

pub struct LoggingPropertySink;

impl PropertySink for LoggingPropertySink {
    fn publish(&self, name: &str, value: &str) {
        log::info!("property {name}={value}");
    }
}

/// Resolves a file-creation SELinux context for a path about to be
/// `mknod`'d. The SELinux label lookup service is an external collaborator;
/// this default is a no-op so the crate runs on systems without SELinux,
/// matching the original's `if (sehandle) ...` guard.
pub trait SeLabeler {
    fn file_context(&self, path: &str, mode: u32) -> Option<String>;
    /// Sets the process-wide file-creation context. Must be paired with a
    /// call to [`Self::clear_file_context`] on every path out, including
    /// error paths.
    fn set_file_context(&self, _context: &str) {}
    fn clear_file_context(&self) {}
}

pub struct NoopSeLabeler;

impl SeLabeler for NoopSeLabeler {
    fn file_context(&self, _path: &str, _mode: u32) -> Option<String> {
        None
    }
}

pub struct DeviceNodeFactory {
    property_sink: Box<dyn PropertySink>,
    labeler: Box<dyn SeLabeler>,
}

impl Default for DeviceNodeFactory {
    #[cfg(not(feature = "selinux"))]
    fn default() -> Self {
        Self {
            property_sink: Box::new(LoggingPropertySink),
            labeler: Box::new(NoopSeLabeler),
        }
    }

    #[cfg(feature = "selinux")]
    fn default() -> Self {
        Self {
            property_sink: Box::new(LoggingPropertySink),
            labeler: Box::new(crate::selinux_label::RealSeLabeler),
        }
    }
}

impl DeviceNodeFactory {
    pub fn new(property_sink: Box<dyn PropertySink>, labeler: Box<dyn SeLabeler>) -> Self {
        Self { property_sink, labeler }
    }

    /// Creates `devpath` as a block or character device node with the given
    /// `(mode, uid, gid)`, then every symlink in `links` pointing at it, and
    /// publishes `ctl.dev_added`. Parent directories for both the node and
    /// each symlink are created as needed.
    ///
    /// The `setegid`/`mknod`/`chown`/`setegid(root)` sequence is
    /// load-bearing: it closes the gid race without touching the uid race,
    /// which is preserved knowingly.
    pub fn add(&self, devpath: &str, block: bool, major: i32, minor: i32, mode: u32, uid: u32, gid: u32, links: &[String]) {
        if major >= 0 && minor >= 0 {
            self.make_node(devpath, block, major, minor, mode, uid, gid);
        }
        self.property_sink.publish("ctl.dev_added", devpath);
        for link in links {
            self.make_link(devpath, link);
        }
    }

    /// Unlinks every symlink, publishes `ctl.dev_removed`, then unlinks the
    /// node itself if it carried a kernel-assigned major/minor.
    pub fn remove(&self, devpath: &str, major: i32, minor: i32, links: &[String]) {
        for link in links {
            if let Err(e) = std::fs::remove_file(link) {
                log::debug!("remove symlink {link} failed: {e}");
            }
        }
        self.property_sink.publish("ctl.dev_removed", devpath);
        if major >= 0 && minor >= 0 {
            if let Err(e) = std::fs::remove_file(devpath) {
                log::debug!("remove node {devpath} failed: {e}");
            }
        }
    }

    fn make_node(&self, devpath: &str, block: bool, major: i32, minor: i32, mode: u32, uid: u32, gid: u32) {
        if let Some(parent) = Path::new(devpath).parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let kind = if block { SFlag::S_IFBLK } else { SFlag::S_IFCHR };
        let perm = Mode::from_bits_truncate(mode);
        let dev = makedev(major as u64, minor as u64);

        let context = self.labeler.file_context(devpath, mode);
        if let Some(ctx) = context.as_deref() {
            self.labeler.set_file_context(ctx);
        }

        // Closes the gid race; the uid race (chown after mknod, not atomic
        // with it) remains by design.
        if let Err(e) = setegid(Gid::from_raw(gid)) {
            log::warn!("setegid({gid}) failed for {devpath}: {e}");
        }
        let mknod_result = mknod(devpath, kind, perm, dev);
        if let Err(e) = chown(devpath, Some(Uid::from_raw(uid)), None) {
            log::debug!("chown {devpath} failed: {e}");
        }
        if let Err(e) = setegid(Gid::from_raw(ROOT_GID)) {
            log::error!("failed to restore egid to root after creating {devpath}: {e}");
        }

        if context.is_some() {
            self.labeler.clear_file_context();
        }

        if let Err(e) = mknod_result {
            log::debug!("mknod {devpath} failed: {e}");
        }
    }

    fn make_link(&self, target: &str, link: &str) {
        if let Some(parent) = Path::new(link).parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::debug!("create_dir_all {} failed: {e}", parent.display());
                return;
            }
        }
        let _ = std::fs::remove_file(link);
        if let Err(e) = symlink(target, link) {
            log::debug!("symlink {link} -> {target} failed: {e}");
        }
    }
}
