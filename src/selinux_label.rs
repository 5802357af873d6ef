//! Real SELinux file-creation-context labeling, behind the `selinux`
//! feature. Grounded on `init/devices.c`'s `selabel_lookup_best_match`
//! (`sehandle`) plus `setfscreatecon`/`freecon` pairing; the `selinux` crate
//! is the same kind of narrow FFI wrapper the pack's bootc install path
//! reaches for when it needs a SELinux-state concept
//! (`examples/rsturla-bootc/crates/lib/src/install/aleph.rs`), here used for
//! the labeling API instead of install-time state tracking.

use selinux::SecurityContext;

use crate::device_node::SeLabeler;

/// Backed by `selinux::SecurityContext::lookup_best_match`/`set_fscreate`.
/// A lookup failure is logged and treated as "no context", matching the
/// original's tolerance for a missing or stale file_contexts database.
///
/// Unlike `SecurityContext::of_path`, this is a `file_contexts` *policy*
/// lookup keyed on `(path, mode)` -- it does not read an existing
/// filesystem object, which matters here because it runs before `mknod`
/// creates the node (see `device_node::make_node`). `of_path` would read
/// the context of a path that doesn't exist yet and always come back
/// empty, silently disabling labeling.
pub struct RealSeLabeler;

impl SeLabeler for RealSeLabeler {
    fn file_context(&self, path: &str, mode: u32) -> Option<String> {
        match SecurityContext::lookup_best_match(path, mode) {
            Ok(Some(ctx)) => ctx
                .to_c_string()
                .ok()
                .flatten()
                .map(|s| s.to_string_lossy().into_owned()),
            Ok(None) => None,
            Err(e) => {
                log::debug!("selinux file_contexts lookup failed for {path}: {e}");
                None
            }
        }
    }

    fn set_file_context(&self, context: &str) {
        match std::ffi::CString::new(context) {
            Ok(c) => {
                if let Err(e) = SecurityContext::set_fscreate(Some(&c)) {
                    log::warn!("setfscreatecon({context}) failed: {e}");
                }
            }
            Err(e) => log::warn!("invalid selinux context {context:?}: {e}"),
        }
    }

    fn clear_file_context(&self) {
        if let Err(e) = SecurityContext::set_fscreate(None) {
            log::warn!("failed to clear fscreatecon: {e}");
        }
    }
}
