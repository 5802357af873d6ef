//! Library surface for the early-boot device manager core: uevent parsing,
//! permission rules, platform topology, module autoload, firmware loading,
//! device-node synthesis, and the dispatcher tying them together. Split out
//! of `main.rs` so integration tests (and, eventually, other embedders) can
//! drive [`dispatch::DeviceManager`] directly against a scratch directory.

pub mod cli;
pub mod coldboot;
pub mod constants;
pub mod device_node;
pub mod dispatch;
pub mod error;
pub mod firmware;
pub mod module_autoload;
pub mod perms;
pub mod platform;
#[cfg(feature = "selinux")]
pub mod selinux_label;
pub mod symlinks;
pub mod uevent;
