//! Exercises the dispatcher and coldboot walk together against a scratch
//! `/sys`-shaped tree, the way a real boot would present events: platform
//! buses registering first, then block partitions and a generic input
//! device arriving underneath them.

use std::cell::RefCell;
use std::fs;
use std::io::Write;

use devmgrd::coldboot::{self, Drain};
use devmgrd::dispatch::{DeviceManager, StaticBootProperties};
use devmgrd::module_autoload::ModuleAutoloader;
use devmgrd::uevent;

struct NoopDrain;

impl Drain for NoopDrain {
    fn drain(&self, _handler: &mut dyn FnMut(&[u8])) -> std::io::Result<()> {
        Ok(())
    }
}

fn record(parts: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    for p in parts {
        buf.extend_from_slice(p.as_bytes());
        buf.push(0);
    }
    buf.push(0);
    buf
}

fn manager() -> DeviceManager {
    DeviceManager::new(
        ModuleAutoloader::new("/nonexistent/modules.alias", "/nonexistent/modules.blacklist"),
        Box::new(StaticBootProperties(Vec::new())),
    )
}

#[test]
fn coldboot_walk_then_live_events_share_the_same_dispatcher() {
    let tmp = tempfile::tempdir().unwrap();
    let sys_class = tmp.path().join("class/tty");
    fs::create_dir_all(&sys_class).unwrap();
    fs::write(sys_class.join("uevent"), b"").unwrap();

    let mut mgr = manager();
    let seen = RefCell::new(0usize);

    // Coldboot pokes the tree; nothing is actually queued on our stand-in
    // socket, so the handler never fires from the walk itself, but the walk
    // must still complete without touching anything outside `tmp`.
    coldboot::walk(tmp.path(), &NoopDrain, &mut |msg| {
        *seen.borrow_mut() += 1;
        let event = uevent::parse(msg);
        mgr.dispatch(&event);
    });
    assert_eq!(fs::read_to_string(sys_class.join("uevent")).unwrap(), "add\n");
    assert_eq!(*seen.borrow(), 0);

    // A platform bus shows up live...
    let platform_add = record(&["ACTION=add", "DEVPATH=/devices/platform/sdhci.1", "SUBSYSTEM=platform"]);
    mgr.dispatch(&uevent::parse(&platform_add));
    assert!(mgr.platform.find("/devices/platform/sdhci.1/mmc_host").is_some());

    // ...then a partition under it, without a kernel-assigned devnum so no
    // real mknod is attempted.
    let partition_add = record(&[
        "ACTION=add",
        "DEVPATH=/devices/platform/sdhci.1/mmc_host/mmc0/mmc0:0001/block/mmcblk0p3",
        "SUBSYSTEM=block",
        "PARTN=3",
        "PARTNAME=userdata",
    ]);
    mgr.dispatch(&uevent::parse(&partition_add));

    // ...and is later removed; the platform topology entry survives removal
    // of a subdevice since only an exact-path remove is honoured.
    let platform_remove = record(&["ACTION=remove", "DEVPATH=/devices/platform/sdhci.1/mmc_host", "SUBSYSTEM=platform"]);
    mgr.dispatch(&uevent::parse(&platform_remove));
    assert!(mgr.platform.find("/devices/platform/sdhci.1/mmc_host").is_some());

    let platform_remove_exact = record(&["ACTION=remove", "DEVPATH=/devices/platform/sdhci.1", "SUBSYSTEM=platform"]);
    mgr.dispatch(&uevent::parse(&platform_remove_exact));
    assert!(mgr.platform.find("/devices/platform/sdhci.1/mmc_host").is_none());
}

#[test]
fn modalias_events_load_real_tables_and_drain_the_deferred_queue() {
    let aliases_dir = tempfile::tempdir().unwrap();
    let aliases_path = aliases_dir.path().join("modules.alias");
    let blacklist_path = aliases_dir.path().join("modules.blacklist");
    fs::write(&blacklist_path, b"").unwrap();

    // The alias table isn't there yet: the first two modalias events queue
    // up behind it, exactly like hardware probed before /system is mounted.
    let mut mgr = DeviceManager::new(
        ModuleAutoloader::new(aliases_path.to_str().unwrap(), blacklist_path.to_str().unwrap()),
        Box::new(StaticBootProperties(Vec::new())),
    );

    let ev1 = record(&["ACTION=add", "SUBSYSTEM=pci", "MODALIAS=pci:v00001234d*"]);
    let ev2 = record(&["ACTION=add", "SUBSYSTEM=pci", "MODALIAS=pci:v00005678d*"]);
    mgr.dispatch(&uevent::parse(&ev1));
    mgr.dispatch(&uevent::parse(&ev2));
    assert_eq!(mgr.modules.deferred_len(), 2);

    // /system mounts, modules.alias becomes readable, and a third event
    // triggers the table load and the deferred drain.
    let mut f = fs::File::create(&aliases_path).unwrap();
    writeln!(f, "alias pci:v00001234d* sdhci").unwrap();
    writeln!(f, "alias pci:v00005678d* xhci_hcd").unwrap();
    drop(f);

    let ev3 = record(&["ACTION=add", "SUBSYSTEM=pci", "MODALIAS=pci:v0000ffffd*"]);
    mgr.dispatch(&uevent::parse(&ev3));
    assert_eq!(mgr.modules.deferred_len(), 0);
}

#[test]
fn overlong_device_name_is_dropped_without_touching_the_platform_cache() {
    let mut mgr = manager();
    let long_name = "x".repeat(100);
    let buf = record(&[
        "ACTION=add",
        &format!("DEVPATH=/devices/virtual/misc/{long_name}"),
        "SUBSYSTEM=misc",
    ]);
    mgr.dispatch(&uevent::parse(&buf));
    // No panic, and nothing was registered anywhere there'd be a cache to
    // pollute.
    assert!(mgr.platform.find("/devices/virtual/misc").is_none());
}
