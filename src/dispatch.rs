//! Routes one parsed [`Uevent`] to the right subsystem handler and owns all
//! of the manager's mutable state in a single [`DeviceManager`] value,
//! owned by whichever thread drives the event loop. Grounded on
//! `init/devices.c`'s `handle_device_event`/`handle_block_device_event`/
//! `handle_generic_device_event`.

use crate::device_node::DeviceNodeFactory;
use crate::firmware::FirmwareLoader;
use crate::module_autoload::ModuleAutoloader;
use crate::perms::PermRules;
use crate::platform::PlatformTopology;
use crate::symlinks::{self, GenericRoute};
use crate::uevent::{Action, Uevent};

/// Device names longer than this are dropped rather than risk overrunning
/// the original's fixed `char devpath[96]` accounting.
const MAX_NAME_LEN: usize = 64;

/// The boot property consulted by the GPT by-name rule. Reading real boot
/// properties is the property service's job, an external collaborator; this
/// is supplied by the embedder instead of hard-coded.
pub trait BootProperties {
    fn get(&self, name: &str) -> Option<String>;
}

pub struct StaticBootProperties(pub Vec<(String, String)>);

impl BootProperties for StaticBootProperties {
    fn get(&self, name: &str) -> Option<String> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }
}

pub struct DeviceManager {
    pub perms: PermRules,
    pub platform: PlatformTopology,
    pub modules: ModuleAutoloader,
    pub nodes: DeviceNodeFactory,
    pub firmware: FirmwareLoader,
    pub boot_props: Box<dyn BootProperties>,
}

impl DeviceManager {
    pub fn new(modules: ModuleAutoloader, boot_props: Box<dyn BootProperties>) -> Self {
        Self {
            perms: PermRules::new(),
            platform: PlatformTopology::new(),
            modules,
            nodes: DeviceNodeFactory::default(),
            firmware: FirmwareLoader::default(),
            boot_props,
        }
    }

    /// Processes one uevent end to end. Never fails: every recoverable
    /// error is logged and the event is otherwise dropped.
    pub fn dispatch(&mut self, event: &Uevent<'_>) {
        if event.action == Action::Add {
            if let Some(modalias) = event.modalias {
                self.modules.on_modalias(Some(modalias));
            }
        }

        if matches!(event.action, Action::Add | Action::Change) {
            self.perms.fixup_sys(event.path);
        }

        if event.subsystem.starts_with("block") {
            self.handle_block(event);
        } else if event.subsystem.starts_with("platform") {
            self.handle_platform(event);
        } else {
            self.handle_generic(event);
        }

        if event.action == Action::Add {
            self.perms.fixup_product(event.product, event.device_name);
        }

        if event.subsystem == "firmware" && event.action == Action::Add {
            if let Some(firmware) = Some(event.firmware).filter(|f| !f.is_empty()) {
                if let Err(e) = self.firmware.dispatch(event.path, firmware) {
                    log::error!("failed to dispatch firmware load for {}: {e}", event.path);
                }
            }
        }
    }

    fn handle_platform(&mut self, event: &Uevent<'_>) {
        match event.action {
            Action::Add => self.platform.add(event.path),
            Action::Remove => self.platform.remove(event.path),
            _ => {}
        }
    }

    fn handle_block(&mut self, event: &Uevent<'_>) {
        let name = symlinks::basename(event.path);
        if name.len() > MAX_NAME_LEN {
            log::debug!("block device name too long, dropping event for {}", event.path);
            return;
        }

        let devpath = format!("/dev/block/{name}");
        let _ = std::fs::create_dir_all("/dev/block");

        let install_id = self.boot_props.get(crate::constants::INSTALL_ID_PROPERTY);
        let links = symlinks::gpt_block_link(install_id.as_deref(), event.partition_name).or_else(|| {
            if event.path.starts_with("/devices/") {
                self.platform.find(event.path).map(|pdev| {
                    symlinks::platform_block_links(&pdev.name, event.path, event.partition_name, event.partition_num)
                })
            } else {
                None
            }
        });
        let links = links.unwrap_or_default();

        let (mode, uid, gid) = self.perms.lookup_dev(&devpath);

        match event.action {
            Action::Add => self.nodes.add(&devpath, true, event.major, event.minor, mode, uid, gid, &links),
            Action::Remove => self.nodes.remove(&devpath, event.major, event.minor, &links),
            _ => {}
        }
    }

    fn handle_generic(&mut self, event: &Uevent<'_>) {
        let name = symlinks::basename(event.path);
        if name.len() > MAX_NAME_LEN {
            log::debug!("generic device name too long, dropping event for {}", event.path);
            return;
        }

        let route = symlinks::route_generic(event.subsystem, name, event.minor, event.device_name);

        let (devpath, allow_char_links) = match route {
            GenericRoute::Skip => return,
            GenericRoute::DevpathOverride(path) => (path, false),
            GenericRoute::BaseDir { dir, name } => {
                let _ = std::fs::create_dir_all(&dir);
                (format!("{dir}/{name}"), true)
            }
        };

        let links = if allow_char_links {
            self.platform
                .find(event.path)
                .and_then(|pdev| {
                    let rest = &event.path[pdev.path.len()..];
                    symlinks::usb_char_link(event.subsystem, rest)
                })
                .map(|link| {
                    let _ = std::fs::create_dir_all("/dev/usb");
                    vec![link]
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let (mode, uid, gid) = self.perms.lookup_dev(&devpath);

        match event.action {
            Action::Add => self.nodes.add(&devpath, false, event.major, event.minor, mode, uid, gid, &links),
            Action::Remove => self.nodes.remove(&devpath, event.major, event.minor, &links),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_autoload::ModuleAutoloader;
    use crate::uevent::parse;

    fn manager_with_install_id(install_id: Option<&str>) -> DeviceManager {
        let props: Vec<(String, String)> = install_id
            .map(|v| vec![(crate::constants::INSTALL_ID_PROPERTY.to_string(), v.to_string())])
            .unwrap_or_default();
        DeviceManager::new(
            ModuleAutoloader::new("/nonexistent/modules.alias", "/nonexistent/modules.blacklist"),
            Box::new(StaticBootProperties(props)),
        )
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

    #[test]
    fn s1_platform_block_add_with_partition_name() {
        let mut mgr = manager_with_install_id(None);
        mgr.platform.add("/devices/platform/sdhci.1");

        let buf = record(&[
            "ACTION=add",
            "DEVPATH=/devices/platform/sdhci.1/mmc_host/mmc0/mmc0:0001/block/mmcblk0p3",
            "SUBSYSTEM=block",
            "MAJOR=179",
            "MINOR=3",
            "PARTN=3",
            "PARTNAME=userdata",
        ]);
        let event = parse(&buf);
        mgr.dispatch(&event);
        // Node creation itself requires root privileges (mknod) and is
        // exercised separately in device_node's tests; here we assert the
        // link synthesis that feeds it, via the public helpers.
        let pdev = mgr.platform.find(event.path).unwrap();
        assert_eq!(pdev.name, "sdhci.1");
        let links = symlinks::platform_block_links(&pdev.name, event.path, event.partition_name, event.partition_num);
        assert_eq!(
            links,
            vec![
                "/dev/block/platform/sdhci.1/by-name/userdata".to_string(),
                "/dev/block/platform/sdhci.1/by-num/p3".to_string(),
                "/dev/block/platform/sdhci.1/mmcblk0p3".to_string(),
            ]
        );
    }

    #[test]
    fn s2_gpt_rule_suppresses_platform_links() {
        let mgr = manager_with_install_id(Some("slotA_"));
        let install_id = mgr.boot_props.get(crate::constants::INSTALL_ID_PROPERTY);
        let links = symlinks::gpt_block_link(install_id.as_deref(), Some("slotA_system"));
        assert_eq!(links, Some(vec!["/dev/block/by-name/system".to_string()]));
    }

    #[test]
    fn s4_modalias_deferred_then_flushed_fifo() {
        let mut mgr = manager_with_install_id(None);

        let buf1 = record(&["ACTION=add", "SUBSYSTEM=pci", "MODALIAS=pci:v00001234d*"]);
        let buf2 = record(&["ACTION=add", "SUBSYSTEM=pci", "MODALIAS=pci:v00001234d*"]);
        mgr.dispatch(&parse(&buf1));
        mgr.dispatch(&parse(&buf2));
        assert_eq!(mgr.modules.deferred_len(), 2);
    }

    #[test]
    fn block_handler_drops_overlong_device_name() {
        let mut mgr = manager_with_install_id(None);
        let long_name = "x".repeat(100);
        let buf = record(&[
            "ACTION=add",
            &format!("DEVPATH=/devices/platform/sdhci.1/block/{long_name}"),
            "SUBSYSTEM=block",
            "MAJOR=179",
            "MINOR=0",
        ]);
        let event = parse(&buf);
        // Should not panic and should simply skip creating anything.
        mgr.dispatch(&event);
    }

    #[test]
    fn generic_handler_routes_input_subsystem_to_dev_input() {
        let mut mgr = manager_with_install_id(None);
        let buf = record(&[
            "ACTION=add",
            "DEVPATH=/devices/virtual/input/input3/event3",
            "SUBSYSTEM=input",
            "MAJOR=13",
            "MINOR=67",
        ]);
        let route = symlinks::route_generic("input", "event3", 67, None);
        assert_eq!(
            route,
            GenericRoute::BaseDir { dir: "/dev/input".into(), name: "event3".into() }
        );
        // exercise full dispatch path too, for panics/logging correctness
        mgr.dispatch(&parse(&buf));
    }
}
