//! Pure link-synthesis helpers shared by the block and generic handlers in
//! [`crate::dispatch`]. Grounded on `init/devices.c`'s
//! `parse_platform_block_device`, `parse_gpt_block_device`, and
//! `get_character_device_symlinks`.

/// Last path segment after the final `/` (the original's `strrchr(path,
/// '/') + 1`).
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Replaces every byte outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Symlinks for a block device whose sysfs path is rooted under a known
/// platform bus: `by-name/<sanitised partname>`, `by-num/p<n>`, and always
/// the plain basename link, all under `/dev/block/platform/<bus_name>/`.
pub fn platform_block_links(bus_name: &str, path: &str, partition_name: Option<&str>, partition_num: i32) -> Vec<String> {
    let link_path = format!("/dev/block/platform/{bus_name}");
    let mut links = Vec::new();

    if let Some(partname) = partition_name {
        links.push(format!("{link_path}/by-name/{}", sanitize(partname)));
    }
    if partition_num >= 0 {
        links.push(format!("{link_path}/by-num/p{partition_num}"));
    }
    links.push(format!("{link_path}/{}", basename(path)));
    links
}

/// The GPT by-name rule (spec.md S2): when `install_id` is set and is a
/// prefix of `partition_name`, yields exactly one link,
/// `/dev/block/by-name/<suffix-after-prefix>`, and nothing else -- platform
/// links are skipped entirely when this rule fires (the "open question" in
/// spec.md §9 is resolved by following the original's behaviour verbatim:
/// the canonical `/dev/block/<basename>` node is still created, only the
/// *platform* links are suppressed).
pub fn gpt_block_link(install_id: Option<&str>, partition_name: Option<&str>) -> Option<Vec<String>> {
    let install_id = install_id?;
    let partition_name = partition_name?;
    if install_id.is_empty() || !partition_name.starts_with(install_id) {
        return None;
    }
    let suffix = &partition_name[install_id.len()..];
    Some(vec![format!("/dev/block/by-name/{suffix}")])
}

/// Character-device symlink for a platform USB device: only when the
/// device's path (past the platform-bus prefix) begins with the 4 bytes
/// `/usb` (so a root-hub segment like `/usb1/...` qualifies, not just a
/// literal `/usb/` segment). Skips the root-hub and device segments, takes
/// the following segment as the interface id, and yields
/// `/dev/usb/<subsystem><iface>`.
pub fn usb_char_link(subsystem: &str, path_after_bus: &str) -> Option<String> {
    if !path_after_bus.starts_with("/usb") {
        return None;
    }
    // First element of split is "" (text before the leading '/'); skip it,
    // then the root-hub segment, the device segment, and take the third
    // as the interface id.
    let mut segments = path_after_bus.split('/').skip(1);
    let _root_hub = segments.next().filter(|s| !s.is_empty())?;
    let _device = segments.next().filter(|s| !s.is_empty())?;
    let iface = segments.next().filter(|s| !s.is_empty())?;
    Some(format!("/dev/usb/{subsystem}{iface}"))
}

/// Where a generic (non-block, non-platform) device node should land.
/// Grounded on `init/devices.c`'s `handle_generic_device_event` subsystem
/// dispatch table (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenericRoute {
    /// `usb*` subsystem other than the exact string `usb`: the original
    /// uevent is ignored entirely.
    Skip,
    /// The exact `usb` subsystem: the node path is fully determined here
    /// (from `DEVNAME` or a synthesised bus/device path) and character-link
    /// synthesis is not attempted for it.
    DevpathOverride(String),
    /// Every other subsystem: create `dir` then place the node at
    /// `dir/name`; eligible for character-link synthesis via
    /// [`usb_char_link`]/[`crate::platform::PlatformTopology`].
    BaseDir { dir: String, name: String },
}

/// Routes a generic-subsystem uevent per the table in spec.md §4.4.
/// `name` is the device's basename (already length-checked by the caller);
/// `minor` is used only for the USB bus/device numeric fallback.
pub fn route_generic(subsystem: &str, name: &str, minor: i32, device_name: Option<&str>) -> GenericRoute {
    if subsystem == "usb" {
        return match device_name {
            Some(dn) => GenericRoute::DevpathOverride(format!("/dev/{dn}")),
            None => {
                let bus = minor / 128 + 1;
                let dev = minor % 128 + 1;
                GenericRoute::DevpathOverride(format!("/dev/bus/usb/{bus:03}/{dev:03}"))
            }
        };
    }
    if subsystem.starts_with("usb") {
        return GenericRoute::Skip;
    }
    if subsystem.starts_with("graphics") {
        return GenericRoute::BaseDir { dir: "/dev/graphics".into(), name: name.to_string() };
    }
    if subsystem.starts_with("drm") {
        return GenericRoute::BaseDir { dir: "/dev/dri".into(), name: name.to_string() };
    }
    if subsystem.starts_with("oncrpc") {
        return GenericRoute::BaseDir { dir: "/dev/oncrpc".into(), name: name.to_string() };
    }
    if subsystem.starts_with("adsp") {
        return GenericRoute::BaseDir { dir: "/dev/adsp".into(), name: name.to_string() };
    }
    if subsystem.starts_with("msm_camera") {
        return GenericRoute::BaseDir { dir: "/dev/msm_camera".into(), name: name.to_string() };
    }
    if subsystem.starts_with("input") {
        return GenericRoute::BaseDir { dir: "/dev/input".into(), name: name.to_string() };
    }
    if subsystem.starts_with("mtd") {
        return GenericRoute::BaseDir { dir: "/dev/mtd".into(), name: name.to_string() };
    }
    if subsystem.starts_with("sound") {
        return GenericRoute::BaseDir { dir: "/dev/snd".into(), name: name.to_string() };
    }
    if subsystem.starts_with("misc") {
        if let Some(stripped) = name.strip_prefix("log_") {
            return GenericRoute::BaseDir { dir: "/dev/log".into(), name: stripped.to_string() };
        }
    }
    GenericRoute::BaseDir { dir: "/dev".into(), name: name.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_takes_final_segment() {
        assert_eq!(basename("/devices/platform/sdhci.1/block/mmcblk0p3"), "mmcblk0p3");
        assert_eq!(basename("noslash"), "noslash");
    }

    #[test]
    fn sanitize_replaces_unsafe_bytes() {
        assert_eq!(sanitize("user data!"), "user_data_");
        assert_eq!(sanitize("valid-name_1.2"), "valid-name_1.2");
    }

    #[test]
    fn platform_block_links_s1_scenario() {
        let links = platform_block_links(
            "sdhci.1",
            "/devices/platform/sdhci.1/mmc_host/mmc0/mmc0:0001/block/mmcblk0p3",
            Some("userdata"),
            3,
        );
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
    fn gpt_rule_s2_scenario() {
        let links = gpt_block_link(Some("slotA_"), Some("slotA_system")).unwrap();
        assert_eq!(links, vec!["/dev/block/by-name/system".to_string()]);
    }

    #[test]
    fn gpt_rule_requires_prefix_match() {
        assert!(gpt_block_link(Some("slotA_"), Some("slotB_system")).is_none());
        assert!(gpt_block_link(None, Some("slotA_system")).is_none());
        assert!(gpt_block_link(Some("slotA_"), None).is_none());
    }

    #[test]
    fn usb_char_link_skips_hub_and_device_segments() {
        let link = usb_char_link("input", "/usb1/1-1/1-1:1.0/input/input0");
        assert_eq!(link.as_deref(), Some("/dev/usb/input1-1:1.0"));
    }

    #[test]
    fn usb_char_link_none_when_not_usb() {
        assert!(usb_char_link("input", "/i2c/0-0050").is_none());
    }

    #[test]
    fn route_generic_usb_with_device_name() {
        let route = route_generic("usb", "event0", 1, Some("bus/usb/001/002"));
        assert_eq!(route, GenericRoute::DevpathOverride("/dev/bus/usb/001/002".into()));
    }

    #[test]
    fn route_generic_usb_without_device_name_uses_minor_math() {
        let route = route_generic("usb", "event0", 129, None);
        assert_eq!(route, GenericRoute::DevpathOverride("/dev/bus/usb/002/002".into()));
    }

    #[test]
    fn route_generic_usb_subtype_is_skipped() {
        assert_eq!(route_generic("usbmon", "u0", 0, None), GenericRoute::Skip);
    }

    #[test]
    fn route_generic_misc_log_prefix_strips_prefix() {
        let route = route_generic("misc", "log_main", 0, None);
        assert_eq!(route, GenericRoute::BaseDir { dir: "/dev/log".into(), name: "main".into() });
    }

    #[test]
    fn route_generic_default_falls_back_to_dev() {
        let route = route_generic("tty", "ttyS0", 0, None);
        assert_eq!(route, GenericRoute::BaseDir { dir: "/dev".into(), name: "ttyS0".into() });
    }
}
