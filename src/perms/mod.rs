//! Ordered device-node and sysfs-attribute permission rule tables.
//! Grounded on `init/devices.c`'s `dev_perms`/`sys_perms` lists
//! (`add_dev_perms`, `get_device_perm`, `fixup_sys_perms`), rewritten as two
//! owned `Vec`s per spec.md §9 ("no cross-list linkage exists"). Wildcard
//! matching uses the `glob-match` crate, the same one the teacher reaches
//! for wherever it needs shell-style globbing.

pub mod product;

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

pub use product::ProductPermEntry;

const SYS_FIXUP_BUF_LIMIT: usize = 512;

/// Default node ownership/mode when no `dev_rules` entry matches.
pub const DEFAULT_MODE: u32 = 0o600;

#[derive(Debug, Clone)]
pub struct PermRule {
    pub pattern: String,
    pub attr: Option<String>,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub wildcard: bool,
}

impl PermRule {
    fn matches(&self, candidate: &str) -> bool {
        if self.wildcard {
            glob_match::glob_match(&self.pattern, candidate)
        } else {
            self.pattern == candidate
        }
    }
}

/// Owns the two ordered rule collections plus the ancillary product-perm
/// table (spec.md §3's `ProductPermEntry`, matched by `EventDispatcher`
/// step 4 against `uevent.product`).
#[derive(Debug, Default)]
pub struct PermRules {
    dev_rules: Vec<PermRule>,
    sys_rules: Vec<PermRule>,
    product_rules: Vec<ProductPermEntry>,
}

impl PermRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts at the tail of `dev_rules` (when `attr` is `None`) or
    /// `sys_rules` (when it is `Some`). Insertion order is match order:
    /// `dev_rules` is later scanned newest-first (see [`Self::lookup_dev`]),
    /// `sys_rules` oldest-first (see [`Self::fixup_sys`]).
    pub fn add(&mut self, pattern: impl Into<String>, attr: Option<String>, mode: u32, uid: u32, gid: u32, wildcard: bool) {
        let rule = PermRule {
            pattern: pattern.into(),
            attr,
            mode,
            uid,
            gid,
            wildcard,
        };
        if rule.attr.is_some() {
            self.sys_rules.push(rule);
        } else {
            self.dev_rules.push(rule);
        }
    }

    pub fn add_product_rule(&mut self, entry: ProductPermEntry) {
        self.product_rules.push(entry);
    }

    /// Scans `dev_rules` newest-first so a later-loaded rule file (e.g. a
    /// hardware-specific one) overrides an earlier default. Returns
    /// `(mode, uid, gid)`; defaults to `(0600, 0, 0)` when nothing matches.
    pub fn lookup_dev(&self, path: &str) -> (u32, u32, u32) {
        for rule in self.dev_rules.iter().rev() {
            if rule.matches(path) {
                return (rule.mode, rule.uid, rule.gid);
            }
        }
        (DEFAULT_MODE, 0, 0)
    }

    /// Applies every matching `sys_rules` entry to `/sys{sys_upath}/{attr}`,
    /// oldest-first (so, unlike `dev_rules`, later rules do not override
    /// earlier ones for the same attribute -- every match is applied).
    /// Rules whose composed path would overflow a 512-byte buffer are
    /// silently skipped, mirroring the fixed `char buf[512]` in the
    /// original `fixup_sys_perms`.
    pub fn fixup_sys(&self, sys_upath: &str) {
        for (rule, full) in self.matching_sys_fixups(sys_upath) {
            apply_ownership(&full, rule.uid, rule.gid, rule.mode);
        }
    }

    /// The matching half of [`Self::fixup_sys`], split out so it can be
    /// exercised without touching the filesystem: yields every `sys_rules`
    /// entry whose pattern matches `/sys{sys_upath}` (oldest-first), paired
    /// with its composed `/sys{sys_upath}/{attr}` path, skipping any whose
    /// composed path would overflow the 512-byte buffer.
    fn matching_sys_fixups<'a>(&'a self, sys_upath: &'a str) -> impl Iterator<Item = (&'a PermRule, String)> + 'a {
        let full_upath = format!("/sys{sys_upath}");
        self.sys_rules.iter().filter_map(move |rule| {
            if !rule.matches(&full_upath) {
                return None;
            }
            let attr = rule.attr.as_deref()?;
            // "/sys" + upath + "/" + attr + NUL, same accounting as the
            // original's `strlen(upath) + strlen(dp->attr) + 6`.
            if sys_upath.len() + attr.len() + 6 > SYS_FIXUP_BUF_LIMIT {
                return None;
            }
            Some((rule, format!("/sys{sys_upath}/{attr}")))
        })
    }

    /// Prefix-matches `product` against every registered
    /// [`ProductPermEntry`], first match wins, and applies its ownership to
    /// `/dev/<device_name>`.
    pub fn fixup_product(&self, product: Option<&str>, device_name: Option<&str>) {
        let (Some(product), Some(device_name)) = (product, device_name) else {
            return;
        };
        for entry in &self.product_rules {
            if entry.matches(product) {
                let path = format!("/dev/{device_name}");
                apply_ownership(&path, entry.uid, entry.gid, entry.mode);
                break;
            }
        }
    }
}

/// `chown` then `chmod` a path, logging and continuing on failure (per
/// spec.md §7: transient resource failures are dropped, never propagated).
pub fn apply_ownership(path: &str, uid: u32, gid: u32, mode: u32) {
    log::debug!("fixup {path} {uid} {gid} {mode:#o}");
    if let Err(e) = nix::unistd::chown(
        path,
        Some(nix::unistd::Uid::from_raw(uid)),
        Some(nix::unistd::Gid::from_raw(gid)),
    ) {
        log::debug!("chown {path} failed: {e}");
        return;
    }
    if let Err(e) = std::fs::set_permissions(Path::new(path), std::fs::Permissions::from_mode(mode)) {
        log::debug!("chmod {path} failed: {e}");
    }
}
