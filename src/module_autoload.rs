//! Alias/blacklist tables, deferred-load queue, and modalias-driven module
//! probing. Grounded on `init/devices.c`'s `modules_aliases_map`,
//! `modules_blacklist`, `deferred_module_loading_list`,
//! `handle_module_loading`/`load_module_by_device_modalias`/`module_probe`.
//!
//! Unlike the dev/sys-perm rule grammar (left to an external collaborator,
//! per spec.md §1), the `modules.alias`/`modules.blacklist` grammars are
//! given in full in spec.md §6 and are simple enough to own here.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ModuleAlias {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone)]
pub struct ModuleBlacklist {
    pub name: String,
}

/// Inserts a kernel module by name; the real `insmod_by_dep` is an opaque
/// external collaborator (spec.md §1), so this is a trait an embedder can
/// swap out. The default shells out the way the teacher's `udev::mod.rs`
/// shells out to `udevadm` via `Command`, just synchronously.
pub trait ModuleInserter {
    fn insert(&self, name: &str) -> bool;
}

pub struct ProcessModuleInserter;

impl ModuleInserter for ProcessModuleInserter {
    fn insert(&self, name: &str) -> bool {
        for bin in ["/sbin/modprobe", "/sbin/insmod"] {
            if !Path::new(bin).exists() {
                continue;
            }
            match std::process::Command::new(bin).arg(name).status() {
                Ok(status) if status.success() => return true,
                Ok(status) => {
                    log::info!("cannot load module {name} due to uevents (exit {status})");
                }
                Err(e) => log::warn!("failed to spawn {bin} for module {name}: {e}"),
            }
        }
        false
    }
}

pub struct ModuleAutoloader {
    aliases: Vec<ModuleAlias>,
    blacklist: Vec<ModuleBlacklist>,
    deferred: VecDeque<String>,
    aliases_path: String,
    blacklist_path: String,
    inserter: Box<dyn ModuleInserter>,
}

impl ModuleAutoloader {
    pub fn new(aliases_path: impl Into<String>, blacklist_path: impl Into<String>) -> Self {
        Self {
            aliases: Vec::new(),
            blacklist: Vec::new(),
            deferred: VecDeque::new(),
            aliases_path: aliases_path.into(),
            blacklist_path: blacklist_path.into(),
            inserter: Box::new(ProcessModuleInserter),
        }
    }

    pub fn with_inserter(mut self, inserter: Box<dyn ModuleInserter>) -> Self {
        self.inserter = inserter;
        self
    }

    fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.iter().any(|b| b.name == name)
    }

    /// Tries to load `modules.alias` (and, if that succeeds,
    /// `modules.blacklist`); returns whether the alias table is now
    /// non-empty.
    fn try_load_tables(&mut self) -> bool {
        if !self.aliases.is_empty() {
            return true;
        }
        match load_aliases(&self.aliases_path) {
            Ok(aliases) if !aliases.is_empty() => {
                self.aliases = aliases;
                self.blacklist = load_blacklist(&self.blacklist_path).unwrap_or_default();
                true
            }
            Ok(_) => false,
            Err(e) => {
                log::debug!("modules.alias not yet readable: {e}");
                false
            }
        }
    }

    /// Called for every `add` uevent carrying a `modalias`, and also (with
    /// `id = None`) purely to give the alias table a chance to load. On the
    /// first successful load, the deferred queue is drained by re-invoking
    /// [`Self::load_by_modalias`] on every entry.
    pub fn on_modalias(&mut self, id: Option<&str>) {
        if self.aliases.is_empty() && self.try_load_tables() {
            self.drain_deferred();
        }

        let Some(id) = id else { return };

        if self.aliases.is_empty() {
            log::debug!("add to queue for deferred module loading: {id}");
            self.deferred.push_back(id.to_string());
        } else {
            self.load_by_modalias(id);
        }
    }

    fn drain_deferred(&mut self) {
        while let Some(pattern) = self.deferred.pop_front() {
            log::info!("deferred loading of module for {pattern}");
            self.load_by_modalias(&pattern);
        }
    }

    /// Scans `aliases` in order; for each pattern glob-matching `id`, tries
    /// to insert the module unless blacklisted, stopping at the first
    /// success. Returns whether a module was loaded.
    pub fn load_by_modalias(&self, id: &str) -> bool {
        for alias in &self.aliases {
            if !glob_match::glob_match(&alias.pattern, id) {
                continue;
            }
            if self.is_blacklisted(&alias.name) {
                continue;
            }
            log::info!("trying to load module {} due to uevents", alias.name);
            if self.inserter.insert(&alias.name) {
                log::info!("loaded module {} due to uevents", alias.name);
                return true;
            }
        }
        false
    }

    /// Public entry point for callers outside the uevent stream (spec.md
    /// §4.6's `probe`); lazy-loads the tables on first call.
    pub fn probe(&mut self, modalias: &str) -> bool {
        if self.aliases.is_empty() {
            self.try_load_tables();
        }
        self.load_by_modalias(modalias)
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }
}

/// Parses `alias <modalias-glob> <name>` lines; malformed lines (wrong
/// token count) are silently ignored.
fn load_aliases(path: &str) -> std::io::Result<Vec<ModuleAlias>> {
    let data = fs::read_to_string(path)?;
    Ok(data
        .lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                ["alias", pattern, name] => Some(ModuleAlias {
                    name: name.to_string(),
                    pattern: pattern.to_string(),
                }),
                _ => None,
            }
        })
        .collect())
}

/// Parses `blacklist <name>` lines; malformed lines are silently ignored.
fn load_blacklist(path: &str) -> std::io::Result<Vec<ModuleBlacklist>> {
    let data = fs::read_to_string(path)?;
    Ok(data
        .lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                ["blacklist", name] => Some(ModuleBlacklist { name: name.to_string() }),
                _ => None,
            }
        })
        .collect())
}
