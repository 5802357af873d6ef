//! Cache of platform bus paths, letting block/char handlers synthesise
//! human-meaningful symlinks. Grounded on `init/devices.c`'s
//! `platform_names` list (`add_platform_device`, `find_platform_device`,
//! `remove_platform_device`): the prefix-ancestry discipline there is
//! preserved exactly, just over an owned `Vec` instead of an intrusive list.

#[derive(Debug, Clone)]
pub struct PlatformNode {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct PlatformTopology {
    nodes: Vec<PlatformNode>,
}

fn strip_prefix(path: &str) -> &str {
    let name = path.strip_prefix("/devices/").unwrap_or(path);
    name.strip_prefix("platform/").unwrap_or(name)
}

/// True when `prefix + "/"` is a strict, `/`-terminated prefix of `path`.
fn is_subpath(prefix: &str, path: &str) -> bool {
    path.len() > prefix.len() && path.starts_with(prefix) && path.as_bytes()[prefix.len()] == b'/'
}

impl PlatformTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `path` unless it is a subdevice of an already-registered node
    /// (i.e. some existing node's path is a strict, slash-terminated prefix
    /// of it), in which case the add is a no-op.
    pub fn add(&mut self, path: &str) {
        for node in self.nodes.iter().rev() {
            if is_subpath(&node.path, path) {
                return;
            }
        }
        let name = strip_prefix(path).to_string();
        log::info!("adding platform device {name} ({path})");
        self.nodes.push(PlatformNode {
            path: path.to_string(),
            name,
        });
    }

    /// Byte-exact removal; a no-op if `path` was never registered.
    pub fn remove(&mut self, path: &str) {
        if let Some(idx) = self.nodes.iter().position(|n| n.path == path) {
            log::info!("removing platform device {}", self.nodes[idx].name);
            self.nodes.remove(idx);
        }
    }

    /// Newest-first scan for the node whose path is a strict,
    /// slash-terminated prefix of `path`.
    pub fn find(&self, path: &str) -> Option<&PlatformNode> {
        self.nodes.iter().rev().find(|n| is_subpath(&n.path, path))
    }
}
