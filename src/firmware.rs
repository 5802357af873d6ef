//! The sysfs firmware-loading handshake: `loading`/`data`/file-body dance,
//! forked per request. Grounded on `init/devices.c`'s
//! `process_firmware_event`/`load_firmware`/`handle_firmware_event`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use crate::constants::{FIRMWARE_COPY_CHUNK, FIRMWARE_DIR1, FIRMWARE_DIR2, FIRMWARE_DIR3, SYSFS_PREFIX};
use crate::error::DeviceManagerError;

#[derive(Debug, Clone)]
pub struct FirmwareLoader {
    pub booting_sentinel: PathBuf,
    pub search_dirs: [String; 3],
    pub retry_delay: Duration,
}

impl Default for FirmwareLoader {
    fn default() -> Self {
        Self {
            booting_sentinel: PathBuf::from(crate::constants::BOOTING_SENTINEL),
            search_dirs: [FIRMWARE_DIR1.to_string(), FIRMWARE_DIR2.to_string(), FIRMWARE_DIR3.to_string()],
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl FirmwareLoader {
    /// Forks a child process to perform the sysfs handshake, returning
    /// immediately; the parent never waits on the child.
    ///
    /// # Safety
    /// Calls `fork(2)` via `nix::unistd::fork`. The child's only path out is
    /// `process::exit`, so no Rust destructors that assume a single owner of
    /// process-wide state (allocator arenas aside) run twice in a way that
    /// matters; this mirrors the original's own `fork()` + `exit()` pattern.
    pub fn dispatch(&self, sysfs_path: &str, firmware_name: &str) -> Result<(), DeviceManagerError> {
        log::info!("firmware: loading '{firmware_name}' for '{sysfs_path}'");
        let sysfs_path = sysfs_path.to_string();
        let firmware_name = firmware_name.to_string();
        let loader = self.clone();

        // SAFETY: single-threaded event loop at the point this is called;
        // the child immediately execs nothing and exits via process::exit.
        match unsafe { nix::unistd::fork() }.map_err(DeviceManagerError::Fork)? {
            nix::unistd::ForkResult::Parent { .. } => Ok(()),
            nix::unistd::ForkResult::Child => {
                loader.run_handshake(&sysfs_path, &firmware_name);
                std::process::exit(0);
            }
        }
    }

    fn run_handshake(&self, sysfs_path: &str, firmware_name: &str) {
        let root = format!("{SYSFS_PREFIX}{sysfs_path}/");
        let loading_path = format!("{root}loading");
        let data_path = format!("{root}data");

        let Ok(mut loading) = File::options().write(true).open(&loading_path) else {
            log::warn!("firmware: could not open {loading_path}");
            return;
        };
        let Ok(mut data) = File::options().write(true).open(&data_path) else {
            log::warn!("firmware: could not open {data_path}");
            return;
        };

        let fw_file = match self.find_firmware_file(firmware_name) {
            Some(f) => f,
            None => {
                log::info!("firmware: could not find '{firmware_name}'");
                let _ = loading.write_all(b"-1");
                return;
            }
        };

        let _ = loading.write_all(b"1");
        match self.copy_firmware(fw_file, &mut data) {
            Ok(()) => {
                log::info!("firmware: copy success {{ '{root}', '{firmware_name}' }}");
                let _ = loading.write_all(b"0");
            }
            Err(e) => {
                log::info!("firmware: copy failure {{ '{root}', '{firmware_name}' }}: {e}");
                let _ = loading.write_all(b"-1");
            }
        }
    }

    /// Tries each search directory in order; while the firmware file is
    /// absent from all of them and the booting sentinel exists, sleeps and
    /// retries indefinitely. Returns `None` once the sentinel disappears
    /// with the file still missing.
    fn find_firmware_file(&self, name: &str) -> Option<File> {
        loop {
            for dir in &self.search_dirs {
                let candidate = Path::new(dir).join(name);
                if let Ok(f) = File::open(&candidate) {
                    return Some(f);
                }
            }
            if self.booting_sentinel.exists() {
                sleep(self.retry_delay);
                continue;
            }
            return None;
        }
    }

    fn copy_firmware(&self, mut src: File, dst: &mut File) -> std::io::Result<()> {
        let mut buf = vec![0u8; FIRMWARE_COPY_CHUNK];
        loop {
            let n = src.read(&mut buf)?;
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n])?;
        }
        Ok(())
    }
}
