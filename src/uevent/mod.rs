//! Tokenises the kernel's null-delimited `KEY=VALUE` uevent records into a
//! structured [`Uevent`]. Grounded on `init/devices.c:parse_event` from the
//! original device manager this crate reimplements.

pub mod socket;

/// One parsed kernel hotplug notification.
///
/// All string fields borrow from the caller's datagram buffer; the struct
/// cannot outlive the buffer it was parsed from.
#[derive(Debug, Clone, Default)]
pub struct Uevent<'a> {
    pub action: Action,
    pub path: &'a str,
    pub subsystem: &'a str,
    pub firmware: &'a str,
    pub partition_name: Option<&'a str>,
    pub partition_num: i32,
    pub device_name: Option<&'a str>,
    pub modalias: Option<&'a str>,
    pub product: Option<&'a str>,
    pub major: i32,
    pub minor: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    Add,
    Remove,
    Change,
    #[default]
    Other,
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        match s {
            "add" => Action::Add,
            "remove" => Action::Remove,
            "change" => Action::Change,
            _ => Action::Other,
        }
    }
}

impl<'a> Uevent<'a> {
    /// True when the event describes a device with a kernel-assigned node
    /// (i.e. `mknod` should be attempted for it).
    pub fn has_devnum(&self) -> bool {
        self.major >= 0 && self.minor >= 0
    }
}

/// Parses a buffer of zero or more null-terminated `KEY=VALUE` records.
///
/// The buffer's last two bytes must be zero (the kernel's uevent recv
/// convention, mirrored by [`socket::drain`]): this guarantees the scan
/// always finds a terminator without a separate length check on every
/// record. Unknown keys are ignored; `SEQNUM` is recognised and discarded.
/// Malformed integer fields fall back to `-1`, matching the "default -1"
/// convention for MAJOR/MINOR/PARTN. The parser never fails and never
/// allocates: every field is a view into `buf`.
pub fn parse(buf: &[u8]) -> Uevent<'_> {
    let mut event = Uevent {
        major: -1,
        minor: -1,
        partition_num: -1,
        ..Default::default()
    };

    for record in buf.split(|&b| b == 0) {
        if record.is_empty() {
            continue;
        }
        let Ok(text) = std::str::from_utf8(record) else {
            continue;
        };
        let Some((key, value)) = text.split_once('=') else {
            continue;
        };

        match key {
            "ACTION" => event.action = Action::from(value),
            "DEVPATH" => event.path = value,
            "SUBSYSTEM" => event.subsystem = value,
            "FIRMWARE" => event.firmware = value,
            "MAJOR" => event.major = value.parse().unwrap_or(0),
            "MINOR" => event.minor = value.parse().unwrap_or(0),
            "PARTN" => event.partition_num = value.parse().unwrap_or(0),
            "PARTNAME" => event.partition_name = Some(value),
            "DEVNAME" => event.device_name = Some(value),
            "PRODUCT" => event.product = Some(value),
            "MODALIAS" => event.modalias = Some(value),
            "SEQNUM" => {}
            _ => {}
        }
    }

    event
}
