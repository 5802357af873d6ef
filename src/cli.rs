//! Command-line overrides for the embedding-time path/sentinel constants,
//! in the style of the teacher's `clap`-derived `cli::Args`.

use clap::Parser;

use crate::constants;

#[derive(Parser, Debug)]
#[command(version, about = "Early-boot uevent device manager")]
pub struct Args {
    /// Path to the modules.alias database.
    #[arg(long, default_value = constants::MODULES_ALIAS)]
    pub modules_alias: String,

    /// Path to the modules.blacklist file.
    #[arg(long, default_value = constants::MODULES_BLKLST)]
    pub modules_blacklist: String,

    /// Sentinel file whose presence skips coldboot on this boot.
    #[arg(long, default_value = constants::COLDBOOT_DONE_DEFAULT)]
    pub coldboot_done: String,

    /// Skip the coldboot walk entirely (useful when testing the event
    /// loop in isolation).
    #[arg(long)]
    pub no_coldboot: bool,
}
