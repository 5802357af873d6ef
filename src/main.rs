use std::env;
use std::path::Path;
use std::process;

use clap::Parser;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use devmgrd::dispatch::{DeviceManager, StaticBootProperties};
use devmgrd::module_autoload::ModuleAutoloader;
use devmgrd::uevent::socket::UeventSocket;
use devmgrd::{cli, coldboot, uevent};

const UEVENT_SOCKET_TOKEN: Token = Token(0);

fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    env::set_var("RUST_LOG", log_level);
    env_logger::init();

    let args = cli::Args::parse();

    log::info!("Starting device manager");

    let socket = match UeventSocket::open() {
        Ok(s) => s,
        Err(e) => {
            log::error!("failed to open uevent socket: {e}");
            process::exit(1);
        }
    };

    let modules = ModuleAutoloader::new(args.modules_alias.clone(), args.modules_blacklist.clone());
    // Boot properties are the property service's job, an external
    // collaborator; a real embedder would wire this to the system property
    // reader.
    let mut manager = DeviceManager::new(modules, Box::new(StaticBootProperties(Vec::new())));

    if !args.no_coldboot {
        let sentinel = Path::new(&args.coldboot_done);
        coldboot::run_once(sentinel, &socket, &mut |msg| {
            let event = uevent::parse(msg);
            manager.dispatch(&event);
        });
    }

    let mut poll = match Poll::new() {
        Ok(p) => p,
        Err(e) => {
            log::error!("failed to create poller: {e}");
            process::exit(1);
        }
    };
    let mut events = Events::with_capacity(16);

    if let Err(e) = poll.registry().register(
        &mut SourceFd(&std::os::fd::AsRawFd::as_raw_fd(&socket)),
        UEVENT_SOCKET_TOKEN,
        Interest::READABLE,
    ) {
        log::error!("failed to register uevent socket with poller: {e}");
        process::exit(1);
    }

    log::info!("entering event loop");
    loop {
        if let Err(e) = poll.poll(&mut events, None) {
            if e.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            log::error!("poll failed: {e}");
            break;
        }

        for event in events.iter() {
            if event.token() == UEVENT_SOCKET_TOKEN {
                if let Err(e) = socket.drain(|msg| {
                    let ev = uevent::parse(msg);
                    manager.dispatch(&ev);
                }) {
                    log::warn!("error draining uevent socket: {e}");
                }
            }
        }
    }
}
