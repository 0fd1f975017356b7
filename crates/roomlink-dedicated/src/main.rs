//! Dedicated room server.
//!
//! Opens one room and keeps it open until a line is read on stdin (or
//! stdin closes).

use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use roomlink::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "roomlink-dedicated", version, about = "Host a roomlink room")]
struct Args {
    /// Name shown to members and in the directory.
    room_name: String,

    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_ROOM_PORT)]
    port: u16,

    /// Address to listen on. Empty means all interfaces.
    #[arg(long, default_value = "")]
    bind: String,

    /// Number of members the room admits.
    #[arg(long, default_value_t = RoomConfig::default().member_slots)]
    slots: u32,

    /// List the room in the web directory configured by
    /// ROOMLINK_ANNOUNCE_URL, ROOMLINK_USERNAME and ROOMLINK_TOKEN.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    announce: bool,
}

fn directory_backend() -> Result<Arc<dyn DirectoryBackend>, RoomlinkError> {
    let config = WebBackendConfig::from_env();
    if config.endpoint_url.is_empty() {
        tracing::warn!("ROOMLINK_ANNOUNCE_URL is not set, the room will not be listed");
        return Ok(Arc::new(NullBackend));
    }
    Ok(Arc::new(WebBackend::new(config)?))
}

fn run(args: Args) -> Result<(), RoomlinkError> {
    let mut builder = RoomHost::builder(&args.room_name)
        .bind_address(&args.bind)
        .port(args.port)
        .member_slots(args.slots);
    if args.announce {
        builder = builder.announce(directory_backend()?, AnnounceConfig::default());
    }
    let host = builder.build()?;

    let info = host.room_information();
    tracing::info!(
        name = %info.name,
        port = info.port,
        slots = info.member_slots,
        guid = %info.guid,
        "dedicated room open, press enter to quit"
    );

    let mut line = String::new();
    if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
        tracing::warn!(error = %e, "stdin unreadable, shutting down");
    }

    host.shutdown();
    tracing::info!("dedicated room closed");
    Ok(())
}

fn main() -> ExitCode {
    init_logging("info");

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "dedicated room failed");
            ExitCode::FAILURE
        }
    }
}
