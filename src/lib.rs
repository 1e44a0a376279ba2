//! SMS PDU forwarder: polls a cellular modem over AT commands, decodes
//! SMS-DELIVER PDUs, reassembles multi-part messages, filters them against
//! an exclusion list, and forwards the result to a webhook.

pub mod at;
pub mod codec;
pub mod command;
pub mod config;
pub mod exclusion;
pub mod orchestrator;
pub mod pdu;
pub mod reassembly;
pub mod scheduler;
pub mod sink;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "sms-pdu-forwarder", about = "Polls a modem for SMS PDUs and forwards decoded messages")]
pub struct Cli {
    #[arg(long, default_value = "config.toml")]
    pub config: std::path::PathBuf,

    #[arg(long)]
    pub log_level: Option<String>,
}
