use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use log::info;

use sms_pdu_forwarder::at::{open_serial_session, AtSession, AtSessionError, SerialAtTransport};
use sms_pdu_forwarder::command::spawn_command_task;
use sms_pdu_forwarder::config::Config;
use sms_pdu_forwarder::exclusion::{ExclusionSet, FileExclusionSet};
use sms_pdu_forwarder::scheduler::{run_poller, SessionFactory};
use sms_pdu_forwarder::sink::{Sink, WebhookSink};
use sms_pdu_forwarder::Cli;

struct SerialSessionFactory {
    port: String,
    baud: u32,
    timeout_secs: u64,
}

#[async_trait]
impl SessionFactory for SerialSessionFactory {
    type Transport = SerialAtTransport;

    async fn open(&self) -> Result<AtSession<Self::Transport>, AtSessionError> {
        open_serial_session(&self.port, self.baud, self.timeout_secs).await
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    info!("starting sms-pdu-forwarder");

    let config = Config::load(&cli);

    let exclusions: Arc<dyn ExclusionSet> = Arc::new(FileExclusionSet::load(config.exclusion_file.clone()));
    let sink: Arc<dyn Sink> = Arc::new(WebhookSink::new(config.webhook_url.clone()));

    // The command channel's write side; parsing an operator's chat command
    // into an ExclusionCommand and feeding it in remains an external
    // collaborator (e.g. a chat-bot front end) per the design notes.
    let _command_tx = spawn_command_task(exclusions.clone());

    let factory = SerialSessionFactory {
        port: config.serial_port.clone(),
        baud: config.serial_baud,
        timeout_secs: config.serial_timeout_secs,
    };

    run_poller(
        factory,
        Duration::from_secs(config.poll_interval_secs),
        config.cmgl_state,
        exclusions,
        sink,
    )
    .await;
}
