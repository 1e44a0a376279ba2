//! Command task: the write side of the shared exclusion list.
//!
//! Grounded in the teacher's `ATClientActor` / `CommandSender` `mpsc`
//! request/response pattern (`client.rs`): a channel owns a single mutator
//! task so the Poller never has to coordinate locking directly with
//! whatever parses an operator's chat command into an `ExclusionCommand`.

use std::sync::Arc;

use log::info;
use tokio::sync::{mpsc, oneshot};

use crate::exclusion::ExclusionSet;

#[derive(Debug)]
pub enum ExclusionCommand {
    Add(String),
    Remove(String),
    List(oneshot::Sender<Vec<String>>),
}

pub type CommandSender = mpsc::Sender<ExclusionCommand>;

/// Spawn the command task and return a sender for it. The task runs until
/// every sender clone (including the one returned here) is dropped.
pub fn spawn_command_task(exclusions: Arc<dyn ExclusionSet>) -> CommandSender {
    let (tx, mut rx) = mpsc::channel(32);

    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                ExclusionCommand::Add(number) => {
                    info!("adding {} to the exclusion list", number);
                    exclusions.add(&number).await;
                }
                ExclusionCommand::Remove(number) => {
                    let removed = exclusions.remove(&number).await;
                    info!("removing {} from the exclusion list: present={}", number, removed);
                }
                ExclusionCommand::List(reply) => {
                    let _ = reply.send(exclusions.list().await);
                }
            }
        }
    });

    tx
}
