//! Runs a [`LinkManager`] as the single owner of its state on a tokio task.

use crate::{
    LinkDownCallback, LinkManager, LinkStatus, LinkUpCallback, LinkUpReply, Network,
};
use color_eyre::{eyre::eyre, Result};
use tokio::{
    sync::oneshot,
    task::{self, JoinHandle},
};
use tracing::{debug, info};

enum Command {
    LinkUp {
        network: Network,
        callback: LinkUpCallback,
    },
    LinkDown {
        network: Network,
        interface: Option<String>,
        callback: LinkDownCallback,
    },
    Shutdown,
}

/// Cloneable front of a spawned link manager.
#[derive(Clone)]
pub struct LinkHandle {
    tx: flume::Sender<Command>,
}

impl LinkHandle {
    pub fn link_up(&self, network: Network, callback: LinkUpCallback) -> Result<()> {
        self.send(Command::LinkUp { network, callback })
    }

    pub fn link_down(
        &self,
        network: Network,
        interface: Option<String>,
        callback: LinkDownCallback,
    ) -> Result<()> {
        self.send(Command::LinkDown {
            network,
            interface,
            callback,
        })
    }

    /// Waits for the link-up reply.
    ///
    /// Fails if the request was dropped without one, e.g. by a link-down.
    pub async fn connect(&self, network: Network) -> Result<LinkUpReply> {
        let (tx, rx) = oneshot::channel();
        self.link_up(
            network,
            Box::new(move |reply| {
                let _ = tx.send(reply);
            }),
        )?;

        rx.await
            .map_err(|_| eyre!("link request was dropped without a reply"))
    }

    pub async fn disconnect(
        &self,
        network: Network,
        interface: Option<String>,
    ) -> Result<LinkStatus> {
        let (tx, rx) = oneshot::channel();
        self.link_down(
            network,
            interface,
            Box::new(move |status| {
                let _ = tx.send(status);
            }),
        )?;

        rx.await
            .map_err(|_| eyre!("link down request was dropped without a reply"))
    }

    /// Asks the loop to release all requests and stop.
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| eyre!("link service is not running"))
    }
}

pub fn spawn(manager: LinkManager) -> (LinkHandle, JoinHandle<Result<()>>) {
    info!("spawning cellular link service");
    let (tx, rx) = flume::unbounded();
    let handle = task::spawn(run(manager, rx));

    (LinkHandle { tx }, handle)
}

async fn run(mut manager: LinkManager, commands: flume::Receiver<Command>) -> Result<()> {
    let events = manager.inbox();

    loop {
        tokio::select! {
            command = commands.recv_async() => match command {
                Ok(Command::LinkUp { network, callback }) => {
                    manager.link_up(network, callback);
                }
                Ok(Command::LinkDown { network, interface, callback }) => {
                    manager.link_down(network, interface.as_deref(), callback);
                }
                Ok(Command::Shutdown) => break,
                Err(_) => {
                    debug!("all link handles dropped");
                    break;
                }
            },
            // the manager holds a sender, so the queue never closes under us
            Ok(event) = events.recv_async() => manager.dispatch(event),
        }
    }

    manager.shutdown();
    info!("cellular link service stopped");

    Ok(())
}
