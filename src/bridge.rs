//! Bridge coordinator: sockets, receive tasks, and the mesh callback.

use std::os::fd::AsRawFd;
use std::sync::Arc;

use socket2::Socket;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::sync::watch;
use tracing::{error, info, trace};

use crate::broker::{BrokerSession, MeshPublisher};
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::mdns::{BUF_SIZE, MDNS_PORT};
use crate::net::{
    build_transmit, open_listener, recv_with_meta, select_interfaces, send_multicast,
    TransmitDescriptor,
};
use crate::pipeline::{PacketPipeline, PortClass};
use crate::{identity, net};

/// A running bridge instance.
///
/// All fields are set during initialization and read-only afterwards; the
/// sockets are read from the receive tasks and written from the mesh
/// callback concurrently.
pub struct Bridge {
    pipeline: PacketPipeline,
    publisher: MeshPublisher,
    transmits: Vec<TransmitDescriptor>,
    low: Socket,
    high: Socket,
}

impl Bridge {
    /// Wire up the bridge and run it until shutdown.
    ///
    /// Identity, filter, interface, socket, and initial broker errors are
    /// all fatal here, before any task starts. After startup nothing is:
    /// per-packet problems are logged and the tasks keep going.
    pub async fn run(config: BridgeConfig) -> Result<()> {
        let unique_id = identity::resolve(&config)?;
        info!(unique_id = %unique_id, "Resolved sender identity");

        let pipeline = PacketPipeline::new(&config, unique_id.clone())?;

        let interfaces = select_interfaces(&config.monitor)?;
        for iface in &interfaces {
            info!("{}", iface);
        }
        let transmits = build_transmit(&interfaces);

        let low = open_listener(config.listen_ip, MDNS_PORT, &interfaces)?;
        let high = open_listener(config.listen_ip, 0, &interfaces)?;

        let session = BrokerSession::connect(&unique_id, &config.server, &config.topic).await?;
        let publisher = session.publisher();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
                let _ = shutdown_tx.send(true);
            }
        });

        let bridge = Arc::new(Self {
            pipeline,
            publisher,
            transmits,
            low,
            high,
        });

        let mesh_bridge = bridge.clone();
        let session_task = tokio::spawn(session.run(shutdown_rx.clone(), move |payload| {
            mesh_bridge.handle_mesh_message(payload);
        }));

        let low_task = tokio::spawn(bridge.clone().receive(PortClass::Low, shutdown_rx.clone()));
        let high_task = tokio::spawn(bridge.clone().receive(PortClass::High, shutdown_rx));

        info!("Listening for mDNS packets");
        let _ = low_task.await;
        let _ = high_task.await;
        let _ = session_task.await;

        info!("Bridge stopped");
        Ok(())
    }

    fn socket(&self, class: PortClass) -> &Socket {
        match class {
            PortClass::Low => &self.low,
            PortClass::High => &self.high,
        }
    }

    /// Wire→mesh receive loop for one listener socket.
    async fn receive(self: Arc<Self>, class: PortClass, mut shutdown: watch::Receiver<bool>) {
        let socket = self.socket(class);
        let fd = match AsyncFd::new(socket.as_raw_fd()) {
            Ok(fd) => fd,
            Err(err) => {
                error!(?class, "Unable to register socket with the runtime: {}", err);
                return;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                ready = fd.ready(Interest::READABLE) => {
                    let mut guard = match ready {
                        Ok(guard) => guard,
                        Err(err) => {
                            error!(?class, "Poll error: {}", err);
                            continue;
                        }
                    };

                    // Fresh buffer per datagram; the publish path holds onto
                    // the bytes asynchronously.
                    let mut buf = vec![0u8; BUF_SIZE];
                    let result = recv_with_meta(socket, &mut buf);
                    guard.clear_ready();
                    match result {
                        Ok((len, Some(meta))) => {
                            self.forward_to_mesh(&buf[..len], &meta).await;
                        }
                        Ok((_, None)) => {
                            error!("Received no control metadata with packet");
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                        Err(err) => {
                            error!("Error reading packet from wire: {}", err);
                        }
                    }
                }
            }
        }
    }

    async fn forward_to_mesh(&self, data: &[u8], meta: &net::PacketMeta) {
        let Some(envelope) = self.pipeline.wire_to_mesh(data, meta) else {
            return;
        };
        match serde_json::to_vec(&envelope) {
            Ok(payload) => self.publisher.publish(payload).await,
            Err(err) => error!("Error marshalling message from wire: {}", err),
        }
    }

    /// Mesh→wire handler invoked for every payload delivered on the topic.
    fn handle_mesh_message(&self, payload: &[u8]) {
        let Some((class, data)) = self.pipeline.mesh_to_wire(payload) else {
            return;
        };

        let socket = self.socket(class);
        for descriptor in &self.transmits {
            if let Err(err) = send_multicast(socket, &data, descriptor) {
                error!(
                    interface = %descriptor.name,
                    "Unable to send broadcast to wire: {}", err
                );
            }
        }
        trace!(?class, len = data.len(), "Rebroadcast message to wire");
    }
}
