use parking_lot::Mutex;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;

use super::config::{NodeConfig, ProtocolMode};
use super::context::NodeContext;
use super::error::{MembershipError, Result};
use super::handlers;
use super::ping_ack::AckWaiter;
use super::reconcile::reconcile;
use super::stats::TrafficStats;
use super::sweeper;
use super::table::MembershipTable;
use super::types::{Identity, MemberRecord, Message, SuspicionState};

const RECV_BUFFER_SIZE: usize = 65536;

pub struct MembershipService {
    pub ctx: NodeContext,
    pub table: MembershipTable,
    pub traffic: TrafficStats,
    socket: Arc<UdpSocket>,
    control_listener: Mutex<Option<TcpListener>>,
    pub(crate) acks: AckWaiter,
    pub(crate) http_client: reqwest::Client,
    pub(crate) join_timeout: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MembershipService {
    /// Binds the datagram socket and the control listener (same port, TCP).
    ///
    /// Failing to bind either is the only fatal error of a node.
    pub async fn new(config: NodeConfig) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(config.bind)
            .await
            .map_err(|source| MembershipError::Bind {
                addr: config.bind,
                source,
            })?;
        let local_addr = socket.local_addr().map_err(|source| MembershipError::Bind {
            addr: config.bind,
            source,
        })?;

        let listener = TcpListener::bind(local_addr)
            .await
            .map_err(|source| MembershipError::Bind {
                addr: local_addr,
                source,
            })?;

        // A node configured as its own introducer keeps that role when bound to port 0.
        let introducer = if config.introducer == config.bind {
            local_addr
        } else {
            config.introducer
        };

        let identity = Identity::new(local_addr);
        let ctx = NodeContext::new(identity, introducer, &config);

        tracing::info!(
            "Membership socket bound on {} (identity {}, introducer {})",
            local_addr,
            identity,
            introducer
        );

        Ok(Arc::new(Self {
            ctx,
            table: MembershipTable::new(),
            traffic: TrafficStats::default(),
            socket: Arc::new(socket),
            control_listener: Mutex::new(Some(listener)),
            acks: AckWaiter::default(),
            http_client: reqwest::Client::new(),
            join_timeout: config.join_timeout,
            tasks: Mutex::new(Vec::new()),
        }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.ctx.identity().socket_addr()
    }

    /// Spawns the receive, dissemination and sweep loops.
    pub async fn start(self: Arc<Self>) {
        tracing::info!("Starting membership service...");

        let receive_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.receive_loop().await;
            })
        };

        let dissemination_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.dissemination_loop().await;
            })
        };

        let sweep_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.sweep_loop().await;
            })
        };

        self.tasks
            .lock()
            .extend([receive_handle, dissemination_handle, sweep_handle]);

        tracing::info!("All background tasks started");
    }

    /// Serves the control surface (bootstrap + operator endpoints) until it fails.
    pub async fn serve_control(self: Arc<Self>) -> Result<()> {
        let listener = self
            .control_listener
            .lock()
            .take()
            .ok_or_else(|| MembershipError::Control("control listener already in use".to_string()))?;

        tracing::info!("Control surface listening on {}", self.local_addr());

        let app = handlers::router(self.clone());
        axum::serve(listener, app)
            .await
            .map_err(|e| MembershipError::Control(e.to_string()))
    }

    /// Aborts every loop without draining, as a crash would.
    pub fn stop(&self) {
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
        tracing::info!("Membership service stopped");
    }

    pub fn alive_members(&self) -> Vec<MemberRecord> {
        self.table
            .snapshot()
            .into_iter()
            .filter(|record| record.state == SuspicionState::Alive)
            .collect()
    }

    pub(crate) async fn send_to(&self, msg: &Message, target: SocketAddr) -> Result<()> {
        let encoded = bincode::serialize(msg).map_err(|e| MembershipError::Encode(e.to_string()))?;

        self.socket
            .send_to(&encoded, target)
            .await
            .map_err(|e| MembershipError::PeerUnreachable(target, e.to_string()))?;

        self.traffic.record_sent(encoded.len());
        Ok(())
    }

    async fn dissemination_loop(self: Arc<Self>) {
        loop {
            if self.ctx.in_group() {
                match self.ctx.protocol() {
                    ProtocolMode::Gossip => self.gossip_round().await,
                    ProtocolMode::PingAck => {
                        self.ping_round().await;
                    }
                }
            }

            tokio::time::sleep(self.ctx.timings().dissemination_interval).await;
        }
    }

    async fn sweep_loop(self: Arc<Self>) {
        loop {
            tokio::time::sleep(self.ctx.timings().sweep_interval).await;

            let me = self.ctx.identity();
            let report = sweeper::sweep(
                &self.table,
                &me,
                self.ctx.suspicion_enabled(),
                &self.ctx.timings(),
                Instant::now(),
            );

            if !report.is_empty() {
                tracing::info!(
                    "Sweep: {} suspected, {} failed, {} pruned ({} members left)",
                    report.suspected.len(),
                    report.failed.len(),
                    report.pruned.len(),
                    self.table.len()
                );
            }
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => {
                    if self.should_drop() {
                        self.traffic.record_dropped();
                        tracing::debug!("Dropped datagram from {} (simulated loss)", src);
                        continue;
                    }
                    self.traffic.record_received(len);

                    match bincode::deserialize::<Message>(&buf[..len]) {
                        Ok(msg) => self.handle_message(msg, src).await,
                        Err(e) => {
                            let err = MembershipError::MalformedMessage(src, e.to_string());
                            tracing::warn!("{}", err);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to receive UDP packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    fn should_drop(&self) -> bool {
        let rate = self.ctx.drop_rate();
        rate > 0.0 && rand::thread_rng().gen_bool(rate)
    }

    pub(crate) async fn handle_message(&self, msg: Message, src: SocketAddr) {
        match msg {
            Message::Gossip { records, sender } => {
                tracing::debug!("Received gossip from {} with {} records", sender, records.len());
                self.absorb(records).await;
            }

            Message::Ping { sender, records } => {
                tracing::debug!("Received ping from {} with {} records", sender, records.len());
                self.absorb(records).await;

                let ack = Message::Ack {
                    sender: self.ctx.identity(),
                    records: self.table.snapshot(),
                };
                if let Err(e) = self.send_to(&ack, src).await {
                    tracing::warn!("Failed to ack ping from {}: {}", sender, e);
                }
            }

            Message::Ack { sender, records } => {
                tracing::debug!("Received ack from {} with {} records", sender, records.len());
                self.absorb(records).await;

                if !self.acks.resolve(sender) {
                    tracing::debug!("Ack from {} arrived with no round waiting", sender);
                }
            }

            other => {
                tracing::warn!(
                    "Unexpected {} message on the datagram channel from {}",
                    other.kind(),
                    src
                );
            }
        }
    }

    /// Reconciles a remote view and recovers if it declared us failed.
    pub(crate) async fn absorb(&self, records: Vec<MemberRecord>) {
        let me = self.ctx.identity();
        let report = reconcile(&self.table, records, &me);

        if report.changed() {
            tracing::debug!(
                "Reconciled: {} new, {} failed, {} suspected, {} updated",
                report.inserted.len(),
                report.failed.len(),
                report.suspected.len(),
                report.updated
            );
        }

        if report.self_failed {
            self.handle_self_failure().await;
        }
    }
}
