//! Bootstrap against the introducer.
//!
//! Joining is a one-shot HTTP exchange over TCP, separate from the datagram
//! channel: the joiner posts `Message::Join` and the introducer answers with
//! `Message::UpdatedList` holding every record that is not already Failed.
//! A silent introducer is a join failure; nothing here retries.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use super::error::{MembershipError, Result};
use super::protocol::ENDPOINT_JOIN;
use super::service::MembershipService;
use super::types::{Identity, MemberRecord, Message, SuspicionState};

impl MembershipService {
    /// Seeds the table at startup: the introducer inserts itself, everyone else joins.
    pub async fn bootstrap(&self) -> Result<()> {
        if self.ctx.is_introducer() {
            let me = self.ctx.identity();
            self.table.insert(MemberRecord::new(me));
            self.ctx.set_in_group(true);
            tracing::info!("Starting as introducer {}", me);
            return Ok(());
        }

        self.join().await.map(|_| ())
    }

    /// Joins the group through the introducer. Returns the resulting table size.
    pub async fn join(&self) -> Result<usize> {
        let me = self.ctx.identity();
        let introducer = self.ctx.introducer();
        self.table.insert(MemberRecord::new(me));

        tracing::info!("Requesting join from introducer {} as {}", introducer, me);

        let url = format!("http://{}{}", introducer, ENDPOINT_JOIN);
        let response = self
            .http_client
            .post(&url)
            .timeout(self.join_timeout)
            .json(&Message::Join { identity: me })
            .send()
            .await
            .map_err(|e| join_error(introducer, self.join_timeout, e))?;

        if !response.status().is_success() {
            return Err(MembershipError::JoinRejected(
                introducer,
                format!("status {}", response.status()),
            ));
        }

        let reply: Message = response
            .json()
            .await
            .map_err(|e| join_error(introducer, self.join_timeout, e))?;

        let records = match reply {
            Message::UpdatedList { records } => records,
            other => {
                return Err(MembershipError::JoinRejected(
                    introducer,
                    format!("unexpected {} reply", other.kind()),
                ));
            }
        };

        let now = Instant::now();
        for mut record in records {
            if record.state == SuspicionState::Failed {
                continue;
            }
            record.last_update = now;
            self.table.insert(record);
        }

        self.ctx.set_in_group(true);
        tracing::info!("Joined group via {}, {} members", introducer, self.table.len());

        let position = me.ring_position();
        if let (Some(pred), Some(succ)) = (self.table.predecessor(&position), self.table.successor(&position)) {
            tracing::info!("Ring neighbours: predecessor {} successor {}", pred.identity, succ.identity);
        }

        Ok(self.table.len())
    }

    /// Introducer side of a join: record the joiner and hand back the live view.
    pub fn admit(&self, joiner: Identity) -> Vec<MemberRecord> {
        if self.table.insert(MemberRecord::new(joiner)) {
            tracing::info!("Node {} joined, cluster size now {}", joiner, self.table.len());
        } else {
            tracing::debug!("Node {} already known, resending table", joiner);
        }

        self.table
            .snapshot()
            .into_iter()
            .filter(|record| record.state != SuspicionState::Failed)
            .collect()
    }
}

fn join_error(introducer: SocketAddr, timeout: Duration, e: reqwest::Error) -> MembershipError {
    if e.is_timeout() {
        MembershipError::JoinTimeout(timeout, introducer)
    } else if e.is_connect() {
        MembershipError::PeerUnreachable(introducer, e.to_string())
    } else {
        MembershipError::JoinRejected(introducer, e.to_string())
    }
}
