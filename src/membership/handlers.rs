use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use super::protocol::*;
use super::service::MembershipService;
use super::types::{Message, RingPosition, SuspicionState};

const DEFAULT_SUCCESSOR_SET: usize = 3;

pub fn router(service: Arc<MembershipService>) -> Router {
    Router::new()
        .route(ENDPOINT_JOIN, post(handle_join))
        .route(ENDPOINT_MEMBERS, get(handle_members))
        .route(ENDPOINT_SELF, get(handle_self))
        .route(ENDPOINT_SUSPECTS, get(handle_suspects))
        .route(ENDPOINT_MODE, get(handle_get_mode).post(handle_set_mode))
        .route(ENDPOINT_TIMINGS, get(handle_get_timings).post(handle_set_timings))
        .route(ENDPOINT_LEAVE, post(handle_leave))
        .route(ENDPOINT_REJOIN, post(handle_rejoin))
        .route(&format!("{}/:position", ENDPOINT_RING), get(handle_ring))
        .route(ENDPOINT_STATS, get(handle_stats))
        .layer(Extension(service))
}

pub async fn handle_join(
    Extension(service): Extension<Arc<MembershipService>>,
    Json(msg): Json<Message>,
) -> (StatusCode, Json<Message>) {
    match msg {
        Message::Join { identity } => {
            let records = service.admit(identity);
            (StatusCode::OK, Json(Message::UpdatedList { records }))
        }
        other => {
            tracing::warn!("Unexpected {} message on the join endpoint", other.kind());
            (
                StatusCode::BAD_REQUEST,
                Json(Message::UpdatedList { records: vec![] }),
            )
        }
    }
}

pub async fn handle_members(
    Extension(service): Extension<Arc<MembershipService>>,
) -> Json<MembersResponse> {
    let members = service.table.snapshot().iter().map(MemberView::from).collect();
    Json(MembersResponse { members })
}

pub async fn handle_suspects(
    Extension(service): Extension<Arc<MembershipService>>,
) -> Json<MembersResponse> {
    let members = service
        .table
        .snapshot()
        .iter()
        .filter(|record| record.state == SuspicionState::Suspicious)
        .map(MemberView::from)
        .collect();
    Json(MembersResponse { members })
}

pub async fn handle_self(Extension(service): Extension<Arc<MembershipService>>) -> Json<SelfResponse> {
    let identity = service.ctx.identity();
    Json(SelfResponse {
        identity,
        ring_position: identity.ring_position().to_string(),
        introducer: service.ctx.introducer(),
        is_introducer: service.ctx.is_introducer(),
        in_group: service.ctx.in_group(),
    })
}

pub async fn handle_get_mode(Extension(service): Extension<Arc<MembershipService>>) -> Json<ModeView> {
    Json(ModeView {
        protocol: service.ctx.protocol(),
        suspicion: service.ctx.suspicion_enabled(),
    })
}

pub async fn handle_set_mode(
    Extension(service): Extension<Arc<MembershipService>>,
    Json(update): Json<ModeUpdate>,
) -> Json<ModeView> {
    if let Some(protocol) = update.protocol {
        service.ctx.set_protocol(protocol);
    }
    if let Some(suspicion) = update.suspicion {
        service.ctx.set_suspicion(suspicion);
    }

    let view = ModeView {
        protocol: service.ctx.protocol(),
        suspicion: service.ctx.suspicion_enabled(),
    };
    tracing::info!("Switched to {} mode, suspicion={}", view.protocol, view.suspicion);
    Json(view)
}

pub async fn handle_get_timings(
    Extension(service): Extension<Arc<MembershipService>>,
) -> Json<TimingsView> {
    Json(service.ctx.timings().into())
}

pub async fn handle_set_timings(
    Extension(service): Extension<Arc<MembershipService>>,
    Json(update): Json<TimingsUpdate>,
) -> Json<TimingsView> {
    let timings = update.apply(service.ctx.timings());
    service.ctx.set_timings(timings);
    tracing::info!("Timings updated: {:?}", timings);
    Json(timings.into())
}

pub async fn handle_leave(
    Extension(service): Extension<Arc<MembershipService>>,
) -> (StatusCode, Json<MembershipChangeResponse>) {
    if !service.ctx.in_group() {
        return (
            StatusCode::CONFLICT,
            Json(MembershipChangeResponse {
                success: false,
                identity: service.ctx.identity(),
                error: Some("not in the group".to_string()),
            }),
        );
    }

    service.leave().await;
    (
        StatusCode::OK,
        Json(MembershipChangeResponse {
            success: true,
            identity: service.ctx.identity(),
            error: None,
        }),
    )
}

pub async fn handle_rejoin(
    Extension(service): Extension<Arc<MembershipService>>,
) -> (StatusCode, Json<MembershipChangeResponse>) {
    if service.ctx.in_group() {
        return (
            StatusCode::CONFLICT,
            Json(MembershipChangeResponse {
                success: false,
                identity: service.ctx.identity(),
                error: Some("already in the group".to_string()),
            }),
        );
    }

    match service.rejoin().await {
        Ok(identity) => (
            StatusCode::OK,
            Json(MembershipChangeResponse {
                success: true,
                identity,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Rejoin failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(MembershipChangeResponse {
                    success: false,
                    identity: service.ctx.identity(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_ring(
    Extension(service): Extension<Arc<MembershipService>>,
    Path(position): Path<String>,
    Query(query): Query<RingQuery>,
) -> Result<Json<RingResponse>, (StatusCode, String)> {
    let pos: RingPosition = position
        .parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let n = query.n.unwrap_or(DEFAULT_SUCCESSOR_SET);

    Ok(Json(RingResponse {
        position: pos.to_string(),
        successor: service.table.successor(&pos).as_ref().map(MemberView::from),
        predecessor: service.table.predecessor(&pos).as_ref().map(MemberView::from),
        successors: service
            .table
            .successor_set(&pos, n)
            .iter()
            .map(MemberView::from)
            .collect(),
    }))
}

pub async fn handle_stats(Extension(service): Extension<Arc<MembershipService>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        members: service.table.len(),
        alive: service.alive_members().len(),
        traffic: service.traffic.snapshot(),
    })
}
