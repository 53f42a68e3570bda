use crate::{models::DiagnosticsResponse, state::AppState};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use std::sync::{Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Live counters of the sync engine plus host resource usage
pub async fn diagnostics(
    State(app_state): State<Arc<AppState>>,
) -> (StatusCode, Json<DiagnosticsResponse>) {

    let n_rooms = app_state.registry.room_count().await as u32;
    let n_members = app_state.registry.member_count().await as u32;
    let n_conn = app_state.gateway.connection_count() as u32;
    let n_bound_conn = app_state.gateway.bound_connection_count() as u32;
    let n_peer_links = app_state.gateway.peer_link_count() as u32;

    // System stats
    let (cpu_usage, memory_alloc, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| {
            Mutex::new(System::new_all())
        });
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0)
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), Conn: {}, Rooms: {}, Members: {}",
        cpu_usage,
        memory_alloc / 1024 / 1024,
        memory_total / 1024 / 1024,
        memory_free / 1024 / 1024,
        n_conn,
        n_rooms,
        n_members
    );

    (
        StatusCode::OK,
        Json(DiagnosticsResponse {
            n_conn,
            n_bound_conn,
            n_rooms,
            n_members,
            n_peer_links,
            cpu_usage,
            memory_alloc,
            memory_total,
            memory_free,
        }),
    )
}
