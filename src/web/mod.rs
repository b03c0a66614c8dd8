//! # Módulo Web — Painel da Timeline de Extração
//!
//! Camada de apresentação construída com **Axum** + **HTMX** + **Maud** +
//! **SSE**. Não guarda estado próprio da timeline: lê a visão do
//! [`TimelineController`](crate::timeline::TimelineController) e a
//! retransmite ao navegador.
//!
//! ## Arquitetura Web
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Browser (HTMX + EventSource)                                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Axum Router (este módulo)                                    │
//! │  ├── GET  /                        → página completa         │
//! │  ├── GET  /timeline                → HTMX fragment           │
//! │  ├── GET  /timeline/estado         → JSON                    │
//! │  ├── GET  /timeline/stream         → SSE (TimelineUpdate)    │
//! │  ├── POST /extracao/executar       → dispara + acompanha     │
//! │  ├── POST /timeline/iniciar/{id}   → acompanha tarefa        │
//! │  ├── POST /timeline/parar          → stop()                  │
//! │  ├── POST /timeline/limpar         → clear()                 │
//! │  ├── POST /timeline/autoscroll     → preferência de rolagem  │
//! │  ├── GET  /api/estatisticas        → proxy JSON              │
//! │  └── GET  /api/scheduler           → proxy JSON              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Módulo | Responsabilidade |
//! |--------|------------------|
//! | [`state`] | Estado compartilhado (`AppState`) |
//! | [`events`] | `TimelineUpdate` retransmitido via SSE |
//! | [`handlers`] | Handlers Axum para cada rota |
//! | [`templates`] | Templates Maud (HTML server-side) |

pub mod events;
pub mod handlers;
pub mod state;
pub mod templates;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use state::AppState;

/// Cria o router Axum com todas as rotas da aplicação.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // ── Páginas HTML ──────────────────────────────────────
        .route("/", get(handlers::index))
        // ── Timeline ──────────────────────────────────────────
        .route("/timeline", get(handlers::timeline_fragment))
        .route("/timeline/estado", get(handlers::timeline_estado))
        .route("/timeline/stream", get(handlers::timeline_stream))
        .route("/timeline/iniciar/{task_id}", post(handlers::iniciar_timeline))
        .route("/timeline/parar", post(handlers::parar_timeline))
        .route("/timeline/limpar", post(handlers::limpar_timeline))
        .route("/timeline/autoscroll", post(handlers::toggle_autoscroll))
        .route("/extracao/executar", post(handlers::executar_extracao))
        // ── Proxy da API ──────────────────────────────────────
        .route("/api/estatisticas", get(handlers::estatisticas))
        .route("/api/scheduler", get(handlers::scheduler_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
