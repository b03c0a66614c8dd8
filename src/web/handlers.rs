//! # Handlers HTTP — Os Endpoints da Timeline
//!
//! Cada função pública neste módulo é um handler Axum, mapeado a uma rota
//! em [`super::create_router()`]. Os handlers de comando (`POST`) devolvem
//! o fragment `#timeline-panel` atualizado, que o HTMX troca via
//! `hx-swap="outerHTML"`.
//!
//! ## Padrão de Resposta
//!
//! | Handler | Método | Retorno | Uso |
//! |---------|--------|---------|-----|
//! | `index` | GET | HTML completo | Página da timeline (Maud) |
//! | `timeline_fragment` | GET | HTMX fragment | Painel da timeline |
//! | `timeline_estado` | GET | JSON | Tarefa, progresso, conexão |
//! | `timeline_stream` | GET | SSE stream | Mudanças da timeline |
//! | `executar_extracao` | POST | HTMX fragment | Dispara extração e acompanha |
//! | `iniciar_timeline` | POST | HTMX fragment | Acompanha tarefa existente |
//! | `parar_timeline` | POST | HTMX fragment | Fecha a conexão |
//! | `limpar_timeline` | POST | HTMX fragment | Esvazia o log |
//! | `toggle_autoscroll` | POST | HTMX fragment | Botão de auto-scroll |
//! | `estatisticas` | GET | JSON | Proxy de `/estatisticas` |
//! | `scheduler_status` | GET | JSON | Proxy de `/scheduler/status` |

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use futures_util::stream::StreamExt;
use maud::html;
use serde::Serialize;
use serde_json::Value;
use tokio_stream::wrappers::BroadcastStream;

use super::state::AppState;
use super::templates;
use crate::api::{ApiError, SchedulerStatus};
use crate::timeline::{ConnectionState, TaskId};

/// Resposta de `/timeline/estado`.
#[derive(Debug, Serialize)]
pub struct EstadoResponse {
    pub task_id: Option<TaskId>,
    pub progress: f64,
    pub state: ConnectionState,
    pub total_eventos: usize,
    pub auto_scroll: bool,
}

/// Converte Maud Markup em resposta Html<String> do Axum.
fn markup_to_html(m: maud::Markup) -> Html<String> {
    Html(m.into_string())
}

fn panel(state: &AppState) -> Html<String> {
    markup_to_html(templates::timeline_panel(&state.timeline.view()))
}

/// Painel atual com um aviso de erro acima dele.
fn panel_with_error(state: &AppState, status: StatusCode, message: &str) -> Response {
    let view = state.timeline.view();
    let body = markup_to_html(html! {
        div #timeline-error class="p-3 rounded bg-red-50 border-l-4 border-red-400 text-sm text-red-800" {
            i class="fas fa-exclamation-circle mr-2" {}
            (message)
        }
        (templates::timeline_panel(&view))
    });
    (status, body).into_response()
}

/// GET `/`: Página completa da timeline.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    markup_to_html(templates::full_page(
        &state.timeline.view(),
        state.auto_scroll(),
    ))
}

/// GET `/timeline`: Fragment do painel, recarregado pelo script do stream.
pub async fn timeline_fragment(State(state): State<AppState>) -> Html<String> {
    panel(&state)
}

/// GET `/timeline/estado`: Estado resumido em JSON.
pub async fn timeline_estado(State(state): State<AppState>) -> Json<EstadoResponse> {
    let view = state.timeline.view();
    Json(EstadoResponse {
        task_id: view.task_id,
        progress: view.progress,
        state: view.state,
        total_eventos: view.events.len(),
        auto_scroll: state.auto_scroll(),
    })
}

/// GET `/timeline/stream`: Stream SSE das mudanças da timeline.
///
/// Cada [`TimelineUpdate`](super::events::TimelineUpdate) vira um
/// `SseEvent` com JSON. Assinantes atrasados perdem mensagens (o
/// próximo update recarrega o painel inteiro, então nada se perde na tela).
/// Keep-alive a cada 15s.
pub async fn timeline_stream(
    State(state): State<AppState>,
) -> Sse<impl futures_util::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.updates_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(update) => {
                let data = serde_json::to_string(&update).ok()?;
                Some(Ok(SseEvent::default().data(data)))
            }
            Err(_) => None,
        }
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// POST `/extracao/executar`: Dispara uma extração e passa a acompanhá-la.
///
/// ## Fluxo
///
/// ```text
/// 1. Com API: POST /executar-agora → task_id da resposta
///    Sem API (modo simulado): TaskId::generate()
/// 2. timeline.start(task_id)
/// 3. Devolve o painel (já limpo, em "connecting")
/// ```
pub async fn executar_extracao(State(state): State<AppState>) -> Response {
    let task_id = match &state.api {
        Some(api) => match api.executar_agora().await.and_then(|resp| resp.task_id()) {
            Ok(task_id) => task_id,
            Err(e) => {
                tracing::error!(error = %e, "Falha ao iniciar extração");
                let status = match &e {
                    ApiError::Http { .. } | ApiError::Transport(_) => StatusCode::BAD_GATEWAY,
                    ApiError::MissingTaskId | ApiError::InvalidTaskId(_) => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                };
                return panel_with_error(
                    &state,
                    status,
                    &format!("Erro ao executar extração: {e}"),
                );
            }
        },
        None => TaskId::generate(),
    };

    tracing::info!(task_id = %task_id, "Extração iniciada, acompanhando timeline");
    state.timeline.start(task_id);
    panel(&state).into_response()
}

/// POST `/timeline/iniciar/{task_id}`: Acompanha uma tarefa já existente.
pub async fn iniciar_timeline(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Response {
    match TaskId::parse(&raw) {
        Ok(task_id) => {
            state.timeline.start(task_id);
            panel(&state).into_response()
        }
        Err(e) => {
            tracing::warn!(task_id = %raw, error = %e, "task_id rejeitado");
            panel_with_error(&state, StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

/// POST `/timeline/parar`
pub async fn parar_timeline(State(state): State<AppState>) -> Html<String> {
    state.timeline.stop();
    panel(&state)
}

/// POST `/timeline/limpar`
pub async fn limpar_timeline(State(state): State<AppState>) -> Html<String> {
    state.timeline.clear();
    panel(&state)
}

/// POST `/timeline/autoscroll`: Alterna e devolve o botão.
pub async fn toggle_autoscroll(State(state): State<AppState>) -> Html<String> {
    let enabled = state.toggle_auto_scroll();
    markup_to_html(templates::autoscroll_button(enabled))
}

/// GET `/api/estatisticas`: Repassa as estatísticas do extrator.
pub async fn estatisticas(State(state): State<AppState>) -> Result<Json<Value>, ProxyError> {
    let api = state.api.as_ref().ok_or(ProxyError::Offline)?;
    Ok(Json(api.estatisticas().await?))
}

/// GET `/api/scheduler`: Repassa o status do agendador.
pub async fn scheduler_status(
    State(state): State<AppState>,
) -> Result<Json<SchedulerStatus>, ProxyError> {
    let api = state.api.as_ref().ok_or(ProxyError::Offline)?;
    Ok(Json(api.scheduler_status().await?))
}

/// Falha das rotas de proxy, devolvida como JSON `{ "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("API indisponível no modo simulado")]
    Offline,
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::Offline => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Api(_) => StatusCode::BAD_GATEWAY,
        };
        tracing::warn!(error = %self, "Falha no proxy da API");
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
