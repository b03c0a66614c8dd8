#![allow(dead_code)]
#![allow(rustdoc::broken_intra_doc_links)]
//! # PNCP Editais — Timeline de Extração
//!
//! **Ponto de entrada principal** do painel que acompanha, em tempo real, o
//! progresso de uma extração de editais do PNCP.
//!
//! O servidor web sobe imediatamente; nenhuma conexão com o extrator é
//! aberta até que uma tarefa seja iniciada pela interface
//! (`POST /extracao/executar` ou `POST /timeline/iniciar/{task_id}`).
//!
//! ## Fluxo de Inicialização
//!
//! ```text
//! main()
//!   ├── Configura tracing/logging
//!   ├── Settings::from_env()
//!   ├── Escolhe o transporte
//!   │     ├── TIMELINE_SIMULADO=true → SimulatedTransport (sem servidor)
//!   │     └── caso contrário         → SseTransport + ApiClient
//!   ├── TimelineController (transporte + política de reconexão)
//!   ├── AppState + Router
//!   └── Servidor TCP (HOST:PORT)
//! ```
//!
//! ## Exemplo de Uso
//!
//! ```bash
//! # Contra o extrator local (http://127.0.0.1:8000)
//! cargo run
//!
//! # Sem servidor, com a timeline simulada e logs detalhados
//! TIMELINE_SIMULADO=true RUST_LOG=debug cargo run
//! ```

/// Módulo `api`: cliente REST do extrator (dispara extrações).
mod api;

/// Módulo `config`: configurações lidas do ambiente.
mod config;

/// Módulo `timeline`: conexão por tarefa, reconexão e estado da timeline.
mod timeline;

/// Módulo `web`: servidor axum, handlers, templates e relay SSE.
mod web;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::api::ApiClient;
use crate::config::Settings;
use crate::timeline::{EventTransport, SimulatedTransport, SseTransport, TimelineController};
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controla o nível (padrão: info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("📡 PNCP Timeline — Starting...");

    let settings = Settings::from_env().context("configuração inválida")?;

    let (transport, api): (Arc<dyn EventTransport>, Option<ApiClient>) = if settings.simulated {
        tracing::info!("Modo simulado: timeline sem servidor de extração");
        (Arc::new(SimulatedTransport::default()), None)
    } else {
        // Sem timeout global: o canal SSE fica aberto durante toda a extração
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("falha ao criar cliente HTTP")?;
        tracing::info!(api_url = %settings.api_url, "Usando API do extrator");
        (
            Arc::new(SseTransport::new(http.clone(), settings.api_url.clone())),
            Some(ApiClient::new(http, settings.api_url.clone())),
        )
    };

    tracing::info!(
        delay_secs = settings.reconnect.delay.as_secs(),
        max_attempts = ?settings.reconnect.max_attempts,
        "Política de reconexão"
    );
    let timeline = TimelineController::new(transport, settings.reconnect);

    let state = AppState::new(timeline, api);
    let app = web::create_router(state);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("falha ao abrir {addr}"))?;
    tracing::info!("🚀 Server running on http://{addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
