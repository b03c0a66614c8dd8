//! # Estado da Aplicação Web
//!
//! Struct de estado compartilhada entre todos os handlers Axum. O
//! [`TimelineController`] é criado uma vez em `main` e injetado aqui; os
//! handlers nunca alcançam um estado global.
//!
//! ```text
//! main()
//!   ├── TimelineController ──on_change──→ updates_tx (broadcast)
//!   ├── ApiClient (None no modo simulado)
//!   └── AppState { timeline, api, updates_tx, auto_scroll }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::api::ApiClient;
use crate::timeline::TimelineController;
use crate::web::events::TimelineUpdate;

#[derive(Clone)]
pub struct AppState {
    /// Controlador da timeline da tarefa ativa.
    pub timeline: TimelineController,
    /// Cliente da API do extrator; `None` quando a timeline é simulada.
    pub api: Option<ApiClient>,
    /// Canal broadcast retransmitido em `/timeline/stream`.
    pub updates_tx: Arc<broadcast::Sender<TimelineUpdate>>,
    /// Preferência de rolagem automática do log.
    pub auto_scroll: Arc<AtomicBool>,
}

impl AppState {
    /// Monta o estado e liga o controlador ao canal broadcast.
    pub fn new(timeline: TimelineController, api: Option<ApiClient>) -> Self {
        // 256 atualizações; assinantes lentos perdem as mais antigas
        let (updates_tx, _) = broadcast::channel(256);
        let updates_tx = Arc::new(updates_tx);

        let tx = Arc::clone(&updates_tx);
        timeline.on_change(move |change, view| {
            if let Some(update) = TimelineUpdate::from_change(change, view) {
                // sem assinantes, o envio falha e tudo bem
                let _ = tx.send(update);
            }
        });

        Self {
            timeline,
            api,
            updates_tx,
            auto_scroll: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll.load(Ordering::Relaxed)
    }

    /// Alterna a rolagem automática e devolve o novo valor.
    pub fn toggle_auto_scroll(&self) -> bool {
        !self.auto_scroll.fetch_xor(true, Ordering::Relaxed)
    }
}
