//! # Eventos SSE da Timeline para o Navegador
//!
//! Cada mudança do [`TimelineController`] vira um [`TimelineUpdate`],
//! publicado no canal broadcast e retransmitido em `/timeline/stream`.
//!
//! ## Serialização
//!
//! Usa `#[serde(tag = "kind")]` para produzir JSON com discriminador:
//!
//! ```json
//! { "kind": "Appended", "event": { "type": "info", "message": "..." },
//!   "progress": 40.0, "total": 7 }
//! ```
//!
//! O script da página usa `kind` para decidir se só recarrega o painel
//! ou também rola o log até o fim.
//!
//! [`TimelineController`]: crate::timeline::TimelineController

use serde::Serialize;

use crate::timeline::{ConnectionState, TaskId, TimelineChange, TimelineEvent, TimelineView};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind")]
pub enum TimelineUpdate {
    /// Um evento entrou no log.
    Appended {
        event: TimelineEvent,
        /// Progresso após o evento (0–100).
        progress: f64,
        /// Total de eventos no log.
        total: usize,
    },

    /// Log esvaziado (nova tarefa ou limpeza manual).
    Cleared { task_id: Option<TaskId> },

    /// Transição de estado da conexão.
    StateChanged {
        state: ConnectionState,
        task_id: Option<TaskId>,
    },
}

impl TimelineUpdate {
    pub fn from_change(change: &TimelineChange, view: &TimelineView) -> Option<Self> {
        let update = match change {
            TimelineChange::Appended => Self::Appended {
                event: view.events.last()?.clone(),
                progress: view.progress,
                total: view.events.len(),
            },
            TimelineChange::Cleared => Self::Cleared {
                task_id: view.task_id.clone(),
            },
            TimelineChange::StateChanged(state) => Self::StateChanged {
                state: *state,
                task_id: view.task_id.clone(),
            },
        };
        Some(update)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::timeline::EventKind;

    #[test]
    fn appended_update_serializes_with_last_event() {
        let view = TimelineView {
            task_id: Some(TaskId::parse("t1").unwrap()),
            events: Arc::new(vec![
                TimelineEvent::new(EventKind::Info, "a"),
                TimelineEvent::new(EventKind::Success, "b"),
            ]),
            progress: 100.0,
            state: ConnectionState::Open,
        };
        let update = TimelineUpdate::from_change(&TimelineChange::Appended, &view).unwrap();
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["kind"], "Appended");
        assert_eq!(json["event"]["type"], "success");
        assert_eq!(json["event"]["message"], "b");
        assert_eq!(json["total"], 2);

        let state = TimelineUpdate::from_change(
            &TimelineChange::StateChanged(ConnectionState::Error),
            &view,
        )
        .unwrap();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["task_id"], "t1");
    }
}
