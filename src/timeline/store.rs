//! # TimelineStore — O Log Ordenado da Tarefa Ativa
//!
//! Buffer append-only dos eventos da tarefa corrente, mais o valor de
//! progresso derivado (0–100).
//!
//! ## Invariantes
//!
//! - Eventos ficam na ordem de recebimento; nunca são reordenados por `timestamp`.
//! - O tamanho só cresce entre chamadas a [`TimelineStore::clear()`].
//! - O progresso só muda com eventos `progress` carregando `progresso` em `[0, 100]`.
//!
//! Os snapshots são `Arc<Vec<_>>` com copy-on-write: um snapshot tirado
//! antes de um `append` continua exatamente igual depois dele.

use std::sync::Arc;

use super::event::TimelineEvent;

/// Snapshot somente-leitura da timeline.
pub type TimelineSnapshot = Arc<Vec<TimelineEvent>>;

#[derive(Debug, Default)]
pub struct TimelineStore {
    events: TimelineSnapshot,
    progress: f64,
}

impl TimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona `event` ao fim do buffer, sem deduplicação nem validação de tipo.
    ///
    /// Retorna `true` se o progresso mudou.
    pub fn append(&mut self, event: TimelineEvent) -> bool {
        let new_progress = event.progress_value();
        Arc::make_mut(&mut self.events).push(event);

        match new_progress {
            Some(p) if p != self.progress => {
                self.progress = p;
                true
            }
            _ => false,
        }
    }

    /// Esvazia o buffer e zera o progresso. Idempotente.
    pub fn clear(&mut self) {
        if !self.events.is_empty() {
            self.events = Arc::default();
        }
        self.progress = 0.0;
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        Arc::clone(&self.events)
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
