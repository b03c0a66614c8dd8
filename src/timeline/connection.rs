//! # ConnectionManager — Ciclo de Vida do Canal Push
//!
//! Cada instância possui **uma** conexão ligada a um [`TaskId`] e traduz
//! as mensagens cruas do transporte em [`TimelineEvent`]s.
//!
//! ## Máquina de Estados
//!
//! ```text
//! idle → connecting → open ─┬─ (fim após success/error) ──→ closed
//!            ↑              ├─ close() ───────────────────→ closed
//!            │              └─ queda / falha ao abrir ──→ error
//!            └──── espera `delay`, se a tarefa ainda for a ativa ─┘
//! ```
//!
//! `closed` é terminal: uma nova tarefa sempre cria um novo manager.
//!
//! ## Falhas
//!
//! | Situação | Tratamento |
//! |----------|------------|
//! | Payload malformado | descartado, `tracing::warn!`, conexão segue |
//! | Queda / falha ao abrir | `error` + nova tentativa após `delay` |
//! | Tentativas esgotadas | `closed` com [`ConnectionFailure::GaveUp`] |
//! | Mensagem após `close()` | descartada |

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::event::{EventKind, TaskId, TimelineEvent};
use super::transport::{EventTransport, MessageStream, TransportError};

/// Estado da conexão exibido ao usuário.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Error,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Error => "error",
            Self::Closed => "closed",
        }
    }
}

/// Política de reconexão: atraso fixo e teto de tentativas consecutivas.
///
/// `max_attempts = None` reconecta para sempre. O contador zera sempre
/// que uma conexão chega a `open`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: Some(12),
        }
    }
}

impl ReconnectPolicy {
    /// Pode tentar de novo depois de `failures` falhas consecutivas?
    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures <= max)
    }
}

/// Motivo de uma transição para `error` ou de desistência.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionFailure {
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[error("reconexão abandonada após {attempts} tentativas")]
    GaveUp { attempts: u32 },
}

/// Quem recebe o que a conexão produz. Implementado pelo controlador.
pub trait ConnectionObserver: Send + Sync + 'static {
    fn on_event(&self, event: TimelineEvent);

    fn on_state_change(&self, state: ConnectionState, cause: Option<&ConnectionFailure>);

    /// A tarefa desta conexão ainda é a ativa? Consultado antes de reconectar.
    fn is_current(&self) -> bool;
}

pub struct ConnectionManager {
    task_id: TaskId,
    state: Arc<Mutex<ConnectionState>>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Abre o canal de `task_id` em background.
    ///
    /// Nunca falha para quem chama: erros viram estado (`error`) e são
    /// reportados ao `observer`. Precisa de um runtime tokio ativo.
    pub fn open(
        task_id: TaskId,
        transport: Arc<dyn EventTransport>,
        observer: Arc<dyn ConnectionObserver>,
        policy: ReconnectPolicy,
    ) -> Self {
        let state = Arc::new(Mutex::new(ConnectionState::Idle));
        let cancel = CancellationToken::new();

        let worker = Worker {
            task_id: task_id.clone(),
            transport,
            observer,
            policy,
            state: Arc::clone(&state),
            cancel: cancel.clone(),
        };
        tokio::spawn(worker.run());

        Self {
            task_id,
            state,
            cancel,
        }
    }

    /// Encerra o canal. Chamar de novo não faz nada.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        *state = ConnectionState::Closed;
        tracing::debug!(task_id = %self.task_id, "Conexão da timeline encerrada");
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Como terminou a leitura de um stream.
enum StreamEnd {
    Cancelled,
    Completed,
    Failed(TransportError),
}

struct Worker {
    task_id: TaskId,
    transport: Arc<dyn EventTransport>,
    observer: Arc<dyn ConnectionObserver>,
    policy: ReconnectPolicy,
    state: Arc<Mutex<ConnectionState>>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        let mut failures: u32 = 0;

        loop {
            if !self.transition(ConnectionState::Connecting, None) {
                return;
            }

            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                result = self.transport.connect(&self.task_id) => result,
            };

            let end = match connected {
                Ok(stream) => {
                    if !self.transition(ConnectionState::Open, None) {
                        return;
                    }
                    tracing::info!(task_id = %self.task_id, "Timeline conectada - acompanhando progresso");
                    failures = 0;
                    self.consume(stream).await
                }
                Err(e) => StreamEnd::Failed(e),
            };

            let error = match end {
                StreamEnd::Cancelled => return,
                StreamEnd::Completed => {
                    tracing::info!(task_id = %self.task_id, "Extração finalizada, canal encerrado");
                    self.transition(ConnectionState::Closed, None);
                    return;
                }
                StreamEnd::Failed(e) => e,
            };

            failures += 1;
            tracing::warn!(task_id = %self.task_id, error = %error, failures, "Erro na conexão com timeline");
            let failure = ConnectionFailure::Transport(error);
            if !self.transition(ConnectionState::Error, Some(&failure)) {
                return;
            }

            if !self.policy.allows(failures) {
                let attempts = failures - 1;
                tracing::error!(task_id = %self.task_id, attempts, "Reconexão abandonada");
                let gave_up = ConnectionFailure::GaveUp { attempts };
                self.transition(ConnectionState::Closed, Some(&gave_up));
                return;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(self.policy.delay) => {}
            }

            if !self.observer.is_current() {
                tracing::debug!(task_id = %self.task_id, "Tarefa substituída, sem reconexão");
                return;
            }
            tracing::info!(task_id = %self.task_id, "Tentando reconectar timeline...");
        }
    }

    async fn consume(&self, mut stream: MessageStream) -> StreamEnd {
        let mut last_kind: Option<EventKind> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StreamEnd::Cancelled,
                item = stream.next() => item,
            };

            match next {
                Some(Ok(payload)) => match TimelineEvent::decode(&payload, Utc::now()) {
                    Ok(event) => {
                        if self.cancel.is_cancelled() {
                            return StreamEnd::Cancelled;
                        }
                        last_kind = Some(event.kind.clone());
                        self.observer.on_event(event);
                    }
                    Err(e) => {
                        tracing::warn!(
                            task_id = %self.task_id,
                            error = %e,
                            payload = %payload,
                            "Erro ao processar evento, mensagem descartada"
                        );
                    }
                },
                Some(Err(e)) => return StreamEnd::Failed(e),
                None => {
                    return match last_kind {
                        Some(kind) if kind.is_terminal() => StreamEnd::Completed,
                        _ => StreamEnd::Failed(TransportError::Closed),
                    };
                }
            }
        }
    }

    /// Aplica a transição e avisa o observer; `false` se já foi cancelado.
    fn transition(&self, next: ConnectionState, cause: Option<&ConnectionFailure>) -> bool {
        {
            let mut state = self.state.lock();
            if self.cancel.is_cancelled() {
                return false;
            }
            *state = next;
        }
        self.observer.on_state_change(next, cause);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::timeline::transport::testing::{settle, ScriptedTransport};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        states: Mutex<Vec<(ConnectionState, Option<String>)>>,
        superseded: AtomicBool,
    }

    impl ConnectionObserver for Recorder {
        fn on_event(&self, event: TimelineEvent) {
            self.events.lock().push(event.message);
        }

        fn on_state_change(&self, state: ConnectionState, cause: Option<&ConnectionFailure>) {
            self.states.lock().push((state, cause.map(|c| c.to_string())));
        }

        fn is_current(&self) -> bool {
            !self.superseded.load(Ordering::SeqCst)
        }
    }

    impl Recorder {
        fn messages(&self) -> Vec<String> {
            self.events.lock().clone()
        }

        fn state_names(&self) -> Vec<ConnectionState> {
            self.states.lock().iter().map(|(s, _)| *s).collect()
        }
    }

    fn task(id: &str) -> TaskId {
        TaskId::parse(id).unwrap()
    }

    fn open(
        transport: &ScriptedTransport,
        id: &TaskId,
        policy: ReconnectPolicy,
    ) -> (ConnectionManager, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let manager = ConnectionManager::open(
            id.clone(),
            Arc::new(transport.clone()),
            recorder.clone(),
            policy,
        );
        (manager, recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_events_in_order() {
        let transport = ScriptedTransport::default();
        let t1 = task("t1");
        let server = transport.accept(&t1);
        let (manager, rec) = open(&transport, &t1, ReconnectPolicy::default());

        server.send(r#"{"type":"info","message":"a"}"#);
        server.send(r#"{"type":"progress","message":"b","data":{"progresso":10}}"#);
        settle().await;

        assert_eq!(rec.messages(), ["a", "b"]);
        assert_eq!(rec.state_names(), [ConnectionState::Connecting, ConnectionState::Open]);
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    /// Um payload inválido no meio do stream não interrompe os seguintes.
    #[tokio::test(start_paused = true)]
    async fn malformed_payload_is_dropped() {
        let transport = ScriptedTransport::default();
        let t1 = task("t1");
        let server = transport.accept(&t1);
        let (manager, rec) = open(&transport, &t1, ReconnectPolicy::default());

        server.send(r#"{"type":"info","message":"antes"}"#);
        server.send("{isto não é json");
        server.send(r#"{"type":"info","message":"depois"}"#);
        settle().await;

        assert_eq!(rec.messages(), ["antes", "depois"]);
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_fixed_delay() {
        let transport = ScriptedTransport::default();
        let t1 = task("t1");
        let first = transport.accept(&t1);
        let second = transport.accept(&t1);
        let (manager, rec) = open(&transport, &t1, ReconnectPolicy::default());

        first.send(r#"{"type":"info","message":"a"}"#);
        first.fail();
        settle().await;
        assert_eq!(manager.state(), ConnectionState::Error);

        tokio::time::sleep(Duration::from_secs(4)).await;
        settle().await;
        assert_eq!(transport.connect_count(&t1), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(transport.connect_count(&t1), 2);
        assert_eq!(manager.state(), ConnectionState::Open);

        second.send(r#"{"type":"info","message":"b"}"#);
        settle().await;
        assert_eq!(rec.messages(), ["a", "b"]);
    }

    /// Falha ao abrir o canal vira estado `error`, nunca pânico.
    #[tokio::test(start_paused = true)]
    async fn refused_connection_fails_softly() {
        let transport = ScriptedTransport::default();
        let t1 = task("t1");
        transport.refuse(&t1);
        let (manager, rec) = open(&transport, &t1, ReconnectPolicy::default());
        settle().await;

        assert_eq!(manager.state(), ConnectionState::Error);
        let states = rec.states.lock().clone();
        assert_eq!(states[1].0, ConnectionState::Error);
        assert!(states[1].1.as_deref().unwrap().contains("recusado"));
    }

    #[tokio::test(start_paused = true)]
    async fn no_reconnect_when_task_superseded() {
        let transport = ScriptedTransport::default();
        let t1 = task("t1");
        transport.refuse(&t1);
        let (_manager, rec) = open(&transport, &t1, ReconnectPolicy::default());
        settle().await;

        rec.superseded.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(transport.connect_count(&t1), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let transport = ScriptedTransport::default();
        let t1 = task("t1");
        let policy = ReconnectPolicy {
            delay: Duration::from_secs(5),
            max_attempts: Some(2),
        };
        let (manager, rec) = open(&transport, &t1, policy);

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;

        assert_eq!(transport.connect_count(&t1), 3);
        assert_eq!(manager.state(), ConnectionState::Closed);
        let last = rec.states.lock().last().cloned().unwrap();
        assert_eq!(last.0, ConnectionState::Closed);
        assert!(last.1.unwrap().contains("2 tentativas"));
    }

    /// Fim do stream depois de `success` é conclusão, não queda.
    #[tokio::test(start_paused = true)]
    async fn clean_end_after_success_closes() {
        let transport = ScriptedTransport::default();
        let t1 = task("t1");
        let server = transport.accept(&t1);
        let (manager, _rec) = open(&transport, &t1, ReconnectPolicy::default());

        server.send(r#"{"type":"success","message":"fim"}"#);
        drop(server);
        settle().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;

        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(transport.connect_count(&t1), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_idempotent_and_stops_delivery() {
        let transport = ScriptedTransport::default();
        let t1 = task("t1");
        let server = transport.accept(&t1);
        let (manager, rec) = open(&transport, &t1, ReconnectPolicy::default());
        settle().await;

        manager.close();
        manager.close();
        server.send(r#"{"type":"info","message":"tarde demais"}"#);
        settle().await;

        assert!(rec.messages().is_empty());
        assert_eq!(manager.state(), ConnectionState::Closed);
    }
}
