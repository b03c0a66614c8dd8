//! # TimelineController — Ponto Único de Entrada da Timeline
//!
//! Liga um [`ConnectionManager`] ao [`TimelineStore`] e expõe, para a camada
//! de apresentação, os controles imperativos e um gancho de mudança.
//!
//! ```text
//! start(task) ──┐
//! stop() ───────┤      ┌────────────── TimelineController ───────────────┐
//! clear() ──────┴────→ │ store │ task ativa (epoch) │ estado │ listeners │
//!                      └──────▲──────────────────────────────────┬───────┘
//!      ConnectionManager ─────┘ on_event / on_state_change       └→ on_change(view)
//! ```
//!
//! ## Cancelamento por Epoch
//!
//! Cada `start` cria um epoch novo. Callbacks de uma conexão cujo epoch não
//! é mais o vivo (tarefa substituída ou `stop()` já retornou) são
//! descartados em silêncio, sob o mesmo lock que protege o store.
//!
//! ## Injeção de Dependência
//!
//! O controlador é um handle barato de clonar (`Arc` interno). Crie um na
//! inicialização e passe-o a quem precisar, em vez de um singleton global.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::connection::{
    ConnectionFailure, ConnectionManager, ConnectionObserver, ConnectionState, ReconnectPolicy,
};
use super::event::{EventKind, TaskId, TimelineEvent};
use super::store::{TimelineSnapshot, TimelineStore};
use super::transport::EventTransport;

pub type ListenerId = u64;

type Listener = Box<dyn Fn(&TimelineChange, &TimelineView) + Send + Sync>;

/// O que acabou de mudar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimelineChange {
    Appended,
    Cleared,
    StateChanged(ConnectionState),
}

/// Visão somente-leitura entregue à camada de apresentação.
#[derive(Clone, Debug)]
pub struct TimelineView {
    pub task_id: Option<TaskId>,
    pub events: TimelineSnapshot,
    pub progress: f64,
    pub state: ConnectionState,
}

#[derive(Clone)]
pub struct TimelineController {
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    transport: Arc<dyn EventTransport>,
    policy: ReconnectPolicy,
}

struct Inner {
    store: TimelineStore,
    task_id: Option<TaskId>,
    /// Epoch da conexão que ainda pode entregar eventos.
    live_epoch: Option<u64>,
    epoch: u64,
    connection: Option<ConnectionManager>,
    state: ConnectionState,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,
}

impl Inner {
    fn view(&self) -> TimelineView {
        TimelineView {
            task_id: self.task_id.clone(),
            events: self.store.snapshot(),
            progress: self.store.progress(),
            state: self.state,
        }
    }

    fn notify(&self, change: TimelineChange) {
        if self.listeners.is_empty() {
            return;
        }
        let view = self.view();
        for (_, listener) in &self.listeners {
            listener(&change, &view);
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.notify(TimelineChange::StateChanged(state));
        }
    }
}

impl TimelineController {
    pub fn new(transport: Arc<dyn EventTransport>, policy: ReconnectPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    store: TimelineStore::new(),
                    task_id: None,
                    live_epoch: None,
                    epoch: 0,
                    connection: None,
                    state: ConnectionState::Idle,
                    listeners: Vec::new(),
                    next_listener: 0,
                }),
                transport,
                policy,
            }),
        }
    }

    /// Passa a acompanhar `task_id`: fecha a conexão anterior, limpa a
    /// timeline e abre o canal da nova tarefa.
    pub fn start(&self, task_id: TaskId) {
        let mut inner = self.shared.inner.lock();

        if let Some(previous) = inner.connection.take() {
            tracing::debug!(task_id = %previous.task_id(), "Fechando timeline anterior");
            previous.close();
        }

        inner.epoch += 1;
        let epoch = inner.epoch;
        inner.live_epoch = Some(epoch);
        inner.task_id = Some(task_id.clone());
        inner.store.clear();
        inner.notify(TimelineChange::Cleared);
        inner.set_state(ConnectionState::Idle);

        let link = Arc::new(ControllerLink {
            shared: Arc::downgrade(&self.shared),
            epoch,
        });
        tracing::info!(task_id = %task_id, epoch, "Iniciando timeline para task");
        inner.connection = Some(ConnectionManager::open(
            task_id,
            Arc::clone(&self.shared.transport),
            link,
            self.shared.policy,
        ));
    }

    /// Cancelamento explícito: nenhum evento entra depois que `stop` retorna.
    /// O conteúdo da timeline é preservado.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();
        inner.live_epoch = None;
        if let Some(connection) = inner.connection.take() {
            connection.close();
            tracing::info!(task_id = %connection.task_id(), "Timeline parada pelo usuário");
            inner.set_state(ConnectionState::Closed);
        }
    }

    /// Limpa eventos e progresso sem tocar na conexão em andamento.
    pub fn clear(&self) {
        let mut inner = self.shared.inner.lock();
        inner.store.clear();
        inner.notify(TimelineChange::Cleared);
    }

    pub fn view(&self) -> TimelineView {
        self.shared.inner.lock().view()
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        self.shared.inner.lock().store.snapshot()
    }

    pub fn progress(&self) -> f64 {
        self.shared.inner.lock().store.progress()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.shared.inner.lock().task_id.clone()
    }

    /// Registra um listener chamado após cada append, clear ou transição.
    ///
    /// Os listeners rodam em sequência, com o estado travado: devem ser
    /// rápidos e não podem chamar de volta o controlador.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TimelineChange, &TimelineView) + Send + Sync + 'static,
    {
        let mut inner = self.shared.inner.lock();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.shared.inner.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        inner.listeners.len() != before
    }
}

/// Observer de uma conexão, amarrado ao epoch em que ela foi aberta.
///
/// Guarda só um `Weak`: a conexão não mantém o controlador vivo.
struct ControllerLink {
    shared: Weak<Shared>,
    epoch: u64,
}

impl ControllerLink {
    fn with_live<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Option<R> {
        let shared = self.shared.upgrade()?;
        let mut inner = shared.inner.lock();
        if inner.live_epoch != Some(self.epoch) {
            return None;
        }
        Some(f(&mut *inner))
    }
}

impl ConnectionObserver for ControllerLink {
    fn on_event(&self, event: TimelineEvent) {
        let delivered = self.with_live(|inner| {
            inner.store.append(event);
            inner.notify(TimelineChange::Appended);
        });
        if delivered.is_none() {
            tracing::debug!(epoch = self.epoch, "Evento de tarefa substituída descartado");
        }
    }

    fn on_state_change(&self, state: ConnectionState, cause: Option<&ConnectionFailure>) {
        self.with_live(|inner| {
            inner.set_state(state);
            if let Some(cause) = cause {
                let message = match cause {
                    ConnectionFailure::Transport(e) => format!("Erro na conexão com timeline: {e}"),
                    ConnectionFailure::GaveUp { attempts } => {
                        format!("Reconexão abandonada após {attempts} tentativas")
                    }
                };
                inner.store.append(TimelineEvent::new(EventKind::Error, message));
                inner.notify(TimelineChange::Appended);
            }
        });
    }

    fn is_current(&self) -> bool {
        self.with_live(|_| ()).is_some()
    }
}
