//! # Timeline de Extração — Progresso em Tempo Real
//!
//! Acompanha uma tarefa de extração do PNCP pelo canal push do servidor e
//! reduz o stream de eventos a um estado observável: log ordenado,
//! percentual de progresso e estado da conexão.
//!
//! ## Componentes
//!
//! ```text
//! EventTransport ──→ ConnectionManager ──→ TimelineController ──→ view (on_change)
//!   (SSE / simulado)   (abre, reconecta,      ├── TimelineStore
//!                       decodifica)            └── task ativa + epoch
//! ```
//!
//! | Módulo | Responsabilidade |
//! |--------|------------------|
//! | [`event`] | `TaskId`, `TimelineEvent`, decodificação do payload |
//! | [`store`] | Buffer append-only + progresso derivado |
//! | [`sse`] | Decodificador `text/event-stream` |
//! | [`transport`] | Costura com a rede (SSE real ou simulado) |
//! | [`connection`] | Máquina de estados da conexão e reconexão |
//! | [`controller`] | Orquestração, cancelamento e gancho de mudança |

pub mod connection;
pub mod controller;
pub mod event;
pub mod sse;
pub mod store;
pub mod transport;

pub use connection::{ConnectionState, ReconnectPolicy};
pub use controller::{TimelineChange, TimelineController, TimelineView};
pub use event::{EventKind, TaskId, TimelineEvent};
pub use transport::{EventTransport, SimulatedTransport, SseTransport};
