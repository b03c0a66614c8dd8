//! # Transportes do Canal Push
//!
//! [`EventTransport`] é a costura entre o [`ConnectionManager`] e a rede:
//! dado um [`TaskId`], abre o canal e entrega um stream de payloads crus
//! (strings JSON, ainda não decodificadas).
//!
//! | Implementação | Uso |
//! |---------------|-----|
//! | [`SseTransport`] | `GET {api}/extracao/events/{task_id}` via reqwest |
//! | [`SimulatedTransport`] | modo offline: roteiro fixo de seis eventos |
//!
//! [`ConnectionManager`]: super::connection::ConnectionManager

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use serde_json::json;

use super::event::TaskId;
use super::sse::SseDecoder;

/// Stream de payloads crus entregues pelo canal, na ordem de chegada.
pub type MessageStream = BoxStream<'static, Result<String, TransportError>>;

/// Falha de transporte: estabelecimento do canal ou queda no meio do stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("falha de rede: {0}")]
    Http(#[from] reqwest::Error),
    #[error("servidor respondeu {status} ao abrir o canal")]
    Status { status: reqwest::StatusCode },
    #[error("canal indisponível: {0}")]
    Unavailable(String),
    #[error("conexão encerrada inesperadamente")]
    Closed,
}

/// Abre o canal push de uma tarefa.
pub trait EventTransport: Send + Sync + 'static {
    fn connect(&self, task_id: &TaskId) -> BoxFuture<'static, Result<MessageStream, TransportError>>;
}

/// Canal SSE real, servido pela API do extrator.
#[derive(Clone)]
pub struct SseTransport {
    http: reqwest::Client,
    base_url: String,
}

impl SseTransport {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn events_url(&self, task_id: &TaskId) -> String {
        format!("{}/extracao/events/{}", self.base_url, task_id)
    }
}

impl EventTransport for SseTransport {
    fn connect(&self, task_id: &TaskId) -> BoxFuture<'static, Result<MessageStream, TransportError>> {
        let request = self
            .http
            .get(self.events_url(task_id))
            .header(ACCEPT, "text/event-stream");
        Box::pin(open_sse_stream(request, task_id.clone()))
    }
}

async fn open_sse_stream(
    request: reqwest::RequestBuilder,
    task: TaskId,
) -> Result<MessageStream, TransportError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status { status });
    }
    tracing::debug!(task_id = %task, "Canal SSE aberto");

    let mut decoder = SseDecoder::new();
    let messages = response
        .bytes_stream()
        .map(move |chunk| match chunk {
            Ok(bytes) => decoder
                .feed(&bytes)
                .into_iter()
                .filter_map(|msg| {
                    if msg.is_default_event() {
                        Some(Ok(msg.data))
                    } else {
                        tracing::debug!(event = ?msg.event, "Evento SSE nomeado ignorado");
                        None
                    }
                })
                .collect::<Vec<_>>(),
            Err(e) => vec![Err(TransportError::Http(e))],
        })
        .flat_map(stream::iter);

    Ok(messages.boxed())
}

/// Modo demonstração: reproduz uma extração típica sem servidor.
///
/// Seis eventos, um por segundo, com `progresso` até 100; o último é
/// `success`, então o stream termina como tarefa concluída.
#[derive(Clone, Debug)]
pub struct SimulatedTransport {
    interval: Duration,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

impl SimulatedTransport {
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    fn script() -> Vec<(&'static str, &'static str, Option<u32>)> {
        vec![
            ("info", "🚀 Iniciando extração do dia anterior...", None),
            ("info", "✅ Extrator inicializado com sucesso", None),
            ("progress", "🔍 Iniciando busca de editais...", Some(33)),
            ("progress", "📊 Processando dados encontrados...", Some(66)),
            ("progress", "💾 Salvando dados no banco...", Some(100)),
            ("success", "🎉 Extração concluída com sucesso!", None),
        ]
    }
}

impl EventTransport for SimulatedTransport {
    fn connect(&self, task_id: &TaskId) -> BoxFuture<'static, Result<MessageStream, TransportError>> {
        let interval = self.interval;
        tracing::info!(task_id = %task_id, "Timeline simulada");

        Box::pin(async move {
            let messages = stream::iter(Self::script()).then(move |(kind, message, progresso)| async move {
                tokio::time::sleep(interval).await;
                let mut payload = json!({
                    "type": kind,
                    "message": message,
                    "timestamp": chrono::Utc::now().timestamp_millis(),
                });
                if let Some(p) = progresso {
                    payload["data"] = json!({ "progresso": p });
                }
                Ok::<_, TransportError>(payload.to_string())
            });
            Ok(messages.boxed())
        })
    }
}

/// Transporte roteirizado em memória para os testes de conexão e controlador.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use super::*;

    type Script = Result<mpsc::UnboundedReceiver<Result<String, TransportError>>, TransportError>;

    /// Deixa as tasks em background processarem o que já está pronto.
    pub async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    /// Cada `connect(task)` consome o próximo roteiro registrado para `task`.
    #[derive(Default, Clone)]
    pub struct ScriptedTransport {
        scripts: Arc<Mutex<HashMap<TaskId, VecDeque<Script>>>>,
        connects: Arc<Mutex<Vec<TaskId>>>,
    }

    /// Lado "servidor" de uma conexão roteirizada.
    pub struct ServerSide {
        tx: mpsc::UnboundedSender<Result<String, TransportError>>,
    }

    impl ServerSide {
        pub fn send(&self, payload: &str) {
            let _ = self.tx.send(Ok(payload.to_string()));
        }

        pub fn fail(&self) {
            let _ = self.tx.send(Err(TransportError::Closed));
        }
    }

    impl ScriptedTransport {
        /// Registra uma conexão bem-sucedida para `task`.
        pub fn accept(&self, task: &TaskId) -> ServerSide {
            let (tx, rx) = mpsc::unbounded_channel();
            self.push(task, Ok(rx));
            ServerSide { tx }
        }

        /// Registra uma falha de estabelecimento para `task`.
        pub fn refuse(&self, task: &TaskId) {
            self.push(task, Err(TransportError::Unavailable("recusado".into())));
        }

        pub fn connect_count(&self, task: &TaskId) -> usize {
            self.connects.lock().iter().filter(|t| *t == task).count()
        }

        fn push(&self, task: &TaskId, script: Script) {
            self.scripts
                .lock()
                .entry(task.clone())
                .or_default()
                .push_back(script);
        }
    }

    impl EventTransport for ScriptedTransport {
        fn connect(
            &self,
            task_id: &TaskId,
        ) -> BoxFuture<'static, Result<MessageStream, TransportError>> {
            self.connects.lock().push(task_id.clone());
            let next = self
                .scripts
                .lock()
                .get_mut(task_id)
                .and_then(|queue| queue.pop_front());
            Box::pin(async move {
                match next {
                    Some(Ok(rx)) => Ok(UnboundedReceiverStream::new(rx).boxed()),
                    Some(Err(e)) => Err(e),
                    None => Err(TransportError::Unavailable("sem roteiro".into())),
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sse_transport_yields_default_event_payloads() {
        let server = MockServer::start().await;
        let body = "data: {\"type\":\"info\",\"message\":\"begin\"}\n\n\
                    event: ping\ndata: ignorado\n\n\
                    data: {\"type\":\"success\",\"message\":\"fim\"}\n\n";
        Mock::given(method("GET"))
            .and(path("/extracao/events/t1"))
            .and(header("accept", "text/event-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let transport = SseTransport::new(reqwest::Client::new(), format!("{}/", server.uri()));
        let task = TaskId::parse("t1").unwrap();
        let stream = transport.connect(&task).await.unwrap();
        let payloads: Vec<String> = stream.map(|r| r.unwrap()).collect().await;

        assert_eq!(payloads.len(), 2);
        assert!(payloads[0].contains("begin"));
        assert!(payloads[1].contains("fim"));
    }

    #[tokio::test]
    async fn sse_transport_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let transport = SseTransport::new(reqwest::Client::new(), server.uri());
        let task = TaskId::parse("inexistente").unwrap();
        let err = transport.connect(&task).await.err().unwrap();
        assert!(matches!(err, TransportError::Status { status } if status.as_u16() == 404));
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_transport_plays_script() {
        let transport = SimulatedTransport::default();
        let task = TaskId::parse("demo").unwrap();
        let payloads: Vec<String> = transport
            .connect(&task)
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(payloads.len(), 6);
        assert!(payloads[4].contains("\"progresso\":100"));
        assert!(payloads[5].contains("\"success\""));
    }
}
