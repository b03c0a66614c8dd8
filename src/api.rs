//! # Cliente da API do Extrator
//!
//! Função de requisição JSON usada para disparar extrações e ler dados
//! auxiliares do servidor. A timeline só depende de uma coisa daqui: o
//! `task_id` devolvido ao iniciar uma extração.
//!
//! | Método | Endpoint |
//! |--------|----------|
//! | [`ApiClient::executar_agora()`] | `POST /executar-agora` |
//! | [`ApiClient::estatisticas()`] | `GET /estatisticas` |
//! | [`ApiClient::scheduler_status()`] | `GET /scheduler/status` |

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::timeline::event::{InvalidTaskId, TaskId};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("erro HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("erro na comunicação com a API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ID da tarefa não recebido")]
    MissingTaskId,
    #[error(transparent)]
    InvalidTaskId(#[from] InvalidTaskId),
}

/// Resposta padrão das operações de extração.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecucaoResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    /// String ou número (o servidor usa o timestamp em ms).
    #[serde(default)]
    pub task_id: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub tempo_execucao: Option<f64>,
}

impl ExecucaoResponse {
    /// `task_id` validado, pronto para `TimelineController::start`.
    pub fn task_id(&self) -> Result<TaskId, ApiError> {
        let raw = match &self.task_id {
            None | Some(Value::Null) => return Err(ApiError::MissingTaskId),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        Ok(TaskId::parse(&raw)?)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerStatus {
    pub ativo: bool,
    #[serde(default)]
    pub proxima_execucao: Option<String>,
    #[serde(default)]
    pub ultima_execucao: Option<String>,
    #[serde(default)]
    pub configuracao: Value,
    #[serde(default)]
    pub estatisticas: Value,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Faz a requisição e decodifica o corpo JSON; status não-2xx vira [`ApiError::Http`].
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(%method, %url, "Fazendo requisição");

        let response = self
            .http
            .request(method, url.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %url, body = %body, "Erro HTTP da API");
            return Err(ApiError::Http { status, body });
        }
        Ok(response.json().await?)
    }

    pub async fn executar_agora(&self) -> Result<ExecucaoResponse, ApiError> {
        self.request(Method::POST, "/executar-agora").await
    }

    pub async fn estatisticas(&self) -> Result<Value, ApiError> {
        self.request(Method::GET, "/estatisticas").await
    }

    pub async fn scheduler_status(&self) -> Result<SchedulerStatus, ApiError> {
        self.request(Method::GET, "/scheduler/status").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(reqwest::Client::new(), server.uri())
    }

    #[tokio::test]
    async fn executar_agora_returns_task_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/executar-agora"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Extração inteligente iniciada em background",
                "task_id": "1718000000000"
            })))
            .mount(&server)
            .await;

        let resp = client_for(&server).await.executar_agora().await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.task_id().unwrap().as_str(), "1718000000000");
    }

    #[tokio::test]
    async fn numeric_task_id_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/executar-agora"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Extração inteligente iniciada em background",
                "task_id": 1718000000000u64
            })))
            .mount(&server)
            .await;

        let resp = client_for(&server).await.executar_agora().await.unwrap();
        assert_eq!(resp.task_id().unwrap().as_str(), "1718000000000");
    }

    #[tokio::test]
    async fn missing_task_id_is_reported() {
        let resp: ExecucaoResponse =
            serde_json::from_value(json!({ "success": true, "message": "ok" })).unwrap();
        assert!(matches!(resp.task_id(), Err(ApiError::MissingTaskId)));

        let null: ExecucaoResponse =
            serde_json::from_value(json!({ "success": true, "task_id": null })).unwrap();
        assert!(matches!(null.task_id(), Err(ApiError::MissingTaskId)));
    }

    #[tokio::test]
    async fn http_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/estatisticas"))
            .respond_with(ResponseTemplate::new(500).set_body_string("banco fora do ar"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.estatisticas().await.unwrap_err();
        match err {
            ApiError::Http { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "banco fora do ar");
            }
            other => panic!("erro inesperado: {other}"),
        }
    }

    #[tokio::test]
    async fn scheduler_status_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scheduler/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ativo": true,
                "proxima_execucao": "2025-06-11T06:00:00",
                "configuracao": { "hora": "06:00" },
                "estatisticas": {}
            })))
            .mount(&server)
            .await;

        let status = client_for(&server).await.scheduler_status().await.unwrap();
        assert!(status.ativo);
        assert_eq!(status.configuracao["hora"], "06:00");
        assert_eq!(status.ultima_execucao, None);
    }
}
