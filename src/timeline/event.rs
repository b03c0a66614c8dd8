//! # Eventos da Timeline — O Registro Imutável de Progresso
//!
//! Cada mensagem recebida pelo canal push de uma tarefa de extração é
//! decodificada em um [`TimelineEvent`]: um registro imutável com tipo,
//! mensagem, instante e um saco de dados auxiliares ([`EventData`]).
//!
//! ## Formato no Fio
//!
//! ```json
//! { "type": "progress", "message": "Processando edital 4/15",
//!   "timestamp": 1718000000000, "data": { "progresso": 26, "atual": 4, "total": 15 } }
//! ```
//!
//! | Campo | Obrigatório | Observação |
//! |-------|-------------|------------|
//! | `type` | sim | string; tipos desconhecidos são aceitos ([`EventKind::Other`]) |
//! | `message` | sim | texto legível |
//! | `timestamp` | não | epoch em ms ou RFC 3339; ausente → instante de recebimento |
//! | `data` | não | objeto aberto; qualquer outra coisa é ignorada |

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identificador opaco de uma execução de extração.
///
/// Também é a chave do canal push no servidor, por isso só aceita
/// caracteres seguros para um segmento de URL.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

/// Erro de validação de um [`TaskId`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InvalidTaskId {
    #[error("ID da tarefa não fornecido")]
    Empty,
    #[error("ID da tarefa contém caracteres inválidos: {0:?}")]
    Characters(String),
}

fn task_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("invalid regex"))
}

impl TaskId {
    /// Valida e embrulha um identificador vindo do servidor ou do usuário.
    pub fn parse(raw: &str) -> Result<Self, InvalidTaskId> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidTaskId::Empty);
        }
        if !task_id_pattern().is_match(trimmed) {
            return Err(InvalidTaskId::Characters(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Gera um ID a partir do instante atual (milissegundos desde a época).
    pub fn generate() -> Self {
        Self(Utc::now().timestamp_millis().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classificação visual de um evento.
///
/// Apenas `Progress` pode mover a barra de progresso. Tipos que o servidor
/// venha a inventar são preservados em `Other` e exibidos como `info`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Info,
    Success,
    Warning,
    Error,
    Progress,
    Other(String),
}

impl EventKind {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "info" => Self::Info,
            "success" => Self::Success,
            "warning" => Self::Warning,
            "error" => Self::Error,
            "progress" => Self::Progress,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Progress => "progress",
            Self::Other(raw) => raw,
        }
    }

    /// Tipos que, quando são os últimos antes do fim do stream, indicam
    /// que a extração terminou.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Dados auxiliares abertos de um evento (`progresso`, `atual`, `total`, ...).
///
/// Nenhum campo é obrigatório; cada acessor valida apenas o que lê.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventData(Map<String, Value>);

impl EventData {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Valor numérico finito de `key`, se houver.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key)?.as_f64().filter(|n| n.is_finite())
    }

    /// Valor textual de `key`, se for string.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str()
    }

    pub fn progresso(&self) -> Option<f64> {
        self.number("progresso")
    }

    /// Linha de detalhes exibida abaixo da mensagem.
    ///
    /// Ex.: `Progresso: 40% • 4/10 editais • Edital: 123/2025/1`
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if let Some(p) = self.get("progresso").filter(|v| !v.is_null()) {
            parts.push(format!("Progresso: {}%", display_value(p)));
        }
        if let (Some(atual), Some(total)) = (self.present("atual"), self.present("total")) {
            parts.push(format!("{}/{} editais", display_value(atual), display_value(total)));
        }
        if let Some(id) = self.present("id_pncp") {
            parts.push(format!("Edital: {}", display_value(id)));
        }

        let counters = [
            ("total_encontrados", "Encontrados"),
            ("total_novos", "Novos"),
            ("total_atualizados", "Atualizados"),
            ("total_erros", "Erros"),
        ];
        for (key, label) in counters {
            if let Some(v) = self.get(key).filter(|v| !v.is_null()) {
                parts.push(format!("{label}: {}", display_value(v)));
            }
        }
        if let Some(t) = self.get("tempo_execucao").filter(|v| !v.is_null()) {
            parts.push(format!("Tempo: {}s", display_value(t)));
        }

        parts.join(" • ")
    }

    /// Campo presente e "verdadeiro" (não nulo, não zero, não string vazia).
    fn present(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| match v {
            Value::Null | Value::Bool(false) => false,
            Value::Number(n) => n.as_f64() != Some(0.0),
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Registro imutável de um evento de progresso/log.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "EventData::is_empty")]
    pub data: EventData,
}

/// Falha ao decodificar um payload do canal.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload não é JSON válido: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload não é um objeto JSON")]
    NotAnObject,
    #[error("campo obrigatório ausente ou não textual: {0}")]
    MissingField(&'static str),
}

/// Forma crua do payload, validada campo a campo em [`TimelineEvent::decode`].
#[derive(Deserialize)]
struct WirePayload {
    #[serde(rename = "type")]
    kind: Option<Value>,
    message: Option<Value>,
    timestamp: Option<Value>,
    data: Option<Value>,
}

impl TimelineEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
            data: EventData::default(),
        }
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }

    /// Decodifica um payload recebido do canal push.
    ///
    /// `received_at` é usado quando o payload não traz `timestamp`
    /// (ou traz algo que não é um instante reconhecível).
    pub fn decode(payload: &str, received_at: DateTime<Utc>) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(payload)?;
        if !value.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        let wire: WirePayload = serde_json::from_value(value)?;

        let kind = match wire.kind {
            Some(Value::String(s)) => EventKind::from_wire(&s),
            _ => return Err(DecodeError::MissingField("type")),
        };
        let message = match wire.message {
            Some(Value::String(s)) => s,
            _ => return Err(DecodeError::MissingField("message")),
        };
        let timestamp = wire
            .timestamp
            .as_ref()
            .and_then(parse_timestamp)
            .unwrap_or(received_at);
        let data = match wire.data {
            Some(Value::Object(map)) => EventData(map),
            _ => EventData::default(),
        };

        Ok(Self {
            kind,
            message,
            timestamp,
            data,
        })
    }

    /// Novo valor da barra de progresso carregado por este evento, se houver.
    ///
    /// Só eventos `progress` com `progresso` finito em `[0, 100]` contam;
    /// valores fora da faixa são ignorados, não truncados.
    pub fn progress_value(&self) -> Option<f64> {
        if self.kind != EventKind::Progress {
            return None;
        }
        self.data
            .progresso()
            .filter(|p| (0.0..=100.0).contains(p))
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_f64().filter(|m| m.is_finite())?;
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}
