//! # Decodificador `text/event-stream`
//!
//! Converte os bytes do corpo HTTP em mensagens SSE completas.
//! Os chunks chegam em fronteiras arbitrárias: uma linha (ou um caractere
//! UTF-8 multibyte) pode vir partida em dois chunks, então o decodificador
//! acumula bytes até ter linhas inteiras.
//!
//! ```text
//! : comentário            → ignorado
//! event: progresso        → nome do evento
//! id: 42                  → último id
//! data: {"type":"info",   → primeira linha de dados
//! data:  "message":"x"}   → concatenada com '\n'
//!                         → linha vazia: despacha a mensagem
//! ```

/// Uma mensagem SSE completa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

impl SseMessage {
    /// Mensagens sem nome (ou `message`) são as que um `onmessage` recebe.
    pub fn is_default_event(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    id: Option<String>,
    data: String,
    has_data: bool,
    /// BOM inicial já tratado.
    started: bool,
}

const BOM: &[u8] = b"\xEF\xBB\xBF";

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alimenta o decodificador com um chunk e devolve as mensagens completadas.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buffer.extend_from_slice(chunk);
        if !self.started {
            // BOM pode vir partido entre chunks
            if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
                return Vec::new();
            }
            if self.buffer.starts_with(BOM) {
                self.buffer.drain(..BOM.len());
            }
            self.started = true;
        }
        let mut messages = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(message) = self.process_line(&line) {
                messages.push(message);
            }
        }

        messages
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // `retry` e campos desconhecidos não afetam a timeline
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseMessage {
            event,
            id: self.id.clone(),
            data: std::mem::take(&mut self.data),
        })
    }
}
