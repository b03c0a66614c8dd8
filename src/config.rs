//! # Configuração — Variáveis de Ambiente
//!
//! | Variável | Padrão | Uso |
//! |----------|--------|-----|
//! | `PNCP_API_URL` | `http://127.0.0.1:8000` | API do extrator (REST + canal SSE) |
//! | `HOST` | `0.0.0.0` | Interface do servidor web |
//! | `PORT` | `3000` | Porta do servidor web |
//! | `TIMELINE_RECONEXAO_SEGUNDOS` | `5` | Atraso fixo entre reconexões (mínimo 1) |
//! | `TIMELINE_MAX_RECONEXOES` | `12` | Teto de tentativas seguidas (`0` = sem teto) |
//! | `TIMELINE_SIMULADO` | `false` | Usa a timeline simulada em vez do servidor |

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::timeline::ReconnectPolicy;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub host: String,
    pub port: u16,
    pub reconnect: ReconnectPolicy,
    pub simulated: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            reconnect: ReconnectPolicy::default(),
            simulated: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Monta as configurações a partir de uma função de busca (testável sem
    /// mexer no ambiente do processo).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_url = lookup("PNCP_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);
        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "PORT")?.unwrap_or(defaults.port);

        let delay = match parse_var::<u64>(&lookup, "TIMELINE_RECONEXAO_SEGUNDOS")? {
            Some(0) => anyhow::bail!("TIMELINE_RECONEXAO_SEGUNDOS deve ser pelo menos 1"),
            Some(secs) => Duration::from_secs(secs),
            None => defaults.reconnect.delay,
        };
        let max_attempts = match parse_var::<u32>(&lookup, "TIMELINE_MAX_RECONEXOES")? {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.reconnect.max_attempts,
        };

        let simulated = match lookup("TIMELINE_SIMULADO") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("TIMELINE_SIMULADO inválido: {raw:?}"))?,
            None => defaults.simulated,
        };

        Ok(Self {
            api_url,
            host,
            port,
            reconnect: ReconnectPolicy {
                delay,
                max_attempts,
            },
            simulated,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} inválido: {raw:?}"))
        })
        .transpose()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "sim" | "yes" => Some(true),
        "0" | "false" | "nao" | "não" | "no" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_env() {
        assert_eq!(settings(&[]).unwrap(), Settings::default());
        assert_eq!(Settings::default().bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn overrides_from_env() {
        let s = settings(&[
            ("PNCP_API_URL", "http://api.local:9000/"),
            ("PORT", "8080"),
            ("TIMELINE_RECONEXAO_SEGUNDOS", "2"),
            ("TIMELINE_MAX_RECONEXOES", "0"),
            ("TIMELINE_SIMULADO", "true"),
        ])
        .unwrap();
        assert_eq!(s.api_url, "http://api.local:9000");
        assert_eq!(s.port, 8080);
        assert_eq!(s.reconnect.delay, Duration::from_secs(2));
        assert_eq!(s.reconnect.max_attempts, None);
        assert!(s.simulated);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(settings(&[("PORT", "porta")]).is_err());
        assert!(settings(&[("TIMELINE_SIMULADO", "talvez")]).is_err());
    }

    /// Atraso zero com reconexão ilimitada viraria um loop apertado.
    #[test]
    fn zero_reconnect_delay_is_rejected() {
        assert!(settings(&[("TIMELINE_RECONEXAO_SEGUNDOS", "0")]).is_err());
        assert!(settings(&[
            ("TIMELINE_RECONEXAO_SEGUNDOS", "0"),
            ("TIMELINE_MAX_RECONEXOES", "0"),
        ])
        .is_err());
    }
}
