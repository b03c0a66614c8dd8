//! # Templates HTML — Renderização Server-Side com Maud
//!
//! Templates compilados em tempo de build via macro `html!` do Maud. A
//! página é montada no servidor e o HTMX recarrega só o painel da
//! timeline quando o stream `/timeline/stream` avisa de uma mudança.
//!
//! ## Estrutura da Página
//!
//! ```text
//! full_page(view, auto_scroll)
//!   ├── <head> Tailwind + Font Awesome + HTMX
//!   ├── Controles: Executar Agora · Parar · Limpar · Auto-scroll
//!   ├── timeline_panel(view)
//!   │   ├── connection_badge(state)
//!   │   ├── progress_bar(progress)
//!   │   └── #timeline-container
//!   │       ├── timeline_item(evento)   (um por evento, em ordem)
//!   │       └── empty_state()           (quando não há eventos)
//!   └── <script> EventSource('/timeline/stream') → htmx.ajax
//! ```
//!
//! ## Classes por Tipo de Evento
//!
//! | Tipo | Container | Ícone |
//! |------|-----------|-------|
//! | `info` | `bg-blue-50 border-blue-400` | `fa-info-circle` |
//! | `success` | `bg-green-50 border-green-400` | `fa-check-circle` |
//! | `warning` | `bg-yellow-50 border-yellow-400` | `fa-exclamation-triangle` |
//! | `error` | `bg-red-50 border-red-400` | `fa-times-circle` |
//! | `progress` | `bg-purple-50 border-purple-400` | `fa-spinner fa-spin` |
//!
//! Tipos desconhecidos usam as classes de `info`.

use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::timeline::{ConnectionState, EventKind, TimelineEvent, TimelineView};

/// Conjunto de classes Tailwind de um tipo de evento.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KindStyle {
    pub container: &'static str,
    pub icon_background: &'static str,
    pub text: &'static str,
    pub icon: &'static str,
}

const INFO_STYLE: KindStyle = KindStyle {
    container: "bg-blue-50 border-l-4 border-blue-400",
    icon_background: "bg-blue-100 text-blue-600",
    text: "text-blue-800",
    icon: "fas fa-info-circle",
};

pub fn kind_style(kind: &EventKind) -> KindStyle {
    match kind {
        EventKind::Info | EventKind::Other(_) => INFO_STYLE,
        EventKind::Success => KindStyle {
            container: "bg-green-50 border-l-4 border-green-400",
            icon_background: "bg-green-100 text-green-600",
            text: "text-green-800",
            icon: "fas fa-check-circle",
        },
        EventKind::Warning => KindStyle {
            container: "bg-yellow-50 border-l-4 border-yellow-400",
            icon_background: "bg-yellow-100 text-yellow-600",
            text: "text-yellow-800",
            icon: "fas fa-exclamation-triangle",
        },
        EventKind::Error => KindStyle {
            container: "bg-red-50 border-l-4 border-red-400",
            icon_background: "bg-red-100 text-red-600",
            text: "text-red-800",
            icon: "fas fa-times-circle",
        },
        EventKind::Progress => KindStyle {
            container: "bg-purple-50 border-l-4 border-purple-400",
            icon_background: "bg-purple-100 text-purple-600",
            text: "text-purple-800",
            icon: "fas fa-spinner fa-spin",
        },
    }
}

/// Rótulo e cor do indicador de conexão.
fn connection_label(state: ConnectionState) -> (&'static str, &'static str) {
    match state {
        ConnectionState::Idle => ("Parado", "bg-gray-400"),
        ConnectionState::Connecting => ("Conectando...", "bg-yellow-400 animate-pulse"),
        ConnectionState::Open => ("Conectado", "bg-green-500"),
        ConnectionState::Error => ("Reconectando...", "bg-red-500 animate-pulse"),
        ConnectionState::Closed => ("Encerrado", "bg-gray-500"),
    }
}

/// `HH:MM:SS` no fuso local.
pub fn format_time(event: &TimelineEvent) -> String {
    event
        .timestamp
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S")
        .to_string()
}

/// Página completa: controles + painel da timeline + script do stream.
pub fn full_page(view: &TimelineView, auto_scroll: bool) -> Markup {
    html! {
        (DOCTYPE)
        html lang="pt-BR" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "PNCP Editais — Timeline de Extração" }
                script src="https://cdn.tailwindcss.com" {}
                link rel="stylesheet"
                    href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css";
                script src="https://unpkg.com/htmx.org@2.0.4" {}
            }
            body class="bg-gray-100 min-h-screen" {
                main class="max-w-4xl mx-auto py-8 px-4 space-y-6" {
                    header class="flex items-center justify-between" {
                        h1 class="text-2xl font-bold text-gray-800" {
                            i class="fas fa-stream mr-2 text-blue-600" {}
                            "Timeline de Extração"
                        }
                        div class="flex items-center space-x-2" {
                            button class="px-3 py-2 bg-blue-600 text-white text-sm rounded-lg hover:bg-blue-700"
                                hx-post="/extracao/executar"
                                hx-target="#timeline-panel"
                                hx-swap="outerHTML" {
                                i class="fas fa-play mr-1" {}
                                "Executar Agora"
                            }
                            button class="px-3 py-2 bg-white border text-sm rounded-lg hover:bg-gray-50"
                                hx-post="/timeline/parar"
                                hx-target="#timeline-panel"
                                hx-swap="outerHTML" {
                                i class="fas fa-stop mr-1 text-red-500" {}
                                "Parar"
                            }
                            button class="px-3 py-2 bg-white border text-sm rounded-lg hover:bg-gray-50"
                                hx-post="/timeline/limpar"
                                hx-target="#timeline-panel"
                                hx-swap="outerHTML" {
                                i class="fas fa-trash mr-1 text-gray-500" {}
                                "Limpar"
                            }
                            (autoscroll_button(auto_scroll))
                        }
                    }

                    (timeline_panel(view))
                }

                (PreEscaped(STREAM_SCRIPT))
            }
        }
    }
}

/// Fragment `#timeline-panel`, trocado inteiro via `hx-swap="outerHTML"`.
pub fn timeline_panel(view: &TimelineView) -> Markup {
    html! {
        section #timeline-panel class="bg-white rounded-xl shadow p-6 space-y-4"
            data-task-id=[view.task_id.as_ref().map(|id| id.as_str())] {
            div class="flex items-center justify-between" {
                div class="text-sm text-gray-600" {
                    @if let Some(task_id) = &view.task_id {
                        "Tarefa " code class="font-mono text-gray-800" { (task_id.as_str()) }
                    } @else {
                        "Nenhuma tarefa em acompanhamento"
                    }
                }
                (connection_badge(view.state))
            }

            (progress_bar(view.progress))

            div #timeline-container class="space-y-2 max-h-[32rem] overflow-y-auto" {
                @if view.events.is_empty() {
                    (empty_state())
                } @else {
                    @for event in view.events.iter() {
                        (timeline_item(event))
                    }
                }
            }
        }
    }
}

pub fn timeline_item(event: &TimelineEvent) -> Markup {
    let style = kind_style(&event.kind);
    let summary = event.data.summary();

    html! {
        div class={ "timeline-item flex items-start space-x-3 p-3 rounded " (style.container) }
            data-kind=(event.kind.as_str()) {
            div class={ "flex-shrink-0 w-8 h-8 rounded-full flex items-center justify-center " (style.icon_background) } {
                i class={ (style.icon) " text-sm" } {}
            }
            div class="flex-1 min-w-0" {
                div class="flex items-center justify-between" {
                    p class={ "text-sm font-medium " (style.text) } { (event.message) }
                    span class="text-xs text-gray-500" { (format_time(event)) }
                }
                @if !summary.is_empty() {
                    div class="mt-1 text-xs text-gray-600" { (summary) }
                }
            }
        }
    }
}

pub fn progress_bar(progress: f64) -> Markup {
    html! {
        div class="space-y-1" {
            div class="flex justify-between text-xs text-gray-600" {
                span { "Progresso" }
                span #progress-text { (progress) "%" }
            }
            div class="w-full bg-gray-200 rounded-full h-2" {
                div #progress-bar class="bg-blue-600 h-2 rounded-full transition-all duration-300"
                    style={ "width: " (progress) "%" } {}
            }
        }
    }
}

pub fn connection_badge(state: ConnectionState) -> Markup {
    let (label, dot) = connection_label(state);
    html! {
        span #connection-status class="inline-flex items-center text-xs text-gray-600"
            data-state=(state.as_str()) {
            span class={ "inline-block w-2 h-2 rounded-full mr-2 " (dot) } {}
            (label)
        }
    }
}

pub fn autoscroll_button(enabled: bool) -> Markup {
    html! {
        button #autoscroll-toggle
            class="px-3 py-2 bg-white border text-sm rounded-lg hover:bg-gray-50"
            data-enabled=(if enabled { "true" } else { "false" })
            hx-post="/timeline/autoscroll"
            hx-swap="outerHTML" {
            i class="fas fa-arrows-alt-v mr-1" {}
            @if enabled { "Auto-scroll: on" } @else { "Auto-scroll: off" }
        }
    }
}

fn empty_state() -> Markup {
    html! {
        div #timeline-empty class="text-center py-8 text-gray-500" {
            i class="fas fa-clock text-4xl mb-4" {}
            p class="text-lg font-medium" { "Aguardando início da extração" }
            p class="text-sm" { "A timeline será atualizada em tempo real" }
        }
    }
}

/// Cada `TimelineUpdate` recarrega o painel; em `Appended` o log rola até
/// o fim se o botão de auto-scroll estiver ligado.
const STREAM_SCRIPT: &str = r#"<script>
(function() {
  function autoScrollEnabled() {
    var btn = document.getElementById('autoscroll-toggle');
    return btn && btn.dataset.enabled === 'true';
  }

  function scrollToEnd() {
    var c = document.getElementById('timeline-container');
    if (c) c.scrollTop = c.scrollHeight;
  }

  var es = new EventSource('/timeline/stream');
  es.onmessage = function(e) {
    try {
      var update = JSON.parse(e.data);
      htmx.ajax('GET', '/timeline', { target: '#timeline-panel', swap: 'outerHTML' })
        .then(function() {
          if (update.kind === 'Appended' && autoScrollEnabled()) scrollToEnd();
        });
    } catch(err) {}
  };
})();
</script>"#;
