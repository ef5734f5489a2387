//! Reenvío de logs importantes a un canal de Discord.
//!
//! [`ChannelLogLayer`] es una capa de `tracing` que copia los eventos a partir
//! de cierto nivel a un canal interno; [`LogForwarder`] los publica a través
//! de un [`LogSink`]. La tarea del forwarder publica dentro de
//! [`FORWARDING`], y la capa descarta los eventos emitidos en ese ámbito, así
//! un fallo al publicar nunca vuelve a entrar en la capa. Los eventos de
//! otras tareas siguen pasando mientras tanto.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    fmt::{self, Write as _},
    sync::Arc,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{
    debug,
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{layer::Context, Layer};

/// Targets que nunca se reenvían: el propio forwarder y el cliente HTTP
/// que usa para publicar.
const IGNORED_TARGETS: &[&str] = &[
    module_path!(),
    "serenity::http",
    "reqwest",
    "hyper",
    "h2",
    "rustls",
];

tokio::task_local! {
    /// Activo sólo dentro de la tarea que publica un registro
    pub static FORWARDING: bool;
}

fn is_forwarding() -> bool {
    FORWARDING.try_with(|forwarding| *forwarding).unwrap_or(false)
}

/// Límite de Discord menos margen para el bloque de código
const MAX_MESSAGE_LEN: usize = 1900;

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Mensaje listo para Discord, en un bloque de código
    pub fn to_discord_message(&self) -> String {
        let mut body = format!(
            "[{}] {} {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.level,
            self.target,
            self.message
        );

        if body.len() > MAX_MESSAGE_LEN {
            let mut cut = MAX_MESSAGE_LEN;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push('…');
        }

        format!("```\n{}\n```", body)
    }
}

/// Destino de los logs reenviados
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn send(&self, record: &LogRecord) -> anyhow::Result<()>;
}

pub struct ChannelLogLayer {
    min_level: Level,
    sender: UnboundedSender<LogRecord>,
}

pub struct LogForwarder {
    receiver: UnboundedReceiver<LogRecord>,
}

/// Crea la capa y el forwarder que vacía su canal
pub fn channel_log(min_level: Level) -> (ChannelLogLayer, LogForwarder) {
    let (sender, receiver) = mpsc::unbounded_channel();

    (
        ChannelLogLayer { min_level, sender },
        LogForwarder { receiver },
    )
}

impl<S: Subscriber> Layer<S> for ChannelLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        // En tracing los niveles más verbosos son "mayores"
        if *metadata.level() > self.min_level {
            return;
        }

        if is_forwarding() {
            return;
        }

        if IGNORED_TARGETS
            .iter()
            .any(|target| metadata.target().starts_with(target))
        {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let _ = self.sender.send(LogRecord {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.finish(),
            timestamp: Utc::now(),
        });
    }
}

impl LogForwarder {
    /// Publica cada registro hasta que se cierre la capa
    pub async fn run(mut self, sink: Arc<dyn LogSink>) {
        while let Some(record) = self.receiver.recv().await {
            let sent = FORWARDING.scope(true, sink.send(&record)).await;

            if let Err(e) = sent {
                debug!("No se pudo reenviar log a Discord: {:?}", e);
            }
        }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
