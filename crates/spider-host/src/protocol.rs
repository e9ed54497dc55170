//! Line-delimited JSON protocol spoken with the extension.
//!
//! Inbound, each line is one command object tagged by `action`, plus an
//! optional `id` the reply echoes. Outbound, each line is one [`Outbound`]
//! message: a reply to a command, or an unsolicited event.

use serde::Serialize;
use serde_json::Value;
use spider_core::{AuthSession, Response, Router};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Outbound {
    Response {
        id: Value,
        success: bool,
        response: Response,
    },
    StateUpdated {
        state: AuthSession,
    },
    OpenSurface {
        url: String,
    },
}

impl Outbound {
    pub fn reply(id: Value, response: Response) -> Self {
        Outbound::Response {
            id,
            success: response.is_success(),
            response,
        }
    }
}

/// Split a raw line into its correlation id and the command body.
pub fn parse_inbound(line: &str) -> Result<(Value, Value), String> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| format!("Invalid message: {}", e))?;
    let Value::Object(mut body) = value else {
        return Err("Invalid message: expected a JSON object".to_string());
    };
    let id = body.remove("id").unwrap_or(Value::Null);
    Ok((id, Value::Object(body)))
}

/// Route one inbound line and build its reply.
pub async fn handle_line(router: &Router, line: &str) -> Outbound {
    match parse_inbound(line) {
        Ok((id, command)) => Outbound::reply(id, router.dispatch_value(command).await),
        Err(error) => {
            warn!(error = %error, "Dropping unparseable message");
            Outbound::reply(Value::Null, Response::failure(error))
        }
    }
}

/// Serialize outbound messages one per line until every sender is gone.
pub async fn write_loop<W>(
    out: &mut W,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        out.flush().await?;
    }
    debug!("Outbound channel closed");
    Ok(())
}
