use crate::lifecycle::{ActionRequest, CreateRequest, Lifecycle};
use anyhow::Result;
use cw_core::error::LifecycleError;
use cw_core::handler::LogKind;
use cw_core::settings::ProjectSettings;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{error, info};

pub const SOCKET_PATH: &str = "/tmp/cw-server.sock";

/// One request per connection; the verbs map 1:1 onto the lifecycle entry
/// points.
#[derive(Debug, Deserialize)]
pub enum IpcRequest {
    Ping,
    Create(CreateRequest),
    Delete {
        #[serde(rename = "projectID")]
        project_id: String,
    },
    Action(ActionRequest),
    Specification {
        #[serde(rename = "projectID")]
        project_id: String,
        settings: ProjectSettings,
    },
    Logs {
        #[serde(rename = "projectID")]
        project_id: String,
    },
    CheckNewLogFile {
        #[serde(rename = "projectID")]
        project_id: String,
        kind: LogKind,
    },
    Shutdown,
}

#[derive(Debug, Serialize)]
pub struct IpcResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl IpcResponse {
    fn ok(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    fn from_error(err: &LifecycleError) -> Self {
        Self {
            status: err.status_code(),
            body: Some(json!({ "error": err.to_string() })),
        }
    }
}

pub async fn run_ipc_server(
    lifecycle: Lifecycle,
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
) -> Result<()> {
    if std::fs::metadata(SOCKET_PATH).is_ok() {
        std::fs::remove_file(SOCKET_PATH)?;
    }

    let listener = UnixListener::bind(SOCKET_PATH)?;
    info!("IPC server listening on {SOCKET_PATH}");

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let lifecycle = lifecycle.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, lifecycle, shutdown_tx).await {
                        error!("error handling connection: {e}");
                    }
                });
            }
            Err(e) => error!("error accepting connection: {e}"),
        }
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    lifecycle: Lifecycle,
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
) -> Result<()> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    if buf.is_empty() {
        return Ok(());
    }

    let request: IpcRequest = match serde_json::from_slice(&buf) {
        Ok(request) => request,
        Err(e) => {
            let response = IpcResponse::ok(400, json!({ "error": format!("malformed request: {e}") }));
            stream.write_all(&serde_json::to_vec(&response)?).await?;
            return Ok(());
        }
    };
    info!("received request: {request:?}");

    let response = dispatch(request, &lifecycle, &shutdown_tx).await;
    stream.write_all(&serde_json::to_vec(&response)?).await?;
    Ok(())
}

async fn dispatch(
    request: IpcRequest,
    lifecycle: &Lifecycle,
    shutdown_tx: &tokio::sync::mpsc::Sender<()>,
) -> IpcResponse {
    match request {
        IpcRequest::Ping => IpcResponse::ok(200, json!("pong")),
        IpcRequest::Create(req) => match lifecycle.create(req).await {
            Ok(accepted) => IpcResponse::ok(accepted.status_code, json!(accepted)),
            Err(e) => IpcResponse::from_error(&e),
        },
        IpcRequest::Delete { project_id } => match lifecycle.delete(&project_id).await {
            Ok(accepted) => IpcResponse::ok(accepted.status_code, json!(accepted)),
            Err(e) => IpcResponse::from_error(&e),
        },
        IpcRequest::Action(req) => match lifecycle.action(req).await {
            Ok(response) => IpcResponse::ok(response.status_code, json!(response)),
            Err(e) => IpcResponse::from_error(&e),
        },
        IpcRequest::Specification {
            project_id,
            settings,
        } => match lifecycle.specification(&project_id, settings).await {
            Ok(accepted) => IpcResponse::ok(accepted.status_code, json!(accepted)),
            Err(e) => IpcResponse::from_error(&e),
        },
        IpcRequest::Logs { project_id } => match lifecycle.logs(&project_id).await {
            Ok(response) => IpcResponse::ok(response.status_code, json!(response)),
            Err(e) => IpcResponse::from_error(&e),
        },
        IpcRequest::CheckNewLogFile { project_id, kind } => {
            match lifecycle.check_new_log_file(&project_id, kind).await {
                Ok(response) => IpcResponse::ok(response.status_code, json!(response)),
                Err(e) => IpcResponse::from_error(&e),
            }
        }
        IpcRequest::Shutdown => {
            let response = match lifecycle.shutdown().await {
                Ok(status) => IpcResponse::ok(status, json!({ "shutdown": true })),
                Err(e) => IpcResponse::from_error(&e),
            };
            let _ = shutdown_tx.send(()).await;
            response
        }
    }
}
