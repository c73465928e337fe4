//! echopost-send - pushes sample records into a running agent.

use clap::Parser;
use echopost_core::{AgentPaths, DEFAULT_BASE_DIR};
use echopost_ipc::IngestClient;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

const CALL_TIMEOUT: Duration = Duration::from_secs(2);
const PIPELINE: &str = "test-pipeline";

#[derive(Parser)]
#[command(name = "echopost-send")]
#[command(about = "Send sample records to a local echopost agent")]
struct Cli {
    /// Agent base directory; the socket is looked up inside it
    #[arg(long, env = "ECHOPOST_BASE_DIR", default_value = DEFAULT_BASE_DIR)]
    base_dir: PathBuf,

    /// Number of records to send
    #[arg(long, default_value_t = 10)]
    count: u32,

    /// Pause between sends, in milliseconds
    #[arg(long, default_value_t = 300)]
    interval_ms: u64,
}

fn emit(event: &str, fields: serde_json::Value) {
    let mut line = json!({ "event": event });
    if let (Some(obj), serde_json::Value::Object(fields)) = (line.as_object_mut(), fields) {
        obj.extend(fields);
    }
    println!("{line}");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let socket = AgentPaths::with_base_dir(cli.base_dir).socket_file();
    let client = IngestClient::new(&socket);
    let pipelines = vec![PIPELINE.to_string()];

    let mut sent = 0u32;
    for i in 0..cli.count {
        let record = json!({ "msg": format!("log message {i}"), "level": "INFO" }).to_string();

        match tokio::time::timeout(CALL_TIMEOUT, client.send_log(&record, &pipelines)).await {
            Ok(Ok(result)) if result.success => {
                sent += 1;
                emit("send_success", json!({ "index": i, "message": result.message }));
            }
            Ok(Ok(result)) => emit("send_error", json!({ "index": i, "error": result.message })),
            Ok(Err(e)) => emit("send_error", json!({ "index": i, "error": e.to_string() })),
            Err(_) => emit("send_error", json!({ "index": i, "error": "timed out" })),
        }

        if i + 1 < cli.count {
            tokio::time::sleep(Duration::from_millis(cli.interval_ms)).await;
        }
    }

    emit("client_done", json!({ "sent": sent, "total": cli.count }));
    Ok(())
}
