//! End-to-end plugin calls over a real Unix socket.

use std::path::Path;
use std::time::Duration;

use libvolume::protocol::PLUGIN_CONTENT_TYPE;
use libvolume::{PluginServer, Registry};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::common::{StoreKind, registry};

/// Send one HTTP/1.1 request and return the status code and JSON body.
async fn post(socket: &Path, method: &str, body: &str) -> (u16, Value) {
    let mut stream = UnixStream::connect(socket).await.unwrap();
    let request = format!(
        "POST /{method} HTTP/1.1\r\n\
         Host: plugin\r\n\
         Content-Type: {PLUGIN_CONTENT_TYPE}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();
    let (head, payload) = text.split_once("\r\n\r\n").unwrap();
    let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
    (status, serde_json::from_str(payload).unwrap())
}

async fn wait_for(path: &Path) {
    for _ in 0..200 {
        if tokio::fs::metadata(path).await.is_ok_and(|m| !m.is_file()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("socket {} never appeared", path.display());
}

#[tokio::test(flavor = "multi_thread")]
async fn serves_plugin_calls_over_unix_socket() {
    let tmp = tempfile::tempdir().unwrap();
    let socket_dir = tmp.path().join("plugins");
    let socket = PluginServer::<Registry>::socket_path_for(&socket_dir, "rkvol");

    // A stale file from a previous run must not block startup.
    std::fs::create_dir_all(&socket_dir).unwrap();
    std::fs::write(&socket, b"stale").unwrap();

    let volumes = tmp.path().join("volumes");
    let server = PluginServer::new(socket.clone(), registry(StoreKind::Disk, &volumes));
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let task = tokio::spawn(server.serve(async move {
        let _ = stop_rx.await;
    }));
    wait_for(&socket).await;

    let (status, body) = post(&socket, "Plugin.Activate", "").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"Implements": ["VolumeDriver"]}));

    let (status, _) = post(&socket, "VolumeDriver.Create", r#"{"Name":"db","Opts":null}"#).await;
    assert_eq!(status, 200);
    assert!(volumes.join("db").is_dir());

    let (status, body) = post(&socket, "VolumeDriver.Mount", r#"{"Name":"db","ID":"ctr-1"}"#).await;
    assert_eq!(status, 200);
    assert_eq!(body["Mountpoint"], volumes.join("db").display().to_string());

    let (status, body) = post(&socket, "VolumeDriver.Remove", r#"{"Name":"db"}"#).await;
    assert_eq!(status, 500);
    assert!(body["Err"].as_str().unwrap().contains("in use"));

    let (status, _) = post(&socket, "VolumeDriver.Unmount", r#"{"Name":"db","ID":"ctr-1"}"#).await;
    assert_eq!(status, 200);
    let (status, _) = post(&socket, "VolumeDriver.Remove", r#"{"Name":"db"}"#).await;
    assert_eq!(status, 200);
    assert!(!volumes.join("db").exists());

    stop_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
    assert!(!socket.exists());
}
