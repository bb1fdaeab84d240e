//! Drives a running server over TCP.

use std::io::Write as _;
use std::net::SocketAddr;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;

use docfs_server::{Namespace, Response, Server, ServerConfig};

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let (reader, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send_raw(&mut self, line: &[u8]) -> Response {
        self.writer.write_all(line).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        let mut reply = String::new();
        self.reader.read_line(&mut reply).await.unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    async fn send(&mut self, request: Value) -> Response {
        self.send_raw(request.to_string().as_bytes()).await
    }

    async fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> Response {
        use base64::Engine as _;
        let data = base64::engine::general_purpose::STANDARD.encode(data);
        self.send(json!({"op": "write", "path": path, "offset": offset, "data": data}))
            .await
    }

    async fn read_documents(&mut self, collection: &str) -> Value {
        let path = format!("/collections/{collection}/documents");
        let response = self.send(json!({"op": "open", "path": path})).await;
        assert!(response.ok, "{:?}", response.error);
        let response = self
            .send(json!({"op": "read", "path": path, "offset": 0, "count": 1 << 20}))
            .await;
        serde_json::from_slice(&response.data.unwrap()).unwrap()
    }
}

/// Start a server on an ephemeral port; dropping the sender stops it.
async fn start(config: ServerConfig) -> (SocketAddr, Namespace, oneshot::Sender<()>) {
    let namespace = Namespace::build(&config).await.unwrap();
    let server = Server::bind(config.bind_addr, namespace.fs.clone())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));
    (addr, namespace, tx)
}

fn seeded_config() -> (ServerConfig, tempfile::NamedTempFile) {
    let mut seed = tempfile::NamedTempFile::new().unwrap();
    let data = json!({
        "people": [{"name": "ada", "born": 1815}, {"name": "grace", "born": 1906}],
        "orders": [],
    });
    seed.write_all(data.to_string().as_bytes()).unwrap();

    let mut config = ServerConfig::ephemeral();
    config.seed = Some(seed.path().to_path_buf());
    (config, seed)
}

#[tokio::test]
async fn test_seeded_namespace_is_listed() {
    let (config, _seed) = seeded_config();
    let (addr, _ns, _stop) = start(config).await;
    let mut client = Client::connect(addr).await;

    let response = client.send(json!({"op": "list", "path": "/collections"})).await;
    let names: Vec<String> = response.entries.unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["orders", "people"]);

    let docs = client.read_documents("people").await;
    assert_eq!(docs.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_query_then_update_over_the_wire() {
    let (config, _seed) = seeded_config();
    let (addr, ns, _stop) = start(config).await;
    let mut client = Client::connect(addr).await;

    let response = client
        .write("/collections/people/query", 0, br#"{"born": {"$lt": 1900}}"#)
        .await;
    assert!(response.ok);

    let docs = client.read_documents("people").await;
    assert_eq!(docs.as_array().unwrap().len(), 1);
    let id = docs[0]["_id"].as_str().unwrap().to_string();

    let edited = json!([{"_id": id, "name": "ada lovelace", "born": 1815}]);
    client
        .send(json!({"op": "open", "path": "/collections/people/documents", "truncate": true}))
        .await;
    let body = edited.to_string();
    let response = client
        .write("/collections/people/documents", 0, body.as_bytes())
        .await;
    assert_eq!(response.written, Some(body.len() as u32));

    let docs = client.read_documents("people").await;
    assert_eq!(docs[0]["name"], json!("ada lovelace"));
    assert_eq!(ns.db.memory_collection("people").len(), 2);
}

#[tokio::test]
async fn test_bad_lines_keep_connection_open() {
    let (addr, _ns, _stop) = start(ServerConfig::ephemeral()).await;
    let mut client = Client::connect(addr).await;

    let response = client.send_raw(b"this is not json").await;
    assert!(!response.ok);
    let response = client.send(json!({"op": "chmod", "path": "/"})).await;
    assert!(!response.ok);

    let response = client.send(json!({"op": "stat", "path": "/"})).await;
    assert!(response.ok);
}

#[tokio::test]
async fn test_mkdir_then_partial_write_error() {
    let (addr, _ns, _stop) = start(ServerConfig::ephemeral()).await;
    let mut client = Client::connect(addr).await;

    let response = client
        .send(json!({"op": "mkdir", "path": "/collections/fresh"}))
        .await;
    assert!(response.ok, "{:?}", response.error);

    let response = client
        .write("/collections/fresh/documents", 0, br#"[{"a": "#)
        .await;
    assert!(!response.ok);
    assert_eq!(response.written, Some(7));

    // The rest of the batch completes it.
    let response = client
        .write("/collections/fresh/documents", 7, b"1}]")
        .await;
    assert_eq!(response.written, Some(3));
    let docs = client.read_documents("fresh").await;
    assert_eq!(docs[0]["a"], json!(1));
}

#[tokio::test]
async fn test_clients_are_served_concurrently() {
    let (config, _seed) = seeded_config();
    let (addr, _ns, _stop) = start(config).await;

    // A connection that never sends anything does not hold up others.
    let _idle = TcpStream::connect(addr).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        tasks.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await;
            client.read_documents("people").await
        }));
    }
    for task in tasks {
        let docs = tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(docs.as_array().unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_config_file_drives_mount_name() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "bind_addr = \"127.0.0.1:0\"").unwrap();
    writeln!(file, "mount = \"db\"").unwrap();

    let config = ServerConfig::load(file.path()).unwrap();
    let (addr, _ns, _stop) = start(config).await;
    let mut client = Client::connect(addr).await;

    let response = client.send(json!({"op": "stat", "path": "/db"})).await;
    assert!(response.ok);
    let response = client.send(json!({"op": "stat", "path": "/collections"})).await;
    assert!(!response.ok);
}
