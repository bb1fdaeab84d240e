//! TCP server for the collection namespace.
//!
//! Each accepted connection runs in its own task and reads newline-delimited
//! [`Request`]s, answering each with one [`Response`] line. A bad line gets an
//! error response; only I/O failure or an oversized line closes the
//! connection.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use docfs_kernel::store::MemoryDatabase;
use docfs_kernel::{CollectionError, Collections, Node, TreeFs, VfsOps};

use crate::config::ServerConfig;
use crate::constants::MAX_REQUEST_LINE;
use crate::protocol::{ProtocolError, Request, Response};
use crate::seed::{self, SeedError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error("failed to mount collections: {0}")]
    Mount(#[from] CollectionError),
}

/// The database and the file tree served over it.
#[derive(Debug)]
pub struct Namespace {
    pub db: Arc<MemoryDatabase>,
    pub collections: Arc<Collections>,
    pub fs: TreeFs,
}

impl Namespace {
    /// Create the database (seeded if configured) and mount its collections
    /// under a fresh root.
    pub async fn build(config: &ServerConfig) -> Result<Self, StartupError> {
        let db = Arc::new(MemoryDatabase::new());
        if let Some(path) = &config.seed {
            seed::load(&db, path).await?;
        }

        let root = Node::root();
        let collections = Collections::mount(&root, &config.mount, db.clone()).await?;
        info!(
            "database {}: {} collections under /{}",
            config.database,
            collections.len(),
            config.mount
        );

        Ok(Self {
            db,
            collections,
            fs: TreeFs::new(root),
        })
    }
}

/// Execute one request against `fs`.
pub async fn dispatch(fs: &dyn VfsOps, request: Request) -> Response {
    let result = match &request {
        Request::Stat { path } => fs.getattr(Path::new(path)).await.map(Response::attr),
        Request::List { path } => fs.readdir(Path::new(path)).await.map(Response::entries),
        Request::Open {
            path,
            write,
            truncate,
        } => fs
            .open(Path::new(path), Request::open_flags(*write, *truncate))
            .await
            .map(|()| Response::ok()),
        Request::Read {
            path,
            offset,
            count,
        } => fs
            .read(Path::new(path), *offset, *count)
            .await
            .map(Response::data),
        Request::Write { path, offset, data } => fs
            .write(Path::new(path), *offset, data)
            .await
            .map(Response::written),
        Request::Mkdir { path, mode } => fs.mkdir(Path::new(path), *mode).await.map(Response::attr),
    };

    result.unwrap_or_else(|e| {
        debug!("{}: {}", request.path(), e);
        Response::from_error(&e)
    })
}

/// Listening server.
pub struct Server {
    listener: TcpListener,
    fs: TreeFs,
}

impl Server {
    pub async fn bind(addr: SocketAddr, fs: TreeFs) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, fs })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` completes.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("listening on {}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let fs = self.fs.clone();
                        tokio::spawn(async move {
                            debug!("connection from {}", peer);
                            if let Err(e) = serve_connection(stream, &fs).await {
                                warn!("connection {} closed: {}", peer, e);
                            } else {
                                debug!("connection {} closed", peer);
                            }
                        });
                    }
                    Err(e) => warn!("accept failed: {}", e),
                },
            }
        }
    }

    /// Accept connections forever.
    pub async fn run(self) -> std::io::Result<()> {
        self.run_until(std::future::pending()).await
    }
}

/// Serve requests on one connection until the peer hangs up.
pub async fn serve_connection(stream: TcpStream, fs: &TreeFs) -> Result<(), ProtocolError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = (&mut reader)
            .take(MAX_REQUEST_LINE as u64)
            .read_until(b'\n', &mut line)
            .await?;
        if n == 0 {
            return Ok(());
        }
        if line.last() != Some(&b'\n') && n == MAX_REQUEST_LINE {
            let err = ProtocolError::LineTooLong {
                limit: MAX_REQUEST_LINE,
            };
            writer.write_all(&Response::failure(err.to_string()).encode()).await?;
            return Err(err);
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let response = match Request::parse(&line) {
            Ok(request) => dispatch(fs, request).await,
            Err(e) => Response::failure(e.to_string()),
        };
        writer.write_all(&response.encode()).await?;
    }
}
