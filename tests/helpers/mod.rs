// tests/helpers/mod.rs

//! Test helpers: an in-memory fake FTP server, scripted sessions with
//! failure injection, and a factory that counts connects.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ftpbridge::config::{ConnectionPolicy, PoolConfig};
use ftpbridge::connection::{ConnectionKey, ConnectionRegistry};
use ftpbridge::core::FtpBridgeError;
use ftpbridge::core::protocol::{Credentials, DirEntry, Endpoint, FtpSession, SessionFactory};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The shared state of the fake remote server. Every session created by the
/// factory talks to the same instance, so tests can inspect one command log
/// and flip failure switches mid-flight.
pub struct MockServer {
    pub files: HashMap<String, Vec<u8>>,
    /// Every command observed, in execution order, tagged by session id.
    pub op_log: Vec<String>,
    /// Sessions whose control channel should behave as silently dropped.
    pub dead_sessions: HashSet<usize>,
    /// Sessions that were explicitly closed with QUIT.
    pub closed_sessions: Vec<usize>,
    /// Reject NOOP with a 500 reply, like servers that never learned it.
    pub reject_noop: bool,
    /// Fail all PWD commands, to force probes onto their fallback.
    pub fail_pwd: bool,
    /// Fail all LIST commands.
    pub fail_list: bool,
    /// Hold every command for this long, to provoke interleaving.
    pub op_delay: Duration,
    /// Hold every QUIT for this long, to keep a teardown suspended.
    pub close_delay: Duration,
    in_flight: usize,
    /// High-water mark of concurrently executing commands on this server.
    pub max_in_flight: usize,
}

impl MockServer {
    pub fn new() -> SharedServer {
        Arc::new(Mutex::new(Self {
            files: HashMap::new(),
            op_log: Vec::new(),
            dead_sessions: HashSet::new(),
            closed_sessions: Vec::new(),
            reject_noop: false,
            fail_pwd: false,
            fail_list: false,
            op_delay: Duration::ZERO,
            close_delay: Duration::ZERO,
            in_flight: 0,
            max_in_flight: 0,
        }))
    }
}

pub type SharedServer = Arc<Mutex<MockServer>>;

/// Marks a session's control channel as dead; every subsequent command on it
/// fails the way a silently dropped connection does.
pub fn kill_session(server: &SharedServer, id: usize) {
    server.lock().unwrap().dead_sessions.insert(id);
}

pub fn op_log(server: &SharedServer) -> Vec<String> {
    server.lock().unwrap().op_log.clone()
}

pub fn put_file(server: &SharedServer, path: &str, bytes: &[u8]) {
    server
        .lock()
        .unwrap()
        .files
        .insert(path.to_string(), bytes.to_vec());
}

/// Fixed mtime reported for every listed file.
pub fn mock_mtime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 0).unwrap()
}

pub struct MockSession {
    pub id: usize,
    server: SharedServer,
}

impl MockSession {
    /// Common entry for every command: fail if this session was killed,
    /// otherwise log the command and track concurrency.
    async fn begin(&self, op: &str) -> Result<(), FtpBridgeError> {
        let delay = {
            let mut s = self.server.lock().unwrap();
            if s.dead_sessions.contains(&self.id) {
                s.op_log.push(format!("s{}:{op} !dead", self.id));
                return Err(FtpBridgeError::Protocol("connection reset by peer".into()));
            }
            s.in_flight += 1;
            s.max_in_flight = s.max_in_flight.max(s.in_flight);
            s.op_log.push(format!("s{}:{op}", self.id));
            s.op_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn end(&self) {
        self.server.lock().unwrap().in_flight -= 1;
    }
}

#[async_trait]
impl FtpSession for MockSession {
    async fn working_directory(&mut self) -> Result<String, FtpBridgeError> {
        self.begin("PWD").await?;
        self.end();
        if self.server.lock().unwrap().fail_pwd {
            return Err(FtpBridgeError::Protocol("421 service not available".into()));
        }
        Ok("/".to_string())
    }

    async fn raw_command(&mut self, command: &str) -> Result<String, FtpBridgeError> {
        self.begin(command).await?;
        self.end();
        if command == "NOOP" && self.server.lock().unwrap().reject_noop {
            return Err(FtpBridgeError::Protocol("500 command not understood".into()));
        }
        Ok("200 OK".to_string())
    }

    async fn list(&mut self, path: &str) -> Result<Vec<DirEntry>, FtpBridgeError> {
        self.begin(&format!("LIST {path}")).await?;
        self.end();
        let s = self.server.lock().unwrap();
        if s.fail_list {
            return Err(FtpBridgeError::Protocol("450 listing unavailable".into()));
        }
        let prefix = if path == "/" { "/".to_string() } else { format!("{path}/") };
        let entries = s
            .files
            .iter()
            .filter(|(p, _)| {
                p.starts_with(&prefix) && !p[prefix.len()..].contains('/')
            })
            .map(|(p, bytes)| DirEntry {
                name: p[prefix.len()..].to_string(),
                size: bytes.len() as u64,
                modified_at: Some(mock_mtime()),
                permissions: Some("rw-r--r--".to_string()),
                is_directory: false,
            })
            .collect();
        Ok(entries)
    }

    async fn size(&mut self, path: &str) -> Result<u64, FtpBridgeError> {
        self.begin(&format!("SIZE {path}")).await?;
        self.end();
        self.server
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| FtpBridgeError::Protocol(format!("550 {path}: no such file")))
    }

    async fn download_to(
        &mut self,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        path: &str,
    ) -> Result<(), FtpBridgeError> {
        self.begin(&format!("RETR {path}")).await?;
        self.end();
        let bytes = self
            .server
            .lock()
            .unwrap()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| FtpBridgeError::Protocol(format!("550 {path}: no such file")))?;
        sink.write_all(&bytes).await?;
        Ok(())
    }

    async fn upload_from(
        &mut self,
        source: &mut (dyn AsyncRead + Send + Unpin),
        path: &str,
    ) -> Result<(), FtpBridgeError> {
        self.begin(&format!("STOR {path}")).await?;
        self.end();
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes).await?;
        self.server
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), bytes);
        Ok(())
    }

    async fn close(&mut self) {
        let delay = self.server.lock().unwrap().close_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut s = self.server.lock().unwrap();
        s.op_log.push(format!("s{}:QUIT", self.id));
        s.closed_sessions.push(self.id);
    }
}

/// Creates sessions against a shared `MockServer`, numbering them from 1.
pub struct MockFactory {
    pub server: SharedServer,
    pub connects: AtomicUsize,
    /// The next N connect attempts fail with a login error.
    pub fail_next_connects: AtomicUsize,
    /// Hold each connect for this long, to provoke concurrent reconnects.
    pub connect_delay: Mutex<Duration>,
}

impl MockFactory {
    pub fn new(server: SharedServer) -> Arc<Self> {
        Arc::new(Self {
            server,
            connects: AtomicUsize::new(0),
            fail_next_connects: AtomicUsize::new(0),
            connect_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_next_connects.store(n, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = delay;
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    async fn connect(
        &self,
        _endpoint: &Endpoint,
        _credentials: &Credentials,
        _policy: &ConnectionPolicy,
    ) -> Result<Box<dyn FtpSession>, FtpBridgeError> {
        let delay = *self.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        loop {
            let pending = self.fail_next_connects.load(Ordering::SeqCst);
            if pending == 0 {
                break;
            }
            if self
                .fail_next_connects
                .compare_exchange(pending, pending - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Err(FtpBridgeError::Protocol("530 login incorrect".into()));
            }
        }
        let id = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MockSession {
            id,
            server: Arc::clone(&self.server),
        }))
    }
}

/// A registry wired to a fresh mock server, plus handles for inspection.
pub struct TestPool {
    pub registry: Arc<ConnectionRegistry>,
    pub factory: Arc<MockFactory>,
    pub server: SharedServer,
}

pub fn test_pool() -> TestPool {
    init_tracing();
    let server = MockServer::new();
    let factory = MockFactory::new(Arc::clone(&server));
    let registry = ConnectionRegistry::new(factory.clone(), PoolConfig::default());
    TestPool {
        registry,
        factory,
        server,
    }
}

/// A policy with background cadences pushed out of the way so individual
/// tests control exactly which mechanisms fire.
pub fn test_policy() -> ConnectionPolicy {
    ConnectionPolicy {
        connection_timeout_secs: 5,
        data_timeout_secs: 5,
        keepalive_interval_secs: 3600,
        max_retries: 2,
        retry_delay_ms: 10,
        pasv_timeout_secs: 5,
        data_channel_timeout_secs: 5,
        max_connections_per_host: 0,
        idle_timeout_secs: 3600,
        log_commands: false,
    }
}

pub fn demo_endpoint() -> Endpoint {
    Endpoint::new("ftp.example.com", 21)
}

pub fn demo_credentials() -> Credentials {
    Credentials::new("demo", "hunter2")
}

/// Registers the standard demo connection and returns its key.
pub async fn register_demo(pool: &TestPool, policy: ConnectionPolicy) -> ConnectionKey {
    pool.registry
        .register(demo_endpoint(), demo_credentials(), policy)
        .await
        .expect("demo registration should succeed")
}

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
}
