//! Async IRC client.
//!
//! Manages the TCP connection, optional TLS, IRC registration and PING/PONG,
//! and emits [`Event`]s. Consumers drive it through a [`ClientHandle`].
//!
//! ## Reconnection
//!
//! The client does not reconnect. When the server closes the connection an
//! [`Event::Disconnected`] is emitted and the protocol task ends.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls;

use crate::event::Event;
use crate::irc::Message;

/// Configuration for connecting to an IRC server.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Server address (host:port).
    pub server_addr: String,
    /// Desired nickname.
    pub nick: String,
    /// Username (ident).
    pub user: String,
    /// Real name.
    pub realname: String,
    /// Server password sent with PASS before registration.
    pub password: Option<String>,
    /// Use TLS.
    pub tls: bool,
    /// Skip TLS certificate verification (for self-signed certs).
    pub tls_insecure: bool,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:6667".to_string(),
            nick: "user".to_string(),
            user: "user".to_string(),
            realname: "carrotfacts".to_string(),
            password: None,
            tls: false,
            tls_insecure: false,
        }
    }
}

/// Commands the consumer can send to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join(String),
    Privmsg { target: String, text: String },
    Notice { target: String, text: String },
    Raw(String),
    Quit(Option<String>),
}

/// A handle to a running IRC client connection.
#[derive(Clone)]
pub struct ClientHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl ClientHandle {
    /// Wrap a command sender. The receiving end is normally owned by the
    /// protocol task spawned in [`connect_with_stream`].
    pub fn new(cmd_tx: mpsc::Sender<Command>) -> Self {
        Self { cmd_tx }
    }

    pub async fn join(&self, channel: &str) -> Result<()> {
        self.cmd_tx.send(Command::Join(channel.to_string())).await?;
        Ok(())
    }

    pub async fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        self.cmd_tx
            .send(Command::Privmsg {
                target: target.to_string(),
                text: text.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn notice(&self, target: &str, text: &str) -> Result<()> {
        self.cmd_tx
            .send(Command::Notice {
                target: target.to_string(),
                text: text.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn quit(&self, message: Option<&str>) -> Result<()> {
        self.cmd_tx
            .send(Command::Quit(message.map(|s| s.to_string())))
            .await?;
        Ok(())
    }

    pub async fn raw(&self, line: &str) -> Result<()> {
        self.cmd_tx.send(Command::Raw(line.to_string())).await?;
        Ok(())
    }
}

/// Split `host:port` into its parts. Bracketed IPv6 literals
/// (`[::1]:6697`) are accepted and returned without brackets.
pub fn split_server_addr(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    let host = match host.strip_prefix('[') {
        Some(inner) => inner.strip_suffix(']')?,
        None if host.contains(':') => return None,
        None => host,
    };
    if host.is_empty() {
        return None;
    }
    let port = port.parse::<u16>().ok().filter(|p| *p != 0)?;
    Some((host, port))
}

/// Append the conventional IRC port (6697 with TLS, 6667 without) when
/// `addr` names only a host.
pub fn with_default_port(addr: &str, tls: bool) -> String {
    let has_port = match addr.strip_prefix('[') {
        Some(rest) => !rest.ends_with(']'),
        None => addr.contains(':'),
    };
    if has_port || addr.is_empty() {
        addr.to_string()
    } else {
        format!("{addr}:{}", if tls { 6697 } else { 6667 })
    }
}

/// Establish TCP (and optionally TLS) connection to the server.
///
/// Done before the protocol task starts so connection errors surface to
/// the caller directly.
pub async fn establish_connection(config: &ConnectConfig) -> Result<EstablishedConnection> {
    let mode = if config.tls { "TLS" } else { "plain" };
    let addr = with_default_port(&config.server_addr, config.tls);
    let (host, port) = split_server_addr(&addr)
        .ok_or_else(|| anyhow::anyhow!("invalid server address {}", config.server_addr))?;

    tracing::debug!("Resolving {addr}...");
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|e| anyhow::anyhow!("TCP connect to {addr} failed: {e}"))?;
    tracing::debug!("TCP connected to {addr} ({mode})");

    if config.tls {
        let tls_config = if config.tls_insecure {
            tracing::warn!("TLS: insecure mode (skipping cert verification)");
            rustls_insecure_config()
        } else {
            tracing::debug!("TLS: verifying server certificate for {host}");
            rustls_default_config()
        };
        let connector = TlsConnector::from(Arc::new(tls_config));
        let dns_name = rustls::pki_types::ServerName::try_from(host.to_string())?;
        let tls_stream = connector
            .connect(dns_name, tcp)
            .await
            .map_err(|e| anyhow::anyhow!("TLS handshake with {addr} failed: {e}"))?;
        tracing::debug!("TLS handshake complete");
        Ok(EstablishedConnection::Tls(Box::new(tls_stream)))
    } else {
        Ok(EstablishedConnection::Plain(tcp))
    }
}

/// A connection that has completed TCP (and optionally TLS) but hasn't
/// started IRC registration yet.
pub enum EstablishedConnection {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

/// Connect using an already-established connection.
///
/// Returns a handle for sending commands and a receiver for events.
/// The IRC protocol runs in a spawned task.
pub fn connect_with_stream(
    conn: EstablishedConnection,
    config: ConnectConfig,
) -> (ClientHandle, mpsc::Receiver<Event>) {
    let (event_tx, event_rx) = mpsc::channel(1024);
    let (cmd_tx, cmd_rx) = mpsc::channel(256);

    let handle = ClientHandle::new(cmd_tx);

    tokio::spawn(async move {
        let _ = event_tx.send(Event::Connected).await;
        let result = match conn {
            EstablishedConnection::Plain(tcp) => {
                let (reader, writer) = tokio::io::split(tcp);
                run_irc(BufReader::new(reader), writer, &config, event_tx.clone(), cmd_rx).await
            }
            EstablishedConnection::Tls(tls) => {
                let (reader, writer) = tokio::io::split(*tls);
                run_irc(BufReader::new(reader), writer, &config, event_tx.clone(), cmd_rx).await
            }
        };
        if let Err(e) = result {
            let _ = event_tx
                .send(Event::Disconnected {
                    reason: e.to_string(),
                })
                .await;
        }
    });

    (handle, event_rx)
}

fn install_crypto_provider() {
    #[cfg(feature = "ring")]
    {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
    #[cfg(all(feature = "aws-lc-rs", not(feature = "ring")))]
    {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }
}

fn rustls_default_config() -> rustls::ClientConfig {
    install_crypto_provider();

    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

fn rustls_insecure_config() -> rustls::ClientConfig {
    install_crypto_provider();
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureVerifier))
        .with_no_client_auth()
}

#[derive(Debug)]
struct InsecureVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::CryptoProvider::get_default()
            .map(|p| p.signature_verification_algorithms.supported_schemes())
            .unwrap_or_default()
    }
}

async fn run_irc<R, W>(
    mut reader: R,
    mut writer: W,
    config: &ConnectConfig,
    event_tx: mpsc::Sender<Event>,
    mut cmd_rx: mpsc::Receiver<Command>,
) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if let Some(ref pass) = config.password {
        writer.write_all(format!("PASS {pass}\r\n").as_bytes()).await?;
    }
    writer
        .write_all(format!("NICK {}\r\n", config.nick).as_bytes())
        .await?;
    writer
        .write_all(format!("USER {} 0 * :{}\r\n", config.user, config.realname).as_bytes())
        .await?;

    let mut registered = false;
    let mut nick_tries: u32 = 0;
    let mut pending_commands: Vec<Command> = Vec::new();
    let mut line_buf = String::new();
    let mut last_activity = tokio::time::Instant::now();
    let ping_interval = tokio::time::Duration::from_secs(60);
    let ping_timeout = tokio::time::Duration::from_secs(120);

    loop {
        tokio::select! {
            result = reader.read_line(&mut line_buf) => {
                let n = result?;
                if n == 0 {
                    let _ = event_tx.send(Event::Disconnected { reason: "EOF".to_string() }).await;
                    break;
                }

                last_activity = tokio::time::Instant::now();
                tracing::trace!(line = %line_buf.trim_end(), "<-");

                if let Some(msg) = Message::parse(&line_buf) {
                    match msg.command.as_str() {
                        // ERR_NICKNAMEINUSE
                        "433" if !registered => {
                            nick_tries = nick_tries.saturating_add(1);
                            if nick_tries <= 5 {
                                let alt = format!("{}{}", config.nick, nick_tries);
                                writer.write_all(format!("NICK {alt}\r\n").as_bytes()).await?;
                            } else {
                                let _ = event_tx.send(Event::Disconnected { reason: "Nick in use".to_string() }).await;
                                break;
                            }
                        }
                        // RPL_WELCOME
                        "001" => {
                            registered = true;
                            let nick = msg.params.first().cloned().unwrap_or_else(|| config.nick.clone());
                            let _ = event_tx.send(Event::Registered { nick }).await;
                            for cmd in pending_commands.drain(..) {
                                execute_command(&mut writer, cmd).await?;
                            }
                        }
                        "PING" => {
                            let token = msg.params.first().map(String::as_str).unwrap_or("");
                            writer.write_all(format!("PONG :{token}\r\n").as_bytes()).await?;
                        }
                        "JOIN" => {
                            if let (Some(nick), Some(channel)) = (msg.source_nick(), msg.params.first()) {
                                let _ = event_tx.send(Event::Joined {
                                    channel: channel.clone(),
                                    nick: nick.to_string(),
                                }).await;
                            }
                        }
                        "PRIVMSG" | "NOTICE" if msg.params.len() >= 2 => {
                            let from = msg.source_nick().unwrap_or("").to_string();
                            let target = msg.params[0].clone();
                            let text = msg.params[1].clone();
                            let event = if msg.command == "PRIVMSG" {
                                Event::Message { from, target, text }
                            } else {
                                Event::Notice { from, target, text }
                            };
                            let _ = event_tx.send(event).await;
                        }
                        "ERROR" => {
                            let reason = msg.params.join(" ");
                            tracing::warn!(%reason, "Server sent ERROR");
                        }
                        _ => {}
                    }
                }

                line_buf.clear();
            }
            Some(cmd) = cmd_rx.recv() => {
                if registered || matches!(cmd, Command::Quit(_)) {
                    let quitting = matches!(cmd, Command::Quit(_));
                    execute_command(&mut writer, cmd).await?;
                    if quitting && !registered {
                        let _ = event_tx.send(Event::Disconnected { reason: "Quit before registration".to_string() }).await;
                        break;
                    }
                } else {
                    // Queue until registered
                    pending_commands.push(cmd);
                }
            }
            // Periodic client-to-server PING and timeout detection
            _ = tokio::time::sleep_until(last_activity + ping_interval) => {
                if last_activity.elapsed() > ping_timeout {
                    let _ = event_tx.send(Event::Disconnected { reason: "Ping timeout".to_string() }).await;
                    break;
                }
                writer.write_all(b"PING :keepalive\r\n").await?;
            }
        }
    }

    Ok(())
}

/// Strip line breaks so a single command can never span protocol lines.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Execute a single IRC command on the wire.
async fn execute_command<W: AsyncWrite + Unpin>(writer: &mut W, cmd: Command) -> Result<()> {
    let line = match cmd {
        Command::Join(channel) => Message::new("JOIN", vec![single_line(&channel)]),
        Command::Privmsg { target, text } => {
            Message::new("PRIVMSG", vec![single_line(&target), single_line(&text)])
        }
        Command::Notice { target, text } => {
            Message::new("NOTICE", vec![single_line(&target), single_line(&text)])
        }
        Command::Raw(line) => {
            writer.write_all(format!("{}\r\n", single_line(&line)).as_bytes()).await?;
            return Ok(());
        }
        Command::Quit(Some(m)) => Message::new("QUIT", vec![single_line(&m)]),
        Command::Quit(None) => Message::new("QUIT", Vec::new()),
    };
    tracing::trace!(%line, "->");
    writer.write_all(format!("{line}\r\n").as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn test_config() -> ConnectConfig {
        ConnectConfig {
            nick: "carrotfacts".to_string(),
            user: "carrotfacts".to_string(),
            realname: "Carrot Facts".to_string(),
            ..Default::default()
        }
    }

    /// Spawn the protocol loop over an in-memory pipe. Returns the server
    /// side of the pipe, the command sender and the event receiver.
    fn spawn_client(
        config: ConnectConfig,
    ) -> (DuplexStream, ClientHandle, mpsc::Receiver<Event>) {
        let (client_side, server_side) = tokio::io::duplex(8192);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(client_side);
            let _ = run_irc(BufReader::new(reader), writer, &config, event_tx, cmd_rx).await;
        });
        (server_side, ClientHandle::new(cmd_tx), event_rx)
    }

    async fn read_until(server: &mut DuplexStream, needle: &str) -> String {
        let mut seen = String::new();
        let mut buf = [0u8; 1024];
        while !seen.contains(needle) {
            let n = server.read(&mut buf).await.unwrap();
            assert!(n > 0, "pipe closed before {needle:?}; got {seen:?}");
            seen.push_str(std::str::from_utf8(&buf[..n]).unwrap());
        }
        seen
    }

    #[test]
    fn split_server_addr_variants() {
        assert_eq!(split_server_addr("irc.libera.chat:6697"), Some(("irc.libera.chat", 6697)));
        assert_eq!(split_server_addr("[::1]:6667"), Some(("::1", 6667)));
        assert_eq!(split_server_addr("irc.libera.chat"), None);
        assert_eq!(split_server_addr(":6667"), None);
        assert_eq!(split_server_addr("host:notaport"), None);
        assert_eq!(split_server_addr("host:0"), None);
        assert_eq!(split_server_addr("::1:6667"), None);
    }

    #[test]
    fn bare_host_gets_conventional_port() {
        assert_eq!(with_default_port("irc.libera.chat", true), "irc.libera.chat:6697");
        assert_eq!(with_default_port("irc.libera.chat", false), "irc.libera.chat:6667");
        assert_eq!(with_default_port("[::1]", true), "[::1]:6697");
        assert_eq!(with_default_port("irc.libera.chat:7000", true), "irc.libera.chat:7000");
        assert_eq!(with_default_port("[::1]:6667", true), "[::1]:6667");
        assert_eq!(with_default_port("", true), "");
        assert_eq!(split_server_addr(&with_default_port("[::1]", false)), Some(("::1", 6667)));
    }

    #[tokio::test]
    async fn notice_and_raw_reach_the_wire() {
        let (mut server, handle, mut events) = spawn_client(test_config());
        read_until(&mut server, "USER").await;
        server.write_all(b":irc.test 001 carrotfacts :Welcome\r\n").await.unwrap();
        assert!(matches!(events.recv().await, Some(Event::Registered { .. })));

        handle.notice("alice", "turnips are in season").await.unwrap();
        read_until(&mut server, "NOTICE alice :turnips are in season\r\n").await;

        handle.raw("MODE carrotfacts +B").await.unwrap();
        read_until(&mut server, "MODE carrotfacts +B\r\n").await;
    }

    #[tokio::test]
    async fn registers_and_flushes_queued_join() {
        let config = ConnectConfig {
            password: Some("hunter2".to_string()),
            ..test_config()
        };
        let (mut server, handle, mut events) = spawn_client(config);

        let hello = read_until(&mut server, "USER").await;
        assert!(hello.starts_with("PASS hunter2\r\nNICK carrotfacts\r\n"));

        // Queued until registration completes
        handle.join("#carrots").await.unwrap();

        server.write_all(b":irc.test 001 carrotfacts :Welcome\r\n").await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(Event::Registered { nick: "carrotfacts".to_string() })
        );
        read_until(&mut server, "JOIN #carrots\r\n").await;
    }

    #[tokio::test]
    async fn answers_ping_and_emits_messages() {
        let (mut server, _handle, mut events) = spawn_client(test_config());
        read_until(&mut server, "USER").await;

        server.write_all(b"PING :abc123\r\n").await.unwrap();
        read_until(&mut server, "PONG :abc123\r\n").await;

        server
            .write_all(b":alice!a@host PRIVMSG #carrots :.carrot\r\n")
            .await
            .unwrap();
        assert_eq!(
            events.recv().await,
            Some(Event::Message {
                from: "alice".to_string(),
                target: "#carrots".to_string(),
                text: ".carrot".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn nick_collision_retries_with_suffix() {
        let (mut server, _handle, _events) = spawn_client(test_config());
        read_until(&mut server, "USER").await;
        server
            .write_all(b":irc.test 433 * carrotfacts :Nickname is already in use\r\n")
            .await
            .unwrap();
        read_until(&mut server, "NICK carrotfacts1\r\n").await;
    }

    #[tokio::test]
    async fn quit_is_sent_and_eof_reports_disconnect() {
        let (mut server, handle, mut events) = spawn_client(test_config());
        read_until(&mut server, "USER").await;
        server.write_all(b":irc.test 001 carrotfacts :Welcome\r\n").await.unwrap();
        assert!(matches!(events.recv().await, Some(Event::Registered { .. })));

        handle.quit(Some("Carrot be with you!")).await.unwrap();
        read_until(&mut server, "QUIT :Carrot be with you!\r\n").await;

        drop(server);
        assert_eq!(
            events.recv().await,
            Some(Event::Disconnected { reason: "EOF".to_string() })
        );
    }

    #[tokio::test]
    async fn outgoing_text_cannot_inject_lines() {
        let (mut server, handle, mut events) = spawn_client(test_config());
        read_until(&mut server, "USER").await;
        server.write_all(b":irc.test 001 carrotfacts :Welcome\r\n").await.unwrap();
        assert!(matches!(events.recv().await, Some(Event::Registered { .. })));

        handle.privmsg("#c", "hi\r\nQUIT :gotcha").await.unwrap();
        read_until(&mut server, "PRIVMSG #c :hi  QUIT :gotcha\r\n").await;
    }
}
