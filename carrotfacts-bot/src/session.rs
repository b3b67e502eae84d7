//! Session lifecycle: load facts, connect, serve events, shut down.
//!
//! ```text
//! Configuring → Loading → Connecting → Connected → Disconnecting → Terminated
//! ```
//!
//! An interrupt while connecting or connected sends a QUIT and waits for the
//! server to close the link; a second interrupt stops waiting. A disconnect
//! in any state terminates immediately. There is no reconnect.

use carrotfacts_sdk::client::{self, ClientHandle};
use carrotfacts_sdk::event::Event;
use tokio::sync::mpsc;

use crate::config::{Config, FactsConfig};
use crate::error::{Error, Result};
use crate::facts;
use crate::router::Router;
use crate::selector::{RandomSelector, RoundRobinSelector};

/// Sent with QUIT on interrupt.
pub const FAREWELL: &str = "Carrot be with you!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Configuring,
    Loading,
    Connecting,
    Connected,
    Disconnecting,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Load both fact files and bind them to their selectors.
pub fn load_router(paths: &FactsConfig) -> Result<Router> {
    let load = |path: &std::path::Path| {
        facts::load(path).map_err(|source| Error::Load {
            path: path.to_path_buf(),
            source,
        })
    };

    let carrots = load(paths.carrots.as_path())?;
    tracing::info!(count = carrots.len(), path = %paths.carrots.display(), "Loaded carrot facts");
    let turnips = load(paths.turnips.as_path())?;
    tracing::info!(count = turnips.len(), path = %paths.turnips.display(), "Loaded turnip facts");

    Ok(Router::new(
        Box::new(RandomSelector::new(carrots)),
        Box::new(RoundRobinSelector::new(turnips)),
    ))
}

/// Run the bot until it disconnects or is interrupted twice. An interrupt
/// before the connection is up abandons it straight away.
///
/// `config` must already be validated. `interrupts` yields one item per
/// interrupt signal.
pub async fn run(config: &Config, mut interrupts: mpsc::Receiver<()>) -> Result<()> {
    tracing::info!(state = ?State::Loading, "Loading facts");
    let router = load_router(&config.facts)?;

    tracing::info!(
        state = ?State::Connecting,
        server = %config.irc.server,
        tls = config.irc.ssl,
        "Connecting"
    );
    let connect_config = config.connect_config();
    let conn = tokio::select! {
        conn = client::establish_connection(&connect_config) => conn.map_err(Error::Connect)?,
        Some(()) = interrupts.recv() => {
            tracing::info!(state = ?State::Terminated, "Interrupted while connecting");
            return Ok(());
        }
    };
    let (handle, mut events) = client::connect_with_stream(conn, connect_config);

    let session = Session::new(&config.irc.channel, handle, router);
    session.serve(&mut events, &mut interrupts).await;
    Ok(())
}

/// A live connection plus the router answering on it.
pub struct Session {
    channel: String,
    handle: ClientHandle,
    router: Router,
    state: State,
}

impl Session {
    pub fn new(channel: &str, handle: ClientHandle, router: Router) -> Self {
        Self {
            channel: channel.to_string(),
            handle,
            router,
            state: State::Connecting,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, to: State) {
        tracing::info!(from = ?self.state, to = ?to, "State change");
        self.state = to;
    }

    /// Wait on events and interrupts until the session ends.
    /// Returns the final state.
    pub async fn serve(
        mut self,
        events: &mut mpsc::Receiver<Event>,
        interrupts: &mut mpsc::Receiver<()>,
    ) -> State {
        loop {
            let flow = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(&event).await,
                    None => {
                        tracing::warn!("Event channel closed");
                        self.transition(State::Terminated);
                        Flow::Stop
                    }
                },
                Some(()) = interrupts.recv() => self.interrupt().await,
            };
            if flow == Flow::Stop {
                return self.state;
            }
        }
    }

    pub async fn handle_event(&mut self, event: &Event) -> Flow {
        match event {
            Event::Connected => tracing::info!("Connected, registering"),

            Event::Registered { nick } => {
                if self.state == State::Connecting {
                    tracing::info!(%nick, channel = %self.channel, "Registered, joining");
                    self.transition(State::Connected);
                    if let Err(e) = self.handle.join(&self.channel).await {
                        tracing::warn!(error = %e, "Join failed");
                    }
                }
            }

            Event::Joined { channel, nick } => tracing::debug!(%channel, %nick, "Joined"),

            // No source nick: nowhere sensible to answer a query.
            Event::Message { from, text, .. } if from.is_empty() => {
                tracing::debug!(%text, "Ignoring message without a sender");
            }

            Event::Message { from, target, text } => {
                if let Some(reply) = self.router.route(text) {
                    let to = reply_target(from, target);
                    tracing::debug!(%from, %to, command = %text, "Replying");
                    if let Err(e) = self.handle.privmsg(to, &reply).await {
                        tracing::warn!(error = %e, "Send failed");
                    }
                }
            }

            Event::Notice { from, text, .. } => tracing::debug!(%from, %text, "Notice"),

            Event::Disconnected { reason } => {
                tracing::info!(%reason, "Disconnected");
                self.transition(State::Terminated);
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    pub async fn interrupt(&mut self) -> Flow {
        match self.state {
            State::Connecting | State::Connected => {
                tracing::info!("Interrupted, quitting");
                self.transition(State::Disconnecting);
                match self.handle.quit(Some(FAREWELL)).await {
                    Ok(()) => Flow::Continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "Quit failed");
                        self.transition(State::Terminated);
                        Flow::Stop
                    }
                }
            }
            _ => {
                tracing::info!("Interrupted again, not waiting for the server");
                self.transition(State::Terminated);
                Flow::Stop
            }
        }
    }
}

/// Channel name prefixes from RFC 2811.
const CHANNEL_PREFIXES: [char; 4] = ['#', '&', '+', '!'];

/// Channel messages are answered in the channel; private ones to the sender.
fn reply_target<'a>(from: &'a str, target: &'a str) -> &'a str {
    if target.starts_with(CHANNEL_PREFIXES) {
        target
    } else {
        from
    }
}
