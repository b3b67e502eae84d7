//! Events emitted by the IRC client for the bot layer to consume.

/// Events that the client emits to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Transport is up; registration has been sent.
    Connected,

    /// IRC registration complete (RPL_WELCOME). `nick` is our confirmed nick.
    Registered {
        nick: String,
    },

    /// Someone (possibly us) joined a channel.
    Joined {
        channel: String,
        nick: String,
    },

    /// A PRIVMSG in a channel or a private query.
    Message {
        from: String,
        target: String,
        text: String,
    },

    /// A NOTICE from a user or the server.
    Notice {
        from: String,
        target: String,
        text: String,
    },

    /// Connection was closed.
    Disconnected {
        reason: String,
    },
}
