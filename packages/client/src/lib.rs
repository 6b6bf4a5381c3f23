//! Rookline session client.
//!
//! Typed real-time channels for an online chess game: the lobby namespace
//! for matchmaking and the game namespace for a game in progress, both
//! built on one generic [`SessionChannel`] over a Socket.IO transport.

pub mod channel;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod transport;

pub use channel::{
    Acknowledgement, ChannelNotice, ConnectionState, Delivery, GameChannel, LobbyChannel,
    SessionChannel,
};
pub use config::{ClientConfig, Endpoint, Namespace, ReconnectPolicy};
pub use error::{ClientError, ConnectionError, EmitError, ProtocolError};
