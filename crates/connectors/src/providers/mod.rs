//! Built-in provider connectors

mod discord;
mod slack;
mod teams;

pub use discord::DiscordConnector;
pub use slack::SlackConnector;
pub use teams::TeamsConnector;
