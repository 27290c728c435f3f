//! The chat front end: a transport-independent conversation controller and its Telegram
//! transport.

mod controller;
mod reply;
mod session;
mod telegram;

pub use controller::{Controller, Inbound};
pub use reply::{Affordance, Command, Reply};
pub use session::{ArtistIntent, ConversationId, ConversationState, Sessions};
pub use telegram::run;
