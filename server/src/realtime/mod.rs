pub mod events;
pub mod gateway;
pub mod presence;
pub mod rooms;

pub use events::{ClientEvent, ServerEvent};
pub use gateway::{handle_client_event, ws_handler, GatewayState};
