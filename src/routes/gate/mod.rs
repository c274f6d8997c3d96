mod handler;
mod model;

pub use handler::{connect, disconnect, query_session, route};
pub use model::{ConnectResponse, DisconnectResponse, RouteRequest, SessionRequest};
