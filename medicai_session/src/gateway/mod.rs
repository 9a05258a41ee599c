mod client;
mod errors;
mod request;

pub use client::RequestGateway;
pub use errors::GatewayError;
pub use request::ApiRequest;
