#![forbid(unsafe_code)]

pub mod assets;
pub mod error;
pub mod file;
pub mod http;
pub mod memory;
pub mod session;

pub use assets::SessionAssets;
pub use error::{GatewayConfigError, SessionEndError, SessionStartError};
pub use file::FileSessionGateway;
pub use http::{HttpGatewayConfig, HttpSessionGateway};
pub use memory::InMemorySessionGateway;
pub use session::{EndRequest, SessionGateway, StartRequest, StartedSession};
