pub mod exchange_client;
pub mod graph_client;
pub mod metrics;

pub use exchange_client::{ExchangeClient, ExchangeError, TokenExchange, EXCHANGE_PATH};
pub use graph_client::{GraphClient, ProfileError, ProfileSource};
