//! Shared wiremock setup for koios-http integration tests.

use koios_http::{Client, ClientOption};
use wiremock::MockServer;

/// Client pointed at `server`, with `extra` options applied afterwards.
pub fn client_for(server: &MockServer, extra: impl IntoIterator<Item = ClientOption>) -> Client {
    let mut options = vec![
        ClientOption::Schema("http".into()),
        ClientOption::Host("127.0.0.1".into()),
        ClientOption::Port(server.address().port()),
        ClientOption::RateLimit(255),
    ];
    options.extend(extra);
    Client::new(options).expect("mock client")
}

/// Path as seen by the server for an API path.
pub fn api(path: &str) -> String {
    format!("/api/v0{path}")
}
