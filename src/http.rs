use reqwest::Client;

use crate::config::HttpSettings;

/// Shared client for provider calls. Both timeouts always apply; a builder
/// failure is returned rather than replaced by an unbounded default client.
pub fn build_client(settings: &HttpSettings) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(settings.timeout)
        .connect_timeout(settings.connect_timeout)
        .user_agent(concat!("lens-scout/", env!("CARGO_PKG_VERSION")))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn builds_with_configured_timeouts() {
        let settings = HttpSettings {
            timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
        };
        assert!(build_client(&settings).is_ok());
    }
}
