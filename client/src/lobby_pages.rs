//! Fetches the plain text lobby pages of the server, the room list and the player statistics.

use derive_more::{Display, Error};
use reqwest::Url;
use reqwest::blocking::Client;

#[derive(Debug, Display, Error)]
pub enum LobbyError {
    #[display("'{server}' is not a usable server address")]
    BadAddress {
        server: String,
        reason: String,
    },
    #[display("request failed: {source}")]
    Request { source: reqwest::Error },
}

/// HTTP access to the server pages next to the game socket.
#[derive(Debug, Clone)]
pub struct LobbyPages {
    /// Base URL of the server, ends with a slash.
    base_url: Url,
    client: Client,
}

impl LobbyPages {
    /// `server` is the same `host:port` the game socket uses.
    pub fn new(server: &str) -> Result<LobbyPages, LobbyError> {
        let base_url = base_url(server)?;
        Ok(LobbyPages {
            base_url,
            client: Client::new(),
        })
    }

    /// The list of active rooms.
    pub fn rooms(&self) -> Result<String, LobbyError> {
        self.fetch(self.page(&["enlist"]))
    }

    /// The counts of one player.
    pub fn player_stats(&self, player: &str) -> Result<String, LobbyError> {
        self.fetch(self.page(&["stats", player]))
    }

    /// The URL of a page below the base, every segment percent encoded.
    pub fn page(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn fetch(&self, url: Url) -> Result<String, LobbyError> {
        tracing::debug!(%url, "Fetching lobby page.");
        self.client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|source| LobbyError::Request { source })
    }
}

fn base_url(server: &str) -> Result<Url, LobbyError> {
    let bad_address = |reason: String| LobbyError::BadAddress {
        server: server.to_string(),
        reason,
    };
    let url = Url::parse(&format!("http://{}/", server)).map_err(|e| bad_address(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(bad_address("not a base URL".to_string()));
    }
    Ok(url)
}
