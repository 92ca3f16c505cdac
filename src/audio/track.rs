use std::time::Duration;
use url::Url;

/// A playable track as resolved by the backend.
///
/// Immutable once built; queues and the "last track" slot own clones of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub duration: Option<Duration>,
    /// `true` when the track was resolved from a URI the user pasted.
    pub is_direct_uri: bool,
    /// Opaque backend identifier used to start playback.
    pub encoded: String,
}

impl TrackRef {
    #[cfg(test)]
    pub fn new(title: impl Into<String>, url: impl Into<String>, encoded: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            author: None,
            duration: None,
            is_direct_uri: false,
            encoded: encoded.into(),
        }
    }

    #[cfg(test)]
    pub fn direct(mut self) -> Self {
        self.is_direct_uri = true;
        self
    }

    /// Markdown link used by every embed.
    pub fn markdown(&self) -> String {
        format!("[{}]({})", self.title, self.url)
    }

    /// YouTube video id, when the track URL carries one.
    pub fn youtube_id(&self) -> Option<String> {
        let url = Url::parse(&self.url).ok()?;
        let host = url.host_str()?;

        if host.ends_with("youtu.be") {
            return url
                .path_segments()?
                .next()
                .filter(|id| !id.is_empty())
                .map(str::to_string);
        }

        if host.ends_with("youtube.com") {
            return url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, id)| id.into_owned())
                .filter(|id| !id.is_empty());
        }

        None
    }

    /// Medium quality thumbnail for YouTube tracks.
    pub fn thumbnail_url(&self) -> Option<String> {
        self.youtube_id()
            .map(|id| format!("https://img.youtube.com/vi/{}/mqdefault.jpg", id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Found,
    NoMatches,
}

/// Outcome of a backend search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub status: SearchStatus,
    pub tracks: Vec<TrackRef>,
}

impl SearchResult {
    pub fn found(tracks: Vec<TrackRef>) -> Self {
        let status = if tracks.is_empty() {
            SearchStatus::NoMatches
        } else {
            SearchStatus::Found
        };
        Self { status, tracks }
    }

    #[cfg(test)]
    pub fn no_matches() -> Self {
        Self {
            status: SearchStatus::NoMatches,
            tracks: Vec::new(),
        }
    }

    /// First match, if any.
    pub fn into_first(self) -> Option<TrackRef> {
        match self.status {
            SearchStatus::Found => self.tracks.into_iter().next(),
            SearchStatus::NoMatches => None,
        }
    }
}

/// Whether a query should bypass search and be loaded as-is.
pub fn is_direct_uri(query: &str) -> bool {
    Url::parse(query.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}
