//! # Audio Module
//!
//! Everything the coordinator needs to talk about audio without doing any
//! of it: decoding, mixing and streaming all happen on a remote Lavalink node.
//!
//! ## Architecture
//!
//! ### [`backend`] - Backend boundary
//! - [`backend::AudioBackend`] trait with join/leave/search/play/stop/volume/filter
//! - Track lifecycle events ([`backend::PlaybackEvent`]) and end reasons
//!
//! ### [`track`] - Track values
//! - Immutable [`track::TrackRef`] produced by searches
//! - Direct-URI detection and YouTube thumbnails
//!
//! ### [`effects`] - Audio filters
//! - Named presets (`8d`, `karaoke`, `mono`, `intense`, `reset`)
//! - Lavalink filter payloads
//!
//! ### [`lavalink_client`] - Lavalink v4 node
//! - REST control channel and websocket event stream
//! - Voice credentials forwarded from songbird

pub mod backend;
pub mod effects;
pub mod lavalink_client;
pub mod track;
