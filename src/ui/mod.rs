//! Discord embeds for command replies, errors and channel notices.

pub mod embeds;
