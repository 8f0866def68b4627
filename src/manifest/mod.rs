pub mod track;
pub mod tracklist;

pub use track::{sanitize_filename, TrackEntry};
pub use tracklist::{list_tracklists, Tracklist};
