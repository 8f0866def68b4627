pub mod cover_art;
pub mod id3_tagger;

pub use cover_art::CoverArt;
pub use id3_tagger::{Id3Tagger, TrackTags};
