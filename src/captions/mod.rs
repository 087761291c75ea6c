pub mod loader;
pub mod srt;
pub mod style;
pub mod track;
pub mod words;

pub use loader::CaptionLoader;
pub use srt::{parse_srt, CaptionEntry};
pub use style::CaptionStyle;
pub use track::{active_word_index, CaptionTrack};
pub use words::{derive_words, estimate_words, Word};
