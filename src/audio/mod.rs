//! Audio passthroughs: transcription, text-to-speech, and voice listing.

mod helpers;
pub mod tela;
pub mod transcription;
pub mod tts;
pub mod types;

pub use transcription::AudioProvider;
pub use tts::SpeechProvider;
pub use types::*;
