mod options;
mod settings;

pub use options::{DecoderOptions, DecoderOptionsBuilder, Visited};
pub use settings::DecoderSettings;
