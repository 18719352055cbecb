use mimir_config::Configuration;

/// Limits and modes the decoder honours for a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderSettings {
    /// Lengths above this produce `OverlongArrayOrString` instead of a read.
    pub max_dynamic_length: u64,
    /// Storage range reads spanning more words than this produce `OverlargePointer`.
    pub max_storage_range_words: u64,
    /// Ignore non-zero padding around elementary values instead of reporting it.
    pub permissive_padding: bool,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        DecoderSettings::from(&Configuration::default())
    }
}

impl From<&Configuration> for DecoderSettings {
    fn from(config: &Configuration) -> Self {
        DecoderSettings {
            max_dynamic_length: config.max_dynamic_length,
            max_storage_range_words: config.max_storage_range_words,
            permissive_padding: config.permissive_padding,
        }
    }
}
