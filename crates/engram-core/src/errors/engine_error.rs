/// Engine-level (facade) errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("embedder '{name}' unavailable")]
    EmbedderUnavailable { name: String },

    #[error("malformed UUID: {value}")]
    MalformedUuid { value: String },

    #[error("pattern '{name}' was pruned (use_count {use_count}, success rate {success_rate:.2})")]
    PatternPruned {
        name: String,
        use_count: u64,
        success_rate: f64,
    },

    #[error("engine is closed")]
    Closed,
}
