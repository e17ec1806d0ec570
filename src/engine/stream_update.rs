//! `StreamUpdate`: a fluent builder for the engine's raw stream writes
//! (spec §9 "Builder patterns for write updates").

use crate::error::EngineError;
use crate::keeper::Stream;
use crate::quantity::Quantity;

/// A validated, ready-to-apply stream write. Only constructible through
/// [`StreamUpdateBuilder::build`].
#[derive(Debug, Clone)]
pub struct StreamUpdate {
    pub stream: Stream,
    pub value: Quantity,
    pub subtract_recycling: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StreamUpdateBuilder {
    stream: Option<Stream>,
    value: Option<Quantity>,
    subtract_recycling: bool,
}

impl StreamUpdateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream(mut self, stream: Stream) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn value(mut self, value: Quantity) -> Self {
        self.value = Some(value);
        self
    }

    pub fn subtract_recycling(mut self, subtract: bool) -> Self {
        self.subtract_recycling = subtract;
        self
    }

    /// Validates that `stream` and `value` were both supplied before
    /// returning a usable update (spec §9: "a terminal `build()` that
    /// validates the required fields ... before returning").
    pub fn build(self) -> Result<StreamUpdate, EngineError> {
        let stream = self
            .stream
            .ok_or_else(|| EngineError::Domain("stream update missing a target stream".to_string()))?;
        let value = self
            .value
            .ok_or_else(|| EngineError::Domain("stream update missing a value".to_string()))?;
        Ok(StreamUpdate {
            stream,
            value,
            subtract_recycling: self.subtract_recycling,
        })
    }
}
