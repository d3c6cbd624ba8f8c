use std::time::Instant;

/// Per-request context that lives from validation to response
///
/// Owns the request id, the dispatch start time, and the mutable slot
/// recording which provider ended up serving the request.
#[derive(Debug)]
pub struct DispatchContext {
    request_id: String,
    started: Instant,
    chosen_provider: Option<String>,
}

impl DispatchContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            started: Instant::now(),
            chosen_provider: None,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Milliseconds elapsed since the dispatch began
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Record the provider currently serving the request
    ///
    /// Overwritten when a fallback provider takes over.
    pub fn set_provider(&mut self, name: impl Into<String>) {
        self.chosen_provider = Some(name.into());
    }

    pub fn provider(&self) -> Option<&str> {
        self.chosen_provider.as_deref()
    }
}
