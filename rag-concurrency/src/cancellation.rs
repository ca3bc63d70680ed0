//! Scoped cancellation, built on `tokio_util::sync::CancellationToken` (the
//! teacher already depends on `tokio-util` for `io`; this crate is the first
//! to reach for its `rt`/cancellation feature).
//!
//! Spec §5: cancelling the request context must terminate outstanding
//! fan-out tasks, while the streaming task keeps running against an
//! independent *background* token so post-completion events can still reach
//! the replay store during its TTL window.

use tokio_util::sync::CancellationToken;

/// A cancellation scope tied to one request, plus a detached background
/// scope for work that must outlive the request (spec §5's streaming-task
/// exception).
#[derive(Debug, Clone)]
pub struct ScopedCancellation {
    request: CancellationToken,
    background: CancellationToken,
}

impl ScopedCancellation {
    #[must_use]
    pub fn new() -> Self {
        Self {
            request: CancellationToken::new(),
            background: CancellationToken::new(),
        }
    }

    /// The token fan-out tasks should race against; cancelling it (e.g. on
    /// client disconnect) should terminate outstanding searches.
    #[must_use]
    pub fn request_token(&self) -> CancellationToken {
        self.request.clone()
    }

    /// A token independent of `request_token`, for work that must survive
    /// request cancellation (the streaming producer's post-completion
    /// session-title update, per spec §5).
    #[must_use]
    pub fn background_token(&self) -> CancellationToken {
        self.background.clone()
    }

    /// Cancels the request scope only; the background scope is unaffected.
    pub fn cancel_request(&self) {
        self.request.cancel();
    }

    /// Cancels both scopes, e.g. on process shutdown.
    pub fn cancel_all(&self) {
        self.request.cancel();
        self.background.cancel();
    }

    #[must_use]
    pub fn is_request_cancelled(&self) -> bool {
        self.request.is_cancelled()
    }
}

impl Default for ScopedCancellation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ScopedCancellation;

    #[tokio::test]
    async fn cancel_request_does_not_cancel_background() {
        let scope = ScopedCancellation::new();
        scope.cancel_request();
        assert!(scope.is_request_cancelled());
        assert!(!scope.background_token().is_cancelled());
    }

    #[tokio::test]
    async fn request_token_reflects_cancellation_from_clones() {
        let scope = ScopedCancellation::new();
        let token = scope.request_token();
        assert!(!token.is_cancelled());
        scope.cancel_request();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_all_cancels_both() {
        let scope = ScopedCancellation::new();
        scope.cancel_all();
        assert!(scope.request_token().is_cancelled());
        assert!(scope.background_token().is_cancelled());
    }
}
