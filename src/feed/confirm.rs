use std::future::Future;

/// A yes/no prompt shown before destructive actions.
///
/// The view-model awaits the answer, so a modal dialog, a terminal prompt or a
/// canned answer all fit behind the same seam.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> impl Future<Output = bool> + Send;
}

/// Answers every prompt the same way without asking anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!(prompt, answer = self.0, "Auto-answering confirmation");
        self.0
    }
}
