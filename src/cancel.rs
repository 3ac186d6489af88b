use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A token to cancel a render from another thread.
///
/// The renderer polls the token at every loop iteration, call, include and
/// import; a cancelled render ends like `#stop` with the message
/// `render cancelled`.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    inner: Arc<Token>,
}

#[derive(Debug, Default)]
struct Token {
    local: AtomicBool,
    parent: Option<Arc<Token>>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is also cancelled when `self` is.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Token {
                local: AtomicBool::new(false),
                parent: Some(self.inner.clone()),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.local.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

impl Token {
    fn is_cancelled(&self) -> bool {
        if self.local.load(Ordering::Acquire) {
            return true;
        }
        self.parent
            .as_ref()
            .is_some_and(|parent| parent.is_cancelled())
    }
}
