use tokio::task::JoinHandle;

/// Handle to the one scheduled renewal task.
///
/// Dropping the handle cancels the task, so replacing the slot that holds it is
/// enough to guarantee a single live timer.
pub(crate) struct RenewalTimer {
    id: u64,
    handle: Option<JoinHandle<()>>,
}

impl RenewalTimer {
    pub(crate) fn new(id: u64, handle: JoinHandle<()>) -> Self {
        Self {
            id,
            handle: Some(handle),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Release the handle without aborting; used by the task itself once it fires.
    pub(crate) fn disarm(mut self) {
        self.handle.take();
    }
}

impl Drop for RenewalTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
