use std::sync::Arc;

use parking_lot::Mutex;

use crate::basic_types::Nogood;
use crate::basic_types::NogoodSink;

/// A cloneable handle through which other threads hand nogoods to an oracle.
///
/// The oracle drains the inbox before each propagation; nogoods pushed while it searches take
/// effect at its next propagation step.
#[derive(Clone, Debug, Default)]
pub struct NogoodInbox {
    nogoods: Arc<Mutex<Vec<Nogood>>>,
}

impl NogoodInbox {
    pub fn push(&self, nogood: Nogood) {
        self.nogoods.lock().push(nogood);
    }

    pub fn extend(&self, nogoods: impl IntoIterator<Item = Nogood>) {
        self.nogoods.lock().extend(nogoods);
    }

    pub fn drain(&self) -> Vec<Nogood> {
        std::mem::take(&mut *self.nogoods.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.nogoods.lock().is_empty()
    }
}

impl NogoodSink for NogoodInbox {
    fn add_nogood(&mut self, nogood: Nogood) {
        self.push(nogood);
    }
}
