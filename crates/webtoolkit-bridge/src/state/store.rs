use webtoolkit::ToolkitState;

use super::StateStore;
use crate::types::BridgeResult;

/// Keeps state in memory only.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: ToolkitState,
}

impl MemoryStateStore {
    pub fn new(state: ToolkitState) -> Self {
        Self { state }
    }
}

impl StateStore for MemoryStateStore {
    fn state(&self) -> &ToolkitState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ToolkitState {
        &mut self.state
    }

    fn save(&mut self) -> BridgeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{read, shared, update};

    #[tokio::test]
    async fn test_update_and_read() {
        let store = shared(MemoryStateStore::default());
        assert!(!read(&store, |s| s.capturing).await);

        update(&store, |s| {
            s.capturing = true;
            Ok(())
        })
        .await
        .unwrap();
        assert!(read(&store, |s| s.capturing).await);
    }
}
