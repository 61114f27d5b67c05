//! Persistent extension state: capture flag, entries and merge settings.

pub mod file;
pub mod store;

use std::sync::Arc;
use tokio::sync::Mutex;

use webtoolkit::ToolkitState;

use crate::types::BridgeResult;

pub use file::FileStateStore;
pub use store::MemoryStateStore;

/// Backing storage for [`ToolkitState`].
pub trait StateStore: Send {
    fn state(&self) -> &ToolkitState;

    /// Mutable access. Marks the state as changed.
    fn state_mut(&mut self) -> &mut ToolkitState;

    /// Persist pending changes.
    fn save(&mut self) -> BridgeResult<()>;
}

pub type SharedStore = Arc<Mutex<dyn StateStore>>;

pub fn shared<S: StateStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Apply `f` to the state and persist the result.
pub async fn update<T>(
    store: &SharedStore,
    f: impl FnOnce(&mut ToolkitState) -> BridgeResult<T>,
) -> BridgeResult<T> {
    let mut store = store.lock().await;
    let out = f(store.state_mut())?;
    store.save()?;
    Ok(out)
}

pub async fn read<T>(store: &SharedStore, f: impl FnOnce(&ToolkitState) -> T) -> T {
    let store = store.lock().await;
    f(store.state())
}
