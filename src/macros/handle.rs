//! Process-wide macro manager handle.
//!
//! Holds the installed manager plus a stack of scoped overrides. The newest
//! override wins; dropping its guard removes it again, so the previous
//! instance is back in place even if the scope unwinds.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::factory::InstructionFactoryRegistry;
use super::manager::MacroManager;

#[derive(Default)]
struct GlobalHandle {
    current: Option<Arc<MacroManager>>,
    overrides: Vec<Arc<MacroManager>>,
}

static HANDLE: OnceLock<Mutex<GlobalHandle>> = OnceLock::new();

fn handle() -> &'static Mutex<GlobalHandle> {
    HANDLE.get_or_init(|| Mutex::new(GlobalHandle::default()))
}

/// Install `manager` as the process-wide instance, returning the previous one.
pub fn install(manager: Arc<MacroManager>) -> Option<Arc<MacroManager>> {
    debug!(manager_id = manager.id(), "Installing macro manager");
    handle().lock().current.replace(manager)
}

/// The active manager: the newest override, else the installed instance.
///
/// If nothing was installed, an in-memory manager without instruction
/// factories is created and installed.
pub fn current() -> Arc<MacroManager> {
    let mut handle = handle().lock();
    if let Some(manager) = handle.overrides.last() {
        return manager.clone();
    }
    handle.current.get_or_insert_with(fallback_manager).clone()
}

// Playback through this manager fails for every instruction id.
fn fallback_manager() -> Arc<MacroManager> {
    let manager = Arc::new(MacroManager::in_memory(InstructionFactoryRegistry::new()));
    warn!(
        manager_id = manager.id(),
        "No macro manager installed, created an in-memory one without instruction factories"
    );
    manager
}

/// Make `manager` the active instance until the returned guard is dropped.
#[must_use = "the temporary instance is removed when the guard is dropped"]
pub fn with_temporary_default_instance(manager: Arc<MacroManager>) -> TemporaryInstanceGuard {
    debug!(manager_id = manager.id(), "Pushing temporary macro manager");
    handle().lock().overrides.push(manager.clone());
    TemporaryInstanceGuard { manager }
}

pub struct TemporaryInstanceGuard {
    manager: Arc<MacroManager>,
}

impl TemporaryInstanceGuard {
    pub fn manager(&self) -> &Arc<MacroManager> {
        &self.manager
    }
}

impl Drop for TemporaryInstanceGuard {
    fn drop(&mut self) {
        let mut handle = handle().lock();
        if let Some(pos) = handle
            .overrides
            .iter()
            .rposition(|m| Arc::ptr_eq(m, &self.manager))
        {
            handle.overrides.remove(pos);
        }
        debug!(manager_id = self.manager.id(), "Removed temporary macro manager");
    }
}
