use std::ffi::c_void;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::plugin_system::error::BridgeError;

const HALF_BITS: u32 = usize::BITS / 2;
const HALF_MASK: usize = (1 << HALF_BITS) - 1;
/// Generations wrap inside the half of the encoded word reserved for them.
const GENERATION_MASK: u32 = HALF_MASK as u32;
/// Index 0 encodes as 1 so that a valid handle is never a null context.
const MAX_SLOTS: usize = HALF_MASK - 1;

/// Reference to one plugin instance in an [`InstanceTable`].
///
/// The host only ever sees it as an opaque pointer-sized value stored in its
/// `remote_context`; the value is never dereferenced. A handle whose slot was
/// released or reused fails lookup because its generation no longer matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    index: u32,
    generation: u32,
}

impl InstanceHandle {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    pub fn to_raw(self) -> usize {
        ((self.generation as usize & HALF_MASK) << HALF_BITS) | ((self.index as usize + 1) & HALF_MASK)
    }

    /// `None` for zero, which is what a null context encodes to.
    pub fn from_raw(raw: usize) -> Option<Self> {
        let low = raw & HALF_MASK;
        if low == 0 {
            return None;
        }
        Some(Self {
            index: (low - 1) as u32,
            generation: (raw >> HALF_BITS) as u32,
        })
    }

    pub fn into_context(self) -> *mut c_void {
        std::ptr::without_provenance_mut(self.to_raw())
    }

    pub fn from_context(context: *mut c_void) -> Option<Self> {
        Self::from_raw(context.addr())
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Where an instance is in its lifecycle.
///
/// Flushing happens in `Initialized`; there is no separate stored state for
/// it because concurrent flushes only ever read the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Unregistered,
    Registered,
    Initialized,
    InitFailed,
    Exited,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Unregistered => "unregistered",
            LifecycleState::Registered => "registered",
            LifecycleState::Initialized => "initialized",
            LifecycleState::InitFailed => "init-failed",
            LifecycleState::Exited => "exited",
        };
        f.write_str(name)
    }
}

/// One plugin value and its lifecycle bookkeeping.
///
/// `plugin` is `None` once the value has been released: after a failed init
/// or on exit.
#[derive(Debug)]
pub(crate) struct Instance<P> {
    pub(crate) plugin: Option<P>,
    pub(crate) state: LifecycleState,
    pub(crate) flushes: AtomicU64,
}

impl<P> Instance<P> {
    pub(crate) fn new(plugin: P) -> Self {
        Self {
            plugin: Some(plugin),
            state: LifecycleState::Registered,
            flushes: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_flush(&self) -> u64 {
        self.flushes.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub(crate) type SharedInstance<P> = Arc<RwLock<Instance<P>>>;

// Plugin calls are wrapped in catch_unwind while a guard is held, so a
// poisoned lock can only come from a bug in the bridge itself; the state
// check after locking still guards the lifecycle.
pub(crate) fn read_instance<P>(entry: &RwLock<Instance<P>>) -> RwLockReadGuard<'_, Instance<P>> {
    entry.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write_instance<P>(entry: &RwLock<Instance<P>>) -> RwLockWriteGuard<'_, Instance<P>> {
    entry.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Slot<P> {
    generation: u32,
    entry: Option<SharedInstance<P>>,
}

struct Slots<P> {
    slots: Vec<Slot<P>>,
    free: Vec<u32>,
    primary: Option<InstanceHandle>,
}

impl<P> Slots<P> {
    fn first_live(&self) -> Option<InstanceHandle> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            slot.entry.as_ref().map(|_| InstanceHandle {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }
}

/// Owner of every live instance of one plugin type.
///
/// One live instance is the primary, the target of the host's context-less
/// entry points. The first instance inserted takes the role; when the primary
/// is removed, the live instance with the lowest slot index inherits it.
pub struct InstanceTable<P> {
    inner: RwLock<Slots<P>>,
}

impl<P> InstanceTable<P> {
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
                primary: None,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots<P>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots<P>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn insert(&self, instance: Instance<P>) -> Result<InstanceHandle, BridgeError> {
        let entry = Arc::new(RwLock::new(instance));
        let mut table = self.write();

        let handle = if let Some(index) = table.free.pop() {
            let slot = &mut table.slots[index as usize];
            slot.entry = Some(entry);
            InstanceHandle {
                index,
                generation: slot.generation,
            }
        } else {
            if table.slots.len() >= MAX_SLOTS {
                return Err(BridgeError::contract("init", "instance table is full"));
            }
            let index = table.slots.len() as u32;
            table.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            InstanceHandle { index, generation: 0 }
        };

        if table.primary.is_none() {
            table.primary = Some(handle);
        }
        Ok(handle)
    }

    pub(crate) fn get(&self, handle: InstanceHandle) -> Option<SharedInstance<P>> {
        let table = self.read();
        let slot = table.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.clone()
    }

    /// Detaches the instance and retires the handle.
    pub(crate) fn remove(&self, handle: InstanceHandle) -> Option<SharedInstance<P>> {
        let mut table = self.write();
        let slot = table.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1) & GENERATION_MASK;
        table.free.push(handle.index);
        if table.primary == Some(handle) {
            table.primary = table.first_live();
        }
        Some(entry)
    }

    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn primary(&self) -> Option<InstanceHandle> {
        self.read().primary
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.read().slots.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P> Default for InstanceTable<P> {
    fn default() -> Self {
        Self::new()
    }
}
