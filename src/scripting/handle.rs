use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use rhai::Dynamic;

use crate::level::{Level, WeakLevel};
use crate::scripting::error::BridgeError;
use crate::sprite::{Sprite, Uid};

struct HandleInner {
    uid: Uid,
    level: WeakLevel,
    detached: Cell<bool>,
}

/// Non-owning association between a script object and its native counterpart.
///
/// Holds the UID and a weak level reference only; every access re-validates
/// against the level's sprite manager. Clones share identity. Once the
/// identity cache drops the entry the handle is detached for good, so a
/// stale object can never reach a newer sprite that reuses its UID.
#[derive(Clone)]
pub struct ObjectHandle(Rc<HandleInner>);

impl ObjectHandle {
    pub fn new(uid: Uid, level: WeakLevel) -> Self {
        Self(Rc::new(HandleInner { uid, level, detached: Cell::new(false) }))
    }

    pub fn uid(&self) -> Uid {
        self.0.uid
    }

    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn detach(&self) {
        self.0.detached.set(true);
    }

    pub fn is_detached(&self) -> bool {
        self.0.detached.get()
    }

    /// The UID, provided the handle has not been invalidated.
    pub fn attached_uid(&self) -> Result<Uid, BridgeError> {
        if self.is_detached() {
            return Err(BridgeError::SpriteGone(self.uid()));
        }
        Ok(self.uid())
    }

    pub fn with_level<R>(&self, f: impl FnOnce(&Level) -> R) -> Result<R, BridgeError> {
        let level = self.0.level.upgrade().ok_or(BridgeError::LevelUnloaded)?;
        let guard = level.try_borrow().map_err(|_| BridgeError::LevelBusy)?;
        let result = f(&guard);
        Ok(result)
    }

    pub fn with_level_mut<R>(&self, f: impl FnOnce(&mut Level) -> R) -> Result<R, BridgeError> {
        let level = self.0.level.upgrade().ok_or(BridgeError::LevelUnloaded)?;
        let mut guard = level.try_borrow_mut().map_err(|_| BridgeError::LevelBusy)?;
        let result = f(&mut guard);
        Ok(result)
    }

    pub fn with_sprite<R>(&self, f: impl FnOnce(&dyn Sprite) -> R) -> Result<R, BridgeError> {
        let uid = self.attached_uid()?;
        self.with_level(|level| level.sprites.get(uid).map(f))?.ok_or(BridgeError::SpriteGone(uid))
    }

    pub fn with_sprite_mut<R>(&self, f: impl FnOnce(&mut dyn Sprite) -> R) -> Result<R, BridgeError> {
        let uid = self.attached_uid()?;
        self.with_level_mut(|level| level.sprites.get_mut(uid).map(f))?.ok_or(BridgeError::SpriteGone(uid))
    }

    /// Registry membership. Never fails; an unloaded level has no live sprites.
    pub fn is_alive(&self) -> bool {
        let Ok(uid) = self.attached_uid() else { return false };
        if uid.is_player() {
            return self.0.level.upgrade().is_some();
        }
        self.with_level(|level| level.sprites.contains(uid)).unwrap_or(false)
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle").field("uid", &self.0.uid).field("detached", &self.is_detached()).finish()
    }
}

/// A script-visible wrapper type bound to one native object.
pub trait ScriptObject: Clone + 'static {
    /// Type name as seen by scripts (`type_of`).
    const CLASS: &'static str;

    fn handle(&self) -> &ObjectHandle;
}

/// A script value produced by a wrapper factory, plus the handle that gives it identity.
#[derive(Clone)]
pub struct Wrapper {
    value: Dynamic,
    handle: ObjectHandle,
    class: &'static str,
}

impl Wrapper {
    pub fn new<T: ScriptObject>(object: T) -> Self {
        let handle = object.handle().clone();
        Self { value: Dynamic::from(object), handle, class: T::CLASS }
    }

    pub fn uid(&self) -> Uid {
        self.handle.uid()
    }

    pub fn class(&self) -> &'static str {
        self.class
    }

    pub fn handle(&self) -> &ObjectHandle {
        &self.handle
    }

    /// True when both wrappers are the same script object, not merely equal.
    pub fn same_instance(&self, other: &Wrapper) -> bool {
        self.handle.ptr_eq(&other.handle)
    }

    pub fn to_dynamic(&self) -> Dynamic {
        self.value.clone()
    }

    pub fn cast<T: ScriptObject>(&self) -> Option<T> {
        self.value.clone().try_cast::<T>()
    }
}

impl fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.class, self.handle.uid())
    }
}
