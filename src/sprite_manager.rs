use std::rc::Weak;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::sprite::{Sprite, Uid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UidPolicy {
    /// UIDs are never handed out twice within one level.
    #[default]
    Monotonic,
    /// The lowest free UID is reused after its sprite was removed.
    ReuseFreed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("UID 0 is reserved for the player.")]
    ReservedUid,
    #[error("UID {0} is already used by another active sprite.")]
    UidInUse(Uid),
    #[error("No free UID left in this level.")]
    UidsExhausted,
}

/// Receives removal notifications from a [`SpriteManager`].
///
/// Called synchronously from inside `remove`/`clear`, before the UID can be
/// handed out again.
pub trait RemovalListener {
    fn sprite_removed(&self, uid: Uid);
}

struct SpriteSlot {
    uid: Uid,
    sprite: Box<dyn Sprite>,
}

/// Owns every active sprite of a level.
pub struct SpriteManager {
    slots: Vec<SpriteSlot>,
    next_uid: u32,
    policy: UidPolicy,
    listeners: Vec<Weak<dyn RemovalListener>>,
}

impl SpriteManager {
    pub fn new(policy: UidPolicy) -> Self {
        Self { slots: Vec::new(), next_uid: 1, policy, listeners: Vec::new() }
    }

    pub fn subscribe(&mut self, listener: Weak<dyn RemovalListener>) {
        self.listeners.retain(|existing| existing.strong_count() > 0);
        self.listeners.push(listener);
    }

    pub fn insert(&mut self, requested: Option<Uid>, sprite: Box<dyn Sprite>) -> Result<Uid, LevelError> {
        let uid = match requested {
            Some(uid) if uid.is_player() => return Err(LevelError::ReservedUid),
            Some(uid) if self.contains(uid) => return Err(LevelError::UidInUse(uid)),
            Some(uid) => uid,
            None => self.allocate_uid()?,
        };
        self.next_uid = self.next_uid.max(uid.get().saturating_add(1));
        debug!(uid = uid.get(), kind = sprite.kind(), "sprite_added");
        self.slots.push(SpriteSlot { uid, sprite });
        Ok(uid)
    }

    fn allocate_uid(&self) -> Result<Uid, LevelError> {
        match self.policy {
            UidPolicy::Monotonic => {
                if self.next_uid == u32::MAX {
                    return Err(LevelError::UidsExhausted);
                }
                Ok(Uid::new(self.next_uid))
            }
            UidPolicy::ReuseFreed => (1..=u32::MAX)
                .map(Uid::new)
                .find(|uid| !self.contains(*uid))
                .ok_or(LevelError::UidsExhausted),
        }
    }

    /// Removes the sprite and notifies listeners before returning it.
    pub fn remove(&mut self, uid: Uid) -> Option<Box<dyn Sprite>> {
        let index = self.slots.iter().position(|slot| slot.uid == uid)?;
        let slot = self.slots.remove(index);
        debug!(uid = uid.get(), kind = slot.sprite.kind(), "sprite_removed");
        self.notify_removed(uid);
        Some(slot.sprite)
    }

    /// Drops every sprite, notifying for each one. Used on level teardown.
    pub fn clear(&mut self) -> Vec<(Uid, &'static str)> {
        let removed: Vec<_> = self.slots.drain(..).map(|slot| (slot.uid, slot.sprite.kind())).collect();
        for (uid, _) in &removed {
            self.notify_removed(*uid);
        }
        removed
    }

    fn notify_removed(&mut self, uid: Uid) {
        self.listeners.retain(|listener| match listener.upgrade() {
            Some(listener) => {
                listener.sprite_removed(uid);
                true
            }
            None => false,
        });
        trace!(uid = uid.get(), listeners = self.listeners.len(), "removal_notified");
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.slots.iter().any(|slot| slot.uid == uid)
    }

    pub fn get(&self, uid: Uid) -> Option<&dyn Sprite> {
        for slot in &self.slots {
            if slot.uid == uid {
                return Some(slot.sprite.as_ref());
            }
        }
        None
    }

    pub fn get_mut(&mut self, uid: Uid) -> Option<&mut dyn Sprite> {
        for slot in &mut self.slots {
            if slot.uid == uid {
                return Some(slot.sprite.as_mut());
            }
        }
        None
    }

    /// Active sprites in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Uid, &dyn Sprite)> + '_ {
        self.slots.iter().map(|slot| (slot.uid, slot.sprite.as_ref() as &dyn Sprite))
    }

    pub fn uids(&self) -> Vec<Uid> {
        self.slots.iter().map(|slot| slot.uid).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for SpriteManager {
    fn default() -> Self {
        Self::new(UidPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Decoration, Eato};
    use glam::Vec2;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<Uid>>);

    impl RemovalListener for Recorder {
        fn sprite_removed(&self, uid: Uid) {
            self.0.borrow_mut().push(uid);
        }
    }

    fn decoration() -> Box<dyn Sprite> {
        Box::new(Decoration::new(Vec2::ZERO, "bush.png"))
    }

    #[test]
    fn explicit_uids_are_honoured_and_allocation_continues_after_them() {
        let mut manager = SpriteManager::new(UidPolicy::Monotonic);
        assert_eq!(manager.insert(Some(Uid::new(7)), decoration()), Ok(Uid::new(7)));
        assert_eq!(manager.insert(None, decoration()), Ok(Uid::new(8)));
        assert_eq!(manager.insert(Some(Uid::new(7)), decoration()), Err(LevelError::UidInUse(Uid::new(7))));
        assert_eq!(manager.insert(Some(Uid::PLAYER), decoration()), Err(LevelError::ReservedUid));
        assert_eq!(manager.uids(), vec![Uid::new(7), Uid::new(8)]);
    }

    #[test]
    fn monotonic_policy_never_reuses() {
        let mut manager = SpriteManager::new(UidPolicy::Monotonic);
        let first = manager.insert(None, decoration()).expect("insert");
        manager.remove(first).expect("remove");
        let second = manager.insert(None, decoration()).expect("insert");
        assert_ne!(first, second);
    }

    #[test]
    fn reuse_policy_hands_out_lowest_free_uid() {
        let mut manager = SpriteManager::new(UidPolicy::ReuseFreed);
        for _ in 0..3 {
            manager.insert(None, decoration()).expect("insert");
        }
        manager.remove(Uid::new(2)).expect("remove");
        assert_eq!(manager.insert(None, Box::new(Eato::new(Vec2::ZERO))), Ok(Uid::new(2)));
        assert_eq!(manager.get(Uid::new(2)).map(|s| s.kind()), Some("eato"));
    }

    #[test]
    fn removal_and_clear_notify_listeners() {
        let recorder = Rc::new(Recorder::default());
        let listener: Rc<dyn RemovalListener> = recorder.clone();
        let mut manager = SpriteManager::default();
        manager.subscribe(Rc::downgrade(&listener));
        for _ in 0..3 {
            manager.insert(None, decoration()).expect("insert");
        }
        manager.remove(Uid::new(2));
        assert!(manager.remove(Uid::new(2)).is_none(), "second removal is a no-op");
        manager.clear();
        assert_eq!(*recorder.0.borrow(), vec![Uid::new(2), Uid::new(1), Uid::new(3)]);
        assert!(manager.is_empty());
    }

    #[test]
    fn dropped_listeners_are_pruned() {
        let mut manager = SpriteManager::default();
        {
            let listener: Rc<dyn RemovalListener> = Rc::new(Recorder::default());
            manager.subscribe(Rc::downgrade(&listener));
        }
        let uid = manager.insert(None, decoration()).expect("insert");
        manager.remove(uid);
        assert!(manager.listeners.is_empty());
    }
}
