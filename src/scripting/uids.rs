//! The `UIDS` module: lazy script objects for level sprites.
//!
//! Sprites have no script object until a script first asks `UIDS[uid]` for
//! them, which keeps level start cheap. The first lookup of a UID walks every
//! active sprite and asks the matching one to build its own script object;
//! the result is cached so later lookups return the very same object, which
//! is what event handlers rely on. The cache is the only strong owner of
//! those objects and is purged through the sprite manager's removal
//! notifications.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::{Range, RangeInclusive};
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, EvalAltResult, INT};
use tracing::{debug, trace};

use crate::level::WeakLevel;
use crate::scripting::error::BridgeError;
use crate::scripting::handle::{ObjectHandle, Wrapper};
use crate::sprite::Uid;
use crate::sprite_manager::RemovalListener;

/// Longest UID range a single `resolve_range` call will walk.
pub const MAX_RANGE_LEN: INT = 4096;

/// Counters for cache behaviour. `visited` counts sprites inspected by scans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub lookups: u64,
    pub hits: u64,
    pub scans: u64,
    pub visited: u64,
}

/// UID to script object map. At most one object per UID is ever live.
pub struct IdentityCache {
    entries: RefCell<HashMap<Uid, Wrapper>>,
    stats: Cell<ResolveStats>,
}

impl IdentityCache {
    /// A fresh cache for one level, holding only the player at UID 0.
    pub fn new(player: Wrapper) -> Self {
        let mut entries = HashMap::new();
        entries.insert(Uid::PLAYER, player);
        Self { entries: RefCell::new(entries), stats: Cell::new(ResolveStats::default()) }
    }

    pub fn get(&self, uid: Uid) -> Option<Wrapper> {
        self.entries.borrow().get(&uid).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Cached UIDs in no particular order.
    pub fn uids(&self) -> Vec<Uid> {
        self.entries.borrow().keys().copied().collect()
    }

    pub fn stats(&self) -> ResolveStats {
        self.stats.get()
    }

    fn insert(&self, wrapper: Wrapper) {
        self.entries.borrow_mut().insert(wrapper.uid(), wrapper);
    }

    /// Drops the entry for `uid` and detaches its handle.
    pub fn forget(&self, uid: Uid) -> bool {
        let removed = self.entries.borrow_mut().remove(&uid);
        match removed {
            Some(wrapper) => {
                wrapper.handle().detach();
                debug!(uid = uid.get(), class = wrapper.class(), "uid_cache_evicted");
                true
            }
            None => false,
        }
    }

    /// Drops every entry, the player included. Used when the level goes away.
    pub fn clear(&self) {
        let drained: Vec<Wrapper> = self.entries.borrow_mut().drain().map(|(_, wrapper)| wrapper).collect();
        for wrapper in &drained {
            wrapper.handle().detach();
        }
    }

    fn record(&self, update: impl FnOnce(&mut ResolveStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

impl RemovalListener for IdentityCache {
    fn sprite_removed(&self, uid: Uid) {
        if uid.is_player() {
            return;
        }
        self.forget(uid);
    }
}

/// The script-facing `UIDS` value.
#[derive(Clone)]
pub struct UidTable {
    cache: Rc<IdentityCache>,
    level: WeakLevel,
}

impl UidTable {
    pub fn new(cache: Rc<IdentityCache>, level: WeakLevel) -> Self {
        Self { cache, level }
    }

    pub fn cache(&self) -> &Rc<IdentityCache> {
        &self.cache
    }

    /// Cached object for `uid`, or the object built by its sprite on first use.
    /// `Ok(None)` means no live, script-visible sprite has that UID.
    pub fn resolve(&self, uid: Uid) -> Result<Option<Wrapper>, BridgeError> {
        self.cache.record(|stats| stats.lookups += 1);
        if let Some(hit) = self.cache.get(uid) {
            self.cache.record(|stats| stats.hits += 1);
            return Ok(Some(hit));
        }

        let level = self.level.upgrade().ok_or(BridgeError::LevelUnloaded)?;
        let created = {
            let level = level.try_borrow().map_err(|_| BridgeError::LevelBusy)?;
            let mut visited = 0u64;
            let mut created = None;
            for (candidate, sprite) in level.sprites.iter() {
                visited += 1;
                if candidate == uid {
                    created = sprite.create_script_object(ObjectHandle::new(uid, self.level.clone()));
                    if created.is_none() {
                        trace!(uid = uid.get(), kind = sprite.kind(), "uid_hidden_from_scripts");
                    }
                    break;
                }
            }
            self.cache.record(|stats| {
                stats.scans += 1;
                stats.visited += visited;
            });
            created
        };

        if let Some(wrapper) = &created {
            debug!(uid = uid.get(), class = wrapper.class(), "uid_cache_filled");
            self.cache.insert(wrapper.clone());
        }
        Ok(created)
    }

    /// One entry per UID in `start..=end`, `None` where nothing resolved.
    /// Both bound checks run before any lookup.
    pub fn resolve_range(&self, start: INT, end: INT) -> Result<Vec<Option<Wrapper>>, BridgeError> {
        if start > end {
            return Err(BridgeError::InvalidUidRange { start, end });
        }
        match end.checked_sub(start) {
            Some(span) if span < MAX_RANGE_LEN => {}
            _ => return Err(BridgeError::UidRangeTooLong { start, end, limit: MAX_RANGE_LEN }),
        }
        (start..=end)
            .map(|raw| match Uid::from_script(raw) {
                Some(uid) => self.resolve(uid),
                None => Ok(None),
            })
            .collect()
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn cached_uids(&self) -> Vec<Uid> {
        self.cache.uids()
    }

    fn index_uid(&mut self, raw: INT) -> Result<Dynamic, Box<EvalAltResult>> {
        let resolved = match Uid::from_script(raw) {
            Some(uid) => self.resolve(uid)?,
            None => None,
        };
        Ok(into_script(resolved))
    }

    fn index_inclusive(&mut self, range: RangeInclusive<INT>) -> Result<Dynamic, Box<EvalAltResult>> {
        let (start, end) = range.into_inner();
        self.index_bounds(start, end)
    }

    fn index_exclusive(&mut self, range: Range<INT>) -> Result<Dynamic, Box<EvalAltResult>> {
        let end = range.end.checked_sub(1).ok_or(BridgeError::InvalidUidRange { start: range.start, end: range.end })?;
        self.index_bounds(range.start, end)
    }

    fn index_bounds(&mut self, start: INT, end: INT) -> Result<Dynamic, Box<EvalAltResult>> {
        let resolved = self.resolve_range(start, end)?;
        let array: Array = resolved.into_iter().map(into_script).collect();
        Ok(Dynamic::from_array(array))
    }

    fn index_other(&mut self, arg: Dynamic) -> Result<Dynamic, Box<EvalAltResult>> {
        Err(BridgeError::InvalidUidType(arg.type_name().to_string()).into())
    }

    fn script_cache_size(&mut self) -> INT {
        INT::try_from(self.cache_size()).unwrap_or(INT::MAX)
    }

    fn script_cached_uids(&mut self) -> Array {
        self.cached_uids().into_iter().map(|uid| Dynamic::from(uid.to_script())).collect()
    }
}

fn into_script(resolved: Option<Wrapper>) -> Dynamic {
    resolved.map_or(Dynamic::UNIT, |wrapper| wrapper.to_dynamic())
}

pub fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<UidTable>("UIDS")
        .register_indexer_get(UidTable::index_uid)
        .register_indexer_get(UidTable::index_inclusive)
        .register_indexer_get(UidTable::index_exclusive)
        .register_indexer_get(UidTable::index_other)
        .register_get("cache_size", UidTable::script_cache_size)
        .register_fn("cache_size", UidTable::script_cache_size)
        .register_get("cached_uids", UidTable::script_cached_uids)
        .register_fn("cached_uids", UidTable::script_cached_uids)
        .register_fn("to_string", |table: &mut UidTable| format!("#<UIDS cached={}>", table.cache_size()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{Level, LevelHandle};
    use crate::objects::{Eato, ParticleEmitter};
    use crate::scripting::player::PlayerObject;
    use crate::sprite_manager::UidPolicy;
    use glam::Vec2;

    fn table_for(level: &LevelHandle) -> UidTable {
        let weak = level.downgrade();
        let player = Wrapper::new(PlayerObject::new(ObjectHandle::new(Uid::PLAYER, weak.clone())));
        UidTable::new(Rc::new(IdentityCache::new(player)), weak)
    }

    #[test]
    fn hidden_sprites_never_enter_the_cache() {
        let level = LevelHandle::new(Level::new("hidden", UidPolicy::Monotonic));
        let uid = level.borrow_mut().spawn(Box::new(ParticleEmitter::new(Vec2::ZERO, 4.0))).expect("spawn");
        let table = table_for(&level);
        assert!(table.resolve(uid).expect("resolve").is_none());
        assert!(table.resolve(uid).expect("resolve").is_none());
        assert_eq!(table.cache_size(), 1);
        assert_eq!(table.cache().stats().scans, 2, "hidden sprites are rescanned on every lookup");
    }

    #[test]
    fn forget_detaches_the_evicted_handle() {
        let level = LevelHandle::new(Level::new("detach", UidPolicy::Monotonic));
        let uid = level.borrow_mut().spawn(Box::new(Eato::new(Vec2::ZERO))).expect("spawn");
        let table = table_for(&level);
        let wrapper = table.resolve(uid).expect("resolve").expect("eato is visible");
        assert!(table.cache().forget(uid));
        assert!(!table.cache().forget(uid));
        assert!(wrapper.handle().is_detached());
        assert_eq!(wrapper.handle().attached_uid(), Err(BridgeError::SpriteGone(uid)));
    }

    #[test]
    fn negative_and_oversized_indices_resolve_to_nothing() {
        let level = LevelHandle::new(Level::new("bounds", UidPolicy::Monotonic));
        let table = table_for(&level);
        let range = table.resolve_range(-2, 0).expect("range");
        assert_eq!(range.len(), 3);
        assert!(range[0].is_none() && range[1].is_none());
        assert_eq!(range[2].as_ref().map(Wrapper::class), Some("Player"));
        assert_eq!(table.cache().stats().scans, 0);
    }

    #[test]
    fn range_length_is_capped_before_any_lookup() {
        let level = LevelHandle::new(Level::new("cap", UidPolicy::Monotonic));
        let table = table_for(&level);
        assert_eq!(table.resolve_range(0, MAX_RANGE_LEN - 1).expect("at the cap").len(), 4096);
        let before = table.cache().stats();

        let err = table.resolve_range(0, MAX_RANGE_LEN).err();
        assert_eq!(err, Some(BridgeError::UidRangeTooLong { start: 0, end: MAX_RANGE_LEN, limit: MAX_RANGE_LEN }));
        let err = table.resolve_range(INT::MIN, INT::MAX).err();
        assert_eq!(err, Some(BridgeError::UidRangeTooLong { start: INT::MIN, end: INT::MAX, limit: MAX_RANGE_LEN }));
        assert_eq!(table.cache().stats(), before);
    }

    #[test]
    fn unloaded_level_is_reported_on_miss_only() {
        let level = LevelHandle::new(Level::new("gone", UidPolicy::Monotonic));
        let table = table_for(&level);
        drop(level);
        assert!(table.resolve(Uid::PLAYER).expect("cached hit").is_some());
        assert_eq!(table.resolve(Uid::new(9)).err(), Some(BridgeError::LevelUnloaded));
    }
}
