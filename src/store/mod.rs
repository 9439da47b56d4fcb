//! Capacity-bounded in-memory object store with transposition promotion.
//!
//! The store is a contiguous sequence of owned [`Object`]s. Index 0 is the
//! least-recently-used (cold) end, the highest index the most-recently-used
//! (hot) end. Lookups scan from the hot end and, on a hit, swap the object
//! one position hotter; frequently used keys drift toward the hot end
//! without a global sort. There is no hash index: linear scan plus the
//! [`crate::hashcmp`] gate is the design.
//!
//! A byte budget (`cap_remaining`) bounds the total [`Object::size`] of live
//! objects; every debit and credit is checked, and an operation that would
//! cross zero fails leaving the store unchanged.
//!
//! The store is not synchronized; the server confines it to the executor
//! thread.

use crate::config::{KEY_LEN_MAX, STRING_LEN_MAX};
use crate::hashcmp::keys_equal;
use crate::object::{Field, Object};
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failures of store mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The operation would exceed the remaining byte budget.
    ExceededSpaceLimit,
    /// The addressed key is not present.
    KeyNotFound,
    /// `rename` target key already exists.
    KeyReplacementExist,
    /// Key outside `[1, 255]` bytes or string payload above `u32::MAX`.
    TypeOverflow,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ExceededSpaceLimit => write!(f, "exceeded space limit"),
            StoreError::KeyNotFound => write!(f, "key not found"),
            StoreError::KeyReplacementExist => write!(f, "new name correspond to existent key"),
            StoreError::TypeOverflow => write!(f, "value too large for type"),
        }
    }
}

impl std::error::Error for StoreError {}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered object sequence with an LRU position policy and a byte budget.
pub struct Store {
    name: String,
    capacity: u64,
    cap_remaining: u64,
    objects: Vec<Object>,
}

impl Store {
    /// Creates an empty store named `name` with `capacity` bytes of budget.
    pub fn new(name: impl Into<String>, capacity: u64) -> Self {
        Store {
            name: name.into(),
            capacity,
            cap_remaining: capacity,
            objects: Vec::new(),
        }
    }

    /// Database name, as reported by `DB NAME`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initial byte budget.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Unused bytes of the budget.
    pub fn cap_remaining(&self) -> u64 {
        self.cap_remaining
    }

    /// Bytes consumed by live objects.
    pub fn used(&self) -> u64 {
        self.capacity - self.cap_remaining
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// `true` when no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Object at `index` (0 = cold end).
    pub fn at(&self, index: usize) -> &Object {
        &self.objects[index]
    }

    /// Mutable object at `index`.
    pub fn at_mut(&mut self, index: usize) -> &mut Object {
        &mut self.objects[index]
    }

    /// Iterates objects cold→hot.
    pub fn iter(&self) -> std::slice::Iter<'_, Object> {
        self.objects.iter()
    }

    /// Keys hot→cold, the order reported by `LIST`.
    pub fn list_keys(&self) -> Vec<&[u8]> {
        self.objects.iter().rev().map(|o| o.key.as_slice()).collect()
    }

    // ── Lookup and promotion ──────────────────────────────────────────────

    /// Position of `key` without promotion, or `None`.
    fn find(&self, key: &[u8]) -> Option<usize> {
        (0..self.objects.len())
            .rev()
            .find(|&i| keys_equal(&self.objects[i].key, key))
    }

    /// Swaps the element at `i` one position hotter and returns its new
    /// index. The hot-most element stays in place.
    fn promote(&mut self, i: usize) -> usize {
        if i + 1 < self.objects.len() {
            self.objects.swap(i, i + 1);
            i + 1
        } else {
            i
        }
    }

    /// Finds `key` scanning hot→cold and promotes the hit by one position.
    /// Returns the post-promotion index.
    pub fn search(&mut self, key: &[u8]) -> Option<usize> {
        let i = self.find(key)?;
        Some(self.promote(i))
    }

    /// Read hit: promotes, bumps metadata, and returns the object.
    pub fn get(&mut self, key: &[u8]) -> Option<&Object> {
        let i = self.search(key)?;
        self.objects[i].metadata.bump();
        Some(&self.objects[i])
    }

    /// Read/write hit with mutable access; promotes and bumps metadata.
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Object> {
        let i = self.search(key)?;
        self.objects[i].metadata.bump();
        Some(&mut self.objects[i])
    }

    // ── Insertion and update ──────────────────────────────────────────────

    fn check_shape(key: &[u8], field: &Field) -> Result<(), StoreError> {
        if key.is_empty() || key.len() > KEY_LEN_MAX {
            return Err(StoreError::TypeOverflow);
        }
        if let Field::String(s) = field {
            if s.len() as u64 > STRING_LEN_MAX {
                return Err(StoreError::TypeOverflow);
            }
        }
        Ok(())
    }

    /// Writes `field` under `key`.
    ///
    /// A missing key debits the object size from the budget and appends at
    /// the hot end. An existing key of the same field type is overwritten in
    /// place (strings reallocate only when the length changes); the budget is
    /// deliberately not re-computed on that path. A different-typed write
    /// replaces the object, crediting the old size and debiting the new,
    /// while preserving metadata with a single bump.
    ///
    /// Returns the index of the written object.
    pub fn put(&mut self, key: &[u8], field: Field) -> Result<usize, StoreError> {
        Self::check_shape(key, &field)?;

        if let Some(i) = self.search(key) {
            let same_type = self.objects[i].field.tag() == field.tag();
            if same_type {
                match (&mut self.objects[i].field, field) {
                    (Field::Integer(dst), Field::Integer(src)) => *dst = src,
                    (Field::Decimal(dst), Field::Decimal(src)) => *dst = src,
                    (Field::String(dst), Field::String(src)) => {
                        if dst.len() == src.len() {
                            dst.copy_from_slice(&src);
                        } else {
                            *dst = src;
                        }
                    }
                    _ => unreachable!("tag equality checked above"),
                }
            } else {
                let old_size = self.objects[i].size();
                let replacement = Object {
                    key: std::mem::take(&mut self.objects[i].key),
                    field,
                    metadata: self.objects[i].metadata,
                };
                let new_size = replacement.size();
                match self
                    .cap_remaining
                    .checked_add(old_size)
                    .and_then(|c| c.checked_sub(new_size))
                {
                    Some(c) => self.cap_remaining = c,
                    None => {
                        // Undo the key take and leave the store unchanged.
                        self.objects[i].key = replacement.key;
                        return Err(StoreError::ExceededSpaceLimit);
                    }
                }
                self.objects[i] = replacement;
            }
            self.objects[i].metadata.bump();
            return Ok(i);
        }

        let obj = Object::new(key.to_vec(), field);
        let size = obj.size();
        self.cap_remaining = self
            .cap_remaining
            .checked_sub(size)
            .ok_or(StoreError::ExceededSpaceLimit)?;
        self.objects.push(obj);
        Ok(self.objects.len() - 1)
    }

    /// Inserts a fully formed object at the hot end, replacing any object
    /// under the same key. Used by snapshot load and by `RESTORE`/`COPY`,
    /// which carry their own metadata.
    pub fn insert_object(&mut self, obj: Object) -> Result<usize, StoreError> {
        Self::check_shape(&obj.key, &obj.field)?;
        let new_size = obj.size();

        match self.find(&obj.key) {
            Some(i) => {
                let old_size = self.objects[i].size();
                let remaining = self
                    .cap_remaining
                    .checked_add(old_size)
                    .and_then(|c| c.checked_sub(new_size))
                    .ok_or(StoreError::ExceededSpaceLimit)?;
                self.cap_remaining = remaining;
                self.objects.remove(i);
            }
            None => {
                self.cap_remaining = self
                    .cap_remaining
                    .checked_sub(new_size)
                    .ok_or(StoreError::ExceededSpaceLimit)?;
            }
        }
        self.objects.push(obj);
        Ok(self.objects.len() - 1)
    }

    // ── Removal ───────────────────────────────────────────────────────────

    /// Removes and returns the object at `index`, crediting its size back.
    pub fn remove_at(&mut self, index: usize) -> Object {
        let obj = self.objects.remove(index);
        debug_assert!(self.cap_remaining + obj.size() <= self.capacity);
        self.cap_remaining = self.cap_remaining.saturating_add(obj.size());
        obj
    }

    /// Removes the object under `key`.
    pub fn remove(&mut self, key: &[u8]) -> Result<Object, StoreError> {
        let i = self.find(key).ok_or(StoreError::KeyNotFound)?;
        Ok(self.remove_at(i))
    }

    /// Drops every object and restores the full budget.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.cap_remaining = self.capacity;
    }

    // ── Rename ────────────────────────────────────────────────────────────

    /// Replaces the key bytes of `old` with `new`, adjusting the budget by
    /// the key-length delta.
    pub fn rename(&mut self, old: &[u8], new: &[u8]) -> Result<(), StoreError> {
        if new.is_empty() || new.len() > KEY_LEN_MAX {
            return Err(StoreError::TypeOverflow);
        }
        if self.find(new).is_some() {
            return Err(StoreError::KeyReplacementExist);
        }
        let i = self.find(old).ok_or(StoreError::KeyNotFound)?;

        if new.len() > old.len() {
            let growth = (new.len() - old.len()) as u64;
            self.cap_remaining = self
                .cap_remaining
                .checked_sub(growth)
                .ok_or(StoreError::ExceededSpaceLimit)?;
        } else {
            let shrink = (old.len() - new.len()) as u64;
            self.cap_remaining = self.cap_remaining.saturating_add(shrink);
        }
        self.objects[i].key = new.to_vec();
        Ok(())
    }

    // ── Explicit position control ─────────────────────────────────────────

    /// Swaps `key` with the hot-end element. O(1); breaks global LRU order.
    pub fn swap_with_head(&mut self, key: &[u8]) -> Result<(), StoreError> {
        let i = self.find(key).ok_or(StoreError::KeyNotFound)?;
        let last = self.objects.len() - 1;
        self.objects.swap(i, last);
        Ok(())
    }

    /// Swaps `key` with the cold-end element. O(1); breaks global LRU order.
    pub fn swap_with_tail(&mut self, key: &[u8]) -> Result<(), StoreError> {
        let i = self.find(key).ok_or(StoreError::KeyNotFound)?;
        self.objects.swap(i, 0);
        Ok(())
    }

    /// Removes `key` and re-inserts it at the hot end, preserving the
    /// relative order of the rest.
    pub fn move_to_head(&mut self, key: &[u8]) -> Result<(), StoreError> {
        let i = self.find(key).ok_or(StoreError::KeyNotFound)?;
        let obj = self.objects.remove(i);
        self.objects.push(obj);
        Ok(())
    }

    /// Removes `key` and re-inserts it at the cold end, preserving the
    /// relative order of the rest.
    pub fn move_to_tail(&mut self, key: &[u8]) -> Result<(), StoreError> {
        let i = self.find(key).ok_or(StoreError::KeyNotFound)?;
        let obj = self.objects.remove(i);
        self.objects.insert(0, obj);
        Ok(())
    }

    // ── Prefetch ──────────────────────────────────────────────────────────

    /// Insertion-sorts the sequence ascending by `last_access` (least recent
    /// at the cold end). Stable: equal timestamps keep their current order.
    /// Run after snapshot load and on the `SORT` command.
    pub fn prefetch(&mut self) {
        for i in 1..self.objects.len() {
            let mut j = i;
            while j > 0
                && self.objects[j - 1].metadata.last_access > self.objects[j].metadata.last_access
            {
                self.objects.swap(j - 1, j);
                j -= 1;
            }
        }
    }
}
