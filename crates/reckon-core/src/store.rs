//! Item store contract and catalogs.
//!
//! The session consumes stores through [`ItemStore::search`] only. A
//! [`Catalog`] opens a fresh store whenever a session starts iterating.
//!
//! # Search contract
//!
//! - Items come back in fixed catalog order.
//! - The cursor advances by every slot examined, matching or not, so
//!   resubmitting the returned cursor yields the next page.
//! - Fewer than `limit` items (possibly zero) means the catalog is exhausted
//!   from the starting cursor. There is no separate "has more" flag.

use std::{collections::BTreeSet, sync::Arc};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use reckon_proto::{Item, ItemA, ItemB, ItemC, ItemKinds};

use crate::env::Environment;

/// Query side of an item store.
pub trait ItemStore: Send + Sync {
    /// Up to `limit` items of an allowed kind, starting at `*cursor`.
    fn search(&self, allowed: ItemKinds, cursor: &mut usize, limit: usize) -> Vec<Item>;
}

/// Source of item stores.
pub trait Catalog: Clone + Send + Sync + 'static {
    /// Store type this catalog opens.
    type Store: ItemStore;

    /// Open a store bounded by the session's configured `limit`.
    fn open(&self, limit: u32) -> Self::Store;
}

/// Store backed by an in-memory slot list.
#[derive(Debug, Clone, Default)]
pub struct SlotStore {
    slots: Vec<Item>,
}

impl SlotStore {
    /// Store serving `slots` in order.
    pub fn new(slots: Vec<Item>) -> Self {
        Self { slots }
    }

    /// Number of catalog slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the store has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots in catalog order.
    pub fn slots(&self) -> &[Item] {
        &self.slots
    }
}

impl ItemStore for SlotStore {
    fn search(&self, allowed: ItemKinds, cursor: &mut usize, limit: usize) -> Vec<Item> {
        let mut found = Vec::with_capacity(limit.min(self.slots.len()));

        while found.len() < limit {
            let Some(item) = self.slots.get(*cursor) else {
                break;
            };
            *cursor += 1;

            if allowed.allows(item.kind()) {
                found.push(item.clone());
            }
        }

        found
    }
}

/// Catalog serving the same fixed item list to every session.
///
/// The configured limit is ignored.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: Arc<[Item]>,
}

impl StaticCatalog {
    /// Catalog over `items`.
    pub fn new(items: impl Into<Arc<[Item]>>) -> Self {
        Self { items: items.into() }
    }
}

impl Catalog for StaticCatalog {
    type Store = SlotStore;

    fn open(&self, _limit: u32) -> SlotStore {
        SlotStore::new(self.items.to_vec())
    }
}

/// Catalog generating `limit` random slots per session.
///
/// Each open draws a fresh seed from the environment, so two sessions see
/// different catalogs while a seeded environment still reproduces both.
#[derive(Debug, Clone)]
pub struct RandomCatalog<E: Environment> {
    env: E,
}

impl<E: Environment> RandomCatalog<E> {
    /// Catalog drawing seeds from `env`.
    pub fn new(env: E) -> Self {
        Self { env }
    }
}

impl<E: Environment> Catalog for RandomCatalog<E> {
    type Store = SlotStore;

    fn open(&self, limit: u32) -> SlotStore {
        let seed = self.env.random_u64();
        tracing::debug!(seed, limit, "generating catalog");
        generate_slots(seed, limit as usize)
    }
}

/// Generate `count` random slots from `seed`.
pub fn generate_slots(seed: u64, count: usize) -> SlotStore {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    SlotStore::new((0..count).map(|_| random_item(&mut rng)).collect())
}

fn random_item(rng: &mut impl Rng) -> Item {
    match rng.gen_range(0..3) {
        0 => Item::A(ItemA {
            field_x: random_word(rng),
            field_y: (0..rng.gen_range(0..=4)).map(|_| rng.r#gen::<i16>()).collect(),
            field_z: rng.gen_bool(0.5).then(|| rng.r#gen::<i32>()),
        }),
        1 => Item::B(ItemB {
            field_x: rng.r#gen::<i16>(),
            field_y: rng
                .gen_bool(0.5)
                .then(|| (0..rng.gen_range(0..=4)).map(|_| random_word(rng)).collect()),
            field_z: (0..rng.gen_range(0..=4)).map(|_| random_word(rng)).collect::<BTreeSet<_>>(),
        }),
        _ => Item::C(ItemC { field_x: rng.gen_bool(0.5) }),
    }
}

fn random_word(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(1..=8);
    (0..len).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect()
}

#[cfg(test)]
mod tests {
    use reckon_proto::ItemKind;

    use super::*;

    fn a(x: &str) -> Item {
        Item::A(ItemA { field_x: x.to_string(), field_y: vec![], field_z: None })
    }

    fn c(x: bool) -> Item {
        Item::C(ItemC { field_x: x })
    }

    #[test]
    fn search_skips_disallowed_slots_and_counts_them() {
        let store = SlotStore::new(vec![a("1"), c(true), a("2"), c(false), a("3")]);
        let mut cursor = 0;

        let found = store.search(ItemKinds::A, &mut cursor, 2);
        assert_eq!(found, vec![a("1"), a("2")]);
        assert_eq!(cursor, 3);

        let found = store.search(ItemKinds::A, &mut cursor, 2);
        assert_eq!(found, vec![a("3")]);
        assert_eq!(cursor, 5);

        let found = store.search(ItemKinds::A, &mut cursor, 2);
        assert!(found.is_empty());
        assert_eq!(cursor, 5);
    }

    #[test]
    fn search_with_zero_limit_examines_nothing() {
        let store = SlotStore::new(vec![a("1")]);
        let mut cursor = 0;
        assert!(store.search(ItemKinds::all(), &mut cursor, 0).is_empty());
        assert_eq!(cursor, 0);
    }

    #[test]
    fn search_past_end_is_empty() {
        let store = SlotStore::new(vec![a("1")]);
        let mut cursor = 7;
        assert!(store.search(ItemKinds::all(), &mut cursor, 3).is_empty());
        assert_eq!(cursor, 7);
    }

    #[test]
    fn static_catalog_ignores_limit() {
        let catalog = StaticCatalog::new(vec![a("1"), a("2"), a("3")]);
        assert_eq!(catalog.open(1).len(), 3);
    }

    #[test]
    fn generated_slots_are_reproducible() {
        let first = generate_slots(99, 32);
        let second = generate_slots(99, 32);
        assert_eq!(first.len(), 32);
        assert_eq!(first.slots(), second.slots());
    }

    #[test]
    fn generated_slots_cover_every_kind() {
        let store = generate_slots(7, 300);
        for kind in ItemKind::ALL {
            assert!(store.slots().iter().any(|item| item.kind() == kind), "no {kind} generated");
        }
    }
}
