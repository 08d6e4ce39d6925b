//! Catalog item variants.
//!
//! The catalog serves three item shapes. Every shape knows its [`ItemKind`]
//! and its canonical summary text (see [`SummaryText`]). Server and client
//! fold items into summaries through the same text, so the rendering rules
//! here are part of the protocol: changing them breaks verification for every
//! peer built against the old rules.

use std::{collections::BTreeSet, fmt, str::FromStr};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Placeholder rendered for an absent optional field.
const NONE_TEXT: &str = "none";

/// Item shape tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    /// String, sequence of `i16`, optional `i32`.
    A,
    /// `i16`, optional sequence of strings, set of strings.
    B,
    /// Single boolean.
    C,
}

impl ItemKind {
    /// Every kind, in catalog order.
    pub const ALL: [Self; 3] = [Self::A, Self::B, Self::C];

    /// Wire identifier of this kind (also the summary key).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "ItemA",
            Self::B => "ItemB",
            Self::C => "ItemC",
        }
    }

    /// Single-member flag set for this kind.
    pub const fn flag(self) -> ItemKinds {
        match self {
            Self::A => ItemKinds::A,
            Self::B => ItemKinds::B,
            Self::C => ItemKinds::C,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A kind name that does not match any [`ItemKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown item kind: {0:?}")]
pub struct UnknownItemKind(pub String);

impl FromStr for ItemKind {
    type Err = UnknownItemKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownItemKind(s.to_string()))
    }
}

bitflags! {
    /// Set of item kinds a session is allowed to iterate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ItemKinds: u8 {
        /// [`ItemKind::A`]
        const A = 0b001;
        /// [`ItemKind::B`]
        const B = 0b010;
        /// [`ItemKind::C`]
        const C = 0b100;
    }
}

impl ItemKinds {
    /// Parse a set of wire identifiers.
    ///
    /// Fails on the first unknown name. An empty input yields an empty set;
    /// callers decide whether that is acceptable.
    pub fn from_names<I, S>(names: I) -> Result<Self, UnknownItemKind>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Self::empty(), |set, name| {
            name.as_ref().parse::<ItemKind>().map(|kind| set | kind.flag())
        })
    }

    /// Whether `kind` is a member of this set.
    pub fn allows(self, kind: ItemKind) -> bool {
        self.contains(kind.flag())
    }

    /// Members of this set, in catalog order.
    pub fn kinds(self) -> impl Iterator<Item = ItemKind> {
        ItemKind::ALL.into_iter().filter(move |kind| self.allows(*kind))
    }

    /// Wire identifiers of the members.
    pub fn names(self) -> BTreeSet<String> {
        self.kinds().map(|kind| kind.as_str().to_string()).collect()
    }
}

/// Canonical text an item contributes to a summary.
pub trait SummaryText {
    /// Kind the implementing shape belongs to.
    const KIND: ItemKind;

    /// Render the item. Must be identical on every peer.
    fn summary_text(&self) -> String;
}

/// Item of kind A.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemA {
    /// Free-form label.
    pub field_x: String,
    /// Ordered readings.
    pub field_y: Vec<i16>,
    /// Optional weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_z: Option<i32>,
}

/// Item of kind B.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemB {
    /// Code.
    pub field_x: i16,
    /// Optional ordered tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_y: Option<Vec<String>>,
    /// Unordered labels.
    pub field_z: BTreeSet<String>,
}

/// Item of kind C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemC {
    /// Flag.
    pub field_x: bool,
}

fn join<T: fmt::Display>(values: impl IntoIterator<Item = T>) -> String {
    values.into_iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

impl SummaryText for ItemA {
    const KIND: ItemKind = ItemKind::A;

    fn summary_text(&self) -> String {
        let z = self.field_z.map_or_else(|| NONE_TEXT.to_string(), |z| z.to_string());
        format!("x={};y={};z={}", self.field_x, join(&self.field_y), z)
    }
}

impl SummaryText for ItemB {
    const KIND: ItemKind = ItemKind::B;

    fn summary_text(&self) -> String {
        let y = self.field_y.as_ref().map_or_else(|| NONE_TEXT.to_string(), |y| join(y));
        format!("x={};y={};z={}", self.field_x, y, join(&self.field_z))
    }
}

impl SummaryText for ItemC {
    const KIND: ItemKind = ItemKind::C;

    fn summary_text(&self) -> String {
        format!("x={}", self.field_x)
    }
}

/// Any catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Item {
    /// Kind A item.
    A(ItemA),
    /// Kind B item.
    B(ItemB),
    /// Kind C item.
    C(ItemC),
}

impl Item {
    /// Shape tag of this item.
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::A(_) => ItemA::KIND,
            Self::B(_) => ItemB::KIND,
            Self::C(_) => ItemC::KIND,
        }
    }

    /// Canonical summary text of the wrapped item.
    pub fn summary_text(&self) -> String {
        match self {
            Self::A(item) => item.summary_text(),
            Self::B(item) => item.summary_text(),
            Self::C(item) => item.summary_text(),
        }
    }
}

impl From<ItemA> for Item {
    fn from(item: ItemA) -> Self {
        Self::A(item)
    }
}

impl From<ItemB> for Item {
    fn from(item: ItemB) -> Self {
        Self::B(item)
    }
}

impl From<ItemC> for Item {
    fn from(item: ItemC) -> Self {
        Self::C(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_roundtrip_through_from_str() {
        for kind in ItemKind::ALL {
            assert_eq!(kind.as_str().parse::<ItemKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_kind_name_is_rejected() {
        let err = "ItemD".parse::<ItemKind>().unwrap_err();
        assert_eq!(err, UnknownItemKind("ItemD".to_string()));
    }

    #[test]
    fn kinds_from_names() {
        let kinds = ItemKinds::from_names(["ItemA", "ItemC"]).unwrap();
        assert!(kinds.allows(ItemKind::A));
        assert!(!kinds.allows(ItemKind::B));
        assert!(kinds.allows(ItemKind::C));
        assert_eq!(kinds.kinds().collect::<Vec<_>>(), vec![ItemKind::A, ItemKind::C]);
    }

    #[test]
    fn kinds_from_names_fails_on_unknown() {
        assert!(ItemKinds::from_names(["ItemA", "itema"]).is_err());
    }

    #[test]
    fn kinds_names_are_wire_identifiers() {
        let names = (ItemKinds::A | ItemKinds::B).names();
        assert_eq!(names, BTreeSet::from(["ItemA".to_string(), "ItemB".to_string()]));
    }

    #[test]
    fn item_a_text() {
        let item = ItemA { field_x: "abc".to_string(), field_y: vec![1, -2, 3], field_z: Some(7) };
        assert_eq!(item.summary_text(), "x=abc;y=1,-2,3;z=7");

        let item = ItemA { field_x: String::new(), field_y: vec![], field_z: None };
        assert_eq!(item.summary_text(), "x=;y=;z=none");
    }

    #[test]
    fn item_b_text_sorts_set_members() {
        let item = ItemB {
            field_x: -4,
            field_y: Some(vec!["b".to_string(), "a".to_string()]),
            field_z: BTreeSet::from(["zeta".to_string(), "alpha".to_string()]),
        };
        assert_eq!(item.summary_text(), "x=-4;y=b,a;z=alpha,zeta");

        let item = ItemB { field_x: 0, field_y: None, field_z: BTreeSet::new() };
        assert_eq!(item.summary_text(), "x=0;y=none;z=");
    }

    #[test]
    fn item_c_text() {
        assert_eq!(ItemC { field_x: true }.summary_text(), "x=true");
        assert_eq!(Item::from(ItemC { field_x: false }).summary_text(), "x=false");
    }

    #[test]
    fn item_kind_matches_variant() {
        assert_eq!(Item::from(ItemC { field_x: true }).kind(), ItemKind::C);
    }
}
