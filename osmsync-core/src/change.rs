//! Decoded replication diffs.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::ChangedObject;

/// Action carried by an osmChange group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeAction {
    /// Objects removed upstream.
    Delete,
    /// Objects created upstream.
    Create,
    /// Objects replaced by a newer version.
    Modify,
}

impl ChangeAction {
    /// Element name of the group in osmChange XML.
    #[must_use]
    pub const fn tag_name(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Create => "create",
            Self::Modify => "modify",
        }
    }

    pub(crate) fn from_tag_name(name: &str) -> Option<Self> {
        match name {
            "delete" => Some(Self::Delete),
            "create" => Some(Self::Create),
            "modify" => Some(Self::Modify),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

/// One `<create>`, `<modify>` or `<delete>` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeGroup {
    /// Action applied to every object in the block.
    pub action: ChangeAction,
    /// Objects in document order.
    pub objects: Vec<ChangedObject>,
}

/// Order in which the objects of a [`ChangeSet`] are applied.
///
/// A diff may carry several versions of one object in separate blocks, for
/// example a modify followed by a delete. Only [`ApplyOrder::Published`]
/// leaves the store holding the last version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ApplyOrder {
    /// Blocks exactly as they appear in the document.
    #[default]
    Published,
    /// All deletions, then all creations, then all modifications.
    ///
    /// Opt-in only: a delete listed after an older create or modify of the
    /// same object runs first, and the older version is re-inserted.
    Grouped,
}

/// Error returned when parsing an unknown [`ApplyOrder`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown apply order {0:?} (expected `grouped` or `published`)")]
pub struct UnknownApplyOrder(pub String);

impl FromStr for ApplyOrder {
    type Err = UnknownApplyOrder;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "grouped" => Ok(Self::Grouped),
            "published" => Ok(Self::Published),
            _ => Err(UnknownApplyOrder(value.to_owned())),
        }
    }
}

/// Decoded diff for one sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    groups: Vec<ChangeGroup>,
}

impl ChangeSet {
    /// Build a change set from groups in document order.
    #[must_use]
    pub fn new(groups: Vec<ChangeGroup>) -> Self {
        Self { groups }
    }

    /// Groups in document order.
    #[must_use]
    pub fn groups(&self) -> &[ChangeGroup] {
        &self.groups
    }

    /// Total number of objects across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.iter().map(|group| group.objects.len()).sum()
    }

    /// Whether the diff carries no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Objects of every group with `action`, in document order.
    pub fn objects_for(&self, action: ChangeAction) -> impl Iterator<Item = &ChangedObject> {
        self.groups
            .iter()
            .filter(move |group| group.action == action)
            .flat_map(|group| group.objects.iter())
    }

    /// Deleted objects in document order.
    pub fn deletions(&self) -> impl Iterator<Item = &ChangedObject> {
        self.objects_for(ChangeAction::Delete)
    }

    /// Created objects in document order.
    pub fn creations(&self) -> impl Iterator<Item = &ChangedObject> {
        self.objects_for(ChangeAction::Create)
    }

    /// Modified objects in document order.
    pub fn modifications(&self) -> impl Iterator<Item = &ChangedObject> {
        self.objects_for(ChangeAction::Modify)
    }

    /// Every `(action, object)` pair in the requested application order.
    #[must_use]
    pub fn in_order(&self, order: ApplyOrder) -> Vec<(ChangeAction, &ChangedObject)> {
        match order {
            ApplyOrder::Grouped => [ChangeAction::Delete, ChangeAction::Create, ChangeAction::Modify]
                .into_iter()
                .flat_map(|action| self.objects_for(action).map(move |object| (action, object)))
                .collect(),
            ApplyOrder::Published => self
                .groups
                .iter()
                .flat_map(|group| group.objects.iter().map(|object| (group.action, object)))
                .collect(),
        }
    }
}
