//! Persisted-state snapshots.
//!
//! A forest's tables serialize to a [`TableSnapshot`]: the store as an array
//! of sets, the three operation caches as `[[lhs, rhs], result]` triples,
//! and the subset cache as `[[lo, hi], "SUBSET" | "SUPERSET"]` triples. A
//! [`ForestSnapshot`] adds a version string and the tables of every child
//! forest, keyed by a DFS-ordinal path ("0", "1", "0/0", …). A child
//! referenced from several positions is visited once; identity is the
//! shared-handle pointer.
//!
//! Loading validates shape (identifier 0 empty, identifiers in range,
//! canonical sets, child arity) and fails with [`LhfError::Snapshot`]
//! without touching anything on a malformed payload for the table being
//! loaded.

use std::collections::{BTreeMap, HashSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::VERSION;
use crate::errors::{LhfError, LhfResult};
use crate::forest::LatticeHashForest;
use crate::id::SetId;
use crate::nesting::{LatticeOps, Leaf, Nested, Nesting};
use crate::property::Property;
use crate::subsets::SubsetRelation;

/// One stored element: its key and flattened child identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRecord<K> {
    pub key: K,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SetId>,
}

/// One forest's tables in persisted form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot<K> {
    pub sets: Vec<Vec<ElementRecord<K>>>,
    pub unions: Vec<((SetId, SetId), SetId)>,
    pub intersections: Vec<((SetId, SetId), SetId)>,
    pub differences: Vec<((SetId, SetId), SetId)>,
    pub subsets: Vec<((SetId, SetId), SubsetRelation)>,
}

/// A whole forest, children included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestSnapshot {
    pub version: String,
    pub root: Value,
    /// Child tables keyed by DFS path. Flat: a grandchild of the first
    /// child lives at "0/0", not inside the "0" entry.
    pub children: BTreeMap<String, Value>,
}

/// Key types that can appear in snapshots.
pub trait SnapshotKey: Property + Serialize + DeserializeOwned {}

impl<T: Property + Serialize + DeserializeOwned> SnapshotKey for T {}

/// Forests that can serialize their own tables and recurse into their
/// children during a snapshot walk.
pub trait Snapshotable {
    fn table_value(&self) -> LhfResult<Value>;
    fn load_table_value(&mut self, value: &Value) -> LhfResult<()>;
    fn walk_save_children(
        &self,
        prefix: &str,
        seen: &mut HashSet<usize>,
        out: &mut BTreeMap<String, Value>,
    ) -> LhfResult<()>;
    fn walk_load_children(
        &self,
        prefix: &str,
        seen: &mut HashSet<usize>,
        tables: &BTreeMap<String, Value>,
    ) -> LhfResult<()>;
}

/// Nesting structures whose children support the snapshot walk.
pub trait SnapshotNesting<P: Property>: Nesting<P> {
    fn walk_save(
        refs: &Self::Refs,
        prefix: &str,
        seen: &mut HashSet<usize>,
        out: &mut BTreeMap<String, Value>,
    ) -> LhfResult<()>;

    fn walk_load(
        refs: &Self::Refs,
        prefix: &str,
        seen: &mut HashSet<usize>,
        tables: &BTreeMap<String, Value>,
    ) -> LhfResult<()>;
}

impl<P: Property> SnapshotNesting<P> for Leaf {
    fn walk_save(
        _refs: &(),
        _prefix: &str,
        _seen: &mut HashSet<usize>,
        _out: &mut BTreeMap<String, Value>,
    ) -> LhfResult<()> {
        Ok(())
    }

    fn walk_load(
        _refs: &(),
        _prefix: &str,
        _seen: &mut HashSet<usize>,
        _tables: &BTreeMap<String, Value>,
    ) -> LhfResult<()> {
        Ok(())
    }
}

fn child_path(prefix: &str, ordinal: usize) -> String {
    if prefix.is_empty() {
        ordinal.to_string()
    } else {
        format!("{prefix}/{ordinal}")
    }
}

macro_rules! impl_snapshot_nesting_for_tuple {
    ($($C:ident => $idx:tt),+) => {
        impl<P: Property, $($C: LatticeOps + Snapshotable),+> SnapshotNesting<P>
            for Nested<($($C,)+)>
        {
            fn walk_save(
                refs: &Self::Refs,
                prefix: &str,
                seen: &mut HashSet<usize>,
                out: &mut BTreeMap<String, Value>,
            ) -> LhfResult<()> {
                $(
                    {
                        let handle = &refs.$idx;
                        if seen.insert(handle.as_ptr()) {
                            let path = child_path(prefix, $idx);
                            let child = handle.read();
                            out.insert(path.clone(), child.table_value()?);
                            child.walk_save_children(&path, seen, out)?;
                        }
                    }
                )+
                Ok(())
            }

            fn walk_load(
                refs: &Self::Refs,
                prefix: &str,
                seen: &mut HashSet<usize>,
                tables: &BTreeMap<String, Value>,
            ) -> LhfResult<()> {
                $(
                    {
                        let handle = &refs.$idx;
                        if seen.insert(handle.as_ptr()) {
                            let path = child_path(prefix, $idx);
                            let value = tables.get(&path).ok_or_else(|| LhfError::Snapshot {
                                reason: format!("missing child table at path {path}"),
                            })?;
                            let mut child = handle.write();
                            child.load_table_value(value)?;
                            child.walk_load_children(&path, seen, tables)?;
                        }
                    }
                )+
                Ok(())
            }
        }
    };
}

impl_snapshot_nesting_for_tuple!(C0 => 0);
impl_snapshot_nesting_for_tuple!(C0 => 0, C1 => 1);
impl_snapshot_nesting_for_tuple!(C0 => 0, C1 => 1, C2 => 2);
impl_snapshot_nesting_for_tuple!(C0 => 0, C1 => 1, C2 => 2, C3 => 3);

impl<P, N> Snapshotable for LatticeHashForest<P, N>
where
    P: SnapshotKey,
    N: SnapshotNesting<P>,
{
    fn table_value(&self) -> LhfResult<Value> {
        serde_json::to_value(self.table_snapshot()).map_err(|error| LhfError::Snapshot {
            reason: error.to_string(),
        })
    }

    fn load_table_value(&mut self, value: &Value) -> LhfResult<()> {
        let table: TableSnapshot<P> =
            serde_json::from_value(value.clone()).map_err(|error| LhfError::Snapshot {
                reason: error.to_string(),
            })?;
        self.load_table(table)
    }

    fn walk_save_children(
        &self,
        prefix: &str,
        seen: &mut HashSet<usize>,
        out: &mut BTreeMap<String, Value>,
    ) -> LhfResult<()> {
        N::walk_save(self.children(), prefix, seen, out)
    }

    fn walk_load_children(
        &self,
        prefix: &str,
        seen: &mut HashSet<usize>,
        tables: &BTreeMap<String, Value>,
    ) -> LhfResult<()> {
        N::walk_load(self.children(), prefix, seen, tables)
    }
}

impl<P, N> LatticeHashForest<P, N>
where
    P: SnapshotKey,
    N: SnapshotNesting<P>,
{
    /// Serializes this forest and every reachable child forest.
    pub fn to_snapshot(&self) -> LhfResult<ForestSnapshot> {
        let mut children = BTreeMap::new();
        let mut seen = HashSet::new();
        N::walk_save(self.children(), "", &mut seen, &mut children)?;
        Ok(ForestSnapshot {
            version: VERSION.to_string(),
            root: self.table_value()?,
            children,
        })
    }

    /// Restores this forest and every reachable child forest from a
    /// snapshot. Existing tables are replaced.
    pub fn load_snapshot(&mut self, snapshot: &ForestSnapshot) -> LhfResult<()> {
        if snapshot.version != VERSION {
            tracing::debug!(
                payload = %snapshot.version,
                current = VERSION,
                "loading snapshot from a different version"
            );
        }
        self.load_table_value(&snapshot.root)?;
        let mut seen = HashSet::new();
        N::walk_load(self.children(), "", &mut seen, &snapshot.children)
    }
}

impl ForestSnapshot {
    /// Renders the snapshot as a JSON string.
    pub fn to_json(&self) -> LhfResult<String> {
        serde_json::to_string(self).map_err(|error| LhfError::Snapshot {
            reason: error.to_string(),
        })
    }

    /// Parses a snapshot from a JSON string.
    pub fn from_json(payload: &str) -> LhfResult<Self> {
        serde_json::from_str(payload).map_err(|error| LhfError::Snapshot {
            reason: error.to_string(),
        })
    }
}
