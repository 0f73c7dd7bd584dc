//! Mesh data providers.
//!
//! The pipeline itself only sees snapshots and fields; this trait is the
//! seam where host applications (editors, asset pipelines) plug in their
//! own mesh storage. [`InMemoryMesh`] is the reference implementation
//! and what the tests use.

use hashbrown::HashMap;

use tracing::info;

use crate::error::{TransferError, TransferResult};
use crate::params::TransferParams;
use crate::transfer::{transfer, TransferOutcome};
use crate::types::{DisplacementField, MeshSnapshot};

/// Source of mesh geometry and named displacement fields (shape keys).
pub trait MeshDataProvider {
    /// Capture the current geometry as an immutable snapshot.
    fn snapshot(&self) -> TransferResult<MeshSnapshot>;

    /// Names of the shape keys this provider carries.
    fn shape_keys(&self) -> Vec<String>;

    /// The displacement field stored under `key`.
    fn displacement_field(&self, key: &str) -> TransferResult<DisplacementField>;

    /// Store `field` under `key`, replacing any existing field.
    fn apply_displacement_field(
        &mut self,
        key: &str,
        field: DisplacementField,
    ) -> TransferResult<()>;
}

/// A mesh with shape keys held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryMesh {
    snapshot: MeshSnapshot,
    shape_keys: HashMap<String, DisplacementField>,
}

impl InMemoryMesh {
    /// Wrap a snapshot with no shape keys.
    pub fn new(snapshot: MeshSnapshot) -> Self {
        Self {
            snapshot,
            shape_keys: HashMap::new(),
        }
    }

    /// Add or replace a shape key, validating its length.
    pub fn with_shape_key(
        mut self,
        key: impl Into<String>,
        field: DisplacementField,
    ) -> TransferResult<Self> {
        field.check_len(self.snapshot.vertex_count())?;
        self.shape_keys.insert(key.into(), field);
        Ok(self)
    }
}

impl MeshDataProvider for InMemoryMesh {
    fn snapshot(&self) -> TransferResult<MeshSnapshot> {
        Ok(self.snapshot.clone())
    }

    fn shape_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.shape_keys.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn displacement_field(&self, key: &str) -> TransferResult<DisplacementField> {
        self.shape_keys
            .get(key)
            .cloned()
            .ok_or_else(|| TransferError::UnknownShapeKey {
                key: key.to_string(),
            })
    }

    fn apply_displacement_field(
        &mut self,
        key: &str,
        field: DisplacementField,
    ) -> TransferResult<()> {
        field.check_len(self.snapshot.vertex_count())?;
        self.shape_keys.insert(key.to_string(), field);
        Ok(())
    }
}

/// Transfer one named shape key from `source` to `target` and store the
/// result on the target under the same name.
pub fn transfer_shape_key(
    source: &dyn MeshDataProvider,
    target: &mut dyn MeshDataProvider,
    key: &str,
    params: &TransferParams,
) -> TransferResult<TransferOutcome> {
    info!(key, "Transferring shape key");

    let source_snapshot = source.snapshot()?;
    let target_snapshot = target.snapshot()?;
    let field = source.displacement_field(key)?;

    let outcome = transfer(&source_snapshot, &target_snapshot, &field, params)?;
    target.apply_displacement_field(key, outcome.field.clone())?;

    Ok(outcome)
}
