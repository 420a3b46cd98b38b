use catalog_schema::RelationCatalog;
use catalog_types::{Attributes, EntityType, RecordId, RecordRef, Value};

use crate::error::{StoreError, StoreResult};
use crate::record::Record;

/// Position in a transaction's savepoint stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "a savepoint must be released or rolled back to"]
pub struct Savepoint(pub(crate) usize);

impl Savepoint {
    pub fn depth(self) -> usize {
        self.0
    }
}

/// Storage of records for every entity type of one catalog.
///
/// All writes go through a [`Transaction`]. Implementations must satisfy:
/// - A transaction sees its own writes and nothing written after it began.
/// - `commit` publishes every write at once or fails without publishing any.
/// - A dropped or rolled-back transaction leaves committed state untouched.
pub trait RecordStore: Send + Sync {
    type Tx: Transaction;

    /// The catalog describing the stored entity types.
    fn catalog(&self) -> &RelationCatalog;

    /// Start a transaction on the current committed state.
    fn begin(&self) -> StoreResult<Self::Tx>;

    /// Read one committed record.
    fn get(&self, entity: &EntityType, id: RecordId) -> StoreResult<Option<Record>>;

    /// Run `f` in a fresh transaction: commit on `Ok`, roll back on `Err`.
    fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut tx = self.begin()?;
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                Err(err)
            }
        }
    }
}

/// An open unit of work against a [`RecordStore`].
pub trait Transaction {
    fn catalog(&self) -> &RelationCatalog;

    fn get(&self, entity: &EntityType, id: RecordId) -> StoreResult<Option<Record>>;

    /// All rows of `entity` whose `field` equals `value`, in id order.
    fn find(&self, entity: &EntityType, field: &str, value: &Value) -> StoreResult<Vec<Record>>;

    /// All rows of `entity`, in id order.
    fn all(&self, entity: &EntityType) -> StoreResult<Vec<Record>>;

    /// Insert a row and return its new id.
    fn insert(&mut self, entity: &EntityType, attributes: Attributes) -> StoreResult<RecordId>;

    /// Apply `changes` to every row in `ids`.
    ///
    /// The update is all-or-nothing: a uniqueness violation on any row leaves
    /// every row unchanged.
    fn update(
        &mut self,
        entity: &EntityType,
        ids: &[RecordId],
        changes: &Attributes,
    ) -> StoreResult<usize>;

    /// Remove rows without consulting delete policies.
    ///
    /// Use [`delete_records`](crate::delete_records) to honor cascade,
    /// protect and set-null.
    fn remove(&mut self, entity: &EntityType, ids: &[RecordId]) -> StoreResult<usize>;

    fn savepoint(&mut self) -> Savepoint;

    /// Discard every write made since `savepoint`.
    fn rollback_to(&mut self, savepoint: Savepoint) -> StoreResult<()>;

    /// Keep the writes made since `savepoint` and forget it.
    fn release(&mut self, savepoint: Savepoint) -> StoreResult<()>;

    fn commit(self) -> StoreResult<()>;

    fn rollback(self);

    fn require(&self, record: &RecordRef) -> StoreResult<Record> {
        self.get(&record.entity, record.id)?
            .ok_or_else(|| StoreError::RecordNotFound(record.clone()))
    }

    /// Run `f` inside a savepoint, rolling back to it if `f` fails.
    fn atomic<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<StoreError>,
    {
        let savepoint = self.savepoint();
        match f(self) {
            Ok(value) => {
                self.release(savepoint)?;
                Ok(value)
            }
            Err(err) => {
                self.rollback_to(savepoint)?;
                Err(err)
            }
        }
    }
}
