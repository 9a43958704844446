//! Directory-tree emulation over the flat (dirname, basename) keyed table.

use camino::Utf8Path;

use blob_driver::DriverError;

use crate::driver::HybridDriver;
use crate::meta::FileRecord;
use crate::paths;

impl HybridDriver {
    /// Insert a directory-marker record for every ancestor of `dir` up to
    /// the root, idempotently. Invoked after every operation that creates
    /// or relocates a node, so that every record's parent chain resolves.
    pub(crate) async fn ensure_ancestors(&self, dir: &Utf8Path) -> Result<(), DriverError> {
        let mut current = dir.to_owned();
        while current != "/" && !current.as_str().is_empty() {
            let (parent, name) = paths::split(&current);
            self.meta
                .insert_dir_marker(parent.as_str(), &name)
                .await
                .map_err(DriverError::store)?;
            current = parent;
        }
        Ok(())
    }

    /// Persist `record` and make sure its ancestor directories exist.
    pub(crate) async fn write_record(&self, record: &FileRecord) -> Result<(), DriverError> {
        self.meta.upsert(record).await.map_err(DriverError::store)?;
        self.ensure_ancestors(Utf8Path::new(&record.dirname)).await
    }

    /// Remove `record` and everything below it: blobs and rows, children
    /// before parent.
    ///
    /// The subtree is gathered with an explicit worklist rather than call
    /// recursion; stack depth stays constant regardless of tree depth.
    pub(crate) async fn delete_subtree(&self, record: FileRecord) -> Result<(), DriverError> {
        let mut nodes = vec![record];
        let mut index = 0;
        while index < nodes.len() {
            if nodes[index].is_dir() {
                let children = self
                    .meta
                    .children(&nodes[index].path())
                    .await
                    .map_err(DriverError::store)?;
                nodes.extend(children);
            }
            index += 1;
        }

        for node in nodes.iter().rev() {
            self.delete_blobs(node).await?;
            self.meta
                .remove(&node.dirname, &node.basename)
                .await
                .map_err(DriverError::store)?;
        }
        Ok(())
    }

    /// Remove every object-store object belonging to this record's
    /// external location, if it has one.
    ///
    /// Segment rows for the location are left behind; see the crate
    /// documentation on consistency gaps.
    pub(crate) async fn delete_blobs(&self, record: &FileRecord) -> Result<(), DriverError> {
        let Some(location) = record.location.as_deref() else {
            return Ok(());
        };
        self.store
            .delete_all(&paths::location_prefix(self.store.prefix(), location))
            .await
            .map_err(DriverError::store)
    }
}
