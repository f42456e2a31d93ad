//! Source abstraction: a source yields shards, shards yield partitions, and
//! partitions yield record batches against a per-chunk resource.
//!
//! The hierarchy maps onto deployments like "one shard per database host,
//! one partition per table" or "one shard per filename prefix, one partition
//! per file". Implementations plug in through the traits below; the engine
//! never needs to know what a record or an offset actually is.

mod fs;
mod slice;

pub use fs::{DirectorySource, FilePartition, FileShard, LineDecoder, json_line_decoder};
pub use slice::{SlicePartition, SliceShard, SliceSource};

use std::future::Future;

use crate::error::BeltResult;
use crate::types::Offset;

/// Resource shared by every partition in one reader chunk, typically a
/// pooled connection. The unit type serves sources that need none.
///
/// A chunk's resource is opened once per chunk task and closed when the
/// chunk exits; partitions borrow it and must never close it themselves.
pub trait ShardResource: Send + 'static {
    fn close(self) -> impl Future<Output = BeltResult<()>> + Send;
}

impl ShardResource for () {
    async fn close(self) -> BeltResult<()> {
        Ok(())
    }
}

/// The smallest independently readable unit of a source. Holds a cursor and
/// emits batches until exhausted.
pub trait ElementPartition<T: Send + 'static>: Send + 'static {
    type Resource: ShardResource;

    fn id(&self) -> &str;

    /// True once the partition is exhausted. Afterwards [`Self::next_batch`]
    /// yields nothing without touching the resource.
    fn done(&self) -> bool;

    /// Draws up to `batch_size` records, returning them together with the
    /// offset the cursor reached. `None` means no batch was available; the
    /// final batch may be short and may coincide with `done` flipping.
    fn next_batch(
        &mut self,
        resource: &mut Self::Resource,
        batch_size: usize,
    ) -> impl Future<Output = BeltResult<Option<(Vec<T>, Offset)>>> + Send;

    fn close(&mut self) -> impl Future<Output = BeltResult<()>> + Send;
}

/// A top-level division of the source data, owning its partitions and the
/// recipe for per-chunk resources.
pub trait ElementShard<T: Send + 'static>: Send + Sync + 'static {
    type Resource: ShardResource;
    type Partition: ElementPartition<T, Resource = Self::Resource>;

    fn id(&self) -> &str;

    /// Opens a fresh resource for one reader chunk. Concurrent chunks of the
    /// same shard obtain independent resources.
    fn new_resource(&self) -> impl Future<Output = BeltResult<Self::Resource>> + Send;

    fn partitions(&self) -> impl Future<Output = BeltResult<Vec<Self::Partition>>> + Send;
}

/// A partitioned data set. Enumerated once at job start.
pub trait ElementSource<T: Send + 'static> {
    type Shard: ElementShard<T>;

    fn id(&self) -> &str;

    fn shards(&self) -> impl Future<Output = BeltResult<Vec<Self::Shard>>> + Send;
}
