use uuid::Uuid;

use crate::chunks::build_equal_chunks;
use crate::error::BeltResult;
use crate::source::{ElementPartition, ElementShard, ElementSource};
use crate::types::Offset;

/// In-memory source over a sequence of records, for tests and bootstrap
/// wiring. Produces `partitions` shards with one partition each.
#[derive(Debug, Clone)]
pub struct SliceSource<T> {
    id: String,
    data: Vec<T>,
    partitions: usize,
}

impl<T> SliceSource<T> {
    pub fn new(data: Vec<T>, partitions: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            data,
            partitions,
        }
    }
}

impl<T> ElementSource<T> for SliceSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Shard = SliceShard<T>;

    fn id(&self) -> &str {
        &self.id
    }

    async fn shards(&self) -> BeltResult<Vec<SliceShard<T>>> {
        let chunks = build_equal_chunks(self.data.clone(), self.partitions.max(1));
        Ok(chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| SliceShard {
                id: format!("{}__{index}", self.id),
                data: chunk,
            })
            .collect())
    }
}

/// One shard of a [`SliceSource`], holding a contiguous run of the data.
#[derive(Debug, Clone)]
pub struct SliceShard<T> {
    id: String,
    data: Vec<T>,
}

impl<T> ElementShard<T> for SliceShard<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Resource = ();
    type Partition = SlicePartition<T>;

    fn id(&self) -> &str {
        &self.id
    }

    async fn new_resource(&self) -> BeltResult<()> {
        Ok(())
    }

    async fn partitions(&self) -> BeltResult<Vec<SlicePartition<T>>> {
        Ok(vec![SlicePartition {
            id: self.id.clone(),
            data: self.data.clone(),
            cursor: 0,
        }])
    }
}

/// Cursor over one shard's records.
#[derive(Debug)]
pub struct SlicePartition<T> {
    id: String,
    data: Vec<T>,
    cursor: usize,
}

impl<T> ElementPartition<T> for SlicePartition<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Resource = ();

    fn id(&self) -> &str {
        &self.id
    }

    fn done(&self) -> bool {
        self.cursor >= self.data.len()
    }

    async fn next_batch(
        &mut self,
        _resource: &mut (),
        batch_size: usize,
    ) -> BeltResult<Option<(Vec<T>, Offset)>> {
        if self.done() {
            return Ok(None);
        }
        let end = (self.cursor + batch_size).min(self.data.len());
        let records = self.data[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(Some((records, Offset::Index(end as u64))))
    }

    async fn close(&mut self) -> BeltResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(partition: &mut SlicePartition<u32>, batch_size: usize) -> Vec<Vec<u32>> {
        let mut batches = Vec::new();
        while !partition.done() {
            if let Some((records, _)) = partition.next_batch(&mut (), batch_size).await.unwrap() {
                batches.push(records);
            }
        }
        batches
    }

    #[tokio::test]
    async fn batches_cover_the_data_in_order() {
        let source = SliceSource::new((0..10).collect::<Vec<u32>>(), 1);
        let shards = source.shards().await.unwrap();
        assert_eq!(shards.len(), 1);

        let mut partitions = shards[0].partitions().await.unwrap();
        let batches = drain(&mut partitions[0], 3).await;
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8], vec![9]]);
    }

    #[tokio::test]
    async fn offsets_track_the_cursor() {
        let source = SliceSource::new(vec![1u32, 2, 3], 1);
        let shards = source.shards().await.unwrap();
        let mut partitions = shards[0].partitions().await.unwrap();
        let partition = &mut partitions[0];

        let (_, offset) = partition.next_batch(&mut (), 2).await.unwrap().unwrap();
        assert_eq!(offset, Offset::Index(2));
        let (_, offset) = partition.next_batch(&mut (), 2).await.unwrap().unwrap();
        assert_eq!(offset, Offset::Index(3));
    }

    #[tokio::test]
    async fn done_is_idempotent() {
        let source = SliceSource::new(vec![1u32], 1);
        let shards = source.shards().await.unwrap();
        let mut partitions = shards[0].partitions().await.unwrap();
        let partition = &mut partitions[0];

        assert!(partition.next_batch(&mut (), 5).await.unwrap().is_some());
        assert!(partition.done());
        assert!(partition.next_batch(&mut (), 5).await.unwrap().is_none());
        assert!(partition.next_batch(&mut (), 5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partition_count_bounds_shards() {
        let source = SliceSource::new((0..3).collect::<Vec<u32>>(), 8);
        let shards = source.shards().await.unwrap();
        assert_eq!(shards.len(), 3);
    }
}
