//! The generic per-record step behind fold, foreach and grep, and the
//! replicate transform.

use super::{run_batches, BatchSink, RunOptions};
use crate::cluster::Cluster;
use crate::error::Result;
use async_trait::async_trait;
use kafka_types::NormalizedRecord;

/// Turns one record into zero or more outputs.
///
/// Closures `FnMut(NormalizedRecord) -> Vec<T>` implement it directly;
/// [`Identity`], [`Map`], [`Filter`] and [`ForEach`] cover the common shapes.
pub trait Process {
    type Output;

    fn process(&mut self, record: NormalizedRecord) -> Vec<Self::Output>;
}

impl<F, T> Process for F
where
    F: FnMut(NormalizedRecord) -> Vec<T>,
{
    type Output = T;

    fn process(&mut self, record: NormalizedRecord) -> Vec<T> {
        self(record)
    }
}

/// Passes every record through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Process for Identity {
    type Output = NormalizedRecord;

    fn process(&mut self, record: NormalizedRecord) -> Vec<NormalizedRecord> {
        vec![record]
    }
}

/// One record in, one record out.
pub struct Map<F>(pub F);

impl<F> Process for Map<F>
where
    F: FnMut(NormalizedRecord) -> NormalizedRecord,
{
    type Output = NormalizedRecord;

    fn process(&mut self, record: NormalizedRecord) -> Vec<NormalizedRecord> {
        vec![(self.0)(record)]
    }
}

/// Keeps the records the predicate accepts.
pub struct Filter<P>(pub P);

impl<P> Process for Filter<P>
where
    P: FnMut(&NormalizedRecord) -> bool,
{
    type Output = NormalizedRecord;

    fn process(&mut self, record: NormalizedRecord) -> Vec<NormalizedRecord> {
        if (self.0)(&record) {
            vec![record]
        } else {
            Vec::new()
        }
    }
}

/// Runs a side effect and produces nothing.
pub struct ForEach<F>(pub F);

impl<F> Process for ForEach<F>
where
    F: FnMut(&NormalizedRecord),
{
    type Output = ();

    fn process(&mut self, record: NormalizedRecord) -> Vec<()> {
        (self.0)(&record);
        Vec::new()
    }
}

struct FoldSink<'a, P: Process> {
    process: &'a mut P,
    outputs: Vec<P::Output>,
}

#[async_trait]
impl<P> BatchSink for FoldSink<'_, P>
where
    P: Process + Send,
    P::Output: Send,
{
    async fn deliver(&mut self, records: Vec<NormalizedRecord>) -> Result<()> {
        for record in records {
            self.outputs.extend(self.process.process(record));
        }
        Ok(())
    }
}

/// Run `process` over `topic` and collect every output.
pub async fn fold<P>(
    cluster: &mut Cluster,
    topic: &str,
    process: &mut P,
    options: &RunOptions,
) -> Result<Vec<P::Output>>
where
    P: Process + Send,
    P::Output: Send,
{
    let mut sink = FoldSink {
        process,
        outputs: Vec::new(),
    };
    run_batches(cluster, topic, options, &mut sink).await?;
    Ok(sink.outputs)
}

/// Call `f` for every record of `topic`. Returns the number of records seen.
pub async fn foreach<F>(
    cluster: &mut Cluster,
    topic: &str,
    f: F,
    options: &RunOptions,
) -> Result<usize>
where
    F: FnMut(&NormalizedRecord) + Send,
{
    let mut process = ForEach(f);
    let mut sink = FoldSink {
        process: &mut process,
        outputs: Vec::new(),
    };
    run_batches(cluster, topic, options, &mut sink).await
}

/// Records of `topic` the predicate accepts.
pub async fn grep<P>(
    cluster: &mut Cluster,
    topic: &str,
    predicate: P,
    options: &RunOptions,
) -> Result<Vec<NormalizedRecord>>
where
    P: FnMut(&NormalizedRecord) -> bool + Send,
{
    fold(cluster, topic, &mut Filter(predicate), options).await
}
