//! Multi-worker synchronization tests.
//!
//! Workers are threads sharing a [`ThreadCollective`] group; each one
//! accumulates its own shard and `compute` must match a single process that
//! saw every shard.

use approx::assert_abs_diff_eq;
use stateful_metrics::metrics::functional;
use stateful_metrics::*;
use std::sync::Arc;
use std::thread;

mod common;
use common::*;

/// Run `work` on `world_size` worker threads and collect the results by rank.
fn run_workers<T, F>(world_size: usize, work: F) -> Vec<T>
where
    T: Send,
    F: Fn(ThreadCollective) -> T + Sync,
{
    let group = ThreadCollective::group(world_size);
    thread::scope(|s| {
        let handles: Vec<_> = group
            .into_iter()
            .map(|collective| {
                let work = &work;
                s.spawn(move || work(collective))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn test_fbeta_workers_match_single_process() {
    let batches = random_batches!(multiclass_prob, 101);
    let (all_preds, all_target) = concat_batches(&batches);

    for average in [
        AverageMethod::Micro,
        AverageMethod::Macro,
        AverageMethod::Weighted,
        AverageMethod::Samples,
        AverageMethod::None,
    ] {
        let config = fbeta_config(2.0, average, NUM_CLASSES);
        let expected = functional::fbeta(all_preds.clone(), all_target.clone(), &config).unwrap();

        // Two workers, each with a contiguous half of the batches.
        let results = run_workers(2, |collective| {
            let rank = collective.rank();
            let mut metric = FBeta::from_config(config.clone())
                .unwrap()
                .with_collective(Arc::new(collective));
            for (preds, target) in &batches[rank * 2..rank * 2 + 2] {
                metric.update((preds.clone(), target.clone())).unwrap();
            }
            metric.compute().unwrap()
        });

        for result in &results {
            assert_outputs_close(result, &expected);
        }
    }
}

#[test]
fn test_mdmc_samplewise_workers() {
    let batches = random_batches!(mdmc_prob, 103);
    let (all_preds, all_target) = concat_batches(&batches);
    let config = FBetaConfigBuilder::new()
        .average(AverageMethod::Macro)
        .mdmc_average(MdmcAverageMethod::Samplewise)
        .num_classes(NUM_CLASSES)
        .build()
        .unwrap();
    let expected = functional::f1(all_preds, all_target, &config).unwrap();

    let results = run_workers(NUM_BATCHES, |collective| {
        let rank = collective.rank();
        let mut metric = FBeta::f1(config.clone())
            .unwrap()
            .with_collective(Arc::new(collective));
        let (preds, target) = &batches[rank];
        metric.update((preds.clone(), target.clone())).unwrap();
        metric.compute().unwrap()
    });

    for result in &results {
        assert_outputs_close(result, &expected);
    }
}

#[test]
fn test_retrieval_workers_gather_rows() {
    let batches = retrieval_batches(107, 5);
    let mut single = RetrievalRecall::from_config(RetrievalConfigBuilder::new().k(3).build().unwrap()).unwrap();
    for batch in &batches {
        single.update(batch.clone()).unwrap();
    }
    let expected = single.compute().unwrap();

    // The same query id shows up on several workers.
    let results = run_workers(NUM_BATCHES, |collective| {
        let rank = collective.rank();
        let config = RetrievalConfigBuilder::new().k(3).build().unwrap();
        let mut recall = RetrievalRecall::from_config(config)
            .unwrap()
            .with_collective(Arc::new(collective));
        recall.update(batches[rank].clone()).unwrap();
        let result = recall.compute().unwrap();
        assert_eq!(recall.state().len(), BATCH_SIZE);
        result
    });

    for result in results {
        assert_abs_diff_eq!(result, expected, epsilon = EPSILON);
    }
}

#[test]
fn test_dist_sync_on_step_forward() {
    let batches = random_batches!(multiclass_labels, 109);
    let (all_preds, all_target) = concat_batches(&batches[..2]);
    let config = FBetaConfigBuilder::new()
        .average(AverageMethod::Macro)
        .num_classes(NUM_CLASSES)
        .dist_sync_on_step(true)
        .build()
        .unwrap();
    let expected = functional::f1(all_preds, all_target, &config).unwrap();

    let results = run_workers(2, |collective| {
        let rank = collective.rank();
        let mut metric = FBeta::f1(config.clone())
            .unwrap()
            .with_collective(Arc::new(collective));
        let (preds, target) = &batches[rank];
        metric.forward((preds.clone(), target.clone())).unwrap().unwrap()
    });

    for step in &results {
        assert_outputs_close(step, &expected);
    }
}

#[test]
fn test_single_worker_group_is_local() {
    let batches = random_batches!(multiclass_prob, 113);
    let config = fbeta_config(1.0, AverageMethod::Weighted, NUM_CLASSES);

    let mut local = FBeta::f1(config.clone()).unwrap();
    let results = run_workers(1, |collective| {
        let mut metric = FBeta::f1(config.clone())
            .unwrap()
            .with_collective(Arc::new(collective));
        for (preds, target) in &batches {
            metric.update((preds.clone(), target.clone())).unwrap();
        }
        metric.compute().unwrap()
    });
    for (preds, target) in &batches {
        local.update((preds.clone(), target.clone())).unwrap();
    }

    assert_eq!(results[0], local.compute().unwrap());
}
