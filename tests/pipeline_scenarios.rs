//! End-to-end update scenarios.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata::prelude::*;

fn source(pipeline: &mut Pipeline, size: &[i64]) -> NodeId {
    let id = pipeline.add_filter(Box::new(ImageSource::<u8>::new()));
    pipeline.set_parameter(id, "size", size.to_vec()).unwrap();
    pipeline.set_parameter(id, "pattern", "ramp").unwrap();
    id
}

fn region(index: &[i64], size: &[usize]) -> Region {
    Region::new(index.to_vec(), size.to_vec()).unwrap()
}

/// Passes its input through, or fails while `fail` is set.
struct Flaky {
    fail: Arc<AtomicBool>,
}

impl Filter for Flaky {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("flaky_u8", "Flaky")
            .input(SlotDefinition::input("input", DataKind::Image(PixelType::U8)))
            .output(SlotDefinition::output("output", DataKind::Image(PixelType::U8)))
            .build()
    }

    fn generate_data(&self, ctx: &mut GenerateContext) -> Result<(), ExecutionError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ctx.failure("refusing to run"));
        }
        let region = ctx.output_region(0).clone();
        let input = ctx.input_image::<u8>(0)?;
        let mut output = ctx.output_image::<u8>(0)?;
        region.for_each_index(|idx| {
            if let Some(v) = input.get(idx) {
                output.set(idx, v);
            }
        });
        Ok(())
    }
}

#[test]
fn threshold_statistics_scenario() {
    let mut pipeline = Pipeline::new();
    let src = source(&mut pipeline, &[10, 10]);
    let threshold = pipeline.add_filter(Box::new(Threshold::<u8>::new()));
    pipeline.set_parameter(threshold, "lower", 50i64).unwrap();
    let stats = pipeline.add_filter(Box::new(Statistics::<u8>::new()));
    pipeline.connect(src, 0, threshold, 0).unwrap();
    pipeline.connect(threshold, 0, stats, 0).unwrap();

    let first = pipeline.update(stats).unwrap();
    assert_eq!(first.stats.executed, vec![src, threshold, stats]);
    let summary = pipeline.output(stats, 0).unwrap().summary().unwrap();
    assert_eq!(summary.count, 100);
    assert_eq!(summary.sum, 50.0);

    let second = pipeline.update(stats).unwrap();
    assert_eq!(second.stats.nodes_executed(), 0);
    assert_eq!(second.stats.allocations, 0);

    pipeline.set_parameter(threshold, "lower", 90i64).unwrap();
    let third = pipeline.update(stats).unwrap();
    assert_eq!(third.stats.executed, vec![threshold, stats]);
    assert_eq!(third.stats.skipped, vec![src]);
    let summary = pipeline.output(stats, 0).unwrap().summary().unwrap();
    assert_eq!(summary.sum, 10.0);
}

#[test]
fn staleness_follows_the_changed_branch() {
    let mut pipeline = Pipeline::new();
    let src = source(&mut pipeline, &[8, 8]);
    let shift = pipeline.add_filter(Box::new(ShiftScale::<u8>::new()));
    let mean = pipeline.add_filter(Box::new(BoxMean::<u8>::new()));
    let sum = pipeline.add_filter(Box::new(Add::<u8>::new()));
    pipeline.connect(src, 0, shift, 0).unwrap();
    pipeline.connect(src, 0, mean, 0).unwrap();
    pipeline.connect(shift, 0, sum, "first").unwrap();
    pipeline.connect(mean, 0, sum, "second").unwrap();

    assert_eq!(pipeline.update(sum).unwrap().stats.nodes_executed(), 4);

    pipeline.set_parameter(shift, "shift", 3.0).unwrap();
    let report = pipeline.update(sum).unwrap();
    assert_eq!(report.stats.executed, vec![shift, sum]);
    assert_eq!(report.stats.executions_of(mean), 0);
    assert_eq!(report.stats.executions_of(src), 0);

    // A node outside the target's closure never runs.
    let unrelated = pipeline.add_filter(Box::new(Threshold::<u8>::new()));
    pipeline.connect(src, 0, unrelated, 0).unwrap();
    let report = pipeline.update(shift).unwrap();
    assert_eq!(report.stats.nodes_executed(), 0);
    assert!(pipeline.get_node(unrelated).unwrap().last_executed().is_never());
}

#[test]
fn requested_regions_shrink_upstream_work() {
    let mut pipeline = Pipeline::new();
    let src = source(&mut pipeline, &[32, 32]);
    let mean = pipeline.add_filter(Box::new(BoxMean::<u8>::new()));
    pipeline.set_parameter(mean, "radius", 2i64).unwrap();
    pipeline.connect(src, 0, mean, 0).unwrap();

    let wanted = region(&[10, 10], &[4, 4]);
    let report = pipeline.update_region(mean, 0, wanted.clone()).unwrap();
    assert_eq!(report.region(0), Some(&wanted));

    let src_out = pipeline.output(src, 0).unwrap();
    assert_eq!(src_out.read().buffered_region(), Some(&region(&[8, 8], &[8, 8])));
    assert_eq!(
        pipeline.output(mean, 0).unwrap().read().buffered_region(),
        Some(&wanted)
    );

    // At the border the padded request is cropped to the image.
    pipeline.update_region(mean, 0, region(&[0, 30], &[3, 2])).unwrap();
    assert_eq!(src_out.read().buffered_region(), Some(&region(&[0, 28], &[5, 4])));

    let err = pipeline
        .update_region(mean, 0, region(&[30, 30], &[4, 4]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RegionOutOfBounds);
}

#[test]
fn regions_at_the_edge_of_index_space() {
    let mut pipeline = Pipeline::new();
    let src = source(&mut pipeline, &[10, 10]);

    let err = Region::new(vec![i64::MAX, 0], vec![2, 2]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RegionOutOfBounds);
    let err = Region::new(vec![0, 0], vec![usize::MAX, 1]).unwrap_err();
    assert!(matches!(err, RegionError::Overflow { axis: 0, .. }));

    let far = region(&[i64::MAX - 2, 0], &[2, 2]);
    let err = pipeline.update_region(src, 0, far).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RegionOutOfBounds);

    let mean = pipeline.add_filter(Box::new(BoxMean::<u8>::new()));
    pipeline.set_parameter(mean, "radius", i64::MAX).unwrap();
    pipeline.connect(src, 0, mean, 0).unwrap();
    let err = pipeline.update(mean).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    // A radius far beyond the image reads the whole input.
    pipeline.set_parameter(mean, "radius", 1i64 << 40).unwrap();
    let report = pipeline.update_region(mean, 0, region(&[0, 0], &[1, 1])).unwrap();
    assert_eq!(report.stats.nodes_executed(), 2);
    let src_out = pipeline.output(src, 0).unwrap();
    assert_eq!(src_out.read().buffered_region(), Some(&region(&[0, 0], &[10, 10])));
}

#[test]
fn streamed_updates_match_a_single_pass() {
    fn build() -> (Pipeline, NodeId) {
        let mut pipeline = Pipeline::new();
        let src = source(&mut pipeline, &[13, 9]);
        let mean = pipeline.add_filter(Box::new(BoxMean::<u8>::new()));
        pipeline.set_parameter(mean, "radius", 1i64).unwrap();
        let shift = pipeline.add_filter(Box::new(ShiftScale::<u8>::new()));
        pipeline.set_parameter(shift, "scale", 2.0).unwrap();
        pipeline.connect(src, 0, mean, 0).unwrap();
        pipeline.connect(mean, 0, shift, 0).unwrap();
        (pipeline, shift)
    }

    let (mut reference, target) = build();
    reference.update(target).unwrap();
    let expected = reference.output(target, 0).unwrap().image::<u8>().unwrap();

    for strategy in [SplitStrategy::SlowestAxis, SplitStrategy::Tiles] {
        for pieces in [1, 2, 4, 7] {
            let (mut pipeline, target) = build();
            let engine = UpdateEngine::with_options(
                ExecutionOptions::new()
                    .with_streaming(StreamingConfig::new().with_strategy(strategy)),
            );
            let report = engine
                .update_streamed(&mut pipeline, target, 0, Some(pieces))
                .unwrap();
            assert!(report.stats.pieces <= pieces);

            let output = pipeline.output(target, 0).unwrap();
            assert_eq!(
                output.image::<u8>().unwrap(),
                expected,
                "{:?} with {} pieces",
                strategy,
                pieces
            );
            assert_eq!(output.read().buffered_region(), Some(&Region::from_size(&[13, 9])));

            let again = engine
                .update_streamed(&mut pipeline, target, 0, Some(pieces))
                .unwrap();
            assert_eq!(again.stats.nodes_executed(), 0);
        }
    }
}

#[test]
fn streaming_follows_the_memory_limit() {
    let mut pipeline = Pipeline::new();
    let src = source(&mut pipeline, &[16, 16]);
    let engine = UpdateEngine::with_options(
        ExecutionOptions::new().with_streaming(StreamingConfig::new().with_memory_limit(128)),
    );
    let report = engine.update_streamed(&mut pipeline, src, 0, None).unwrap();
    // 256 bytes of output, doubled for working memory
    assert_eq!(report.stats.pieces, 4);
    assert_eq!(report.stats.peak_piece_bytes, 64);
    assert_eq!(report.stats.executions_of(src), 4);
}

#[test]
fn wiring_rejects_cycles() {
    let mut pipeline = Pipeline::new();
    let a = pipeline.add_filter(Box::new(ShiftScale::<u8>::new()));
    let b = pipeline.add_filter(Box::new(ShiftScale::<u8>::new()));
    let c = pipeline.add_filter(Box::new(ShiftScale::<u8>::new()));
    pipeline.connect(a, 0, b, 0).unwrap();
    pipeline.connect(b, 0, c, 0).unwrap();

    let err = pipeline.connect(c, 0, a, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PipelineCycle);
    assert!(pipeline.input(a, 0).unwrap().is_none());

    let err = pipeline.connect(a, 0, a, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PipelineCycle);
}

#[test]
fn failed_node_is_retried_and_upstream_stays_memoized() {
    let fail = Arc::new(AtomicBool::new(true));
    let mut pipeline = Pipeline::new();
    let src = source(&mut pipeline, &[4, 4]);
    let flaky = pipeline.add_filter(Box::new(Flaky { fail: fail.clone() }));
    pipeline.connect(src, 0, flaky, 0).unwrap();

    let err = pipeline.update(flaky).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ComputationFailure);
    assert_eq!(err.node_id(), Some(flaky));
    assert_eq!(err.region(), Some(&Region::from_size(&[4, 4])));
    assert!(!pipeline.get_node(src).unwrap().last_executed().is_never());
    assert!(pipeline.get_node(flaky).unwrap().last_executed().is_never());

    fail.store(false, Ordering::SeqCst);
    let report = pipeline.update(flaky).unwrap();
    assert_eq!(report.stats.executed, vec![flaky]);
    assert_eq!(
        pipeline.output(flaky, 0).unwrap().image::<u8>().unwrap().get(&[1, 1]),
        Some(5)
    );
}

#[test]
fn external_data_changes_are_noticed() {
    let mut pipeline = Pipeline::new();
    let mean = pipeline.add_filter(Box::new(BoxMean::<f32>::new()));
    let image = Image::<f32>::from_fn(Region::from_size(&[5]), |_| 2.0);
    let external = DataHandle::from_image(image);
    pipeline.set_input(mean, 0, external.clone()).unwrap();

    pipeline.update(mean).unwrap();
    assert_eq!(pipeline.update(mean).unwrap().stats.nodes_executed(), 0);

    if let Some(image) = external.write().payload_mut::<Image<f32>>() {
        image.set(&[2], 5.0);
    }
    let report = pipeline.update(mean).unwrap();
    assert_eq!(report.stats.executed, vec![mean]);
    let out = pipeline.output(mean, 0).unwrap().image::<f32>().unwrap();
    assert_eq!(out.as_slice(), &[2.0, 3.0, 3.0, 3.0, 2.0]);

    external.modify();
    assert_eq!(pipeline.update(mean).unwrap().stats.nodes_executed(), 1);
}

#[test]
fn unchanged_updates_allocate_nothing() {
    let mut pipeline = Pipeline::new();
    let src = source(&mut pipeline, &[16, 16]);
    let mean = pipeline.add_filter(Box::new(BoxMean::<u8>::new()));
    pipeline.connect(src, 0, mean, 0).unwrap();

    let first = pipeline.update(mean).unwrap();
    assert_eq!(first.stats.allocations, 2);

    for _ in 0..3 {
        let report = pipeline.update(mean).unwrap();
        assert_eq!(report.stats.allocations, 0);
        assert_eq!(report.stats.nodes_executed(), 0);
    }

    // Shrinking the request reuses the existing storage.
    pipeline.set_parameter(mean, "radius", 2i64).unwrap();
    let report = pipeline.update_region(mean, 0, region(&[4, 4], &[4, 4])).unwrap();
    assert_eq!(report.stats.executed, vec![mean]);
    assert_eq!(report.stats.allocations, 0);
}

#[test]
fn parallel_updates_match_sequential_ones() {
    fn build() -> (Pipeline, NodeId) {
        let mut pipeline = Pipeline::new();
        let src = source(&mut pipeline, &[24, 24]);
        let mut branches = Vec::new();
        for radius in [1i64, 2, 3] {
            let mean = pipeline.add_filter(Box::new(BoxMean::<u8>::new()));
            pipeline.set_parameter(mean, "radius", radius).unwrap();
            pipeline.connect(src, 0, mean, 0).unwrap();
            branches.push(mean);
        }
        let first = pipeline.add_filter(Box::new(Add::<u8>::new()));
        pipeline.connect(branches[0], 0, first, "first").unwrap();
        pipeline.connect(branches[1], 0, first, "second").unwrap();
        let second = pipeline.add_filter(Box::new(Add::<u8>::new()));
        pipeline.connect(first, 0, second, "first").unwrap();
        pipeline.connect(branches[2], 0, second, "second").unwrap();
        (pipeline, second)
    }

    let (mut sequential, target) = build();
    sequential.update(target).unwrap();
    let expected = sequential.output(target, 0).unwrap().image::<u8>().unwrap();

    for threads in [0, 2] {
        let (mut pipeline, target) = build();
        let engine = UpdateEngine::with_options(
            ExecutionOptions::new()
                .with_parallel(true)
                .with_max_threads(threads),
        );
        let report = engine.update(&mut pipeline, target).unwrap();
        assert_eq!(report.stats.nodes_executed(), 6);
        assert_eq!(pipeline.output(target, 0).unwrap().image::<u8>().unwrap(), expected);
        assert_eq!(engine.update(&mut pipeline, target).unwrap().stats.nodes_executed(), 0);
    }
}

#[test]
fn cancellation_between_pieces() {
    let token = CancellationToken::new();
    let pieces_done = Arc::new(Mutex::new(0usize));
    let engine = {
        let token = token.clone();
        let pieces_done = pieces_done.clone();
        UpdateEngine::with_options(
            ExecutionOptions::new()
                .with_cancellation(token.clone())
                .with_progress(move |update| {
                    if let ProgressUpdate::PieceCompleted { .. } = update {
                        *pieces_done.lock() += 1;
                        token.cancel();
                    }
                }),
        )
    };

    let mut pipeline = Pipeline::new();
    let src = source(&mut pipeline, &[8, 8]);
    let err = engine
        .update_streamed(&mut pipeline, src, 0, Some(4))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(*pieces_done.lock(), 1);

    token.reset();
    *pieces_done.lock() = 0;
    let report = engine.update_streamed(&mut pipeline, src, 0, Some(4));
    // The callback cancels again after the first piece.
    assert!(report.is_err());

    let plain = UpdateEngine::new();
    let report = plain.update_streamed(&mut pipeline, src, 0, Some(4)).unwrap();
    assert_eq!(report.stats.pieces, 4);
    let image = pipeline.output(src, 0).unwrap().image::<u8>().unwrap();
    assert_eq!(image.get(&[7, 7]), Some(63));
}
