//! Merge join driven end to end through the transformation and a
//! finish-triggered dataset.


use std::sync::Arc;
use std::thread;

use tsflow_core::prelude::*;
use tsflow_exec::{CollectingSink, Completion};
use tsflow_operators::{JoinFn, Transformation};

use test_data_gen::{f64s, join, join_with, key, table, times, LEFT, RIGHT};

#[test]
fn test_waits_for_both_parents() {
    let sink = CollectingSink::new();
    let j = join(sink.clone());
    let k = key("a");
    j.process(LEFT, table(&k, "a", &[(1, Some(1.0)), (2, Some(2.0))]))
        .unwrap();
    j.process(RIGHT, table(&k, "b", &[(2, Some(20.0))])).unwrap();

    j.finish(LEFT, None);
    assert_eq!(sink.completion(), Completion::Pending);
    assert_eq!(sink.table_count(), 0);

    j.finish(RIGHT, None);
    assert_eq!(sink.completion(), Completion::Succeeded);
    let tables = sink.tables();
    assert_eq!(tables.len(), 1);
    assert_eq!(times(&tables[0]), vec![2]);
    assert_eq!(f64s(&tables[0], "b"), vec![Some(20.0)]);
    assert!(j.with_state(|c, _| c.is_empty()).unwrap());
}

#[test]
fn test_error_fails_fast_and_releases_buffers() {
    let sink = CollectingSink::new();
    let j = join(sink.clone());
    let k = key("a");
    let l = table(&k, "a", &[(1, Some(1.0))]);
    let r = table(&k, "b", &[(1, Some(1.0))]);
    let handles = [l.buffers()[0].clone(), r.buffers()[0].clone()];
    j.process(LEFT, l).unwrap();
    j.process(RIGHT, r).unwrap();
    assert!(handles.iter().all(|h| h.ref_count() == 2));

    j.finish(RIGHT, Some(Error::Internal("upstream went away".into())));
    match sink.completion() {
        Completion::Failed { code, message } => {
            assert_eq!(code, Code::Internal);
            assert!(message.contains("upstream went away"));
        }
        other => panic!("unexpected completion {:?}", other),
    }
    assert_eq!(sink.table_count(), 0);
    assert!(handles.iter().all(|h| h.ref_count() == 1));
    assert!(j.is_finished());
}

#[test]
fn test_completion_is_forwarded_exactly_once() {
    let sink = CollectingSink::new();
    let j = join(sink.clone());
    j.finish(LEFT, None);
    j.finish(RIGHT, None);
    j.finish(RIGHT, None);
    j.finish(LEFT, Some(Error::Internal("late".into())));
    assert_eq!(sink.finish_calls(), 1);
    assert_eq!(sink.completion(), Completion::Succeeded);
}

#[test]
fn test_clean_finish_releases_buffers() {
    let sink = CollectingSink::new();
    let j = join(sink.clone());
    let ready = key("a");
    let lonely = key("b");
    let l = table(&ready, "a", &[(1, Some(1.0))]);
    let orphan = table(&lonely, "a", &[(1, Some(1.0))]);
    let handles = [l.buffers()[0].clone(), orphan.buffers()[0].clone()];
    j.process(LEFT, l).unwrap();
    j.process(LEFT, orphan).unwrap();
    j.process(RIGHT, table(&ready, "b", &[(1, Some(1.0))])).unwrap();

    j.finish(LEFT, None);
    j.finish(RIGHT, None);

    // Only the key that saw both sides is emitted.
    let tables = sink.tables();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].key(), &ready);
    assert!(handles.iter().all(|h| h.ref_count() == 1));
    assert_eq!(j.with_state(|c, _| c.retained_bytes()).unwrap(), 0);
}

#[test]
fn test_tables_are_emitted_in_key_order() {
    let sink = CollectingSink::new();
    let j = join(sink.clone());
    for host in ["m", "c", "x", "a"] {
        let k = key(host);
        j.process(RIGHT, table(&k, "b", &[(1, Some(1.0))])).unwrap();
        j.process(LEFT, table(&k, "a", &[(1, Some(1.0))])).unwrap();
    }
    j.finish(RIGHT, None);
    j.finish(LEFT, None);

    let keys: Vec<_> = sink.tables().into_iter().map(|t| t.key().clone()).collect();
    assert_eq!(keys, vec![key("a"), key("c"), key("m"), key("x")]);
}

#[test]
fn test_join_error_fails_completion() {
    let sink = CollectingSink::new();
    let f = JoinFn::from_fn(|_, l: &Record, _| {
        let mut out = l.clone();
        out.set("host", Scalar::Str("elsewhere".into()))?;
        Ok(out)
    });
    let j = join_with(f, &JoinConfig::default(), sink.clone());
    let k = key("a");
    let l = table(&k, "a", &[(1, Some(1.0))]);
    let handle = l.buffers()[0].clone();
    j.process(LEFT, l).unwrap();
    j.process(RIGHT, table(&k, "b", &[(1, Some(1.0))])).unwrap();

    j.finish(LEFT, None);
    j.finish(RIGHT, None);
    match sink.completion() {
        Completion::Failed { code, .. } => assert_eq!(code, Code::Invalid),
        other => panic!("unexpected completion {:?}", other),
    }
    assert_eq!(sink.table_count(), 0);
    assert_eq!(handle.ref_count(), 1);
}

#[test]
fn test_sink_error_stops_the_flush() {
    let sink = CollectingSink::rejecting_after(1);
    let j = join(sink.clone());
    for host in ["a", "b", "c"] {
        let k = key(host);
        j.process(LEFT, table(&k, "a", &[(1, Some(1.0))])).unwrap();
        j.process(RIGHT, table(&k, "b", &[(1, Some(1.0))])).unwrap();
    }
    j.finish(LEFT, None);
    j.finish(RIGHT, None);

    assert_eq!(sink.table_count(), 1);
    assert!(matches!(
        sink.completion(),
        Completion::Failed {
            code: Code::ResourceExhausted,
            ..
        }
    ));
    assert!(j.with_state(|c, _| c.is_empty()).unwrap());
}

#[test]
fn test_retraction_is_unimplemented() {
    let j = join(CollectingSink::new());
    let err = j.retract_table(LEFT, &key("a")).unwrap_err();
    assert_eq!(err.code(), Code::Unimplemented);
}

#[test]
fn test_missing_time_column_is_a_precondition_failure() {
    let j = join(CollectingSink::new());
    let k = key("a");
    let no_time = Table::from_columns(
        k.clone(),
        Schema::new(vec![Field::new("a", DataType::Float64)]),
        vec![Column::new("a", vec![Scalar::F64(1.0)])],
    )
    .unwrap();
    let err = j.process(LEFT, no_time).unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);
    assert!(err.to_string().contains("_time"));

    // The partition stays failed for both sides.
    j.process(RIGHT, table(&k, "b", &[(1, Some(1.0))])).unwrap();
    assert!(j.with_state(|c, _| c.is_failed(&k) && !c.contains(&k)).unwrap());
}

#[test]
fn test_mistyped_time_column_is_a_precondition_failure() {
    let j = join(CollectingSink::new());
    let k = key("a");
    let ints = Table::from_columns(
        k,
        Schema::new(vec![Field::new("_time", DataType::Int64)]),
        vec![Column::new("_time", vec![Scalar::I64(1)])],
    )
    .unwrap();
    let err = j.process(RIGHT, ints).unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);
}

#[test]
fn test_configured_time_column() {
    let sink = CollectingSink::new();
    let config = JoinConfig::default().with_time_column("ts");
    let j = join_with(
        JoinFn::from_fn(|_, l: &Record, _| Ok(l.clone())),
        &config,
        sink.clone(),
    );
    assert_eq!(j.time_column(), "ts");

    let k = key("a");
    let ts_table = |v: f64| {
        Table::from_columns(
            k.clone(),
            Schema::new(vec![
                Field::new("host", DataType::Utf8),
                Field::new("ts", DataType::Time),
                Field::new("v", DataType::Float64),
            ]),
            vec![
                Column::new("host", vec![Scalar::Str("a".into())]),
                Column::new("ts", vec![Scalar::Time(7)]),
                Column::new("v", vec![Scalar::F64(v)]),
            ],
        )
        .unwrap()
    };
    j.process(LEFT, ts_table(1.0)).unwrap();
    j.process(RIGHT, ts_table(2.0)).unwrap();
    assert!(j.process(LEFT, table(&key("z"), "a", &[(1, Some(1.0))])).is_err());

    j.finish(LEFT, None);
    j.finish(RIGHT, None);
    assert_eq!(sink.completion(), Completion::Succeeded);
    assert_eq!(f64s(&sink.tables()[0], "v"), vec![Some(1.0)]);
}

#[test]
fn test_process_after_completion_is_rejected() {
    let j = join(CollectingSink::new());
    j.finish(LEFT, None);
    j.finish(RIGHT, None);
    let err = j
        .process(LEFT, table(&key("a"), "a", &[(1, Some(1.0))]))
        .unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);
}

#[test]
fn test_unknown_parent_is_rejected() {
    let j = join(CollectingSink::new());
    let err = j
        .process(DatasetId::new(42), table(&key("a"), "a", &[(1, Some(1.0))]))
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
}

#[test]
fn test_watermarks_and_processing_time_pass_through() {
    let sink = CollectingSink::new();
    let j = join(sink.clone());
    j.update_watermark(LEFT, 10).unwrap();
    j.update_watermark(RIGHT, 5).unwrap();
    j.update_processing_time(LEFT, 99).unwrap();
    assert_eq!(sink.watermarks(), vec![10, 5]);
    assert_eq!(sink.processing_times(), vec![99]);
}

#[test]
fn test_concurrent_left_and_right_delivery() {
    let sink = CollectingSink::new();
    let j = Arc::new(join(sink.clone()));
    let hosts: Vec<String> = (0..64).map(|i| format!("host-{:02}", i)).collect();

    let handles: Vec<_> = [(LEFT, "a"), (RIGHT, "b")]
        .into_iter()
        .map(|(id, col)| {
            let j = Arc::clone(&j);
            let hosts = hosts.clone();
            thread::spawn(move || {
                for h in &hosts {
                    let k = key(h);
                    j.process(id, table(&k, col, &[(1, Some(1.0)), (2, Some(2.0))]))
                        .unwrap();
                }
                j.finish(id, None);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(sink.completion(), Completion::Succeeded);
    assert_eq!(sink.finish_calls(), 1);
    let tables = sink.tables();
    assert_eq!(tables.len(), hosts.len());
    assert!(tables.iter().all(|t| t.num_rows() == 2));
    assert_eq!(tables[0].key(), &key("host-00"));
}

#[test]
fn test_shared_layout_compiles_once() {
    let j = join(CollectingSink::new());
    for host in ["a", "b", "c"] {
        let k = key(host);
        j.process(LEFT, table(&k, "a", &[(1, Some(1.0))])).unwrap();
        j.process(RIGHT, table(&k, "b", &[(1, Some(1.0))])).unwrap();
    }
    j.finish(LEFT, None);
    j.finish(RIGHT, None);
    assert_eq!(j.with_state(|c, _| c.join_fn().compiled_layouts()).unwrap(), 1);
}
