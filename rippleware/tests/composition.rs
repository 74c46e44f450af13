//! Stage declaration, propagation and result shape.

mod common;

use common::{as_int, inc, init_tracing, passthrough};
use rippleware::{
    ComposeOptions, Param, PipelineBuilder, RippleError, compose, is_rippleware,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test]
async fn test_constant_result() {
    init_tracing();
    let app = compose()
        .stage([Param::handler(|_, _| Ok(json!([1, 2, [3]])))])
        .unwrap();

    assert_eq!(app.call(vec![]).await.unwrap(), json!([1, 2, [3]]));
}

#[tokio::test]
async fn test_zero_arguments() {
    init_tracing();
    let app = compose()
        .stage([Param::handler(|input, _| {
            assert_eq!(input, Value::Null);
            Ok(json!("Hello, world!"))
        })])
        .unwrap();

    assert_eq!(app.call(vec![]).await.unwrap(), json!("Hello, world!"));
}

#[tokio::test]
async fn test_single_handler_result_is_unwrapped() {
    init_tracing();
    let app = compose().stage([inc()]).unwrap();
    assert_eq!(app.call(vec![json!(1)]).await.unwrap(), json!(2));
}

#[tokio::test]
async fn test_stages_run_in_order() {
    init_tracing();
    let app = compose()
        .stage([inc()])
        .unwrap()
        .stage([Param::handler(|n, _| Ok(json!(as_int(&n) * 10)))])
        .unwrap()
        .stage([inc()])
        .unwrap();

    assert_eq!(app.call(vec![json!(1)]).await.unwrap(), json!(21));
}

#[tokio::test]
async fn test_broadcast_single_param() {
    init_tracing();
    let app = compose().stage([inc()]).unwrap();
    assert_eq!(
        app.call(vec![json!(1), json!(2)]).await.unwrap(),
        json!([2, 3])
    );
}

#[tokio::test]
async fn test_arity_padding() {
    init_tracing();
    let app = compose()
        .stage([passthrough(), passthrough(), passthrough()])
        .unwrap();

    assert_eq!(
        app.call(vec![json!("a")]).await.unwrap(),
        json!(["a", null, null])
    );
}

#[tokio::test]
async fn test_too_many_arguments_rejects() {
    init_tracing();
    let app = compose().stage([passthrough(), passthrough()]).unwrap();

    let result = app.call(vec![json!(1), json!(2), json!(3)]).await;
    assert!(matches!(
        result,
        Err(RippleError::Propagation {
            declared: 2,
            received: 3
        })
    ));
}

#[tokio::test]
async fn test_strict_arity_option() {
    init_tracing();
    let app = PipelineBuilder::new()
        .options(ComposeOptions {
            strict_arity: true,
            ..Default::default()
        })
        .build()
        .unwrap()
        .stage([inc()])
        .unwrap();

    let result = app.call(vec![json!(1), json!(2)]).await;
    assert!(matches!(result, Err(RippleError::Propagation { .. })));
}

#[test]
fn test_blank_name_rejected_by_builder() {
    let result = PipelineBuilder::new()
        .options(ComposeOptions {
            name: Some(String::new()),
            ..Default::default()
        })
        .build();
    assert!(matches!(result, Err(RippleError::Config(_))));
}

#[test]
fn test_empty_stage_rejected() {
    let result = compose().stage(Vec::<Param>::new());
    let err = result.unwrap_err();
    assert!(matches!(err, RippleError::Declaration(_)));
    assert!(err.to_string().contains("at least a single handler"));
}

#[tokio::test]
async fn test_declarations_locked_after_invocation() {
    init_tracing();
    let app = compose().stage([inc()]).unwrap();
    assert!(!app.is_invoked());

    app.call(vec![json!(1)]).await.unwrap();

    assert!(app.is_invoked());
    assert!(is_rippleware(&app));
    assert!(matches!(app.stage([inc()]), Err(RippleError::Locked(_))));
    assert!(matches!(app.sep([inc()]), Err(RippleError::Locked(_))));
    assert!(matches!(app.all([inc()]), Err(RippleError::Locked(_))));
    assert!(matches!(app.mix([inc()]), Err(RippleError::Locked(_))));
    assert!(matches!(app.memo([inc()]), Err(RippleError::Locked(_))));
    assert!(matches!(app.ctx(json!({})), Err(RippleError::Locked(_))));
    assert!(matches!(
        app.pre(|_| Ok(passthrough())),
        Err(RippleError::Locked(_))
    ));

    // Still invocable after the failed declarations.
    assert_eq!(app.call(vec![json!(2)]).await.unwrap(), json!(3));
}

#[tokio::test]
async fn test_call_locks_before_first_poll() {
    init_tracing();
    let app = compose().stage([inc()]).unwrap();

    let pending = app.call(vec![json!(1)]);
    assert!(app.is_invoked());
    assert!(matches!(app.stage([inc()]), Err(RippleError::Locked(_))));

    assert_eq!(pending.await.unwrap(), json!(2));
}

#[tokio::test]
async fn test_topology() {
    init_tracing();
    let app = compose()
        .stage([passthrough()])
        .unwrap()
        .stage([passthrough()])
        .unwrap()
        .stage([Param::handler(|_, hooks| {
            let topology = hooks.use_topology();
            Ok(json!([topology.index, topology.count]))
        })])
        .unwrap();

    assert_eq!(app.call(vec![json!(null)]).await.unwrap(), json!([2, 3]));
}

#[tokio::test]
async fn test_ctx_is_not_a_stage() {
    init_tracing();
    let app = compose()
        .ctx(json!({ "env": "test" }))
        .unwrap()
        .stage([Param::handler(|_, hooks| {
            Ok(json!({
                "context": hooks.use_context(),
                "count": hooks.use_topology().count,
            }))
        })])
        .unwrap();

    assert_eq!(
        app.call(vec![]).await.unwrap(),
        json!({ "context": { "env": "test" }, "count": 1 })
    );
}

#[test]
fn test_ctx_declaration_errors() {
    let late = compose().stage([inc()]).unwrap().ctx(json!(1));
    assert!(matches!(late, Err(RippleError::Declaration(_))));

    let twice = compose().ctx(json!(1)).unwrap().ctx(json!(2));
    assert!(matches!(twice, Err(RippleError::Declaration(_))));
}

#[tokio::test]
async fn test_ctx_factory_runs_once() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let app = compose()
        .ctx(rippleware::ContextDecl::factory(move || {
            json!(counter.fetch_add(1, Ordering::SeqCst))
        }))
        .unwrap()
        .stage([Param::handler(|_, hooks| {
            Ok(hooks.use_context().unwrap_or(Value::Null))
        })])
        .unwrap();

    assert_eq!(app.call(vec![]).await.unwrap(), json!(0));
    assert_eq!(app.call(vec![]).await.unwrap(), json!(0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sep_spreads_array_results() {
    init_tracing();
    let app = compose()
        .sep([Param::handler(|_, _| Ok(json!([1, 2, 3])))])
        .unwrap()
        .stage([inc()])
        .unwrap();

    assert_eq!(app.call(vec![json!(null)]).await.unwrap(), json!([2, 3, 4]));
}

#[tokio::test]
async fn test_all_hands_every_param_the_whole_vector() {
    init_tracing();
    let sum = Param::handler(|values, _| {
        let total: i64 = values
            .as_array()
            .map(|items| items.iter().map(as_int).sum())
            .unwrap_or(0);
        Ok(json!(total))
    });
    let count = Param::handler(|values, _| {
        Ok(json!(values.as_array().map(Vec::len).unwrap_or(0)))
    });
    let app = compose().all([sum, count]).unwrap();

    assert_eq!(
        app.call(vec![json!(1), json!(2), json!(3)]).await.unwrap(),
        json!([6, 3])
    );
}

#[tokio::test]
async fn test_mix_merges_channels() {
    init_tracing();
    let app = compose()
        .mix([inc()])
        .unwrap()
        .stage([Param::handler(|merged, _| {
            assert_eq!(merged, json!([2, 3]));
            Ok(json!(merged.as_array().map(Vec::len).unwrap_or(0)))
        })])
        .unwrap();

    assert_eq!(app.call(vec![json!(1), json!(2)]).await.unwrap(), json!(2));
}

#[tokio::test]
async fn test_memo_stage_replays_first_output() {
    init_tracing();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let app = compose()
        .memo([Param::handler(move |value, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        })])
        .unwrap()
        .stage([inc()])
        .unwrap();

    assert_eq!(app.call(vec![json!(1)]).await.unwrap(), json!(2));
    assert_eq!(app.call(vec![json!(10)]).await.unwrap(), json!(2));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_index_expression() {
    init_tracing();
    let app = compose()
        .stage([Param::index("/$.items[*].id/")])
        .unwrap();

    let input = json!({ "items": [{ "id": "a" }, { "id": "b" }] });
    assert_eq!(app.call(vec![input]).await.unwrap(), json!(["a", "b"]));
}

#[tokio::test]
async fn test_aggregate_index_expression() {
    init_tracing();
    let app = compose()
        .stage([Param::list([
            Param::list([Param::index("$.a"), Param::index("$.b")]),
            Param::list([Param::index("$.c")]),
        ])])
        .unwrap();

    let input = json!([[{ "a": 1 }, { "b": 2 }], [{ "c": 3 }]]);
    assert_eq!(app.call(vec![input]).await.unwrap(), json!([1, 2, 3]));
}

#[test]
fn test_invalid_index_expression_rejected_at_declaration() {
    let result = compose().stage([Param::index("not a path")]);
    assert!(matches!(result, Err(RippleError::IndexExpression { .. })));
}

#[tokio::test]
async fn test_fanout_list() {
    init_tracing();
    let double = Param::handler(|n, _| Ok(json!(as_int(&n) * 2)));
    let app = compose().stage([Param::list([inc(), double])]).unwrap();

    assert_eq!(app.call(vec![json!(5)]).await.unwrap(), json!([6, 10]));
}

#[tokio::test]
async fn test_sibling_failure_rejects_invocation() {
    init_tracing();
    let app = compose()
        .stage([
            passthrough(),
            Param::handler(|_, _| Err(RippleError::handler("boom"))),
        ])
        .unwrap();

    let err = app.call(vec![json!(1), json!(2)]).await.unwrap_err();
    assert!(err.to_string().contains("boom"));
}

#[tokio::test]
async fn test_async_handler() {
    init_tracing();
    let app = compose()
        .stage([Param::handler_async(|value, _| async move {
            tokio::task::yield_now().await;
            Ok(json!(as_int(&value) * 3))
        })])
        .unwrap();

    assert_eq!(app.call(vec![json!(4)]).await.unwrap(), json!(12));
}

#[test]
fn test_call_blocking() {
    let app = compose().stage([inc()]).unwrap().stage([inc()]).unwrap();
    assert_eq!(app.call_blocking(vec![json!(1)]).unwrap(), json!(3));
}

#[tokio::test]
async fn test_result_order_follows_declaration_order() {
    init_tracing();
    let delayed = |delay_ms: u64| {
        Param::handler_async(move |value, _| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(value)
        })
    };
    let app = compose()
        .stage([delayed(60), delayed(30), delayed(0)])
        .unwrap();

    assert_eq!(
        app.call(vec![json!("slow"), json!("medium"), json!("fast")])
            .await
            .unwrap(),
        json!(["slow", "medium", "fast"])
    );
}
