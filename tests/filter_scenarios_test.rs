use filterlab::config::toml_config::{CallbackConfig, LocalEngineConfig};
use filterlab::core::export::minify;
use filterlab::core::{Session, SessionStore};
use filterlab::{
    ControllerEvent, ExecutionController, FileSessionStore, FilterEngine, LabError, LocalBackend,
    LocalStorage,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

fn local_engine(state_dir: &TempDir) -> FilterEngine<FileSessionStore<LocalStorage>> {
    let backend = LocalBackend::new(&CallbackConfig::default(), &LocalEngineConfig::default());
    let store = FileSessionStore::new(LocalStorage::new(state_dir.path()));
    FilterEngine::new(Arc::new(backend), store)
}

#[tokio::test]
async fn test_sample_fizzbuzz_run() {
    let temp_dir = TempDir::new().unwrap();
    let engine = local_engine(&temp_dir);

    let report = engine.run(&Session::sample()).await.unwrap();
    let lines: Vec<String> = report.output.iter().map(|l| l.to_json_line()).collect();

    assert_eq!(lines.len(), 15);
    assert_eq!(lines[0], r#"[0,{"log":"line 1"}]"#);
    assert_eq!(lines[2], r#"[0,{"log":"Fizz"}]"#);
    assert_eq!(lines[4], r#"[0,{"log":"Buzz"}]"#);
    assert_eq!(lines[14], r#"[0,{"log":"FizzBuzz"}]"#);
    assert_eq!(report.stats.backend, "local");
    assert_eq!(report.stats.emitted, 15);
    assert!(report.parse_errors.is_empty());
    assert!(report.record_errors.is_empty());

    // 成功執行後 session 會被保存
    let saved = engine.store().load().await.unwrap();
    assert_eq!(saved, Some(Session::sample()));
}

#[tokio::test]
async fn test_exported_code_runs_the_same_locally() {
    let temp_dir = TempDir::new().unwrap();
    let engine = local_engine(&temp_dir);
    let sample = Session::sample();
    let minified = Session::new(sample.input.clone(), minify(&sample.filter));

    let original = engine.run(&sample).await.unwrap();
    let exported = engine.run(&minified).await.unwrap();

    assert!(!minified.filter.contains('\n'));
    assert_eq!(exported.render(), original.render());
}

#[tokio::test]
async fn test_keep_emits_original_record() {
    let temp_dir = TempDir::new().unwrap();
    let engine = local_engine(&temp_dir);
    let session = Session::new(
        r#"{"log": "line 7"}"#,
        "function cb_filter(tag, ts, record) return 0, ts, record end",
    );

    let report = engine.run(&session).await.unwrap();

    assert_eq!(report.render(), r#"[0,{"log":"line 7"}]"#);
}

#[tokio::test]
async fn test_unknown_code_drops_record() {
    let temp_dir = TempDir::new().unwrap();
    let engine = local_engine(&temp_dir);
    let session = Session::new(
        "{\"log\": \"a\"}\n{\"log\": \"b\"}",
        "function cb_filter(tag, ts, record) return -1, ts, record end",
    );

    let report = engine.run(&session).await.unwrap();

    assert!(report.output.is_empty());
    assert_eq!(report.render(), "");
    assert_eq!(report.stats.dropped, 2);
    assert!(report.record_errors.is_empty());
}

#[tokio::test]
async fn test_array_payload_fans_out() {
    let temp_dir = TempDir::new().unwrap();
    let engine = local_engine(&temp_dir);
    let session = Session::new(
        r#"{"x": 1}"#,
        "function cb_filter(tag, ts, record) return 2, ts, { { a = 1 }, { a = 2 } } end",
    );

    let report = engine.run(&session).await.unwrap();

    assert_eq!(report.render(), "[0,{\"a\":1}]\n[0,{\"a\":2}]");
}

#[tokio::test]
async fn test_replace_uses_returned_timestamp() {
    let temp_dir = TempDir::new().unwrap();
    let engine = local_engine(&temp_dir);
    let session = Session::new(
        r#"{"msg": "hi"}"#,
        r#"function cb_filter(tag, ts, record)
  record.tag = tag
  return 1, 1700000000, record
end"#,
    );

    let report = engine.run(&session).await.unwrap();

    assert_eq!(report.render(), r#"[1700000000,{"msg":"hi","tag":"test"}]"#);
}

#[tokio::test]
async fn test_invalid_line_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let engine = local_engine(&temp_dir);
    let session = Session::new(
        "{\"n\": 1}\n{bad\n{\"n\": 3}",
        "function cb_filter(tag, ts, record) return 0, ts, record end",
    );

    let report = engine.run(&session).await.unwrap();

    assert_eq!(report.stats.records, 2);
    assert_eq!(report.output.len(), 2);
    assert_eq!(report.parse_errors.len(), 1);
    assert_eq!(report.parse_errors[0].line_index, 1);
    assert_eq!(report.render(), "[0,{\"n\":1}]\n[0,{\"n\":3}]");
}

#[tokio::test]
async fn test_failing_record_does_not_stop_the_batch() {
    let temp_dir = TempDir::new().unwrap();
    let engine = local_engine(&temp_dir);
    let session = Session::new(
        "{\"n\": 1}\n{\"n\": 2}\n{\"n\": 3}",
        r#"function cb_filter(tag, ts, record)
  if record.n == 2 then error("boom") end
  return 0, ts, record
end"#,
    );

    let report = engine.run(&session).await.unwrap();

    assert_eq!(report.render(), "[0,{\"n\":1}]\n[0,{\"n\":3}]");
    assert_eq!(report.record_errors.len(), 1);
    assert_eq!(report.record_errors[0].index, 1);
    assert!(report.record_errors[0].reason.contains("boom"));
}

#[tokio::test]
async fn test_broken_script_fails_batch_and_is_not_saved() {
    let temp_dir = TempDir::new().unwrap();
    let engine = local_engine(&temp_dir);
    let session = Session::new(r#"{"n": 1}"#, "function cb_filter(tag, ts, record) return 0, ts,");

    let result = engine.run(&session).await;

    assert!(matches!(result, Err(LabError::BackendError { .. })));
    assert_eq!(engine.store().load().await.unwrap(), None);
}

#[tokio::test]
async fn test_rapid_edits_run_once_with_latest_session() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Arc::new(local_engine(&temp_dir));
    let (handle, controller) = ExecutionController::spawn(engine, Duration::from_millis(50));
    let mut events = handle.subscribe();

    let keep = "function cb_filter(tag, ts, record) return 0, ts, record end";
    handle.request(Session::new(r#"{"v": 1}"#, keep)).unwrap();
    handle.request(Session::new(r#"{"v": 2}"#, keep)).unwrap();

    let mut started = 0;
    timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await.unwrap() {
                ControllerEvent::Started => started += 1,
                ControllerEvent::Completed { .. } => break,
                ControllerEvent::Failed { message } => panic!("run failed: {}", message),
                _ => {}
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(started, 1);
    let report = handle.latest_report().unwrap();
    assert_eq!(report.session.input, r#"{"v": 2}"#);
    assert_eq!(report.render(), r#"[0,{"v":2}]"#);

    drop(handle);
    timeout(Duration::from_secs(5), controller).await.unwrap().unwrap();
}
