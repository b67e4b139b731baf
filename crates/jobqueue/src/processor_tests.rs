
    use super::*;
    use crate::handler::{FnHandler, HandlerRegistry};
    use crate::job::JobOptions;
    use crate::store::WILDCARD;
    use serde_json::{json, Value};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        processor: QueueProcessor,
        calls: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn store(&self) -> &JobStore {
            self.processor.store()
        }
    }

    /// `Mailer::send` returns true, `Mailer::bounce` returns false; every
    /// invocation is counted.
    fn fixture(retry: RetryPolicy) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let settings = QueueSettings::new(temp_dir.path().join("queue")).with_retry_policy(retry);

        let calls = Arc::new(AtomicUsize::new(0));
        let send_calls = calls.clone();
        let bounce_calls = calls.clone();

        let mut registry = HandlerRegistry::new();
        registry.register("Mailer", move || {
            let send_calls = send_calls.clone();
            let bounce_calls = bounce_calls.clone();
            FnHandler::new()
                .with_function("send", move |_| {
                    send_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(true))
                })
                .with_function("bounce", move |_| {
                    bounce_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Bool(false))
                })
        });

        let dispatcher = Dispatcher::new(&settings, Arc::new(registry));
        Fixture {
            _temp_dir: temp_dir,
            processor: QueueProcessor::from_settings(&settings, dispatcher),
            calls,
        }
    }

    fn mail(function: &str) -> JobOptions {
        JobOptions::new("Mailer", function, "mailer.php")
            .with_type("email")
            .with_filepath("jobs")
            .with_params(vec![json!("a@b.com")])
    }

    fn limited(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::Limited {
            max_attempts,
            dead_letter_type: "dead_letter".to_string(),
        }
    }

    #[test]
    fn test_success_removes_job() {
        let mut fx = fixture(RetryPolicy::Forever);
        let job = fx.store().add(mail("send")).unwrap().unwrap();
        assert!(fx.store().job_path("email", &job.id).is_file());

        let report = fx.processor.process();

        assert_eq!(report.succeeded, 1);
        assert!(!fx.store().exists(&job.id, "email"));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_retains_job() {
        let mut fx = fixture(RetryPolicy::Forever);
        let job = fx.store().add(mail("bounce")).unwrap().unwrap();
        let before = fs::read_to_string(fx.store().job_path("email", &job.id)).unwrap();

        for _ in 0..3 {
            let report = fx.processor.process();
            assert_eq!(report.failed, 1);
        }

        assert!(fx.store().exists(&job.id, "email"));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 3);

        // Retrying forever never rewrites the record.
        let after = fs::read_to_string(fx.store().job_path("email", &job.id)).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_unresolvable_target_retains_job() {
        let mut fx = fixture(RetryPolicy::Forever);
        let missing_class = fx
            .store()
            .add(JobOptions::new("Printer", "print", "printer.php").with_filepath("jobs"))
            .unwrap()
            .unwrap();
        let missing_function = fx.store().add(mail("archive")).unwrap().unwrap();

        let report = fx.processor.process();

        assert_eq!(report.failed, 2);
        assert!(fx.store().exists(&missing_class.id, WILDCARD));
        assert!(fx.store().exists(&missing_function.id, "email"));
    }

    #[test]
    fn test_future_start_time_is_skipped() {
        let mut fx = fixture(RetryPolicy::Forever);
        let job = fx
            .store()
            .add(mail("send").with_start_time(2_000))
            .unwrap()
            .unwrap();

        let report = fx.processor.process_at(1_999);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.dispatched(), 0);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
        assert!(fx.store().exists(&job.id, "email"));

        let report = fx.processor.process_at(2_000);
        assert_eq!(report.succeeded, 1);
        assert!(!fx.store().exists(&job.id, "email"));
    }

    #[test]
    fn test_job_without_start_time_is_always_eligible() {
        let mut fx = fixture(RetryPolicy::Forever);
        fx.store().add(mail("send")).unwrap();

        let report = fx.processor.process_at(i64::MIN);
        assert_eq!(report.succeeded, 1);
    }

    #[test]
    fn test_far_future_job_survives_real_clock() {
        let mut fx = fixture(RetryPolicy::Forever);
        let job = fx
            .store()
            .add(mail("send").with_start_time(i64::MAX))
            .unwrap()
            .unwrap();

        fx.processor.process();
        assert!(fx.store().exists(&job.id, "email"));
    }

    #[test]
    fn test_one_failure_does_not_abort_pass() {
        let mut fx = fixture(RetryPolicy::Forever);
        let bad = fx.store().add(mail("bounce").with_id("a")).unwrap().unwrap();
        let good = fx.store().add(mail("send").with_id("b")).unwrap().unwrap();
        fs::write(fx.store().root().join("email").join("c.json"), "{").unwrap();

        let report = fx.processor.process();

        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);
        assert!(fx.store().exists(&bad.id, "email"));
        assert!(!fx.store().exists(&good.id, "email"));
        assert!(fx.store().exists("c", "email"));
    }

    #[test]
    fn test_success_deletes_only_own_partition() {
        let mut fx = fixture(RetryPolicy::Forever);
        fx.store().add(mail("send").with_id("same")).unwrap();
        fx.store()
            .add(mail("send").with_type("later").with_id("same").with_start_time(5_000))
            .unwrap();

        fx.processor.process_at(1_000);

        assert!(!fx.store().exists("same", "email"));
        assert!(fx.store().exists("same", "later"));
    }

    fn write_raw(fx: &Fixture, job_type: &str, file_stem: &str, id: &str, function: &str) {
        let dir = fx.store().root().join(job_type);
        fs::create_dir_all(&dir).unwrap();
        let job = json!({
            "id": id,
            "start_time": null,
            "process": {"class": "Mailer", "function": function, "filepath": "jobs", "filename": "mailer.php"},
            "params": []
        });
        fs::write(dir.join(format!("{}.json", file_stem)), job.to_string()).unwrap();
    }

    #[test]
    fn test_success_removes_source_file_not_embedded_id() {
        let mut fx = fixture(RetryPolicy::Forever);
        write_raw(&fx, "x", "wild", "*", "send");
        write_raw(&fx, "x", "keep", "keep", "bounce");

        let report = fx.processor.process();

        assert_eq!(report.succeeded, 1);
        assert!(!fx.store().exists("wild", "x"));
        assert!(fx.store().exists("keep", "x"));
    }

    #[test]
    fn test_job_with_mismatched_id_runs_once() {
        let mut fx = fixture(RetryPolicy::Forever);
        write_raw(&fx, "x", "file-name", "embedded", "send");

        assert_eq!(fx.processor.process().succeeded, 1);
        assert_eq!(fx.processor.process().succeeded, 0);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
        assert!(fx.store().get_jobs(Some("x"))["x"].is_empty());
    }

    #[test]
    fn test_limited_retry_rewrites_source_file() {
        let mut fx = fixture(limited(3));
        write_raw(&fx, "x", "file-name", "embedded", "bounce");

        fx.processor.process();

        let jobs = fx.store().get_jobs(Some("x"));
        assert_eq!(jobs["x"].len(), 1);
        assert_eq!(jobs["x"][0].attempts, 1);
        assert!(!fx.store().exists("embedded", "x"));
    }

    #[test]
    fn test_limited_retry_counts_attempts() {
        let mut fx = fixture(limited(3));
        let job = fx.store().add(mail("bounce")).unwrap().unwrap();

        fx.processor.process();
        fx.processor.process();

        let jobs = fx.store().get_jobs(Some("email"));
        assert_eq!(jobs["email"][0].attempts, 2);
        assert!(fx.store().exists(&job.id, "email"));
    }

    #[test]
    fn test_limited_retry_dead_letters_job() {
        let mut fx = fixture(limited(2));
        let job = fx.store().add(mail("bounce")).unwrap().unwrap();

        fx.processor.process();
        let report = fx.processor.process();
        assert_eq!(report.dead_lettered, 1);

        assert!(!fx.store().exists(&job.id, "email"));
        assert!(fx.store().exists(&job.id, "dead_letter"));

        // Dead-lettered jobs are never dispatched again.
        let calls = fx.calls.load(Ordering::SeqCst);
        let report = fx.processor.process();
        assert_eq!(report.dispatched(), 0);
        assert_eq!(fx.calls.load(Ordering::SeqCst), calls);

        let dead = fx.store().get_jobs(Some("dead_letter"));
        assert_eq!(dead["dead_letter"][0].attempts, 2);
    }

    #[test]
    fn test_requeue_dead_letter() {
        let mut fx = fixture(limited(1));
        let job = fx.store().add(mail("bounce")).unwrap().unwrap();
        fx.processor.process();
        assert!(fx.store().exists(&job.id, "dead_letter"));

        assert!(fx.processor.requeue_dead_letter(&job.id, "email").unwrap());
        assert!(!fx.store().exists(&job.id, "dead_letter"));

        let jobs = fx.store().get_jobs(Some("email"));
        assert_eq!(jobs["email"][0].attempts, 0);

        assert!(!fx.processor.requeue_dead_letter("unknown", "email").unwrap());
    }

    #[test]
    fn test_requeue_without_dead_letter_partition() {
        let fx = fixture(RetryPolicy::Forever);
        assert!(!fx.processor.requeue_dead_letter("any", "email").unwrap());
    }

    #[test]
    fn test_limited_retry_success_needs_no_bookkeeping() {
        let mut fx = fixture(limited(2));
        fx.store().add(mail("send")).unwrap();

        let report = fx.processor.process();
        assert_eq!(report.succeeded, 1);
        assert!(fx.store().get_jobs(None)["email"].is_empty());
    }

    #[test]
    fn test_empty_queue_pass() {
        let mut fx = fixture(RetryPolicy::Forever);
        assert_eq!(fx.processor.process(), ProcessReport::default());
    }
