//! Job record and enqueue options.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use uuid::Uuid;

/// What to invoke and where its code lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTarget {
    pub class: String,
    pub function: String,
    pub filepath: String,
    pub filename: String,
}

/// A persisted unit of deferred work.
///
/// The job type is not part of the record: it is the partition directory
/// the file lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique within its type partition.
    pub id: String,
    /// Epoch seconds before which the job is not dispatched.
    #[serde(default, deserialize_with = "deserialize_start_time")]
    pub start_time: Option<i64>,
    pub process: JobTarget,
    /// Positional arguments for the target function.
    #[serde(default)]
    pub params: Vec<Value>,
    /// Failed dispatches recorded by a bounded retry policy.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempts: u32,
}

impl Job {
    /// Check if the job may run at `now` (epoch seconds).
    pub fn is_due(&self, now: i64) -> bool {
        match self.start_time {
            Some(start) => start <= now,
            None => true,
        }
    }
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Accept any JSON number as epoch seconds. Fractional times round up so a
/// job never runs early.
fn deserialize_start_time<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Some(seconds) = number.as_i64() {
        return Ok(Some(seconds));
    }

    match number.as_f64() {
        Some(seconds) if seconds.is_finite() => Ok(Some(seconds.ceil() as i64)),
        _ => Err(de::Error::custom(format!("invalid start_time: {}", number))),
    }
}

/// Generate a fresh job id: 32 lowercase hex characters.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Options accepted by [`JobStore::add`](crate::store::JobStore::add).
///
/// `class`, `function` and `filename` are required; everything else has a
/// default applied by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default, rename = "type")]
    pub job_type: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_start_time")]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub params: Option<Vec<Value>>,
}

impl JobOptions {
    /// Options with the three required fields set.
    pub fn new(
        class: impl Into<String>,
        function: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            class: Some(class.into()),
            function: Some(function.into()),
            filename: Some(filename.into()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    pub fn with_filepath(mut self, filepath: impl Into<String>) -> Self {
        self.filepath = Some(filepath.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = Some(params);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_job() -> Job {
        Job {
            id: "abc".to_string(),
            start_time: None,
            process: JobTarget {
                class: "Mailer".to_string(),
                function: "send".to_string(),
                filepath: "jobs".to_string(),
                filename: "mailer.php".to_string(),
            },
            params: vec![json!("a@b.com")],
            attempts: 0,
        }
    }

    #[test]
    fn test_job_serialized_layout() {
        let value = serde_json::to_value(sample_job()).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "abc",
                "start_time": null,
                "process": {
                    "class": "Mailer",
                    "function": "send",
                    "filepath": "jobs",
                    "filename": "mailer.php"
                },
                "params": ["a@b.com"]
            })
        );
    }

    #[test]
    fn test_attempts_written_only_when_nonzero() {
        let mut job = sample_job();
        job.attempts = 2;
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["attempts"], json!(2));
    }

    #[test]
    fn test_decode_missing_target_field_fails() {
        let content = r#"{"id": "1", "start_time": null,
            "process": {"class": "Mailer", "function": "send", "filepath": "jobs"},
            "params": []}"#;
        let err = serde_json::from_str::<Job>(content).unwrap_err();
        assert!(err.to_string().contains("filename"));
    }

    #[test]
    fn test_decode_optional_fields_default() {
        let content = r#"{"id": "1",
            "process": {"class": "C", "function": "f", "filepath": "p", "filename": "n"}}"#;
        let job: Job = serde_json::from_str(content).unwrap();
        assert!(job.start_time.is_none());
        assert!(job.params.is_empty());
        assert_eq!(job.attempts, 0);
    }

    #[test]
    fn test_decode_fractional_start_time() {
        let content = r#"{"id": "1", "start_time": 1000.0,
            "process": {"class": "C", "function": "f", "filepath": "p", "filename": "n"}}"#;
        let job: Job = serde_json::from_str(content).unwrap();
        assert_eq!(job.start_time, Some(1_000));

        let content = r#"{"id": "1", "start_time": 1000.25,
            "process": {"class": "C", "function": "f", "filepath": "p", "filename": "n"}}"#;
        let job: Job = serde_json::from_str(content).unwrap();
        assert!(!job.is_due(1_000));
        assert!(job.is_due(1_001));
    }

    #[test]
    fn test_decode_rejects_non_numeric_start_time() {
        let content = r#"{"id": "1", "start_time": "soon",
            "process": {"class": "C", "function": "f", "filepath": "p", "filename": "n"}}"#;
        assert!(serde_json::from_str::<Job>(content).is_err());
    }

    #[test]
    fn test_is_due() {
        let mut job = sample_job();
        assert!(job.is_due(0));

        job.start_time = Some(1_000);
        assert!(!job.is_due(999));
        assert!(job.is_due(1_000));
        assert!(job.is_due(1_001));
    }

    #[test]
    fn test_generate_id_is_filesystem_safe() {
        let id = generate_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_id());
    }

    #[test]
    fn test_options_builder() {
        let options = JobOptions::new("Mailer", "send", "mailer.php")
            .with_type("email")
            .with_id("42")
            .with_start_time(10)
            .with_params(vec![json!(1)]);
        assert_eq!(options.class.as_deref(), Some("Mailer"));
        assert_eq!(options.job_type.as_deref(), Some("email"));
        assert_eq!(options.id.as_deref(), Some("42"));
        assert_eq!(options.start_time, Some(10));
        assert!(options.filepath.is_none());
    }

    #[test]
    fn test_options_from_json_uses_type_key() {
        let options: JobOptions =
            serde_json::from_value(json!({"type": "email", "class": "Mailer"})).unwrap();
        assert_eq!(options.job_type.as_deref(), Some("email"));
        assert!(options.function.is_none());
    }
}
