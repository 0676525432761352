use tracing::info;

use crate::domain::{ObjectEvent, ObjectRef};
use crate::error::{LoaderError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reception {
    Accepted(ObjectRef),
    Skipped { key: String, reason: String },
}

/// Validates incoming notifications and filters them by object suffix.
#[derive(Debug, Clone)]
pub struct EventReceiver {
    extension: String,
}

impl EventReceiver {
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.to_lowercase(),
        }
    }

    pub fn receive(&self, event: &ObjectEvent) -> Result<Reception> {
        info!(
            "Triggered for file: gs://{}/{}",
            event.container, event.object_key
        );
        info!(event_id = %event.event_id, event_type = %event.event_type, "Event received");

        if event.container.is_empty() || event.object_key.is_empty() {
            return Err(LoaderError::Validation(format!(
                "bucket ('{}') and object name ('{}') must both be non-empty",
                event.container, event.object_key
            )));
        }

        if !event.object_key.to_lowercase().ends_with(&self.extension) {
            info!("Skipping {}: not a {} file", event.object_key, self.extension);
            return Ok(Reception::Skipped {
                key: event.object_key.clone(),
                reason: format!("extension is not {}", self.extension),
            });
        }

        Ok(Reception::Accepted(ObjectRef {
            container: event.container.clone(),
            key: event.object_key.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(bucket: &str, name: &str) -> ObjectEvent {
        ObjectEvent::new(bucket, name, "evt-1", "google.cloud.storage.object.v1.finalized")
    }

    #[test]
    fn test_accepts_csv_case_insensitively() {
        let receiver = EventReceiver::new(".csv");
        for name in ["daily/users.csv", "USERS.CSV", "a.Csv"] {
            match receiver.receive(&event("uploads", name)).unwrap() {
                Reception::Accepted(obj) => {
                    assert_eq!(obj.container, "uploads");
                    assert_eq!(obj.key, name);
                }
                other => panic!("expected accepted, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_skips_other_extensions() {
        let receiver = EventReceiver::new(".CSV");
        for name in ["report.json", "users.csv.gz", "csv"] {
            assert!(matches!(
                receiver.receive(&event("uploads", name)).unwrap(),
                Reception::Skipped { .. }
            ));
        }
    }

    #[test]
    fn test_rejects_empty_identifiers() {
        let receiver = EventReceiver::new(".csv");
        let err = receiver.receive(&event("", "a.csv")).unwrap_err();
        assert!(matches!(err, LoaderError::Validation(_)));
        let err = receiver.receive(&event("uploads", "")).unwrap_err();
        assert!(matches!(err, LoaderError::Validation(_)));
    }
}
