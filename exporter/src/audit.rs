//! Audit logging for administrative events.
//!
//! All events are emitted via `tracing` with a dedicated target so they can be
//! filtered and formatted (e.g. JSON) for audit pipelines.

use tracing::{info, warn};

pub const AUDIT_TARGET: &str = "osprom::audit";

/// Log an HTTP request to one of the exporter routes.
pub fn http_request(method: &str, path: &str, status: u16) {
    info!(
        target: AUDIT_TARGET,
        event = "http_request",
        method = %method,
        path = %path,
        status = %status,
    );
}

/// Log an accepted dynamic settings update.
pub fn settings_updated(keys: &[&str]) {
    info!(
        target: AUDIT_TARGET,
        event = "settings_updated",
        result = "ok",
        keys = %keys.join(","),
    );
}

/// Log a rejected dynamic settings update.
pub fn settings_rejected(reason: &str) {
    warn!(
        target: AUDIT_TARGET,
        event = "settings_rejected",
        result = "denied",
        reason = %reason,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a JSON subscriber and return the emitted events.
    fn record(f: impl FnOnce()) -> Vec<Value> {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_settings_events_fields() {
        let events = record(|| {
            settings_updated(&["prometheus.indices", "prometheus.nodes.filter"]);
            settings_rejected("unknown setting [prometheus.bogus]");
        });
        assert_eq!(events.len(), 2);

        let updated = &events[0];
        assert_eq!(updated["target"], AUDIT_TARGET);
        assert_eq!(updated["level"], "INFO");
        assert_eq!(updated["fields"]["event"], "settings_updated");
        assert_eq!(updated["fields"]["keys"], "prometheus.indices,prometheus.nodes.filter");

        let rejected = &events[1];
        assert_eq!(rejected["level"], "WARN");
        assert_eq!(rejected["fields"]["result"], "denied");
        assert_eq!(rejected["fields"]["reason"], "unknown setting [prometheus.bogus]");
    }

    #[test]
    fn test_http_request_fields() {
        let events = record(|| http_request("PUT", "/_prometheus/settings", 400));
        assert_eq!(events.len(), 1);
        let fields = &events[0]["fields"];
        assert_eq!(fields["event"], "http_request");
        assert_eq!(fields["method"], "PUT");
        assert_eq!(fields["path"], "/_prometheus/settings");
        assert_eq!(fields["status"], "400");
    }
}
