//! The subscriber is process-global, so this lives in its own test binary
//! with nothing else installing one.

use jobchan::init_logging;

#[test]
fn installs_once() {
    assert!(init_logging("debug").is_ok());
    assert!(init_logging("debug").is_err());
}
