//! Helpers for tasks spawned to isolate checks, actions and cycles.

use tokio::task::JoinError;

/// Best-effort text of a task failure: the panic message, if any.
pub fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}
