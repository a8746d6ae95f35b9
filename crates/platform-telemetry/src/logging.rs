//! Structured logging helpers.
//!
//! Every log line carries a `subsystem` field so that JSON logs from the
//! contest, scoring, membership and runtime components can be told apart.

/// Log with a `subsystem` field.
#[macro_export]
macro_rules! log_event {
    (info, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };

    (error, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a contest-scoped event with `contest_id` attached.
#[macro_export]
macro_rules! log_contest_event {
    ($level:ident, $subsystem:expr, $msg:expr, $contest_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            contest_id = %$contest_id,
            $($($field)*,)?
            $msg
        )
    };
}
