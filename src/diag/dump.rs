//! Value dumps for diagnostics.

use std::fmt::Debug;

use serde::Serialize;

/// Pretty JSON rendering of `value`.
///
/// Values serde cannot represent (maps with non-string keys, for instance)
/// render as a short placeholder naming the error.
pub fn explain<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

/// Pretty `Debug` rendering, for types without `Serialize`.
pub fn explain_debug<T: Debug + ?Sized>(value: &T) -> String {
    format!("{value:#?}")
}

/// `name = dump` line used by [`show!`](crate::show).
pub fn labelled(name: &str, rendered: &str) -> String {
    if rendered.contains('\n') {
        format!("{name} = {}", rendered.replace('\n', "\n  "))
    } else {
        format!("{name} = {rendered}")
    }
}

/// Note each expression's source text alongside its dump.
///
/// ```
/// use suite_guard::harness::result_log::TapLog;
/// use suite_guard::harness::suite::Suite;
///
/// let mut suite = Suite::new(TapLog::buffered());
/// let answer = 42;
/// suite_guard::show!(suite, answer);
/// assert!(suite.log().output().contains("# answer = 42"));
/// # suite.plan(0).unwrap();
/// ```
#[macro_export]
macro_rules! show {
    ($suite:expr, $($value:expr),+ $(,)?) => {{
        $(
            let rendered = $crate::diag::dump::explain(&$value);
            $suite.note(&$crate::diag::dump::labelled(stringify!($value), &rendered));
        )+
    }};
}
