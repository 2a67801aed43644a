use std::time::Duration;

/// Format an elapsed time as `1h 2m 3s 4ms`.
///
/// Leading zero units are omitted; once a unit is printed all smaller units
/// follow. A zero duration yields an empty string.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let sec = total_sec % 60;
    let total_min = total_sec / 60;
    let min = total_min % 60;
    let hrs = total_min / 60;

    let mut parts = Vec::new();
    let mut started = false;
    if hrs > 0 {
        parts.push(format!("{}h", hrs));
        started = true;
    }
    if min > 0 || started {
        parts.push(format!("{}m", min));
        started = true;
    }
    if sec > 0 || started {
        parts.push(format!("{}s", sec));
        started = true;
    }
    if ms > 0 || started {
        parts.push(format!("{}ms", ms));
    }
    parts.join(" ")
}
