//! Extraction of named counters from Prometheus text exposition

/// Sum every series of `name` across label sets.
///
/// Returns `None` when the metric does not appear at all. Comment lines,
/// other metrics sharing the prefix (`name_created`, `name_bucket`) and
/// malformed values are skipped.
pub fn sum_metric(text: &str, name: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut found = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(rest) = line.strip_prefix(name) else {
            continue;
        };

        let value_part = if let Some(labelled) = rest.strip_prefix('{') {
            match labelled.rfind('}') {
                Some(end) => &labelled[end + 1..],
                None => continue,
            }
        } else if rest.starts_with(char::is_whitespace) {
            rest
        } else {
            continue;
        };

        // A trailing timestamp may follow the value
        if let Some(value) = value_part
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<f64>().ok())
        {
            total += value;
            found = true;
        }
    }

    found.then_some(total)
}
