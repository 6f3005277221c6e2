use crate::pipeline::stage::StageResult;

/// Upper bound on captured output kept per failing case.
pub const DIAGNOSTIC_TAIL_BYTES: usize = 4_096;

/// Collapse whitespace runs to single spaces and cap the length, for one-line progress output.
pub fn compact_message(message: &str, max_len: usize) -> String {
    let mut compact = String::with_capacity(message.len().min(max_len + 16));
    for word in message.split_whitespace() {
        if !compact.is_empty() {
            compact.push(' ');
        }
        compact.push_str(word);
        if compact.len() > max_len {
            break;
        }
    }
    if compact.len() <= max_len {
        return compact;
    }
    let mut cut = max_len;
    while !compact.is_char_boundary(cut) {
        cut -= 1;
    }
    compact.truncate(cut);
    compact.push_str("...(truncated)");
    compact
}

/// Last `max_bytes` of `text`, starting on a line boundary when one is available.
pub fn output_tail(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    let tail = &text[start..];
    match tail.find('\n') {
        Some(idx) if idx + 1 < tail.len() => &tail[idx + 1..],
        _ => tail,
    }
}

/// Human-readable dump of a stage's streams for failure diagnostics.
pub fn stage_dump(result: &StageResult) -> String {
    let status = match result.exit_status {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    };
    let stdout = result.stdout_lossy();
    let stderr = result.stderr_lossy();
    format!(
        "stage={} exit={} elapsed_ms={} timed_out={}\n--- stderr ---\n{}\n--- stdout ---\n{}",
        result.stage,
        status,
        result.elapsed.as_millis(),
        result.timed_out,
        output_tail(stderr.trim_end(), DIAGNOSTIC_TAIL_BYTES),
        output_tail(stdout.trim_end(), DIAGNOSTIC_TAIL_BYTES),
    )
}
