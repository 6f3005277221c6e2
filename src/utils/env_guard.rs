use std::fs;
use std::path::Path;

/// Parse `KEY=value` lines; blank lines, comments and lines without `=` are skipped.
pub fn parse_dot_env(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let value = value.trim();
        let unquoted = if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            &value[1..value.len() - 1]
        } else {
            value.split(" #").next().unwrap_or("").trim()
        };
        pairs.push((key.to_string(), unquoted.to_string()));
    }
    pairs
}

/// Load `path` into the process environment without overriding keys that are already set.
///
/// Must run before any worker threads start.
pub fn load_dot_env(path: &Path) -> usize {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return 0,
    };
    let mut applied = 0usize;
    for (key, value) in parse_dot_env(&content) {
        if std::env::var_os(&key).is_some() {
            continue;
        }
        std::env::set_var(&key, value);
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::parse_dot_env;

    #[test]
    fn test_parse_dot_env_handles_quotes_comments_and_export() {
        let pairs = parse_dot_env(
            "# toolchain\nPTXH_LLC=\"/opt/llc-16\"\nexport PTXH_WORKERS=2 # three is too many\n\nbroken line\nPTXH_MCPU='sm_80'\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("PTXH_LLC".to_string(), "/opt/llc-16".to_string()),
                ("PTXH_WORKERS".to_string(), "2".to_string()),
                ("PTXH_MCPU".to_string(), "sm_80".to_string()),
            ]
        );
    }
}
