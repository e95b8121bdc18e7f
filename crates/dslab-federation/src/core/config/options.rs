//! Config utils.

use std::collections::HashMap;

/// Parses config value string, which consists of two parts - name and options.
/// Example: Random[seed=7] parts are name Random and options string "seed=7".
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.trim().split_once('[') {
        Some((l, r)) => (l.trim().to_string(), Some(r.replace(']', ""))),
        None => (config_str.trim().to_string(), None),
    }
}

/// Parses options string from config value, returns map with option names and values.
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',') {
        if let Some((name, value)) = option_str.split_once('=') {
            options.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_value() {
        assert_eq!(parse_config_value("FirstFit"), ("FirstFit".to_string(), None));
        assert_eq!(
            parse_config_value("Random[seed=7]"),
            ("Random".to_string(), Some("seed=7".to_string()))
        );
    }

    #[test]
    fn test_parse_options() {
        let options = parse_options("seed=42, name = test,broken");
        assert_eq!(options.get("seed").unwrap(), "42");
        assert_eq!(options.get("name").unwrap(), "test");
        assert_eq!(options.get("broken"), None);
    }
}
