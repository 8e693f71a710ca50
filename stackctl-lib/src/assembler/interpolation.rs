use std::collections::BTreeMap;

use serde_yml::Value;

use crate::error::AssemblyError;

/// Substitutes `$VAR`, `${VAR}`, `${VAR:-default}`, `${VAR-default}`,
/// `${VAR:?message}` and `${VAR?message}` in `input`. `$$` yields a literal
/// `$`.
pub fn interpolate(input: &str, env: &BTreeMap<String, String>) -> Result<String, AssemblyError> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('{') => {
                chars.next();
                let mut expr = String::new();
                let mut depth = 1usize;
                let mut closed = false;
                for c in chars.by_ref() {
                    match c {
                        '{' if expr.ends_with('$') => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                closed = true;
                                break;
                            }
                        }
                        _ => {}
                    }
                    expr.push(c);
                }
                if !closed {
                    return Err(AssemblyError::Interpolation(input.to_string()));
                }
                out.push_str(&expand(&expr, env, input)?);
            }
            Some(c) if is_name_start(c) => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_name_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if let Some(value) = env.get(&name) {
                    out.push_str(value);
                }
            }
            _ => out.push('$'),
        }
    }

    Ok(out)
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn expand(
    expr: &str,
    env: &BTreeMap<String, String>,
    input: &str,
) -> Result<String, AssemblyError> {
    let split = expr
        .find(|c: char| !is_name_char(c))
        .unwrap_or(expr.len());
    let (name, op) = expr.split_at(split);

    if !name.starts_with(is_name_start) {
        return Err(AssemblyError::Interpolation(input.to_string()));
    }

    let value = env.get(name).map(String::as_str);
    let set_non_empty = value.filter(|v| !v.is_empty());

    let expanded = if op.is_empty() {
        value.unwrap_or_default().to_string()
    } else if let Some(default) = op.strip_prefix(":-") {
        set_non_empty
            .map(str::to_string)
            .map_or_else(|| interpolate(default, env), Ok)?
    } else if let Some(default) = op.strip_prefix('-') {
        value
            .map(str::to_string)
            .map_or_else(|| interpolate(default, env), Ok)?
    } else if let Some(message) = op.strip_prefix(":?") {
        set_non_empty
            .map(str::to_string)
            .ok_or_else(|| required(name, message))?
    } else if let Some(message) = op.strip_prefix('?') {
        value
            .map(str::to_string)
            .ok_or_else(|| required(name, message))?
    } else {
        return Err(AssemblyError::Interpolation(input.to_string()));
    };

    Ok(expanded)
}

fn required(name: &str, message: &str) -> AssemblyError {
    AssemblyError::RequiredVariable {
        name: name.to_string(),
        message: message.to_string(),
    }
}

/// Interpolates every string scalar below `value`. Mapping keys are left
/// alone.
pub fn interpolate_value(
    value: &mut Value,
    env: &BTreeMap<String, String>,
) -> Result<(), AssemblyError> {
    match value {
        Value::String(s) => {
            if s.contains('$') {
                *s = interpolate(s, env)?;
            }
        }
        Value::Sequence(items) => {
            for item in items {
                interpolate_value(item, env)?;
            }
        }
        Value::Mapping(map) => {
            for v in map.values_mut() {
                interpolate_value(v, env)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("TAG".to_string(), "1.25".to_string()),
            ("EMPTY".to_string(), String::new()),
            ("PORT".to_string(), "8080".to_string()),
        ])
    }

    #[test]
    fn substitutes_plain_and_braced_references() {
        let env = env();
        assert_eq!(interpolate("nginx:$TAG", &env).unwrap(), "nginx:1.25");
        assert_eq!(interpolate("nginx:${TAG}-alpine", &env).unwrap(), "nginx:1.25-alpine");
        assert_eq!(interpolate("${PORT}:80", &env).unwrap(), "8080:80");
        assert_eq!(interpolate("$MISSING/x", &env).unwrap(), "/x");
    }

    #[test]
    fn defaults_distinguish_unset_from_empty() {
        let env = env();
        assert_eq!(interpolate("${EMPTY:-fallback}", &env).unwrap(), "fallback");
        assert_eq!(interpolate("${EMPTY-fallback}", &env).unwrap(), "");
        assert_eq!(interpolate("${NOPE-fallback}", &env).unwrap(), "fallback");
        assert_eq!(interpolate("${NOPE:-$TAG}", &env).unwrap(), "1.25");
        assert_eq!(interpolate("${TAG:-other}", &env).unwrap(), "1.25");
    }

    #[test]
    fn defaults_may_reference_other_variables() {
        let env = env();
        assert_eq!(interpolate("${NOPE:-${TAG}}", &env).unwrap(), "1.25");
        assert_eq!(
            interpolate("app:${NOPE:-${EMPTY:-${TAG}}}-x", &env).unwrap(),
            "app:1.25-x"
        );
        assert_eq!(interpolate("${TAG:-${NOPE}}", &env).unwrap(), "1.25");
        assert!(interpolate("${NOPE:-${TAG}", &env).is_err());
    }

    #[test]
    fn required_variables_fail_when_missing() {
        let env = env();
        let err = interpolate("${NOPE:?must be set}", &env).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::RequiredVariable { name, message }
                if name == "NOPE" && message == "must be set"
        ));
        assert!(interpolate("${EMPTY?x}", &env).is_ok());
        assert!(interpolate("${EMPTY:?x}", &env).is_err());
    }

    #[test]
    fn escapes_and_malformed_expressions() {
        let env = env();
        assert_eq!(interpolate("cost: $$5", &env).unwrap(), "cost: $5");
        assert_eq!(interpolate("a $ b", &env).unwrap(), "a $ b");
        assert!(interpolate("${TAG", &env).is_err());
        assert!(interpolate("${}", &env).is_err());
        assert!(interpolate("${TAG!}", &env).is_err());
    }

    #[test]
    fn walks_nested_values() {
        let mut value: Value =
            serde_yml::from_str("image: app:${TAG}\nports: [\"$PORT:80\"]\n").unwrap();

        interpolate_value(&mut value, &env()).unwrap();

        assert_eq!(value["image"].as_str(), Some("app:1.25"));
        assert_eq!(value["ports"][0].as_str(), Some("8080:80"));
    }
}
