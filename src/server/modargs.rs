//! Module argument strings: `key=value key2="quoted value"`.

use std::collections::BTreeMap;

use super::error::CoreError;

/// Whether `key` can appear on the left side of `key=value`.
pub fn key_valid(key: &str) -> bool {
    !key.is_empty()
        && key.is_ascii()
        && !key.bytes().any(|b| b.is_ascii_whitespace() || b == b'=' || b.is_ascii_control())
}

/// Render `args` as a module argument string.
///
/// Values are always double quoted with `"` and `\` escaped.
///
/// # Errors
/// Returns error if a key is not a valid argument key.
pub fn format<'a, I>(args: I) -> Result<String, CoreError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (key, value) in args {
        if !key_valid(key) {
            return Err(CoreError::InvalidModuleArguments(format!(
                "Invalid module argument name: {key}"
            )));
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(key);
        out.push_str("=\"");
        for c in value.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    }
    Ok(out)
}

#[derive(Clone, Copy)]
enum State {
    Whitespace,
    Key,
    ValueStart,
    Simple,
    Quoted(char),
}

/// Parse a module argument string.
///
/// # Errors
/// Returns error on a key without `=`, a repeated key or an unterminated quote.
pub fn parse(input: &str) -> Result<BTreeMap<String, String>, CoreError> {
    let invalid = |detail: &str| CoreError::InvalidModuleArguments(format!("{detail}: {input}"));

    let mut args = BTreeMap::new();
    let mut state = State::Whitespace;
    let mut key = String::new();
    let mut value = String::new();
    let mut escaped = false;

    let mut finish = |key: &mut String, value: &mut String| -> Result<(), CoreError> {
        if args
            .insert(std::mem::take(key), std::mem::take(value))
            .is_some()
        {
            return Err(invalid("Duplicate module argument"));
        }
        Ok(())
    };

    for c in input.chars() {
        match state {
            State::Whitespace => {
                if !c.is_whitespace() {
                    key.push(c);
                    state = State::Key;
                }
            }
            State::Key => {
                if c == '=' {
                    state = State::ValueStart;
                } else if c.is_whitespace() {
                    return Err(invalid("Module argument without value"));
                } else {
                    key.push(c);
                }
            }
            State::ValueStart => match c {
                '"' | '\'' => state = State::Quoted(c),
                c if c.is_whitespace() => {
                    finish(&mut key, &mut value)?;
                    state = State::Whitespace;
                }
                c => {
                    value.push(c);
                    state = State::Simple;
                }
            },
            State::Simple => {
                if escaped {
                    value.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c.is_whitespace() {
                    finish(&mut key, &mut value)?;
                    state = State::Whitespace;
                } else {
                    value.push(c);
                }
            }
            State::Quoted(quote) => {
                if escaped {
                    value.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    finish(&mut key, &mut value)?;
                    state = State::Whitespace;
                } else {
                    value.push(c);
                }
            }
        }
    }

    match state {
        State::Whitespace => {}
        State::ValueStart | State::Simple => finish(&mut key, &mut value)?,
        State::Key => return Err(invalid("Module argument without value")),
        State::Quoted(_) => return Err(invalid("Unterminated quote in module arguments")),
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_then_parse_keeps_awkward_values() {
        let rendered = format([("sink_name", "out put"), ("label", r#"say "hi" \o/"#)]).unwrap();
        assert_eq!(
            rendered,
            r#"sink_name="out put" label="say \"hi\" \\o/""#
        );

        let parsed = parse(&rendered).unwrap();
        assert_eq!(parsed["sink_name"], "out put");
        assert_eq!(parsed["label"], r#"say "hi" \o/"#);
    }

    #[test]
    fn parses_unquoted_and_single_quoted_values() {
        let parsed = parse("rate=48000  channels='2' empty=").unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed["rate"], "48000");
        assert_eq!(parsed["channels"], "2");
        assert_eq!(parsed["empty"], "");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("novalue").is_err());
        assert!(parse("a=1 a=2").is_err());
        assert!(parse("a=\"open").is_err());
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(!key_valid(""));
        assert!(!key_valid("has space"));
        assert!(!key_valid("tab\there"));
        assert!(!key_valid("nön-ascii"));
        assert!(format([("", "x")]).is_err());
    }
}
