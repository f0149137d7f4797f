//! Quote-aware argument splitting for step lines

/// Split on whitespace, keeping `'...'` and `"..."` groups together
///
/// Quotes are removed from the returned tokens. An unterminated quote runs
/// to the end of the line.
pub fn split_args(s: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in s.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_token {
        args.push(current);
    }
    args
}

/// Split `left SEP right` at the first separator, trimming both sides
pub fn split_pair<'a>(s: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    let (left, right) = s.split_once(sep)?;
    let (left, right) = (left.trim(), right.trim());
    if left.is_empty() {
        return None;
    }
    Some((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_args_quotes() {
        assert_eq!(split_args("'#user' 'John Doe'"), vec!["#user", "John Doe"]);
        assert_eq!(
            split_args(r#"'//input[@id="a b"]' x"#),
            vec![r#"//input[@id="a b"]"#, "x"]
        );
        assert_eq!(split_args("a   b"), vec!["a", "b"]);
        assert_eq!(split_args("''"), vec![""]);
    }

    #[test]
    fn test_split_pair() {
        assert_eq!(split_pair("a = b = c", "="), Some(("a", "b = c")));
        assert_eq!(split_pair(" = b", "="), None);
        assert_eq!(split_pair("no separator", "="), None);
    }
}
