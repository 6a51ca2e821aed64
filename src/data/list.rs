//! Parser for flat Python list literals such as `[1, 2.5]`, `['a', "b"]`
//! or `[True, False]`.

/// Split a flat list literal into its items.
///
/// Quoted items are returned without their quotes (with `\'`, `\"` and `\\`
/// unescaped); bare items are returned trimmed. Nested lists are rejected.
pub fn parse_list(raw: &str) -> Result<Vec<String>, String> {
    let inner = raw
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| format!("expected '[...]', got '{}'", raw.trim()))?;

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else { break };

        let item = match first {
            '\'' | '"' => {
                chars.next();
                let mut item = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some(escaped) => item.push(escaped),
                            None => return Err("dangling escape".to_string()),
                        },
                        c if c == first => {
                            closed = true;
                            break;
                        }
                        c => item.push(c),
                    }
                }
                if !closed {
                    return Err(format!("unterminated string starting with {first}"));
                }
                item
            }
            '[' | ']' => return Err("nested lists are not supported".to_string()),
            ',' => return Err("empty list item".to_string()),
            _ => {
                let mut item = String::new();
                while let Some(c) = chars.next_if(|&c| c != ',') {
                    item.push(c);
                }
                item.trim_end().to_string()
            }
        };
        items.push(item);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            Some(',') | None => {}
            Some(c) => return Err(format!("expected ',' after item, found '{c}'")),
        }
    }

    Ok(items)
}
