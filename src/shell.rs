//! Shell parsing helpers: segment splitting, POSIX word splitting, and
//! wrapper stripping.

/// Split a command string into top-level segments.
///
/// Splits at unquoted `;`, newline, `||`, `&&`, `|`, `|&` and unattached `&`.
/// A `&` that is part of a redirection (`2>&1`, `&>out`, `<&3`) does not
/// split. Never fails: malformed quoting simply yields the remaining buffer
/// as the final segment.
pub fn split_commands(command: &str) -> Vec<String> {
    let chars: Vec<char> = command.chars().collect();
    let mut parts: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escape = false;

    let mut flush = |buf: &mut String, parts: &mut Vec<String>| {
        let part = buf.trim();
        if !part.is_empty() {
            parts.push(part.to_string());
        }
        buf.clear();
    };

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];

        if escape {
            buf.push(ch);
            escape = false;
            i += 1;
            continue;
        }

        if ch == '\\' && !in_single {
            buf.push(ch);
            escape = true;
            i += 1;
            continue;
        }

        if ch == '\'' && !in_double {
            in_single = !in_single;
            buf.push(ch);
            i += 1;
            continue;
        }

        if ch == '"' && !in_single {
            in_double = !in_double;
            buf.push(ch);
            i += 1;
            continue;
        }

        if !in_single && !in_double {
            let next = chars.get(i + 1).copied();
            if (ch == '&' && next == Some('&'))
                || (ch == '|' && next == Some('|'))
                || (ch == '|' && next == Some('&'))
            {
                flush(&mut buf, &mut parts);
                i += 2;
                continue;
            }
            if ch == '|' {
                flush(&mut buf, &mut parts);
                i += 1;
                continue;
            }
            if ch == '&' {
                let prev = if i > 0 { Some(chars[i - 1]) } else { None };
                if matches!(prev, Some('>') | Some('<')) || next == Some('>') {
                    buf.push(ch);
                    i += 1;
                    continue;
                }
                flush(&mut buf, &mut parts);
                i += 1;
                continue;
            }
            if ch == ';' || ch == '\n' {
                flush(&mut buf, &mut parts);
                i += 1;
                continue;
            }
        }

        buf.push(ch);
        i += 1;
    }

    flush(&mut buf, &mut parts);
    parts
}

/// POSIX-style word splitting of one segment.
///
/// Returns `None` for input that cannot be parsed (unterminated quote or
/// trailing escape). Empty input yields an empty list.
pub fn tokenize(segment: &str) -> Option<Vec<String>> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        Single,
        Double,
    }

    let mut tokens: Vec<String> = Vec::new();
    // `current` is Some whenever a word is in progress, so quoted empty
    // strings survive as empty tokens.
    let mut current: Option<String> = None;
    let mut state = State::Normal;
    let mut chars = segment.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            State::Normal => {
                if ch.is_whitespace() {
                    if let Some(word) = current.take() {
                        tokens.push(word);
                    }
                } else if ch == '\\' {
                    match chars.next() {
                        Some(escaped) => current.get_or_insert_with(String::new).push(escaped),
                        None => return None,
                    }
                } else if ch == '\'' {
                    current.get_or_insert_with(String::new);
                    state = State::Single;
                } else if ch == '"' {
                    current.get_or_insert_with(String::new);
                    state = State::Double;
                } else {
                    current.get_or_insert_with(String::new).push(ch);
                }
            }
            State::Single => {
                if ch == '\'' {
                    state = State::Normal;
                } else {
                    current.get_or_insert_with(String::new).push(ch);
                }
            }
            State::Double => {
                if ch == '"' {
                    state = State::Normal;
                } else if ch == '\\' {
                    // Inside double quotes only `"` and `\` are escapable.
                    match chars.peek() {
                        Some('"') | Some('\\') => {
                            let escaped = chars.next().unwrap();
                            current.get_or_insert_with(String::new).push(escaped);
                        }
                        Some(_) => current.get_or_insert_with(String::new).push(ch),
                        None => return None,
                    }
                } else {
                    current.get_or_insert_with(String::new).push(ch);
                }
            }
        }
    }

    if state != State::Normal {
        return None;
    }
    if let Some(word) = current.take() {
        tokens.push(word);
    }
    Some(tokens)
}

fn is_env_assignment(token: &str) -> bool {
    let Some((key, _value)) = token.split_once('=') else {
        return false;
    };
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn strip_env_assignments(tokens: &[String]) -> &[String] {
    let mut i = 0;
    while i < tokens.len() && is_env_assignment(&tokens[i]) {
        i += 1;
    }
    &tokens[i..]
}

const WRAPPER_STRIP_LIMIT: usize = 20;

/// Remove leading environment assignments and `sudo`/`env`/`command`
/// wrappers, iteratively until a fixed point (bounded at 20 rounds).
pub fn strip_wrappers(tokens: &[String]) -> Vec<String> {
    let mut tokens: Vec<String> = tokens.to_vec();
    let mut previous: Option<Vec<String>> = None;
    let mut rounds = 0;

    while !tokens.is_empty() && previous.as_ref() != Some(&tokens) && rounds < WRAPPER_STRIP_LIMIT {
        previous = Some(tokens.clone());
        rounds += 1;

        tokens = strip_env_assignments(&tokens).to_vec();
        if tokens.is_empty() {
            return tokens;
        }

        let head = tokens[0].to_lowercase();
        if head == "sudo" {
            let mut i = 1;
            while i < tokens.len() && tokens[i].starts_with('-') && tokens[i] != "--" {
                i += 1;
            }
            if i < tokens.len() && tokens[i] == "--" {
                i += 1;
            }
            tokens.drain(..i);
            continue;
        }

        if head == "env" {
            let mut i = 1;
            while i < tokens.len() {
                let tok = tokens[i].as_str();
                if tok == "--" {
                    i += 1;
                    break;
                }
                if matches!(tok, "-u" | "--unset" | "-C" | "-P" | "-S") {
                    i += 2;
                    continue;
                }
                if tok.starts_with("--unset=") {
                    i += 1;
                    continue;
                }
                if tok.len() > 2
                    && (tok.starts_with("-u")
                        || tok.starts_with("-C")
                        || tok.starts_with("-P")
                        || tok.starts_with("-S"))
                {
                    i += 1;
                    continue;
                }
                if tok.starts_with('-') && tok != "-" {
                    i += 1;
                    continue;
                }
                break;
            }
            tokens.drain(..i.min(tokens.len()));
            continue;
        }

        if head == "command" {
            let mut i = 1;
            while i < tokens.len() {
                let tok = tokens[i].as_str();
                if tok == "--" {
                    i += 1;
                    break;
                }
                if matches!(tok, "-p" | "-v" | "-V") {
                    i += 1;
                    continue;
                }
                if tok.starts_with('-') && tok != "-" && !tok.starts_with("--") {
                    let cluster = &tok[1..];
                    if !cluster.is_empty() && cluster.chars().all(|c| matches!(c, 'p' | 'v' | 'V'))
                    {
                        i += 1;
                        continue;
                    }
                }
                break;
            }
            tokens.drain(..i);
            continue;
        }

        break;
    }

    strip_env_assignments(&tokens).to_vec()
}

/// Extract individual short option letters from tokens.
///
/// Stops at the `--` end-of-options marker, and within a token stops at the
/// first non-alphabetic character so `-C/path` contributes only `C`.
pub fn short_opts(tokens: &[String]) -> std::collections::HashSet<char> {
    let mut opts = std::collections::HashSet::new();
    for tok in tokens {
        if tok == "--" {
            break;
        }
        if tok.starts_with("--") || !tok.starts_with('-') || tok == "-" {
            continue;
        }
        for ch in tok[1..].chars() {
            if !ch.is_alphabetic() {
                break;
            }
            opts.insert(ch);
        }
    }
    opts
}

/// Strip common shell wrapper punctuation from a token.
///
/// Leaves `;` alone so callers can still recognize terminators like
/// `-exec ... \;`.
pub fn strip_token_wrappers(token: &str) -> &str {
    let mut tok = token.trim();
    while let Some(rest) = tok.strip_prefix("$(") {
        tok = rest;
    }
    tok = tok.trim_start_matches(['\\', '`', '(', '{', '[']);
    tok = tok.trim_end_matches(['`', ')', '}', ']']);
    tok
}

/// Normalize a command token for dispatch: strip wrapper punctuation and a
/// trailing `;`, lowercase, and reduce to the path basename.
pub fn normalize_cmd_token(token: &str) -> String {
    let tok = strip_token_wrappers(token);
    let tok = tok.trim_end_matches(';').to_lowercase();
    match tok.rsplit_once('/') {
        Some((_, base)) => base.to_string(),
        None => tok,
    }
}
