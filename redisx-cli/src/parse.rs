/// What the user typed at the prompt.
#[derive(PartialEq, Debug, Eq)]
pub enum Command {
    Help,
    Quit,
    Clear,
    /// Disconnect and connect again
    Reconnect,
    /// Anything else goes to the server as is
    Request(Vec<String>),
    ParseError(String),
}

/// Parses a single argument from the character stream.
/// Arguments may be quoted with single or double quotes, in which case they
/// may contain whitespace, and a backslash escapes the next character.
///
/// Returns `Ok(None)` once the input is exhausted.
pub fn parse_arg(chars: &[char], pointer: &mut usize) -> Result<Option<String>, String> {
    let l = chars.len();

    // Skip leading whitespace
    while *pointer < l && chars[*pointer].is_whitespace() {
        *pointer += 1;
    }

    if *pointer >= l {
        return Ok(None);
    }

    let delimiter = match chars[*pointer] {
        c @ ('"' | '\'') => {
            *pointer += 1;
            Some(c)
        }
        _ => None,
    };

    let mut arg_chars = Vec::new();

    if let Some(delim) = delimiter {
        while *pointer < l && chars[*pointer] != delim {
            if chars[*pointer] == '\\' && *pointer + 1 < l {
                *pointer += 1;
                arg_chars.push(match chars[*pointer] {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    c => c,
                });
            } else {
                arg_chars.push(chars[*pointer]);
            }
            *pointer += 1;
        }

        if *pointer < l && chars[*pointer] == delim {
            *pointer += 1;
        } else {
            return Err(format!("Unclosed quote at position {}", *pointer));
        }

        if *pointer < l && !chars[*pointer].is_whitespace() {
            return Err("Closing quote must be followed by a space".to_string());
        }
    } else {
        while *pointer < l && !chars[*pointer].is_whitespace() {
            arg_chars.push(chars[*pointer]);
            *pointer += 1;
        }
    }

    Ok(Some(String::from_iter(arg_chars)))
}

/// Splits a line into arguments.
pub fn split_args(line: &str) -> Result<Vec<String>, String> {
    let chars: Vec<char> = line.chars().collect();
    let mut pointer = 0;
    let mut args = Vec::new();

    while let Some(arg) = parse_arg(&chars, &mut pointer)? {
        args.push(arg);
    }

    Ok(args)
}

pub fn parse_line(line: &str) -> Command {
    let args = match split_args(line) {
        Ok(args) => args,
        Err(e) => return Command::ParseError(e),
    };

    let Some(first) = args.first() else {
        return Command::ParseError("Empty command".to_string());
    };

    match first.to_lowercase().as_str() {
        "help" | "?" if args.len() == 1 => Command::Help,
        "quit" | "exit" => Command::Quit,
        "clear" => Command::Clear,
        "reconnect" => Command::Reconnect,
        _ => Command::Request(args),
    }
}
