/// Quote state while scanning an argument string.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Splits `input` into arguments the way a POSIX shell would, without
/// expansion.
///
/// Whitespace separates arguments unless quoted. Single quotes are literal;
/// inside double quotes a backslash escapes the next character. Outside
/// quotes a backslash escapes the next character as well. Adjacent quoted and
/// unquoted parts join into one argument, and `""` yields an empty argument.
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    // Tracks whether an argument was started, so `""` is kept.
    let mut started = false;
    let mut quote = Quote::None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Quote::None, c) if c.is_whitespace() => {
                if started {
                    args.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            (Quote::None, '\'') => {
                quote = Quote::Single;
                started = true;
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                started = true;
            }
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::None | Quote::Double, '\\') => {
                started = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            (_, c) => {
                started = true;
                current.push(c);
            }
        }
    }

    if started {
        args.push(current);
    }
    args
}
