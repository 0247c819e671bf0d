use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Attach(Vec<PathBuf>), // /attach <path>...
    Remove(Option<usize>), // /remove <n> (1-based) | /remove
    Theme,                // /theme
    Help,                 // /help
    Quit,                 // /quit or /exit
    Usage(&'static str),
    Unknown(String),
}

pub fn parse_command(input: &str) -> Command {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Command::Unknown(trimmed.to_string());
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

    match verb {
        "/attach" => match rest.map(split_args) {
            Some(args) if !args.is_empty() => {
                Command::Attach(args.iter().map(|a| expand_path(a)).collect())
            }
            _ => Command::Usage("/attach <path> [path...]"),
        },
        "/remove" => match rest {
            None => Command::Remove(None),
            Some(n) => match n.parse::<usize>() {
                Ok(n) if n > 0 => Command::Remove(Some(n - 1)),
                _ => Command::Usage("/remove [n]  (n starts at 1)"),
            },
        },
        "/theme" => Command::Theme,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

/// Whitespace-separated arguments; double quotes group an argument with spaces.
fn split_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in raw.chars() {
        match ch {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}
