/// Watch-mode commands and their resolution

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  /// Whether the command expects an argument
  pub takes_arg: bool,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "use",
    aliases: &["u", "switch", "con"],
    description: "Switch to another con instance",
    takes_arg: true,
  },
  Command {
    name: "reload",
    aliases: &["r", "refresh"],
    description: "Refetch every resource",
    takes_arg: false,
  },
  Command {
    name: "clear",
    aliases: &["c", "purge"],
    description: "Drop the local cache",
    takes_arg: false,
  },
  Command {
    name: "status",
    aliases: &["s", "show"],
    description: "Print the current summary",
    takes_arg: false,
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    description: "List commands",
    takes_arg: false,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit watch mode",
    takes_arg: false,
  },
];

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Use(String),
  Reload,
  Clear,
  Status,
  Help,
  Quit,
}

/// Why an input line didn't resolve to an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
  Empty,
  Unknown(String),
  MissingArgument(&'static str),
}

impl std::fmt::Display for ParseError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ParseError::Empty => write!(f, "no command given"),
      ParseError::Unknown(word) => write!(f, "unknown command '{}' (try 'help')", word),
      ParseError::MissingArgument(name) => write!(f, "'{}' needs an argument", name),
    }
  }
}

/// Get suggestions for a given input, best match first
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    if cmd.name == input_lower {
      matches.push((cmd, 0));
    } else if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
    } else if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
    } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve a line like `use testcon-2026` into an action.
pub fn parse(line: &str) -> Result<Action, ParseError> {
  let mut words = line.split_whitespace();
  let Some(word) = words.next() else {
    return Err(ParseError::Empty);
  };
  let arg = words.next();

  let cmd = get_suggestions(word)
    .into_iter()
    .next()
    .ok_or_else(|| ParseError::Unknown(word.to_string()))?;

  let action = match cmd.name {
    "use" => match arg {
      Some(instance) => Action::Use(instance.to_string()),
      None => return Err(ParseError::MissingArgument(cmd.name)),
    },
    "reload" => Action::Reload,
    "clear" => Action::Clear,
    "status" => Action::Status,
    "help" => Action::Help,
    _ => Action::Quit,
  };
  Ok(action)
}

/// One line per command, for `help`.
pub fn help_text() -> String {
  COMMANDS
    .iter()
    .map(|cmd| {
      let usage = if cmd.takes_arg {
        format!("{} <instance>", cmd.name)
      } else {
        cmd.name.to_string()
      };
      format!("  {:<16} {} ({})", usage, cmd.description, cmd.aliases.join(", "))
    })
    .collect::<Vec<_>>()
    .join("\n")
}
