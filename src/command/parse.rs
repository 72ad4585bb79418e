//! Tokenizing command lines and building typed commands.

use super::Verb;
use super::mode::ModeSpec;
use crate::error::ShellError;

/// Destination of `echo ... > FILE` / `>> FILE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub path: String,
    pub append: bool,
}

/// Entry type filter for `find -type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A parsed command with typed arguments. One variant per [`Verb`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List {
        paths: Vec<String>,
        long: bool,
        all: bool,
    },
    ChangeDirectory {
        target: Option<String>,
    },
    PrintWorkingDirectory,
    MakeDirectory {
        paths: Vec<String>,
        parents: bool,
    },
    Remove {
        paths: Vec<String>,
        recursive: bool,
        force: bool,
    },
    Touch {
        paths: Vec<String>,
    },
    Cat {
        paths: Vec<String>,
    },
    Echo {
        text: String,
        redirect: Option<Redirect>,
    },
    Grep {
        pattern: String,
        paths: Vec<String>,
        recursive: bool,
        ignore_case: bool,
        fixed: bool,
    },
    Find {
        start: String,
        name: Option<String>,
        kind: Option<EntryKind>,
    },
    Head {
        lines: Option<usize>,
        path: String,
    },
    Tail {
        lines: Option<usize>,
        path: String,
    },
    Stat {
        paths: Vec<String>,
    },
    Chmod {
        mode: ModeSpec,
        paths: Vec<String>,
    },
    Copy {
        sources: Vec<String>,
        dest: String,
        recursive: bool,
    },
    Move {
        sources: Vec<String>,
        dest: String,
    },
    Monitor,
    Help {
        topic: Option<String>,
    },
    Exit,
}

/// Splits a line into words, honoring single/double quotes and backslashes.
///
/// # Errors
///
/// Returns `ShellError::Usage` for unbalanced quoting.
pub fn tokenize(line: &str) -> Result<Vec<String>, ShellError> {
    shell_words::split(line)
        .map_err(|_| ShellError::Usage("parse error: invalid quoting or tokenization".to_string()))
}

/// Tokenizes `line` and looks up its verb.
///
/// Returns `Ok(None)` for a blank line.
///
/// # Errors
///
/// Returns `ShellError::Usage` for bad quoting and
/// `ShellError::UnknownCommand` for an unrecognized first word.
pub fn split_verb(line: &str) -> Result<Option<(Verb, Vec<String>)>, ShellError> {
    let mut words = tokenize(line)?;
    if words.is_empty() {
        return Ok(None);
    }
    let name = words.remove(0);
    let verb = Verb::from_name(&name).ok_or(ShellError::UnknownCommand { name })?;
    Ok(Some((verb, words)))
}

impl Command {
    #[must_use]
    pub fn verb(&self) -> Verb {
        match self {
            Self::List { .. } => Verb::List,
            Self::ChangeDirectory { .. } => Verb::ChangeDirectory,
            Self::PrintWorkingDirectory => Verb::PrintWorkingDirectory,
            Self::MakeDirectory { .. } => Verb::MakeDirectory,
            Self::Remove { .. } => Verb::Remove,
            Self::Touch { .. } => Verb::Touch,
            Self::Cat { .. } => Verb::Cat,
            Self::Echo { .. } => Verb::Echo,
            Self::Grep { .. } => Verb::Grep,
            Self::Find { .. } => Verb::Find,
            Self::Head { .. } => Verb::Head,
            Self::Tail { .. } => Verb::Tail,
            Self::Stat { .. } => Verb::Stat,
            Self::Chmod { .. } => Verb::Chmod,
            Self::Copy { .. } => Verb::Copy,
            Self::Move { .. } => Verb::Move,
            Self::Monitor => Verb::Monitor,
            Self::Help { .. } => Verb::Help,
            Self::Exit => Verb::Exit,
        }
    }

    /// Parses the arguments that follow `verb`.
    ///
    /// # Errors
    ///
    /// Returns `ShellError::Usage` naming the expected form when the
    /// arguments do not fit it.
    pub fn parse(verb: Verb, args: Vec<String>) -> Result<Self, ShellError> {
        let command = match verb {
            Verb::List => {
                let (flags, paths) = split_flags(verb, args, "la")?;
                Self::List {
                    paths,
                    long: flags.contains('l'),
                    all: flags.contains('a'),
                }
            }
            Verb::ChangeDirectory => {
                let mut args = args;
                if args.len() > 1 {
                    return Err(verb.usage_error());
                }
                Self::ChangeDirectory { target: args.pop() }
            }
            Verb::PrintWorkingDirectory => no_args(verb, &args, Self::PrintWorkingDirectory)?,
            Verb::MakeDirectory => {
                let (flags, paths) = split_flags(verb, args, "p")?;
                require(verb, &paths, 1)?;
                Self::MakeDirectory {
                    paths,
                    parents: flags.contains('p'),
                }
            }
            Verb::Remove => {
                let (flags, paths) = split_flags(verb, args, "rRf")?;
                require(verb, &paths, 1)?;
                Self::Remove {
                    paths,
                    recursive: flags.contains('r') || flags.contains('R'),
                    force: flags.contains('f'),
                }
            }
            Verb::Touch => {
                let (_, paths) = split_flags(verb, args, "")?;
                require(verb, &paths, 1)?;
                Self::Touch { paths }
            }
            Verb::Cat => {
                let (_, paths) = split_flags(verb, args, "")?;
                require(verb, &paths, 1)?;
                Self::Cat { paths }
            }
            Verb::Echo => parse_echo(args)?,
            Verb::Grep => {
                let (flags, mut operands) = split_flags(verb, args, "rRiF")?;
                require(verb, &operands, 1)?;
                let pattern = operands.remove(0);
                let recursive = flags.contains('r') || flags.contains('R');
                if operands.is_empty() && !recursive {
                    return Err(verb.usage_error());
                }
                Self::Grep {
                    pattern,
                    paths: operands,
                    recursive,
                    ignore_case: flags.contains('i'),
                    fixed: flags.contains('F'),
                }
            }
            Verb::Find => parse_find(args)?,
            Verb::Head => {
                let (lines, path) = parse_line_count(verb, args)?;
                Self::Head { lines, path }
            }
            Verb::Tail => {
                let (lines, path) = parse_line_count(verb, args)?;
                Self::Tail { lines, path }
            }
            Verb::Stat => {
                let (_, paths) = split_flags(verb, args, "")?;
                require(verb, &paths, 1)?;
                Self::Stat { paths }
            }
            Verb::Chmod => {
                // Symbolic modes such as `-x` look like flags, so no flag parsing here
                let mut args = args;
                require(verb, &args, 2)?;
                let mode = args.remove(0).parse::<ModeSpec>().map_err(ShellError::Usage)?;
                Self::Chmod { mode, paths: args }
            }
            Verb::Copy => {
                let (flags, mut operands) = split_flags(verb, args, "rR")?;
                require(verb, &operands, 2)?;
                let dest = operands.pop().unwrap_or_default();
                Self::Copy {
                    sources: operands,
                    dest,
                    recursive: flags.contains('r') || flags.contains('R'),
                }
            }
            Verb::Move => {
                let (_, mut operands) = split_flags(verb, args, "")?;
                require(verb, &operands, 2)?;
                let dest = operands.pop().unwrap_or_default();
                Self::Move {
                    sources: operands,
                    dest,
                }
            }
            Verb::Monitor => no_args(verb, &args, Self::Monitor)?,
            Verb::Help => {
                let mut args = args;
                if args.len() > 1 {
                    return Err(verb.usage_error());
                }
                Self::Help { topic: args.pop() }
            }
            Verb::Exit => no_args(verb, &args, Self::Exit)?,
        };
        Ok(command)
    }
}

fn no_args(verb: Verb, args: &[String], command: Command) -> Result<Command, ShellError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(verb.usage_error())
    }
}

fn require(verb: Verb, operands: &[String], min: usize) -> Result<(), ShellError> {
    if operands.len() < min {
        Err(verb.usage_error())
    } else {
        Ok(())
    }
}

/// Separates single-letter flag clusters (`-rf`) from operands.
///
/// `-` alone is an operand and `--` ends flag parsing.
fn split_flags(
    verb: Verb,
    args: Vec<String>,
    allowed: &str,
) -> Result<(String, Vec<String>), ShellError> {
    let mut flags = String::new();
    let mut operands = Vec::new();
    let mut flags_done = false;

    for arg in args {
        if flags_done || arg == "-" || !arg.starts_with('-') {
            operands.push(arg);
        } else if arg == "--" {
            flags_done = true;
        } else {
            for c in arg.chars().skip(1) {
                if !allowed.contains(c) {
                    return Err(ShellError::Usage(format!(
                        "invalid option -- '{c}'; usage: {}",
                        verb.usage()
                    )));
                }
                flags.push(c);
            }
        }
    }

    Ok((flags, operands))
}

/// Only a bare `>` or `>>` token redirects. Quoting is gone after
/// tokenizing, so `">x"` is ordinary text.
fn parse_echo(args: Vec<String>) -> Result<Command, ShellError> {
    let position = args.iter().position(|a| a == ">" || a == ">>");
    let Some(index) = position else {
        return Ok(Command::Echo {
            text: args.join(" "),
            redirect: None,
        });
    };

    let text = args[..index].join(" ");
    let append = args[index] == ">>";
    let Some(path) = args.get(index + 1).cloned() else {
        return Err(ShellError::Usage(
            "no file specified for redirection".to_string(),
        ));
    };
    if args.len() > index + 2 {
        return Err(Verb::Echo.usage_error());
    }

    Ok(Command::Echo {
        text,
        redirect: Some(Redirect { path, append }),
    })
}

fn parse_find(args: Vec<String>) -> Result<Command, ShellError> {
    let verb = Verb::Find;
    let mut args = args.into_iter().peekable();

    let start = match args.peek() {
        Some(first) if !first.starts_with('-') => args.next().unwrap_or_default(),
        _ => ".".to_string(),
    };

    let mut name = None;
    let mut kind = None;
    while let Some(predicate) = args.next() {
        let value = args.next().ok_or_else(|| verb.usage_error())?;
        match predicate.as_str() {
            "-name" => name = Some(value),
            "-type" => {
                kind = Some(match value.as_str() {
                    "f" => EntryKind::File,
                    "d" => EntryKind::Directory,
                    _ => {
                        return Err(ShellError::Usage(format!(
                            "unknown argument to -type: '{value}'"
                        )));
                    }
                });
            }
            _ => return Err(verb.usage_error()),
        }
    }

    Ok(Command::Find { start, name, kind })
}

/// Parses `[-n N | -nN | -N] FILE`.
fn parse_line_count(verb: Verb, args: Vec<String>) -> Result<(Option<usize>, String), ShellError> {
    let mut lines = None;
    let mut operands = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let raw = if arg == "-n" {
            Some(args.next().ok_or_else(|| verb.usage_error())?)
        } else if let Some(value) = arg.strip_prefix("-n") {
            Some(value.to_string())
        } else if arg.len() > 1 && arg.starts_with('-') {
            Some(arg[1..].to_string())
        } else {
            operands.push(arg);
            None
        };

        if let Some(raw) = raw {
            lines = Some(parse_count(&raw)?);
        }
    }

    if operands.len() != 1 {
        return Err(verb.usage_error());
    }
    Ok((lines, operands.remove(0)))
}

fn parse_count(raw: &str) -> Result<usize, ShellError> {
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => usize::try_from(n)
            .map_err(|_| ShellError::Usage(format!("invalid number of lines: '{raw}'"))),
        _ => Err(ShellError::Usage(format!("invalid number of lines: '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse_line(line: &str) -> Result<Command, ShellError> {
        let (verb, args) = split_verb(line)?.expect("non-blank line");
        Command::parse(verb, args)
    }

    #[test]
    fn test_blank_line() {
        assert!(split_verb("   ").expect("blank parses").is_none());
    }

    #[test]
    fn test_quoting() {
        let words = tokenize(r#"echo "hello world" 'a b' c\ d"#).expect("tokenize");
        assert_eq!(words, vec!["echo", "hello world", "a b", "c d"]);

        let err = tokenize("echo \"unterminated").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_unknown_command_echoes_token() {
        let err = split_verb("vim notes.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCommand);
        assert_eq!(err.to_string(), "vim: command not found");
    }

    #[test]
    fn test_list_flags() {
        assert_eq!(
            parse_line("ls -la docs").expect("parse"),
            Command::List {
                paths: vec!["docs".to_string()],
                long: true,
                all: true,
            }
        );
        let err = parse_line("ls -z").unwrap_err();
        assert!(err.to_string().contains("invalid option -- 'z'"));
    }

    #[test]
    fn test_remove_flags() {
        assert_eq!(
            parse_line("rm -rf a b").expect("parse"),
            Command::Remove {
                paths: vec!["a".to_string(), "b".to_string()],
                recursive: true,
                force: true,
            }
        );
        assert_eq!(parse_line("rm").unwrap_err().kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_double_dash_ends_flags() {
        assert_eq!(
            parse_line("grep -- -x f").expect("parse"),
            Command::Grep {
                pattern: "-x".to_string(),
                paths: vec!["f".to_string()],
                recursive: false,
                ignore_case: false,
                fixed: false,
            }
        );
    }

    #[test]
    fn test_grep_needs_path_unless_recursive() {
        assert_eq!(parse_line("grep foo").unwrap_err().kind(), ErrorKind::Usage);
        assert!(matches!(
            parse_line("grep -r foo").expect("parse"),
            Command::Grep { recursive: true, ref paths, .. } if paths.is_empty()
        ));
    }

    #[test]
    fn test_echo_redirection() {
        assert_eq!(
            parse_line("echo hello world > out.txt").expect("parse"),
            Command::Echo {
                text: "hello world".to_string(),
                redirect: Some(Redirect {
                    path: "out.txt".to_string(),
                    append: false,
                }),
            }
        );
        assert_eq!(
            parse_line("echo more >> log").expect("parse"),
            Command::Echo {
                text: "more".to_string(),
                redirect: Some(Redirect {
                    path: "log".to_string(),
                    append: true,
                }),
            }
        );
        assert_eq!(
            parse_line("echo plain").expect("parse"),
            Command::Echo {
                text: "plain".to_string(),
                redirect: None,
            }
        );

        assert_eq!(
            parse_line(r#"echo ">x" '>>y'"#).expect("parse"),
            Command::Echo {
                text: ">x >>y".to_string(),
                redirect: None,
            }
        );

        let err = parse_line("echo hi >").unwrap_err();
        assert!(err.to_string().contains("no file specified"));
        assert_eq!(parse_line("echo hi > a b").unwrap_err().kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_head_line_counts() {
        assert_eq!(
            parse_line("head f").expect("parse"),
            Command::Head {
                lines: None,
                path: "f".to_string(),
            }
        );
        for line in ["head -n 3 f", "head -n3 f", "head -3 f"] {
            assert_eq!(
                parse_line(line).expect("parse"),
                Command::Head {
                    lines: Some(3),
                    path: "f".to_string(),
                },
                "{line}"
            );
        }
        for line in ["tail -n 0 f", "tail -n -2 f", "tail -n x f", "tail -n"] {
            assert_eq!(parse_line(line).unwrap_err().kind(), ErrorKind::Usage, "{line}");
        }
    }

    #[test]
    fn test_find_forms() {
        assert_eq!(
            parse_line("find -name *.txt").expect("parse"),
            Command::Find {
                start: ".".to_string(),
                name: Some("*.txt".to_string()),
                kind: None,
            }
        );
        assert_eq!(
            parse_line("find docs -type d").expect("parse"),
            Command::Find {
                start: "docs".to_string(),
                name: None,
                kind: Some(EntryKind::Directory),
            }
        );
        assert_eq!(parse_line("find -name").unwrap_err().kind(), ErrorKind::Usage);
        assert_eq!(parse_line("find -type x").unwrap_err().kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_chmod_accepts_symbolic_minus() {
        assert!(matches!(
            parse_line("chmod -x script.sh").expect("parse"),
            Command::Chmod { ref paths, .. } if paths == &["script.sh".to_string()]
        ));
        let err = parse_line("chmod 9z f").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.to_string().contains("invalid mode"));
    }

    #[test]
    fn test_copy_and_move_operands() {
        assert_eq!(
            parse_line("cp -r a b dest").expect("parse"),
            Command::Copy {
                sources: vec!["a".to_string(), "b".to_string()],
                dest: "dest".to_string(),
                recursive: true,
            }
        );
        assert_eq!(parse_line("mv only").unwrap_err().kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_argument_counts() {
        assert_eq!(parse_line("pwd extra").unwrap_err().kind(), ErrorKind::Usage);
        assert_eq!(parse_line("cd a b").unwrap_err().kind(), ErrorKind::Usage);
        assert_eq!(
            parse_line("cd").expect("parse"),
            Command::ChangeDirectory { target: None }
        );
        assert_eq!(parse_line("ps").expect("parse").verb(), Verb::Monitor);
    }
}
