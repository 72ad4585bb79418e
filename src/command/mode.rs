//! Simplified permission bits for `chmod`, `ls -l` and `stat`.
//!
//! Only the classic twelve bits are modelled (setuid/setgid/sticky plus
//! `rwx` for user, group and other); there is no ACL support.

use std::fmt;
use std::fs::Metadata;
use std::os::unix::fs::PermissionsExt;
use std::str::FromStr;

/// Permission bits, masked to `0o7777`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(u32);

impl Mode {
    pub const MASK: u32 = 0o7777;

    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits & Self::MASK)
    }

    #[must_use]
    pub fn of(metadata: &Metadata) -> Self {
        Self::from_bits(metadata.permissions().mode())
    }

    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// `rwxr-xr-x` form of the nine permission bits.
    #[must_use]
    pub fn rwx(self) -> String {
        const FLAGS: [(u32, char); 9] = [
            (0o400, 'r'),
            (0o200, 'w'),
            (0o100, 'x'),
            (0o040, 'r'),
            (0o020, 'w'),
            (0o010, 'x'),
            (0o004, 'r'),
            (0o002, 'w'),
            (0o001, 'x'),
        ];
        FLAGS
            .iter()
            .map(|&(bit, c)| if self.0 & bit == 0 { '-' } else { c })
            .collect()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

/// `ls -l` style type-and-permission string, e.g. `drwxr-xr-x`.
#[must_use]
pub fn describe(metadata: &Metadata) -> String {
    let file_type = metadata.file_type();
    let kind = if file_type.is_dir() {
        'd'
    } else if file_type.is_symlink() {
        'l'
    } else {
        '-'
    };
    format!("{kind}{}", Mode::of(metadata).rwx())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Remove,
    Set,
}

/// One `who op perms` clause of a symbolic mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clause {
    who: u32,
    op: Op,
    perms: u32,
}

/// A parsed `chmod` mode argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeSpec {
    /// Octal, e.g. `755` or `0644`.
    Absolute(Mode),
    /// Symbolic, e.g. `u+x` or `go-w,a+r`.
    Symbolic(Vec<Clause>),
}

impl ModeSpec {
    /// Computes the mode that results from applying this mode argument to `current`.
    #[must_use]
    pub fn apply(&self, current: Mode) -> Mode {
        match self {
            Self::Absolute(mode) => *mode,
            Self::Symbolic(clauses) => {
                let bits = clauses.iter().fold(current.bits(), |bits, clause| {
                    let mask = spread(clause.who, clause.perms);
                    match clause.op {
                        Op::Add => bits | mask,
                        Op::Remove => bits & !mask,
                        Op::Set => (bits & !spread(clause.who, 0o7)) | mask,
                    }
                });
                Mode::from_bits(bits)
            }
        }
    }
}

/// Places a three-bit `rwx` pattern in each selected class.
fn spread(who: u32, perms: u32) -> u32 {
    let mut bits = 0;
    if who & 0o4 != 0 {
        bits |= perms << 6;
    }
    if who & 0o2 != 0 {
        bits |= perms << 3;
    }
    if who & 0o1 != 0 {
        bits |= perms;
    }
    bits
}

impl FromStr for ModeSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid mode: '{s}'");

        if !s.is_empty() && s.len() <= 4 && s.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            let bits = u32::from_str_radix(s, 8).map_err(|_| invalid())?;
            return Ok(Self::Absolute(Mode::from_bits(bits)));
        }

        let mut clauses = Vec::new();
        for part in s.split(',') {
            let op_at = part.find(['+', '-', '=']).ok_or_else(invalid)?;
            let (who_part, rest) = part.split_at(op_at);

            let mut who = 0;
            for c in who_part.chars() {
                who |= match c {
                    'u' => 0o4,
                    'g' => 0o2,
                    'o' => 0o1,
                    'a' => 0o7,
                    _ => return Err(invalid()),
                };
            }
            if who == 0 {
                who = 0o7;
            }

            let mut chars = rest.chars();
            let op = match chars.next() {
                Some('+') => Op::Add,
                Some('-') => Op::Remove,
                Some('=') => Op::Set,
                _ => return Err(invalid()),
            };

            let mut perms = 0;
            for c in chars {
                perms |= match c {
                    'r' => 0o4,
                    'w' => 0o2,
                    'x' => 0o1,
                    _ => return Err(invalid()),
                };
            }
            if perms == 0 && op != Op::Set {
                return Err(invalid());
            }

            clauses.push(Clause { who, op, perms });
        }

        Ok(Self::Symbolic(clauses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> ModeSpec {
        s.parse().unwrap_or_else(|e| panic!("{s} should parse: {e}"))
    }

    #[test]
    fn test_octal_modes() {
        assert_eq!(parse("755").apply(Mode::from_bits(0)), Mode::from_bits(0o755));
        assert_eq!(parse("0644").apply(Mode::from_bits(0o777)), Mode::from_bits(0o644));
        assert_eq!(parse("4755").apply(Mode::from_bits(0)).bits(), 0o4755);
    }

    #[test]
    fn test_symbolic_modes() {
        let base = Mode::from_bits(0o644);
        assert_eq!(parse("u+x").apply(base).bits(), 0o744);
        assert_eq!(parse("go-r").apply(base).bits(), 0o600);
        assert_eq!(parse("+x").apply(base).bits(), 0o755);
        assert_eq!(parse("a=r").apply(base).bits(), 0o444);
        assert_eq!(parse("u=rwx,g=,o-r").apply(base).bits(), 0o700);
    }

    #[test]
    fn test_invalid_modes() {
        for bad in ["", "8", "77777", "z+x", "u", "u+q", "u+", "rwx"] {
            let err = bad.parse::<ModeSpec>().unwrap_err();
            assert!(err.contains("invalid mode"), "{bad}: {err}");
        }
    }

    #[test]
    fn test_rwx_and_display() {
        let mode = Mode::from_bits(0o754);
        assert_eq!(mode.rwx(), "rwxr-xr--");
        assert_eq!(mode.to_string(), "0754");
        assert_eq!(Mode::from_bits(0o100_644).bits(), 0o644);
    }
}
