use std::fmt;

/// Terminates every command line sent to the board
pub const LINE_END: &'static [u8] = b"\n";
/// Substring the board puts in the line that acknowledges a batch
pub const ACK_SENTINEL: &'static str = "DONE";
/// Dump the status of every motor
pub const DUMP_ALL: &'static str = "ALL";

/// Commands understood by the stepper board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `A idx val`: set acceleration of a motor
    Accel,
    /// `T idx val`: set fast speed of a motor
    FastSpeed,
    /// `L idx val`: set slow speed of a motor
    SlowSpeed,
    /// `P idx deg`: set target position of a motor
    Position,
    /// `D idx`: dump the status of a motor
    Dump,
    /// `ALL`: dump all statuses
    DumpAll,
}

impl CommandKind {
    /// Resolve a token, ignoring case.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "A" => Some(CommandKind::Accel),
            "T" => Some(CommandKind::FastSpeed),
            "L" => Some(CommandKind::SlowSpeed),
            "P" => Some(CommandKind::Position),
            "D" => Some(CommandKind::Dump),
            DUMP_ALL => Some(CommandKind::DumpAll),
            _ => None,
        }
    }

    /// The uppercase token sent on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            CommandKind::Accel => "A",
            CommandKind::FastSpeed => "T",
            CommandKind::SlowSpeed => "L",
            CommandKind::Position => "P",
            CommandKind::Dump => "D",
            CommandKind::DumpAll => DUMP_ALL,
        }
    }

    /// Number of argument tokens that must follow the command token.
    pub const fn arity(self) -> usize {
        match self {
            CommandKind::DumpAll => 0,
            CommandKind::Dump => 1,
            CommandKind::Accel
            | CommandKind::FastSpeed
            | CommandKind::SlowSpeed
            | CommandKind::Position => 2,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single command line, e.g. `P 2 0`.
///
/// Arguments are passed through verbatim; the board does its own validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCommand {
    pub kind: CommandKind,
    pub args: Vec<String>,
}

impl SubCommand {
    pub fn new(kind: CommandKind, args: Vec<String>) -> Self {
        Self { kind, args }
    }

    /// Bytes written to the port: the command text followed by a newline.
    pub fn to_line(&self) -> Vec<u8> {
        let mut line = self.to_string().into_bytes();
        line.extend_from_slice(LINE_END);
        line
    }
}

impl fmt::Display for SubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Something the tokenizer reported while reading a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseIssue {
    /// Token is not a command; it was dropped and parsing went on.
    UnknownToken { position: usize, token: String },
    /// Command is missing arguments; nothing after it in the batch was parsed.
    Malformed { position: usize, kind: CommandKind },
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseIssue::UnknownToken { token, .. } => write!(f, "Skipping unknown token: {}", token),
            ParseIssue::Malformed { kind, .. } => write!(f, "Malformed {} command", kind),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub commands: Vec<SubCommand>,
    pub issues: Vec<ParseIssue>,
}

impl ParsedBatch {
    /// Whether parsing stopped early on a command with missing arguments.
    pub fn aborted(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue, ParseIssue::Malformed { .. }))
    }
}

/// Split a batch string such as `"P 2 0 P 1 0 P 0 0"` into sub-commands.
///
/// Each command token is grouped greedily with the number of arguments its
/// kind requires. Unknown tokens are skipped. A command without enough
/// arguments ends parsing of the batch; commands before it are kept.
pub fn parse_batch(batch: &str) -> ParsedBatch {
    let tokens: Vec<&str> = batch.split_whitespace().collect();
    let mut parsed = ParsedBatch::default();
    let mut i = 0;

    while i < tokens.len() {
        let Some(kind) = CommandKind::from_token(tokens[i]) else {
            parsed.issues.push(ParseIssue::UnknownToken {
                position: i,
                token: tokens[i].to_string(),
            });
            i += 1;
            continue;
        };

        let arity = kind.arity();
        if i + arity >= tokens.len() {
            parsed.issues.push(ParseIssue::Malformed { position: i, kind });
            break;
        }

        let args = tokens[i + 1..=i + arity]
            .iter()
            .map(|arg| arg.to_string())
            .collect();
        parsed.commands.push(SubCommand::new(kind, args));
        i += arity + 1;
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(batch: &str) -> Vec<String> {
        parse_batch(batch)
            .commands
            .iter()
            .map(|cmd| cmd.to_string())
            .collect()
    }

    #[test]
    fn concatenated_position_commands() {
        assert_eq!(texts("P 2 0 P 1 0 P 0 0"), vec!["P 2 0", "P 1 0", "P 0 0"]);
    }

    #[test]
    fn mixed_well_formed_batch_groups_greedily() {
        let parsed = parse_batch("A 2 1000 ALL D 1 T 0 2000 L 1 200 P 2 -15000");
        assert!(parsed.issues.is_empty());
        assert_eq!(
            parsed.commands.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
            vec!["A 2 1000", "ALL", "D 1", "T 0 2000", "L 1 200", "P 2 -15000"]
        );
    }

    #[test]
    fn all_consumes_a_single_token() {
        let parsed = parse_batch("ALL 5");
        assert_eq!(parsed.commands, vec![SubCommand::new(CommandKind::DumpAll, vec![])]);
        assert_eq!(
            parsed.issues,
            vec![ParseIssue::UnknownToken { position: 1, token: "5".to_string() }]
        );
    }

    #[test]
    fn dump_takes_one_argument() {
        assert_eq!(texts("D 3"), vec!["D 3"]);
    }

    #[test]
    fn lone_dump_is_malformed() {
        let parsed = parse_batch("D");
        assert!(parsed.commands.is_empty());
        assert!(parsed.aborted());
        assert_eq!(
            parsed.issues,
            vec![ParseIssue::Malformed { position: 0, kind: CommandKind::Dump }]
        );
    }

    #[test]
    fn missing_value_aborts_the_rest_of_the_batch() {
        let parsed = parse_batch("P 1 5 P 2");
        assert_eq!(texts("P 1 5 P 2"), vec!["P 1 5"]);
        assert_eq!(
            parsed.issues,
            vec![ParseIssue::Malformed { position: 3, kind: CommandKind::Position }]
        );
    }

    #[test]
    fn command_token_can_be_an_argument() {
        assert_eq!(texts("P 2 ALL"), vec!["P 2 ALL"]);
    }

    #[test]
    fn fast_speed_without_value_is_malformed() {
        let parsed = parse_batch("T 1");
        assert!(parsed.commands.is_empty());
        assert!(parsed.aborted());
    }

    #[test]
    fn unknown_token_is_skipped() {
        let parsed = parse_batch("XYZ P 1 5");
        assert_eq!(texts("XYZ P 1 5"), vec!["P 1 5"]);
        assert_eq!(
            parsed.issues,
            vec![ParseIssue::UnknownToken { position: 0, token: "XYZ".to_string() }]
        );
        assert!(!parsed.aborted());
    }

    #[test]
    fn command_tokens_are_case_insensitive() {
        assert_eq!(texts("p 2 0 all d 1"), vec!["P 2 0", "ALL", "D 1"]);
    }

    #[test]
    fn arguments_are_kept_verbatim() {
        let parsed = parse_batch("a x1 +0.5");
        assert_eq!(
            parsed.commands,
            vec![SubCommand::new(
                CommandKind::Accel,
                vec!["x1".to_string(), "+0.5".to_string()]
            )]
        );
    }

    #[test]
    fn whitespace_runs_and_empty_input() {
        assert_eq!(texts("  P\t2   0\n"), vec!["P 2 0"]);
        assert_eq!(parse_batch("   "), ParsedBatch::default());
    }

    #[test]
    fn parsing_is_repeatable() {
        let batch = "XYZ A 2 1000 D 1 P 0";
        assert_eq!(parse_batch(batch), parse_batch(batch));
    }

    #[test]
    fn issues_render_as_operator_notices() {
        let parsed = parse_batch("FOO L 1");
        let notices: Vec<String> = parsed.issues.iter().map(|i| i.to_string()).collect();
        assert_eq!(notices, vec!["Skipping unknown token: FOO", "Malformed L command"]);
    }

    #[test]
    fn wire_line_is_newline_terminated() {
        let cmd = SubCommand::new(CommandKind::Position, vec!["2".into(), "-15000".into()]);
        assert_eq!(cmd.to_line(), b"P 2 -15000\n".to_vec());
        assert_eq!(SubCommand::new(CommandKind::DumpAll, vec![]).to_line(), b"ALL\n".to_vec());
    }
}
