//! Textual command parser: whitespace-separated tokens into a typed `Query`.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCommand {
    Get,
    Set,
    Del,
}

impl QueryCommand {
    fn arity(self) -> usize {
        match self {
            QueryCommand::Get => 1,
            QueryCommand::Set => 2,
            QueryCommand::Del => 1,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            QueryCommand::Get => "GET",
            QueryCommand::Set => "SET",
            QueryCommand::Del => "DEL",
        }
    }

    fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "GET" => Some(QueryCommand::Get),
            "SET" => Some(QueryCommand::Set),
            "DEL" => Some(QueryCommand::Del),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub command: QueryCommand,
    pub args: Vec<String>,
}

/// Every message is pinned verbatim by end-to-end tests; don't reword them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryParseError {
    #[error("invalid query length (0)")]
    EmptyInput,

    #[error("invalid command {0}")]
    UnknownCommand(String),

    #[error("for command {command} expected {expected} argument(s), got {got}")]
    WrongArity {
        command: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Splits `input` on whitespace; the first token is the command
/// (case-sensitive), the rest are arguments in order.
pub fn parse(input: &str) -> Result<Query, QueryParseError> {
    let mut tokens = input.split_whitespace();
    let Some(cmd_tok) = tokens.next() else {
        return Err(QueryParseError::EmptyInput);
    };
    let command = QueryCommand::from_token(cmd_tok)
        .ok_or_else(|| QueryParseError::UnknownCommand(cmd_tok.to_string()))?;
    let args: Vec<String> = tokens.map(str::to_string).collect();
    let expected = command.arity();
    if args.len() != expected {
        return Err(QueryParseError::WrongArity {
            command: command.as_str(),
            expected,
            got: args.len(),
        });
    }
    Ok(Query { command, args })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(parse(""), Err(QueryParseError::EmptyInput));
        assert_eq!(parse("   "), Err(QueryParseError::EmptyInput));
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert_eq!(
            parse("get k"),
            Err(QueryParseError::UnknownCommand("get".to_string()))
        );
        assert_eq!(
            parse("FOO k"),
            Err(QueryParseError::UnknownCommand("FOO".to_string()))
        );
    }

    #[test]
    fn get_requires_exactly_one_arg() {
        assert_eq!(
            parse("GET"),
            Err(QueryParseError::WrongArity {
                command: "GET",
                expected: 1,
                got: 0
            })
        );
        assert_eq!(
            parse("GET a b"),
            Err(QueryParseError::WrongArity {
                command: "GET",
                expected: 1,
                got: 2
            })
        );
    }

    #[test]
    fn set_requires_exactly_two_args() {
        assert_eq!(
            parse("SET k"),
            Err(QueryParseError::WrongArity {
                command: "SET",
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn valid_queries_parse() {
        assert_eq!(
            parse("GET k"),
            Ok(Query {
                command: QueryCommand::Get,
                args: vec!["k".to_string()]
            })
        );
        assert_eq!(
            parse("SET k v"),
            Ok(Query {
                command: QueryCommand::Set,
                args: vec!["k".to_string(), "v".to_string()]
            })
        );
        assert_eq!(
            parse("DEL k"),
            Ok(Query {
                command: QueryCommand::Del,
                args: vec!["k".to_string()]
            })
        );
    }

    #[test]
    fn error_messages_match_pinned_strings() {
        assert_eq!(
            QueryParseError::EmptyInput.to_string(),
            "invalid query length (0)"
        );
        assert_eq!(
            QueryParseError::UnknownCommand("xyz".to_string()).to_string(),
            "invalid command xyz"
        );
        assert_eq!(
            QueryParseError::WrongArity {
                command: "SET",
                expected: 2,
                got: 1
            }
            .to_string(),
            "for command SET expected 2 argument(s), got 1"
        );
    }
}
