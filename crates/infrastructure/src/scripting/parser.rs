//! Parser for the request scripting DSL.
//!
//! The DSL is line-oriented; each non-empty, non-comment line is one
//! statement:
//!
//! - `bru.setVar("name", "value")` / `bru.deleteVar("name")`
//! - `bru.setEnvVar("name", "value")`
//! - `bru.setNextRequest("name")`
//! - `bru.sleep(ms)`
//! - `req.setHeader("name", "value")`, `req.setUrl(...)`,
//!   `req.setMethod(...)`, `req.setBody(...)`, `req.setTimeout(ms)`,
//!   `req.disableParsingResponseJson()`
//! - `res.setBody("text")`
//! - `log("message")`
//! - `test("description", lhs, op, rhs)` / `assert(lhs, op, rhs)`
//!
//! Quoted arguments are literals; bare arguments starting with `res.`
//! are response accessors (`res.status`, `res.body`, `res.responseTime`,
//! `res.headers.<name>`, `res.body.<path>`). Bare `env.<name>`,
//! `collection.<name>`, `folder.<name>`, `request.<name>`, and
//! `process.<name>` read one scope layer directly, and `bru.envName` is
//! the selected environment's name.

use thiserror::Error;

use quiver_domain::{ComparisonOperator, LayerKind, Operand, ScriptCommand};

/// Error type for script parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown command.
    #[error("Unknown command at line {line}: {name}")]
    UnknownCommand {
        /// The command name.
        name: String,
        /// The source line.
        line: usize,
    },
    /// Invalid syntax.
    #[error("Invalid syntax at line {line}: {message}")]
    InvalidSyntax {
        /// The source line.
        line: usize,
        /// The error message.
        message: String,
    },
    /// Wrong argument count or type.
    #[error("Invalid arguments for {command} at line {line}: {message}")]
    InvalidArgument {
        /// The command name.
        command: String,
        /// The source line.
        line: usize,
        /// The error message.
        message: String,
    },
}

impl ParseError {
    /// Returns the source line the error points at.
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::UnknownCommand { line, .. }
            | Self::InvalidSyntax { line, .. }
            | Self::InvalidArgument { line, .. } => *line,
        }
    }
}

/// One argument with its quoting, so operands can distinguish literals
/// from accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Arg {
    value: String,
    quoted: bool,
}

/// Parses a script into statements paired with their source lines.
///
/// # Errors
///
/// Returns the first syntax error encountered.
pub fn parse_script(source: &str) -> Result<Vec<(usize, ScriptCommand)>, ParseError> {
    let mut statements = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
            continue;
        }
        let line_num = index + 1;
        statements.push((line_num, parse_line(line, line_num)?));
    }

    Ok(statements)
}

fn parse_line(line: &str, line_num: usize) -> Result<ScriptCommand, ParseError> {
    let Some(paren_pos) = line.find('(') else {
        return Err(ParseError::InvalidSyntax {
            line: line_num,
            message: "Expected '(' after command name".to_string(),
        });
    };

    let command_name = line[..paren_pos].trim();
    let args_str = line[paren_pos..].trim();

    if !args_str.ends_with(')') {
        return Err(ParseError::InvalidSyntax {
            line: line_num,
            message: "Missing closing ')'".to_string(),
        });
    }

    let args = parse_arguments(&args_str[1..args_str.len() - 1]);

    let two_strings = |command: &str| -> Result<(String, String), ParseError> {
        if args.len() == 2 {
            Ok((args[0].value.clone(), args[1].value.clone()))
        } else {
            Err(ParseError::InvalidArgument {
                command: command.to_string(),
                line: line_num,
                message: "expected 2 arguments (name, value)".to_string(),
            })
        }
    };
    let one_string = |command: &str| -> Result<String, ParseError> {
        if args.len() == 1 {
            Ok(args[0].value.clone())
        } else {
            Err(ParseError::InvalidArgument {
                command: command.to_string(),
                line: line_num,
                message: "expected 1 argument".to_string(),
            })
        }
    };
    let one_number = |command: &str| -> Result<u64, ParseError> {
        let raw = one_string(command)?;
        raw.parse().map_err(|_| ParseError::InvalidArgument {
            command: command.to_string(),
            line: line_num,
            message: format!("'{raw}' is not a valid number"),
        })
    };

    match command_name {
        "bru.setVar" => {
            let (name, value) = two_strings(command_name)?;
            Ok(ScriptCommand::SetVar { name, value })
        }
        "bru.deleteVar" => Ok(ScriptCommand::DeleteVar {
            name: one_string(command_name)?,
        }),
        "bru.setEnvVar" => {
            let (name, value) = two_strings(command_name)?;
            Ok(ScriptCommand::SetEnvVar { name, value })
        }
        "bru.setNextRequest" => Ok(ScriptCommand::SetNextRequest {
            name: one_string(command_name)?,
        }),
        "bru.sleep" => Ok(ScriptCommand::Sleep {
            millis: one_number(command_name)?,
        }),
        "req.setHeader" => {
            let (name, value) = two_strings(command_name)?;
            Ok(ScriptCommand::SetHeader { name, value })
        }
        "req.setUrl" => Ok(ScriptCommand::SetUrl {
            url: one_string(command_name)?,
        }),
        "req.setMethod" => Ok(ScriptCommand::SetMethod {
            method: one_string(command_name)?,
        }),
        "req.setBody" => Ok(ScriptCommand::SetRequestBody {
            body: one_string(command_name)?,
        }),
        "req.setTimeout" => Ok(ScriptCommand::SetTimeout {
            millis: one_number(command_name)?,
        }),
        "req.disableParsingResponseJson" => {
            if args.is_empty() {
                Ok(ScriptCommand::DisableParsingResponseJson)
            } else {
                Err(ParseError::InvalidArgument {
                    command: command_name.to_string(),
                    line: line_num,
                    message: "expected no arguments".to_string(),
                })
            }
        }
        "res.setBody" => Ok(ScriptCommand::SetResponseBody {
            body: one_string(command_name)?,
        }),
        "log" | "console.log" => {
            if args.is_empty() {
                return Err(ParseError::InvalidArgument {
                    command: command_name.to_string(),
                    line: line_num,
                    message: "expected 1 argument (message)".to_string(),
                });
            }
            Ok(ScriptCommand::Log {
                message: args
                    .iter()
                    .map(|a| a.value.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
        "test" => {
            if args.len() != 4 {
                return Err(ParseError::InvalidArgument {
                    command: command_name.to_string(),
                    line: line_num,
                    message: "expected 4 arguments (description, lhs, op, rhs)".to_string(),
                });
            }
            Ok(ScriptCommand::Test {
                description: args[0].value.clone(),
                lhs: parse_operand(&args[1]),
                op: parse_operator(&args[2], command_name, line_num)?,
                rhs: parse_operand(&args[3]),
            })
        }
        "assert" => {
            if args.len() != 3 {
                return Err(ParseError::InvalidArgument {
                    command: command_name.to_string(),
                    line: line_num,
                    message: "expected 3 arguments (lhs, op, rhs)".to_string(),
                });
            }
            Ok(ScriptCommand::Assert {
                lhs: parse_operand(&args[0]),
                op: parse_operator(&args[1], command_name, line_num)?,
                rhs: parse_operand(&args[2]),
            })
        }
        _ => Err(ParseError::UnknownCommand {
            name: command_name.to_string(),
            line: line_num,
        }),
    }
}

/// Bare arguments starting with `res.` are response accessors and bare
/// layer roots are scope reads; anything quoted (and bare numbers) is a
/// literal.
fn parse_operand(arg: &Arg) -> Operand {
    if arg.quoted {
        return Operand::literal(&arg.value);
    }
    match arg.value.as_str() {
        "res.status" => Operand::ResStatus,
        "res.body" => Operand::ResBody,
        "res.responseTime" => Operand::ResResponseTime,
        "bru.envName" => Operand::EnvName,
        value => {
            if let Some(name) = value.strip_prefix("res.headers.") {
                Operand::ResHeader {
                    name: name.to_string(),
                }
            } else if let Some(path) = value.strip_prefix("res.body.") {
                Operand::ResBodyPath {
                    path: path.to_string(),
                }
            } else if let Some((layer, name)) = parse_layer_read(value) {
                Operand::LayerVar {
                    layer,
                    name: name.to_string(),
                }
            } else {
                Operand::literal(value)
            }
        }
    }
}

/// Splits a bare `"<root>.<name>"` accessor into its scope layer and
/// variable name.
fn parse_layer_read(value: &str) -> Option<(LayerKind, &str)> {
    let (root, name) = value.split_once('.')?;
    let kind = match root {
        "env" => LayerKind::Environment,
        "collection" => LayerKind::Collection,
        "folder" => LayerKind::Folder,
        "request" => LayerKind::Request,
        "process" => LayerKind::ProcessEnv,
        _ => return None,
    };
    (!name.is_empty()).then_some((kind, name))
}

fn parse_operator(arg: &Arg, command: &str, line: usize) -> Result<ComparisonOperator, ParseError> {
    ComparisonOperator::from_symbol(&arg.value).ok_or_else(|| ParseError::InvalidArgument {
        command: command.to_string(),
        line,
        message: format!("unknown operator '{}'", arg.value),
    })
}

fn parse_arguments(args_str: &str) -> Vec<Arg> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_string = false;
    let mut string_char = '"';
    let mut escape_next = false;

    for ch in args_str.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' => escape_next = true,
            '"' | '\'' => {
                if !in_string {
                    in_string = true;
                    quoted = true;
                    string_char = ch;
                } else if ch == string_char {
                    in_string = false;
                } else {
                    current.push(ch);
                }
            }
            ',' if !in_string => {
                push_arg(&mut args, &mut current, &mut quoted);
            }
            _ => current.push(ch),
        }
    }
    push_arg(&mut args, &mut current, &mut quoted);

    args
}

fn push_arg(args: &mut Vec<Arg>, current: &mut String, quoted: &mut bool) {
    let value = current.trim().to_string();
    if !value.is_empty() || *quoted {
        args.push(Arg {
            value,
            quoted: *quoted,
        });
    }
    current.clear();
    *quoted = false;
}
