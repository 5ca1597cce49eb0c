// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Macro compiler for padcast scripts
//!
//! Scripts are line oriented and case-insensitive:
//! - # comments and blank lines are ignored
//! - `for N` ... `next` repeats the enclosed lines N times (blocks may nest)
//! - a button name taps that button
//! - a bare integer waits that many milliseconds
//!
//! Loops are expanded eagerly into a flat [`Program`].

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{space0, space1},
    combinator::verify,
};
use std::time::Duration;
use tracing::warn;

use crate::error::CompileError;
use crate::types::{Action, Button, Program, SkipReason, SkippedLine};
use crate::vocabulary::CommandVocabulary;

/// Upper bound on the number of actions a script may expand to.
pub const MAX_PROGRAM_LEN: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
enum Statement<'a> {
    For(u32),
    Next,
    Delay(u64),
    Word(&'a str),
}

fn parse_for(input: &str) -> IResult<&str, Statement<'_>> {
    let (input, _) = tag("for")(input)?;
    let (input, _) = space1(input)?;
    let (input, count) = nom::character::complete::u32(input)?;
    Ok((input, Statement::For(count)))
}

fn parse_next(input: &str) -> IResult<&str, Statement<'_>> {
    let (input, _) = tag("next")(input)?;
    Ok((input, Statement::Next))
}

fn parse_delay(input: &str) -> IResult<&str, Statement<'_>> {
    let (input, ms) = nom::character::complete::u64(input)?;
    Ok((input, Statement::Delay(ms)))
}

fn parse_word(input: &str) -> IResult<&str, Statement<'_>> {
    let (input, word) = verify(take_till1(|c: char| c.is_whitespace()), |w: &str| {
        w != "for" && w != "next"
    })
    .parse(input)?;
    Ok((input, Statement::Word(word)))
}

fn parse_statement(input: &str) -> IResult<&str, Statement<'_>> {
    let (input, statement) = alt((parse_for, parse_next, parse_delay, parse_word)).parse(input)?;
    let (input, _) = space0(input)?;
    Ok((input, statement))
}

// A statement only counts if it spans the whole line
fn parse_line(line: &str) -> Option<Statement<'_>> {
    match parse_statement(line) {
        Ok(("", statement)) => Some(statement),
        _ => None,
    }
}

struct OpenLoop {
    line: usize,
    count: u32,
    body: Vec<Action>,
}

fn innermost<'a>(actions: &'a mut Vec<Action>, open: &'a mut [OpenLoop]) -> &'a mut Vec<Action> {
    match open.last_mut() {
        Some(block) => &mut block.body,
        None => actions,
    }
}

fn append(target: &mut Vec<Action>, action: Action) -> Result<(), CompileError> {
    if target.len() >= MAX_PROGRAM_LEN {
        return Err(CompileError::ProgramTooLarge {
            limit: MAX_PROGRAM_LEN,
        });
    }
    target.push(action);
    Ok(())
}

fn skip(program: &mut Program, line: usize, text: &str, reason: SkipReason) {
    let skipped = SkippedLine {
        line,
        text: text.to_string(),
        reason,
    };
    warn!(line, "{skipped}");
    program.skipped.push(skipped);
}

/// Compiles script text into a flat program for a controller's vocabulary.
///
/// Lines that are not statements, or that name buttons the controller does
/// not have, are logged and recorded in [`Program::skipped`]. An unclosed
/// `for` or a malformed loop count rejects the whole script. A `for` line
/// takes nothing after its count, not even a trailing `# comment`, so
/// `for 3 # note` is rejected while `a # note` is only skipped.
pub fn compile(source: &str, vocabulary: &CommandVocabulary) -> Result<Program, CompileError> {
    let mut program = Program::default();
    let mut open: Vec<OpenLoop> = Vec::new();

    for (line_num, raw) in source.lines().enumerate() {
        let line_num = line_num + 1;
        let line = raw.trim().to_lowercase();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(statement) = parse_line(&line) else {
            if line.split_whitespace().next() == Some("for") {
                return Err(CompileError::InvalidLoopCount {
                    line: line_num,
                    text: line.clone(),
                });
            }
            skip(&mut program, line_num, &line, SkipReason::Unrecognized);
            continue;
        };

        match statement {
            Statement::For(count) => open.push(OpenLoop {
                line: line_num,
                count,
                body: Vec::new(),
            }),
            Statement::Next => {
                let Some(block) = open.pop() else {
                    skip(&mut program, line_num, &line, SkipReason::UnmatchedNext);
                    continue;
                };

                let target = innermost(&mut program.actions, &mut open);
                let expanded = block
                    .body
                    .len()
                    .checked_mul(block.count as usize)
                    .and_then(|n| n.checked_add(target.len()));
                if !matches!(expanded, Some(n) if n <= MAX_PROGRAM_LEN) {
                    return Err(CompileError::ProgramTooLarge {
                        limit: MAX_PROGRAM_LEN,
                    });
                }

                if block.body.is_empty() {
                    continue;
                }
                for _ in 0..block.count {
                    target.extend_from_slice(&block.body);
                }
            }
            Statement::Delay(ms) => append(
                innermost(&mut program.actions, &mut open),
                Action::Delay(Duration::from_millis(ms)),
            )?,
            Statement::Word(word) => match vocabulary.button(word) {
                Some(button) => append(
                    innermost(&mut program.actions, &mut open),
                    Action::Press(button),
                )?,
                None => {
                    let reason = word
                        .parse::<Button>()
                        .map_or(SkipReason::Unrecognized, SkipReason::Unavailable);
                    skip(&mut program, line_num, &line, reason);
                }
            },
        }
    }

    if let Some(block) = open.last() {
        return Err(CompileError::UnterminatedLoop { line: block.line });
    }

    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ControllerKind;

    fn pro() -> CommandVocabulary {
        CommandVocabulary::for_controller(ControllerKind::ProController)
    }

    fn presses(program: &Program) -> Vec<Button> {
        program
            .actions
            .iter()
            .filter_map(|a| match a {
                Action::Press(b) => Some(*b),
                Action::Delay(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_for() {
        let (rest, stmt) = parse_for("for 3").unwrap();
        assert_eq!(rest, "");
        assert_eq!(stmt, Statement::For(3));
    }

    #[test]
    fn test_parse_line_requires_whole_line() {
        assert_eq!(parse_line("next"), Some(Statement::Next));
        assert_eq!(parse_line("250"), Some(Statement::Delay(250)));
        assert_eq!(parse_line("a"), Some(Statement::Word("a")));
        assert_eq!(parse_line("a 100"), None);
        assert_eq!(parse_line("100ms"), None);
        assert_eq!(parse_line("for"), None);
    }

    #[test]
    fn test_compile_simple_sequence() {
        let program = compile("a\n500\nB\n", &pro()).unwrap();
        assert_eq!(
            program.actions,
            vec![
                Action::Press(Button::A),
                Action::Delay(Duration::from_millis(500)),
                Action::Press(Button::B),
            ]
        );
        assert!(program.skipped.is_empty());
    }

    #[test]
    fn test_compile_ignores_comments_and_blanks() {
        let script = "# warm up\n\n   # indented comment\n  home  \n\r\n";
        let program = compile(script, &pro()).unwrap();
        assert_eq!(program.actions, vec![Action::Press(Button::Home)]);
    }

    #[test]
    fn test_compile_loop_repeats_in_order() {
        let program = compile("for 3\na\nb\nnext", &pro()).unwrap();
        use Button::{A, B};
        assert_eq!(presses(&program), vec![A, B, A, B, A, B]);
    }

    #[test]
    fn test_compile_nested_loops() {
        let program = compile("for 2\n for 2\n a\n next\nnext", &pro()).unwrap();
        assert_eq!(presses(&program), vec![Button::A; 4]);
    }

    #[test]
    fn test_compile_counts_loop_body_once_per_iteration() {
        let script = "x\nfor 2\ny\nfor 3\na\nnext\nb\nnext\nplus";
        let program = compile(script, &pro()).unwrap();
        use Button::*;
        assert_eq!(
            presses(&program),
            vec![X, Y, A, A, A, B, Y, A, A, A, B, Plus]
        );
    }

    #[test]
    fn test_compile_zero_iterations() {
        let program = compile("for 0\na\nnext\nb", &pro()).unwrap();
        assert_eq!(presses(&program), vec![Button::B]);
    }

    #[test]
    fn test_compile_skips_unknown_button() {
        let program = compile("foo\na", &pro()).unwrap();
        assert_eq!(program.actions, vec![Action::Press(Button::A)]);
        assert_eq!(program.skipped.len(), 1);
        assert_eq!(program.skipped[0].line, 1);
        assert_eq!(program.skipped[0].reason, SkipReason::Unrecognized);
    }

    #[test]
    fn test_compile_skips_button_missing_on_controller() {
        let vocab = CommandVocabulary::for_controller(ControllerKind::JoyconL);
        let program = compile("a\nzl", &vocab).unwrap();
        assert_eq!(program.actions, vec![Action::Press(Button::Zl)]);
        assert_eq!(
            program.skipped[0].reason,
            SkipReason::Unavailable(Button::A)
        );
    }

    #[test]
    fn test_compile_skips_unmatched_next() {
        let program = compile("a\nnext\nb", &pro()).unwrap();
        assert_eq!(presses(&program), vec![Button::A, Button::B]);
        assert_eq!(program.skipped[0].reason, SkipReason::UnmatchedNext);
    }

    #[test]
    fn test_compile_unterminated_loop_fails() {
        let result = compile("a\nfor 1\nb", &pro());
        assert_eq!(result, Err(CompileError::UnterminatedLoop { line: 2 }));
    }

    #[test]
    fn test_compile_invalid_loop_count_fails() {
        assert!(matches!(
            compile("for x\na\nnext", &pro()),
            Err(CompileError::InvalidLoopCount { line: 1, .. })
        ));
        assert!(matches!(
            compile("for\na\nnext", &pro()),
            Err(CompileError::InvalidLoopCount { .. })
        ));
    }

    #[test]
    fn test_compile_rejects_runaway_expansion() {
        let script = "for 100000\nfor 100000\na\nnext\nnext";
        assert_eq!(
            compile(script, &pro()),
            Err(CompileError::ProgramTooLarge {
                limit: MAX_PROGRAM_LEN
            })
        );
    }

    #[test]
    fn test_compile_empty_loop_with_huge_count_is_fast() {
        let script = "for 4000000000\nnext\nfor 4000000000\nfoo\nnext\n\
                      for 4000000000\nfor 4000000000\nnext\nnext\na";
        let program = compile(script, &pro()).unwrap();
        assert_eq!(program.actions, vec![Action::Press(Button::A)]);
        assert_eq!(program.skipped.len(), 1);
    }

    #[test]
    fn test_compile_for_with_trailing_comment_fails() {
        assert!(matches!(
            compile("for 3 # note\na\nnext", &pro()),
            Err(CompileError::InvalidLoopCount { line: 1, .. })
        ));
    }

    #[test]
    fn test_compile_is_case_insensitive() {
        let program = compile("FOR 2\nZR\nNEXT", &pro()).unwrap();
        assert_eq!(presses(&program), vec![Button::Zr, Button::Zr]);
    }
}
