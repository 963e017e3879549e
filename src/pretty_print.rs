use ariadne::{Label, Report, ReportKind, Source};

use crate::environment::EnvError;
use crate::evaluator::EvalError;
use crate::interpreter::InterpretError;
use crate::parser::ParseError;

const SOURCE_ID: &str = "input";

impl EvalError {
    pub fn pretty_print(&self, input: &str) {
        let report = match self {
            EvalError::Env(EnvError::UndefinedVariable(name, span)) => {
                Report::build(ReportKind::Error, (SOURCE_ID, span.to_range()))
                    .with_message(format!("Undefined variable '{}'", name))
                    .with_label(
                        Label::new((SOURCE_ID, span.to_range()))
                            .with_message("this name has no binding in the current environment"),
                    )
            }
            EvalError::UnknownStatement(name, span) => {
                Report::build(ReportKind::Error, (SOURCE_ID, span.to_range()))
                    .with_message(format!("Unknown statement '{}'", name))
                    .with_label(
                        Label::new((SOURCE_ID, span.to_range()))
                            .with_message("no handler registered for this statement"),
                    )
            }
            EvalError::ArgumentCount(message, span) => {
                Report::build(ReportKind::Error, (SOURCE_ID, span.to_range()))
                    .with_message("Wrong number of arguments")
                    .with_label(Label::new((SOURCE_ID, span.to_range())).with_message(message))
            }
            EvalError::Type(message, span) => {
                Report::build(ReportKind::Error, (SOURCE_ID, span.to_range()))
                    .with_message("Type error")
                    .with_label(Label::new((SOURCE_ID, span.to_range())).with_message(message))
            }
            EvalError::BooleanConversion(span) => {
                Report::build(ReportKind::Error, (SOURCE_ID, span.to_range()))
                    .with_message("Can't convert a string to a boolean")
                    .with_label(
                        Label::new((SOURCE_ID, span.to_range()))
                            .with_message("a truth value is required here"),
                    )
            }
        };
        report.finish().print((SOURCE_ID, Source::from(input))).ok();
    }
}

impl ParseError {
    pub fn pretty_print(&self, input: &str) {
        let report = match self {
            ParseError::UnexpectedToken { found, expected } => {
                Report::build(ReportKind::Error, (SOURCE_ID, found.span.to_range()))
                    .with_message(format!("Unexpected token '{}'", found.kind))
                    .with_label(
                        Label::new((SOURCE_ID, found.span.to_range()))
                            .with_message(format!("expected {}", expected)),
                    )
            }
            ParseError::UnexpectedEof(expected) => {
                let end = input.len();
                let range = end.saturating_sub(1)..end;
                Report::build(ReportKind::Error, (SOURCE_ID, range.clone()))
                    .with_message("Unexpected end of input")
                    .with_label(
                        Label::new((SOURCE_ID, range)).with_message(format!("expected {}", expected)),
                    )
            }
            ParseError::Lexer(lexer_error) => {
                Report::build(ReportKind::Error, (SOURCE_ID, lexer_error.span.to_range()))
                    .with_message("Lexer error")
                    .with_label(
                        Label::new((SOURCE_ID, lexer_error.span.to_range()))
                            .with_message(lexer_error.error.to_string()),
                    )
            }
        };
        report.finish().print((SOURCE_ID, Source::from(input))).ok();
    }
}

impl InterpretError {
    pub fn pretty_print(&self, input: &str) {
        match self {
            InterpretError::Parse(error) => error.pretty_print(input),
            InterpretError::Eval(error) => error.pretty_print(input),
        }
    }
}
