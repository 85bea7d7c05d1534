//! Template parser.
//!
//! Text is scanned for `{{ ... }}` delimiters by hand; the body of every
//! action is parsed with nom. Block structure (`if`/`range`/`with` ...
//! `end`) is assembled afterwards from the flat list of actions, which is
//! also where function names and variable scopes are checked.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{cut, map, opt, recognize},
    error::{context, ContextError, ErrorKind, ParseError as _, VerboseError, VerboseErrorKind},
    multi::{many0, many1, separated_list1},
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use serde_json::Value as Json;

use super::ast::{Command, Node, Operand, Pipeline, Tree};
use super::funcs::FuncMap;
use super::ParseError;

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const LEFT_COMMENT: &str = "/*";
const RIGHT_COMMENT: &str = "*/";
const ROOT_VARIABLE: &str = "$";

/// Parse `source` into a tree. Only functions present in `funcs` may be
/// called.
pub fn parse(source: &str, funcs: &FuncMap) -> Result<Tree, ParseError> {
    let items = scan(source)?;
    let mut builder = Builder {
        funcs,
        vars: vec![ROOT_VARIABLE.to_string()],
        items: items.into_iter(),
    };

    let (nodes, terminator) = builder.list()?;
    match terminator {
        Terminator::Eof => Ok(Tree { nodes }),
        Terminator::End(line) => Err(ParseError::at(line, "unexpected {{end}}")),
        Terminator::Else(line) => Err(ParseError::at(line, "unexpected {{else}}")),
        Terminator::ElseIf(_, line) => Err(ParseError::at(line, "unexpected {{else if}}")),
    }
}

/// A delimited action before block assembly.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    Pipeline(Pipeline),
    If(Pipeline),
    ElseIf(Pipeline),
    Else,
    End,
    Range(Pipeline),
    With(Pipeline),
}

#[derive(Debug)]
enum Item {
    Text(String),
    Action { action: Action, line: usize },
}

// ============================================================================
// Scanning
// ============================================================================

fn scan(source: &str) -> Result<Vec<Item>, ParseError> {
    let mut items = Vec::new();
    let mut rest = source;
    let mut trim_next = false;

    while let Some(start) = rest.find(LEFT_DELIM) {
        let mut text = &rest[..start];
        let mut body = &rest[start + LEFT_DELIM.len()..];
        let line = line_at(source, body);

        let trim_left = has_left_trim_marker(body);
        if trim_left {
            body = body[1..].trim_start();
            text = text.trim_end();
        }
        if trim_next {
            text = text.trim_start();
        }
        push_text(&mut items, text);

        if let Some(comment) = body.strip_prefix(LEFT_COMMENT) {
            let (remaining, trim_right) = skip_comment(comment, line)?;
            trim_next = trim_right;
            rest = remaining;
            continue;
        }

        if !body.contains(RIGHT_DELIM) {
            return Err(ParseError::at(line, "unclosed action"));
        }

        let (remaining, (action, trim_right)) =
            action(body).map_err(|e| syntax_error(source, e))?;
        items.push(Item::Action { action, line });
        trim_next = trim_right;
        rest = remaining;
    }

    let text = if trim_next { rest.trim_start() } else { rest };
    push_text(&mut items, text);

    Ok(items)
}

fn push_text(items: &mut Vec<Item>, text: &str) {
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
}

/// `{{- ` trims preceding whitespace; the dash must be followed by a space
/// so that `{{-3}}` still reads as a number.
fn has_left_trim_marker(body: &str) -> bool {
    let mut chars = body.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

fn skip_comment(comment: &str, line: usize) -> Result<(&str, bool), ParseError> {
    let Some(end) = comment.find(RIGHT_COMMENT) else {
        return Err(ParseError::at(line, "unclosed comment"));
    };
    let after = &comment[end + RIGHT_COMMENT.len()..];

    if let Some(remaining) = after.strip_prefix(RIGHT_DELIM) {
        return Ok((remaining, false));
    }
    let trimmed = after.trim_start();
    if trimmed.len() < after.len() {
        if let Some(remaining) = trimmed.strip_prefix("-}}") {
            return Ok((remaining, true));
        }
    }
    Err(ParseError::at(line, "comment ends before closing delimiter"))
}

/// 1-based line of the position where `at` (a suffix of `source`) begins.
fn line_at(source: &str, at: &str) -> usize {
    let offset = source.len().saturating_sub(at.len());
    1 + source[..offset].matches('\n').count()
}

fn syntax_error(source: &str, err: nom::Err<VerboseError<&str>>) -> ParseError {
    let errors = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e.errors,
        nom::Err::Incomplete(_) => return ParseError::at(1, "incomplete action"),
    };

    let position = errors.first().map(|(input, _)| *input).unwrap_or("");
    let ctx = errors
        .iter()
        .find_map(|(_, kind)| match kind {
            VerboseErrorKind::Context(ctx) => Some(*ctx),
            _ => None,
        })
        .unwrap_or("command");

    let message = if ctx.starts_with("unterminated") {
        ctx.to_string()
    } else if position.is_empty() {
        "unclosed action".to_string()
    } else if position.starts_with(RIGHT_DELIM) || position.starts_with("-}}") {
        format!("missing value for {}", ctx)
    } else {
        let token: String = position.chars().next().into_iter().collect();
        format!("unexpected {:?} in {}", token, ctx)
    };

    ParseError::at(line_at(source, position), message)
}

// ============================================================================
// Action grammar
// ============================================================================

fn action(input: &str) -> Res<'_, (Action, bool)> {
    let (input, _) = multispace0(input)?;
    let (input, action) = alt((control, map(pipeline, Action::Pipeline)))(input)?;
    let (input, trim_right) = closing(input)?;
    Ok((input, (action, trim_right)))
}

/// `}}`, or ` -}}` which also trims the whitespace that follows.
fn closing(input: &str) -> Res<'_, bool> {
    let (after_space, space) = multispace0(input)?;
    if !space.is_empty() {
        if let Some(rest) = after_space.strip_prefix("-}}") {
            return Ok((rest, true));
        }
    }
    let (rest, _) = context("action", tag(RIGHT_DELIM))(after_space)?;
    Ok((rest, false))
}

fn control(input: &str) -> Res<'_, Action> {
    alt((
        map(keyword_pipeline("if"), Action::If),
        map(
            preceded(
                pair(keyword("else"), pair(multispace1, keyword("if"))),
                cut(context("else if", preceded(multispace1, pipeline))),
            ),
            Action::ElseIf,
        ),
        map(keyword("else"), |_| Action::Else),
        map(keyword("end"), |_| Action::End),
        map(keyword_pipeline("range"), Action::Range),
        map(keyword_pipeline("with"), Action::With),
    ))(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    move |input| {
        let (rest, found) = identifier(input)?;
        if found == word {
            Ok((rest, found))
        } else {
            Err(nom::Err::Error(VerboseError::from_error_kind(
                input,
                ErrorKind::Tag,
            )))
        }
    }
}

fn keyword_pipeline<'a>(word: &'static str) -> impl FnMut(&'a str) -> Res<'a, Pipeline> {
    move |input| {
        preceded(
            keyword(word),
            cut(context(word, preceded(multispace1, pipeline))),
        )(input)
    }
}

fn pipeline(input: &str) -> Res<'_, Pipeline> {
    let (input, decl) = opt(declaration)(input)?;
    let (input, commands) = commands(input)?;
    Ok((
        input,
        Pipeline {
            decl: decl.unwrap_or_default(),
            commands,
        },
    ))
}

fn commands(input: &str) -> Res<'_, Vec<Command>> {
    let (input, first) = command(input)?;
    let (input, rest) = many0(preceded(
        pair(multispace0, char('|')),
        cut(context("command", preceded(multispace0, command))),
    ))(input)?;

    let mut commands = Vec::with_capacity(rest.len() + 1);
    commands.push(first);
    commands.extend(rest);
    Ok((input, commands))
}

fn declaration(input: &str) -> Res<'_, Vec<String>> {
    terminated(
        separated_list1(tuple((multispace0, char(','), multispace0)), variable_name),
        tuple((multispace0, tag(":="), multispace0)),
    )(input)
}

fn variable_name(input: &str) -> Res<'_, String> {
    map(recognize(pair(char('$'), identifier)), str::to_string)(input)
}

fn command(input: &str) -> Res<'_, Command> {
    let (input, first) = operand(input)?;
    let (input, rest) = many0(preceded(multispace1, operand))(input)?;

    let mut args = Vec::with_capacity(rest.len() + 1);
    args.push(first);
    args.extend(rest);
    Ok((input, Command { args }))
}

fn operand(input: &str) -> Res<'_, Operand> {
    alt((
        map(string_literal, |s| Operand::Literal(Json::String(s))),
        map(raw_string, |s| Operand::Literal(Json::String(s.to_string()))),
        number,
        field_chain,
        map(char('.'), |_| Operand::Dot),
        variable,
        nested,
        word,
    ))(input)
}

fn identifier(input: &str) -> Res<'_, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

fn field_chain(input: &str) -> Res<'_, Operand> {
    map(many1(preceded(char('.'), identifier)), |names| {
        Operand::Field(names.into_iter().map(str::to_string).collect())
    })(input)
}

fn variable(input: &str) -> Res<'_, Operand> {
    let (input, name) = recognize(pair(char('$'), opt(identifier)))(input)?;
    let (input, fields) = many0(preceded(char('.'), identifier))(input)?;
    Ok((
        input,
        Operand::Variable {
            name: name.to_string(),
            fields: fields.into_iter().map(str::to_string).collect(),
        },
    ))
}

fn nested(input: &str) -> Res<'_, Operand> {
    map(
        preceded(
            char('('),
            cut(context(
                "parenthesized pipeline",
                terminated(delimited(multispace0, commands, multispace0), char(')')),
            )),
        ),
        |commands| {
            Operand::Nested(Box::new(Pipeline {
                decl: Vec::new(),
                commands,
            }))
        },
    )(input)
}

/// Function names and the `true`, `false` and `nil` keywords.
fn word(input: &str) -> Res<'_, Operand> {
    map(identifier, |name| match name {
        "true" => Operand::Literal(Json::Bool(true)),
        "false" => Operand::Literal(Json::Bool(false)),
        "nil" => Operand::Literal(Json::Null),
        name => Operand::Function(name.to_string()),
    })(input)
}

fn number(input: &str) -> Res<'_, Operand> {
    let (rest, text) = recognize_float(input)?;
    let value = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Json::Number)
    } else {
        text.parse::<i64>().ok().map(Json::from)
    };

    match value {
        Some(value) => Ok((rest, Operand::Literal(value))),
        None => Err(nom::Err::Failure(VerboseError::add_context(
            input,
            "number",
            VerboseError::from_error_kind(input, ErrorKind::Float),
        ))),
    }
}

/// `"..."` with `\"`, `\\`, `\n`, `\t` and `\r` escapes.
fn string_literal(input: &str) -> Res<'_, String> {
    let (mut rest, _) = char('"')(input)?;
    let mut out = String::new();

    loop {
        let mut chars = rest.chars();
        match chars.next() {
            Some('"') => return Ok((chars.as_str(), out)),
            Some('\\') => {
                let escaped = match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some(c @ ('"' | '\\')) => c,
                    _ => return Err(unterminated(rest, "unterminated escape in quoted string")),
                };
                out.push(escaped);
            }
            Some('\n') | None => return Err(unterminated(rest, "unterminated quoted string")),
            Some(c) => out.push(c),
        }
        rest = chars.as_str();
    }
}

fn raw_string(input: &str) -> Res<'_, &str> {
    preceded(
        char('`'),
        cut(context(
            "unterminated raw quoted string",
            terminated(take_while(|c| c != '`'), char('`')),
        )),
    )(input)
}

fn unterminated<'a>(at: &'a str, message: &'static str) -> nom::Err<VerboseError<&'a str>> {
    nom::Err::Failure(VerboseError::add_context(
        at,
        message,
        VerboseError::from_error_kind(at, ErrorKind::Char),
    ))
}

// ============================================================================
// Block assembly
// ============================================================================

enum Terminator {
    Eof,
    End(usize),
    Else(usize),
    ElseIf(Pipeline, usize),
}

struct Builder<'f> {
    funcs: &'f FuncMap,
    /// Variables in scope, innermost last.
    vars: Vec<String>,
    items: std::vec::IntoIter<Item>,
}

impl Builder<'_> {
    fn list(&mut self) -> Result<(Vec<Node>, Terminator), ParseError> {
        let mut nodes = Vec::new();

        while let Some(item) = self.items.next() {
            let (action, line) = match item {
                Item::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Item::Action { action, line } => (action, line),
            };

            match action {
                Action::Pipeline(pipe) => {
                    self.check_pipeline(&pipe, line, 1)?;
                    self.declare(&pipe);
                    nodes.push(Node::Action { pipe, line });
                }
                Action::If(pipe) => nodes.push(self.if_node(pipe, line)?),
                Action::Range(pipe) => nodes.push(self.range_node(pipe, line)?),
                Action::With(pipe) => nodes.push(self.with_node(pipe, line)?),
                Action::End => return Ok((nodes, Terminator::End(line))),
                Action::Else => return Ok((nodes, Terminator::Else(line))),
                Action::ElseIf(pipe) => return Ok((nodes, Terminator::ElseIf(pipe, line))),
            }
        }

        Ok((nodes, Terminator::Eof))
    }

    /// A block body: variables declared inside go out of scope at its end.
    fn scoped_list(&mut self) -> Result<(Vec<Node>, Terminator), ParseError> {
        let mark = self.vars.len();
        let result = self.list();
        self.vars.truncate(mark);
        result
    }

    fn if_node(&mut self, pipe: Pipeline, line: usize) -> Result<Node, ParseError> {
        let mark = self.vars.len();
        self.check_pipeline(&pipe, line, 1)?;
        self.declare(&pipe);

        let (then, terminator) = self.scoped_list()?;
        let otherwise = match terminator {
            Terminator::End(_) => Vec::new(),
            Terminator::Else(_) => {
                let (otherwise, terminator) = self.scoped_list()?;
                expect_end(terminator, "if", line)?;
                otherwise
            }
            Terminator::ElseIf(next, next_line) => vec![self.if_node(next, next_line)?],
            Terminator::Eof => return Err(missing_end("if", line)),
        };

        self.vars.truncate(mark);
        Ok(Node::If {
            pipe,
            then,
            otherwise,
            line,
        })
    }

    fn range_node(&mut self, pipe: Pipeline, line: usize) -> Result<Node, ParseError> {
        let (body, otherwise) = self.loop_like(&pipe, line, "range", 2)?;
        Ok(Node::Range {
            pipe,
            body,
            otherwise,
            line,
        })
    }

    fn with_node(&mut self, pipe: Pipeline, line: usize) -> Result<Node, ParseError> {
        let (body, otherwise) = self.loop_like(&pipe, line, "with", 1)?;
        Ok(Node::With {
            pipe,
            body,
            otherwise,
            line,
        })
    }

    /// Shared shape of `range` and `with`: body, optional `else`, `end`.
    fn loop_like(
        &mut self,
        pipe: &Pipeline,
        line: usize,
        keyword: &str,
        max_decl: usize,
    ) -> Result<(Vec<Node>, Vec<Node>), ParseError> {
        let mark = self.vars.len();
        self.check_pipeline(pipe, line, max_decl)?;
        self.declare(pipe);

        let (body, terminator) = self.scoped_list()?;
        let otherwise = match terminator {
            Terminator::End(_) => Vec::new(),
            Terminator::Else(_) => {
                let (otherwise, terminator) = self.scoped_list()?;
                expect_end(terminator, keyword, line)?;
                otherwise
            }
            Terminator::ElseIf(_, else_line) => {
                return Err(ParseError::at(
                    else_line,
                    format!("{{{{else if}}}} is not allowed in {}", keyword),
                ))
            }
            Terminator::Eof => return Err(missing_end(keyword, line)),
        };

        self.vars.truncate(mark);
        Ok((body, otherwise))
    }

    fn declare(&mut self, pipe: &Pipeline) {
        self.vars.extend(pipe.decl.iter().cloned());
    }

    fn check_pipeline(
        &self,
        pipe: &Pipeline,
        line: usize,
        max_decl: usize,
    ) -> Result<(), ParseError> {
        if pipe.decl.len() > max_decl {
            return Err(ParseError::at(line, "too many declarations in command"));
        }
        self.check_commands(&pipe.commands, line)
    }

    fn check_commands(&self, commands: &[Command], line: usize) -> Result<(), ParseError> {
        for (position, command) in commands.iter().enumerate() {
            let head = &command.args[0];
            let receives_args = command.args.len() > 1 || position > 0;
            if receives_args && !matches!(head, Operand::Function(_)) {
                return Err(ParseError::at(
                    line,
                    format!("can't give argument to non-function {}", describe(head)),
                ));
            }
            for operand in &command.args {
                self.check_operand(operand, line)?;
            }
        }
        Ok(())
    }

    fn check_operand(&self, operand: &Operand, line: usize) -> Result<(), ParseError> {
        match operand {
            Operand::Function(name) if !self.funcs.contains(name) => Err(ParseError::at(
                line,
                format!("function {:?} not defined", name),
            )),
            Operand::Variable { name, .. } if !self.vars.iter().any(|v| v == name) => Err(
                ParseError::at(line, format!("undefined variable {:?}", name)),
            ),
            Operand::Nested(pipe) => self.check_commands(&pipe.commands, line),
            _ => Ok(()),
        }
    }
}

fn expect_end(terminator: Terminator, keyword: &str, line: usize) -> Result<(), ParseError> {
    match terminator {
        Terminator::End(_) => Ok(()),
        Terminator::Else(else_line) | Terminator::ElseIf(_, else_line) => Err(ParseError::at(
            else_line,
            format!("expected {{{{end}}}} for {}; found {{{{else}}}}", keyword),
        )),
        Terminator::Eof => Err(missing_end(keyword, line)),
    }
}

fn missing_end(keyword: &str, line: usize) -> ParseError {
    ParseError::at(
        line,
        format!("unexpected EOF: missing {{{{end}}}} for {}", keyword),
    )
}

fn describe(operand: &Operand) -> String {
    match operand {
        Operand::Dot => ".".to_string(),
        Operand::Field(path) => format!(".{}", path.join(".")),
        Operand::Variable { name, fields } if fields.is_empty() => name.clone(),
        Operand::Variable { name, fields } => format!("{}.{}", name, fields.join(".")),
        Operand::Function(name) => name.clone(),
        Operand::Literal(value) => value.to_string(),
        Operand::Nested(_) => "(pipeline)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Tree {
        parse(source, &FuncMap::with_helpers()).unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        parse(source, &FuncMap::with_helpers()).unwrap_err()
    }

    fn field(names: &[&str]) -> Operand {
        Operand::Field(names.iter().map(|n| n.to_string()).collect())
    }

    #[test]
    fn test_text_and_field() {
        let tree = parse_ok("Hello {{.User.Name}}!");
        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.nodes[0], Node::Text("Hello ".to_string()));
        match &tree.nodes[1] {
            Node::Action { pipe, line } => {
                assert_eq!(*line, 1);
                assert_eq!(pipe.commands[0].args, vec![field(&["User", "Name"])]);
            }
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_function_call_and_pipe() {
        let tree = parse_ok(r#"{{default "User" .Name | upper}}"#);
        let Node::Action { pipe, .. } = &tree.nodes[0] else {
            panic!("expected action");
        };
        assert_eq!(pipe.commands.len(), 2);
        assert_eq!(
            pipe.commands[0].args,
            vec![
                Operand::Function("default".to_string()),
                Operand::Literal(Json::String("User".to_string())),
                field(&["Name"]),
            ]
        );
        assert_eq!(
            pipe.commands[1].args,
            vec![Operand::Function("upper".to_string())]
        );
    }

    #[test]
    fn test_unicode_field_names() {
        let tree = parse_ok("Xin chào {{.Tên}} {{$số := .Điểm_1}}{{$số}}");
        let Node::Action { pipe, .. } = &tree.nodes[1] else {
            panic!("expected action");
        };
        assert_eq!(pipe.commands[0].args, vec![field(&["Tên"])]);
    }

    #[test]
    fn test_literals() {
        let tree = parse_ok(r#"{{print "a\"b" `raw` 42 -1.5 true nil}}"#);
        let Node::Action { pipe, .. } = &tree.nodes[0] else {
            panic!("expected action");
        };
        let args = &pipe.commands[0].args;
        assert_eq!(args[1], Operand::Literal(Json::String("a\"b".to_string())));
        assert_eq!(args[2], Operand::Literal(Json::String("raw".to_string())));
        assert_eq!(args[3], Operand::Literal(Json::from(42)));
        assert_eq!(args[4], Operand::Literal(serde_json::json!(-1.5)));
        assert_eq!(args[5], Operand::Literal(Json::Bool(true)));
        assert_eq!(args[6], Operand::Literal(Json::Null));
    }

    #[test]
    fn test_blocks() {
        let tree = parse_ok(
            "{{if .A}}a{{else if .B}}b{{else}}c{{end}}{{range $i, $v := .Items}}{{$v}}{{else}}none{{end}}",
        );
        assert_eq!(tree.nodes.len(), 2);
        match &tree.nodes[0] {
            Node::If { otherwise, .. } => {
                assert!(matches!(otherwise[0], Node::If { .. }));
            }
            other => panic!("unexpected node: {:?}", other),
        }
        match &tree.nodes[1] {
            Node::Range {
                pipe, otherwise, ..
            } => {
                assert_eq!(pipe.decl, vec!["$i".to_string(), "$v".to_string()]);
                assert_eq!(otherwise, &vec![Node::Text("none".to_string())]);
            }
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_trim_markers_and_comments() {
        let tree = parse_ok("a  {{- .X -}}  b {{/* note */}}c{{- /* x */ -}}  d");
        assert_eq!(
            tree.nodes,
            vec![
                Node::Text("a".to_string()),
                Node::Action {
                    pipe: Pipeline {
                        decl: vec![],
                        commands: vec![Command {
                            args: vec![field(&["X"])]
                        }],
                    },
                    line: 1,
                },
                Node::Text("b ".to_string()),
                Node::Text("c".to_string()),
                Node::Text("d".to_string()),
            ]
        );
    }

    #[test]
    fn test_negative_number_is_not_trim_marker() {
        let tree = parse_ok("{{-3}}");
        let Node::Action { pipe, .. } = &tree.nodes[0] else {
            panic!("expected action");
        };
        assert_eq!(pipe.commands[0].args[0], Operand::Literal(Json::from(-3)));
    }

    #[test]
    fn test_unclosed_action() {
        let err = parse_err("<h1>Hello {{.Name</h1>");
        assert_eq!(err.line, 1);
        assert!(err.message.contains("unclosed action"), "{}", err.message);
    }

    #[test]
    fn test_unexpected_character() {
        let err = parse_err("<h1>Hello {{.Name</h1> {{end}}");
        assert!(err.message.contains("unexpected \"<\""), "{}", err.message);
    }

    #[test]
    fn test_block_errors() {
        assert!(parse_err("{{end}}").message.contains("unexpected {{end}}"));
        assert!(parse_err("{{else}}").message.contains("unexpected {{else}}"));
        let err = parse_err("line one\n{{if .X}}never closed");
        assert_eq!(err.line, 2);
        assert!(err.message.contains("missing {{end}} for if"));
        assert!(parse_err("{{range .X}}{{else if .Y}}{{end}}")
            .message
            .contains("not allowed in range"));
    }

    #[test]
    fn test_undefined_names() {
        assert!(parse_err("{{shout .Name}}")
            .message
            .contains("function \"shout\" not defined"));
        assert!(parse_err("{{$x}}").message.contains("undefined variable \"$x\""));
        assert!(parse_err("{{range $v := .Items}}{{end}}{{$v}}")
            .message
            .contains("undefined variable"));
        parse_ok("{{$x := .A}}{{$x}}{{with $y := .B}}{{$y}}{{$x}}{{end}}");
    }

    #[test]
    fn test_missing_values() {
        assert!(parse_err("{{}}").message.contains("missing value for command"));
        assert!(parse_err("{{if}}{{end}}").message.contains("missing value for if"));
        assert!(parse_err("{{.X | }}").message.contains("missing value for command"));
    }

    #[test]
    fn test_non_function_with_arguments() {
        assert!(parse_err("{{.Name .Other}}")
            .message
            .contains("can't give argument to non-function .Name"));
        assert!(parse_err("{{.Name | .Other}}")
            .message
            .contains("non-function .Other"));
    }

    #[test]
    fn test_unterminated_strings_and_comments() {
        assert!(parse_err(r#"{{upper "abc}}"#)
            .message
            .contains("unterminated quoted string"));
        assert!(parse_err("{{/* never ends }}").message.contains("unclosed comment"));
    }

    #[test]
    fn test_string_may_contain_delimiters() {
        let tree = parse_ok(r#"{{replace .X "}}" "x"}}"#);
        assert_eq!(tree.nodes.len(), 1);
    }
}
