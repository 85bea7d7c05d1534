//! Parsed template tree.

/// A parsed template, ready to execute any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    /// `{{pipeline}}`; prints the result unless the pipeline declares a variable.
    Action { pipe: Pipeline, line: usize },
    /// `{{if}}`; `{{else if}}` chains nest as an `If` inside `otherwise`.
    If {
        pipe: Pipeline,
        then: Vec<Node>,
        otherwise: Vec<Node>,
        line: usize,
    },
    Range {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
        line: usize,
    },
    With {
        pipe: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
        line: usize,
    },
}

/// `$a, $b := cmd | cmd | ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// Declared variable names, including the leading `$`.
    pub decl: Vec<String>,
    pub commands: Vec<Command>,
}

/// One command of a pipeline; a function call when the head is a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `.`
    Dot,
    /// `.A.B`
    Field(Vec<String>),
    /// `$`, `$x`, `$x.A`
    Variable { name: String, fields: Vec<String> },
    Function(String),
    Literal(serde_json::Value),
    /// `( pipeline )`
    Nested(Box<Pipeline>),
}
