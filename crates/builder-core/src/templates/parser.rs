//! Template syntax parser
//!
//! Templates are plain text with `[[ ... ]]` tags. Double square brackets are
//! used because `{{ }}` is live syntax in every dialect we emit (Blade, Vue
//! and JSX style objects).
//!
//! Supported tags:
//! - `[[ path ]]`, `[[ path? ]]`, `[[ path | filter | filter ]]`
//! - `[[#each path]] ... [[/each]]`
//! - `[[#if path]] ... [[else]] ... [[/if]]`
//! - `[[#unless path]] ... [[/unless]]`

use std::fmt;

/// Transformation applied to a slot value before escaping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Snake,
    Kebab,
    Camel,
    Pascal,
    Upper,
    Lower,
    /// JSON literal; never re-escaped
    Json,
}

impl Filter {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "snake" => Some(Filter::Snake),
            "kebab" => Some(Filter::Kebab),
            "camel" => Some(Filter::Camel),
            "pascal" => Some(Filter::Pascal),
            "upper" => Some(Filter::Upper),
            "lower" => Some(Filter::Lower),
            "json" => Some(Filter::Json),
            _ => None,
        }
    }
}

/// A value placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub path: String,
    pub optional: bool,
    pub filters: Vec<Filter>,
}

/// Parsed template element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Slot(Slot),
    Each {
        path: String,
        body: Vec<Node>,
    },
    If {
        path: String,
        negate: bool,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// Syntax error with the 1-based line it was found on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Parsed template body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplate {
    pub nodes: Vec<Node>,
}

impl ParsedTemplate {
    pub fn parse(source: &str) -> Result<Self, SyntaxError> {
        let tokens = tokenize(source)?;
        let mut builder = TreeBuilder::default();
        for token in tokens {
            builder.push(token)?;
        }
        builder.finish().map(|nodes| Self { nodes })
    }

    /// Every slot path referenced by the template, in document order
    pub fn slot_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_paths(&self.nodes, "", &mut paths);
        paths
    }
}

fn collect_paths(nodes: &[Node], scope: &str, out: &mut Vec<String>) {
    let qualify = |path: &str| {
        if scope.is_empty() || path.starts_with('@') {
            path.to_string()
        } else {
            format!("{}.{}", scope, path)
        }
    };
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Slot(slot) => out.push(qualify(&slot.path)),
            Node::Each { path, body } => {
                let inner = qualify(path);
                out.push(inner.clone());
                collect_paths(body, &inner, out);
            }
            Node::If { path, then, otherwise, .. } => {
                out.push(qualify(path));
                collect_paths(then, scope, out);
                collect_paths(otherwise, scope, out);
            }
        }
    }
}

#[derive(Debug)]
enum Token {
    Text(String),
    Tag { body: String, line: usize },
}

fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut line = 1;

    while let Some(start) = rest.find("[[") {
        let (text, after) = rest.split_at(start);
        if !text.is_empty() {
            tokens.push(Token::Text(text.to_string()));
        }
        line += text.matches('\n').count();

        let after = &after[2..];
        let end = after.find("]]").ok_or_else(|| SyntaxError {
            line,
            message: "unterminated tag, expected `]]`".to_string(),
        })?;
        let body = &after[..end];
        tokens.push(Token::Tag {
            body: body.trim().to_string(),
            line,
        });
        line += body.matches('\n').count();
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }
    Ok(tokens)
}

enum Frame {
    Root(Vec<Node>),
    Each {
        path: String,
        body: Vec<Node>,
        line: usize,
    },
    If {
        path: String,
        negate: bool,
        then: Vec<Node>,
        otherwise: Option<Vec<Node>>,
        line: usize,
    },
}

impl Frame {
    fn nodes_mut(&mut self) -> &mut Vec<Node> {
        match self {
            Frame::Root(nodes) => nodes,
            Frame::Each { body, .. } => body,
            Frame::If { then, otherwise, .. } => otherwise.as_mut().unwrap_or(then),
        }
    }
}

struct TreeBuilder {
    stack: Vec<Frame>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self {
            stack: vec![Frame::Root(Vec::new())],
        }
    }
}

impl TreeBuilder {
    fn current(&mut self) -> &mut Vec<Node> {
        // The root frame is never popped, so the stack is never empty here.
        let last = self.stack.len() - 1;
        self.stack[last].nodes_mut()
    }

    fn push(&mut self, token: Token) -> Result<(), SyntaxError> {
        let (body, line) = match token {
            Token::Text(text) => {
                self.current().push(Node::Text(text));
                return Ok(());
            }
            Token::Tag { body, line } => (body, line),
        };
        let err = |message: String| SyntaxError { line, message };

        if let Some(path) = body.strip_prefix("#each") {
            let path = block_path(path).map_err(err)?;
            self.stack.push(Frame::Each {
                path,
                body: Vec::new(),
                line,
            });
        } else if let Some((negate, path)) = body
            .strip_prefix("#if")
            .map(|p| (false, p))
            .or_else(|| body.strip_prefix("#unless").map(|p| (true, p)))
        {
            let path = block_path(path).map_err(err)?;
            self.stack.push(Frame::If {
                path,
                negate,
                then: Vec::new(),
                otherwise: None,
                line,
            });
        } else if body == "else" {
            match self.stack.last_mut() {
                Some(Frame::If { otherwise, .. }) if otherwise.is_none() => {
                    *otherwise = Some(Vec::new());
                }
                _ => return Err(err("`else` outside of an if block".to_string())),
            }
        } else if let Some(closing) = body.strip_prefix('/') {
            self.close(closing.trim(), line)?;
        } else {
            let slot = parse_slot(&body).map_err(err)?;
            self.current().push(Node::Slot(slot));
        }
        Ok(())
    }

    fn close(&mut self, name: &str, line: usize) -> Result<(), SyntaxError> {
        let frame = match self.stack.pop() {
            Some(Frame::Root(nodes)) => {
                self.stack.push(Frame::Root(nodes));
                return Err(SyntaxError {
                    line,
                    message: format!("unexpected closing tag `/{}`", name),
                });
            }
            Some(frame) => frame,
            None => unreachable_root(line)?,
        };

        let node = match (frame, name) {
            (Frame::Each { path, body, .. }, "each") => Node::Each { path, body },
            (
                Frame::If {
                    path,
                    negate,
                    then,
                    otherwise,
                    ..
                },
                "if",
            ) if !negate => Node::If {
                path,
                negate,
                then,
                otherwise: otherwise.unwrap_or_default(),
            },
            (
                Frame::If {
                    path,
                    negate,
                    then,
                    otherwise,
                    ..
                },
                "unless",
            ) if negate => Node::If {
                path,
                negate,
                then,
                otherwise: otherwise.unwrap_or_default(),
            },
            _ => {
                return Err(SyntaxError {
                    line,
                    message: format!("mismatched closing tag `/{}`", name),
                })
            }
        };
        self.current().push(node);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Node>, SyntaxError> {
        match self.stack.pop() {
            Some(Frame::Root(nodes)) if self.stack.is_empty() => Ok(nodes),
            Some(Frame::Each { line, .. }) => Err(SyntaxError {
                line,
                message: "unclosed `#each` block".to_string(),
            }),
            Some(Frame::If { line, negate, .. }) => Err(SyntaxError {
                line,
                message: format!("unclosed `#{}` block", if negate { "unless" } else { "if" }),
            }),
            _ => unreachable_root(0),
        }
    }
}

fn unreachable_root<T>(line: usize) -> Result<T, SyntaxError> {
    Err(SyntaxError {
        line,
        message: "template parser lost its root frame".to_string(),
    })
}

fn block_path(rest: &str) -> Result<String, String> {
    let path = rest.trim();
    if !rest.starts_with(char::is_whitespace) || path.is_empty() {
        return Err("block tag requires a path".to_string());
    }
    validate_path(path)?;
    Ok(path.to_string())
}

fn parse_slot(body: &str) -> Result<Slot, String> {
    let mut parts = body.split('|').map(str::trim);
    let head = parts.next().unwrap_or_default();
    let (path, optional) = match head.strip_suffix('?') {
        Some(path) => (path.trim(), true),
        None => (head, false),
    };
    validate_path(path)?;

    let filters = parts
        .map(|name| Filter::parse(name).ok_or_else(|| format!("unknown filter `{}`", name)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Slot {
        path: path.to_string(),
        optional,
        filters,
    })
}

fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("empty slot path".to_string());
    }
    if let Some(special) = path.strip_prefix('@') {
        return match special {
            "id" | "ident" | "kind" | "dialect" | "index" | "number" | "first" | "last" => Ok(()),
            _ => Err(format!("unknown special `{}`", path)),
        };
    }
    let valid = path.split('.').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    });
    if valid {
        Ok(())
    } else {
        Err(format!("invalid slot path `{}`", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_and_slots() {
        let parsed = ParsedTemplate::parse("<h1>[[ title ]]</h1>[[ subtitle? | upper ]]").unwrap();
        assert_eq!(
            parsed.nodes,
            vec![
                Node::Text("<h1>".into()),
                Node::Slot(Slot {
                    path: "title".into(),
                    optional: false,
                    filters: vec![],
                }),
                Node::Text("</h1>".into()),
                Node::Slot(Slot {
                    path: "subtitle".into(),
                    optional: true,
                    filters: vec![Filter::Upper],
                }),
            ]
        );
    }

    #[test]
    fn test_nested_blocks() {
        let parsed = ParsedTemplate::parse(
            "[[#each items]][[#if open]]x[[else]]y[[/if]][[ title ]][[/each]]",
        )
        .unwrap();
        assert_eq!(
            parsed.slot_paths(),
            vec!["items", "items.open", "items.title"]
        );
    }

    #[test]
    fn test_braces_pass_through() {
        let parsed = ParsedTemplate::parse("<div style={{ color: 'red' }}>{{ $x }}</div>").unwrap();
        assert_eq!(parsed.nodes.len(), 1);
    }

    #[test]
    fn test_unclosed_block_reports_line() {
        let err = ParsedTemplate::parse("a\nb\n[[#each items]]\nc").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("unclosed"));
    }

    #[test]
    fn test_mismatched_close() {
        let err = ParsedTemplate::parse("[[#each items]][[/if]]").unwrap_err();
        assert!(err.message.contains("mismatched"));
        let err = ParsedTemplate::parse("[[/each]]").unwrap_err();
        assert!(err.message.contains("unexpected"));
    }

    #[test]
    fn test_unknown_filter_and_special() {
        assert!(ParsedTemplate::parse("[[ title | shout ]]").is_err());
        assert!(ParsedTemplate::parse("[[ @secret ]]").is_err());
        assert!(ParsedTemplate::parse("[[ a..b ]]").is_err());
    }

    #[test]
    fn test_else_outside_if() {
        assert!(ParsedTemplate::parse("[[else]]").is_err());
    }
}
