//! Compile-only checks of the script pane.
//!
//! Nothing here runs user code. [`EngineCompiler`] hands the text to the
//! page's own `Function` constructor and is what the browser build uses.
//! [`SyntaxScanner`] is the native fallback: a lexer driving a small
//! statement and expression state machine, close enough to the engine's
//! grammar to catch the common slips (missing operands, adjacent
//! expressions, unbalanced brackets, bad headers) without a full parser.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptCompileError {
    pub message: String,
    /// 1-based line, when the compiler knows it.
    pub line: Option<usize>,
    /// Raw stack text; the line is recovered from its `<anonymous>:N` frame.
    pub trace: Option<String>,
}

pub trait ScriptCompiler {
    fn compile(&self, source: &str) -> Result<(), ScriptCompileError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SyntaxScanner;

impl ScriptCompiler for SyntaxScanner {
    fn compile(&self, source: &str) -> Result<(), ScriptCompileError> {
        Scanner::new(source).run()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    PrivateName(String),
    Number,
    Str,
    /// Opening backtick; the template body is scanned after dispatch.
    Template,
    Regex,
    Punct(&'static str),
}

#[derive(Clone, Debug)]
struct Tok {
    token: Token,
    line: usize,
    newline_before: bool,
}

/// Longest first so `>>>=` wins over `>>`.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==", "!=",
    "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
    "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*", "/", "%",
    "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

const KEYWORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with",
];

/// Member prefixes that may be followed by another key on the same line.
const MODIFIERS: &[&str] = &["get", "set", "async", "static", "accessor"];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

fn is_ident_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_alphanumeric() || c == '\u{200c}' || c == '\u{200d}'
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HeaderKind {
    /// `if`, `while`, `with`.
    Condition,
    For,
    Switch,
    Catch,
}

/// Where parsing resumes once a body's closing brace is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BodyEnd {
    Statement,
    Expression,
    /// Method or static block: back to the enclosing object or class.
    Member,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Frame {
    Root,
    Group,
    Arguments,
    Header(HeaderKind),
    Params(BodyEnd),
    Array,
    Index,
    ComputedKey,
    Block(BodyEnd),
    Object,
    Class { expression: bool },
    /// `${` inside a template literal.
    Substitution,
}

impl Frame {
    fn closer(self) -> Option<&'static str> {
        match self {
            Frame::Root => None,
            Frame::Group | Frame::Arguments | Frame::Header(_) | Frame::Params(_) => Some(")"),
            Frame::Array | Frame::Index | Frame::ComputedKey => Some("]"),
            Frame::Block(_) | Frame::Object | Frame::Class { .. } | Frame::Substitution => Some("}"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Level {
    frame: Frame,
    /// Open `?` still waiting for their `:`.
    ternaries: usize,
}

impl Level {
    fn new(frame: Frame) -> Self {
        Self {
            frame,
            ternaries: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyKind {
    Plain,
    Modifier,
    Static,
}

/// What the next token is allowed to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Statement,
    Operand,
    /// A clause of a `for` header, which may be empty.
    OptionalOperand,
    /// After `return` or `yield`: an operand on the same line, or nothing.
    Return,
    /// After `=>`: a block body or an expression.
    Arrow,
    Operator,
    Property { optional: bool },
    Binding,
    FunctionName { required: bool, body: BodyEnd },
    Params(BodyEnd),
    Body(BodyEnd),
    Header(HeaderKind),
    ClassName { required: bool },
    ClassHeritage,
    /// After `break` or `continue`: an optional label.
    Jump,
    /// Only the end of the statement may follow.
    End,
    Key,
    AfterKey(KeyKind),
}

/// Facts about the previous token that only its direct successor needs.
#[derive(Clone, Copy, Debug, Default)]
struct Prior {
    /// `async` was just read as an operand; `true` when it began a statement.
    async_word: Option<bool>,
    new_word: bool,
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    /// A line break was skipped since the last token.
    newline: bool,
    state: State,
    stack: Vec<Level>,
    /// `class` keywords still waiting for their body, as (expression, depth).
    classes: Vec<(bool, usize)>,
    next_prior: Prior,
}

type Step = Result<(), ScriptCompileError>;

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            newline: false,
            state: State::Statement,
            stack: vec![Level::new(Frame::Root)],
            classes: Vec::new(),
            next_prior: Prior::default(),
        }
    }

    fn error(&self, message: impl Into<String>, line: usize) -> ScriptCompileError {
        ScriptCompileError {
            message: message.into(),
            line: Some(line),
            trace: None,
        }
    }

    fn unexpected(&self, tok: &Tok) -> ScriptCompileError {
        let message = match &tok.token {
            Token::Word(word) if is_keyword(word) => format!("Unexpected token '{word}'"),
            Token::Word(word) | Token::PrivateName(word) => {
                format!("Unexpected identifier '{word}'")
            }
            Token::Number => "Unexpected number".to_string(),
            Token::Str => "Unexpected string".to_string(),
            Token::Template => "Unexpected template string".to_string(),
            Token::Regex => "Unexpected regular expression".to_string(),
            Token::Punct(punct) => format!("Unexpected token '{punct}'"),
        };
        self.error(message, tok.line)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.src[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// First non-whitespace character after the current position.
    fn upcoming(&self) -> Option<char> {
        self.src[self.pos..].chars().find(|c| !c.is_whitespace())
    }

    /// `let` starts a declaration only when a binding follows; otherwise it
    /// is a plain identifier in sloppy code.
    fn binding_follows(&self) -> bool {
        self.upcoming()
            .is_some_and(|c| is_ident_start(c) || matches!(c, '[' | '{' | '\\'))
    }

    fn regex_allowed(&self) -> bool {
        matches!(
            self.state,
            State::Statement
                | State::Operand
                | State::OptionalOperand
                | State::Return
                | State::Arrow
        )
    }

    fn top(&self) -> Level {
        self.stack
            .last()
            .copied()
            .unwrap_or(Level::new(Frame::Root))
    }

    fn open(&mut self, frame: Frame, next: State) -> Step {
        self.stack.push(Level::new(frame));
        self.state = next;
        Ok(())
    }

    fn goto(&mut self, next: State) -> Step {
        self.state = next;
        Ok(())
    }

    fn run(mut self) -> Step {
        while let Some(c) = self.peek() {
            let line = self.line;
            let token = match c {
                '\n' => {
                    self.bump();
                    self.newline = true;
                    continue;
                }
                c if c.is_whitespace() || c == '\u{feff}' => {
                    self.bump();
                    continue;
                }
                '/' if self.peek_second() == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                    continue;
                }
                '/' if self.peek_second() == Some('*') => {
                    let Some(end) = self.src[self.pos + 2..].find("*/") else {
                        return Err(self.error("Invalid or unexpected token", line));
                    };
                    let target = self.pos + 2 + end + 2;
                    while self.pos < target {
                        self.bump();
                    }
                    self.newline |= self.line > line;
                    continue;
                }
                '/' if self.regex_allowed() => {
                    self.regex(line)?;
                    Token::Regex
                }
                '"' | '\'' => {
                    self.string(c, line)?;
                    Token::Str
                }
                '`' => {
                    self.bump();
                    self.emit(Token::Template, line)?;
                    self.template(line)?;
                    continue;
                }
                '0'..='9' => {
                    self.number();
                    Token::Number
                }
                '.' if self.peek_second().is_some_and(|d| d.is_ascii_digit()) => {
                    self.number();
                    Token::Number
                }
                '#' if self.peek_second().is_some_and(is_ident_start) => {
                    self.bump();
                    Token::PrivateName(format!("#{}", self.word()))
                }
                c if is_ident_start(c) || c == '\\' => Token::Word(self.word()),
                _ => match self.punctuator() {
                    Some(punct) => Token::Punct(punct),
                    None => return Err(self.error("Invalid or unexpected token", line)),
                },
            };
            self.emit(token, line)?;
        }

        let settled = matches!(
            self.state,
            State::Statement | State::Operator | State::Return | State::Jump | State::End
        );
        if self.stack.len() > 1 || !settled {
            return Err(self.error("Unexpected end of input", self.line));
        }
        Ok(())
    }

    fn emit(&mut self, token: Token, line: usize) -> Step {
        let tok = Tok {
            token,
            line,
            newline_before: std::mem::take(&mut self.newline),
        };
        let mut prior = std::mem::take(&mut self.next_prior);
        if tok.newline_before {
            prior.async_word = None;
        }
        self.dispatch(&tok, prior)
    }

    fn dispatch(&mut self, tok: &Tok, prior: Prior) -> Step {
        match self.state {
            State::Statement => self.statement(tok, prior),
            State::Operand | State::OptionalOperand | State::Return | State::Arrow => {
                self.operand(tok, prior)
            }
            State::Operator | State::Jump | State::End => self.operator(tok, prior),
            State::Property { optional } => match &tok.token {
                Token::Word(_) | Token::PrivateName(_) => self.goto(State::Operator),
                Token::Punct("(") if optional => self.open(Frame::Arguments, State::Operand),
                Token::Punct("[") if optional => self.open(Frame::Index, State::Operand),
                _ => Err(self.unexpected(tok)),
            },
            State::Binding => match &tok.token {
                Token::Word(word) if !is_keyword(word) => self.goto(State::Operator),
                Token::Punct("[") => self.open(Frame::Array, State::Operand),
                Token::Punct("{") => self.open(Frame::Object, State::Key),
                _ => Err(self.unexpected(tok)),
            },
            State::FunctionName { required, body } => match &tok.token {
                Token::Punct("*") => Ok(()),
                Token::Word(word) if !is_keyword(word) => self.goto(State::Params(body)),
                Token::Punct("(") if required => Err(self.error(
                    "Function statements require a function name",
                    tok.line,
                )),
                Token::Punct("(") => self.open(Frame::Params(body), State::Operand),
                _ => Err(self.unexpected(tok)),
            },
            State::Params(body) => match &tok.token {
                Token::Punct("(") => self.open(Frame::Params(body), State::Operand),
                _ => Err(self.unexpected(tok)),
            },
            State::Body(body) => match &tok.token {
                Token::Punct("{") => self.open(Frame::Block(body), State::Statement),
                _ => Err(self.unexpected(tok)),
            },
            State::Header(kind) => self.header(tok, kind),
            State::ClassName { .. } | State::ClassHeritage => self.class_head(tok),
            State::Key | State::AfterKey(_) => self.member(tok),
        }
    }

    fn statement(&mut self, tok: &Tok, prior: Prior) -> Step {
        match &tok.token {
            Token::Word(word) => match word.as_str() {
                "if" | "while" | "with" => self.goto(State::Header(HeaderKind::Condition)),
                "for" => self.goto(State::Header(HeaderKind::For)),
                "switch" => self.goto(State::Header(HeaderKind::Switch)),
                "catch" => self.goto(State::Header(HeaderKind::Catch)),
                "do" | "else" => Ok(()),
                "try" | "finally" => self.goto(State::Body(BodyEnd::Statement)),
                "return" => self.goto(State::Return),
                "throw" | "case" => self.goto(State::Operand),
                "break" | "continue" => self.goto(State::Jump),
                "debugger" => self.goto(State::End),
                "default" => self.goto(State::Operator),
                "var" | "const" => self.goto(State::Binding),
                "let" if self.binding_follows() => self.goto(State::Binding),
                "function" => self.goto(State::FunctionName {
                    required: true,
                    body: BodyEnd::Statement,
                }),
                "class" => {
                    self.classes.push((false, self.stack.len()));
                    self.goto(State::ClassName { required: true })
                }
                "import" if !matches!(self.upcoming(), Some('(' | '.')) => Err(self.error(
                    "Cannot use import statement outside a module",
                    tok.line,
                )),
                "export" => Err(self.unexpected(tok)),
                _ => self.operand(tok, prior),
            },
            Token::Punct("{") => self.open(Frame::Block(BodyEnd::Statement), State::Statement),
            Token::Punct(";") => Ok(()),
            Token::Punct("}") => self.close(tok, "}"),
            _ => self.operand(tok, prior),
        }
    }

    fn operand(&mut self, tok: &Tok, prior: Prior) -> Step {
        if self.state == State::Return && tok.newline_before {
            return self.insert_semicolon(tok);
        }
        match &tok.token {
            Token::Word(word) => self.operand_word(word, tok),
            Token::Punct(punct) => match *punct {
                "(" => self.open(Frame::Group, State::Operand),
                "[" => self.open(Frame::Array, State::Operand),
                "{" if self.state == State::Arrow => {
                    self.open(Frame::Block(BodyEnd::Expression), State::Statement)
                }
                "{" => self.open(Frame::Object, State::Key),
                "!" | "~" | "+" | "-" | "++" | "--" | "..." => self.goto(State::Operand),
                "." if prior.new_word => self.goto(State::Property { optional: false }),
                ";" if matches!(self.state, State::OptionalOperand | State::Return) => {
                    self.end_statement(tok)
                }
                ")" | "]" | "}" => self.close(tok, punct),
                "," if self.top().frame == Frame::Array => Ok(()),
                _ => Err(self.unexpected(tok)),
            },
            _ => self.goto(State::Operator),
        }
    }

    fn operand_word(&mut self, word: &str, tok: &Tok) -> Step {
        let declares = matches!(word, "var" | "const") || (word == "let" && self.binding_follows());
        if self.state == State::OptionalOperand && declares {
            return self.goto(State::Binding);
        }
        let next = match word {
            "function" => State::FunctionName {
                required: false,
                body: BodyEnd::Expression,
            },
            "class" => {
                self.classes.push((true, self.stack.len()));
                State::ClassName { required: false }
            }
            "new" => {
                self.next_prior.new_word = true;
                State::Operand
            }
            "typeof" | "void" | "delete" | "await" => State::Operand,
            "yield" => State::Return,
            "async" => {
                self.next_prior.async_word = Some(self.state == State::Statement);
                State::Operator
            }
            "this" | "super" | "null" | "true" | "false" | "import" => State::Operator,
            _ if is_keyword(word) => return Err(self.unexpected(tok)),
            _ => State::Operator,
        };
        self.goto(next)
    }

    fn operator(&mut self, tok: &Tok, prior: Prior) -> Step {
        match &tok.token {
            Token::Punct(";") => return self.end_statement(tok),
            Token::Punct(closer @ (")" | "]" | "}")) => return self.close(tok, closer),
            Token::Word(word)
                if self.state == State::Jump && !tok.newline_before && !is_keyword(word) =>
            {
                return self.goto(State::End);
            }
            _ => {}
        }
        if self.state != State::Operator {
            return self.insert_semicolon(tok);
        }

        match &tok.token {
            Token::Word(word) => match word.as_str() {
                "in" | "instanceof" => self.goto(State::Operand),
                "of" if self.top().frame == Frame::Header(HeaderKind::For) => {
                    self.goto(State::Operand)
                }
                "function" if prior.async_word.is_some() => {
                    let statement = prior.async_word == Some(true);
                    self.goto(State::FunctionName {
                        required: statement,
                        body: if statement {
                            BodyEnd::Statement
                        } else {
                            BodyEnd::Expression
                        },
                    })
                }
                // `async x => ...`
                other if prior.async_word.is_some() && !is_keyword(other) => Ok(()),
                _ => self.insert_semicolon(tok),
            },
            // Tagged template.
            Token::Template => Ok(()),
            Token::Punct(punct) => match *punct {
                "=>" => self.goto(State::Arrow),
                "." => self.goto(State::Property { optional: false }),
                "?." => self.goto(State::Property { optional: true }),
                "++" | "--" if tok.newline_before => self.insert_semicolon(tok),
                "++" | "--" => Ok(()),
                "(" => self.open(Frame::Arguments, State::Operand),
                "[" => self.open(Frame::Index, State::Operand),
                "?" => {
                    if let Some(level) = self.stack.last_mut() {
                        level.ternaries += 1;
                    }
                    self.goto(State::Operand)
                }
                ":" => self.colon(tok),
                "," => match self.top().frame {
                    Frame::Object => self.goto(State::Key),
                    Frame::Class { .. } => Err(self.unexpected(tok)),
                    _ => self.goto(State::Operand),
                },
                "{" if self.class_body_due() => self.open_class(),
                "{" | "!" | "~" | "..." => self.insert_semicolon(tok),
                _ => self.goto(State::Operand),
            },
            _ => self.insert_semicolon(tok),
        }
    }

    /// A `:` that closes no `?` ends a label, `case` or `default`.
    fn colon(&mut self, tok: &Tok) -> Step {
        let level = self.top();
        if level.ternaries > 0 {
            if let Some(level) = self.stack.last_mut() {
                level.ternaries -= 1;
            }
            return self.goto(State::Operand);
        }
        match level.frame {
            Frame::Root | Frame::Block(_) => self.goto(State::Statement),
            _ => Err(self.unexpected(tok)),
        }
    }

    fn end_statement(&mut self, tok: &Tok) -> Step {
        match self.top().frame {
            Frame::Root | Frame::Block(_) => {
                if let Some(level) = self.stack.last_mut() {
                    level.ternaries = 0;
                }
                self.goto(State::Statement)
            }
            Frame::Header(HeaderKind::For) => self.goto(State::OptionalOperand),
            Frame::Class { .. } => self.goto(State::Key),
            _ => Err(self.unexpected(tok)),
        }
    }

    /// Automatic semicolon insertion: a token that cannot continue the
    /// current statement is fine only after a line break.
    fn insert_semicolon(&mut self, tok: &Tok) -> Step {
        if !tok.newline_before {
            return Err(self.unexpected(tok));
        }
        match self.top().frame {
            Frame::Root | Frame::Block(_) => {
                self.end_statement(tok)?;
                self.dispatch(tok, Prior::default())
            }
            Frame::Class { .. } => {
                self.state = State::Key;
                self.member(tok)
            }
            _ => Err(self.unexpected(tok)),
        }
    }

    fn header(&mut self, tok: &Tok, kind: HeaderKind) -> Step {
        match &tok.token {
            Token::Punct("(") => {
                let next = match kind {
                    HeaderKind::For => State::OptionalOperand,
                    HeaderKind::Catch => State::Binding,
                    HeaderKind::Condition | HeaderKind::Switch => State::Operand,
                };
                self.open(Frame::Header(kind), next)
            }
            Token::Word(word) if kind == HeaderKind::For && word == "await" => Ok(()),
            Token::Punct("{") if kind == HeaderKind::Catch => {
                self.open(Frame::Block(BodyEnd::Statement), State::Statement)
            }
            _ => Err(self.unexpected(tok)),
        }
    }

    fn class_body_due(&self) -> bool {
        self.classes
            .last()
            .is_some_and(|&(_, depth)| depth == self.stack.len())
    }

    fn open_class(&mut self) -> Step {
        let expression = self.classes.pop().is_some_and(|(expression, _)| expression);
        self.open(Frame::Class { expression }, State::Key)
    }

    fn class_head(&mut self, tok: &Tok) -> Step {
        let named = !matches!(self.state, State::ClassName { required: true });
        match &tok.token {
            Token::Word(word) if word == "extends" && named => self.goto(State::Operand),
            Token::Word(word)
                if matches!(self.state, State::ClassName { .. }) && !is_keyword(word) =>
            {
                self.goto(State::ClassHeritage)
            }
            Token::Punct("{") if named => self.open_class(),
            _ => Err(self.unexpected(tok)),
        }
    }

    /// Keys and separators of object literals, patterns and class bodies.
    fn member(&mut self, tok: &Tok) -> Step {
        let class = matches!(self.top().frame, Frame::Class { .. });
        let key_like = matches!(
            tok.token,
            Token::Word(_)
                | Token::PrivateName(_)
                | Token::Str
                | Token::Number
                | Token::Punct("[" | "*")
        );

        if let State::AfterKey(kind) = self.state {
            let next_member = if tok.newline_before {
                class
            } else {
                kind != KeyKind::Plain
            };
            if key_like && next_member {
                self.state = State::Key;
                return self.member(tok);
            }
            return match &tok.token {
                Token::Punct("(") => self.open(Frame::Params(BodyEnd::Member), State::Operand),
                Token::Punct(":") if !class => self.goto(State::Operand),
                Token::Punct("=") => self.goto(State::Operand),
                Token::Punct(",") if !class => self.goto(State::Key),
                Token::Punct(";") if class => self.goto(State::Key),
                Token::Punct("{") if class && kind == KeyKind::Static => {
                    self.open(Frame::Block(BodyEnd::Member), State::Statement)
                }
                Token::Punct("}") => self.close(tok, "}"),
                _ => Err(self.unexpected(tok)),
            };
        }

        match &tok.token {
            Token::Word(word) => {
                let kind = match word.as_str() {
                    "static" => KeyKind::Static,
                    other if MODIFIERS.contains(&other) => KeyKind::Modifier,
                    _ => KeyKind::Plain,
                };
                self.goto(State::AfterKey(kind))
            }
            Token::Str | Token::Number => self.goto(State::AfterKey(KeyKind::Plain)),
            Token::PrivateName(_) if class => self.goto(State::AfterKey(KeyKind::Plain)),
            Token::Punct("[") => self.open(Frame::ComputedKey, State::Operand),
            Token::Punct("*") => Ok(()),
            Token::Punct("...") if !class => self.goto(State::Operand),
            Token::Punct(";") if class => Ok(()),
            Token::Punct("}") => self.close(tok, "}"),
            _ => Err(self.unexpected(tok)),
        }
    }

    fn close(&mut self, tok: &Tok, closer: &str) -> Step {
        let level = self.top();
        if level.frame.closer() != Some(closer) {
            return Err(self.unexpected(tok));
        }
        let state = self.state;
        let ready = match level.frame {
            Frame::Root => false,
            Frame::Group | Frame::Arguments | Frame::Params(_) | Frame::Array => {
                matches!(state, State::Operator | State::Operand)
            }
            Frame::Header(HeaderKind::For) => {
                matches!(state, State::Operator | State::OptionalOperand)
            }
            Frame::Header(_) | Frame::Index | Frame::ComputedKey | Frame::Substitution => {
                state == State::Operator
            }
            Frame::Block(_) => matches!(
                state,
                State::Statement | State::Operator | State::Return | State::Jump | State::End
            ),
            Frame::Object | Frame::Class { .. } => {
                matches!(state, State::Key | State::AfterKey(_) | State::Operator)
            }
        };
        if !ready {
            return Err(self.unexpected(tok));
        }

        self.stack.pop();
        let next = match level.frame {
            Frame::Substitution => return self.template(tok.line),
            Frame::Root | Frame::Block(BodyEnd::Statement) => State::Statement,
            Frame::Header(HeaderKind::Condition | HeaderKind::For) => State::Statement,
            Frame::Header(HeaderKind::Switch | HeaderKind::Catch) => {
                State::Body(BodyEnd::Statement)
            }
            Frame::Params(body) => State::Body(body),
            Frame::ComputedKey => State::AfterKey(KeyKind::Plain),
            Frame::Group | Frame::Arguments | Frame::Array | Frame::Index | Frame::Object => {
                State::Operator
            }
            Frame::Block(BodyEnd::Expression) => State::Operator,
            Frame::Block(BodyEnd::Member) => match self.top().frame {
                Frame::Class { .. } => State::Key,
                _ => State::Operator,
            },
            Frame::Class { expression } => {
                if expression {
                    State::Operator
                } else {
                    State::Statement
                }
            }
        };
        self.goto(next)
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\\' {
                // \uXXXX escape inside an identifier.
                self.bump();
                continue;
            }
            if !is_ident_part(c) {
                break;
            }
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn punctuator(&mut self) -> Option<&'static str> {
        let rest = &self.src[self.pos..];
        let punct = PUNCTUATORS.iter().copied().find(|punct| {
            rest.starts_with(punct)
                // `a?.5:b` is a conditional, not optional chaining.
                && !(*punct == "?."
                    && rest[2..].starts_with(|c: char| c.is_ascii_digit()))
        })?;
        self.pos += punct.len();
        Some(punct)
    }

    fn number(&mut self) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let digits = &self.src[start..self.pos];
            let exponent_sign = (c == '+' || c == '-')
                && digits.ends_with(['e', 'E'])
                && !digits.starts_with("0x")
                && !digits.starts_with("0X");
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn string(&mut self, quote: char, line: usize) -> Step {
        self.bump();
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                '\n' => return Err(self.error("Invalid or unexpected token", line)),
                c if c == quote => return Ok(()),
                _ => {}
            }
        }
        Err(self.error("Invalid or unexpected token", line))
    }

    /// Scans template text up to the closing backtick or a `${`.
    fn template(&mut self, line: usize) -> Step {
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                '`' => return self.goto(State::Operator),
                '$' if self.peek() == Some('{') => {
                    self.bump();
                    return self.open(Frame::Substitution, State::Operand);
                }
                _ => {}
            }
        }
        Err(self.error("Unterminated template literal", line))
    }

    fn regex(&mut self, line: usize) -> Step {
        self.bump();
        let mut in_class = false;
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error("Invalid regular expression: missing /", line))
                }
                Some('\\') => {
                    self.bump();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.bump();
        }
        Ok(())
    }
}

/// Compiles with the page's `Function` constructor without calling the result.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Copy, Debug, Default)]
pub struct EngineCompiler;

#[cfg(target_arch = "wasm32")]
impl ScriptCompiler for EngineCompiler {
    fn compile(&self, source: &str) -> Result<(), ScriptCompileError> {
        use wasm_bindgen::{JsCast, JsValue};

        // Header lines `Function` adds before the body: "function anonymous(\n) {\n".
        const WRAPPER_LINES: usize = 2;

        let global = js_sys::global();
        let constructor = js_sys::Reflect::get(&global, &JsValue::from_str("Function"))
            .ok()
            .and_then(|value| value.dyn_into::<js_sys::Function>().ok())
            .ok_or_else(|| ScriptCompileError {
                message: "Function constructor unavailable".to_string(),
                line: None,
                trace: None,
            })?;
        let args = js_sys::Array::of1(&JsValue::from_str(source));
        let Err(err) = js_sys::Reflect::construct(&constructor, &args) else {
            return Ok(());
        };

        let field = |name: &str| {
            js_sys::Reflect::get(&err, &JsValue::from_str(name))
                .ok()
                .and_then(|value| value.as_string())
        };
        let message = field("message").unwrap_or_else(|| "Syntax error".to_string());
        let trace = field("stack");
        let line = trace
            .as_deref()
            .and_then(super::line_from_trace)
            .map(|line| line.saturating_sub(WRAPPER_LINES).max(1));
        Err(ScriptCompileError {
            message,
            line,
            trace,
        })
    }
}
