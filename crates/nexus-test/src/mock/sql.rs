//! Tokenizer and parser for the SQL subset the mock backend understands.
//!
//! ```text
//! SELECT * | col, ... FROM t [WHERE col op operand [AND ...]]
//! SELECT operand, ...
//! INSERT INTO t VALUES (operand, ...)
//! DELETE FROM t [WHERE ...]
//! CREATE TABLE t (col TYPE [UNSIGNED] [NOT NULL], ...)
//! DROP TABLE t
//! SHOW TABLES
//!
//! operand := ? | CAST(? AS TYPE) | integer | decimal | 'string' | NULL
//! ```

use nexus_stmt::{ColumnMeta, CompileError, SqlType};
use nexus_wire::Value;

// =============================================================================
// AST
// =============================================================================

/// A value position in a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Placeholder, numbered in text order.
    Param {
        /// Placeholder number.
        index: usize,
        /// Byte offset in the text.
        position: usize,
        /// Type fixed by `CAST`.
        cast: Option<SqlType>,
    },
    /// Constant.
    Literal(Value),
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `<>` or `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// `column op operand`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Column name.
    pub column: String,
    /// Operator.
    pub op: CmpOp,
    /// Right-hand side.
    pub operand: Operand,
}

/// Parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    /// Table scan.
    Select {
        /// Selected column names; `None` for `*`.
        columns: Option<Vec<String>>,
        /// Source table.
        table: String,
        /// Conjunctive filter.
        filter: Vec<Predicate>,
    },
    /// Select without FROM.
    SelectValues(Vec<Operand>),
    /// Single-row insert.
    Insert {
        /// Target table.
        table: String,
        /// One operand per column.
        values: Vec<Operand>,
    },
    /// Filtered delete.
    Delete {
        /// Target table.
        table: String,
        /// Conjunctive filter.
        filter: Vec<Predicate>,
    },
    /// Table creation.
    CreateTable {
        /// New table.
        table: String,
        /// Column definitions.
        columns: Vec<ColumnMeta>,
    },
    /// Table removal.
    DropTable {
        /// Dropped table.
        table: String,
    },
    /// Table listing.
    ShowTables,
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(String),
    Str(String),
    Symbol(&'static str),
    Placeholder(usize),
}

fn syntax(message: impl Into<String>) -> CompileError {
    CompileError::Syntax(message.into())
}

fn tokenize(text: &str) -> Result<Vec<Token>, CompileError> {
    const SYMBOLS: [&str; 12] = ["<=", ">=", "<>", "!=", "=", "<", ">", ",", "(", ")", "*", ";"];
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    'outer: while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
        } else if c == b'?' {
            tokens.push(Token::Placeholder(pos));
            pos += 1;
        } else if c == b'\'' {
            let start = pos + 1;
            let end = text[start..]
                .find('\'')
                .map(|i| start + i)
                .ok_or_else(|| syntax("unterminated string literal"))?;
            tokens.push(Token::Str(text[start..end].to_string()));
            pos = end + 1;
        } else if c.is_ascii_digit() || (c == b'-' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            let start = pos;
            pos += 1;
            while bytes.get(pos).is_some_and(|b| b.is_ascii_digit() || *b == b'.') {
                pos += 1;
            }
            tokens.push(Token::Number(text[start..pos].to_string()));
        } else if c.is_ascii_alphabetic() || c == b'_' {
            let start = pos;
            while bytes.get(pos).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_') {
                pos += 1;
            }
            tokens.push(Token::Word(text[start..pos].to_string()));
        } else {
            for symbol in SYMBOLS {
                if text[pos..].starts_with(symbol) {
                    tokens.push(Token::Symbol(symbol));
                    pos += symbol.len();
                    continue 'outer;
                }
            }
            return Err(syntax(format!("unexpected character at offset {pos}")));
        }
    }
    if tokens.last() == Some(&Token::Symbol(";")) {
        tokens.pop();
    }
    Ok(tokens)
}

// =============================================================================
// Parser
// =============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    params: usize,
}

/// Parses one statement.
pub fn parse(text: &str) -> Result<Ast, CompileError> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
        params: 0,
    };
    let ast = parser.statement()?;
    if parser.pos < parser.tokens.len() {
        return Err(syntax(format!(
            "unexpected {:?} after end of statement",
            parser.tokens[parser.pos]
        )));
    }
    Ok(ast)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn accept_keyword(&mut self, keyword: &str) -> bool {
        let found = self.peek_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), CompileError> {
        if self.accept_keyword(keyword) {
            Ok(())
        } else {
            Err(syntax(format!("expected {keyword}")))
        }
    }

    fn accept_symbol(&mut self, symbol: &str) -> bool {
        let found = matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol);
        if found {
            self.pos += 1;
        }
        found
    }

    fn symbol(&mut self, symbol: &str) -> Result<(), CompileError> {
        if self.accept_symbol(symbol) {
            Ok(())
        } else {
            Err(syntax(format!("expected '{symbol}'")))
        }
    }

    fn identifier(&mut self) -> Result<String, CompileError> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            other => Err(syntax(format!("expected identifier, found {other:?}"))),
        }
    }

    fn statement(&mut self) -> Result<Ast, CompileError> {
        if self.accept_keyword("SELECT") {
            self.select()
        } else if self.accept_keyword("INSERT") {
            self.keyword("INTO")?;
            let table = self.identifier()?;
            self.keyword("VALUES")?;
            self.symbol("(")?;
            let values = self.operand_list()?;
            self.symbol(")")?;
            Ok(Ast::Insert { table, values })
        } else if self.accept_keyword("DELETE") {
            self.keyword("FROM")?;
            let table = self.identifier()?;
            let filter = self.filter()?;
            Ok(Ast::Delete { table, filter })
        } else if self.accept_keyword("CREATE") {
            self.keyword("TABLE")?;
            let table = self.identifier()?;
            self.symbol("(")?;
            let mut columns = vec![self.column_definition()?];
            while self.accept_symbol(",") {
                columns.push(self.column_definition()?);
            }
            self.symbol(")")?;
            Ok(Ast::CreateTable { table, columns })
        } else if self.accept_keyword("DROP") {
            self.keyword("TABLE")?;
            Ok(Ast::DropTable {
                table: self.identifier()?,
            })
        } else if self.accept_keyword("SHOW") {
            self.keyword("TABLES")?;
            Ok(Ast::ShowTables)
        } else {
            Err(syntax(format!("unsupported statement start {:?}", self.peek())))
        }
    }

    fn select(&mut self) -> Result<Ast, CompileError> {
        if self.accept_symbol("*") {
            self.keyword("FROM")?;
            let table = self.identifier()?;
            let filter = self.filter()?;
            return Ok(Ast::Select {
                columns: None,
                table,
                filter,
            });
        }
        if matches!(self.peek(), Some(Token::Word(w)) if !w.eq_ignore_ascii_case("CAST") && !w.eq_ignore_ascii_case("NULL"))
        {
            let mut columns = vec![self.identifier()?];
            while self.accept_symbol(",") {
                columns.push(self.identifier()?);
            }
            self.keyword("FROM")?;
            let table = self.identifier()?;
            let filter = self.filter()?;
            return Ok(Ast::Select {
                columns: Some(columns),
                table,
                filter,
            });
        }
        Ok(Ast::SelectValues(self.operand_list()?))
    }

    fn filter(&mut self) -> Result<Vec<Predicate>, CompileError> {
        let mut filter = Vec::new();
        if !self.accept_keyword("WHERE") {
            return Ok(filter);
        }
        loop {
            let column = self.identifier()?;
            let op = match self.next() {
                Some(Token::Symbol("=")) => CmpOp::Eq,
                Some(Token::Symbol("<>" | "!=")) => CmpOp::Ne,
                Some(Token::Symbol("<")) => CmpOp::Lt,
                Some(Token::Symbol("<=")) => CmpOp::Le,
                Some(Token::Symbol(">")) => CmpOp::Gt,
                Some(Token::Symbol(">=")) => CmpOp::Ge,
                other => return Err(syntax(format!("expected comparison, found {other:?}"))),
            };
            let operand = self.operand()?;
            filter.push(Predicate {
                column,
                op,
                operand,
            });
            if !self.accept_keyword("AND") {
                return Ok(filter);
            }
        }
    }

    fn operand_list(&mut self) -> Result<Vec<Operand>, CompileError> {
        let mut operands = vec![self.operand()?];
        while self.accept_symbol(",") {
            operands.push(self.operand()?);
        }
        Ok(operands)
    }

    fn placeholder(&mut self, position: usize, cast: Option<SqlType>) -> Operand {
        let index = self.params;
        self.params += 1;
        Operand::Param {
            index,
            position,
            cast,
        }
    }

    fn operand(&mut self) -> Result<Operand, CompileError> {
        match self.next() {
            Some(Token::Placeholder(position)) => Ok(self.placeholder(position, None)),
            Some(Token::Number(n)) => Ok(Operand::Literal(if n.contains('.') {
                Value::Decimal(n)
            } else {
                n.parse::<i64>()
                    .map_or(Value::Decimal(n), Value::Int)
            })),
            Some(Token::Str(s)) => Ok(Operand::Literal(Value::text(&s))),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("NULL") => {
                Ok(Operand::Literal(Value::Null))
            }
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("CAST") => {
                self.symbol("(")?;
                let Some(Token::Placeholder(position)) = self.next() else {
                    return Err(CompileError::Unsupported(
                        "CAST is only supported on placeholders".to_string(),
                    ));
                };
                self.keyword("AS")?;
                let sql_type = self.sql_type()?;
                self.symbol(")")?;
                Ok(self.placeholder(position, Some(sql_type)))
            }
            other => Err(syntax(format!("expected value, found {other:?}"))),
        }
    }

    fn sql_type(&mut self) -> Result<SqlType, CompileError> {
        let name = self.identifier()?.to_ascii_uppercase();
        let mut sql_type = match name.as_str() {
            "BIGINT" | "INT" | "INTEGER" | "SIGNED" => SqlType::BIGINT,
            "UNSIGNED" => SqlType::BIGINT_UNSIGNED,
            "BOOL" | "BOOLEAN" => SqlType::Bool,
            "BIT" => SqlType::Bit,
            "YEAR" => SqlType::Year,
            "DECIMAL" | "NUMERIC" => SqlType::Decimal,
            "DOUBLE" | "FLOAT" | "REAL" => SqlType::Float,
            "DATE" => SqlType::Date,
            "TIME" => SqlType::Time,
            "DATETIME" | "TIMESTAMP" => SqlType::DateTime,
            "VARCHAR" | "CHAR" | "TEXT" => SqlType::String,
            "BLOB" | "BINARY" | "VARBINARY" => SqlType::Blob,
            other => return Err(CompileError::Unsupported(format!("type {other}"))),
        };
        if self.accept_symbol("(") {
            while !self.accept_symbol(")") {
                if self.next().is_none() {
                    return Err(syntax("unterminated type length"));
                }
            }
        }
        if sql_type == SqlType::BIGINT && self.accept_keyword("UNSIGNED") {
            sql_type = SqlType::BIGINT_UNSIGNED;
        }
        Ok(sql_type)
    }

    fn column_definition(&mut self) -> Result<ColumnMeta, CompileError> {
        let name = self.identifier()?;
        let mut column = ColumnMeta::new(name, self.sql_type()?);
        if self.accept_keyword("NOT") {
            self.keyword("NULL")?;
            column = column.not_null();
        }
        Ok(column)
    }
}
