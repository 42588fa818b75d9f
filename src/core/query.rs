//! 列表查询：过滤表达式、排序子句与分页
//!
//! 过滤表达式示例：`IsPublished == true && Author == "admin"`、
//! `Title.Contains("rust") || !(DateCreated < "2024-01-01")`。
//! 排序子句示例：`DateCreated desc, Title`。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// 默认过滤表达式（不过滤）
pub const DEFAULT_FILTER: &str = "1 == 1";
/// 默认每页条数
pub const DEFAULT_TAKE: usize = 10;
/// 括号与取反的最大嵌套层数
pub const MAX_NESTING: usize = 64;

/// 查询错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("过滤表达式语法错误（位置 {position}）: {message}")]
    Syntax { position: usize, message: String },

    #[error("未知字段: {0}")]
    UnknownField(String),

    #[error("类型不匹配: {0}")]
    Type(String),

    #[error("排序子句无效: {0}")]
    Order(String),
}

/// 字段值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<Utc>),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// 可以被过滤和排序的实体
pub trait Filterable {
    /// 全部可用的小写字段名，解析时据此检查未知字段
    fn fields() -> &'static [&'static str]
    where
        Self: Sized;

    /// 按小写字段名取值，未知字段返回 None
    fn field(&self, name: &str) -> Option<Value>;
}

/// 列表查询参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    /// 取多少条，0 表示全部
    pub take: usize,
    /// 跳过多少条
    pub skip: usize,
    /// 过滤表达式
    pub filter: String,
    /// 排序子句，为空时使用实体的默认排序
    pub order: String,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            take: DEFAULT_TAKE,
            skip: 0,
            filter: DEFAULT_FILTER.to_string(),
            order: String::new(),
        }
    }
}

impl ListQuery {
    /// 不分页的查询
    pub fn all() -> Self {
        Self {
            take: 0,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filter = filter.to_string();
        self
    }

    pub fn with_order(mut self, order: &str) -> Self {
        self.order = order.to_string();
        self
    }

    pub fn page(mut self, skip: usize, take: usize) -> Self {
        self.skip = skip;
        self.take = take;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Cmp(CmpOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
    Dot,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Literal(Value),
    Field(String),
    Method {
        field: String,
        method: Method,
        arg: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Not(Box<Expr>),
    Compare(Operand, CmpOp, Operand),
    Truthy(Operand),
}

/// 解析后的过滤表达式
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    expr: Option<Expr>,
}

impl Filter {
    /// 解析过滤表达式，空字符串匹配全部
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Ok(Self { expr: None });
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.error("表达式结尾有多余内容"));
        }
        Ok(Self { expr: Some(expr) })
    }

    /// 检查表达式引用的字段都在 `known` 中
    pub fn check_fields(&self, known: &[&str]) -> Result<(), QueryError> {
        match &self.expr {
            Some(expr) => check_expr_fields(expr, known),
            None => Ok(()),
        }
    }

    /// 判断实体是否匹配
    pub fn matches(&self, item: &dyn Filterable) -> Result<bool, QueryError> {
        match &self.expr {
            Some(expr) => eval(expr, item),
            None => Ok(true),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, QueryError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let syntax = |position: usize, message: &str| QueryError::Syntax {
        position,
        message: message.to_string(),
    };

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => {
                tokens.push((start, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((start, Token::RParen));
                i += 1;
            }
            '.' => {
                tokens.push((start, Token::Dot));
                i += 1;
            }
            '=' => {
                i += if chars.get(i + 1) == Some(&'=') { 2 } else { 1 };
                tokens.push((start, Token::Cmp(CmpOp::Eq)));
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push((start, Token::Cmp(CmpOp::Ne)));
                    i += 2;
                } else {
                    tokens.push((start, Token::Not));
                    i += 1;
                }
            }
            '<' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push((start, Token::Cmp(CmpOp::Le)));
                    i += 2;
                }
                Some('>') => {
                    tokens.push((start, Token::Cmp(CmpOp::Ne)));
                    i += 2;
                }
                _ => {
                    tokens.push((start, Token::Cmp(CmpOp::Lt)));
                    i += 1;
                }
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push((start, Token::Cmp(CmpOp::Ge)));
                    i += 2;
                } else {
                    tokens.push((start, Token::Cmp(CmpOp::Gt)));
                    i += 1;
                }
            }
            '&' => {
                if chars.get(i + 1) != Some(&'&') {
                    return Err(syntax(start, "应为 &&"));
                }
                tokens.push((start, Token::And));
                i += 2;
            }
            '|' => {
                if chars.get(i + 1) != Some(&'|') {
                    return Err(syntax(start, "应为 ||"));
                }
                tokens.push((start, Token::Or));
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax(start, "字符串没有结束引号")),
                        Some('\\') => {
                            if let Some(next) = chars.get(i + 1) {
                                value.push(*next);
                                i += 2;
                            } else {
                                return Err(syntax(i, "转义字符不完整"));
                            }
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push((start, Token::Literal(Value::Str(value))));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit())) => {
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let literal = if text.contains('.') {
                    text.parse::<f64>()
                        .map(Value::Float)
                        .map_err(|_| syntax(start, "无效的数字"))?
                } else {
                    text.parse::<i64>()
                        .map(Value::Int)
                        .map_err(|_| syntax(start, "无效的数字"))?
                };
                tokens.push((start, Token::Literal(literal)));
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" => Token::Literal(Value::Null),
                    _ => Token::Ident(word),
                };
                tokens.push((start, token));
            }
            _ => return Err(syntax(start, &format!("无法识别的字符 '{}'", c))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: &str) -> QueryError {
        let position = self
            .tokens
            .get(self.pos)
            .map(|(p, _)| *p)
            .or_else(|| self.tokens.last().map(|(p, _)| *p + 1))
            .unwrap_or(0);
        QueryError::Syntax {
            position,
            message: message.to_string(),
        }
    }

    fn descend(&mut self) -> Result<(), QueryError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("表达式嵌套过深"));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, QueryError> {
        let mut terms = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        let mut terms = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.parse_unary()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::And(terms)
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, QueryError> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(Expr::Not(Box::new(inner)))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.parse_or()?;
                if self.next() != Some(Token::RParen) {
                    return Err(self.error("缺少右括号"));
                }
                self.depth -= 1;
                Ok(inner)
            }
            _ => {
                let left = self.parse_operand()?;
                if let Some(Token::Cmp(op)) = self.peek().cloned() {
                    self.pos += 1;
                    let right = self.parse_operand()?;
                    Ok(Expr::Compare(left, op, right))
                } else {
                    Ok(Expr::Truthy(left))
                }
            }
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, QueryError> {
        match self.next() {
            Some(Token::Literal(value)) => Ok(Operand::Literal(value)),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::Dot) {
                    return Ok(Operand::Field(name.to_ascii_lowercase()));
                }
                self.pos += 1;
                let method = match self.next() {
                    Some(Token::Ident(m)) => match m.to_ascii_lowercase().as_str() {
                        "contains" => Method::Contains,
                        "startswith" => Method::StartsWith,
                        "endswith" => Method::EndsWith,
                        _ => return Err(self.error(&format!("不支持的方法 {}", m))),
                    },
                    _ => return Err(self.error("应为方法名")),
                };
                if self.next() != Some(Token::LParen) {
                    return Err(self.error("方法调用缺少左括号"));
                }
                let arg = match self.next() {
                    Some(Token::Literal(value)) => value,
                    _ => return Err(self.error("方法参数必须是字面量")),
                };
                if self.next() != Some(Token::RParen) {
                    return Err(self.error("方法调用缺少右括号"));
                }
                Ok(Operand::Method {
                    field: name.to_ascii_lowercase(),
                    method,
                    arg,
                })
            }
            other => {
                if other.is_some() {
                    self.pos -= 1;
                }
                Err(self.error("应为字段名或字面量"))
            }
        }
    }
}

fn check_expr_fields(expr: &Expr, known: &[&str]) -> Result<(), QueryError> {
    match expr {
        Expr::Or(terms) | Expr::And(terms) => terms
            .iter()
            .try_for_each(|term| check_expr_fields(term, known)),
        Expr::Not(inner) => check_expr_fields(inner, known),
        Expr::Truthy(operand) => check_operand_field(operand, known),
        Expr::Compare(left, _, right) => {
            check_operand_field(left, known)?;
            check_operand_field(right, known)
        }
    }
}

fn check_operand_field(operand: &Operand, known: &[&str]) -> Result<(), QueryError> {
    match operand {
        Operand::Literal(_) => Ok(()),
        Operand::Field(name) | Operand::Method { field: name, .. } => {
            if known.contains(&name.as_str()) {
                Ok(())
            } else {
                Err(QueryError::UnknownField(name.clone()))
            }
        }
    }
}

fn field_value(item: &dyn Filterable, name: &str) -> Result<Value, QueryError> {
    item.field(name)
        .ok_or_else(|| QueryError::UnknownField(name.to_string()))
}

fn operand_value(operand: &Operand, item: &dyn Filterable) -> Result<Value, QueryError> {
    match operand {
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Field(name) => field_value(item, name),
        Operand::Method { field, method, arg } => {
            let haystack = match field_value(item, field)? {
                Value::Str(s) => s.to_lowercase(),
                Value::Null => return Ok(Value::Bool(false)),
                other => {
                    return Err(QueryError::Type(format!(
                        "字段 {} 不是字符串: {:?}",
                        field, other
                    )))
                }
            };
            let needle = match arg {
                Value::Str(s) => s.to_lowercase(),
                other => return Err(QueryError::Type(format!("方法参数不是字符串: {:?}", other))),
            };
            let result = match method {
                Method::Contains => haystack.contains(&needle),
                Method::StartsWith => haystack.starts_with(&needle),
                Method::EndsWith => haystack.ends_with(&needle),
            };
            Ok(Value::Bool(result))
        }
    }
}

fn eval(expr: &Expr, item: &dyn Filterable) -> Result<bool, QueryError> {
    match expr {
        Expr::Or(terms) => {
            for term in terms {
                if eval(term, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::And(terms) => {
            for term in terms {
                if !eval(term, item)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expr::Not(inner) => Ok(!eval(inner, item)?),
        Expr::Truthy(operand) => match operand_value(operand, item)? {
            Value::Bool(b) => Ok(b),
            other => Err(QueryError::Type(format!("不是布尔值: {:?}", other))),
        },
        Expr::Compare(left, op, right) => {
            let left = operand_value(left, item)?;
            let right = operand_value(right, item)?;
            compare(&left, *op, &right)
        }
    }
}

/// 把字符串解析为日期（RFC3339 或 YYYY-MM-DD）
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn compare(left: &Value, op: CmpOp, right: &Value) -> Result<bool, QueryError> {
    let ordering = match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Str(s)) => {
            let b = parse_date(s).ok_or_else(|| QueryError::Type(format!("无法解析日期: {}", s)))?;
            Some(a.cmp(&b))
        }
        (Value::Str(s), Value::Date(b)) => {
            let a = parse_date(s).ok_or_else(|| QueryError::Type(format!("无法解析日期: {}", s)))?;
            Some(a.cmp(b))
        }
        (a, b) => {
            return Err(QueryError::Type(format!("无法比较 {:?} 与 {:?}", a, b)));
        }
    };

    Ok(match ordering {
        // 与 null 比较：只有 != 成立
        None => op == CmpOp::Ne,
        Some(ord) => match op {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
        },
    })
}

/// 排序子句
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    pub field: String,
    pub descending: bool,
}

/// 解析排序子句
pub fn parse_order(source: &str) -> Result<Vec<OrderClause>, QueryError> {
    let mut clauses = Vec::new();
    for part in source.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let mut words = part.split_whitespace();
        let field = words
            .next()
            .ok_or_else(|| QueryError::Order(part.to_string()))?;
        if !field.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(QueryError::Order(part.to_string()));
        }
        let descending = match words.next().map(|w| w.to_ascii_lowercase()) {
            None => false,
            Some(w) if w == "asc" || w == "ascending" => false,
            Some(w) if w == "desc" || w == "descending" => true,
            Some(_) => return Err(QueryError::Order(part.to_string())),
        };
        if words.next().is_some() {
            return Err(QueryError::Order(part.to_string()));
        }
        clauses.push(OrderClause {
            field: field.to_ascii_lowercase(),
            descending,
        });
    }
    Ok(clauses)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Str(_) => 3,
        Value::Date(_) => 4,
    }
}

/// 排序用的全序比较：null 最小，字符串忽略大小写
fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Str(x), Value::Str(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// 过滤
pub fn filter_items<T: Filterable>(items: Vec<T>, filter: &str) -> Result<Vec<T>, QueryError> {
    let filter = Filter::parse(filter)?;
    filter.check_fields(T::fields())?;
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        if filter.matches(&item)? {
            kept.push(item);
        }
    }
    Ok(kept)
}

/// 稳定排序
pub fn order_items<T: Filterable>(items: Vec<T>, order: &str) -> Result<Vec<T>, QueryError> {
    let clauses = parse_order(order)?;
    if let Some(clause) = clauses.iter().find(|c| !T::fields().contains(&c.field.as_str())) {
        return Err(QueryError::UnknownField(clause.field.clone()));
    }
    if clauses.is_empty() {
        return Ok(items);
    }

    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let mut keys = Vec::with_capacity(clauses.len());
        for clause in &clauses {
            keys.push(field_value(&item, &clause.field)?);
        }
        keyed.push((keys, item));
    }

    keyed.sort_by(|(a, _), (b, _)| {
        for (i, clause) in clauses.iter().enumerate() {
            let ord = sort_cmp(&a[i], &b[i]);
            let ord = if clause.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

/// 分页，take 为 0 时返回全部剩余
pub fn paginate<T>(items: Vec<T>, skip: usize, take: usize) -> Vec<T> {
    let iter = items.into_iter().skip(skip);
    if take == 0 {
        iter.collect()
    } else {
        iter.take(take).collect()
    }
}

/// 依次执行过滤、排序、分页
pub fn apply<T: Filterable>(
    items: Vec<T>,
    query: &ListQuery,
    default_order: &str,
) -> Result<Vec<T>, QueryError> {
    let filtered = filter_items(items, &query.filter)?;
    let order = if query.order.trim().is_empty() {
        default_order
    } else {
        query.order.as_str()
    };
    let ordered = order_items(filtered, order)?;
    Ok(paginate(ordered, query.skip, query.take))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        title: &'static str,
        author: &'static str,
        published: bool,
        views: i64,
        created: DateTime<Utc>,
    }

    impl Filterable for Row {
        fn fields() -> &'static [&'static str] {
            &["title", "author", "ispublished", "views", "datecreated"]
        }

        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "title" => Some(self.title.into()),
                "author" => Some(self.author.into()),
                "ispublished" => Some(self.published.into()),
                "views" => Some(self.views.into()),
                "datecreated" => Some(self.created.into()),
                _ => None,
            }
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                title: "Rust ownership",
                author: "admin",
                published: true,
                views: 10,
                created: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            },
            Row {
                title: "Draft notes",
                author: "editor",
                published: false,
                views: 0,
                created: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            },
            Row {
                title: "Async rust",
                author: "admin",
                published: true,
                views: 42,
                created: Utc.with_ymd_and_hms(2023, 12, 24, 0, 0, 0).unwrap(),
            },
        ]
    }

    #[test]
    fn default_filter_matches_everything() {
        assert_eq!(filter_items(rows(), DEFAULT_FILTER).unwrap().len(), 3);
        assert_eq!(filter_items(rows(), "").unwrap().len(), 3);
    }

    #[test]
    fn combines_boolean_and_comparison_terms() {
        let found = filter_items(rows(), "IsPublished == true && Author == \"admin\" and Views > 20").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Async rust");

        let found = filter_items(rows(), "!IsPublished || views >= 42").unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn string_methods_ignore_case() {
        let found = filter_items(rows(), "Title.Contains('RUST')").unwrap();
        assert_eq!(found.len(), 2);
        let found = filter_items(rows(), "title.StartsWith(\"draft\")").unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn dates_compare_against_string_literals() {
        let found = filter_items(rows(), "DateCreated >= \"2024-01-01\"").unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn reports_unknown_fields_and_syntax_errors() {
        assert_eq!(
            filter_items(rows(), "Nope == 1").unwrap_err(),
            QueryError::UnknownField("nope".to_string())
        );
        assert!(matches!(
            Filter::parse("Title == ").unwrap_err(),
            QueryError::Syntax { .. }
        ));
        assert!(matches!(
            Filter::parse("(a == 1").unwrap_err(),
            QueryError::Syntax { .. }
        ));
        assert!(matches!(
            filter_items(rows(), "Title > 3").unwrap_err(),
            QueryError::Type(_)
        ));
    }

    #[test]
    fn orders_by_multiple_clauses_and_paginates() {
        let ordered = order_items(rows(), "Author, DateCreated desc").unwrap();
        let titles: Vec<_> = ordered.iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["Rust ownership", "Async rust", "Draft notes"]);

        let query = ListQuery::default().with_order("Views desc").page(1, 1);
        let page = apply(rows(), &query, "Title").unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Rust ownership");

        assert!(parse_order("Title sideways").is_err());
    }

    #[test]
    fn unknown_fields_fail_without_rows() {
        assert_eq!(
            filter_items(Vec::<Row>::new(), "NoSuchField == 1").unwrap_err(),
            QueryError::UnknownField("nosuchfield".to_string())
        );
        // 短路不会掩盖未知字段
        assert!(matches!(
            filter_items(rows(), "false && Nope == 1"),
            Err(QueryError::UnknownField(_))
        ));
        assert_eq!(
            order_items(Vec::<Row>::new(), "Bogus desc").unwrap_err(),
            QueryError::UnknownField("bogus".to_string())
        );
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let deep = format!("{}1 == 1{}", "(".repeat(50_000), ")".repeat(50_000));
        assert!(matches!(Filter::parse(&deep), Err(QueryError::Syntax { .. })));
        assert!(matches!(
            Filter::parse(&"!".repeat(50_000)),
            Err(QueryError::Syntax { .. })
        ));

        let nested = format!("{}IsPublished{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert_eq!(filter_items(rows(), &nested).unwrap().len(), 2);

        // 长的 || 链不会加深表达式树
        let chain = vec!["Views == 42"; 20_000].join(" || ");
        assert_eq!(filter_items(rows(), &chain).unwrap().len(), 1);
    }
}
