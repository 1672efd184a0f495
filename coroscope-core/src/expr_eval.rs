//! 式評価
//!
//! `print` コマンドで使う、変数・フィールド・デリファレンスだけの小さな式です。

use crate::errors::CommandError;
use coroscope_target::{PhysicalFrame, ValueAccessor};

/// 式の抽象構文木
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// 変数名: `x`
    Variable(String),
    /// フィールドアクセス: `obj.field`
    FieldAccess {
        base: Box<Expression>,
        field: String,
    },
    /// デリファレンス: `*ptr`（`ptr->field` は `(*ptr).field`）
    Deref(Box<Expression>),
}

/// 式評価器
pub struct ExpressionEvaluator<'a, H> {
    host: &'a H,
    frame: &'a PhysicalFrame,
}

impl<'a, H: ValueAccessor> ExpressionEvaluator<'a, H> {
    /// フレームを指定して式評価器を作成する
    pub fn new(host: &'a H, frame: &'a PhysicalFrame) -> Self {
        Self { host, frame }
    }

    /// 式を評価する
    pub fn evaluate(&self, expr: &Expression) -> Result<H::Value, CommandError> {
        match expr {
            Expression::Variable(name) => Ok(self.host.frame_variable(self.frame, name)?),
            Expression::FieldAccess { base, field } => {
                let base = self.evaluate(base)?;
                Ok(self.host.read_field(&base, field)?)
            }
            Expression::Deref(inner) => {
                let pointer = self.evaluate(inner)?;
                Ok(self.host.dereference(&pointer)?)
            }
        }
    }
}

/// 式をパースする
///
/// 最後の `.` または `->` で分割するので、`a.b->c` は `(*(a.b)).c` になります。
pub fn parse_expression(input: &str) -> Result<Expression, CommandError> {
    let input = input.trim();
    let invalid = || CommandError::InvalidExpression(input.to_string());

    if input.is_empty() {
        return Err(invalid());
    }

    let dot = input.rfind('.').map(|pos| (pos, 1));
    let arrow = input.rfind("->").map(|pos| (pos, 2));
    if let Some((pos, len)) = dot.max(arrow) {
        let field = input[pos + len..].trim();
        if !is_identifier(field) {
            return Err(invalid());
        }
        let mut base = parse_expression(&input[..pos])?;
        if len == 2 {
            base = Expression::Deref(Box::new(base));
        }
        return Ok(Expression::FieldAccess {
            base: Box::new(base),
            field: field.to_string(),
        });
    }

    if let Some(rest) = input.strip_prefix('*') {
        return Ok(Expression::Deref(Box::new(parse_expression(rest)?)));
    }

    if is_identifier(input) {
        Ok(Expression::Variable(input.to_string()))
    } else {
        Err(invalid())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expression> {
        Box::new(Expression::Variable(name.to_string()))
    }

    #[test]
    fn test_parse_variable() {
        let expr = parse_expression("ex").unwrap();
        assert_eq!(expr, Expression::Variable("ex".to_string()));
    }

    #[test]
    fn test_parse_nested_field_access() {
        let expr = parse_expression("self.socket.executor_").unwrap();
        assert_eq!(
            expr,
            Expression::FieldAccess {
                base: Box::new(Expression::FieldAccess {
                    base: var("self"),
                    field: "socket".to_string(),
                }),
                field: "executor_".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_arrow_and_deref() {
        let expr = parse_expression("this->caller_").unwrap();
        assert_eq!(
            expr,
            Expression::FieldAccess {
                base: Box::new(Expression::Deref(var("this"))),
                field: "caller_".to_string(),
            }
        );

        assert_eq!(parse_expression("*this").unwrap(), Expression::Deref(var("this")));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_expression("").is_err());
        assert!(parse_expression("a.").is_err());
        assert!(parse_expression("1abc").is_err());
        assert!(parse_expression("arr[0]").is_err());
    }
}
