//! Best-effort evaluator for inline actions and HTTP parameter expressions.
//!
//! The language is a small JavaScript-flavoured subset: literals, arrays and
//! objects, member/index access, `! -`, arithmetic, comparisons, `&& ||`.
//! Identifiers resolve against the [`Scope`] first and then against state
//! keys. `$.key` and `$["key"]` read the store directly. Statements may assign
//! state keys (`key = expr`, `$.key += expr`, `$[name] -= expr`); that is the
//! only side effect available.

mod lexer;
mod parser;

use std::collections::BTreeMap;
use std::fmt;

use chumsky::{error::Rich, Parser};
use serde_json::{Map, Value};

use crate::codec;
use crate::error::{Result, RippleError};
use crate::store::Store;

use lexer::Token;
use parser::{AssignOp, BinaryOp, Expr, Statement, Target, UnaryOp, STORE};

/// Named values visible to an expression (`$event`, `$target`, ...).
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: BTreeMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.vars.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

fn describe<T: fmt::Display>(errors: Vec<Rich<'_, T>>) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    lexer::lexer()
        .parse(src)
        .into_result()
        .map_err(|errors| RippleError::eval(src, describe(errors)))
}

/// Evaluate a single expression. State keys are readable when `store` is
/// given.
pub fn evaluate(src: &str, scope: &Scope, store: Option<&dyn Store>) -> Result<Value> {
    let tokens = tokenize(src)?;
    let expr = parser::expression()
        .parse(tokens.as_slice())
        .into_result()
        .map_err(|errors| RippleError::eval(src, describe(errors)))?;
    Evaluator { scope, store }
        .eval(&expr)
        .map_err(|e| RippleError::eval(src, e))
}

/// Run `;`-separated statements, assigning state keys through `store`.
pub fn run(src: &str, scope: &Scope, store: &dyn Store) -> Result<()> {
    let tokens = tokenize(src)?;
    let statements = parser::statements()
        .parse(tokens.as_slice())
        .into_result()
        .map_err(|errors| RippleError::eval(src, describe(errors)))?;

    let evaluator = Evaluator {
        scope,
        store: Some(store),
    };
    for statement in &statements {
        evaluator
            .execute(statement, store)
            .map_err(|e| RippleError::eval(src, e))?;
    }
    Ok(())
}

struct Evaluator<'a> {
    scope: &'a Scope,
    store: Option<&'a dyn Store>,
}

impl Evaluator<'_> {
    fn execute(&self, statement: &Statement, store: &dyn Store) -> std::result::Result<(), String> {
        match statement {
            Statement::Expr(expr) => {
                self.eval(expr)?;
            }
            Statement::Assign { target, op, value } => {
                let key = match target {
                    Target::Key(key) => key.clone(),
                    Target::Computed(expr) => state_key(&self.eval(expr)?)?,
                };
                let rhs = self.eval(value)?;
                let current = || store.get(&key).unwrap_or(Value::Null);
                let next = match op {
                    AssignOp::Set => rhs,
                    AssignOp::Add => add(&current(), &rhs),
                    AssignOp::Sub => arithmetic(BinaryOp::Sub, &current(), &rhs),
                };
                store.set(&key, next);
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr) -> std::result::Result<Value, String> {
        Ok(match expr {
            Expr::Literal(value) => value.clone(),
            Expr::Ident(name) => self.resolve(name)?,
            Expr::Member(object, field) if object.is_store() => self.read_state(field)?,
            Expr::Index(object, index) if object.is_store() => {
                let key = state_key(&self.eval(index)?)?;
                self.read_state(&key)?
            }
            Expr::Member(object, field) => member(&self.eval(object)?, field),
            Expr::Index(object, index) => {
                let object = self.eval(object)?;
                match self.eval(index)? {
                    Value::Number(n) => n
                        .as_u64()
                        .and_then(|i| object.get(i as usize).cloned())
                        .unwrap_or(Value::Null),
                    Value::String(key) => member(&object, &key),
                    _ => Value::Null,
                }
            }
            Expr::Unary(UnaryOp::Not, operand) => Value::Bool(!codec::truthy(&self.eval(operand)?)),
            Expr::Unary(UnaryOp::Neg, operand) => codec::number(-to_number(&self.eval(operand)?)),
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let left = self.eval(lhs)?;
                if codec::truthy(&left) {
                    self.eval(rhs)?
                } else {
                    left
                }
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let left = self.eval(lhs)?;
                if codec::truthy(&left) {
                    left
                } else {
                    self.eval(rhs)?
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                match op {
                    BinaryOp::Eq => Value::Bool(loose_eq(&left, &right)),
                    BinaryOp::Ne => Value::Bool(!loose_eq(&left, &right)),
                    BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                        Value::Bool(compare(*op, &left, &right))
                    }
                    BinaryOp::Add => add(&left, &right),
                    _ => arithmetic(*op, &left, &right),
                }
            }
            Expr::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Expr::Object(fields) => {
                let mut map = Map::new();
                for (key, value) in fields {
                    map.insert(key.clone(), self.eval(value)?);
                }
                Value::Object(map)
            }
        })
    }

    /// Live read through the store handle; missing keys read as null.
    fn read_state(&self, key: &str) -> std::result::Result<Value, String> {
        match (self.store, self.scope.get(STORE)) {
            (Some(store), _) => Ok(store.get(key).unwrap_or(Value::Null)),
            (None, Some(state)) => Ok(member(state, key)),
            (None, None) => Err(format!("`{STORE}` is not defined")),
        }
    }

    fn resolve(&self, name: &str) -> std::result::Result<Value, String> {
        if let Some(value) = self.scope.get(name) {
            return Ok(value.clone());
        }
        self.store
            .and_then(|store| store.get(name))
            .ok_or_else(|| format!("`{name}` is not defined"))
    }
}

fn state_key(value: &Value) -> std::result::Result<String, String> {
    match value {
        Value::String(key) => Ok(key.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(format!("`{}` is not a state key", codec::encode(other))),
    }
}

fn member(object: &Value, field: &str) -> Value {
    match (object, field) {
        (Value::String(s), "length") => Value::from(s.chars().count()),
        (Value::Array(items), "length") => Value::from(items.len()),
        (Value::Object(map), _) => map.get(field).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn add(left: &Value, right: &Value) -> Value {
    if left.is_string() || right.is_string() {
        let mut joined = codec::display(left);
        joined.push_str(&codec::display(right));
        return Value::String(joined);
    }
    codec::number(to_number(left) + to_number(right))
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let (l, r) = (to_number(left), to_number(right));
    codec::number(match op {
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => l / r,
        BinaryOp::Rem => l % r,
        _ => f64::NAN,
    })
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            to_number(left) == to_number(right)
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        _ => to_number(left).partial_cmp(&to_number(right)),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore(RefCell<HashMap<String, Value>>);

    impl Store for MapStore {
        fn get(&self, key: &str) -> Option<Value> {
            self.0.borrow().get(key).cloned()
        }

        fn set(&self, key: &str, value: Value) {
            self.0.borrow_mut().insert(key.to_string(), value);
        }
    }

    #[test]
    fn evaluates_scope_references() {
        let scope = Scope::new()
            .with("$value", json!("Ada"))
            .with("$target", json!({"value": "Ada", "checked": false}));
        assert_eq!(
            evaluate(r#"{name: $value, "ok": !$target.checked}"#, &scope, None).unwrap(),
            json!({"name": "Ada", "ok": true})
        );
    }

    #[test]
    fn arithmetic_and_concatenation() {
        let scope = Scope::new();
        assert_eq!(evaluate("1 + 2 * 3", &scope, None).unwrap(), json!(7));
        assert_eq!(evaluate("7 / 2", &scope, None).unwrap(), json!(3.5));
        assert_eq!(evaluate("'n=' + 4", &scope, None).unwrap(), json!("n=4"));
        assert_eq!(evaluate("[1, 2][1] >= 2 && 'yes'", &scope, None).unwrap(), json!("yes"));
        assert_eq!(evaluate("'5' == 5", &scope, None).unwrap(), json!(true));
    }

    #[test]
    fn unknown_identifiers_fail() {
        let err = evaluate("missing + 1", &Scope::new(), None).unwrap_err();
        assert!(matches!(err, RippleError::Eval { .. }));
    }

    #[test]
    fn statements_assign_state() {
        let store = MapStore::default();
        store.set("count", json!(1));
        run("count = count + 1; count += 10; label = 'n' + count", &Scope::new(), &store).unwrap();
        assert_eq!(store.get("count"), Some(json!(12)));
        assert_eq!(store.get("label"), Some(json!("n12")));
    }

    #[test]
    fn store_handle_reads_and_writes_live() {
        let store = MapStore::default();
        store.set("count", json!(0));
        // Stale view of the store; member access must bypass it.
        let scope = Scope::new().with("$", json!({"count": 0}));
        run(
            r#"$.count = $.count + 1; $["count"] += 1; copy = $.count; $['other'] = $.missing"#,
            &scope,
            &store,
        )
        .unwrap();
        assert_eq!(store.get("count"), Some(json!(2)));
        assert_eq!(store.get("copy"), Some(json!(2)));
        assert_eq!(store.get("other"), Some(Value::Null));
    }

    #[test]
    fn computed_keys_assign_state() {
        let store = MapStore::default();
        let scope = Scope::new().with("$value", json!("theme"));
        run("$[$value] = 'dark'", &scope, &store).unwrap();
        assert_eq!(store.get("theme"), Some(json!("dark")));
        assert!(run("$[$missing] = 1", &Scope::new(), &store).is_err());
        assert!(run("$[[1]] = 1", &Scope::new(), &store).is_err());
    }

    #[test]
    fn store_handle_falls_back_to_scope_without_store() {
        let scope = Scope::new().with("$", json!({"count": 3}));
        assert_eq!(evaluate("$.count * 2", &scope, None).unwrap(), json!(6));
        assert!(evaluate("$.count", &Scope::new(), None).is_err());
    }

    #[test]
    fn scope_names_are_read_only() {
        let store = MapStore::default();
        let scope = Scope::new().with("$value", json!(1));
        assert!(run("$value = 2", &scope, &store).is_err());
    }
}
