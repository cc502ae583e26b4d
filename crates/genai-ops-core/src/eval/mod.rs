//! Expression evaluation against an [`EvaluationContext`].
//!
//! References to namespace members that do not exist yet evaluate to
//! [`DynamicValue::Unknown`] instead of failing, and every strict operation
//! propagates `Unknown`. That lets the resolver retry a declaration once its
//! dependencies have landed. Genuine type errors surface as [`EvalError`].

pub mod context;
pub mod functions;
pub mod references;

use std::collections::BTreeMap;

use hcl::expr::{
    BinaryOperator, Conditional, Expression, ForExpr, FuncCall, ObjectKey, Operation,
    TemplateExpr, Traversal, TraversalOperator, UnaryOperator,
};
use hcl::template::{Element, Template};

use crate::error::{EvalError, EvalResult};
use crate::value::{DynamicValue, ValueMap};

pub use context::{DataSourceRef, EvaluationContext, Namespace, EXECUTION_TARGET};
pub use functions::{BuiltinFn, FunctionRegistry};
pub use references::{free_references, Reference};

/// Evaluate `expr` in `ctx` with the given function library.
pub fn evaluate(
    expr: &Expression,
    ctx: &EvaluationContext,
    functions: &FunctionRegistry,
) -> EvalResult<DynamicValue> {
    Evaluator::new(ctx, functions).eval(expr)
}

/// Tree-walking evaluator. Holds the iterator bindings of enclosing `for`
/// expressions; everything else comes from the context.
struct Evaluator<'a> {
    ctx: &'a EvaluationContext,
    functions: &'a FunctionRegistry,
    bindings: Vec<(String, DynamicValue)>,
}

impl<'a> Evaluator<'a> {
    fn new(ctx: &'a EvaluationContext, functions: &'a FunctionRegistry) -> Self {
        Self {
            ctx,
            functions,
            bindings: Vec::new(),
        }
    }

    fn eval(&mut self, expr: &Expression) -> EvalResult<DynamicValue> {
        match expr {
            Expression::Null => Ok(DynamicValue::Null),
            Expression::Bool(b) => Ok(DynamicValue::Bool(*b)),
            Expression::Number(n) => Ok(DynamicValue::Number(n.as_f64().unwrap_or_default())),
            Expression::String(s) => Ok(DynamicValue::String(s.clone())),
            Expression::Array(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<EvalResult<Vec<_>>>()
                .map(DynamicValue::List),
            Expression::Object(members) => {
                let mut out = ValueMap::new();
                for (key, value) in members.iter() {
                    let key = match key {
                        ObjectKey::Identifier(ident) => ident.as_str().to_string(),
                        ObjectKey::Expression(key_expr) => {
                            let key = self.eval(key_expr)?;
                            if key.is_unknown() {
                                return Ok(DynamicValue::Unknown);
                            }
                            key.to_template_string().ok_or(EvalError::TypeMismatch {
                                expected: "string object key",
                                found: key.type_name(),
                            })?
                        }
                        #[allow(unreachable_patterns)]
                        _ => return Err(EvalError::Unsupported("object key".to_string())),
                    };
                    let value = self.eval(value)?;
                    out.insert(key, value);
                }
                Ok(DynamicValue::Object(out))
            }
            Expression::TemplateExpr(template) => self.eval_template(template),
            Expression::Variable(var) => Ok(self.variable(var.as_str())),
            Expression::Traversal(traversal) => self.eval_traversal(traversal),
            Expression::FuncCall(call) => self.eval_call(call),
            Expression::Parenthesis(inner) => self.eval(inner),
            Expression::Conditional(cond) => self.eval_conditional(cond),
            Expression::Operation(op) => self.eval_operation(op),
            Expression::ForExpr(for_expr) => self.eval_for(for_expr),
            #[allow(unreachable_patterns)]
            _ => Err(EvalError::Unsupported("expression kind".to_string())),
        }
    }

    fn binding(&self, name: &str) -> Option<&DynamicValue> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    fn variable(&self, name: &str) -> DynamicValue {
        if let Some(value) = self.binding(name) {
            return value.clone();
        }
        match Namespace::from_root(name) {
            Some(ns) => DynamicValue::Object(self.ctx.namespace(ns).clone()),
            None => DynamicValue::Unknown,
        }
    }

    fn eval_template(&mut self, expr: &TemplateExpr) -> EvalResult<DynamicValue> {
        let template =
            Template::from_expr(expr).map_err(|e| EvalError::Unsupported(e.to_string()))?;
        let mut out = String::new();
        let mut unknown = false;
        for element in template.elements() {
            match element {
                Element::Literal(literal) => out.push_str(literal),
                Element::Interpolation(interpolation) => {
                    let value = self.eval(&interpolation.expr)?;
                    if !value.is_wholly_known() {
                        unknown = true;
                        continue;
                    }
                    let rendered = value.to_template_string().ok_or(EvalError::TypeMismatch {
                        expected: "string",
                        found: value.type_name(),
                    })?;
                    out.push_str(&rendered);
                }
                _ => {
                    return Err(EvalError::Unsupported(
                        "template directives".to_string(),
                    ))
                }
            }
        }
        if unknown {
            Ok(DynamicValue::Unknown)
        } else {
            Ok(DynamicValue::String(out))
        }
    }

    fn eval_traversal(&mut self, traversal: &Traversal) -> EvalResult<DynamicValue> {
        let operators = traversal.operators.as_slice();

        // `local.x`, `var.x`, `data.x`: a missing member is pending, not an error.
        if let Expression::Variable(var) = &traversal.expr {
            if self.binding(var.as_str()).is_none() {
                if let Some(ns) = Namespace::from_root(var.as_str()) {
                    if let Some(TraversalOperator::GetAttr(member)) = operators.first() {
                        let root = self
                            .ctx
                            .lookup(ns, member.as_str())
                            .cloned()
                            .unwrap_or(DynamicValue::Unknown);
                        return self.apply_operators(root, &operators[1..]);
                    }
                }
            }
        }

        let root = self.eval(&traversal.expr)?;
        self.apply_operators(root, operators)
    }

    fn apply_operators(
        &mut self,
        mut value: DynamicValue,
        operators: &[TraversalOperator],
    ) -> EvalResult<DynamicValue> {
        let mut i = 0;
        while i < operators.len() {
            if value.is_unknown() {
                return Ok(DynamicValue::Unknown);
            }
            value = match &operators[i] {
                TraversalOperator::GetAttr(name) => get_attr(value, name.as_str())?,
                TraversalOperator::Index(index_expr) => {
                    let index = self.eval(index_expr)?;
                    if !index.is_wholly_known() {
                        return Ok(DynamicValue::Unknown);
                    }
                    index_value(value, &index)?
                }
                TraversalOperator::LegacyIndex(index) => {
                    index_value(value, &DynamicValue::Number(*index as f64))?
                }
                TraversalOperator::AttrSplat => {
                    // Only the attribute accesses directly after `.*` apply per element.
                    let run = operators[i + 1..]
                        .iter()
                        .take_while(|op| matches!(op, TraversalOperator::GetAttr(_)))
                        .count();
                    let per_element = &operators[i + 1..i + 1 + run];
                    let mut out = Vec::new();
                    for item in splat_items(value) {
                        out.push(self.apply_operators(item, per_element)?);
                    }
                    i += run;
                    DynamicValue::List(out)
                }
                TraversalOperator::FullSplat => {
                    let rest = &operators[i + 1..];
                    let mut out = Vec::new();
                    for item in splat_items(value) {
                        out.push(self.apply_operators(item, rest)?);
                    }
                    return Ok(DynamicValue::List(out));
                }
                #[allow(unreachable_patterns)]
                _ => return Err(EvalError::Unsupported("traversal operator".to_string())),
            };
            i += 1;
        }
        Ok(value)
    }

    fn eval_call(&mut self, call: &FuncCall) -> EvalResult<DynamicValue> {
        let name = call.name.to_string();
        if !self.functions.contains(&name) {
            return Err(EvalError::UnknownFunction(name));
        }

        let mut args = call
            .args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<EvalResult<Vec<_>>>()?;

        if call.expand_final {
            match args.pop() {
                Some(DynamicValue::List(items)) => args.extend(items),
                Some(DynamicValue::Unknown) => return Ok(DynamicValue::Unknown),
                Some(other) => {
                    return Err(EvalError::TypeMismatch {
                        expected: "list for `...` expansion",
                        found: other.type_name(),
                    })
                }
                None => {}
            }
        }

        if args.iter().any(|arg| !arg.is_wholly_known()) {
            return Ok(DynamicValue::Unknown);
        }
        self.functions.call(&name, &args)
    }

    fn eval_conditional(&mut self, cond: &Conditional) -> EvalResult<DynamicValue> {
        match self.eval(&cond.cond_expr)? {
            DynamicValue::Bool(true) => self.eval(&cond.true_expr),
            DynamicValue::Bool(false) => self.eval(&cond.false_expr),
            DynamicValue::Unknown => Ok(DynamicValue::Unknown),
            other => Err(EvalError::TypeMismatch {
                expected: "bool",
                found: other.type_name(),
            }),
        }
    }

    fn eval_operation(&mut self, op: &Operation) -> EvalResult<DynamicValue> {
        match op {
            Operation::Unary(unary) => {
                let operand = self.eval(&unary.expr)?;
                if !operand.is_wholly_known() {
                    return Ok(DynamicValue::Unknown);
                }
                match unary.operator {
                    UnaryOperator::Neg => Ok(DynamicValue::Number(-number_operand(&operand)?)),
                    UnaryOperator::Not => Ok(DynamicValue::Bool(!bool_operand(&operand)?)),
                    #[allow(unreachable_patterns)]
                    _ => Err(EvalError::Unsupported("unary operator".to_string())),
                }
            }
            Operation::Binary(binary) => {
                let lhs = self.eval(&binary.lhs_expr)?;
                let rhs = self.eval(&binary.rhs_expr)?;
                if !lhs.is_wholly_known() || !rhs.is_wholly_known() {
                    return Ok(DynamicValue::Unknown);
                }
                binary_op(binary.operator, &lhs, &rhs)
            }
            #[allow(unreachable_patterns)]
            _ => Err(EvalError::Unsupported("operation".to_string())),
        }
    }

    fn eval_for(&mut self, for_expr: &ForExpr) -> EvalResult<DynamicValue> {
        let collection = self.eval(&for_expr.collection_expr)?;
        if !collection.is_wholly_known() {
            return Ok(DynamicValue::Unknown);
        }
        let pairs: Vec<(DynamicValue, DynamicValue)> = match collection {
            DynamicValue::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (DynamicValue::Number(i as f64), item))
                .collect(),
            DynamicValue::Object(members) => members
                .into_iter()
                .map(|(k, v)| (DynamicValue::String(k), v))
                .collect(),
            other => {
                return Err(EvalError::TypeMismatch {
                    expected: "list or object",
                    found: other.type_name(),
                })
            }
        };

        let mut list_out = Vec::new();
        let mut object_out: BTreeMap<String, DynamicValue> = BTreeMap::new();
        let mut groups: BTreeMap<String, Vec<DynamicValue>> = BTreeMap::new();

        for (key, value) in pairs {
            let depth = self.bindings.len();
            if let Some(key_var) = &for_expr.key_var {
                self.bindings.push((key_var.as_str().to_string(), key));
            }
            self.bindings
                .push((for_expr.value_var.as_str().to_string(), value));
            let item = self.eval_for_item(for_expr);
            self.bindings.truncate(depth);

            match item? {
                ForItem::Skip => {}
                ForItem::Unknown => return Ok(DynamicValue::Unknown),
                ForItem::Value(v) => list_out.push(v),
                ForItem::Entry(k, v) if for_expr.grouping => groups.entry(k).or_default().push(v),
                ForItem::Entry(k, v) => {
                    if object_out.contains_key(&k) {
                        return Err(EvalError::DuplicateKey(k));
                    }
                    object_out.insert(k, v);
                }
            }
        }

        if for_expr.key_expr.is_none() {
            Ok(DynamicValue::List(list_out))
        } else if for_expr.grouping {
            Ok(DynamicValue::Object(
                groups
                    .into_iter()
                    .map(|(k, vs)| (k, DynamicValue::List(vs)))
                    .collect(),
            ))
        } else {
            Ok(DynamicValue::Object(object_out))
        }
    }

    fn eval_for_item(&mut self, for_expr: &ForExpr) -> EvalResult<ForItem> {
        if let Some(cond_expr) = &for_expr.cond_expr {
            match self.eval(cond_expr)? {
                DynamicValue::Bool(true) => {}
                DynamicValue::Bool(false) => return Ok(ForItem::Skip),
                DynamicValue::Unknown => return Ok(ForItem::Unknown),
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "bool",
                        found: other.type_name(),
                    })
                }
            }
        }

        let value = self.eval(&for_expr.value_expr)?;
        match &for_expr.key_expr {
            None => Ok(ForItem::Value(value)),
            Some(key_expr) => {
                let key = self.eval(key_expr)?;
                if key.is_unknown() {
                    return Ok(ForItem::Unknown);
                }
                let key = key.to_template_string().ok_or(EvalError::TypeMismatch {
                    expected: "string key",
                    found: key.type_name(),
                })?;
                Ok(ForItem::Entry(key, value))
            }
        }
    }
}

enum ForItem {
    Skip,
    Unknown,
    Value(DynamicValue),
    Entry(String, DynamicValue),
}

fn splat_items(value: DynamicValue) -> Vec<DynamicValue> {
    match value {
        DynamicValue::List(items) => items,
        DynamicValue::Null => Vec::new(),
        other => vec![other],
    }
}

fn get_attr(value: DynamicValue, name: &str) -> EvalResult<DynamicValue> {
    match value {
        DynamicValue::Object(mut members) => members
            .remove(name)
            .ok_or_else(|| EvalError::MissingAttribute(name.to_string())),
        DynamicValue::Unknown => Ok(DynamicValue::Unknown),
        other => Err(EvalError::TypeMismatch {
            expected: "object",
            found: other.type_name(),
        }),
    }
}

fn index_value(value: DynamicValue, index: &DynamicValue) -> EvalResult<DynamicValue> {
    match (value, index) {
        (DynamicValue::List(mut items), DynamicValue::Number(n)) => {
            let len = items.len();
            if *n < 0.0 || n.fract() != 0.0 || *n as usize >= len {
                return Err(EvalError::IndexOutOfRange {
                    index: *n as i64,
                    len,
                });
            }
            Ok(items.swap_remove(*n as usize))
        }
        (DynamicValue::Object(mut members), key) => {
            let key = key.to_template_string().ok_or(EvalError::TypeMismatch {
                expected: "string key",
                found: key.type_name(),
            })?;
            members.remove(&key).ok_or(EvalError::MissingKey(key))
        }
        (DynamicValue::Unknown, _) => Ok(DynamicValue::Unknown),
        (other, _) => Err(EvalError::TypeMismatch {
            expected: "list or object",
            found: other.type_name(),
        }),
    }
}

fn number_operand(value: &DynamicValue) -> EvalResult<f64> {
    value.as_f64().ok_or(EvalError::TypeMismatch {
        expected: "number",
        found: value.type_name(),
    })
}

fn bool_operand(value: &DynamicValue) -> EvalResult<bool> {
    value.as_bool().ok_or(EvalError::TypeMismatch {
        expected: "bool",
        found: value.type_name(),
    })
}

fn binary_op(
    operator: BinaryOperator,
    lhs: &DynamicValue,
    rhs: &DynamicValue,
) -> EvalResult<DynamicValue> {
    use BinaryOperator::*;

    let value = match operator {
        Eq => DynamicValue::Bool(lhs == rhs),
        NotEq => DynamicValue::Bool(lhs != rhs),
        And => DynamicValue::Bool(bool_operand(lhs)? && bool_operand(rhs)?),
        Or => DynamicValue::Bool(bool_operand(lhs)? || bool_operand(rhs)?),
        Less => DynamicValue::Bool(number_operand(lhs)? < number_operand(rhs)?),
        LessEq => DynamicValue::Bool(number_operand(lhs)? <= number_operand(rhs)?),
        Greater => DynamicValue::Bool(number_operand(lhs)? > number_operand(rhs)?),
        GreaterEq => DynamicValue::Bool(number_operand(lhs)? >= number_operand(rhs)?),
        Plus => DynamicValue::Number(number_operand(lhs)? + number_operand(rhs)?),
        Minus => DynamicValue::Number(number_operand(lhs)? - number_operand(rhs)?),
        Mul => DynamicValue::Number(number_operand(lhs)? * number_operand(rhs)?),
        Div | Mod => {
            let divisor = number_operand(rhs)?;
            if divisor == 0.0 {
                return Err(EvalError::InvalidArgument {
                    function: "arithmetic",
                    reason: "division by zero".to_string(),
                });
            }
            let dividend = number_operand(lhs)?;
            if matches!(operator, Div) {
                DynamicValue::Number(dividend / divisor)
            } else {
                DynamicValue::Number(dividend % divisor)
            }
        }
        #[allow(unreachable_patterns)]
        _ => return Err(EvalError::Unsupported("binary operator".to_string())),
    };
    Ok(value)
}
