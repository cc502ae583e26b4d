//! Free-reference analysis over expression trees.

use std::fmt;

use hcl::expr::{Expression, ObjectKey, TraversalOperator};
use hcl::template::{Element, Template};
use serde::{Serialize, Serializer};

/// A variable reference such as `local.pools` or `var.region`.
///
/// `path` holds the leading attribute names of the traversal, so
/// `local.pools[0].shape` becomes root `local`, path `["pools"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub root: String,
    pub path: Vec<String>,
}

impl Reference {
    /// Name of the local declaration this reference waits on, if any.
    pub fn local_name(&self) -> Option<&str> {
        if self.root == "local" {
            self.path.first().map(String::as_str)
        } else {
            None
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.path {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Every free reference in `expr`, in source order.
///
/// Iterator variables bound by `for` expressions are not free inside the
/// body of that expression.
pub fn free_references(expr: &Expression) -> Vec<Reference> {
    let mut out = Vec::new();
    let mut bound = Vec::new();
    walk(expr, &mut bound, &mut out);
    out
}

fn walk(expr: &Expression, bound: &mut Vec<String>, out: &mut Vec<Reference>) {
    match expr {
        Expression::Variable(var) => {
            let name = var.as_str();
            if !bound.iter().any(|b| b == name) {
                out.push(Reference {
                    root: name.to_string(),
                    path: Vec::new(),
                });
            }
        }
        Expression::Traversal(traversal) => {
            match &traversal.expr {
                Expression::Variable(var) if !bound.iter().any(|b| b == var.as_str()) => {
                    let path = traversal
                        .operators
                        .iter()
                        .map_while(|op| match op {
                            TraversalOperator::GetAttr(ident) => Some(ident.as_str().to_string()),
                            _ => None,
                        })
                        .collect();
                    out.push(Reference {
                        root: var.as_str().to_string(),
                        path,
                    });
                }
                other => walk(other, bound, out),
            }
            for op in &traversal.operators {
                if let TraversalOperator::Index(index) = op {
                    walk(index, bound, out);
                }
            }
        }
        Expression::Array(items) => {
            for item in items {
                walk(item, bound, out);
            }
        }
        Expression::Object(members) => {
            for (key, value) in members.iter() {
                if let ObjectKey::Expression(key_expr) = key {
                    walk(key_expr, bound, out);
                }
                walk(value, bound, out);
            }
        }
        Expression::TemplateExpr(template_expr) => {
            if let Ok(template) = Template::from_expr(template_expr) {
                for element in template.elements() {
                    if let Element::Interpolation(interpolation) = element {
                        walk(&interpolation.expr, bound, out);
                    }
                }
            }
        }
        Expression::FuncCall(call) => {
            for arg in &call.args {
                walk(arg, bound, out);
            }
        }
        Expression::Parenthesis(inner) => walk(inner, bound, out),
        Expression::Conditional(cond) => {
            walk(&cond.cond_expr, bound, out);
            walk(&cond.true_expr, bound, out);
            walk(&cond.false_expr, bound, out);
        }
        Expression::Operation(op) => match op.as_ref() {
            hcl::expr::Operation::Unary(unary) => walk(&unary.expr, bound, out),
            hcl::expr::Operation::Binary(binary) => {
                walk(&binary.lhs_expr, bound, out);
                walk(&binary.rhs_expr, bound, out);
            }
            #[allow(unreachable_patterns)]
            _ => {}
        },
        Expression::ForExpr(for_expr) => {
            walk(&for_expr.collection_expr, bound, out);
            let depth = bound.len();
            if let Some(key_var) = &for_expr.key_var {
                bound.push(key_var.as_str().to_string());
            }
            bound.push(for_expr.value_var.as_str().to_string());
            if let Some(key_expr) = &for_expr.key_expr {
                walk(key_expr, bound, out);
            }
            walk(&for_expr.value_expr, bound, out);
            if let Some(cond_expr) = &for_expr.cond_expr {
                walk(cond_expr, bound, out);
            }
            bound.truncate(depth);
        }
        _ => {}
    }
}
