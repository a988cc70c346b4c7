use super::{render_type, FaberEmitter};
use crate::backend::utils::{float_literal, quote};
use crate::context::Scoped;
use crate::targets::{needs_parens, needs_parens_tight, paren_if, StmtEmitter};
use crate::Result;
use faber_ast::{
    BinaryOp, Closure, ClosureBody, Expr, FilterExpr, FilterKind, Literal, TransformKind, UnaryOp,
};

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::And => "et",
        BinaryOp::Or => "aut",
        BinaryOp::Coalesce => "vel",
        other => other.c_symbol(),
    }
}

fn literal(value: &Literal) -> String {
    match value {
        Literal::Integer(n) => n.to_string(),
        Literal::Float(f) => float_literal(*f),
        Literal::Text(text) => quote(text),
        Literal::Bool(true) => "verum".to_string(),
        Literal::Bool(false) => "falsum".to_string(),
        Literal::Nil => "nihil".to_string(),
    }
}

impl FaberEmitter {
    pub(super) fn list(&mut self, exprs: &[Expr]) -> Result<String> {
        let mut out = Vec::with_capacity(exprs.len());
        for expr in exprs {
            out.push(self.expr(expr)?);
        }
        Ok(out.join(", "))
    }

    /// Operand of a postfix access or a trailing keyword
    fn postfix(&mut self, expr: &Expr) -> Result<String> {
        let wrap = needs_parens_tight(expr) || matches!(expr, Expr::Convert(_) | Expr::Filter(_));
        Ok(paren_if(self.expr(expr)?, wrap))
    }

    fn operand(&mut self, expr: &Expr, parent: BinaryOp, right: bool) -> Result<String> {
        let wrap = needs_parens(expr, parent, right);
        Ok(paren_if(self.expr(expr)?, wrap))
    }

    pub(super) fn expr(&mut self, expr: &Expr) -> Result<String> {
        Ok(match expr {
            Expr::Ident { name, .. } => name.clone(),
            Expr::SelfRef { .. } => "ego".to_string(),
            Expr::Literal { value, .. } => literal(value),
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs = self.operand(lhs, *op, false)?;
                let rhs = self.operand(rhs, *op, true)?;
                format!("{} {} {}", lhs, symbol(*op), rhs)
            }
            Expr::Unary { op, operand, .. } => {
                let inner = paren_if(self.expr(operand)?, needs_parens_tight(operand));
                match op {
                    UnaryOp::Not => format!("non {inner}"),
                    UnaryOp::Neg => format!("-{inner}"),
                    UnaryOp::BitNot => format!("~{inner}"),
                }
            }
            Expr::Assign {
                op, target, value, ..
            } => format!("{} {} {}", self.expr(target)?, op.symbol(), self.expr(value)?),
            Expr::Ternary {
                cond,
                then,
                otherwise,
                ..
            } => {
                let cond = paren_if(self.expr(cond)?, matches!(**cond, Expr::Ternary { .. }));
                format!("{} sic {} secus {}", cond, self.expr(then)?, self.expr(otherwise)?)
            }
            Expr::Call { callee, args, .. } => {
                format!("{}({})", self.postfix(callee)?, self.list(args)?)
            }
            Expr::Member {
                object,
                name,
                optional,
                ..
            } => {
                let access = if *optional { "?." } else { "." };
                format!("{}{}{}", self.postfix(object)?, access, name)
            }
            Expr::Index { object, index, .. } => {
                format!("{}[{}]", self.postfix(object)?, self.expr(index)?)
            }
            Expr::Array { elements, .. } => format!("[{}]", self.list(elements)?),
            Expr::Object { fields, .. } => {
                if fields.is_empty() {
                    "{}".to_string()
                } else {
                    let mut parts = Vec::with_capacity(fields.len());
                    for field in fields {
                        parts.push(format!("{}: {}", field.key, self.expr(&field.value)?));
                    }
                    format!("{{ {} }}", parts.join(", "))
                }
            }
            Expr::Closure(closure) => self.closure(closure)?,
            Expr::New { class, args, .. } => format!("novum {}({})", class, self.list(args)?),
            Expr::Construct {
                variant, fields, ..
            } => {
                if fields.is_empty() {
                    format!("finge {variant}")
                } else {
                    let mut parts = Vec::with_capacity(fields.len());
                    for field in fields {
                        parts.push(format!("{}: {}", field.key, self.expr(&field.value)?));
                    }
                    format!("finge {} {{ {} }}", variant, parts.join(", "))
                }
            }
            Expr::Await { operand, .. } => format!("cede {}", self.postfix(operand)?),
            Expr::Cast { expr, ty, .. } => format!("{} qua {}", self.postfix(expr)?, render_type(ty)),
            Expr::Native { expr, ty, .. } => {
                format!("{} innatum {}", self.postfix(expr)?, render_type(ty))
            }
            Expr::Convert(conversion) => {
                let mut text = format!(
                    "{} {}",
                    self.postfix(&conversion.expr)?,
                    conversion.kind.keyword()
                );
                if let Some(radix) = conversion.radix {
                    text.push_str(&format!("<{}>", radix.name()));
                }
                if let Some(fallback) = &conversion.fallback {
                    text.push_str(" vel ");
                    text.push_str(&self.expr(fallback)?);
                }
                text
            }
            Expr::Format { template, args, .. } => {
                if args.is_empty() {
                    format!("scriptum({})", quote(template))
                } else {
                    format!("scriptum({}, {})", quote(template), self.list(args)?)
                }
            }
            Expr::Range {
                start,
                end,
                inclusive,
                ..
            } => {
                let keyword = if *inclusive { "usque" } else { "ante" };
                format!("{} {} {}", self.postfix(start)?, keyword, self.postfix(end)?)
            }
            Expr::Filter(filter) => self.filter(filter)?,
            Expr::Read { line, .. } => {
                if *line {
                    "lege lineam".to_string()
                } else {
                    "lege".to_string()
                }
            }
            Expr::Constant { constant, .. } => constant.name().to_string(),
        })
    }

    fn closure(&mut self, closure: &Closure) -> Result<String> {
        let mut head = String::new();
        if closure.is_async {
            head.push_str("asynca ");
        }
        head.push_str(&format!("({})", self.params(&closure.params)?));
        if let Some(ret) = &closure.ret {
            head.push_str(" -> ");
            head.push_str(&render_type(ret));
        }
        let body = self.in_function(closure.is_async, false, |this| match &closure.body {
            ClosureBody::Expr(expr) => this.expr(expr),
            ClosureBody::Block(block) => this.braced(&block.stmts),
        })?;
        Ok(format!("{head} => {body}"))
    }

    fn filter(&mut self, filter: &FilterExpr) -> Result<String> {
        let mut clauses = Vec::new();
        if let Some(selection) = &filter.filter {
            let negation = if selection.negated { "non " } else { "" };
            clauses.push(match &selection.kind {
                FilterKind::Condition(cond) => format!("{negation}ubi {}", self.expr(cond)?),
                FilterKind::Property(name) => format!("{negation}{name}"),
            });
        }
        for transform in &filter.transforms {
            let keyword = match transform.kind {
                TransformKind::First => "prima",
                TransformKind::Last => "ultima",
                TransformKind::Sum => "summa",
            };
            clauses.push(match &transform.arg {
                Some(arg) => format!("{keyword} {}", self.expr(arg)?),
                None => keyword.to_string(),
            });
        }
        let source = self.postfix(&filter.source)?;
        if clauses.is_empty() {
            Ok(format!("ab {source}"))
        } else {
            Ok(format!("ab {} {}", source, clauses.join(", ")))
        }
    }
}
