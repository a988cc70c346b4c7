use super::{render_type, TsEmitter};
use crate::analysis::{closure_body_contains_await, is_trivially_pure, rewrite_filter_predicate};
use crate::backend::utils::{float_literal, quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::{Features, Scoped};
use crate::format_string::{FormatPlan, Segment};
use crate::registry::CallParts;
use crate::targets::{lookup_method, needs_parens, needs_parens_tight, paren_if, InputCheck, StmtEmitter};
use crate::Result;
use faber_ast::{
    BinaryOp, Closure, ClosureBody, Conversion, ConversionKind, Expr, FilterExpr, FilterKind,
    Literal, MathConstant, ObjectField, Radix, Span, StructureKind, TransformKind, UnaryOp,
};

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Eq => "===",
        BinaryOp::NotEq => "!==",
        other => other.c_symbol(),
    }
}

/// `??` may not share an unparenthesised operand with `&&` or `||`
fn mixes_coalesce(child: &Expr, parent: BinaryOp) -> bool {
    match child {
        Expr::Binary { op, .. } => match parent {
            BinaryOp::Coalesce => matches!(op, BinaryOp::And | BinaryOp::Or),
            BinaryOp::And | BinaryOp::Or => *op == BinaryOp::Coalesce,
            _ => false,
        },
        _ => false,
    }
}

fn escape_template(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out
}

impl TsEmitter {
    pub(super) fn list(&mut self, exprs: &[Expr]) -> Result<String> {
        Ok(self.each(exprs)?.join(", "))
    }

    fn each(&mut self, exprs: &[Expr]) -> Result<Vec<String>> {
        exprs.iter().map(|expr| self.expr(expr)).collect()
    }

    fn postfix(&mut self, expr: &Expr) -> Result<String> {
        let wrap = needs_parens_tight(expr) || matches!(expr, Expr::Object { .. });
        Ok(paren_if(self.expr(expr)?, wrap))
    }

    fn operand(&mut self, expr: &Expr, parent: BinaryOp, right: bool) -> Result<String> {
        let wrap = needs_parens(expr, parent, right) || mixes_coalesce(expr, parent);
        Ok(paren_if(self.expr(expr)?, wrap))
    }

    fn fields(&mut self, fields: &[ObjectField]) -> Result<Vec<String>> {
        fields
            .iter()
            .map(|field| Ok(format!("{}: {}", field.key, self.expr(&field.value)?)))
            .collect()
    }

    pub(super) fn expr(&mut self, expr: &Expr) -> Result<String> {
        Ok(match expr {
            Expr::Ident { name, .. } => sanitize_identifier(name, Target::TypeScript),
            Expr::SelfRef { .. } => "this".to_string(),
            Expr::Literal { value, .. } => match value {
                Literal::Integer(n) => n.to_string(),
                Literal::Float(f) => float_literal(*f),
                Literal::Text(text) => quote(text),
                Literal::Bool(b) => b.to_string(),
                Literal::Nil => "null".to_string(),
            },
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs = self.operand(lhs, *op, false)?;
                let rhs = self.operand(rhs, *op, true)?;
                format!("{} {} {}", lhs, symbol(*op), rhs)
            }
            Expr::Unary { op, operand, .. } => {
                let inner = paren_if(self.expr(operand)?, needs_parens_tight(operand));
                match op {
                    UnaryOp::Not => format!("!{inner}"),
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
                let cond = paren_if(
                    self.expr(cond)?,
                    matches!(**cond, Expr::Ternary { .. } | Expr::Assign { .. }),
                );
                format!("{} ? {} : {}", cond, self.expr(then)?, self.expr(otherwise)?)
            }
            Expr::Call {
                callee,
                args,
                receiver,
                span,
            } => match (receiver, callee.as_ref()) {
                (Some(kind), Expr::Member { object, name, .. }) => {
                    self.builtin_call(*kind, object, name, args, *span)?
                }
                _ => format!("{}({})", self.postfix(callee)?, self.list(args)?),
            },
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
                    format!("{{ {} }}", self.fields(fields)?.join(", "))
                }
            }
            Expr::Closure(closure) => self.closure(closure)?,
            Expr::New { class, args, .. } => format!("new {}({})", class, self.list(args)?),
            Expr::Construct {
                union,
                variant,
                fields,
                ..
            } => {
                let tag = union
                    .as_deref()
                    .and_then(|name| self.ctx.union(name))
                    .or_else(|| self.ctx.union_of_variant(variant))
                    .map(|info| info.tag_field.clone())
                    .unwrap_or_else(|| "tag".to_string());
                let mut parts = vec![format!("{}: {}", tag, quote(variant))];
                parts.extend(self.fields(fields)?);
                format!("{{ {} }}", parts.join(", "))
            }
            Expr::Await { operand, .. } => {
                let inner = paren_if(self.expr(operand)?, needs_parens_tight(operand));
                if self.ctx.in_generator() {
                    format!("yield {inner}")
                } else {
                    self.ctx.require(Features::ASYNC);
                    format!("await {inner}")
                }
            }
            Expr::Cast { expr, ty, .. } | Expr::Native { expr, ty, .. } => {
                format!("({} as {})", self.expr(expr)?, render_type(ty))
            }
            Expr::Convert(conversion) => self.conversion(conversion)?,
            Expr::Format { template, args, .. } => self.format(template, args)?,
            Expr::Range {
                start,
                end,
                inclusive,
                ..
            } => {
                let start = self.postfix(start)?;
                let end = self.postfix(end)?;
                let extra = if *inclusive { " + 1" } else { "" };
                format!("Array.from({{ length: {end} - {start}{extra} }}, (_, i) => {start} + i)")
            }
            Expr::Filter(filter) => self.filter(filter)?,
            Expr::Read { line, .. } => {
                self.ctx.require(Features::STDIN);
                if *line {
                    "__legeLineam()".to_string()
                } else {
                    "__lege()".to_string()
                }
            }
            Expr::Constant { constant, .. } => {
                self.ctx.require(Features::MATH_CONSTANTS);
                match constant {
                    MathConstant::Pi => "Math.PI".to_string(),
                    MathConstant::Tau => "(2 * Math.PI)".to_string(),
                    MathConstant::Euler => "Math.E".to_string(),
                }
            }
        })
    }

    fn builtin_call(
        &mut self,
        kind: StructureKind,
        object: &Expr,
        name: &str,
        args: &[Expr],
        span: Span,
    ) -> Result<String> {
        let registry = self.registry;
        let lookup = lookup_method(registry, kind, name, span)?;
        let receiver = self.postfix(object)?;
        let args = self.each(args)?;
        Ok(registry.render(&lookup, &CallParts::new(&receiver, &args)))
    }

    fn closure(&mut self, closure: &Closure) -> Result<String> {
        let is_async = closure.is_async || closure_body_contains_await(&closure.body);
        let params = self.params(&closure.params)?;
        let ret = closure
            .ret
            .as_ref()
            .map(|ty| match is_async {
                true => format!(": Promise<{}>", render_type(ty)),
                false => format!(": {}", render_type(ty)),
            })
            .unwrap_or_default();
        let body = self.in_function(is_async, false, |this| match &closure.body {
            ClosureBody::Expr(expr) => {
                let text = this.expr(expr)?;
                Ok(paren_if(text, matches!(**expr, Expr::Object { .. })))
            }
            ClosureBody::Block(block) => this.braced(&block.stmts),
        })?;
        let asynchronous = if is_async { "async " } else { "" };
        Ok(format!("{asynchronous}({params}){ret} => {body}"))
    }

    fn conversion(&mut self, conversion: &Conversion) -> Result<String> {
        let value = self.expr(&conversion.expr)?;
        let fallback = match &conversion.fallback {
            Some(fallback) => Some(self.expr(fallback)?),
            None => None,
        };

        let radix = conversion.radix.unwrap_or(Radix::Dec);
        let parse = |subject: &str| match conversion.kind {
            ConversionKind::Float => format!("parseFloat({subject})"),
            _ => format!("parseInt({subject}, {})", radix.base()),
        };

        match conversion.kind {
            ConversionKind::Text => Ok(match fallback {
                Some(fallback) => format!("String({value} ?? {fallback})"),
                None => format!("String({value})"),
            }),
            ConversionKind::Bool => Ok(match fallback {
                Some(fallback) => format!("Boolean({value} ?? {fallback})"),
                None => format!("Boolean({value})"),
            }),
            ConversionKind::Integer | ConversionKind::Float => {
                let Some(fallback) = fallback else {
                    return Ok(parse(&value));
                };
                let pure = is_trivially_pure(&conversion.expr);
                let subject = if pure {
                    value.clone()
                } else {
                    self.ctx.fresh_temp("c")
                };
                let guard = match InputCheck::for_conversion(conversion.kind, radix) {
                    InputCheck::DigitsOrPoint => format!("/^[\\d.]+$/.test({subject})"),
                    InputCheck::Digits => format!("/^\\d+$/.test({subject})"),
                    InputCheck::NonEmpty => format!("{subject}.length > 0"),
                };
                let guarded = format!("({} ? {} : {})", guard, parse(&subject), fallback);
                if pure {
                    Ok(guarded)
                } else {
                    Ok(format!("(({subject}) => {guarded})({value})"))
                }
            }
        }
    }

    /// Template literal; arguments needing a single evaluation go through an arrow
    fn format(&mut self, template: &str, args: &[Expr]) -> Result<String> {
        self.ctx.require(Features::FORMAT);
        let plan = FormatPlan::new(template, args.len());
        let rendered = self.each(args)?;
        let bound = plan.bind(args, rendered, &mut self.ctx);

        let mut literal = String::from("`");
        for segment in &plan.segments {
            match segment {
                Segment::Text(text) => literal.push_str(&escape_template(text)),
                Segment::Arg(index) => {
                    literal.push_str(&format!("${{{}}}", bound.reference(*index)))
                }
                Segment::Missing(_) => literal.push_str("${undefined}"),
            }
        }
        literal.push('`');

        if bound.temps.is_empty() {
            return Ok(literal);
        }
        let names: Vec<&str> = bound.temps.iter().map(|t| t.name.as_str()).collect();
        let values: Vec<&str> = bound.temps.iter().map(|t| t.value.as_str()).collect();
        Ok(format!("(({}) => {})({})", names.join(", "), literal, values.join(", ")))
    }

    fn filter(&mut self, filter: &FilterExpr) -> Result<String> {
        let mut text = self.postfix(&filter.source)?;
        let element = sanitize_identifier(&filter.element, Target::TypeScript);

        if let Some(selection) = &filter.filter {
            let predicate = match &selection.kind {
                FilterKind::Condition(cond) => {
                    let rewritten = rewrite_filter_predicate(cond, &filter.element, &filter.outer);
                    let predicate = self.expr(&rewritten)?;
                    if selection.negated {
                        format!("!({predicate})")
                    } else {
                        predicate
                    }
                }
                FilterKind::Property(name) if selection.negated => format!("!{element}.{name}"),
                FilterKind::Property(name) => format!("{element}.{name}"),
            };
            text = format!("{text}.filter(({element}) => {predicate})");
        }

        for transform in &filter.transforms {
            let count = match &transform.arg {
                Some(arg) => self.postfix(arg)?,
                None => "1".to_string(),
            };
            match transform.kind {
                TransformKind::First => text.push_str(&format!(".slice(0, {count})")),
                TransformKind::Last => text.push_str(&format!(".slice(-{count})")),
                TransformKind::Sum => text.push_str(".reduce((a, b) => a + b, 0)"),
            }
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::super::TypeScriptBackend;
    use crate::backend::{CodegenBackend, CodegenOptions};
    use faber_ast::{AstBuilder, BinaryOp, ConversionKind, Radix, Unit};

    fn emit_expr(expr: faber_ast::Expr) -> String {
        let b = AstBuilder::new();
        let unit = Unit::new("probatio", vec![b.fixum("v", None, expr)]);
        let code = TypeScriptBackend::new()
            .unwrap()
            .generate_unit(&unit, &CodegenOptions::default())
            .unwrap();
        code.trim_end()
            .rsplit('\n')
            .next()
            .unwrap()
            .trim_start_matches("const v = ")
            .trim_end_matches(';')
            .to_string()
    }

    #[test]
    fn test_indexed_format_reorders_interpolation() {
        let b = AstBuilder::new();
        let text = emit_expr(b.format("§1 before §0", vec![b.ident("a"), b.ident("b")]));
        assert_eq!(text, "`${b} before ${a}`");
    }

    #[test]
    fn test_missing_placeholder_renders_undefined() {
        let b = AstBuilder::new();
        let text = emit_expr(b.format("§0 and §3", vec![b.ident("a")]));
        assert_eq!(text, "`${a} and ${undefined}`");
    }

    #[test]
    fn test_repeated_impure_argument_evaluated_once() {
        let b = AstBuilder::new();
        let text = emit_expr(b.format("§0§0", vec![b.call(b.ident("next"), vec![])]));
        assert_eq!(text, "((__f0) => `${__f0}${__f0}`)(next())");
    }

    #[test]
    fn test_conversions() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.convert(b.text("42"), ConversionKind::Integer)),
            "parseInt(\"42\", 10)"
        );
        assert_eq!(
            emit_expr(b.conversion(b.text("ff"), ConversionKind::Integer, Some(Radix::Hex), None)),
            "parseInt(\"ff\", 16)"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Integer, None, Some(b.int(0)))),
            "(/^\\d+$/.test(s) ? parseInt(s, 10) : 0)"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Float, None, Some(b.float(0.5)))),
            "(/^[\\d.]+$/.test(s) ? parseFloat(s) : 0.5)"
        );
    }

    #[test]
    fn test_precedence_parentheses() {
        let b = AstBuilder::new();
        let sum = b.binary(BinaryOp::Add, b.ident("a"), b.ident("b"));
        assert_eq!(emit_expr(b.binary(BinaryOp::Mul, sum, b.ident("c"))), "(a + b) * c");
        let nested = b.binary(BinaryOp::Sub, b.ident("a"), b.binary(BinaryOp::Sub, b.ident("b"), b.ident("c")));
        assert_eq!(emit_expr(nested), "a - (b - c)");
    }

    #[test]
    fn test_closure_with_await_becomes_async() {
        let b = AstBuilder::new();
        let text = emit_expr(b.lambda(vec![b.param("x", "numerus")], b.cede(b.ident("x"))));
        assert_eq!(text, "async (x: number) => await x");
    }

    #[test]
    fn test_filter_rewrites_bare_fields() {
        let b = AstBuilder::new();
        let filter = b.filter_where(
            b.ident("homines"),
            b.binary(BinaryOp::Gt, b.ident("aetas"), b.ident("limen")),
            &["limen"],
        );
        assert_eq!(emit_expr(filter), "homines.filter((item) => item.aetas > limen)");
    }
}
