use super::PyEmitter;
use crate::analysis::{closure_body_contains_await, is_trivially_pure, rewrite_filter_predicate};
use crate::backend::utils::{float_literal, quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::{Features, Scoped};
use crate::format_string::{FormatPlan, Segment};
use crate::morphology::MethodFlags;
use crate::registry::CallParts;
use crate::targets::{lookup_method, needs_parens_tight, paren_if};
use crate::{CodegenError, Result};
use faber_ast::{
    BinaryOp, Closure, ClosureBody, Conversion, ConversionKind, Expr, FilterExpr, FilterKind,
    Literal, MathConstant, ObjectField, Radix, Span, Stmt, StructureKind, TransformKind, UnaryOp,
};

/// Python binding strength; `not` sits at 3, between `and` and comparisons
fn precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Gt
        | BinaryOp::Ge => 4,
        BinaryOp::BitOr => 5,
        BinaryOp::BitXor => 6,
        BinaryOp::BitAnd => 7,
        BinaryOp::Shl | BinaryOp::Shr => 8,
        BinaryOp::Add | BinaryOp::Sub => 9,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 10,
        // rendered as a parenthesised conditional
        BinaryOp::Coalesce => 12,
    }
}

fn is_comparison(op: BinaryOp) -> bool {
    precedence(op) == 4
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        other => other.c_symbol(),
    }
}

/// Comparisons chain in Python, so a comparison never appears bare under another
fn needs_parens(child: &Expr, parent: BinaryOp, right: bool) -> bool {
    match child {
        Expr::Binary { op, .. } if *op != BinaryOp::Coalesce => {
            let (child_prec, parent_prec) = (precedence(*op), precedence(parent));
            child_prec < parent_prec
                || (right && child_prec == parent_prec)
                || (is_comparison(*op) && is_comparison(parent))
        }
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => precedence(parent) > 3,
        Expr::Ternary { .. } | Expr::Assign { .. } | Expr::Closure(_) => true,
        _ => false,
    }
}

fn escape_fstring(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '{' => out.push_str("{{"),
            '}' => out.push_str("}}"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

impl PyEmitter {
    pub(super) fn list(&mut self, exprs: &[Expr]) -> Result<String> {
        Ok(self.each(exprs)?.join(", "))
    }

    fn each(&mut self, exprs: &[Expr]) -> Result<Vec<String>> {
        exprs.iter().map(|expr| self.expr(expr)).collect()
    }

    fn postfix(&mut self, expr: &Expr) -> Result<String> {
        let wrap = match expr {
            Expr::Binary {
                op: BinaryOp::Coalesce,
                ..
            }
            | Expr::Range { .. } => false,
            other => needs_parens_tight(other),
        };
        Ok(paren_if(self.expr(expr)?, wrap))
    }

    fn operand(&mut self, expr: &Expr, parent: BinaryOp, right: bool) -> Result<String> {
        let wrap = needs_parens(expr, parent, right);
        Ok(paren_if(self.expr(expr)?, wrap))
    }

    fn fields(&mut self, fields: &[ObjectField]) -> Result<Vec<String>> {
        fields
            .iter()
            .map(|field| Ok(format!("{}: {}", quote(&field.key), self.expr(&field.value)?)))
            .collect()
    }

    /// Subject text for an expression that is evaluated more than once.
    ///
    /// Returns the text of the first use and the text of later uses; an
    /// impure subject is bound with `:=` on its first use.
    fn reuse(&mut self, expr: &Expr) -> Result<(String, String)> {
        let text = self.expr(expr)?;
        if is_trivially_pure(expr) {
            return Ok((text.clone(), text));
        }
        let name = self.ctx.fresh_temp("v");
        Ok((format!("({name} := {text})"), name))
    }

    pub(super) fn expr(&mut self, expr: &Expr) -> Result<String> {
        Ok(match expr {
            Expr::Ident { name, .. } => sanitize_identifier(name, Target::Python),
            Expr::SelfRef { .. } => "self".to_string(),
            Expr::Literal { value, .. } => match value {
                Literal::Integer(n) => n.to_string(),
                Literal::Float(f) => float_literal(*f),
                Literal::Text(text) => quote(text),
                Literal::Bool(true) => "True".to_string(),
                Literal::Bool(false) => "False".to_string(),
                Literal::Nil => "None".to_string(),
            },
            Expr::Binary {
                op: BinaryOp::Coalesce,
                lhs,
                rhs,
                ..
            } => {
                let (first, later) = self.reuse(lhs)?;
                let fallback = self.expr(rhs)?;
                format!("({later} if {first} is not None else {fallback})")
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs = self.operand(lhs, *op, false)?;
                let rhs = self.operand(rhs, *op, true)?;
                format!("{} {} {}", lhs, symbol(*op), rhs)
            }
            Expr::Unary { op, operand, .. } => match op {
                UnaryOp::Not => {
                    let wrap = match operand.as_ref() {
                        Expr::Binary { op, .. } => precedence(*op) < 3,
                        other => matches!(
                            other,
                            Expr::Ternary { .. } | Expr::Assign { .. } | Expr::Closure(_)
                        ),
                    };
                    format!("not {}", paren_if(self.expr(operand)?, wrap))
                }
                UnaryOp::Neg => format!("-{}", self.postfix(operand)?),
                UnaryOp::BitNot => format!("~{}", self.postfix(operand)?),
            },
            Expr::Assign {
                op, target, value, ..
            } => format!("{} {} {}", self.expr(target)?, op.symbol(), self.expr(value)?),
            Expr::Ternary {
                cond,
                then,
                otherwise,
                ..
            } => {
                let nested = |e: &Expr| matches!(e, Expr::Ternary { .. } | Expr::Closure(_));
                let cond_text = paren_if(self.expr(cond)?, nested(cond));
                let then_text = paren_if(self.expr(then)?, nested(then));
                format!("{} if {} else {}", then_text, cond_text, self.expr(otherwise)?)
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
                if *optional {
                    let (first, later) = self.reuse(object)?;
                    format!("(None if {first} is None else {later}.{name})")
                } else {
                    format!("{}.{}", self.postfix(object)?, name)
                }
            }
            Expr::Index { object, index, .. } => {
                format!("{}[{}]", self.postfix(object)?, self.expr(index)?)
            }
            Expr::Array { elements, .. } => format!("[{}]", self.list(elements)?),
            Expr::Object { fields, .. } => format!("{{{}}}", self.fields(fields)?.join(", ")),
            Expr::Closure(closure) => self.closure(closure)?,
            Expr::New { class, args, .. } => format!("{}({})", class, self.list(args)?),
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
                let mut parts = vec![format!("{}: {}", quote(&tag), quote(variant))];
                parts.extend(self.fields(fields)?);
                format!("{{{}}}", parts.join(", "))
            }
            Expr::Await { operand, .. } => {
                let inner = self.postfix(operand)?;
                if self.ctx.in_generator() {
                    format!("(yield {inner})")
                } else {
                    format!("await {inner}")
                }
            }
            Expr::Cast { expr, .. } | Expr::Native { expr, .. } => self.expr(expr)?,
            Expr::Convert(conversion) => self.conversion(conversion)?,
            Expr::Format { template, args, .. } => self.format(template, args)?,
            Expr::Range {
                start,
                end,
                inclusive,
                ..
            } => {
                let start = self.expr(start)?;
                if *inclusive {
                    format!("range({}, {} + 1)", start, self.operand(end, BinaryOp::Add, false)?)
                } else {
                    format!("range({}, {})", start, self.expr(end)?)
                }
            }
            Expr::Filter(filter) => self.filter(filter)?,
            Expr::Read { line, .. } => {
                if *line {
                    "input()".to_string()
                } else {
                    self.ctx.require(Features::STDIN);
                    "sys.stdin.read()".to_string()
                }
            }
            Expr::Constant { constant, .. } => {
                self.ctx.require(Features::MATH_CONSTANTS);
                match constant {
                    MathConstant::Pi => "math.pi".to_string(),
                    MathConstant::Tau => "math.tau".to_string(),
                    MathConstant::Euler => "math.e".to_string(),
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
        let text = registry.render(&lookup, &CallParts::new(&receiver, &args));
        if lookup.flags().contains(MethodFlags::ASYNC) {
            self.ctx.require(Features::ASYNC);
        }
        if text.contains("functools.") {
            self.ctx.require(Features::FUNCTIONAL);
        }
        Ok(text)
    }

    /// `lambda`; a block body that is not a single expression yields `None`
    fn closure(&mut self, closure: &Closure) -> Result<String> {
        if closure.is_async || closure_body_contains_await(&closure.body) {
            return Err(CodegenError::unsupported(
                closure.span,
                Target::Python,
                "async closure",
            ));
        }
        let mut params = Vec::with_capacity(closure.params.len());
        for param in &closure.params {
            let mut text = String::new();
            if param.rest {
                text.push('*');
            }
            text.push_str(&sanitize_identifier(&param.name, Target::Python));
            if let Some(default) = &param.default {
                text.push('=');
                text.push_str(&self.expr(default)?);
            }
            params.push(text);
        }

        let body = match &closure.body {
            ClosureBody::Expr(expr) => self.in_function(false, false, |this| this.expr(expr))?,
            ClosureBody::Block(block) => match block.stmts.as_slice() {
                [] | [Stmt::Return { value: None, .. }] => "None".to_string(),
                [Stmt::Return {
                    value: Some(value), ..
                }]
                | [Stmt::Expr { expr: value, .. }] => {
                    self.in_function(false, false, |this| this.expr(value))?
                }
                // statements cannot live in a lambda; the value is always absent
                _ => "None".to_string(),
            },
        };
        if params.is_empty() {
            Ok(format!("lambda: {body}"))
        } else {
            Ok(format!("lambda {}: {}", params.join(", "), body))
        }
    }

    fn conversion(&mut self, conversion: &Conversion) -> Result<String> {
        let radix = conversion.radix.unwrap_or(Radix::Dec);
        let parse = |subject: &str| match (conversion.kind, radix) {
            (ConversionKind::Float, _) => format!("float({subject})"),
            (_, Radix::Dec) => format!("int({subject})"),
            (_, radix) => format!("int({subject}, {})", radix.base()),
        };

        let Some(fallback) = &conversion.fallback else {
            let value = self.expr(&conversion.expr)?;
            return Ok(match conversion.kind {
                ConversionKind::Integer | ConversionKind::Float => parse(&value),
                ConversionKind::Text => format!("str({value})"),
                ConversionKind::Bool => format!("bool({value})"),
            });
        };

        let (first, later) = self.reuse(&conversion.expr)?;
        let fallback = self.expr(fallback)?;
        Ok(match conversion.kind {
            ConversionKind::Text => format!("str({fallback} if {first} is None else {later})"),
            ConversionKind::Bool => format!("bool({fallback} if {first} is None else {later})"),
            ConversionKind::Float => format!(
                "({} if {}.replace(\".\", \"\", 1).isdigit() else {})",
                parse(&later),
                first,
                fallback
            ),
            ConversionKind::Integer if radix == Radix::Dec => {
                format!("({} if {}.isdigit() else {})", parse(&later), first, fallback)
            }
            ConversionKind::Integer => {
                format!("({} if len({}) > 0 else {})", parse(&later), first, fallback)
            }
        })
    }

    /// f-string; arguments needing a single evaluation are bound by a lambda
    fn format(&mut self, template: &str, args: &[Expr]) -> Result<String> {
        self.ctx.require(Features::FORMAT);
        let plan = FormatPlan::new(template, args.len());
        let rendered = self.each(args)?;
        let bound = plan.bind(args, rendered, &mut self.ctx);

        let mut literal = String::from("f\"");
        for segment in &plan.segments {
            match segment {
                Segment::Text(text) => literal.push_str(&escape_fstring(text)),
                Segment::Arg(index) => literal.push_str(&format!("{{{}}}", bound.reference(*index))),
                Segment::Missing(_) => literal.push_str("{None}"),
            }
        }
        literal.push('"');

        if bound.temps.is_empty() {
            return Ok(literal);
        }
        let names: Vec<&str> = bound.temps.iter().map(|t| t.name.as_str()).collect();
        let values: Vec<&str> = bound.temps.iter().map(|t| t.value.as_str()).collect();
        Ok(format!("(lambda {}: {})({})", names.join(", "), literal, values.join(", ")))
    }

    fn filter(&mut self, filter: &FilterExpr) -> Result<String> {
        let mut text = match &filter.filter {
            None => self.postfix(&filter.source)?,
            Some(selection) => {
                let element = sanitize_identifier(&filter.element, Target::Python);
                let source = self.expr(&filter.source)?;
                let predicate = match &selection.kind {
                    FilterKind::Condition(cond) => {
                        let rewritten =
                            rewrite_filter_predicate(cond, &filter.element, &filter.outer);
                        let predicate = self.expr(&rewritten)?;
                        if selection.negated {
                            format!("not ({predicate})")
                        } else {
                            predicate
                        }
                    }
                    FilterKind::Property(name) if selection.negated => {
                        format!("not {element}.{name}")
                    }
                    FilterKind::Property(name) => format!("{element}.{name}"),
                };
                format!("[{element} for {element} in {source} if {predicate}]")
            }
        };

        for transform in &filter.transforms {
            let count = match &transform.arg {
                Some(arg) => self.postfix(arg)?,
                None => "1".to_string(),
            };
            match transform.kind {
                TransformKind::First => text.push_str(&format!("[:{count}]")),
                TransformKind::Last => text.push_str(&format!("[-{count}:]")),
                TransformKind::Sum => text = format!("sum({text})"),
            }
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::super::PythonBackend;
    use crate::backend::{CodegenBackend, CodegenOptions};
    use crate::CodegenError;
    use faber_ast::{AstBuilder, BinaryOp, ConversionKind, Expr, Radix, UnaryOp, Unit};

    fn generate(expr: Expr) -> crate::Result<String> {
        let b = AstBuilder::new();
        let unit = Unit::new("probatio", vec![b.fixum("v", None, expr)]);
        PythonBackend::new()?.generate_unit(&unit, &CodegenOptions::default())
    }

    fn emit_expr(expr: Expr) -> String {
        let code = generate(expr).unwrap();
        code.trim_end()
            .rsplit('\n')
            .next()
            .unwrap()
            .trim_start_matches("v = ")
            .to_string()
    }

    #[test]
    fn test_format_becomes_fstring() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.format("§1 {before} §0", vec![b.ident("a"), b.ident("b")])),
            "f\"{b} {{before}} {a}\""
        );
        assert_eq!(
            emit_expr(b.format("§0 and §3", vec![b.ident("a")])),
            "f\"{a} and {None}\""
        );
        assert_eq!(
            emit_expr(b.format("§0§0", vec![b.call(b.ident("next"), vec![])])),
            "(lambda __f0: f\"{__f0}{__f0}\")(next())"
        );
    }

    #[test]
    fn test_conversions() {
        let b = AstBuilder::new();
        assert_eq!(emit_expr(b.convert(b.text("42"), ConversionKind::Integer)), "int(\"42\")");
        assert_eq!(
            emit_expr(b.conversion(b.text("ff"), ConversionKind::Integer, Some(Radix::Hex), None)),
            "int(\"ff\", 16)"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Integer, None, Some(b.int(0)))),
            "(int(s) if s.isdigit() else 0)"
        );
        assert_eq!(
            emit_expr(b.conversion(
                b.call(b.ident("lege"), vec![]),
                ConversionKind::Integer,
                None,
                Some(b.int(0))
            )),
            "(int(__v0) if (__v0 := lege()).isdigit() else 0)"
        );
    }

    #[test]
    fn test_boolean_operators_and_precedence() {
        let b = AstBuilder::new();
        let cmp = b.binary(BinaryOp::Lt, b.ident("a"), b.ident("b"));
        assert_eq!(
            emit_expr(b.binary(BinaryOp::And, cmp.clone(), b.unary(UnaryOp::Not, b.ident("c")))),
            "a < b and not c"
        );
        assert_eq!(
            emit_expr(b.binary(BinaryOp::Eq, cmp, b.bool(true))),
            "(a < b) == True"
        );
        let either = b.binary(BinaryOp::Or, b.ident("a"), b.ident("b"));
        assert_eq!(emit_expr(b.unary(UnaryOp::Not, either)), "not (a or b)");
    }

    #[test]
    fn test_coalesce_is_conditional() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.binary(BinaryOp::Coalesce, b.ident("a"), b.int(1))),
            "(a if a is not None else 1)"
        );
    }

    #[test]
    fn test_closures_are_lambdas() {
        let b = AstBuilder::new();
        let double = b.lambda(
            vec![b.param("x", "numerus")],
            b.binary(BinaryOp::Mul, b.ident("x"), b.int(2)),
        );
        assert_eq!(emit_expr(double), "lambda x: x * 2");

        let block = b.lambda_block(
            vec![b.param("x", "numerus")],
            vec![b.scribe(vec![b.ident("x")]), b.redde(Some(b.ident("x")))],
        );
        assert_eq!(emit_expr(block), "lambda x: None");

        let awaiting = b.lambda(vec![], b.cede(b.ident("x")));
        assert!(matches!(generate(awaiting), Err(CodegenError::Unsupported { .. })));
    }

    #[test]
    fn test_filter_is_comprehension() {
        let b = AstBuilder::new();
        let filter = b.filter_where(
            b.ident("homines"),
            b.binary(BinaryOp::Gt, b.ident("aetas"), b.ident("limen")),
            &["limen"],
        );
        assert_eq!(
            emit_expr(filter),
            "[item for item in homines if item.aetas > limen]"
        );
    }

    #[test]
    fn test_inclusive_range() {
        let b = AstBuilder::new();
        assert_eq!(emit_expr(b.range(b.int(1), b.ident("n"), true)), "range(1, n + 1)");
    }
}
