use super::RsEmitter;
use crate::analysis::{closure_body_contains_await, is_trivially_pure, rewrite_filter_predicate};
use crate::backend::utils::{float_literal, quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::{Features, Scoped};
use crate::format_string::{FormatPlan, Segment};
use crate::registry::CallParts;
use crate::targets::{lookup_method, needs_parens_tight, paren_if, InputCheck, StmtEmitter};
use crate::{CodegenError, Result};
use faber_ast::{
    BinaryOp, Closure, ClosureBody, Conversion, ConversionKind, Expr, FilterExpr, FilterKind,
    Literal, MathConstant, ObjectField, Radix, Span, StructureKind, TransformKind, UnaryOp,
};

/// Rust binding strength; `??` is lowered to `unwrap_or` and never reaches here
fn precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Coalesce => 10,
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Gt
        | BinaryOp::Ge => 3,
        BinaryOp::BitOr => 4,
        BinaryOp::BitXor => 5,
        BinaryOp::BitAnd => 6,
        BinaryOp::Shl | BinaryOp::Shr => 7,
        BinaryOp::Add | BinaryOp::Sub => 8,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 9,
    }
}

fn is_comparison(op: BinaryOp) -> bool {
    precedence(op) == 3
}

/// Comparisons do not chain in Rust
fn needs_parens(child: &Expr, parent: BinaryOp, right: bool) -> bool {
    match child {
        Expr::Binary { op, .. } => {
            let (child_prec, parent_prec) = (precedence(*op), precedence(parent));
            child_prec < parent_prec
                || (right && child_prec == parent_prec)
                || (is_comparison(*op) && is_comparison(parent))
        }
        Expr::Ternary { .. } | Expr::Assign { .. } | Expr::Closure(_) | Expr::Range { .. } => true,
        _ => false,
    }
}

/// Template text with braces doubled for `format!`
fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// Count argument for `take`; literals infer `usize` on their own
fn count_arg(text: String, expr: &Expr) -> String {
    match expr {
        Expr::Literal {
            value: Literal::Integer(_),
            ..
        } => text,
        _ => format!("({text}) as usize"),
    }
}

impl RsEmitter {
    pub(super) fn list(&mut self, exprs: &[Expr]) -> Result<String> {
        Ok(self.each(exprs)?.join(", "))
    }

    fn each(&mut self, exprs: &[Expr]) -> Result<Vec<String>> {
        exprs.iter().map(|expr| self.expr(expr)).collect()
    }

    fn postfix(&mut self, expr: &Expr) -> Result<String> {
        Ok(paren_if(self.expr(expr)?, needs_parens_tight(expr)))
    }

    fn operand(&mut self, expr: &Expr, parent: BinaryOp, right: bool) -> Result<String> {
        Ok(paren_if(self.expr(expr)?, needs_parens(expr, parent, right)))
    }

    fn fields(&mut self, fields: &[ObjectField]) -> Result<Vec<String>> {
        fields
            .iter()
            .map(|field| {
                let name = sanitize_identifier(&field.key, Target::Rust);
                let value = self.expr(&field.value)?;
                Ok(if value == name { name } else { format!("{name}: {value}") })
            })
            .collect()
    }

    /// `Type::` when `expr` names a type declared in this unit
    fn type_path(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Ident { name, .. } if self.types.contains(name) => Some(name.clone()),
            _ => None,
        }
    }

    pub(super) fn expr(&mut self, expr: &Expr) -> Result<String> {
        Ok(match expr {
            Expr::Ident { name, .. } => sanitize_identifier(name, Target::Rust),
            Expr::SelfRef { .. } => "self".to_string(),
            Expr::Literal { value, .. } => match value {
                Literal::Integer(n) => n.to_string(),
                Literal::Float(f) => float_literal(*f),
                Literal::Text(text) => format!("String::from({})", quote(text)),
                Literal::Bool(b) => b.to_string(),
                Literal::Nil => "None".to_string(),
            },
            Expr::Binary {
                op: BinaryOp::Coalesce,
                lhs,
                rhs,
                ..
            } => format!("{}.unwrap_or({})", self.postfix(lhs)?, self.expr(rhs)?),
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs = self.operand(lhs, *op, false)?;
                let rhs = self.operand(rhs, *op, true)?;
                format!("{} {} {}", lhs, op.c_symbol(), rhs)
            }
            Expr::Unary { op, operand, .. } => {
                let inner = paren_if(self.expr(operand)?, needs_parens_tight(operand));
                match op {
                    UnaryOp::Not | UnaryOp::BitNot => format!("!{inner}"),
                    UnaryOp::Neg => format!("-{inner}"),
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
            } => format!(
                "if {} {{ {} }} else {{ {} }}",
                self.expr(cond)?,
                self.expr(then)?,
                self.expr(otherwise)?
            ),
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
                let field = sanitize_identifier(name, Target::Rust);
                if let Some(path) = self.type_path(object) {
                    format!("{path}::{name}")
                } else if *optional {
                    format!("{}.as_ref().map(|__o| __o.{}.clone())", self.postfix(object)?, field)
                } else {
                    format!("{}.{}", self.postfix(object)?, field)
                }
            }
            Expr::Index { object, index, .. } => {
                let object = self.postfix(object)?;
                match index.as_ref() {
                    Expr::Literal {
                        value: Literal::Text(key),
                        ..
                    } => format!("{}[{}]", object, quote(key)),
                    Expr::Literal {
                        value: Literal::Integer(n),
                        ..
                    } => format!("{object}[{n}]"),
                    other => format!("{}[({}) as usize]", object, self.expr(other)?),
                }
            }
            Expr::Array { elements, .. } => format!("vec![{}]", self.list(elements)?),
            Expr::Object { span, .. } => {
                return Err(CodegenError::unsupported(*span, Target::Rust, "object literal"))
            }
            Expr::Closure(closure) => self.closure(closure)?,
            Expr::New { class, args, .. } => format!("{}::new({})", class, self.list(args)?),
            Expr::Construct {
                union,
                variant,
                fields,
                ..
            } => {
                let owner = union
                    .clone()
                    .or_else(|| self.ctx.union_of_variant(variant).map(|info| info.name.clone()));
                let path = match owner {
                    Some(owner) => format!("{owner}::{variant}"),
                    None => variant.clone(),
                };
                if fields.is_empty() {
                    path
                } else {
                    format!("{} {{ {} }}", path, self.fields(fields)?.join(", "))
                }
            }
            Expr::Await { operand, span } => {
                if self.ctx.in_generator() {
                    return Err(CodegenError::unsupported(*span, Target::Rust, "yield"));
                }
                self.ctx.require(Features::ASYNC);
                format!("{}.await", self.postfix(operand)?)
            }
            Expr::Cast { expr, ty, .. } | Expr::Native { expr, ty, .. } => {
                let ty = self.render_type(ty);
                format!("({} as {})", self.postfix(expr)?, ty)
            }
            Expr::Convert(conversion) => self.conversion(conversion)?,
            Expr::Format { template, args, .. } => self.format(template, args)?,
            Expr::Range {
                start,
                end,
                inclusive,
                ..
            } => {
                let dots = if *inclusive { "..=" } else { ".." };
                format!("({}{}{})", self.postfix(start)?, dots, self.postfix(end)?)
            }
            Expr::Filter(filter) => self.filter(filter)?,
            Expr::Read { line, .. } => {
                self.ctx.require(Features::STDIN);
                if *line {
                    "__lege_lineam()".to_string()
                } else {
                    "__lege()".to_string()
                }
            }
            Expr::Constant { constant, .. } => {
                self.ctx.require(Features::MATH_CONSTANTS);
                match constant {
                    MathConstant::Pi => "std::f64::consts::PI".to_string(),
                    MathConstant::Tau => "std::f64::consts::TAU".to_string(),
                    MathConstant::Euler => "std::f64::consts::E".to_string(),
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
        match kind {
            StructureKind::Map => self.ctx.require(Features::MAP),
            StructureKind::Set => self.ctx.require(Features::SET),
            _ => {}
        }
        Ok(registry.render(&lookup, &CallParts::new(&receiver, &args)))
    }

    fn closure(&mut self, closure: &Closure) -> Result<String> {
        let is_async = closure.is_async || closure_body_contains_await(&closure.body);
        let mut params = Vec::with_capacity(closure.params.len());
        for param in &closure.params {
            let name = sanitize_identifier(&param.name, Target::Rust);
            match &param.ty {
                Some(ty) => params.push(format!("{}: {}", name, self.render_type(ty))),
                None => params.push(name),
            }
        }
        let params = params.join(", ");
        let body = self.in_function(is_async, false, |this| match &closure.body {
            ClosureBody::Expr(expr) if is_async => Ok(format!("{{ {} }}", this.expr(expr)?)),
            ClosureBody::Expr(expr) => this.expr(expr),
            ClosureBody::Block(block) => this.braced(&block.stmts),
        })?;
        if is_async {
            self.ctx.require(Features::ASYNC);
            Ok(format!("|{params}| async move {body}"))
        } else {
            Ok(format!("|{params}| {body}"))
        }
    }

    fn conversion(&mut self, conversion: &Conversion) -> Result<String> {
        let value = self.postfix(&conversion.expr)?;
        let fallback = match &conversion.fallback {
            Some(fallback) => Some(self.expr(fallback)?),
            None => None,
        };
        let radix = conversion.radix.unwrap_or(Radix::Dec);
        let parse = |subject: &str| match (conversion.kind, radix) {
            (ConversionKind::Float, _) => format!("{subject}.parse::<f64>()"),
            (_, Radix::Dec) => format!("{subject}.parse::<i64>()"),
            (_, radix) => format!("i64::from_str_radix(&{}, {})", subject, radix.base()),
        };

        if let (ConversionKind::Integer | ConversionKind::Float, Some(fallback)) =
            (conversion.kind, &fallback)
        {
            let pure = is_trivially_pure(&conversion.expr);
            let subject = if pure {
                value.clone()
            } else {
                self.ctx.fresh_temp("c")
            };
            let guard = match InputCheck::for_conversion(conversion.kind, radix) {
                InputCheck::Digits => {
                    format!("!{subject}.is_empty() && {subject}.chars().all(|c| c.is_ascii_digit())")
                }
                InputCheck::DigitsOrPoint => format!(
                    "!{subject}.is_empty() && {subject}.chars().all(|c| c.is_ascii_digit() || c == '.')"
                ),
                InputCheck::NonEmpty => format!("!{subject}.is_empty()"),
            };
            let guarded = format!(
                "if {} {{ {}.unwrap_or({}) }} else {{ {} }}",
                guard,
                parse(&subject),
                fallback,
                fallback
            );
            return Ok(if pure {
                guarded
            } else {
                format!("{{ let {subject} = {value}; {guarded} }}")
            });
        }

        let settle = |parsed: String| match &fallback {
            Some(fallback) => format!("{parsed}.unwrap_or({fallback})"),
            None => format!("{parsed}.unwrap()"),
        };
        Ok(match conversion.kind {
            ConversionKind::Integer | ConversionKind::Float => settle(parse(&value)),
            ConversionKind::Bool => settle(format!("{value}.parse::<bool>()")),
            ConversionKind::Text => match &fallback {
                Some(fallback) => format!(
                    "{value}.as_ref().map(ToString::to_string).unwrap_or_else(|| {fallback}.to_string())"
                ),
                None => format!("{value}.to_string()"),
            },
        })
    }

    /// `format!` naming only the arguments the template uses
    fn format(&mut self, template: &str, args: &[Expr]) -> Result<String> {
        self.ctx.require(Features::FORMAT);
        let plan = FormatPlan::new(template, args.len());
        let order = plan.order();
        let sequential = plan.unused().is_empty() && order.iter().copied().eq(0..args.len());

        let mut used: Vec<usize> = order.clone();
        used.sort_unstable();
        used.dedup();

        let mut literal = String::new();
        for segment in &plan.segments {
            match segment {
                Segment::Text(text) => literal.push_str(&escape_braces(text)),
                Segment::Arg(_) if sequential => literal.push_str("{}"),
                Segment::Arg(index) => {
                    let slot = used.iter().position(|i| i == index).unwrap_or(0);
                    literal.push_str(&format!("{{{slot}}}"));
                }
                Segment::Missing(_) => literal.push_str("None"),
            }
        }

        let mut out = format!("format!({}", quote(&literal));
        for index in used {
            out.push_str(", ");
            out.push_str(&self.expr(&args[index])?);
        }
        out.push(')');
        Ok(out)
    }

    fn filter(&mut self, filter: &FilterExpr) -> Result<String> {
        let mut text = format!("{}.iter()", self.postfix(&filter.source)?);
        let element = sanitize_identifier(&filter.element, Target::Rust);

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
            text.push_str(&format!(".filter(|{element}| {predicate})"));
        }
        text.push_str(".cloned()");

        let mut terminal = false;
        for transform in &filter.transforms {
            let count = match &transform.arg {
                Some(arg) => count_arg(self.expr(arg)?, arg),
                None => "1".to_string(),
            };
            match transform.kind {
                TransformKind::First => text.push_str(&format!(".take({count})")),
                TransformKind::Last => text.push_str(&format!(
                    ".rev().take({count}).collect::<Vec<_>>().into_iter().rev()"
                )),
                TransformKind::Sum => {
                    text.push_str(".sum::<i64>()");
                    terminal = true;
                    break;
                }
            }
        }
        if !terminal {
            text.push_str(".collect::<Vec<_>>()");
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::super::RustBackend;
    use crate::backend::{CodegenBackend, CodegenOptions};
    use crate::CodegenError;
    use faber_ast::{AstBuilder, BinaryOp, ConversionKind, Expr, Radix, Unit};

    fn generate(expr: Expr) -> crate::Result<String> {
        let b = AstBuilder::new();
        let unit = Unit::new("probatio", vec![b.fixum("v", None, expr)]);
        let options = CodegenOptions {
            emit_preamble: false,
            ..CodegenOptions::default()
        };
        RustBackend::new()?.generate_unit(&unit, &options)
    }

    fn emit_expr(expr: Expr) -> String {
        let code = generate(expr).unwrap();
        code.lines()
            .find_map(|line| line.trim_start().strip_prefix("let v = "))
            .unwrap()
            .trim_end_matches(';')
            .to_string()
    }

    #[test]
    fn test_format_names_used_arguments_only() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.format("§1 {before} §0", vec![b.ident("a"), b.ident("b")])),
            "format!(\"{1} {{before}} {0}\", a, b)"
        );
        assert_eq!(
            emit_expr(b.format("§ and §", vec![b.ident("a"), b.ident("b")])),
            "format!(\"{} and {}\", a, b)"
        );
        assert_eq!(
            emit_expr(b.format("§1 and §4", vec![b.ident("a"), b.ident("b")])),
            "format!(\"{0} and None\", b)"
        );
    }

    #[test]
    fn test_repeated_argument_evaluated_once() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.format("§0§0", vec![b.call(b.ident("next"), vec![])])),
            "format!(\"{0}{0}\", next())"
        );
    }

    #[test]
    fn test_conversions() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.conversion(b.text("ff"), ConversionKind::Integer, Some(Radix::Hex), None)),
            "i64::from_str_radix(&String::from(\"ff\"), 16).unwrap()"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Integer, None, Some(b.int(0)))),
            "if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) { s.parse::<i64>().unwrap_or(0) } else { 0 }"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Float, None, Some(b.float(0.5)))),
            "if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.') { s.parse::<f64>().unwrap_or(0.5) } else { 0.5 }"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Integer, Some(Radix::Hex), Some(b.int(0)))),
            "if !s.is_empty() { i64::from_str_radix(&s, 16).unwrap_or(0) } else { 0 }"
        );
        assert_eq!(
            emit_expr(b.conversion(b.call(b.ident("lege"), vec![]), ConversionKind::Integer, None, Some(b.int(0)))),
            "{ let __c0 = lege(); if !__c0.is_empty() && __c0.chars().all(|c| c.is_ascii_digit()) { __c0.parse::<i64>().unwrap_or(0) } else { 0 } }"
        );
        assert_eq!(
            emit_expr(b.convert(b.ident("n"), ConversionKind::Text)),
            "n.to_string()"
        );
    }

    #[test]
    fn test_comparisons_never_chain() {
        let b = AstBuilder::new();
        let lt = b.binary(BinaryOp::Lt, b.ident("a"), b.ident("b"));
        assert_eq!(emit_expr(b.binary(BinaryOp::Eq, lt, b.bool(true))), "(a < b) == true");
        let coalesce = b.binary(BinaryOp::Coalesce, b.ident("a"), b.int(1));
        assert_eq!(emit_expr(coalesce), "a.unwrap_or(1)");
    }

    #[test]
    fn test_object_literal_is_unsupported() {
        let b = AstBuilder::new();
        assert!(matches!(
            generate(b.object(vec![("a", b.int(1))])),
            Err(CodegenError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_closures() {
        let b = AstBuilder::new();
        let double = b.lambda(
            vec![b.param("x", "numerus")],
            b.binary(BinaryOp::Mul, b.ident("x"), b.int(2)),
        );
        assert_eq!(emit_expr(double), "|x: i64| x * 2");
        let awaiting = b.lambda(vec![b.param("x", "numerus")], b.cede(b.ident("x")));
        assert_eq!(emit_expr(awaiting), "|x: i64| async move { x.await }");
    }

    #[test]
    fn test_filter_chain() {
        let b = AstBuilder::new();
        let filter = b.filter_where(
            b.ident("homines"),
            b.binary(BinaryOp::Gt, b.ident("aetas"), b.ident("limen")),
            &["limen"],
        );
        assert_eq!(
            emit_expr(filter),
            "homines.iter().filter(|item| item.aetas > limen).cloned().collect::<Vec<_>>()"
        );
    }

    #[test]
    fn test_range_and_index() {
        let b = AstBuilder::new();
        assert_eq!(emit_expr(b.range(b.int(1), b.ident("n"), true)), "(1..=n)");
        assert_eq!(emit_expr(b.index(b.ident("xs"), b.ident("i"))), "xs[(i) as usize]");
    }
}
