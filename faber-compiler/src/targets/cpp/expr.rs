use super::{methods, CppEmitter};
use crate::analysis::{closure_body_contains_await, is_trivially_pure, rewrite_filter_predicate};
use crate::backend::utils::{float_literal, quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::{Features, Scoped};
use crate::format_string::{FormatPlan, Segment};
use crate::morphology::MethodFlags;
use crate::registry::{CallParts, Lookup};
use crate::targets::{lookup_method, needs_parens, needs_parens_tight, paren_if, InputCheck, StmtEmitter};
use crate::{CodegenError, Result};
use faber_ast::{
    BinaryOp, Closure, ClosureBody, Conversion, ConversionKind, Expr, FilterExpr, FilterKind,
    Literal, MathConstant, ObjectField, Radix, Span, StructureKind, TransformKind, UnaryOp,
};

/// Template text with braces doubled for `std::format`
fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

fn structure_features(kind: StructureKind) -> Features {
    match kind {
        StructureKind::Sequence => Features::SEQUENCE | Features::ALGORITHM | Features::NUMERIC,
        StructureKind::Map => Features::MAP | Features::SEQUENCE,
        StructureKind::Set => Features::SET,
        StructureKind::Scalar => Features::ALGORITHM,
    }
}

impl CppEmitter {
    pub(super) fn list(&mut self, exprs: &[Expr]) -> Result<String> {
        Ok(self.each(exprs)?.join(", "))
    }

    fn each(&mut self, exprs: &[Expr]) -> Result<Vec<String>> {
        exprs.iter().map(|expr| self.expr(expr)).collect()
    }

    pub(super) fn postfix(&mut self, expr: &Expr) -> Result<String> {
        Ok(paren_if(self.expr(expr)?, needs_parens_tight(expr)))
    }

    fn operand(&mut self, expr: &Expr, parent: BinaryOp, right: bool) -> Result<String> {
        Ok(paren_if(self.expr(expr)?, needs_parens(expr, parent, right)))
    }

    /// `{.a = 1, .b = 2}` designated initialisers
    fn initialisers(&mut self, fields: &[ObjectField]) -> Result<String> {
        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            let value = self.expr(&field.value)?;
            parts.push(format!(".{} = {}", sanitize_identifier(&field.key, Target::Cpp), value));
        }
        Ok(format!("{{{}}}", parts.join(", ")))
    }

    /// Object of a `.` access: `this->` for the receiver, `::` for declared types
    fn access(&mut self, object: &Expr, name: &str) -> Result<String> {
        let field = sanitize_identifier(name, Target::Cpp);
        Ok(match object {
            Expr::SelfRef { .. } => format!("this->{field}"),
            Expr::Ident { name: owner, .. } if self.types.contains(owner) => {
                format!("{owner}::{field}")
            }
            other => format!("{}.{}", self.postfix(other)?, field),
        })
    }

    pub(super) fn expr(&mut self, expr: &Expr) -> Result<String> {
        Ok(match expr {
            Expr::Ident { name, .. } => sanitize_identifier(name, Target::Cpp),
            Expr::SelfRef { .. } => "(*this)".to_string(),
            Expr::Literal { value, .. } => match value {
                Literal::Integer(n) => n.to_string(),
                Literal::Float(f) => float_literal(*f),
                Literal::Text(text) => format!("std::string({})", quote(text)),
                Literal::Bool(b) => b.to_string(),
                Literal::Nil => {
                    self.ctx.require(Features::OPTIONAL);
                    "std::nullopt".to_string()
                }
            },
            Expr::Binary { op, lhs, rhs, .. } => self.binary(*op, lhs, rhs)?,
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
                let nested = matches!(cond.as_ref(), Expr::Ternary { .. } | Expr::Assign { .. });
                let cond = paren_if(self.expr(cond)?, nested);
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
                if *optional {
                    self.ctx.require(Features::OPTIONAL);
                    let object = self.postfix(object)?;
                    format!(
                        "({object} ? std::make_optional({object}->{}) : std::nullopt)",
                        sanitize_identifier(name, Target::Cpp)
                    )
                } else {
                    self.access(object, name)?
                }
            }
            Expr::Index { object, index, .. } => {
                format!("{}[{}]", self.postfix(object)?, self.expr(index)?)
            }
            Expr::Array { elements, .. } => {
                self.ctx.require(Features::SEQUENCE);
                if elements.is_empty() {
                    "{}".to_string()
                } else {
                    format!("std::vector{{{}}}", self.list(elements)?)
                }
            }
            Expr::Object { span, .. } => {
                return Err(CodegenError::unsupported(*span, Target::Cpp, "object literal"))
            }
            Expr::Closure(closure) => self.closure(closure)?,
            Expr::New { class, args, .. } => format!("{}({})", class, self.list(args)?),
            Expr::Construct {
                union,
                variant,
                fields,
                ..
            } => {
                let owner = union
                    .clone()
                    .or_else(|| self.ctx.union_of_variant(variant).map(|info| info.name.clone()));
                let payload = format!("{}{}", variant, self.initialisers(fields)?);
                match owner {
                    Some(owner) => format!("{owner}{{{payload}}}"),
                    None => payload,
                }
            }
            Expr::Await { operand, span } => {
                if self.ctx.in_generator() {
                    return Err(CodegenError::unsupported(*span, Target::Cpp, "yield"));
                }
                self.ctx.require(Features::ASYNC);
                format!("{}.get()", self.postfix(operand)?)
            }
            Expr::Cast { expr, ty, .. } | Expr::Native { expr, ty, .. } => {
                let ty = self.render_type(ty);
                format!("static_cast<{}>({})", ty, self.expr(expr)?)
            }
            Expr::Convert(conversion) => self.conversion(conversion)?,
            Expr::Format { template, args, .. } => self.format(template, args)?,
            Expr::Range {
                start,
                end,
                inclusive,
                ..
            } => {
                self.ctx.require(Features::ALGORITHM);
                let start = self.expr(start)?;
                let end = if *inclusive {
                    format!("{} + 1", self.operand(end, BinaryOp::Add, false)?)
                } else {
                    self.expr(end)?
                };
                format!("std::views::iota({start}, {end})")
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
                    MathConstant::Pi => "std::numbers::pi".to_string(),
                    MathConstant::Tau => "(2 * std::numbers::pi)".to_string(),
                    MathConstant::Euler => "std::numbers::e".to_string(),
                }
            }
        })
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<String> {
        if op == BinaryOp::Coalesce {
            self.ctx.require(Features::OPTIONAL);
            return Ok(format!("{}.value_or({})", self.postfix(lhs)?, self.expr(rhs)?));
        }
        let lhs = self.operand(lhs, op, false)?;
        let rhs = self.operand(rhs, op, true)?;
        Ok(format!("{} {} {}", lhs, op.c_symbol(), rhs))
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
        let resolved = match &lookup {
            Lookup::Explicit(_) => name,
            Lookup::Derived { sibling, .. } => sibling,
        };
        self.ctx.require(structure_features(kind));
        if methods::uses_text_helpers(kind, resolved) {
            self.ctx.require(Features::TEXT);
        }
        if lookup.flags().contains(MethodFlags::ASYNC) {
            self.ctx.require(Features::ASYNC);
        }
        let receiver = self.postfix(object)?;
        let args = self.each(args)?;
        Ok(registry.render(&lookup, &CallParts::new(&receiver, &args)))
    }

    fn closure(&mut self, closure: &Closure) -> Result<String> {
        let is_async = closure.is_async || closure_body_contains_await(&closure.body);
        let mut params = Vec::with_capacity(closure.params.len());
        for param in &closure.params {
            let ty = match &param.ty {
                Some(ty) => self.render_type(ty),
                None => "auto".to_string(),
            };
            params.push(format!("{} {}", ty, sanitize_identifier(&param.name, Target::Cpp)));
        }
        let params = params.join(", ");
        let ret = match &closure.ret {
            Some(ty) => format!(" -> {}", self.render_type(ty)),
            None => String::new(),
        };
        let body = self.in_function(is_async, false, |this| match &closure.body {
            ClosureBody::Expr(expr) => Ok(format!("{{ return {}; }}", this.expr(expr)?)),
            ClosureBody::Block(block) => this.braced(&block.stmts),
        })?;
        if is_async {
            self.ctx.require(Features::ASYNC);
            return Ok(format!(
                "[=]({params}) {{ return std::async(std::launch::async, [=](){ret} {body}); }}"
            ));
        }
        Ok(format!("[&]({params}){ret} {body}"))
    }

    fn conversion(&mut self, conversion: &Conversion) -> Result<String> {
        let value = self.expr(&conversion.expr)?;
        let fallback = match &conversion.fallback {
            Some(fallback) => Some(self.expr(fallback)?),
            None => None,
        };
        let radix = conversion.radix.unwrap_or(Radix::Dec);

        if let (ConversionKind::Integer | ConversionKind::Float, Some(fallback)) =
            (conversion.kind, &fallback)
        {
            self.ctx.require(Features::PARSE_HELPERS);
            self.ctx.require(Features::OPTIONAL);
            let pure = is_trivially_pure(&conversion.expr);
            let subject = if pure {
                value.clone()
            } else {
                self.ctx.fresh_temp("c")
            };
            let guard = match InputCheck::for_conversion(conversion.kind, radix) {
                InputCheck::Digits => format!("faber::digits_only({subject})"),
                InputCheck::DigitsOrPoint => format!("faber::digits_or_point({subject})"),
                InputCheck::NonEmpty => format!("!{subject}.empty()"),
            };
            let parse = match conversion.kind {
                ConversionKind::Float => format!("faber::parse_float({subject})"),
                _ => format!("faber::parse_int({}, {})", subject, radix.base()),
            };
            let guarded = format!("({guard} ? {parse}.value_or({fallback}) : {fallback})");
            return Ok(if pure {
                guarded
            } else {
                format!("[&](const std::string& {subject}) {{ return {guarded}; }}({value})")
            });
        }

        Ok(match conversion.kind {
            ConversionKind::Integer => match radix {
                Radix::Dec => format!("std::stoll({value})"),
                radix => format!("std::stoll({}, nullptr, {})", value, radix.base()),
            },
            ConversionKind::Float => format!("std::stod({value})"),
            ConversionKind::Bool => match &fallback {
                Some(fallback) => format!(
                    "[&]() -> bool {{ if ({value} == \"true\") return true; if ({value} == \"false\") return false; return {fallback}; }}()"
                ),
                None => format!("({value} == \"true\")"),
            },
            ConversionKind::Text => {
                self.ctx.require(Features::FORMAT);
                match &fallback {
                    Some(fallback) => {
                        self.ctx.require(Features::OPTIONAL);
                        format!("({value} ? std::format(\"{{}}\", *{value}) : {fallback})")
                    }
                    None => format!("std::format(\"{{}}\", {value})"),
                }
            }
        })
    }

    /// `std::format` with indexed slots over the arguments the template uses
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
                Segment::Missing(_) => literal.push_str("nullptr"),
            }
        }

        let mut out = format!("std::format({}", quote(&literal));
        for index in used {
            out.push_str(", ");
            out.push_str(&self.expr(&args[index])?);
        }
        out.push(')');
        Ok(out)
    }

    /// Selection and slicing inside an immediately invoked lambda
    fn filter(&mut self, filter: &FilterExpr) -> Result<String> {
        self.ctx.require(Features::SEQUENCE | Features::ALGORITHM);
        let source = self.expr(&filter.source)?;
        let element = sanitize_identifier(&filter.element, Target::Cpp);

        let mut steps = Vec::new();
        match &filter.filter {
            Some(selection) => {
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
                steps.push(format!("const auto& __src = {source};"));
                steps.push("std::vector<std::decay_t<decltype(__src)>::value_type> __out;".to_string());
                steps.push(format!(
                    "std::copy_if(__src.begin(), __src.end(), std::back_inserter(__out), [&](const auto& {element}) {{ return {predicate}; }});"
                ));
            }
            None => steps.push(format!("auto __out = {source};")),
        }

        let mut result = "__out".to_string();
        for transform in &filter.transforms {
            let count = match &transform.arg {
                Some(arg) => self.expr(arg)?,
                None => "1".to_string(),
            };
            match transform.kind {
                TransformKind::First => steps.push(format!(
                    "__out.resize(std::min<std::size_t>(__out.size(), {count}));"
                )),
                TransformKind::Last => steps.push(format!(
                    "__out.erase(__out.begin(), __out.end() - std::min<std::size_t>(__out.size(), {count}));"
                )),
                TransformKind::Sum => {
                    self.ctx.require(Features::NUMERIC);
                    result = "std::accumulate(__out.begin(), __out.end(), int64_t{0})".to_string();
                    break;
                }
            }
        }
        Ok(format!("[&] {{ {} return {}; }}()", steps.join(" "), result))
    }
}

#[cfg(test)]
mod tests {
    use super::super::CppBackend;
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
        CppBackend::new()?.generate_unit(&unit, &options)
    }

    fn emit_expr(expr: Expr) -> String {
        let code = generate(expr).unwrap();
        code.lines()
            .find_map(|line| line.trim_start().strip_prefix("const auto v = "))
            .unwrap()
            .trim_end_matches(';')
            .to_string()
    }

    #[test]
    fn test_format_indexes_slots() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.format("§1 before §0", vec![b.ident("a"), b.ident("b")])),
            "std::format(\"{1} before {0}\", a, b)"
        );
        assert_eq!(
            emit_expr(b.format("§ and §", vec![b.ident("a"), b.ident("b")])),
            "std::format(\"{} and {}\", a, b)"
        );
    }

    #[test]
    fn test_format_evaluates_repeated_argument_once() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.format("§0-§0", vec![b.call(b.ident("next"), vec![])])),
            "std::format(\"{0}-{0}\", next())"
        );
    }

    #[test]
    fn test_missing_placeholder() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.format("§0 and §2", vec![b.ident("x")])),
            "std::format(\"{0} and nullptr\", x)"
        );
    }

    #[test]
    fn test_conversions() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Integer, Some(Radix::Hex), None)),
            "std::stoll(s, nullptr, 16)"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Float, None, Some(b.float(0.5)))),
            "(faber::digits_or_point(s) ? faber::parse_float(s).value_or(0.5) : 0.5)"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Integer, None, Some(b.int(0)))),
            "(faber::digits_only(s) ? faber::parse_int(s, 10).value_or(0) : 0)"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Integer, Some(Radix::Hex), Some(b.int(-1)))),
            "(!s.empty() ? faber::parse_int(s, 16).value_or(-1) : -1)"
        );
    }

    #[test]
    fn test_guarded_conversion_evaluates_subject_once() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.conversion(
                b.call(b.ident("lege"), vec![]),
                ConversionKind::Integer,
                None,
                Some(b.int(0)),
            )),
            "[&](const std::string& __c0) { return (faber::digits_only(__c0) ? faber::parse_int(__c0, 10).value_or(0) : 0); }(lege())"
        );
    }

    #[test]
    fn test_guarded_conversion_pulls_in_helpers() {
        let b = AstBuilder::new();
        let unit = Unit::new(
            "probatio",
            vec![b.fixum("v", None, b.conversion(b.ident("s"), ConversionKind::Integer, None, Some(b.int(0))))],
        );
        let code = CppBackend::new()
            .unwrap()
            .generate_unit(&unit, &CodegenOptions::default())
            .unwrap();
        assert!(code.contains("#include <optional>"), "{code}");
        assert!(code.contains("inline bool digits_only(const std::string& text) {"), "{code}");
        assert!(code.contains("inline std::optional<int64_t> parse_int(const std::string& text, int base) {"), "{code}");
    }

    #[test]
    fn test_operators() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.binary(
                BinaryOp::Mul,
                b.binary(BinaryOp::Add, b.ident("a"), b.ident("b")),
                b.ident("c")
            )),
            "(a + b) * c"
        );
        assert_eq!(
            emit_expr(b.binary(BinaryOp::Coalesce, b.ident("a"), b.int(0))),
            "a.value_or(0)"
        );
        assert_eq!(emit_expr(b.member(b.ego(), "nomen")), "this->nomen");
    }

    #[test]
    fn test_construct_wraps_variant() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.construct("Forma", "Circulus", vec![("radius", b.float(1.5))])),
            "Forma{Circulus{.radius = 1.5}}"
        );
    }

    #[test]
    fn test_closure_captures_by_reference() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.lambda(
                vec![b.param("x", "numerus")],
                b.binary(BinaryOp::Mul, b.ident("x"), b.int(2))
            )),
            "[&](int64_t x) { return x * 2; }"
        );
    }

    #[test]
    fn test_object_literal_fails() {
        let b = AstBuilder::new();
        let result = generate(b.object(vec![("a", b.int(1))]));
        assert!(matches!(result, Err(CodegenError::Unsupported { .. })));
    }

    #[test]
    fn test_filter_copies_matching_elements() {
        let b = AstBuilder::new();
        let filter = b.filter_where(b.ident("xs"), b.ident("activus"), &[]);
        assert_eq!(
            emit_expr(filter),
            "[&] { const auto& __src = xs; \
             std::vector<std::decay_t<decltype(__src)>::value_type> __out; \
             std::copy_if(__src.begin(), __src.end(), std::back_inserter(__out), \
             [&](const auto& item) { return item.activus; }); return __out; }()"
        );
    }
}
