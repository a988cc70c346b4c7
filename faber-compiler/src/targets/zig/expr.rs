use super::{methods, ZigEmitter};
use crate::analysis::is_trivially_pure;
use crate::backend::utils::{float_literal, quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::Features;
use crate::format_string::{FormatPlan, Segment};
use crate::registry::CallParts;
use crate::targets::{lookup_method, needs_parens_tight, paren_if, InputCheck};
use crate::{CodegenError, Result};
use faber_ast::{
    BinaryOp, Conversion, ConversionKind, Expr, Literal, MathConstant, ObjectField, Radix, Span,
    StructureKind, UnaryOp,
};

fn precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Gt
        | BinaryOp::Ge => 3,
        BinaryOp::BitAnd | BinaryOp::BitXor | BinaryOp::BitOr | BinaryOp::Coalesce => 4,
        BinaryOp::Shl | BinaryOp::Shr => 5,
        BinaryOp::Add | BinaryOp::Sub => 6,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 7,
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::Coalesce => "orelse",
        other => other.c_symbol(),
    }
}

/// Comparisons do not chain, and the bitwise level mixes only with itself
fn needs_parens(child: &Expr, parent: BinaryOp, right: bool) -> bool {
    match child {
        Expr::Binary { op, .. } => {
            let (child_prec, parent_prec) = (precedence(*op), precedence(parent));
            child_prec < parent_prec
                || (right && child_prec == parent_prec)
                || (child_prec == parent_prec && (child_prec == 3 || child_prec == 4) && *op != parent)
        }
        Expr::Ternary { .. } | Expr::Assign { .. } => true,
        _ => false,
    }
}

fn is_text_literal(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Literal {
            value: Literal::Text(_),
            ..
        }
    )
}

fn is_float(expr: &Expr) -> bool {
    match expr {
        Expr::Literal {
            value: Literal::Float(_),
            ..
        }
        | Expr::Constant { .. } => true,
        Expr::Binary { lhs, rhs, .. } => is_float(lhs) || is_float(rhs),
        Expr::Unary { operand, .. } => is_float(operand),
        _ => false,
    }
}

/// `std.fmt` specifier for a value, judged from its shape
pub(super) fn specifier(expr: &Expr) -> &'static str {
    match expr {
        Expr::Literal { value, .. } => match value {
            Literal::Text(_) => "s",
            Literal::Integer(_) | Literal::Float(_) => "d",
            Literal::Bool(_) | Literal::Nil => "any",
        },
        Expr::Format { .. } | Expr::Read { .. } => "s",
        Expr::Convert(conversion) => match conversion.kind {
            ConversionKind::Text => "s",
            ConversionKind::Integer | ConversionKind::Float => "d",
            ConversionKind::Bool => "any",
        },
        Expr::Constant { .. } => "d",
        Expr::Binary { op, .. } => match op {
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor => "d",
            _ => "any",
        },
        _ => "any",
    }
}

/// Template text with braces doubled for `std.fmt`
pub(super) fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

impl ZigEmitter {
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

    /// `.{ .a = 1 }` field initialisers
    fn initialisers(&mut self, fields: &[ObjectField]) -> Result<String> {
        if fields.is_empty() {
            return Ok(".{}".to_string());
        }
        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            let value = self.expr(&field.value)?;
            parts.push(format!(".{} = {}", sanitize_identifier(&field.key, Target::Zig), value));
        }
        Ok(format!(".{{ {} }}", parts.join(", ")))
    }

    pub(super) fn expr(&mut self, expr: &Expr) -> Result<String> {
        Ok(match expr {
            Expr::Ident { name, .. } => sanitize_identifier(name, Target::Zig),
            Expr::SelfRef { .. } => "self".to_string(),
            Expr::Literal { value, .. } => match value {
                Literal::Integer(n) => n.to_string(),
                Literal::Float(f) => float_literal(*f),
                Literal::Text(text) => quote(text),
                Literal::Bool(b) => b.to_string(),
                Literal::Nil => "null".to_string(),
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
            } => format!(
                "if ({}) {} else {}",
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
                let field = sanitize_identifier(name, Target::Zig);
                if *optional {
                    format!("(if ({}) |__o| __o.{} else null)", self.expr(object)?, field)
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
                    } => format!("{}.get({}).?", object, quote(key)),
                    Expr::Literal {
                        value: Literal::Integer(n),
                        ..
                    } => format!("{object}[{n}]"),
                    other => format!("{}[@intCast({})]", object, self.expr(other)?),
                }
            }
            Expr::Array { elements, .. } => {
                if elements.is_empty() {
                    ".{}".to_string()
                } else {
                    format!(".{{ {} }}", self.list(elements)?)
                }
            }
            Expr::Object { fields, .. } => self.initialisers(fields)?,
            Expr::Closure(closure) => {
                return Err(CodegenError::unsupported(closure.span, Target::Zig, "closure"))
            }
            Expr::New { class, args, .. } => format!("{}.init({})", class, self.list(args)?),
            Expr::Construct {
                union,
                variant,
                fields,
                ..
            } => {
                let owner = union
                    .clone()
                    .or_else(|| self.ctx.union_of_variant(variant).map(|info| info.name.clone()));
                let payload = if fields.is_empty() {
                    "{}".to_string()
                } else {
                    self.initialisers(fields)?
                };
                match owner {
                    Some(owner) => format!("{owner}{{ .{variant} = {payload} }}"),
                    None => format!(".{{ .{variant} = {payload} }}"),
                }
            }
            Expr::Await { span, .. } => {
                return Err(CodegenError::unsupported(*span, Target::Zig, "cede (async)"))
            }
            Expr::Cast { expr, ty, .. } | Expr::Native { expr, ty, .. } => {
                let ty = self.render_type(ty);
                format!("@as({}, {})", ty, self.expr(expr)?)
            }
            Expr::Convert(conversion) => self.conversion(conversion)?,
            Expr::Format { template, args, .. } => self.format(template, args)?,
            Expr::Range { span, .. } => {
                return Err(CodegenError::unsupported(*span, Target::Zig, "range outside a loop"))
            }
            Expr::Filter(_) => {
                format!("{}({})", methods::MARKER, quote("ab filters are not available in Zig"))
            }
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
                    MathConstant::Pi => "std.math.pi".to_string(),
                    MathConstant::Tau => "std.math.tau".to_string(),
                    MathConstant::Euler => "std.math.e".to_string(),
                }
            }
        })
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<String> {
        let text_operands = is_text_literal(lhs) || is_text_literal(rhs);
        match op {
            BinaryOp::Eq | BinaryOp::NotEq if text_operands => {
                let compare = format!("std.mem.eql(u8, {}, {})", self.expr(lhs)?, self.expr(rhs)?);
                return Ok(if op == BinaryOp::Eq {
                    compare
                } else {
                    format!("!{compare}")
                });
            }
            BinaryOp::Div if !is_float(lhs) && !is_float(rhs) => {
                return Ok(format!("@divTrunc({}, {})", self.expr(lhs)?, self.expr(rhs)?));
            }
            BinaryOp::Rem => {
                return Ok(format!("@rem({}, {})", self.expr(lhs)?, self.expr(rhs)?));
            }
            _ => {}
        }
        let lhs = self.operand(lhs, op, false)?;
        let rhs = self.operand(rhs, op, true)?;
        Ok(format!("{} {} {}", lhs, symbol(op), rhs))
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
        let allocator = if methods::uses_allocator(&lookup) {
            Some(self.allocator())
        } else {
            None
        };
        let parts = CallParts::new(&receiver, &args).with_allocator(allocator.as_deref());
        Ok(registry.render(&lookup, &parts))
    }

    fn conversion(&mut self, conversion: &Conversion) -> Result<String> {
        let value = self.expr(&conversion.expr)?;
        let fallback = match &conversion.fallback {
            Some(fallback) => Some(self.expr(fallback)?),
            None => None,
        };
        let radix = conversion.radix.unwrap_or(Radix::Dec);
        let parse = |subject: &str| match conversion.kind {
            ConversionKind::Float => format!("std.fmt.parseFloat(f64, {subject})"),
            _ => format!("std.fmt.parseInt(i64, {}, {})", subject, radix.base()),
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
                InputCheck::Digits => format!(
                    "{subject}.len > 0 and std.mem.indexOfNone(u8, {subject}, \"0123456789\") == null"
                ),
                InputCheck::DigitsOrPoint => format!(
                    "{subject}.len > 0 and std.mem.indexOfNone(u8, {subject}, \"0123456789.\") == null"
                ),
                InputCheck::NonEmpty => format!("{subject}.len > 0"),
            };
            let guarded = format!("if ({}) ({} catch {}) else {}", guard, parse(&subject), fallback, fallback);
            return Ok(if pure {
                guarded
            } else {
                format!("blk: {{ const {subject} = {value}; break :blk {guarded}; }}")
            });
        }

        let settle = |parsed: String| match &fallback {
            Some(fallback) => format!("{parsed} catch {fallback}"),
            None => format!(
                "{} catch @panic({})",
                parsed,
                quote(&format!("invalid {}", conversion.kind.keyword()))
            ),
        };
        Ok(match conversion.kind {
            ConversionKind::Integer | ConversionKind::Float => settle(parse(&value)),
            ConversionKind::Bool => match &fallback {
                Some(fallback) => format!("std.mem.eql(u8, {value} orelse {fallback}, \"true\")"),
                None => format!("std.mem.eql(u8, {value}, \"true\")"),
            },
            ConversionKind::Text => {
                let allocator = self.allocator();
                let spec = specifier(&conversion.expr);
                let subject = match &fallback {
                    Some(fallback) => format!("{value} orelse {fallback}"),
                    None => value,
                };
                format!("std.fmt.allocPrint({allocator}, \"{{{spec}}}\", .{{{subject}}}) catch @panic(\"OOM\")")
            }
        })
    }

    /// `std.fmt.allocPrint` with the tuple in placeholder order
    fn format(&mut self, template: &str, args: &[Expr]) -> Result<String> {
        self.ctx.require(Features::FORMAT);
        let plan = FormatPlan::new(template, args.len());
        let rendered = self.each(args)?;
        let bound = plan.bind(args, rendered, &mut self.ctx);

        let mut literal = String::new();
        let mut tuple = Vec::new();
        for segment in &plan.segments {
            match segment {
                Segment::Text(text) => literal.push_str(&escape_braces(text)),
                Segment::Arg(index) => {
                    literal.push_str(&format!("{{{}}}", specifier(&args[*index])));
                    tuple.push(bound.reference(*index).to_string());
                }
                Segment::Missing(_) => literal.push_str("undefined"),
            }
        }
        let tuple = if tuple.is_empty() {
            ".{}".to_string()
        } else {
            format!(".{{ {} }}", tuple.join(", "))
        };
        let allocator = self.allocator();
        let call = format!(
            "std.fmt.allocPrint({}, {}, {}) catch @panic(\"OOM\")",
            allocator,
            quote(&literal),
            tuple
        );

        if bound.temps.is_empty() {
            return Ok(call);
        }
        let mut block = String::from("blk: { ");
        for temp in &bound.temps {
            if temp.referenced {
                block.push_str(&format!("const {} = {}; ", temp.name, temp.value));
            } else {
                block.push_str(&format!("_ = {}; ", temp.value));
            }
        }
        block.push_str(&format!("break :blk {call}; }}"));
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::super::ZigBackend;
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
        ZigBackend::new()?.generate_unit(&unit, &options)
    }

    fn emit_expr(expr: Expr) -> String {
        let code = generate(expr).unwrap();
        code.lines()
            .find_map(|line| line.trim_start().strip_prefix("const v = "))
            .unwrap()
            .trim_end_matches(';')
            .to_string()
    }

    #[test]
    fn test_format_reorders_tuple() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.format("§1 before §0", vec![b.ident("a"), b.ident("b")])),
            "std.fmt.allocPrint(allocator, \"{any} before {any}\", .{ b, a }) catch @panic(\"OOM\")"
        );
    }

    #[test]
    fn test_format_binds_repeated_call_once() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.format("§0-§0", vec![b.call(b.ident("next"), vec![])])),
            "blk: { const __f0 = next(); break :blk std.fmt.allocPrint(allocator, \"{any}-{any}\", .{ __f0, __f0 }) catch @panic(\"OOM\"); }"
        );
    }

    #[test]
    fn test_missing_placeholder() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.format("§0 and §2", vec![b.text("x")])),
            "std.fmt.allocPrint(allocator, \"{s} and undefined\", .{ \"x\" }) catch @panic(\"OOM\")"
        );
    }

    #[test]
    fn test_conversions() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.conversion(b.text("ff"), ConversionKind::Integer, Some(Radix::Hex), None)),
            "std.fmt.parseInt(i64, \"ff\", 16) catch @panic(\"invalid numeratum\")"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Float, None, Some(b.float(0.5)))),
            "if (s.len > 0 and std.mem.indexOfNone(u8, s, \"0123456789.\") == null) (std.fmt.parseFloat(f64, s) catch 0.5) else 0.5"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Integer, None, Some(b.int(0)))),
            "if (s.len > 0 and std.mem.indexOfNone(u8, s, \"0123456789\") == null) (std.fmt.parseInt(i64, s, 10) catch 0) else 0"
        );
        assert_eq!(
            emit_expr(b.conversion(b.ident("s"), ConversionKind::Integer, Some(Radix::Bin), Some(b.int(0)))),
            "if (s.len > 0) (std.fmt.parseInt(i64, s, 2) catch 0) else 0"
        );
        assert_eq!(
            emit_expr(b.conversion(b.call(b.ident("next"), vec![]), ConversionKind::Integer, Some(Radix::Hex), Some(b.int(0)))),
            "blk: { const __c0 = next(); break :blk if (__c0.len > 0) (std.fmt.parseInt(i64, __c0, 16) catch 0) else 0; }"
        );
    }

    #[test]
    fn test_integer_division_and_text_equality() {
        let b = AstBuilder::new();
        assert_eq!(
            emit_expr(b.binary(BinaryOp::Div, b.ident("a"), b.int(2))),
            "@divTrunc(a, 2)"
        );
        assert_eq!(
            emit_expr(b.binary(BinaryOp::Eq, b.ident("s"), b.text("x"))),
            "std.mem.eql(u8, s, \"x\")"
        );
        assert_eq!(
            emit_expr(b.binary(BinaryOp::Coalesce, b.ident("a"), b.int(0))),
            "a orelse 0"
        );
    }

    #[test]
    fn test_closures_fail() {
        let b = AstBuilder::new();
        let result = generate(b.lambda(vec![b.param("x", "numerus")], b.ident("x")));
        assert!(matches!(result, Err(CodegenError::Unsupported { .. })));
    }

    #[test]
    fn test_filter_renders_marker() {
        let b = AstBuilder::new();
        let filter = b.filter_where(b.ident("xs"), b.ident("activus"), &[]);
        assert_eq!(
            emit_expr(filter),
            "@compileError(\"ab filters are not available in Zig\")"
        );
    }
}
