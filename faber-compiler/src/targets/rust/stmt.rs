use super::RsEmitter;
use crate::analysis::{block_contains_await, is_trivially_pure, pattern_bindings};
use crate::backend::utils::{quote, sanitize_identifier, snake_identifier};
use crate::backend::Target;
use crate::context::{Features, Scoped};
use crate::targets::{check_bindings, needs_parens_tight, paren_if, StmtEmitter};
use crate::{CodegenError, Result};
use faber_ast::{
    Block, CatchClause, Expr, IterMode, Literal, MatchStmt, Pattern, PrintLevel, Resource,
    ScopeStmt, Span, Stmt, SwitchCase,
};

impl RsEmitter {
    pub(super) fn emit_stmt(&mut self, stmt: &Stmt) -> Result<String> {
        match stmt {
            Stmt::Block(block) => {
                let block = self.braced(&block.stmts)?;
                Ok(self.ctx.line(&block))
            }
            Stmt::Expr { expr, .. } => {
                let text = self.expr(expr)?;
                Ok(self.ctx.line(&format!("{text};")))
            }
            Stmt::Var(decl) => self.var_decl(decl),
            Stmt::Function(decl) => self.function(decl, decl.is_public),
            Stmt::Class(decl) => self.class(decl),
            Stmt::Interface(decl) => self.interface(decl),
            Stmt::Enum(decl) => self.enum_decl(decl),
            Stmt::Union(decl) => self.union_decl(decl),
            Stmt::TypeAlias {
                name,
                generics,
                ty,
                is_public,
                ..
            } => self.type_alias(name, generics, ty, *is_public),
            Stmt::Import(decl) => self.import(decl),
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                let chain = self.if_chain(cond, then, otherwise.as_deref())?;
                Ok(self.ctx.line(&chain))
            }
            Stmt::While { cond, body, .. } => {
                let cond = self.expr(cond)?;
                let body = self.braced(&body.stmts)?;
                Ok(self.ctx.line(&format!("while {cond} {body}")))
            }
            Stmt::DoWhile { body, cond, .. } => {
                let cond = self.expr(cond)?;
                let mut out = self.ctx.line("loop {");
                out.push_str(&self.indented(|this| {
                    let mut inner = this.stmts(&body.stmts)?;
                    inner.push_str(&this.ctx.line(&format!("if !({cond}) {{ break; }}")));
                    Ok(inner)
                })?);
                out.push_str(&self.ctx.line("}"));
                Ok(out)
            }
            Stmt::For {
                binding,
                iterable,
                body,
                mode,
                is_async,
                span,
            } => {
                if *is_async {
                    return Err(CodegenError::unsupported(*span, Target::Rust, "async iteration"));
                }
                let iterable = match (mode, iterable) {
                    (
                        IterMode::Values,
                        Expr::Range {
                            start,
                            end,
                            inclusive,
                            ..
                        },
                    ) => {
                        let start = paren_if(self.expr(start)?, needs_parens_tight(start));
                        let end = paren_if(self.expr(end)?, needs_parens_tight(end));
                        let dots = if *inclusive { "..=" } else { ".." };
                        format!("{start}{dots}{end}")
                    }
                    (IterMode::Keys, iterable) => {
                        let text = paren_if(self.expr(iterable)?, needs_parens_tight(iterable));
                        format!("{text}.keys()")
                    }
                    (IterMode::Values, iterable) if is_trivially_pure(iterable) => {
                        format!("&{}", self.expr(iterable)?)
                    }
                    (IterMode::Values, iterable) => self.expr(iterable)?,
                };
                let binding = sanitize_identifier(binding, Target::Rust);
                let body = self.braced(&body.stmts)?;
                Ok(self.ctx.line(&format!("for {binding} in {iterable} {body}")))
            }
            Stmt::Switch {
                subject,
                cases,
                default,
                ..
            } => self.switch(subject, cases, default.as_ref()),
            Stmt::Match(stmt) => self.match_stmt(stmt),
            Stmt::Guard { clauses, .. } => {
                let mut out = String::new();
                for clause in clauses {
                    let cond = self.expr(&clause.cond)?;
                    let body = self.braced(&clause.body.stmts)?;
                    out.push_str(&self.ctx.line(&format!("if {cond} {body}")));
                }
                Ok(out)
            }
            Stmt::Try {
                body,
                catch,
                finally,
                ..
            } => self.try_stmt(body, catch.as_ref(), finally.as_ref()),
            Stmt::Return { value, .. } => match value {
                Some(value) => {
                    let value = self.expr(value)?;
                    Ok(self.ctx.line(&format!("return {value};")))
                }
                None => Ok(self.ctx.line("return;")),
            },
            Stmt::Throw { value, fatal, .. } => {
                let value = self.expr(value)?;
                if *fatal {
                    let mut out = self.ctx.line("{");
                    out.push_str(&self.indented(|this| {
                        let mut inner = this.ctx.line(&format!("eprintln!(\"{{}}\", {value});"));
                        inner.push_str(&this.ctx.line("std::process::exit(1);"));
                        Ok(inner)
                    })?);
                    out.push_str(&self.ctx.line("}"));
                    Ok(out)
                } else {
                    self.ctx.require(Features::EXCEPTIONS);
                    Ok(self.ctx.line(&format!("std::panic::panic_any({value});")))
                }
            }
            Stmt::Print { level, args, .. } => self.print(*level, args),
            Stmt::Assert { cond, message, .. } => {
                let cond = self.expr(cond)?;
                let text = match message {
                    Some(message) => format!("assert!({}, \"{{}}\", {});", cond, self.expr(message)?),
                    None => format!("assert!({cond});"),
                };
                Ok(self.ctx.line(&text))
            }
            Stmt::Break { .. } => Ok(self.ctx.line("break;")),
            Stmt::Continue { .. } => Ok(self.ctx.line("continue;")),
            Stmt::Entry { body, is_async, .. } => {
                self.in_function(*is_async, false, |this| this.stmts(&body.stmts))
            }
            Stmt::Scope(scope) => self.scope(scope),
            Stmt::TestSuite { name, body, .. } => {
                self.ctx.require(Features::TESTING);
                let mut out = self.ctx.line("#[cfg(test)]");
                out.push_str(&self.ctx.line(&format!("mod {} {{", snake_identifier(name))));
                out.push_str(&self.indented(|this| {
                    let mut inner = this.ctx.line("use super::*;");
                    if !body.is_empty() {
                        inner.push('\n');
                        let members: Vec<&Stmt> = body.iter().collect();
                        inner.push_str(&this.items(&members)?);
                    }
                    Ok(inner)
                })?);
                out.push_str(&self.ctx.line("}"));
                Ok(out)
            }
            Stmt::Test { name, body, .. } => {
                self.ctx.require(Features::TESTING);
                let is_async = block_contains_await(body);
                let mut out = if is_async {
                    self.ctx.require(Features::ASYNC);
                    self.ctx.line("#[tokio::test]")
                } else {
                    self.ctx.line("#[test]")
                };
                let body = self.in_function(is_async, false, |this| this.braced(&body.stmts))?;
                let asynchronous = if is_async { "async " } else { "" };
                out.push_str(&self.ctx.line(&format!(
                    "{}fn {}() {}",
                    asynchronous,
                    snake_identifier(name),
                    body
                )));
                Ok(out)
            }
        }
    }

    /// `if c { .. } else if d { .. } else { .. }` starting at the current column
    fn if_chain(&mut self, cond: &Expr, then: &Block, otherwise: Option<&Stmt>) -> Result<String> {
        let mut text = format!("if {} {}", self.expr(cond)?, self.braced(&then.stmts)?);
        match otherwise {
            None => {}
            Some(Stmt::If {
                cond,
                then,
                otherwise,
                ..
            }) => {
                text.push_str(" else ");
                text.push_str(&self.if_chain(cond, then, otherwise.as_deref())?);
            }
            Some(Stmt::Block(block)) => {
                text.push_str(" else ");
                text.push_str(&self.braced(&block.stmts)?);
            }
            Some(other) => {
                text.push_str(" else ");
                text.push_str(&self.braced(std::slice::from_ref(other))?);
            }
        }
        Ok(text)
    }

    /// Pattern text when a case value can be matched structurally
    fn case_pattern(&self, value: &Expr) -> Option<(String, bool)> {
        match value {
            Expr::Literal {
                value: Literal::Integer(n),
                ..
            } => Some((n.to_string(), false)),
            Expr::Literal {
                value: Literal::Bool(b),
                ..
            } => Some((b.to_string(), false)),
            Expr::Literal {
                value: Literal::Text(text),
                ..
            } => Some((quote(text), true)),
            Expr::Member { object, name, .. } => match object.as_ref() {
                Expr::Ident { name: owner, .. } if self.types.contains(owner) => {
                    Some((format!("{owner}::{name}"), false))
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn switch(&mut self, subject: &Expr, cases: &[SwitchCase], default: Option<&Block>) -> Result<String> {
        let patterns: Option<Vec<(String, bool)>> =
            cases.iter().map(|case| self.case_pattern(&case.value)).collect();
        let textual = patterns
            .as_ref()
            .map(|patterns| patterns.iter().map(|(_, text)| *text).collect::<Vec<_>>());
        let uniform = match &textual {
            Some(kinds) => kinds.iter().all(|k| *k) || kinds.iter().all(|k| !*k),
            None => false,
        };

        if let (Some(patterns), true) = (patterns, uniform) {
            let text_subject = patterns.first().map(|(_, text)| *text).unwrap_or(false);
            let subject = paren_if(self.expr(subject)?, needs_parens_tight(subject));
            let subject = if text_subject {
                format!("{subject}.as_str()")
            } else {
                subject
            };
            let mut out = self.ctx.line(&format!("match {subject} {{"));
            out.push_str(&self.indented(|this| {
                let mut arms = String::new();
                for ((pattern, _), case) in patterns.iter().zip(cases) {
                    let body = this.braced(&case.body.stmts)?;
                    arms.push_str(&this.ctx.line(&format!("{pattern} => {body}")));
                }
                let fallback = match default {
                    Some(block) => this.braced(&block.stmts)?,
                    None => "{}".to_string(),
                };
                arms.push_str(&this.ctx.line(&format!("_ => {fallback}")));
                Ok(arms)
            })?);
            out.push_str(&self.ctx.line("}"));
            return Ok(out);
        }

        let mut out = String::new();
        let subject = if is_trivially_pure(subject) {
            self.expr(subject)?
        } else {
            let name = self.ctx.fresh_temp("s");
            let value = self.expr(subject)?;
            out.push_str(&self.ctx.line(&format!("let {name} = {value};")));
            name
        };
        if cases.is_empty() {
            if let Some(block) = default {
                let body = self.braced(&block.stmts)?;
                out.push_str(&self.ctx.line(&body));
            }
            return Ok(out);
        }
        let mut chain = String::new();
        for (i, case) in cases.iter().enumerate() {
            let value = self.expr(&case.value)?;
            let body = self.braced(&case.body.stmts)?;
            if i > 0 {
                chain.push_str(" else ");
            }
            chain.push_str(&format!("if {subject} == {value} {body}"));
        }
        if let Some(block) = default {
            chain.push_str(&format!(" else {}", self.braced(&block.stmts)?));
        }
        out.push_str(&self.ctx.line(&chain));
        Ok(out)
    }

    fn variant_pattern(
        &self,
        union: Option<&str>,
        name: &str,
        bindings: &[String],
        span: Span,
    ) -> Result<String> {
        let info = union
            .and_then(|union| self.ctx.union(union))
            .or_else(|| self.ctx.union_of_variant(name));
        check_bindings(info, name, bindings, span, Target::Rust)?;
        let path = match info {
            Some(info) => format!("{}::{}", info.name, name),
            None => name.to_string(),
        };
        let fields = info.and_then(|info| info.fields_of(name));
        let bound: Vec<String> = bindings
            .iter()
            .map(|binding| sanitize_identifier(binding, Target::Rust))
            .collect();
        Ok(match fields {
            Some([]) => path,
            Some(_) if bound.is_empty() => format!("{path} {{ .. }}"),
            Some(fields) if bound.len() < fields.len() => {
                format!("{} {{ {}, .. }}", path, bound.join(", "))
            }
            Some(_) => format!("{} {{ {} }}", path, bound.join(", ")),
            None if bound.is_empty() => path,
            None => format!("{} {{ {}, .. }}", path, bound.join(", ")),
        })
    }

    fn match_stmt(&mut self, stmt: &MatchStmt) -> Result<String> {
        let subject = match &stmt.subject {
            Expr::SelfRef { .. } => "self".to_string(),
            other => format!("&{}", paren_if(self.expr(other)?, needs_parens_tight(other))),
        };
        let union = stmt.union.as_deref();
        let info = union.and_then(|name| self.ctx.union(name)).or_else(|| {
            stmt.arms.iter().find_map(|arm| match &arm.pattern {
                Pattern::Variant { name, .. } => self.ctx.union_of_variant(name),
                Pattern::Wildcard => None,
            })
        });
        let exhaustive = stmt.arms.iter().any(|arm| arm.pattern == Pattern::Wildcard)
            || info.is_some_and(|info| {
                info.variants.iter().all(|(variant, _)| {
                    stmt.arms.iter().any(|arm| {
                        matches!(&arm.pattern, Pattern::Variant { name, .. } if name == variant)
                    })
                })
            });
        let union = info.map(|info| info.name.clone());

        let mut out = self.ctx.line(&format!("match {subject} {{"));
        out.push_str(&self.indented(|this| {
            let mut arms = String::new();
            for arm in &stmt.arms {
                let pattern = match &arm.pattern {
                    Pattern::Variant { name, .. } => this.variant_pattern(
                        union.as_deref(),
                        name,
                        pattern_bindings(&arm.pattern),
                        arm.span,
                    )?,
                    Pattern::Wildcard => "_".to_string(),
                };
                let body = this.braced(&arm.body.stmts)?;
                arms.push_str(&this.ctx.line(&format!("{pattern} => {body}")));
            }
            if !exhaustive {
                arms.push_str(&this.ctx.line("_ => {}"));
            }
            Ok(arms)
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    /// Panics stand in for exceptions; the catch body sees the payload as text
    fn try_stmt(&mut self, body: &Block, catch: Option<&CatchClause>, finally: Option<&Block>) -> Result<String> {
        self.ctx.require(Features::EXCEPTIONS);
        let guarded = self.braced(&body.stmts)?;
        let call = format!("std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {guarded}))");
        let mut out = String::new();
        match catch {
            Some(clause) => {
                out.push_str(&self.ctx.line(&format!("if let Err(__payload) = {call} {{")));
                out.push_str(&self.indented(|this| {
                    let binding = sanitize_identifier(&clause.binding, Target::Rust);
                    let mut inner = this.ctx.line(&format!(
                        "let {binding} = __payload.downcast_ref::<String>().cloned().unwrap_or_default();"
                    ));
                    inner.push_str(&this.stmts(&clause.body.stmts)?);
                    Ok(inner)
                })?);
                out.push_str(&self.ctx.line("}"));
                if let Some(finally) = finally {
                    out.push_str(&self.stmts(&finally.stmts)?);
                }
            }
            None => {
                out.push_str(&self.ctx.line(&format!("let __outcome = {call};")));
                if let Some(finally) = finally {
                    out.push_str(&self.stmts(&finally.stmts)?);
                }
                out.push_str(&self.ctx.line(
                    "if let Err(__payload) = __outcome { std::panic::resume_unwind(__payload); }",
                ));
            }
        }
        Ok(out)
    }

    fn print(&mut self, level: PrintLevel, args: &[Expr]) -> Result<String> {
        let mac = match level {
            PrintLevel::Warn => "eprintln!",
            PrintLevel::Log | PrintLevel::Debug => "println!",
        };
        let mut pieces = Vec::with_capacity(args.len());
        let mut values = Vec::new();
        for arg in args {
            match (level, arg) {
                (
                    PrintLevel::Log | PrintLevel::Warn,
                    Expr::Literal {
                        value: Literal::Text(text),
                        ..
                    },
                ) => pieces.push(text.replace('{', "{{").replace('}', "}}")),
                (PrintLevel::Debug, _) => {
                    pieces.push("{:?}".to_string());
                    values.push(self.expr(arg)?);
                }
                _ => {
                    pieces.push("{}".to_string());
                    values.push(self.expr(arg)?);
                }
            }
        }
        if pieces.is_empty() {
            return Ok(self.ctx.line(&format!("{mac}();")));
        }
        let mut text = format!("{}({}", mac, quote(&pieces.join(" ")));
        for value in values {
            text.push_str(", ");
            text.push_str(&value);
        }
        text.push_str(");");
        Ok(self.ctx.line(&text))
    }

    /// Resources are released by `Drop` when the block ends, on every exit
    /// path, so a declared release method is never called explicitly
    fn scope(&mut self, scope: &ScopeStmt) -> Result<String> {
        match &scope.resource {
            Resource::Allocator { .. } => {
                let block = self.braced(&scope.body.stmts)?;
                Ok(self.ctx.line(&block))
            }
            Resource::Value { init, .. } => {
                let init = self.expr(init)?;
                let binding = scope
                    .binding
                    .as_deref()
                    .map(|name| sanitize_identifier(name, Target::Rust))
                    .unwrap_or_else(|| "_resource".to_string());
                let mut out = self.ctx.line("{");
                out.push_str(&self.indented(|this| {
                    let mut inner = this.ctx.line(&format!("let {binding} = {init};"));
                    inner.push_str(&this.stmts(&scope.body.stmts)?);
                    Ok(inner)
                })?);
                out.push_str(&self.ctx.line("}"));
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::RustBackend;
    use crate::backend::{CodegenBackend, CodegenOptions};
    use faber_ast::{AstBuilder, BinaryOp, Resource, Stmt, Unit};

    fn emit(body: Vec<Stmt>) -> String {
        RustBackend::new()
            .unwrap()
            .generate_unit(&Unit::new("probatio", body), &CodegenOptions::default())
            .unwrap()
    }

    #[test]
    fn test_else_if_chain() {
        let b = AstBuilder::new();
        let inner = b.if_else(b.ident("b"), vec![], Some(vec![b.scribe(vec![b.text("nihil")])]));
        let outer = b.if_else(b.ident("a"), vec![b.scribe(vec![b.int(1)])], None);
        let outer = match outer {
            Stmt::If { cond, then, span, .. } => Stmt::If {
                cond,
                then,
                otherwise: Some(Box::new(inner)),
                span,
            },
            other => other,
        };
        assert_eq!(
            emit(vec![b.entry(vec![outer])]),
            "fn main() {\n    if a {\n        println!(\"{}\", 1);\n    } else if b {} else {\n        println!(\"nihil\");\n    }\n}\n"
        );
    }

    #[test]
    fn test_match_binds_variant_fields() {
        let b = AstBuilder::new();
        let code = emit(vec![
            b.union(
                "Forma",
                vec![
                    (
                        "Rectangulum",
                        vec![("latitudo", b.ty("fractus")), ("altitudo", b.ty("fractus"))],
                    ),
                    ("Vacuum", vec![]),
                ],
            ),
            b.entry(vec![b.discerne(
                b.ident("forma"),
                Some("Forma"),
                vec![
                    b.arm(
                        "Rectangulum",
                        &["latitudo", "altitudo"],
                        vec![b.scribe(vec![b.binary(
                            BinaryOp::Mul,
                            b.ident("latitudo"),
                            b.ident("altitudo"),
                        )])],
                    ),
                    b.arm("Vacuum", &[], vec![]),
                ],
            )]),
        ]);
        assert!(code.contains(
            "    match &forma {\n        Forma::Rectangulum { latitudo, altitudo } => {\n            println!(\"{}\", latitudo * altitudo);\n        }\n        Forma::Vacuum => {}\n    }\n"
        ));
    }

    #[test]
    fn test_match_binds_by_field_name() {
        let b = AstBuilder::new();
        let code = emit(vec![
            b.union(
                "Forma",
                vec![(
                    "Rectangulum",
                    vec![("latitudo", b.ty("fractus")), ("altitudo", b.ty("fractus"))],
                )],
            ),
            b.entry(vec![b.discerne(
                b.ident("forma"),
                Some("Forma"),
                vec![
                    b.arm("Rectangulum", &["altitudo"], vec![b.scribe(vec![b.ident("altitudo")])]),
                ],
            )]),
        ]);
        assert!(code.contains("Forma::Rectangulum { altitudo, .. } => {"), "{code}");
        assert!(!code.contains("latitudo: altitudo"), "{code}");
    }

    #[test]
    fn test_do_while_becomes_loop() {
        let b = AstBuilder::new();
        let stmt = Stmt::DoWhile {
            body: b.block(vec![b.expr_stmt(b.call(b.ident("step"), vec![]))]),
            cond: b.binary(BinaryOp::Lt, b.ident("i"), b.int(3)),
            span: b.span(),
        };
        assert_eq!(
            emit(vec![b.entry(vec![stmt])]),
            "fn main() {\n    loop {\n        step();\n        if !(i < 3) { break; }\n    }\n}\n"
        );
    }

    #[test]
    fn test_resource_scope_is_block() {
        let b = AstBuilder::new();
        let scope = b.resource_scope(
            b.call(b.ident("aperi"), vec![b.text("a.txt")]),
            "fh",
            vec![b.expr_stmt(b.call(b.ident("lege_totum"), vec![b.ident("fh")]))],
        );
        assert_eq!(
            emit(vec![b.entry(vec![scope])]),
            "fn main() {\n    {\n        let fh = aperi(String::from(\"a.txt\"));\n        lege_totum(fh);\n    }\n}\n"
        );
    }

    #[test]
    fn test_early_return_leaves_release_to_drop() {
        let b = AstBuilder::new();
        let mut scope = b.resource_scope(
            b.call(b.ident("aperi"), vec![b.text("a.txt")]),
            "fh",
            vec![
                b.if_else(b.ident("vacuum"), vec![b.redde(None)], None),
                b.expr_stmt(b.call(b.ident("lege_totum"), vec![b.ident("fh")])),
            ],
        );
        if let Stmt::Scope(scope) = &mut scope {
            if let Resource::Value { release, .. } = &mut scope.resource {
                *release = Some("solve".to_string());
            }
        }
        let code = emit(vec![Stmt::Function(b.function("lege", vec![], None, vec![scope]))]);
        assert!(code.contains("        let fh = aperi(String::from(\"a.txt\"));\n        if vacuum {\n            return;\n        }\n"), "{code}");
        assert!(!code.contains("fh.solve()"), "{code}");
    }

    #[test]
    fn test_suite_becomes_test_module() {
        let b = AstBuilder::new();
        let suite = Stmt::TestSuite {
            name: "Arithmetica".into(),
            body: vec![Stmt::Test {
                name: "adds numbers".into(),
                body: b.block(vec![Stmt::Assert {
                    cond: b.bool(true),
                    message: None,
                    span: b.span(),
                }]),
                span: b.span(),
            }],
            span: b.span(),
        };
        assert_eq!(
            emit(vec![suite]),
            "#[cfg(test)]\nmod arithmetica {\n    use super::*;\n\n    #[test]\n    fn adds_numbers() {\n        assert!(true);\n    }\n}\n"
        );
    }
}
