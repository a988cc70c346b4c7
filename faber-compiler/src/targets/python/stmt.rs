use super::{test_identifier, PyEmitter};
use crate::analysis::{block_contains_await, is_trivially_pure, pattern_bindings};
use crate::backend::utils::{quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::{Features, Scoped};
use crate::targets::StmtEmitter;
use crate::Result;
use faber_ast::{
    Block, Expr, MatchStmt, Pattern, PrintLevel, Resource, ScopeStmt, Stmt, SwitchCase,
};

/// Case values a `match` statement can compare against without capturing
fn is_value_pattern(expr: &Expr) -> bool {
    match expr {
        Expr::Literal { .. } => true,
        Expr::Member { object, .. } => matches!(**object, Expr::Ident { .. } | Expr::Member { .. }),
        _ => false,
    }
}

impl PyEmitter {
    pub(super) fn emit_stmt(&mut self, stmt: &Stmt) -> Result<String> {
        match stmt {
            Stmt::Block(block) => self.stmts(&block.stmts),
            Stmt::Expr { expr, .. } => {
                let text = self.expr(expr)?;
                Ok(self.ctx.line(&text))
            }
            Stmt::Var(decl) => self.var_decl(decl),
            Stmt::Function(decl) => self.function(decl, false),
            Stmt::Class(decl) => self.class(decl),
            Stmt::Interface(decl) => self.interface(decl),
            Stmt::Enum(decl) => self.enum_decl(decl),
            Stmt::Union(decl) => self.union_decl(decl),
            Stmt::TypeAlias {
                name, generics, ty, ..
            } => self.type_alias(name, generics, ty),
            Stmt::Import(decl) => self.import(decl),
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => self.if_chain("if", cond, then, otherwise.as_deref()),
            Stmt::While { cond, body, .. } => {
                let cond = self.expr(cond)?;
                self.compound(&format!("while {cond}"), &body.stmts)
            }
            Stmt::DoWhile { body, cond, .. } => {
                let cond = self.expr(cond)?;
                let mut out = self.ctx.line("while True:");
                out.push_str(&self.indented(|this| {
                    let mut inner = this.stmts(&body.stmts)?;
                    inner.push_str(&this.ctx.line(&format!("if not ({cond}):")));
                    inner.push_str(&this.indented(|this| Ok(this.ctx.line("break")))?);
                    Ok(inner)
                })?);
                Ok(out)
            }
            Stmt::For {
                binding,
                iterable,
                body,
                is_async,
                ..
            } => {
                let binding = sanitize_identifier(binding, Target::Python);
                let iterable = self.expr(iterable)?;
                let asynchronous = if *is_async { "async " } else { "" };
                self.compound(
                    &format!("{asynchronous}for {binding} in {iterable}"),
                    &body.stmts,
                )
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
                    out.push_str(&self.compound(&format!("if {cond}"), &clause.body.stmts)?);
                }
                Ok(out)
            }
            Stmt::Try {
                body,
                catch,
                finally,
                ..
            } => {
                let mut out = self.compound("try", &body.stmts)?;
                if let Some(clause) = catch {
                    let binding = sanitize_identifier(&clause.binding, Target::Python);
                    out.push_str(
                        &self.compound(&format!("except Exception as {binding}"), &clause.body.stmts)?,
                    );
                }
                match finally {
                    Some(finally) => out.push_str(&self.compound("finally", &finally.stmts)?),
                    None if catch.is_none() => out.push_str(&self.compound("finally", &[])?),
                    None => {}
                }
                Ok(out)
            }
            Stmt::Return { value, .. } => {
                let text = match value {
                    Some(value) => format!("return {}", self.expr(value)?),
                    None => "return".to_string(),
                };
                Ok(self.ctx.line(&text))
            }
            Stmt::Throw { value, fatal, .. } => {
                let rendered = self.expr(value)?;
                let text = match (fatal, value) {
                    (true, _) => format!("raise SystemExit({rendered})"),
                    (false, Expr::New { .. }) => format!("raise {rendered}"),
                    (false, _) => format!("raise Exception({rendered})"),
                };
                Ok(self.ctx.line(&text))
            }
            Stmt::Print { level, args, .. } => {
                let args = self.list(args)?;
                let text = match level {
                    PrintLevel::Log | PrintLevel::Debug => format!("print({args})"),
                    PrintLevel::Warn => {
                        self.ctx.require(Features::CONSOLE);
                        if args.is_empty() {
                            "print(file=sys.stderr)".to_string()
                        } else {
                            format!("print({args}, file=sys.stderr)")
                        }
                    }
                };
                Ok(self.ctx.line(&text))
            }
            Stmt::Assert { cond, message, .. } => {
                let mut text = format!("assert {}", self.expr(cond)?);
                if let Some(message) = message {
                    text.push_str(", ");
                    text.push_str(&self.expr(message)?);
                }
                Ok(self.ctx.line(&text))
            }
            Stmt::Break { .. } => Ok(self.ctx.line("break")),
            Stmt::Continue { .. } => Ok(self.ctx.line("continue")),
            Stmt::Entry { body, is_async, .. } => {
                if !*is_async {
                    return self.compound("if __name__ == \"__main__\"", &body.stmts);
                }
                self.ctx.require(Features::ASYNC);
                let mut out = self.ctx.line("async def main():");
                out.push_str(&self.in_function(true, false, |this| this.suite(&body.stmts))?);
                out.push('\n');
                out.push_str(&self.ctx.line("if __name__ == \"__main__\":"));
                out.push_str(&self.indented(|this| Ok(this.ctx.line("asyncio.run(main())")))?);
                Ok(out)
            }
            Stmt::Scope(scope) => self.scope(scope),
            Stmt::TestSuite { name, body, .. } => {
                let mut out = self
                    .ctx
                    .line(&format!("class Test{}:", test_identifier(name, true)));
                let saved = self.in_suite;
                self.in_suite = true;
                let members = self.indented(|this| {
                    let mut members = Vec::new();
                    for stmt in body {
                        members.push(this.stmt(stmt)?);
                    }
                    if members.is_empty() {
                        Ok(this.ctx.line("pass"))
                    } else {
                        Ok(members.join("\n"))
                    }
                });
                self.in_suite = saved;
                out.push_str(&members?);
                Ok(out)
            }
            Stmt::Test { name, body, .. } => {
                let is_async = block_contains_await(body);
                let asynchronous = if is_async { "async " } else { "" };
                let receiver = if self.in_suite { "self" } else { "" };
                let mut out = self.ctx.line(&format!(
                    "{}def test_{}({}):",
                    asynchronous,
                    test_identifier(name, false),
                    receiver
                ));
                let saved = self.in_suite;
                self.in_suite = false;
                let body = self.in_function(is_async, false, |this| this.suite(&body.stmts));
                self.in_suite = saved;
                out.push_str(&body?);
                Ok(out)
            }
        }
    }

    fn if_chain(
        &mut self,
        keyword: &str,
        cond: &Expr,
        then: &Block,
        otherwise: Option<&Stmt>,
    ) -> Result<String> {
        let cond = self.expr(cond)?;
        let mut out = self.compound(&format!("{keyword} {cond}"), &then.stmts)?;
        match otherwise {
            None => {}
            Some(Stmt::If {
                cond,
                then,
                otherwise,
                ..
            }) => out.push_str(&self.if_chain("elif", cond, then, otherwise.as_deref())?),
            Some(Stmt::Block(block)) => out.push_str(&self.compound("else", &block.stmts)?),
            Some(other) => out.push_str(&self.compound("else", std::slice::from_ref(other))?),
        }
        Ok(out)
    }

    /// `match` when every case is a value pattern, an `if`/`elif` chain otherwise
    fn switch(
        &mut self,
        subject: &Expr,
        cases: &[SwitchCase],
        default: Option<&Block>,
    ) -> Result<String> {
        if cases.iter().all(|case| is_value_pattern(&case.value)) {
            let subject = self.expr(subject)?;
            let mut out = self.ctx.line(&format!("match {subject}:"));
            out.push_str(&self.indented(|this| {
                let mut arms = String::new();
                for case in cases {
                    let value = this.expr(&case.value)?;
                    arms.push_str(&this.compound(&format!("case {value}"), &case.body.stmts)?);
                }
                if let Some(default) = default {
                    arms.push_str(&this.compound("case _", &default.stmts)?);
                }
                if arms.is_empty() {
                    arms = this.compound("case _", &[])?;
                }
                Ok(arms)
            })?);
            return Ok(out);
        }

        let (mut out, subject) = self.bind_subject(subject)?;
        for (i, case) in cases.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "elif" };
            let value = self.expr(&case.value)?;
            out.push_str(&self.compound(&format!("{keyword} {subject} == {value}"), &case.body.stmts)?);
        }
        if let Some(default) = default {
            out.push_str(&self.compound("else", &default.stmts)?);
        }
        Ok(out)
    }

    fn bind_subject(&mut self, subject: &Expr) -> Result<(String, String)> {
        let text = self.expr(subject)?;
        if is_trivially_pure(subject) {
            return Ok((String::new(), text));
        }
        let name = self.ctx.fresh_temp("s");
        Ok((self.ctx.line(&format!("{name} = {text}")), name))
    }

    /// Mapping patterns keyed by the union's tag field
    fn match_stmt(&mut self, stmt: &MatchStmt) -> Result<String> {
        let subject = self.expr(&stmt.subject)?;
        let declared_tag = stmt
            .union
            .as_deref()
            .and_then(|name| self.ctx.union(name))
            .map(|info| info.tag_field.clone());

        let mut out = self.ctx.line(&format!("match {subject}:"));
        let arms = self.indented(|this| {
            let mut arms = String::new();
            for arm in &stmt.arms {
                let pattern = match &arm.pattern {
                    Pattern::Variant { name, .. } => {
                        let tag = declared_tag
                            .clone()
                            .or_else(|| this.ctx.union_of_variant(name).map(|u| u.tag_field.clone()))
                            .unwrap_or_else(|| "tag".to_string());
                        let mut entries = vec![format!("{}: {}", quote(&tag), quote(name))];
                        entries.extend(pattern_bindings(&arm.pattern).iter().map(|binding| {
                            format!(
                                "{}: {}",
                                quote(binding),
                                sanitize_identifier(binding, Target::Python)
                            )
                        }));
                        format!("{{{}}}", entries.join(", "))
                    }
                    Pattern::Wildcard => "_".to_string(),
                };
                arms.push_str(&this.compound(&format!("case {pattern}"), &arm.body.stmts)?);
            }
            if arms.is_empty() {
                arms = this.compound("case _", &[])?;
            }
            Ok(arms)
        })?;
        out.push_str(&arms);
        Ok(out)
    }

    fn scope(&mut self, scope: &ScopeStmt) -> Result<String> {
        match &scope.resource {
            Resource::Allocator { .. } => {
                let body = self.stmts(&scope.body.stmts)?;
                if body.is_empty() {
                    Ok(self.ctx.line("pass"))
                } else {
                    Ok(body)
                }
            }
            Resource::Value { init, release } => {
                let init = self.expr(init)?;
                let manager = match release {
                    Some(release) => {
                        self.ctx.require(Features::SCOPE_GUARD);
                        format!("_faber_scope({}, {})", init, quote(release))
                    }
                    None => init,
                };
                let header = match &scope.binding {
                    Some(name) => format!(
                        "with {} as {}",
                        manager,
                        sanitize_identifier(name, Target::Python)
                    ),
                    None => format!("with {manager}"),
                };
                self.compound(&header, &scope.body.stmts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::PythonBackend;
    use crate::backend::{CodegenBackend, CodegenOptions};
    use faber_ast::{AstBuilder, BinaryOp, Stmt, Unit};

    fn emit(body: Vec<Stmt>) -> String {
        PythonBackend::new()
            .unwrap()
            .generate_unit(&Unit::new("probatio", body), &CodegenOptions::default())
            .unwrap()
    }

    #[test]
    fn test_elif_chain() {
        let b = AstBuilder::new();
        let stmt = Stmt::If {
            cond: b.ident("a"),
            then: b.block(vec![b.scribe(vec![b.int(1)])]),
            otherwise: Some(Box::new(b.if_else(b.ident("b"), vec![], Some(vec![])))),
            span: b.span(),
        };
        assert_eq!(
            emit(vec![stmt]),
            "if a:\n    print(1)\nelif b:\n    pass\nelse:\n    pass\n"
        );
    }

    #[test]
    fn test_match_destructures_mapping() {
        let b = AstBuilder::new();
        let code = emit(vec![b.discerne(
            b.ident("forma"),
            Some("Forma"),
            vec![
                b.arm("Rectangulum", &["latitudo", "altitudo"], vec![b.scribe(vec![b.ident("latitudo")])]),
                b.arm("Vacuum", &[], vec![]),
            ],
        )]);
        assert_eq!(
            code,
            "match forma:\n    case {\"tag\": \"Rectangulum\", \"latitudo\": latitudo, \"altitudo\": altitudo}:\n        print(latitudo)\n    case {\"tag\": \"Vacuum\"}:\n        pass\n"
        );
    }

    #[test]
    fn test_resource_scope_uses_with() {
        let b = AstBuilder::new();
        let code = emit(vec![b.resource_scope(
            b.call(b.ident("open"), vec![b.text("a.txt")]),
            "fh",
            vec![b.scribe(vec![b.call(b.member(b.ident("fh"), "read"), vec![])])],
        )]);
        assert_eq!(code, "with open(\"a.txt\") as fh:\n    print(fh.read())\n");
    }

    #[test]
    fn test_do_while_emulation() {
        let b = AstBuilder::new();
        let stmt = Stmt::DoWhile {
            body: b.block(vec![b.expr_stmt(b.call(b.ident("step"), vec![]))]),
            cond: b.binary(BinaryOp::Lt, b.ident("i"), b.int(3)),
            span: b.span(),
        };
        assert_eq!(
            emit(vec![stmt]),
            "while True:\n    step()\n    if not (i < 3):\n        break\n"
        );
    }

    #[test]
    fn test_suite_methods_take_self() {
        let b = AstBuilder::new();
        let suite = Stmt::TestSuite {
            name: "arithmetica".into(),
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
            "class TestArithmetica:\n    def test_adds_numbers(self):\n        assert True\n"
        );
    }
}
