use super::TsEmitter;
use crate::analysis::{block_contains_await, contains_await, is_trivially_pure, pattern_bindings};
use crate::backend::utils::{quote, sanitize_identifier};
use crate::backend::Target;
use crate::context::{Features, Scoped};
use crate::targets::StmtEmitter;
use crate::Result;
use faber_ast::{Block, Expr, IterMode, MatchStmt, Pattern, PrintLevel, Resource, ScopeStmt, Stmt};

impl TsEmitter {
    pub(super) fn emit_stmt(&mut self, stmt: &Stmt) -> Result<String> {
        match stmt {
            Stmt::Block(block) => {
                let text = self.braced(&block.stmts)?;
                Ok(self.ctx.line(&text))
            }
            Stmt::Expr { expr, .. } => {
                let text = self.expr(expr)?;
                Ok(self.ctx.line(&format!("{text};")))
            }
            Stmt::Var(decl) => self.var_decl(decl),
            Stmt::Function(decl) => self.function(decl),
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
                let text = self.if_chain(cond, then, otherwise.as_deref())?;
                Ok(self.ctx.line(&text))
            }
            Stmt::While { cond, body, .. } => {
                let cond = self.expr(cond)?;
                let body = self.braced(&body.stmts)?;
                Ok(self.ctx.line(&format!("while ({cond}) {body}")))
            }
            Stmt::DoWhile { body, cond, .. } => {
                let body = self.braced(&body.stmts)?;
                let cond = self.expr(cond)?;
                Ok(self.ctx.line(&format!("do {body} while ({cond});")))
            }
            Stmt::For {
                binding,
                iterable,
                body,
                mode,
                is_async,
                ..
            } => {
                let binding = sanitize_identifier(binding, Target::TypeScript);
                if let (Expr::Range { start, end, inclusive, .. }, IterMode::Values, false) =
                    (iterable, mode, is_async)
                {
                    let start = self.expr(start)?;
                    let end = self.expr(end)?;
                    let cmp = if *inclusive { "<=" } else { "<" };
                    let body = self.braced(&body.stmts)?;
                    return Ok(self.ctx.line(&format!(
                        "for (let {binding} = {start}; {binding} {cmp} {end}; {binding}++) {body}"
                    )));
                }
                let keyword = match mode {
                    IterMode::Values => "of",
                    IterMode::Keys => "in",
                };
                let asynchronous = if *is_async { "await " } else { "" };
                let iterable = self.expr(iterable)?;
                let body = self.braced(&body.stmts)?;
                Ok(self.ctx.line(&format!(
                    "for {asynchronous}(const {binding} {keyword} {iterable}) {body}"
                )))
            }
            Stmt::Switch {
                subject,
                cases,
                default,
                ..
            } => {
                let (mut out, subject) = self.bind_subject(subject)?;
                let mut text = String::new();
                for (i, case) in cases.iter().enumerate() {
                    let value = self.expr(&case.value)?;
                    let body = self.braced(&case.body.stmts)?;
                    if i > 0 {
                        text.push_str(" else ");
                    }
                    text.push_str(&format!("if ({subject} === {value}) {body}"));
                }
                if let Some(default) = default {
                    let body = self.braced(&default.stmts)?;
                    if text.is_empty() {
                        text = body;
                    } else {
                        text.push_str(&format!(" else {body}"));
                    }
                }
                if !text.is_empty() {
                    out.push_str(&self.ctx.line(&text));
                }
                Ok(out)
            }
            Stmt::Match(stmt) => self.match_stmt(stmt),
            Stmt::Guard { clauses, .. } => {
                let mut out = String::new();
                for clause in clauses {
                    let cond = self.expr(&clause.cond)?;
                    let body = self.braced(&clause.body.stmts)?;
                    out.push_str(&self.ctx.line(&format!("if ({cond}) {body}")));
                }
                Ok(out)
            }
            Stmt::Try {
                body,
                catch,
                finally,
                ..
            } => {
                let mut text = format!("try {}", self.braced(&body.stmts)?);
                if let Some(clause) = catch {
                    let binding = sanitize_identifier(&clause.binding, Target::TypeScript);
                    let handler = self.braced(&clause.body.stmts)?;
                    text.push_str(&format!(" catch ({binding}) {handler}"));
                }
                match finally {
                    Some(finally) => {
                        text.push_str(&format!(" finally {}", self.braced(&finally.stmts)?));
                    }
                    None if catch.is_none() => text.push_str(" finally {}"),
                    None => {}
                }
                Ok(self.ctx.line(&text))
            }
            Stmt::Return { value, .. } => {
                let text = match value {
                    Some(value) => format!("return {};", self.expr(value)?),
                    None => "return;".to_string(),
                };
                Ok(self.ctx.line(&text))
            }
            Stmt::Throw { value, fatal, .. } => {
                let value = self.expr(value)?;
                let text = if *fatal {
                    format!("throw new Error({value});")
                } else {
                    format!("throw {value};")
                };
                Ok(self.ctx.line(&text))
            }
            Stmt::Print { level, args, .. } => {
                let method = match level {
                    PrintLevel::Log => "log",
                    PrintLevel::Debug => "debug",
                    PrintLevel::Warn => "warn",
                };
                self.ctx.require(Features::CONSOLE);
                let args = self.list(args)?;
                Ok(self.ctx.line(&format!("console.{method}({args});")))
            }
            Stmt::Assert { cond, message, .. } => {
                self.ctx.require(Features::ASSERT);
                let mut text = format!("console.assert({}", self.expr(cond)?);
                if let Some(message) = message {
                    text.push_str(", ");
                    text.push_str(&self.expr(message)?);
                }
                text.push_str(");");
                Ok(self.ctx.line(&text))
            }
            Stmt::Break { .. } => Ok(self.ctx.line("break;")),
            Stmt::Continue { .. } => Ok(self.ctx.line("continue;")),
            Stmt::Entry { body, is_async, .. } => {
                if *is_async {
                    self.ctx.require(Features::ASYNC);
                    let body = self.in_function(true, false, |this| this.braced(&body.stmts))?;
                    Ok(self.ctx.line(&format!("(async () => {body})();")))
                } else {
                    self.stmts(&body.stmts)
                }
            }
            Stmt::Scope(scope) => self.scope(scope),
            Stmt::TestSuite { name, body, .. } => {
                self.ctx.require(Features::TESTING);
                let asynchronous = if contains_await(body) { "async " } else { "" };
                let body = self.braced(body)?;
                Ok(self.ctx.line(&format!(
                    "describe({}, {asynchronous}() => {body});",
                    quote(name)
                )))
            }
            Stmt::Test { name, body, .. } => {
                self.ctx.require(Features::TESTING);
                let is_async = block_contains_await(body);
                let asynchronous = if is_async { "async " } else { "" };
                let body = self.in_function(is_async, false, |this| this.braced(&body.stmts))?;
                Ok(self.ctx.line(&format!(
                    "test({}, {asynchronous}() => {body});",
                    quote(name)
                )))
            }
        }
    }

    fn if_chain(&mut self, cond: &Expr, then: &Block, otherwise: Option<&Stmt>) -> Result<String> {
        let cond = self.expr(cond)?;
        let mut text = format!("if ({}) {}", cond, self.braced(&then.stmts)?);
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

    /// Subject text, bound to a constant first unless it is trivially pure
    fn bind_subject(&mut self, subject: &Expr) -> Result<(String, String)> {
        let text = self.expr(subject)?;
        if is_trivially_pure(subject) {
            return Ok((String::new(), text));
        }
        let name = self.ctx.fresh_temp("s");
        Ok((self.ctx.line(&format!("const {name} = {text};")), name))
    }

    fn match_stmt(&mut self, stmt: &MatchStmt) -> Result<String> {
        let (mut out, subject) = self.bind_subject(&stmt.subject)?;
        let tag_field = stmt
            .union
            .as_deref()
            .and_then(|name| self.ctx.union(name))
            .map(|info| info.tag_field.clone());

        let mut text = String::new();
        for (i, arm) in stmt.arms.iter().enumerate() {
            if i > 0 {
                text.push_str(" else ");
            }
            let bindings = pattern_bindings(&arm.pattern);
            match &arm.pattern {
                Pattern::Variant { name, .. } => {
                    let tag = tag_field
                        .clone()
                        .or_else(|| self.ctx.union_of_variant(name).map(|u| u.tag_field.clone()))
                        .unwrap_or_else(|| "tag".to_string());
                    text.push_str(&format!("if ({}.{} === {}) ", subject, tag, quote(name)));
                }
                Pattern::Wildcard => {}
            }

            let body = self.indented(|this| {
                let mut body = String::new();
                for binding in bindings {
                    body.push_str(&this.ctx.line(&format!(
                        "const {} = {}.{};",
                        sanitize_identifier(binding, Target::TypeScript),
                        subject,
                        binding
                    )));
                }
                body.push_str(&this.stmts(&arm.body.stmts)?);
                Ok(body)
            })?;
            if body.is_empty() {
                text.push_str("{}");
            } else {
                text.push_str(&format!("{{\n{}{}}}", body, self.ctx.indent()));
            }
        }
        if !text.is_empty() {
            out.push_str(&self.ctx.line(&text));
        }
        Ok(out)
    }

    fn scope(&mut self, scope: &ScopeStmt) -> Result<String> {
        match &scope.resource {
            Resource::Allocator { .. } => {
                let block = self.braced(&scope.body.stmts)?;
                Ok(self.ctx.line(&block))
            }
            Resource::Value { init, release } => {
                self.ctx.require(Features::SCOPE_GUARD);
                let init = self.expr(init)?;
                let binding = match &scope.binding {
                    Some(name) => sanitize_identifier(name, Target::TypeScript),
                    None => self.ctx.fresh_temp("r"),
                };
                let release = release.as_deref().unwrap_or("close");
                let body = self.indented(|this| {
                    let mut body = this.ctx.line(&format!(
                        "using {} = __scope({}, {});",
                        binding,
                        init,
                        quote(release)
                    ));
                    body.push_str(&this.stmts(&scope.body.stmts)?);
                    Ok(body)
                })?;
                Ok(self.ctx.line(&format!("{{\n{}{}}}", body, self.ctx.indent())))
            }
        }
    }
}
