use super::FaberEmitter;
use crate::backend::utils::quote;
use crate::context::Scoped;
use crate::targets::StmtEmitter;
use crate::Result;
use faber_ast::{Block, Expr, IterMode, Pattern, PrintLevel, Resource, ScopeStmt, Stmt};

impl FaberEmitter {
    pub(super) fn emit_stmt(&mut self, stmt: &Stmt) -> Result<String> {
        match stmt {
            Stmt::Block(block) => {
                let text = self.braced(&block.stmts)?;
                Ok(self.ctx.line(&text))
            }
            Stmt::Expr { expr, .. } => {
                let text = self.expr(expr)?;
                Ok(self.ctx.line(&text))
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
                Ok(self.ctx.line(&format!("dum {cond} {body}")))
            }
            Stmt::DoWhile { body, cond, .. } => {
                let body = self.braced(&body.stmts)?;
                let cond = self.expr(cond)?;
                Ok(self.ctx.line(&format!("fac {body} dum {cond}")))
            }
            Stmt::For {
                binding,
                iterable,
                body,
                mode,
                is_async,
                ..
            } => {
                let keyword = match mode {
                    IterMode::Values => "ex",
                    IterMode::Keys => "de",
                };
                let prefix = if *is_async { "cede " } else { "" };
                let iterable = self.expr(iterable)?;
                let body = self.braced(&body.stmts)?;
                Ok(self.ctx.line(&format!(
                    "{prefix}{keyword} {iterable} fixum {binding} {body}"
                )))
            }
            Stmt::Switch {
                subject,
                cases,
                default,
                ..
            } => {
                let subject = self.expr(subject)?;
                let mut out = self.ctx.line(&format!("elige {subject} {{"));
                let arms = self.indented(|this| {
                    let mut arms = String::new();
                    for case in cases {
                        let value = this.expr(&case.value)?;
                        let body = this.braced(&case.body.stmts)?;
                        arms.push_str(&this.ctx.line(&format!("casu {value} {body}")));
                    }
                    if let Some(default) = default {
                        let body = this.braced(&default.stmts)?;
                        arms.push_str(&this.ctx.line(&format!("ceterum {body}")));
                    }
                    Ok(arms)
                })?;
                out.push_str(&arms);
                out.push_str(&self.ctx.line("}"));
                Ok(out)
            }
            Stmt::Match(stmt) => {
                let subject = self.expr(&stmt.subject)?;
                let mut out = self.ctx.line(&format!("discerne {subject} {{"));
                let arms = self.indented(|this| {
                    let mut arms = String::new();
                    for arm in &stmt.arms {
                        let head = match &arm.pattern {
                            Pattern::Variant { name, bindings } if bindings.is_empty() => {
                                format!("casu {name}")
                            }
                            Pattern::Variant { name, bindings } => {
                                format!("casu {}({})", name, bindings.join(", "))
                            }
                            Pattern::Wildcard => "casu _".to_string(),
                        };
                        let body = this.braced(&arm.body.stmts)?;
                        arms.push_str(&this.ctx.line(&format!("{head} {body}")));
                    }
                    Ok(arms)
                })?;
                out.push_str(&arms);
                out.push_str(&self.ctx.line("}"));
                Ok(out)
            }
            Stmt::Guard { clauses, .. } => {
                let mut out = self.ctx.line("custodi {");
                let inner = self.indented(|this| {
                    let mut inner = String::new();
                    for clause in clauses {
                        let cond = this.expr(&clause.cond)?;
                        let body = this.braced(&clause.body.stmts)?;
                        inner.push_str(&this.ctx.line(&format!("si {cond} {body}")));
                    }
                    Ok(inner)
                })?;
                out.push_str(&inner);
                out.push_str(&self.ctx.line("}"));
                Ok(out)
            }
            Stmt::Try {
                body,
                catch,
                finally,
                ..
            } => {
                let mut text = format!("tempta {}", self.braced(&body.stmts)?);
                if let Some(clause) = catch {
                    let handler = self.braced(&clause.body.stmts)?;
                    text.push_str(&format!(" cape {} {}", clause.binding, handler));
                }
                if let Some(finally) = finally {
                    text.push_str(&format!(" demum {}", self.braced(&finally.stmts)?));
                }
                Ok(self.ctx.line(&text))
            }
            Stmt::Return { value, .. } => {
                let text = match value {
                    Some(value) => format!("redde {}", self.expr(value)?),
                    None => "redde".to_string(),
                };
                Ok(self.ctx.line(&text))
            }
            Stmt::Throw { value, fatal, .. } => {
                let keyword = if *fatal { "mori" } else { "iace" };
                let value = self.expr(value)?;
                Ok(self.ctx.line(&format!("{keyword} {value}")))
            }
            Stmt::Print { level, args, .. } => {
                let keyword = match level {
                    PrintLevel::Log => "scribe",
                    PrintLevel::Debug => "vide",
                    PrintLevel::Warn => "mone",
                };
                let args = self.list(args)?;
                Ok(self.ctx.line(&format!("{keyword} {args}")))
            }
            Stmt::Assert { cond, message, .. } => {
                let mut text = format!("adfirma {}", self.expr(cond)?);
                if let Some(message) = message {
                    text.push_str(", ");
                    text.push_str(&self.expr(message)?);
                }
                Ok(self.ctx.line(&text))
            }
            Stmt::Break { .. } => Ok(self.ctx.line("rumpe")),
            Stmt::Continue { .. } => Ok(self.ctx.line("perge")),
            Stmt::Entry { body, is_async, .. } => {
                let keyword = if *is_async { "incipiet" } else { "incipit" };
                let body = self.in_function(*is_async, false, |this| this.braced(&body.stmts))?;
                Ok(self.ctx.line(&format!("{keyword} {body}")))
            }
            Stmt::Scope(scope) => self.scope(scope),
            Stmt::TestSuite { name, body, .. } => {
                let body = self.braced(body)?;
                Ok(self.ctx.line(&format!("probandum {} {}", quote(name), body)))
            }
            Stmt::Test { name, body, .. } => {
                let body = self.braced(&body.stmts)?;
                Ok(self.ctx.line(&format!("proba {} {}", quote(name), body)))
            }
        }
    }

    fn if_chain(&mut self, cond: &Expr, then: &Block, otherwise: Option<&Stmt>) -> Result<String> {
        let cond = self.expr(cond)?;
        let mut text = format!("si {} {}", cond, self.braced(&then.stmts)?);
        match otherwise {
            None => {}
            Some(Stmt::If {
                cond,
                then,
                otherwise,
                ..
            }) => {
                text.push_str(" secus ");
                text.push_str(&self.if_chain(cond, then, otherwise.as_deref())?);
            }
            Some(Stmt::Block(block)) => {
                text.push_str(" secus ");
                text.push_str(&self.braced(&block.stmts)?);
            }
            Some(other) => {
                text.push_str(" secus ");
                text.push_str(&self.braced(std::slice::from_ref(other))?);
            }
        }
        Ok(text)
    }

    fn scope(&mut self, scope: &ScopeStmt) -> Result<String> {
        let resource = match &scope.resource {
            Resource::Allocator { kind } => kind.keyword().to_string(),
            Resource::Value { init, .. } => self.expr(init)?,
        };
        let binding = scope
            .binding
            .as_ref()
            .map(|name| format!(" fixum {name}"))
            .unwrap_or_default();
        let body = self.braced(&scope.body.stmts)?;
        Ok(self.ctx.line(&format!("cura {resource}{binding} {body}")))
    }
}
