//! Read-only queries over the resolved tree

use faber_ast::{Block, ClosureBody, Expr, FilterKind, Pattern, Resource, Span, Stmt};

/// Whether a closure or function body suspends anywhere.
///
/// The scan is depth-first over every statement and expression kind. It
/// stops at nested closures and nested declarations, whose suspension
/// points belong to them.
pub fn contains_await(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_contains_await)
}

pub fn block_contains_await(block: &Block) -> bool {
    contains_await(&block.stmts)
}

pub fn closure_body_contains_await(body: &ClosureBody) -> bool {
    match body {
        ClosureBody::Expr(expr) => expr_contains_await(expr),
        ClosureBody::Block(block) => block_contains_await(block),
    }
}

fn opt_expr(expr: Option<&Expr>) -> bool {
    expr.map(expr_contains_await).unwrap_or(false)
}

pub fn stmt_contains_await(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Block(block) => block_contains_await(block),
        Stmt::Expr { expr, .. } => expr_contains_await(expr),
        Stmt::Var(decl) => opt_expr(decl.value.as_ref()),
        Stmt::Function(_)
        | Stmt::Class(_)
        | Stmt::Interface(_)
        | Stmt::Enum(_)
        | Stmt::Union(_)
        | Stmt::TypeAlias { .. }
        | Stmt::Import(_) => false,
        Stmt::If {
            cond,
            then,
            otherwise,
            ..
        } => {
            expr_contains_await(cond)
                || block_contains_await(then)
                || otherwise.as_deref().map(stmt_contains_await).unwrap_or(false)
        }
        Stmt::While { cond, body, .. } | Stmt::DoWhile { body, cond, .. } => {
            expr_contains_await(cond) || block_contains_await(body)
        }
        Stmt::For {
            iterable,
            body,
            is_async,
            ..
        } => *is_async || expr_contains_await(iterable) || block_contains_await(body),
        Stmt::Switch {
            subject,
            cases,
            default,
            ..
        } => {
            expr_contains_await(subject)
                || cases
                    .iter()
                    .any(|case| expr_contains_await(&case.value) || block_contains_await(&case.body))
                || default.as_ref().map(block_contains_await).unwrap_or(false)
        }
        Stmt::Match(stmt) => {
            expr_contains_await(&stmt.subject)
                || stmt.arms.iter().any(|arm| block_contains_await(&arm.body))
        }
        Stmt::Guard { clauses, .. } => clauses
            .iter()
            .any(|clause| expr_contains_await(&clause.cond) || block_contains_await(&clause.body)),
        Stmt::Try {
            body,
            catch,
            finally,
            ..
        } => {
            block_contains_await(body)
                || catch
                    .as_ref()
                    .map(|clause| block_contains_await(&clause.body))
                    .unwrap_or(false)
                || finally.as_ref().map(block_contains_await).unwrap_or(false)
        }
        Stmt::Return { value, .. } => opt_expr(value.as_ref()),
        Stmt::Throw { value, .. } => expr_contains_await(value),
        Stmt::Print { args, .. } => args.iter().any(expr_contains_await),
        Stmt::Assert { cond, message, .. } => {
            expr_contains_await(cond) || opt_expr(message.as_ref())
        }
        Stmt::Break { .. } | Stmt::Continue { .. } => false,
        Stmt::Entry { body, .. } | Stmt::Test { body, .. } => block_contains_await(body),
        Stmt::Scope(scope) => {
            let init = match &scope.resource {
                Resource::Allocator { .. } => false,
                Resource::Value { init, .. } => expr_contains_await(init),
            };
            init || block_contains_await(&scope.body)
        }
        Stmt::TestSuite { body, .. } => contains_await(body),
    }
}

pub fn expr_contains_await(expr: &Expr) -> bool {
    match expr {
        Expr::Await { .. } => true,
        Expr::Ident { .. }
        | Expr::SelfRef { .. }
        | Expr::Literal { .. }
        | Expr::Read { .. }
        | Expr::Constant { .. }
        | Expr::Closure(_) => false,
        Expr::Binary { lhs, rhs, .. } => expr_contains_await(lhs) || expr_contains_await(rhs),
        Expr::Unary { operand, .. } => expr_contains_await(operand),
        Expr::Assign { target, value, .. } => {
            expr_contains_await(target) || expr_contains_await(value)
        }
        Expr::Ternary {
            cond,
            then,
            otherwise,
            ..
        } => expr_contains_await(cond) || expr_contains_await(then) || expr_contains_await(otherwise),
        Expr::Call { callee, args, .. } => {
            expr_contains_await(callee) || args.iter().any(expr_contains_await)
        }
        Expr::Member { object, .. } => expr_contains_await(object),
        Expr::Index { object, index, .. } => {
            expr_contains_await(object) || expr_contains_await(index)
        }
        Expr::Array { elements, .. } => elements.iter().any(expr_contains_await),
        Expr::Object { fields, .. } | Expr::Construct { fields, .. } => {
            fields.iter().any(|field| expr_contains_await(&field.value))
        }
        Expr::New { args, .. } | Expr::Format { args, .. } => args.iter().any(expr_contains_await),
        Expr::Cast { expr, .. } | Expr::Native { expr, .. } => expr_contains_await(expr),
        Expr::Convert(conversion) => {
            expr_contains_await(&conversion.expr) || opt_expr(conversion.fallback.as_deref())
        }
        Expr::Range { start, end, .. } => expr_contains_await(start) || expr_contains_await(end),
        Expr::Filter(filter) => {
            let predicate = match filter.filter.as_ref().map(|f| &f.kind) {
                Some(FilterKind::Condition(cond)) => expr_contains_await(cond),
                Some(FilterKind::Property(_)) | None => false,
            };
            expr_contains_await(&filter.source)
                || predicate
                || filter
                    .transforms
                    .iter()
                    .any(|transform| opt_expr(transform.arg.as_deref()))
        }
    }
}

/// Expressions that may be referenced more than once without re-running effects
pub fn is_trivially_pure(expr: &Expr) -> bool {
    match expr {
        Expr::Ident { .. } | Expr::SelfRef { .. } | Expr::Literal { .. } | Expr::Constant { .. } => {
            true
        }
        Expr::Member { object, .. } => is_trivially_pure(object),
        _ => false,
    }
}

/// Working copy of a filter predicate with the element made explicit.
///
/// Bare identifiers not listed in `outer` name fields of the element and
/// become `element.name`. Names bound by closures inside the predicate are
/// left alone.
pub fn rewrite_filter_predicate(predicate: &Expr, element: &str, outer: &[String]) -> Expr {
    let mut bound: Vec<String> = outer.to_vec();
    bound.push(element.to_string());
    rewrite(predicate, element, &mut bound)
}

fn rewrite(expr: &Expr, element: &str, bound: &mut Vec<String>) -> Expr {
    let go = |e: &Expr, bound: &mut Vec<String>| Box::new(rewrite(e, element, bound));
    match expr {
        Expr::Ident { name, span } if !bound.contains(name) => Expr::Member {
            object: Box::new(Expr::ident(element, Span::synthetic())),
            name: name.clone(),
            optional: false,
            span: *span,
        },
        Expr::Binary { op, lhs, rhs, span } => Expr::Binary {
            op: *op,
            lhs: go(lhs, bound),
            rhs: go(rhs, bound),
            span: *span,
        },
        Expr::Unary { op, operand, span } => Expr::Unary {
            op: *op,
            operand: go(operand, bound),
            span: *span,
        },
        Expr::Ternary {
            cond,
            then,
            otherwise,
            span,
        } => Expr::Ternary {
            cond: go(cond, bound),
            then: go(then, bound),
            otherwise: go(otherwise, bound),
            span: *span,
        },
        Expr::Call {
            callee,
            args,
            receiver,
            span,
        } => Expr::Call {
            callee: go(callee, bound),
            args: args.iter().map(|arg| rewrite(arg, element, bound)).collect(),
            receiver: *receiver,
            span: *span,
        },
        Expr::Member {
            object,
            name,
            optional,
            span,
        } => Expr::Member {
            object: go(object, bound),
            name: name.clone(),
            optional: *optional,
            span: *span,
        },
        Expr::Index {
            object,
            index,
            span,
        } => Expr::Index {
            object: go(object, bound),
            index: go(index, bound),
            span: *span,
        },
        Expr::Array { elements, span } => Expr::Array {
            elements: elements.iter().map(|e| rewrite(e, element, bound)).collect(),
            span: *span,
        },
        Expr::Cast { expr, ty, span } => Expr::Cast {
            expr: go(expr, bound),
            ty: ty.clone(),
            span: *span,
        },
        Expr::Closure(closure) => {
            let saved = bound.len();
            bound.extend(closure.params.iter().map(|p| p.name.clone()));
            let mut copy = closure.clone();
            if let ClosureBody::Expr(body) = &closure.body {
                copy.body = ClosureBody::Expr(Box::new(rewrite(body, element, bound)));
            }
            bound.truncate(saved);
            Expr::Closure(copy)
        }
        other => other.clone(),
    }
}

/// First `redde`, `rumpe` or `perge` that leaves the statements.
///
/// `rumpe` and `perge` inside a nested loop belong to that loop. Nested
/// declarations, entry points and tests are not entered.
pub fn escaping_jump(stmts: &[Stmt]) -> Option<Span> {
    stmts.iter().find_map(|stmt| jump_in(stmt, false))
}

fn jump_in_block(block: &Block, in_loop: bool) -> Option<Span> {
    block.stmts.iter().find_map(|stmt| jump_in(stmt, in_loop))
}

fn jump_in(stmt: &Stmt, in_loop: bool) -> Option<Span> {
    match stmt {
        Stmt::Return { span, .. } => Some(*span),
        Stmt::Break { span } | Stmt::Continue { span } => (!in_loop).then_some(*span),
        Stmt::Block(block) => jump_in_block(block, in_loop),
        Stmt::If {
            then, otherwise, ..
        } => jump_in_block(then, in_loop)
            .or_else(|| otherwise.as_deref().and_then(|other| jump_in(other, in_loop))),
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::For { body, .. } => {
            jump_in_block(body, true)
        }
        Stmt::Switch { cases, default, .. } => cases
            .iter()
            .find_map(|case| jump_in_block(&case.body, in_loop))
            .or_else(|| default.as_ref().and_then(|block| jump_in_block(block, in_loop))),
        Stmt::Match(stmt) => stmt
            .arms
            .iter()
            .find_map(|arm| jump_in_block(&arm.body, in_loop)),
        Stmt::Guard { clauses, .. } => clauses
            .iter()
            .find_map(|clause| jump_in_block(&clause.body, in_loop)),
        Stmt::Try {
            body,
            catch,
            finally,
            ..
        } => jump_in_block(body, in_loop)
            .or_else(|| catch.as_ref().and_then(|clause| jump_in_block(&clause.body, in_loop)))
            .or_else(|| finally.as_ref().and_then(|block| jump_in_block(block, in_loop))),
        Stmt::Scope(scope) => jump_in_block(&scope.body, in_loop),
        Stmt::Expr { .. }
        | Stmt::Var(_)
        | Stmt::Function(_)
        | Stmt::Class(_)
        | Stmt::Interface(_)
        | Stmt::Enum(_)
        | Stmt::Union(_)
        | Stmt::TypeAlias { .. }
        | Stmt::Import(_)
        | Stmt::Throw { .. }
        | Stmt::Print { .. }
        | Stmt::Assert { .. }
        | Stmt::Entry { .. }
        | Stmt::Test { .. }
        | Stmt::TestSuite { .. } => None,
    }
}

/// Bindings a match arm introduces
pub fn pattern_bindings(pattern: &Pattern) -> &[String] {
    match pattern {
        Pattern::Variant { bindings, .. } => bindings,
        Pattern::Wildcard => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faber_ast::{AstBuilder, BinaryOp};

    #[test]
    fn test_escaping_jumps() {
        let b = AstBuilder::new();
        let local_break = b.while_loop(b.bool(true), vec![Stmt::Break { span: b.span() }]);
        assert_eq!(escaping_jump(&[local_break]), None);

        let nested_return = b.if_else(
            b.ident("c"),
            vec![b.while_loop(b.bool(true), vec![b.redde(None)])],
            None,
        );
        assert!(escaping_jump(&[nested_return]).is_some());

        let bare_continue = b.if_else(b.ident("c"), vec![Stmt::Continue { span: b.span() }], None);
        assert!(escaping_jump(&[bare_continue]).is_some());

        let declared = Stmt::Function(b.function("f", vec![], None, vec![b.redde(None)]));
        assert_eq!(escaping_jump(&[declared]), None);
    }

    #[test]
    fn test_await_found_in_nested_expressions() {
        let b = AstBuilder::new();
        let awaited = b.binary(
            BinaryOp::Add,
            b.int(1),
            b.call(b.ident("f"), vec![b.array(vec![b.cede(b.ident("x"))])]),
        );
        assert!(expr_contains_await(&awaited));

        let stmt = b.if_else(
            b.bool(true),
            vec![b.fixum("y", None, b.ternary(b.bool(true), b.int(0), b.cede(b.ident("z"))))],
            None,
        );
        assert!(stmt_contains_await(&stmt));
    }

    #[test]
    fn test_await_inside_nested_closure_is_not_ours() {
        let b = AstBuilder::new();
        let inner = b.lambda(vec![], b.cede(b.ident("x")));
        assert!(!expr_contains_await(&inner));
        assert!(!contains_await(&[b.expr_stmt(b.call(b.ident("run"), vec![inner]))]));
    }

    #[test]
    fn test_await_in_assignment_and_scope() {
        let b = AstBuilder::new();
        let stmt = b.resource_scope(
            b.call(b.ident("aperi"), vec![]),
            "fh",
            vec![b.expr_stmt(b.assign(b.ident("x"), b.cede(b.ident("y"))))],
        );
        assert!(stmt_contains_await(&stmt));
    }

    #[test]
    fn test_filter_rewrite_respects_outer_bindings() {
        let b = AstBuilder::new();
        let predicate = b.binary(BinaryOp::Gt, b.ident("aetas"), b.ident("limen"));
        let rewritten = rewrite_filter_predicate(&predicate, "item", &["limen".to_string()]);
        match rewritten {
            Expr::Binary { lhs, rhs, .. } => {
                assert!(matches!(*lhs, Expr::Member { ref name, .. } if name == "aetas"));
                assert!(matches!(*rhs, Expr::Ident { ref name, .. } if name == "limen"));
            }
            other => panic!("unexpected rewrite: {other:?}"),
        }
        // the input is untouched
        assert!(matches!(predicate, Expr::Binary { ref lhs, .. } if lhs.as_ident() == Some("aetas")));
    }

    #[test]
    fn test_trivially_pure() {
        let b = AstBuilder::new();
        assert!(is_trivially_pure(&b.member(b.ego(), "nomen")));
        assert!(!is_trivially_pure(&b.call(b.ident("f"), vec![])));
    }
}
