//! Fluent construction of resolved trees
//!
//! Used by tests and tooling that need a unit without running the parser.
//! Every node gets a fresh span so diagnostics stay distinguishable.

use crate::ast::*;
use crate::span::{FileId, Span};
use std::cell::Cell;

pub struct AstBuilder {
    file: FileId,
    line: Cell<u32>,
    offset: Cell<u32>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self {
            file: FileId::new(0),
            line: Cell::new(0),
            offset: Cell::new(0),
        }
    }

    pub fn with_file_id(mut self, file: FileId) -> Self {
        self.file = file;
        self
    }

    /// Next span; lines advance by one per node
    pub fn span(&self) -> Span {
        let line = self.line.get() + 1;
        let offset = self.offset.get();
        self.line.set(line);
        self.offset.set(offset + 1);
        Span::new(line, 1).with_offset(offset).in_file(self.file)
    }

    // -- types ---------------------------------------------------------------

    pub fn ty(&self, name: &str) -> TypeExpr {
        TypeExpr::named(name)
    }

    pub fn list_of(&self, element: TypeExpr) -> TypeExpr {
        TypeExpr::generic(builtin::LIST, vec![element])
    }

    pub fn param(&self, name: &str, ty: &str) -> Param {
        Param::new(name, Some(TypeExpr::named(ty)))
    }

    // -- expressions ---------------------------------------------------------

    pub fn ident(&self, name: &str) -> Expr {
        Expr::ident(name, self.span())
    }

    pub fn ego(&self) -> Expr {
        Expr::SelfRef { span: self.span() }
    }

    pub fn int(&self, value: i64) -> Expr {
        self.literal(Literal::Integer(value))
    }

    pub fn float(&self, value: f64) -> Expr {
        self.literal(Literal::Float(value))
    }

    pub fn text(&self, value: &str) -> Expr {
        self.literal(Literal::Text(value.to_string()))
    }

    pub fn bool(&self, value: bool) -> Expr {
        self.literal(Literal::Bool(value))
    }

    pub fn nil(&self) -> Expr {
        self.literal(Literal::Nil)
    }

    fn literal(&self, value: Literal) -> Expr {
        Expr::Literal {
            value,
            span: self.span(),
        }
    }

    pub fn binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span: self.span(),
        }
    }

    pub fn unary(&self, op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
            span: self.span(),
        }
    }

    pub fn assign(&self, target: Expr, value: Expr) -> Expr {
        Expr::Assign {
            op: AssignOp::Assign,
            target: Box::new(target),
            value: Box::new(value),
            span: self.span(),
        }
    }

    pub fn ternary(&self, cond: Expr, then: Expr, otherwise: Expr) -> Expr {
        Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
            span: self.span(),
        }
    }

    pub fn call(&self, callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args,
            receiver: None,
            span: self.span(),
        }
    }

    /// A call to a built-in method on a resolved receiver kind
    pub fn method(&self, receiver: Expr, name: &str, args: Vec<Expr>, kind: StructureKind) -> Expr {
        Expr::Call {
            callee: Box::new(self.member(receiver, name)),
            args,
            receiver: Some(kind),
            span: self.span(),
        }
    }

    pub fn member(&self, object: Expr, name: &str) -> Expr {
        Expr::Member {
            object: Box::new(object),
            name: name.to_string(),
            optional: false,
            span: self.span(),
        }
    }

    pub fn index(&self, object: Expr, index: Expr) -> Expr {
        Expr::Index {
            object: Box::new(object),
            index: Box::new(index),
            span: self.span(),
        }
    }

    pub fn array(&self, elements: Vec<Expr>) -> Expr {
        Expr::Array {
            elements,
            span: self.span(),
        }
    }

    pub fn object(&self, fields: Vec<(&str, Expr)>) -> Expr {
        Expr::Object {
            fields: fields
                .into_iter()
                .map(|(key, value)| ObjectField {
                    key: key.to_string(),
                    value,
                })
                .collect(),
            span: self.span(),
        }
    }

    pub fn lambda(&self, params: Vec<Param>, body: Expr) -> Expr {
        Expr::Closure(Closure {
            params,
            ret: None,
            body: ClosureBody::Expr(Box::new(body)),
            is_async: false,
            span: self.span(),
        })
    }

    pub fn lambda_block(&self, params: Vec<Param>, stmts: Vec<Stmt>) -> Expr {
        Expr::Closure(Closure {
            params,
            ret: None,
            body: ClosureBody::Block(self.block(stmts)),
            is_async: false,
            span: self.span(),
        })
    }

    pub fn new_instance(&self, class: &str, args: Vec<Expr>) -> Expr {
        Expr::New {
            class: class.to_string(),
            args,
            span: self.span(),
        }
    }

    pub fn construct(&self, union: &str, variant: &str, fields: Vec<(&str, Expr)>) -> Expr {
        Expr::Construct {
            union: Some(union.to_string()),
            variant: variant.to_string(),
            fields: fields
                .into_iter()
                .map(|(key, value)| ObjectField {
                    key: key.to_string(),
                    value,
                })
                .collect(),
            span: self.span(),
        }
    }

    pub fn cede(&self, operand: Expr) -> Expr {
        Expr::Await {
            operand: Box::new(operand),
            span: self.span(),
        }
    }

    pub fn cast(&self, expr: Expr, ty: TypeExpr) -> Expr {
        Expr::Cast {
            expr: Box::new(expr),
            ty,
            span: self.span(),
        }
    }

    pub fn convert(&self, expr: Expr, kind: ConversionKind) -> Expr {
        self.conversion(expr, kind, None, None)
    }

    pub fn conversion(
        &self,
        expr: Expr,
        kind: ConversionKind,
        radix: Option<Radix>,
        fallback: Option<Expr>,
    ) -> Expr {
        Expr::Convert(Conversion {
            expr: Box::new(expr),
            kind,
            radix,
            fallback: fallback.map(Box::new),
            span: self.span(),
        })
    }

    pub fn format(&self, template: &str, args: Vec<Expr>) -> Expr {
        Expr::Format {
            template: template.to_string(),
            args,
            span: self.span(),
        }
    }

    pub fn range(&self, start: Expr, end: Expr, inclusive: bool) -> Expr {
        Expr::Range {
            start: Box::new(start),
            end: Box::new(end),
            inclusive,
            span: self.span(),
        }
    }

    /// `ab source ubi cond`
    pub fn filter_where(&self, source: Expr, cond: Expr, outer: &[&str]) -> Expr {
        Expr::Filter(FilterExpr {
            source: Box::new(source),
            filter: Some(CollectionFilter {
                negated: false,
                kind: FilterKind::Condition(Box::new(cond)),
            }),
            transforms: Vec::new(),
            element: "item".to_string(),
            outer: outer.iter().map(|name| name.to_string()).collect(),
            span: self.span(),
        })
    }

    pub fn read_line(&self) -> Expr {
        Expr::Read {
            line: true,
            span: self.span(),
        }
    }

    pub fn constant(&self, constant: MathConstant) -> Expr {
        Expr::Constant {
            constant,
            span: self.span(),
        }
    }

    // -- statements ----------------------------------------------------------

    pub fn block(&self, stmts: Vec<Stmt>) -> Block {
        Block::new(stmts, self.span())
    }

    pub fn expr_stmt(&self, expr: Expr) -> Stmt {
        Stmt::Expr {
            expr,
            span: self.span(),
        }
    }

    pub fn fixum(&self, name: &str, ty: Option<TypeExpr>, value: Expr) -> Stmt {
        self.binding(VarKind::Fixum, name, ty, value)
    }

    pub fn varia(&self, name: &str, ty: Option<TypeExpr>, value: Expr) -> Stmt {
        self.binding(VarKind::Varia, name, ty, value)
    }

    fn binding(&self, kind: VarKind, name: &str, ty: Option<TypeExpr>, value: Expr) -> Stmt {
        Stmt::Var(VarDecl {
            kind,
            name: name.to_string(),
            ty,
            value: Some(value),
            is_public: false,
            span: self.span(),
        })
    }

    pub fn function(
        &self,
        name: &str,
        params: Vec<Param>,
        ret: Option<TypeExpr>,
        body: Vec<Stmt>,
    ) -> FunctionDecl {
        FunctionDecl {
            name: name.to_string(),
            generics: Vec::new(),
            params,
            ret,
            body: Some(self.block(body)),
            is_async: false,
            is_generator: false,
            is_public: false,
            is_external: false,
            span: self.span(),
        }
    }

    pub fn if_else(&self, cond: Expr, then: Vec<Stmt>, otherwise: Option<Vec<Stmt>>) -> Stmt {
        Stmt::If {
            cond,
            then: self.block(then),
            otherwise: otherwise.map(|stmts| Box::new(Stmt::Block(self.block(stmts)))),
            span: self.span(),
        }
    }

    pub fn while_loop(&self, cond: Expr, body: Vec<Stmt>) -> Stmt {
        Stmt::While {
            cond,
            body: self.block(body),
            span: self.span(),
        }
    }

    pub fn for_each(&self, binding: &str, iterable: Expr, body: Vec<Stmt>) -> Stmt {
        Stmt::For {
            binding: binding.to_string(),
            iterable,
            body: self.block(body),
            mode: IterMode::Values,
            is_async: false,
            span: self.span(),
        }
    }

    pub fn redde(&self, value: Option<Expr>) -> Stmt {
        Stmt::Return {
            value,
            span: self.span(),
        }
    }

    pub fn scribe(&self, args: Vec<Expr>) -> Stmt {
        Stmt::Print {
            level: PrintLevel::Log,
            args,
            span: self.span(),
        }
    }

    pub fn entry(&self, body: Vec<Stmt>) -> Stmt {
        Stmt::Entry {
            body: self.block(body),
            is_async: false,
            span: self.span(),
        }
    }

    pub fn allocator_scope(&self, kind: AllocatorKind, binding: Option<&str>, body: Vec<Stmt>) -> Stmt {
        Stmt::Scope(ScopeStmt {
            resource: Resource::Allocator { kind },
            binding: binding.map(str::to_string),
            body: self.block(body),
            span: self.span(),
        })
    }

    pub fn resource_scope(&self, init: Expr, binding: &str, body: Vec<Stmt>) -> Stmt {
        Stmt::Scope(ScopeStmt {
            resource: Resource::Value {
                init,
                release: None,
            },
            binding: Some(binding.to_string()),
            body: self.block(body),
            span: self.span(),
        })
    }

    pub fn union(&self, name: &str, variants: Vec<(&str, Vec<(&str, TypeExpr)>)>) -> Stmt {
        Stmt::Union(UnionDecl {
            name: name.to_string(),
            generics: Vec::new(),
            tag_field: "tag".to_string(),
            variants: variants
                .into_iter()
                .map(|(name, fields)| Variant {
                    name: name.to_string(),
                    fields: fields
                        .into_iter()
                        .map(|(name, ty)| VariantField {
                            name: name.to_string(),
                            ty,
                        })
                        .collect(),
                    span: self.span(),
                })
                .collect(),
            is_public: false,
            span: self.span(),
        })
    }

    pub fn arm(&self, variant: &str, bindings: &[&str], body: Vec<Stmt>) -> MatchArm {
        MatchArm {
            pattern: Pattern::Variant {
                name: variant.to_string(),
                bindings: bindings.iter().map(|b| b.to_string()).collect(),
            },
            body: self.block(body),
            span: self.span(),
        }
    }

    pub fn wildcard_arm(&self, body: Vec<Stmt>) -> MatchArm {
        MatchArm {
            pattern: Pattern::Wildcard,
            body: self.block(body),
            span: self.span(),
        }
    }

    pub fn discerne(&self, subject: Expr, union: Option<&str>, arms: Vec<MatchArm>) -> Stmt {
        Stmt::Match(MatchStmt {
            subject,
            union: union.map(str::to_string),
            arms,
            span: self.span(),
        })
    }
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_are_unique() {
        let b = AstBuilder::new();
        let first = b.ident("a");
        let second = b.ident("b");
        assert_ne!(first.span(), second.span());
    }

    #[test]
    fn test_method_call_carries_receiver_kind() {
        let b = AstBuilder::new();
        let call = b.method(b.ident("xs"), "adde", vec![b.int(1)], StructureKind::Sequence);
        match call {
            Expr::Call {
                receiver, callee, ..
            } => {
                assert_eq!(receiver, Some(StructureKind::Sequence));
                assert!(matches!(*callee, Expr::Member { ref name, .. } if name == "adde"));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_union_declaration() {
        let b = AstBuilder::new();
        let stmt = b.union(
            "Shape",
            vec![
                ("Circle", vec![("radius", b.ty("numerus"))]),
                ("Empty", vec![]),
            ],
        );
        match stmt {
            Stmt::Union(decl) => {
                assert_eq!(decl.tag_field, "tag");
                assert_eq!(decl.variants.len(), 2);
                assert!(decl.variants[1].fields.is_empty());
            }
            other => panic!("expected union, got {other:?}"),
        }
    }
}
