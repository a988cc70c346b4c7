//! Per-unit generation state
//!
//! A [`GenerationContext`] lives for exactly one (unit, backend) pair. It
//! tracks indentation, the capability flags the preamble must satisfy,
//! whether the current body is async or a generator, and, for backends with
//! explicit allocators, which allocator binding is in scope.
//!
//! Nested state changes go through [`Scoped`], whose helpers restore the
//! previous state after the closure returns, whether it succeeded or not.

use crate::Result;
use faber_ast::{Stmt, UnionDecl};
use std::collections::HashMap;

bitflags::bitflags! {
    /// Capabilities requested while generating a unit body
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Features: u32 {
        const MATH_CONSTANTS = 1 << 0;   // PI, TAU, EULER
        const STDIN = 1 << 1;            // lege
        const SCOPE_GUARD = 1 << 2;      // release-on-exit helper type
        const VISITOR = 1 << 3;          // overload set for variant visitation
        const ASYNC = 1 << 4;            // futures / event loop
        const FORMAT = 1 << 5;           // formatted text
        const CONSOLE = 1 << 6;          // standard output / error streams
        const PARSE_HELPERS = 1 << 7;    // guarded numeric conversion
        const DEFAULT_ALLOCATOR = 1 << 8;// module-level allocator binding
        const SEQUENCE = 1 << 9;
        const MAP = 1 << 10;
        const SET = 1 << 11;
        const OPTIONAL = 1 << 12;
        const VARIANT = 1 << 13;
        const EXCEPTIONS = 1 << 14;
        const TYPING = 1 << 15;
        const RECORDS = 1 << 16;         // dataclasses / structs with derives
        const ENUMS = 1 << 17;
        const ABSTRACT = 1 << 18;
        const MEMORY_RESOURCE = 1 << 19;
        const FUNCTIONAL = 1 << 20;
        const ALGORITHM = 1 << 21;
        const NUMERIC = 1 << 22;
        const TEXT = 1 << 23;
        const ASSERT = 1 << 24;
        const TESTING = 1 << 25;
    }
}

/// Shape of a declared tagged union, collected before generation
#[derive(Debug, Clone, PartialEq)]
pub struct UnionInfo {
    pub name: String,
    pub tag_field: String,
    pub variants: Vec<(String, Vec<String>)>,
}

impl UnionInfo {
    pub fn from_decl(decl: &UnionDecl) -> Self {
        UnionInfo {
            name: decl.name.clone(),
            tag_field: decl.tag_field.clone(),
            variants: decl
                .variants
                .iter()
                .map(|v| (v.name.clone(), v.fields.iter().map(|f| f.name.clone()).collect()))
                .collect(),
        }
    }

    pub fn fields_of(&self, variant: &str) -> Option<&[String]> {
        self.variants
            .iter()
            .find(|(name, _)| name == variant)
            .map(|(_, fields)| fields.as_slice())
    }
}

#[derive(Debug, Clone)]
struct AllocatorBinding {
    name: String,
    used: bool,
}

#[derive(Debug)]
pub struct GenerationContext {
    indent_unit: String,
    pub(crate) depth: usize,
    features: Features,
    pub(crate) in_generator: bool,
    pub(crate) in_async: bool,
    allocators: Vec<AllocatorBinding>,
    unions: HashMap<String, UnionInfo>,
    variant_owners: HashMap<String, String>,
    temps: usize,
}

impl GenerationContext {
    pub fn new(indent_width: usize) -> Self {
        Self {
            indent_unit: " ".repeat(indent_width),
            depth: 0,
            features: Features::empty(),
            in_generator: false,
            in_async: false,
            allocators: Vec::new(),
            unions: HashMap::new(),
            variant_owners: HashMap::new(),
            temps: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Spaces per indentation level
    pub fn indent_width(&self) -> usize {
        self.indent_unit.len()
    }

    pub fn indent(&self) -> String {
        self.indent_unit.repeat(self.depth)
    }

    /// One line of output at the current depth, newline included
    pub fn line(&self, text: &str) -> String {
        if text.is_empty() {
            "\n".to_string()
        } else {
            format!("{}{}\n", self.indent(), text)
        }
    }

    pub fn require(&mut self, features: Features) {
        self.features |= features;
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn has(&self, features: Features) -> bool {
        self.features.contains(features)
    }

    pub fn in_generator(&self) -> bool {
        self.in_generator
    }

    pub fn in_async(&self) -> bool {
        self.in_async
    }

    /// A name no source identifier can collide with
    pub fn fresh_temp(&mut self, prefix: &str) -> String {
        let name = format!("__{prefix}{}", self.temps);
        self.temps += 1;
        name
    }

    /// Innermost allocator binding; marks it as referenced
    pub fn current_allocator(&mut self) -> Option<String> {
        self.allocators.last_mut().map(|binding| {
            binding.used = true;
            binding.name.clone()
        })
    }

    pub fn allocator_depth(&self) -> usize {
        self.allocators.len()
    }

    /// Record every union declared in `stmts`, including nested suites
    pub fn register_unions(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Union(decl) => self.register_union(UnionInfo::from_decl(decl)),
                Stmt::TestSuite { body, .. } => self.register_unions(body),
                _ => {}
            }
        }
    }

    pub fn register_union(&mut self, info: UnionInfo) {
        for (variant, _) in &info.variants {
            self.variant_owners.insert(variant.clone(), info.name.clone());
        }
        self.unions.insert(info.name.clone(), info);
    }

    pub fn union(&self, name: &str) -> Option<&UnionInfo> {
        self.unions.get(name)
    }

    pub fn union_of_variant(&self, variant: &str) -> Option<&UnionInfo> {
        self.variant_owners
            .get(variant)
            .and_then(|owner| self.unions.get(owner))
    }
}

/// State changes around nested generation, undone on every exit path
pub trait Scoped: Sized {
    fn context(&mut self) -> &mut GenerationContext;

    /// Run `f` one indentation level deeper
    fn indented<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.context().depth;
        self.context().depth = saved + 1;
        let result = f(self);
        self.context().depth = saved;
        result
    }

    /// Run `f` with `name` as the current allocator.
    ///
    /// Returns whether anything inside asked for the allocator.
    fn with_allocator<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<(T, bool)> {
        let saved = self.context().allocators.len();
        self.context().allocators.push(AllocatorBinding {
            name: name.to_string(),
            used: false,
        });
        let result = f(self);
        let used = self
            .context()
            .allocators
            .get(saved)
            .map(|binding| binding.used)
            .unwrap_or(false);
        self.context().allocators.truncate(saved);
        result.map(|value| (value, used))
    }

    /// Run `f` inside a function or closure body with the given suspension kind
    fn in_function<T>(
        &mut self,
        is_async: bool,
        is_generator: bool,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let context = self.context();
        let saved = (context.in_async, context.in_generator);
        context.in_async = is_async;
        context.in_generator = is_generator;
        let result = f(self);
        let context = self.context();
        context.in_async = saved.0;
        context.in_generator = saved.1;
        result
    }
}

impl Scoped for GenerationContext {
    fn context(&mut self) -> &mut GenerationContext {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Target;
    use crate::CodegenError;
    use faber_ast::{AstBuilder, Span};

    #[test]
    fn test_indented_restores_depth_on_error() {
        let mut ctx = GenerationContext::new(4);
        let result: Result<()> = ctx.indented(|ctx| {
            ctx.indented(|ctx| {
                assert_eq!(ctx.depth(), 2);
                Err(CodegenError::unsupported(Span::new(1, 1), Target::Zig, "closure"))
            })
        });
        assert!(result.is_err());
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn test_line_uses_indent_unit() {
        let mut ctx = GenerationContext::new(2);
        let text = ctx.indented(|ctx| Ok(ctx.line("x;"))).unwrap();
        assert_eq!(text, "  x;\n");
        assert_eq!(ctx.line(""), "\n");
    }

    #[test]
    fn test_allocator_stack_tracks_use() {
        let mut ctx = GenerationContext::new(4);
        assert_eq!(ctx.current_allocator(), None);

        let ((), used) = ctx
            .with_allocator("arena", |ctx| {
                let ((), inner_used) = ctx.with_allocator("scratch", |ctx| {
                    assert_eq!(ctx.current_allocator().as_deref(), Some("scratch"));
                    Ok(())
                })?;
                assert!(inner_used);
                Ok(())
            })
            .unwrap();
        assert!(!used);
        assert_eq!(ctx.allocator_depth(), 0);
    }

    #[test]
    fn test_allocator_stack_restored_on_error() {
        let mut ctx = GenerationContext::new(4);
        let result: Result<((), bool)> = ctx.with_allocator("arena", |_| {
            Err(CodegenError::unsupported(Span::new(2, 1), Target::Zig, "closure"))
        });
        assert!(result.is_err());
        assert_eq!(ctx.allocator_depth(), 0);
    }

    #[test]
    fn test_function_flags_restore() {
        let mut ctx = GenerationContext::new(4);
        ctx.in_function(true, false, |ctx| {
            assert!(ctx.in_async());
            ctx.in_function(false, true, |ctx| {
                assert!(ctx.in_generator());
                assert!(!ctx.in_async());
                Ok(())
            })?;
            assert!(ctx.in_async());
            Ok(())
        })
        .unwrap();
        assert!(!ctx.in_async() && !ctx.in_generator());
    }

    #[test]
    fn test_features_accumulate() {
        let mut ctx = GenerationContext::new(4);
        ctx.require(Features::MATH_CONSTANTS);
        ctx.require(Features::STDIN | Features::CONSOLE);
        assert!(ctx.has(Features::MATH_CONSTANTS | Features::STDIN));
        assert!(!ctx.has(Features::VISITOR));
    }

    #[test]
    fn test_union_registration() {
        let b = AstBuilder::new();
        let mut ctx = GenerationContext::new(4);
        ctx.register_unions(&[b.union(
            "Shape",
            vec![("Circle", vec![("radius", b.ty("fractus"))]), ("Empty", vec![])],
        )]);

        let info = ctx.union_of_variant("Circle").unwrap();
        assert_eq!(info.name, "Shape");
        assert_eq!(info.fields_of("Circle"), Some(&["radius".to_string()][..]));
        assert_eq!(info.fields_of("Empty"), Some(&[][..]));
        assert!(ctx.union("Missing").is_none());
    }

    #[test]
    fn test_fresh_temps_are_distinct() {
        let mut ctx = GenerationContext::new(4);
        assert_eq!(ctx.fresh_temp("f"), "__f0");
        assert_eq!(ctx.fresh_temp("f"), "__f1");
    }
}
