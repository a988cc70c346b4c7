//! `scriptum` templates
//!
//! A template interpolates its arguments at `§` placeholders. A bare `§` is
//! positional and takes the next positional argument; `§N` names argument
//! `N` explicitly; `§§` is a literal section sign. Positional placeholders
//! count only among themselves. An index past the end of the argument list
//! is not an error: the backend renders its "undefined" token in that slot.

use crate::analysis::is_trivially_pure;
use crate::context::GenerationContext;
use faber_ast::Expr;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Arg(usize),
    Missing(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPlan {
    pub segments: Vec<Segment>,
    arg_count: usize,
}

impl FormatPlan {
    pub fn new(template: &str, arg_count: usize) -> Self {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut positional = 0;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '§' {
                text.push(c);
                continue;
            }
            if chars.peek() == Some(&'§') {
                chars.next();
                text.push('§');
                continue;
            }

            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            let index = if digits.is_empty() {
                positional += 1;
                positional - 1
            } else {
                digits.parse().unwrap_or(usize::MAX)
            };

            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(if index < arg_count {
                Segment::Arg(index)
            } else {
                Segment::Missing(index)
            });
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        FormatPlan {
            segments,
            arg_count,
        }
    }

    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// Argument indices in the order their placeholders appear
    pub fn order(&self) -> Vec<usize> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Arg(index) => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn occurrences(&self, index: usize) -> usize {
        self.order().into_iter().filter(|i| *i == index).count()
    }

    /// Arguments referenced by more than one placeholder
    pub fn repeated(&self) -> BTreeSet<usize> {
        (0..self.arg_count)
            .filter(|index| self.occurrences(*index) > 1)
            .collect()
    }

    /// Arguments no placeholder refers to
    pub fn unused(&self) -> Vec<usize> {
        (0..self.arg_count)
            .filter(|index| self.occurrences(*index) == 0)
            .collect()
    }

    /// Decide how each argument is referenced.
    ///
    /// An argument that is neither trivially pure nor referenced exactly once
    /// is evaluated once into a temporary, and every placeholder refers to
    /// the temporary instead.
    pub fn bind(
        &self,
        args: &[Expr],
        rendered: Vec<String>,
        ctx: &mut GenerationContext,
    ) -> ArgBindings {
        let mut temps = Vec::new();
        let mut refs = Vec::with_capacity(rendered.len());

        for (index, text) in rendered.into_iter().enumerate() {
            let occurrences = self.occurrences(index);
            let pure = args.get(index).map(is_trivially_pure).unwrap_or(true);
            if occurrences == 1 || pure {
                refs.push(text);
                continue;
            }
            let name = ctx.fresh_temp("f");
            refs.push(name.clone());
            temps.push(Temp {
                name,
                value: text,
                referenced: occurrences > 0,
            });
        }

        ArgBindings { temps, refs }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Temp {
    pub name: String,
    pub value: String,
    pub referenced: bool,
}

/// Per-argument reference text, plus the temporaries that must be bound first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgBindings {
    pub temps: Vec<Temp>,
    pub refs: Vec<String>,
}

impl ArgBindings {
    pub fn reference(&self, index: usize) -> &str {
        self.refs.get(index).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faber_ast::AstBuilder;

    #[test]
    fn test_positional_placeholders() {
        let plan = FormatPlan::new("§ and §", 2);
        assert_eq!(
            plan.segments,
            vec![Segment::Arg(0), Segment::Text(" and ".into()), Segment::Arg(1)]
        );
    }

    #[test]
    fn test_indexed_placeholders_follow_physical_order() {
        let plan = FormatPlan::new("§1 before §0", 2);
        assert_eq!(plan.order(), vec![1, 0]);
    }

    #[test]
    fn test_positional_counter_ignores_indexed() {
        let plan = FormatPlan::new("§1 § §", 2);
        assert_eq!(plan.order(), vec![1, 0, 1]);
        assert_eq!(plan.repeated().into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_missing_and_unused() {
        let plan = FormatPlan::new("§0 §5", 3);
        assert_eq!(plan.segments[2], Segment::Missing(5));
        assert_eq!(plan.unused(), vec![1, 2]);
    }

    #[test]
    fn test_escaped_section_sign() {
        let plan = FormatPlan::new("§§ costs §", 1);
        assert_eq!(
            plan.segments,
            vec![Segment::Text("§ costs ".into()), Segment::Arg(0)]
        );
    }

    #[test]
    fn test_repeated_impure_argument_gets_temporary() {
        let b = AstBuilder::new();
        let args = vec![b.call(b.ident("next"), vec![]), b.ident("name")];
        let plan = FormatPlan::new("§0 §1 §0 §1", 2);
        let mut ctx = GenerationContext::new(4);
        let bound = plan.bind(&args, vec!["next()".into(), "name".into()], &mut ctx);

        assert_eq!(bound.temps.len(), 1);
        assert_eq!(bound.temps[0].value, "next()");
        assert_eq!(bound.reference(0), bound.temps[0].name);
        assert_eq!(bound.reference(1), "name");
    }

    #[test]
    fn test_unused_impure_argument_is_still_evaluated() {
        let b = AstBuilder::new();
        let args = vec![b.call(b.ident("tick"), vec![])];
        let plan = FormatPlan::new("nothing", 1);
        let mut ctx = GenerationContext::new(4);
        let bound = plan.bind(&args, vec!["tick()".into()], &mut ctx);
        assert_eq!(bound.temps.len(), 1);
        assert!(!bound.temps[0].referenced);
    }
}
