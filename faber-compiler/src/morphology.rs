//! Verb morphology of standard-library method names
//!
//! Faber names its collection methods with Latin verb forms, and the form
//! carries the behavioural contract: `adde` (imperative) mutates in place,
//! `addita` (perfect participle) returns a new value, `additura` does the
//! same asynchronously, and so on. This module derives that contract from
//! the suffix alone.

use std::fmt;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u8 {
        const MUTATES = 0x01;      // Changes the receiver in place
        const ASYNC = 0x02;        // Completes later; result must be awaited
        const RETURNS_NEW = 0x04;  // Produces a fresh value
        const ALLOCATES = 0x08;    // Needs heap memory for the result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Form {
    Imperative,
    Perfect,
    ProspectiveActive,
    ProspectiveIndicative,
    PresentParticiple,
}

/// Every suffix with its form, longest first. Matching walks this table in
/// order, so a longer suffix always beats a shorter one ending in the same letter.
const SUFFIXES: &[(&str, Form)] = &[
    ("atura", Form::ProspectiveActive),
    ("itura", Form::ProspectiveActive),
    ("abit", Form::ProspectiveIndicative),
    ("ebit", Form::ProspectiveIndicative),
    ("ata", Form::Perfect),
    ("ita", Form::Perfect),
    ("iet", Form::ProspectiveIndicative),
    ("ans", Form::PresentParticiple),
    ("ens", Form::PresentParticiple),
    ("ta", Form::Perfect),
    ("sa", Form::Perfect),
    ("a", Form::Imperative),
    ("e", Form::Imperative),
    ("i", Form::Imperative),
];

impl Form {
    pub const ALL: [Form; 5] = [
        Form::Imperative,
        Form::Perfect,
        Form::ProspectiveActive,
        Form::ProspectiveIndicative,
        Form::PresentParticiple,
    ];

    pub fn flags(self) -> MethodFlags {
        match self {
            Form::Imperative => MethodFlags::MUTATES,
            Form::Perfect => MethodFlags::RETURNS_NEW | MethodFlags::ALLOCATES,
            Form::ProspectiveActive => {
                MethodFlags::ASYNC | MethodFlags::RETURNS_NEW | MethodFlags::ALLOCATES
            }
            Form::ProspectiveIndicative => MethodFlags::MUTATES | MethodFlags::ASYNC,
            Form::PresentParticiple => MethodFlags::empty(),
        }
    }

    /// Recognised suffixes of this form, in table order
    pub fn suffixes(self) -> impl Iterator<Item = &'static str> {
        SUFFIXES
            .iter()
            .filter(move |(_, form)| *form == self)
            .map(|(suffix, _)| *suffix)
    }

    pub fn name(self) -> &'static str {
        match self {
            Form::Imperative => "imperative",
            Form::Perfect => "perfect",
            Form::ProspectiveActive => "prospective-active",
            Form::ProspectiveIndicative => "prospective-indicative",
            Form::PresentParticiple => "present-participle",
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A method name split into stem and grammatical ending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conjugation<'a> {
    pub stem: &'a str,
    pub form: Form,
    pub suffix: &'static str,
}

impl Conjugation<'_> {
    pub fn flags(&self) -> MethodFlags {
        self.form.flags()
    }
}

pub fn resolve(name: &str) -> Option<Conjugation<'_>> {
    if name.chars().count() <= 1 {
        return None;
    }
    let (suffix, form) = SUFFIXES.iter().find(|(suffix, _)| name.ends_with(suffix))?;
    let stem = &name[..name.len() - suffix.len()];
    if stem.is_empty() {
        return None;
    }
    Some(Conjugation {
        stem,
        form: *form,
        suffix,
    })
}

pub fn derived_flags(name: &str) -> Option<MethodFlags> {
    resolve(name).map(|conjugation| conjugation.flags())
}

/// Inverse of [`Form::flags`]; `None` means the combination names no form
pub fn form_from_flags(flags: MethodFlags) -> Option<Form> {
    Form::ALL.into_iter().find(|form| form.flags() == flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_form_is_recognised() {
        let cases = [
            ("adde", Form::Imperative, "add"),
            ("ordina", Form::Imperative, "ordin"),
            ("filtrata", Form::Perfect, "filtr"),
            ("inversa", Form::Perfect, "inver"),
            ("filtratura", Form::ProspectiveActive, "filtr"),
            ("ordinabit", Form::ProspectiveIndicative, "ordin"),
            ("legens", Form::PresentParticiple, "leg"),
        ];
        for (name, form, stem) in cases {
            let conjugation = resolve(name).unwrap_or_else(|| panic!("{name} unrecognised"));
            assert_eq!(conjugation.form, form, "{name}");
            assert_eq!(conjugation.stem, stem, "{name}");
        }
    }

    #[test]
    fn test_longest_suffix_wins() {
        // "-ata" beats "-ta" and "-a"; "-atura" beats "-a"
        assert_eq!(resolve("mappata").map(|c| c.suffix), Some("ata"));
        assert_eq!(resolve("mappatura").map(|c| c.suffix), Some("atura"));
        assert_eq!(resolve("scripta").map(|c| c.suffix), Some("ta"));
    }

    #[test]
    fn test_unrecognised_names() {
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("a"), None);
        assert_eq!(resolve("longitudo"), None);
        assert_eq!(resolve("habet"), None);
        // the ending would swallow the whole name
        assert_eq!(resolve("ata"), None);
        assert_eq!(resolve("ens"), None);
    }

    #[test]
    fn test_resolution_is_case_sensitive() {
        assert_eq!(resolve("ADDE"), None);
        assert!(resolve("addE").is_none());
    }

    #[test]
    fn test_flags_and_forms_agree_both_ways() {
        for form in Form::ALL {
            assert_eq!(form_from_flags(form.flags()), Some(form));
            for suffix in form.suffixes() {
                let name = format!("verb{suffix}");
                let derived = derived_flags(&name).unwrap();
                assert_eq!(form_from_flags(derived), resolve(&name).map(|c| c.form));
            }
        }
    }

    #[test]
    fn test_unknown_flag_combinations() {
        assert_eq!(form_from_flags(MethodFlags::MUTATES | MethodFlags::RETURNS_NEW), None);
        assert_eq!(form_from_flags(MethodFlags::ASYNC), None);
        assert_eq!(form_from_flags(MethodFlags::all()), None);
    }
}
