//! Resolution errors
//!
//! Every variant carries already-rendered names and types so the diagnostic
//! stream stays independent of the module arenas. Severity is part of the
//! taxonomy: rejected-candidate notes are `Info`, hidden-member notices are
//! `Warning`, everything else is `Error`.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;
use wf_diagnostics::{Diagnostic, Severity};
use wf_span::FileSpan;

/// A user-facing resolution error
#[derive(Error, Debug, Clone, MietteDiagnostic)]
pub enum ResolveError {
    /// Name not found in any visible scope
    #[error("undefined name `{name}`{}", render_suggestions(suggestions))]
    #[diagnostic(code(resolve::undefined_name))]
    UndefinedName {
        /// The name that was looked up
        name: String,
        /// Similar visible names, best first
        suggestions: Vec<String>,
    },

    /// A name resolved to several declarations where one was required
    #[error("ambiguous reference to `{name}`")]
    #[diagnostic(code(resolve::ambiguous_name))]
    AmbiguousName {
        /// The ambiguous name
        name: String,
    },

    /// Two same-named value bindings in one scope
    #[error("`{name}` is already defined in this scope")]
    #[diagnostic(code(resolve::duplicate_definition))]
    DuplicateDefinition {
        /// The redefined name
        name: String,
    },

    /// A term was used where a type is required
    #[error("`{name}` is not a type")]
    #[diagnostic(code(resolve::not_a_type))]
    NotAType {
        /// Rendered offending term
        name: String,
    },

    /// A term was used where an expression is required
    #[error("`{name}` cannot be used as a value")]
    #[diagnostic(code(resolve::not_a_value))]
    NotAValue {
        /// Rendered offending term
        name: String,
    },

    /// Keyword argument names no parameter
    #[error("unknown keyword argument `{keyword}` in call to `{callee}`")]
    #[diagnostic(code(resolve::unknown_keyword))]
    UnknownKeyword {
        /// Rendered callee
        callee: String,
        /// The unknown keyword
        keyword: String,
    },

    /// Same parameter bound twice
    #[error("argument `{keyword}` bound more than once in call to `{callee}`")]
    #[diagnostic(code(resolve::duplicate_argument))]
    DuplicateArgument {
        /// Rendered callee
        callee: String,
        /// The doubly-bound parameter
        keyword: String,
    },

    /// More positional arguments than parameters
    #[error("too many arguments in call to `{callee}`: expected {expected}, found {found}")]
    #[diagnostic(code(resolve::too_many_arguments))]
    TooManyArguments {
        /// Rendered callee
        callee: String,
        /// Number of parameters
        expected: usize,
        /// Number of arguments supplied
        found: usize,
    },

    /// A required parameter was left unfilled
    #[error("missing argument `{param}` in call to `{callee}`")]
    #[diagnostic(code(resolve::missing_argument))]
    MissingArgument {
        /// Rendered callee
        callee: String,
        /// The unfilled parameter
        param: String,
    },

    /// No implicit conversion exists between two types
    #[error("no conversion from `{from}` to `{to}`")]
    #[diagnostic(code(resolve::no_conversion))]
    NoConversion {
        /// Rendered source type
        from: String,
        /// Rendered target type
        to: String,
    },

    /// Several equally cheap conversions exist
    #[error("ambiguous conversion from `{from}` to `{to}`")]
    #[diagnostic(code(resolve::ambiguous_conversion))]
    AmbiguousConversion {
        /// Rendered source type
        from: String,
        /// Rendered target type
        to: String,
    },

    /// An expression carries the wrong frequency
    #[error("frequency mismatch: expected `@{expected}`, found `@{found}`")]
    #[diagnostic(code(resolve::frequency_mismatch))]
    FrequencyMismatch {
        /// Rendered expected frequency
        expected: String,
        /// Rendered actual frequency
        found: String,
    },

    /// No overload candidate survived filtering
    #[error("no matching definition for call to `{callee}{args}`")]
    #[diagnostic(code(resolve::no_overload))]
    NoOverload {
        /// Rendered callee
        callee: String,
        /// Rendered argument shape
        args: String,
    },

    /// Several candidates tied at minimal cost
    #[error("ambiguous call to `{callee}{args}`: multiple definitions match")]
    #[diagnostic(code(resolve::ambiguous_overload))]
    AmbiguousOverload {
        /// Rendered callee
        callee: String,
        /// Rendered argument shape
        args: String,
    },

    /// Info note naming one rejected candidate
    #[error("candidate `{signature}` rejected: {reason}")]
    #[diagnostic(code(resolve::candidate_rejected))]
    CandidateRejected {
        /// Rendered candidate signature
        signature: String,
        /// Why it was rejected
        reason: String,
    },

    /// Primary base is not first in the base list
    #[error("primary base of `{pipeline}` must be declared first")]
    #[diagnostic(code(resolve::primary_not_first))]
    PrimaryNotFirst {
        /// The declaring pipeline
        pipeline: String,
    },

    /// More than one primary base declared
    #[error("pipeline `{pipeline}` declares more than one primary base")]
    #[diagnostic(code(resolve::multiple_primaries))]
    MultiplePrimaries {
        /// The declaring pipeline
        pipeline: String,
    },

    /// Reachable primary ancestors are not totally ordered by subtyping
    #[error("disjoint primary classes: `{left}` and `{right}` are not related by subtyping")]
    #[diagnostic(code(resolve::disjoint_primaries))]
    DisjointPrimaries {
        /// One primary ancestor
        left: String,
        /// The unrelated other
        right: String,
    },

    /// A pipeline inherits from itself
    #[error("cyclic inheritance involving pipeline `{pipeline}`")]
    #[diagnostic(code(resolve::cyclic_inheritance))]
    CyclicInheritance {
        /// The pipeline on the cycle
        pipeline: String,
    },

    /// A base clause does not name a pipeline
    #[error("base of `{pipeline}` is not a pipeline")]
    #[diagnostic(code(resolve::base_not_pipeline))]
    BaseNotPipeline {
        /// The declaring pipeline
        pipeline: String,
    },

    /// Override marker with no matching inherited member
    #[error("`{name}` overrides nothing: no matching inherited member")]
    #[diagnostic(code(resolve::override_missing))]
    OverrideMissing {
        /// The member name
        name: String,
    },

    /// Override marker matching several inherited lines
    #[error("override of `{name}` is ambiguous: several inherited members match")]
    #[diagnostic(code(resolve::override_ambiguous))]
    OverrideAmbiguous {
        /// The member name
        name: String,
    },

    /// Overriding a member sealed as final
    #[error("cannot override final member `{name}`")]
    #[diagnostic(code(resolve::override_final))]
    OverrideFinal {
        /// The member name
        name: String,
    },

    /// Direct member hides an inherited one without `new` or `override`
    #[error("`{name}` hides an inherited member; declare it `new` or `override`")]
    #[diagnostic(code(resolve::hidden_member), severity(warning))]
    HiddenMember {
        /// The member name
        name: String,
    },

    /// Non-abstract pipeline still has an abstract member
    #[error("non-abstract pipeline `{pipeline}` cannot contain abstract member `{member}`")]
    #[diagnostic(code(resolve::abstract_member_remains))]
    AbstractMemberRemains {
        /// The pipeline
        pipeline: String,
        /// The abstract member
        member: String,
    },

    /// New required input added to a concrete inherited element
    #[error("cannot add required input `{attr}` to concrete inherited element `{element}`")]
    #[diagnostic(code(resolve::new_input_on_concrete_element))]
    NewInputOnConcreteElement {
        /// The element
        element: String,
        /// The offending attribute
        attr: String,
    },

    /// A generic argument could not be deduced
    #[error("could not deduce argument for generic parameter `{param}` of `{callee}`")]
    #[diagnostic(code(resolve::cannot_deduce))]
    CannotDeduce {
        /// The generic parameter
        param: String,
        /// Rendered callee
        callee: String,
    },

    /// No in-scope declaration satisfies a concept member
    #[error("no implicit value satisfies `{member}` required by concept `{concept}`")]
    #[diagnostic(code(resolve::unsatisfied_concept))]
    UnsatisfiedConcept {
        /// The concept
        concept: String,
        /// The unsatisfied member
        member: String,
    },

    /// `base` used outside an overriding member
    #[error("`base` is only meaningful inside an overriding member")]
    #[diagnostic(code(resolve::base_outside_override))]
    BaseOutsideOverride,

    /// A declaration appeared somewhere its kind is not allowed
    #[error("declaration `{name}` is not allowed here")]
    #[diagnostic(code(resolve::misplaced_item))]
    MisplacedItem {
        /// The declared name
        name: String,
    },

    /// A term was used where a frequency (element reference) is required
    #[error("`{name}` does not name a frequency")]
    #[diagnostic(code(resolve::not_a_frequency))]
    NotAFrequency {
        /// Rendered offending term
        name: String,
    },

    /// Assignment to something that is not a place
    #[error("left-hand side of assignment is not assignable")]
    #[diagnostic(code(resolve::not_assignable))]
    NotAssignable,
}

impl ResolveError {
    /// The severity this error reports at
    pub fn severity(&self) -> Severity {
        match self {
            ResolveError::CandidateRejected { .. } => Severity::Info,
            ResolveError::HiddenMember { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Convert to a located diagnostic
    pub fn into_diagnostic(self, span: FileSpan) -> Diagnostic {
        Diagnostic {
            severity: self.severity(),
            span,
            message: self.to_string(),
            code: MietteDiagnostic::code(&self).map(|code| code.to_string()),
        }
    }
}

fn render_suggestions(suggestions: &[String]) -> String {
    match suggestions.first() {
        Some(best) => format!("; did you mean `{best}`?"),
        None => String::new(),
    }
}

/// Compute Levenshtein distance between two strings
pub(crate) fn levenshtein_distance(source: &str, target: &str) -> usize {
    let source_len = source.chars().count();
    let target_len = target.chars().count();

    if source_len == 0 {
        return target_len;
    }
    if target_len == 0 {
        return source_len;
    }

    let mut matrix = vec![vec![0; target_len + 1]; source_len + 1];

    for (idx, row) in matrix.iter_mut().enumerate() {
        row[0] = idx;
    }
    for jdx in 0..=target_len {
        matrix[0][jdx] = jdx;
    }

    for (idx, source_char) in source.chars().enumerate() {
        for (jdx, target_char) in target.chars().enumerate() {
            let cost = usize::from(source_char != target_char);
            matrix[idx + 1][jdx + 1] = (matrix[idx][jdx + 1] + 1)
                .min(matrix[idx + 1][jdx] + 1)
                .min(matrix[idx][jdx] + cost);
        }
    }

    matrix[source_len][target_len]
}

/// Rank `available` names by distance to `target`, closest first
pub(crate) fn rank_suggestions(target: &str, available: &[String]) -> Vec<String> {
    let mut scored: Vec<(String, usize)> = available
        .iter()
        .map(|candidate| (candidate.clone(), levenshtein_distance(target, candidate)))
        .filter(|(_, distance)| *distance <= 3)
        .collect();
    scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    scored.into_iter().take(3).map(|(name, _)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", "def"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_rank_suggestions_caps_distance() {
        let available = vec![
            "position".to_string(),
            "positron".to_string(),
            "color".to_string(),
        ];
        let ranked = rank_suggestions("positio", &available);
        assert_eq!(ranked.first().map(String::as_str), Some("position"));
        assert!(!ranked.contains(&"color".to_string()));
    }

    #[test]
    fn test_severity_taxonomy() {
        let rejected = ResolveError::CandidateRejected {
            signature: "float f(int x)".into(),
            reason: "too many arguments".into(),
        };
        assert_eq!(rejected.severity(), Severity::Info);

        let hidden = ResolveError::HiddenMember { name: "x".into() };
        assert_eq!(hidden.severity(), Severity::Warning);

        let undefined = ResolveError::UndefinedName {
            name: "foo".into(),
            suggestions: vec![],
        };
        assert_eq!(undefined.severity(), Severity::Error);
    }

    #[test]
    fn test_undefined_name_message_includes_suggestion() {
        let err = ResolveError::UndefinedName {
            name: "poition".into(),
            suggestions: vec!["position".into()],
        };
        assert_eq!(
            err.to_string(),
            "undefined name `poition`; did you mean `position`?"
        );
    }
}
