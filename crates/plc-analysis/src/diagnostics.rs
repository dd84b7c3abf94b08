//! Error kinds raised by the analysis passes.

use plc_ast::Span;
use thiserror::Error;

/// An error raised while resolving names or checking types.
///
/// Each variant's `Display` carries everything a caller needs to build a
/// [`plc_ast::Diagnostic`] without re-deriving position or wording.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A name was referenced but never declared in any enclosing scope.
    #[error("{span}: unknown name `{name}`")]
    UnknownName {
        /// Where the unresolved reference occurred.
        span: Span,
        /// The name that failed to resolve.
        name: String,
    },
    /// A name was declared a second time in a namespace that does not
    /// permit shadowing within the same scope (types and packages).
    #[error("{span}: `{name}` is already declared in this scope (first declared at {first})")]
    Redeclaration {
        /// Where the conflicting declaration occurred.
        span: Span,
        /// The name that was redeclared.
        name: String,
        /// Where the name was first declared.
        first: Span,
    },
    /// An expression's potential type narrowed to more than one candidate
    /// and no required type was available to disambiguate it.
    #[error("{span}: type of `{expr}` is ambiguous among {count} candidates")]
    AmbiguousType {
        /// The ambiguous expression's position.
        span: Span,
        /// A description of the expression.
        expr: String,
        /// How many candidate types remained.
        count: usize,
    },
    /// An expression's potential type set did not contain any type
    /// satisfying the context's required type.
    #[error("{span}: no candidate type of `{expr}` matches the required type")]
    NoMatchingType {
        /// The offending expression's position.
        span: Span,
        /// A description of the expression.
        expr: String,
    },
    /// A fully-resolved type did not match the type required by its context.
    #[error("{span}: expected type `{expected}`, found `{found}`")]
    TypeMismatch {
        /// Where the mismatch was detected.
        span: Span,
        /// The type the surrounding context required.
        expected: String,
        /// The type the expression actually committed to.
        found: String,
    },
}

impl AnalysisError {
    /// The position the error should be reported at.
    pub fn span(&self) -> Span {
        match self {
            Self::UnknownName { span, .. }
            | Self::Redeclaration { span, .. }
            | Self::AmbiguousType { span, .. }
            | Self::NoMatchingType { span, .. }
            | Self::TypeMismatch { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_matches_external_wording() {
        let err = AnalysisError::UnknownName {
            span: Span::new(3, 4),
            name: "foo".into(),
        };
        assert_eq!(err.to_string(), "3:4: unknown name `foo`");
    }
}
