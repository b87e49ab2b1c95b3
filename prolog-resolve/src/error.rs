//! ISO error terms (spec.md §4.3.8, §7): `error(Kind, Context)`.
//!
//! A deliberate modernisation: the teacher's equivalent diagnostics
//! (`chalk-solve`'s `CoherenceError`, lowering errors) are built on the
//! older `failure` crate in the pack's snapshot; this workspace adopts
//! `thiserror` throughout instead (see `DESIGN.md`), since it is the
//! direct, actively-maintained successor covering the same "structured,
//! convert-to-string-cheaply" error-enum niche.

use prolog_ir::term::Term;
use thiserror::Error;

/// The `Kind` half of `error(Kind, Context)` (spec.md §4.3.8's kind
/// list). `Resource` is a SPEC_FULL.md-supplemented addition (ambient
/// resource/depth guards), not an ISO-mandated kind.
#[derive(Clone, Debug, Error)]
pub enum IsoErrorKind {
    #[error("instantiation_error")]
    Instantiation,
    #[error("type_error({expected}, {culprit:?})")]
    Type { expected: String, culprit: Term },
    #[error("domain_error({domain}, {culprit:?})")]
    Domain { domain: String, culprit: Term },
    #[error("existence_error({kind}, {object:?})")]
    Existence { kind: String, object: Term },
    #[error("evaluation_error({reason})")]
    Evaluation { reason: String },
    #[error("representation_error({flag})")]
    Representation { flag: String },
    #[error("permission_error({operation}, {kind}, {culprit:?})")]
    Permission {
        operation: String,
        kind: String,
        culprit: Term,
    },
    #[error("resource_error({resource})")]
    Resource { resource: String },
}

impl IsoErrorKind {
    fn to_term(&self) -> Term {
        match self {
            IsoErrorKind::Instantiation => Term::atom("instantiation_error"),
            IsoErrorKind::Type { expected, culprit } => {
                Term::compound("type_error", vec![Term::atom(expected), culprit.clone()])
            }
            IsoErrorKind::Domain { domain, culprit } => {
                Term::compound("domain_error", vec![Term::atom(domain), culprit.clone()])
            }
            IsoErrorKind::Existence { kind, object } => {
                Term::compound("existence_error", vec![Term::atom(kind), object.clone()])
            }
            IsoErrorKind::Evaluation { reason } => {
                Term::compound("evaluation_error", vec![Term::atom(reason)])
            }
            IsoErrorKind::Representation { flag } => {
                Term::compound("representation_error", vec![Term::atom(flag)])
            }
            IsoErrorKind::Permission {
                operation,
                kind,
                culprit,
            } => Term::compound(
                "permission_error",
                vec![Term::atom(operation), Term::atom(kind), culprit.clone()],
            ),
            IsoErrorKind::Resource { resource } => {
                Term::compound("resource_error", vec![Term::atom(resource)])
            }
        }
    }
}

/// A builtin-raised error (spec.md §4.3.8's `Error(term)` outcome),
/// paired with a context term (often an unbound variable, per ISO's
/// "implementation defined" context slot).
#[derive(Clone, Debug, Error)]
#[error("{kind}")]
pub struct IsoError {
    pub kind: IsoErrorKind,
    pub context: Term,
}

impl IsoError {
    pub fn new(kind: IsoErrorKind) -> IsoError {
        IsoError {
            kind,
            context: Term::fresh_var(),
        }
    }

    pub fn instantiation() -> IsoError {
        IsoError::new(IsoErrorKind::Instantiation)
    }

    pub fn type_error(expected: &str, culprit: Term) -> IsoError {
        IsoError::new(IsoErrorKind::Type {
            expected: expected.to_string(),
            culprit,
        })
    }

    pub fn domain_error(domain: &str, culprit: Term) -> IsoError {
        IsoError::new(IsoErrorKind::Domain {
            domain: domain.to_string(),
            culprit,
        })
    }

    pub fn existence_error(kind: &str, object: Term) -> IsoError {
        IsoError::new(IsoErrorKind::Existence {
            kind: kind.to_string(),
            object,
        })
    }

    pub fn evaluation_error(reason: &str) -> IsoError {
        IsoError::new(IsoErrorKind::Evaluation {
            reason: reason.to_string(),
        })
    }

    pub fn permission_error(operation: &str, kind: &str, culprit: Term) -> IsoError {
        IsoError::new(IsoErrorKind::Permission {
            operation: operation.to_string(),
            kind: kind.to_string(),
            culprit,
        })
    }

    pub fn resource_error(resource: &str) -> IsoError {
        IsoError::new(IsoErrorKind::Resource {
            resource: resource.to_string(),
        })
    }

    /// Renders `error(Kind, Context)` as a `throw`-able `Term` (spec.md
    /// §7: "the resolver converts to `throw(term)`").
    pub fn to_term(&self) -> Term {
        Term::compound("error", vec![self.kind.to_term(), self.context.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_error_shape() {
        let e = IsoError::type_error("integer", Term::atom("a"));
        let t = e.to_term();
        assert_eq!(t.indicator().unwrap().name.as_str().as_ref(), "error");
    }
}
